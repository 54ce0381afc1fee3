//! Core types shared across ecorex facilities
//!
//! This crate provides the canonical field keys and event names used by the
//! structured logging macros and the error facility of `ecorex-core`.

pub mod schema;
