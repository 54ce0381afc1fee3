//! Structural checks over containment trees
//!
//! `invariants` reports every violation it finds; `validation` turns the
//! first one into a typed error.

pub mod invariants;
pub mod validation;
