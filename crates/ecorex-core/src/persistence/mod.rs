//! Persistence
//!
//! Loading and saving go through three layers: a [`ByteStreamProvider`]
//! (or a claiming [`UriConverter`]) moves bytes, a [`DocumentFormat`] maps
//! bytes to [`DocNode`] trees, and the reader/writer pair maps trees to model
//! objects. Metamodel documents take the `ecore_codec` path instead.

pub mod document;
pub mod ecore_codec;
pub mod fragment;
pub mod json;
pub mod provider;
pub mod reader;
pub mod writer;

pub use document::{DocNode, DocumentFormat, SaveOptions};
pub use json::JsonFormat;
pub use provider::{ByteStreamProvider, MemoryProvider, PrefixConverter, UriConverter};
