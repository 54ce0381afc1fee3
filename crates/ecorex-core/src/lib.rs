//! EcoreX Core - Reflective modeling runtime
//!
//! This crate provides the in-memory kernel of an EMF-style modeling
//! framework, including:
//! - Meta layer (packages, classes, data types, features, operations) with the
//!   self-describing Ecore bootstrap package
//! - Model objects addressed by handles into a resource-set arena, with
//!   reflective get/set, set-feature tracking, containment and opposites
//! - Collections that honor unique/ordered/bounds flags
//! - Synchronous change notifications
//! - Undoable commands, a command stack and an editing domain
//! - Resources, proxies and cross-document references
//! - A format-neutral document serializer plus the metamodel codec
//! - Structural invariant checks
//!
//! Concrete document formats beyond JSON and the filesystem live in
//! `ecorex-store`.

pub mod command_stack;
pub mod commands;
pub mod errors;
pub mod logging_facility;
pub mod meta;
pub mod model;
pub mod ops;
pub mod persistence;
pub mod rules;
pub mod value;

pub use ecorex_core_types::schema;

// Re-export commonly used types
pub use command_stack::{CommandStack, EditingDomain};
pub use commands::{Command, CommandKind, CommandState, RemoveTarget};
pub use errors::{ExError, ExErrorKind, ModelError, Result};
pub use meta::{EClass, EDataType, EPackage, EStructuralFeature, Registry};
pub use model::{ObjectId, ResourceId};
pub use ops::{Notification, NotificationKind, ResourceSet};
pub use value::{Value, ValueKind};
