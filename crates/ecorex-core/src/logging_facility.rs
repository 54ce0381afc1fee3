//! Structured logging facility
//!
//! One initialization point (`init(profile)`), the operation boundary macros
//! (`log_op_start!`, `log_op_end!`, `log_op_error!`) and an in-memory capture
//! layer for asserting on emitted events in tests.
//!
//! ```rust
//! use ecorex_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Kernel operations that touch the outside world (resource load and save,
//! proxy resolution, command execution) are bracketed by the boundary macros.
//! Listener failures are reported with `tracing::warn!` and otherwise ignored.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
