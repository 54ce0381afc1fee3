//! Kernel operations over a [`ResourceSet`]
//!
//! Every public mutation runs inside a journal frame: on error the frame is
//! reverted, on success it is folded into the enclosing frame, and queued
//! notifications are delivered once the outermost frame closes.

pub mod collection_ops;
pub mod delete_ops;
pub mod journal;
pub mod navigation;
pub mod notify;
pub mod object_ops;
pub mod operation_ops;
pub mod proxy_ops;
pub mod reflect_ops;
pub mod resource_ops;
pub mod store;

pub use notify::{Listener, ListenerId, ListenerResult, Notification, NotificationKind, Notifier};
pub use reflect_ops::{get, is_set, list, set, unset, FeatureKey};
pub use store::ResourceSet;

use crate::errors::Result;

/// Run `op` as one atomic mutation
pub(crate) fn atomically<T>(
    rs: &mut ResourceSet,
    op: impl FnOnce(&mut ResourceSet) -> Result<T>,
) -> Result<T> {
    rs.begin_frame();
    match op(rs) {
        Ok(value) => {
            rs.commit_frame();
            rs.settle();
            Ok(value)
        }
        Err(err) => {
            rs.abort_frame();
            Err(err)
        }
    }
}
