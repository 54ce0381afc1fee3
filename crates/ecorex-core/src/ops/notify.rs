//! Notification bus
//!
//! Mutations queue notifications while they do their bookkeeping; the queue
//! is flushed once the model is consistent again, so listeners never observe
//! a half-applied change. For each notification the listener lists are
//! consulted in this order: resource eternal, resource normal, object
//! eternal, object normal. Each list is snapshotted before iteration.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::errors::Result;
use crate::meta::EStructuralFeature;
use crate::model::{ObjectId, ResourceId};
use crate::ops::ResourceSet;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Set,
    Unset,
    Add,
    AddMany,
    Remove,
    RemoveMany,
    Move,
}

/// Source of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notifier {
    Object(ObjectId),
    /// Change of a resource's root list
    Resource(ResourceId),
}

/// One observed change
///
/// For `Move`, `old` holds the source index as `Value::Int` and `position`
/// the destination index. For `*Many` kinds the affected elements are a
/// `Value::List` and `position` is the first index.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub notifier: Notifier,
    pub feature: Option<EStructuralFeature>,
    pub kind: NotificationKind,
    pub old: Value,
    pub new: Value,
    pub position: Option<usize>,
}

impl Notification {
    pub(crate) fn object(
        object: ObjectId,
        feature: &EStructuralFeature,
        kind: NotificationKind,
        old: Value,
        new: Value,
        position: Option<usize>,
    ) -> Self {
        Notification {
            notifier: Notifier::Object(object),
            feature: Some(feature.clone()),
            kind,
            old,
            new,
            position,
        }
    }

    pub(crate) fn resource(
        resource: ResourceId,
        kind: NotificationKind,
        old: Value,
        new: Value,
        position: Option<usize>,
    ) -> Self {
        Notification {
            notifier: Notifier::Resource(resource),
            feature: None,
            kind,
            old,
            new,
            position,
        }
    }

    /// Name of the changed feature (`contents` for resource root changes)
    pub fn feature_name(&self) -> String {
        self.feature
            .as_ref()
            .map(EStructuralFeature::name)
            .unwrap_or_else(|| "contents".to_string())
    }

    /// Object that changed; `None` for resource root changes
    pub fn object_id(&self) -> Option<ObjectId> {
        match self.notifier {
            Notifier::Object(id) => Some(id),
            Notifier::Resource(_) => None,
        }
    }
}

pub type ListenerResult = std::result::Result<(), Box<dyn Error>>;

/// Receiver of change notifications
pub trait Listener {
    fn notify_changed(&self, notification: &Notification) -> ListenerResult;
}

impl<F> Listener for F
where
    F: Fn(&Notification) -> ListenerResult,
{
    fn notify_changed(&self, notification: &Notification) -> ListenerResult {
        self(notification)
    }
}

/// Handle returned on registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

type Entry = (ListenerId, Rc<dyn Listener>);

#[derive(Default, Clone)]
pub(crate) struct ListenerList {
    eternal: Vec<Entry>,
    normal: Vec<Entry>,
}

impl ListenerList {
    pub(crate) fn add(&mut self, id: ListenerId, listener: Rc<dyn Listener>, eternal: bool) {
        if eternal {
            self.eternal.push((id, listener));
        } else {
            self.normal.push((id, listener));
        }
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.eternal.len() + self.normal.len();
        self.eternal.retain(|(lid, _)| *lid != id);
        self.normal.retain(|(lid, _)| *lid != id);
        before != self.eternal.len() + self.normal.len()
    }

    fn snapshot(&self) -> (Vec<Rc<dyn Listener>>, Vec<Rc<dyn Listener>>) {
        (
            self.eternal.iter().map(|(_, l)| l.clone()).collect(),
            self.normal.iter().map(|(_, l)| l.clone()).collect(),
        )
    }
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("eternal", &self.eternal.len())
            .field("normal", &self.normal.len())
            .finish()
    }
}

/// Register a listener on an object
///
/// # Errors
///
/// `ObjectNotFound` for a foreign handle.
pub fn observe(rs: &mut ResourceSet, object: ObjectId, listener: impl Listener + 'static) -> Result<ListenerId> {
    register(rs, Notifier::Object(object), Rc::new(listener), false)
}

/// Register an eternal listener on an object (dispatched before normal ones)
///
/// # Errors
///
/// `ObjectNotFound` for a foreign handle.
pub fn observe_eternal(
    rs: &mut ResourceSet,
    object: ObjectId,
    listener: impl Listener + 'static,
) -> Result<ListenerId> {
    register(rs, Notifier::Object(object), Rc::new(listener), true)
}

/// Register a listener on a resource; it sees every change of the resource's
/// roots and of every object contained in the resource
///
/// # Errors
///
/// `ResourceNotFound` for a foreign handle.
pub fn observe_resource(
    rs: &mut ResourceSet,
    resource: ResourceId,
    listener: impl Listener + 'static,
) -> Result<ListenerId> {
    register(rs, Notifier::Resource(resource), Rc::new(listener), false)
}

/// Eternal variant of [`observe_resource`]
///
/// # Errors
///
/// `ResourceNotFound` for a foreign handle.
pub fn observe_resource_eternal(
    rs: &mut ResourceSet,
    resource: ResourceId,
    listener: impl Listener + 'static,
) -> Result<ListenerId> {
    register(rs, Notifier::Resource(resource), Rc::new(listener), true)
}

fn register(
    rs: &mut ResourceSet,
    notifier: Notifier,
    listener: Rc<dyn Listener>,
    eternal: bool,
) -> Result<ListenerId> {
    let id = rs.next_listener_id();
    match notifier {
        Notifier::Object(object) => rs.object_data_mut(object)?.listeners.add(id, listener, eternal),
        Notifier::Resource(resource) => rs.resource_mut(resource)?.listeners.add(id, listener, eternal),
    }
    Ok(id)
}

/// Unregister a listener from an object
///
/// # Errors
///
/// `ObjectNotFound` for a foreign handle.
pub fn unobserve(rs: &mut ResourceSet, object: ObjectId, id: ListenerId) -> Result<bool> {
    Ok(rs.object_data_mut(object)?.listeners.remove(id))
}

/// Unregister a listener from a resource
///
/// # Errors
///
/// `ResourceNotFound` for a foreign handle.
pub fn unobserve_resource(rs: &mut ResourceSet, resource: ResourceId, id: ListenerId) -> Result<bool> {
    Ok(rs.resource_mut(resource)?.listeners.remove(id))
}

/// Deliver one notification to every interested listener
pub(crate) fn dispatch(rs: &ResourceSet, notification: &Notification) {
    let resource = match notification.notifier {
        Notifier::Resource(r) => Some(r),
        Notifier::Object(o) => rs.resource_id_of(o),
    };
    let (resource_eternal, resource_normal) = resource
        .and_then(|r| rs.resource(r).ok())
        .map(|r| r.listeners.snapshot())
        .unwrap_or_default();
    let (object_eternal, object_normal) = notification
        .object_id()
        .and_then(|o| rs.object_data(o).ok())
        .map(|d| d.listeners.snapshot())
        .unwrap_or_default();

    for listener in resource_eternal
        .iter()
        .chain(resource_normal.iter())
        .chain(object_eternal.iter())
        .chain(object_normal.iter())
    {
        if let Err(err) = listener.notify_changed(notification) {
            tracing::warn!(
                kind = ?notification.kind,
                feature = %notification.feature_name(),
                error = %err,
                "listener failed"
            );
        }
    }
}
