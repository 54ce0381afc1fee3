//! Change journal
//!
//! Every kernel mutation is one of the primitive writes below. While a
//! journal frame is open, each primitive records the state it overwrote;
//! reverting a frame replays those records backwards and queues the
//! notifications an observer needs to see the inverse change.

use crate::meta::EStructuralFeature;
use crate::model::{Containment, ObjectId, ResourceId, Slot};
use crate::ops::notify::{Notification, NotificationKind};
use crate::ops::ResourceSet;
use crate::value::Value;

/// One recorded primitive write
#[derive(Debug, Clone)]
pub enum Change {
    /// Whole slot replaced; `old = None` means the slot was absent
    Slot {
        object: ObjectId,
        feature: EStructuralFeature,
        old: Option<Slot>,
    },
    ListInsert {
        object: ObjectId,
        feature: EStructuralFeature,
        index: usize,
    },
    ListRemove {
        object: ObjectId,
        feature: EStructuralFeature,
        index: usize,
        value: Value,
    },
    ListMove {
        object: ObjectId,
        feature: EStructuralFeature,
        from: usize,
        to: usize,
    },
    SetFlag {
        object: ObjectId,
        feature: EStructuralFeature,
        was_set: bool,
    },
    Container {
        object: ObjectId,
        old: Option<Containment>,
    },
    InverseAdd {
        target: ObjectId,
        source: ObjectId,
        feature: EStructuralFeature,
    },
    InverseRemove {
        target: ObjectId,
        source: ObjectId,
        feature: EStructuralFeature,
        index: usize,
    },
    RootInsert {
        resource: ResourceId,
        index: usize,
    },
    RootRemove {
        resource: ResourceId,
        index: usize,
        object: ObjectId,
    },
    RootResource {
        object: ObjectId,
        old: Option<ResourceId>,
    },
    IdMap {
        resource: ResourceId,
        id: String,
        old: Option<ObjectId>,
    },
    ObjectXmiId {
        object: ObjectId,
        old: Option<String>,
    },
}

/// Undo `changes` (oldest first) by replaying them newest first
pub(crate) fn revert(rs: &mut ResourceSet, changes: Vec<Change>) {
    for change in changes.into_iter().rev() {
        revert_one(rs, change);
    }
}

fn revert_one(rs: &mut ResourceSet, change: Change) {
    match change {
        Change::Slot {
            object,
            feature,
            old,
        } => {
            let current = rs.raw_replace_slot(object, &feature, old.clone());
            if !feature.is_many() {
                let before = single_value(current);
                let after = single_value(old);
                if before != after {
                    let kind = if after.is_null() {
                        NotificationKind::Unset
                    } else {
                        NotificationKind::Set
                    };
                    rs.queue(Notification::object(object, &feature, kind, before, after, None));
                }
            }
        }
        Change::ListInsert {
            object,
            feature,
            index,
        } => {
            if let Some(value) = rs.raw_list_remove(object, &feature, index) {
                rs.queue(Notification::object(
                    object,
                    &feature,
                    NotificationKind::Remove,
                    value,
                    Value::Null,
                    Some(index),
                ));
            }
        }
        Change::ListRemove {
            object,
            feature,
            index,
            value,
        } => {
            rs.raw_list_insert(object, &feature, index, value.clone());
            rs.queue(Notification::object(
                object,
                &feature,
                NotificationKind::Add,
                Value::Null,
                value,
                Some(index),
            ));
        }
        Change::ListMove {
            object,
            feature,
            from,
            to,
        } => {
            if let Some(value) = rs.raw_list_move(object, &feature, to, from) {
                rs.queue(Notification::object(
                    object,
                    &feature,
                    NotificationKind::Move,
                    Value::Int(to as i64),
                    value,
                    Some(from),
                ));
            }
        }
        Change::SetFlag {
            object,
            feature,
            was_set,
        } => rs.raw_set_flag(object, &feature, was_set),
        Change::Container { object, old } => {
            rs.raw_set_container(object, old);
        }
        Change::InverseAdd {
            target,
            source,
            feature,
        } => {
            rs.raw_remove_inverse(target, source, &feature);
        }
        Change::InverseRemove {
            target,
            source,
            feature,
            index,
        } => rs.raw_insert_inverse(target, index, source, feature),
        Change::RootInsert { resource, index } => {
            if let Some(object) = rs.raw_root_remove(resource, index) {
                rs.queue(Notification::resource(
                    resource,
                    NotificationKind::Remove,
                    Value::Object(object),
                    Value::Null,
                    Some(index),
                ));
            }
        }
        Change::RootRemove {
            resource,
            index,
            object,
        } => {
            rs.raw_root_insert(resource, index, object);
            rs.queue(Notification::resource(
                resource,
                NotificationKind::Add,
                Value::Null,
                Value::Object(object),
                Some(index),
            ));
        }
        Change::RootResource { object, old } => {
            rs.raw_set_root_resource(object, old);
        }
        Change::IdMap { resource, id, old } => {
            rs.raw_id_map_put(resource, &id, old);
        }
        Change::ObjectXmiId { object, old } => {
            rs.raw_set_xmi_id(object, old);
        }
    }
}

fn single_value(slot: Option<Slot>) -> Value {
    match slot {
        Some(Slot::Single(v)) => v,
        Some(Slot::Many(list)) => Value::List(list.to_vec()),
        None => Value::Null,
    }
}
