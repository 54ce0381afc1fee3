//! Mutations of many-valued features
//!
//! Every element goes through the same check, bookkeep, apply and notify
//! steps as a single-valued write. Bulk operations install all elements
//! before their one `*_MANY` notification is queued.

use crate::errors::{ModelError, Result};
use crate::meta::EStructuralFeature;
use crate::model::{CollectionShape, ObjectId, ValueList};
use crate::ops::notify::{Notification, NotificationKind};
use crate::ops::reflect_ops::{check_no_cycle, link, unlink, FeatureKey};
use crate::ops::{atomically, proxy_ops, ResourceSet};
use crate::value::Value;

fn prepare(rs: &mut ResourceSet, owner: ObjectId, key: impl FeatureKey) -> Result<(ObjectId, EStructuralFeature)> {
    let owner = proxy_ops::deref(rs, owner)?;
    let feature = key.resolve_in(&rs.class_of(owner)?)?;
    if !feature.is_many() {
        return Err(ModelError::bad_value(feature.name(), "feature is single-valued"));
    }
    if feature.is_derived() {
        return Err(ModelError::DerivedFeatureReadOnly {
            feature: feature.name(),
        });
    }
    if !feature.is_changeable() {
        return Err(ModelError::bad_value(feature.name(), "feature is not changeable"));
    }
    Ok((owner, feature))
}

fn is_unique(feature: &EStructuralFeature) -> bool {
    CollectionShape::of(feature).is_unique() || feature.is_containment() || feature.opposite().is_some()
}

fn current_len(rs: &ResourceSet, owner: ObjectId, feature: &EStructuralFeature) -> Result<usize> {
    Ok(rs.object_data(owner)?.many(feature).map_or(0, ValueList::len))
}

fn queue_added(rs: &mut ResourceSet, owner: ObjectId, feature: &EStructuralFeature, added: Vec<(usize, Value)>, bulk: bool) {
    match added.len() {
        0 => {}
        1 if !bulk => {
            if let Some((at, value)) = added.into_iter().next() {
                rs.queue(Notification::object(owner, feature, NotificationKind::Add, Value::Null, value, Some(at)));
            }
        }
        _ => {
            let first = added.first().map(|(at, _)| *at);
            let values = added.into_iter().map(|(_, v)| v).collect();
            rs.queue(Notification::object(
                owner,
                feature,
                NotificationKind::AddMany,
                Value::Null,
                Value::List(values),
                first,
            ));
        }
    }
}

fn queue_removed(rs: &mut ResourceSet, owner: ObjectId, feature: &EStructuralFeature, start: usize, removed: Vec<Value>) {
    match removed.len() {
        0 => {}
        1 => {
            if let Some(value) = removed.into_iter().next() {
                rs.queue(Notification::object(owner, feature, NotificationKind::Remove, value, Value::Null, Some(start)));
            }
        }
        _ => rs.queue(Notification::object(
            owner,
            feature,
            NotificationKind::RemoveMany,
            Value::List(removed),
            Value::Null,
            Some(start),
        )),
    }
}

/// Add one element without notifying; `None` when a unique collection
/// already holds it
pub(crate) fn add_one(
    rs: &mut ResourceSet,
    owner: ObjectId,
    feature: &EStructuralFeature,
    index: Option<usize>,
    value: Value,
) -> Result<Option<usize>> {
    if value.is_null() {
        return Err(ModelError::bad_value(feature.name(), "collections cannot hold null"));
    }
    let value = match feature.check_element(rs, value)? {
        Value::Object(id) => Value::Object(rs.effective(id)),
        other => other,
    };
    let len = current_len(rs, owner, feature)?;
    let present = rs
        .object_data(owner)?
        .many(feature)
        .is_some_and(|list| list.contains(&value));
    if present && is_unique(feature) {
        return Ok(None);
    }
    let upper = feature.upper_bound();
    if upper > 0 && len as i64 >= upper {
        return Err(ModelError::bad_value(
            feature.name(),
            format!("upper bound {} reached", upper),
        ));
    }
    let at = if CollectionShape::of(feature).is_ordered() {
        let at = index.unwrap_or(len);
        if at > len {
            return Err(ModelError::bad_value(
                feature.name(),
                format!("index {} out of range 0..={}", at, len),
            ));
        }
        at
    } else {
        len
    };
    if let Some(target) = value.as_object() {
        if feature.is_containment() {
            check_no_cycle(rs, owner, target, feature)?;
        }
        link(rs, owner, feature, target)?;
    }
    let at = rs.list_insert(owner, feature, at, value);
    rs.set_flag(owner, feature, true);
    Ok(Some(at))
}

/// Add one element and queue its `Add`
pub(crate) fn insert_inner(
    rs: &mut ResourceSet,
    owner: ObjectId,
    feature: &EStructuralFeature,
    index: Option<usize>,
    value: Value,
) -> Result<Option<usize>> {
    let added = add_one(rs, owner, feature, index, value.clone())?;
    if let Some(at) = added {
        let stored = rs
            .object_data(owner)?
            .many(feature)
            .and_then(|l| l.get(at).cloned())
            .unwrap_or(value);
        queue_added(rs, owner, feature, vec![(at, stored)], false);
    }
    Ok(added)
}

/// Remove the element at `index` without notifying
pub(crate) fn remove_one(rs: &mut ResourceSet, owner: ObjectId, feature: &EStructuralFeature, index: usize) -> Result<Value> {
    let len = current_len(rs, owner, feature)?;
    let value = rs.list_remove(owner, feature, index).ok_or_else(|| {
        ModelError::bad_value(feature.name(), format!("index {} out of range 0..{}", index, len))
    })?;
    if let Some(target) = value.as_object() {
        unlink(rs, owner, feature, target)?;
    }
    Ok(value)
}

/// Remove everything, queuing one `Remove` or `RemoveMany`
pub(crate) fn clear_inner(rs: &mut ResourceSet, owner: ObjectId, feature: &EStructuralFeature) -> Result<()> {
    let len = current_len(rs, owner, feature)?;
    let mut removed = Vec::with_capacity(len);
    for index in (0..len).rev() {
        removed.push(remove_one(rs, owner, feature, index)?);
    }
    removed.reverse();
    queue_removed(rs, owner, feature, 0, removed);
    Ok(())
}

/// Replace `start..end` with `values`
pub(crate) fn splice_inner(
    rs: &mut ResourceSet,
    owner: ObjectId,
    feature: &EStructuralFeature,
    start: usize,
    end: usize,
    values: Vec<Value>,
) -> Result<()> {
    let len = current_len(rs, owner, feature)?;
    if start > end || end > len {
        return Err(ModelError::bad_value(
            feature.name(),
            format!("slice {}..{} out of range 0..{}", start, end, len),
        ));
    }
    let mut removed = Vec::with_capacity(end - start);
    for index in (start..end).rev() {
        removed.push(remove_one(rs, owner, feature, index)?);
    }
    removed.reverse();
    queue_removed(rs, owner, feature, start, removed);

    let mut added = Vec::with_capacity(values.len());
    let mut at = start;
    for value in values {
        if let Some(index) = add_one(rs, owner, feature, Some(at), value)? {
            let stored = rs.object_data(owner)?.many(feature).and_then(|l| l.get(index).cloned());
            if let Some(stored) = stored {
                added.push((index, stored));
            }
            at = index + 1;
        }
    }
    let bulk = added.len() > 1;
    queue_added(rs, owner, feature, added, bulk);
    Ok(())
}

pub(crate) fn replace_all(rs: &mut ResourceSet, owner: ObjectId, feature: &EStructuralFeature, values: Vec<Value>) -> Result<()> {
    let len = current_len(rs, owner, feature)?;
    splice_inner(rs, owner, feature, 0, len, values)
}

/// Append one element
///
/// A duplicate in a unique collection is a no-op without notification.
///
/// # Errors
///
/// `BadValue` for `Null`, a wrong element type, a reached upper bound or a
/// containment cycle; `DerivedFeatureReadOnly` for derived collections.
pub fn append(rs: &mut ResourceSet, owner: ObjectId, feature: impl FeatureKey, value: impl Into<Value>) -> Result<()> {
    let (owner, feature) = prepare(rs, owner, feature)?;
    let value = value.into();
    atomically(rs, |rs| insert_inner(rs, owner, &feature, None, value).map(|_| ()))
}

/// Insert one element at `index` (appended for unordered collections)
///
/// # Errors
///
/// As [`append`], plus `BadValue` when `index` is past the end.
pub fn insert(
    rs: &mut ResourceSet,
    owner: ObjectId,
    feature: impl FeatureKey,
    index: usize,
    value: impl Into<Value>,
) -> Result<()> {
    let (owner, feature) = prepare(rs, owner, feature)?;
    let value = value.into();
    atomically(rs, |rs| insert_inner(rs, owner, &feature, Some(index), value).map(|_| ()))
}

/// Append several elements with a single `AddMany`
///
/// # Errors
///
/// As [`append`]; on error nothing is added.
pub fn extend(rs: &mut ResourceSet, owner: ObjectId, feature: impl FeatureKey, values: Vec<Value>) -> Result<()> {
    let (owner, feature) = prepare(rs, owner, feature)?;
    atomically(rs, |rs| {
        let mut added = Vec::with_capacity(values.len());
        for value in values {
            if let Some(at) = add_one(rs, owner, &feature, None, value)? {
                if let Some(stored) = rs.object_data(owner)?.many(&feature).and_then(|l| l.get(at).cloned()) {
                    added.push((at, stored));
                }
            }
        }
        queue_added(rs, owner, &feature, added, true);
        Ok(())
    })
}

/// Remove the first occurrence of `value`; `false` when absent
///
/// # Errors
///
/// `BadValue` for single-valued features, `DerivedFeatureReadOnly`.
pub fn remove(rs: &mut ResourceSet, owner: ObjectId, feature: impl FeatureKey, value: impl Into<Value>) -> Result<bool> {
    let (owner, feature) = prepare(rs, owner, feature)?;
    let value = match value.into() {
        Value::Object(id) => Value::Object(rs.effective(id)),
        other => other,
    };
    atomically(rs, |rs| {
        let index = rs.object_data(owner)?.many(&feature).and_then(|l| l.index_of(&value));
        let Some(index) = index else {
            return Ok(false);
        };
        let removed = remove_one(rs, owner, &feature, index)?;
        queue_removed(rs, owner, &feature, index, vec![removed]);
        Ok(true)
    })
}

/// Remove and return the element at `index`
///
/// # Errors
///
/// `BadValue` when `index` is out of range.
pub fn remove_at(rs: &mut ResourceSet, owner: ObjectId, feature: impl FeatureKey, index: usize) -> Result<Value> {
    let (owner, feature) = prepare(rs, owner, feature)?;
    atomically(rs, |rs| {
        let removed = remove_one(rs, owner, &feature, index)?;
        queue_removed(rs, owner, &feature, index, vec![removed.clone()]);
        Ok(removed)
    })
}

/// Move the element at `from` to `to`
///
/// # Errors
///
/// `BadValue` for unordered collections or out-of-range indices.
pub fn move_item(rs: &mut ResourceSet, owner: ObjectId, feature: impl FeatureKey, from: usize, to: usize) -> Result<()> {
    let (owner, feature) = prepare(rs, owner, feature)?;
    if !CollectionShape::of(&feature).is_ordered() {
        return Err(ModelError::bad_value(feature.name(), "cannot move within an unordered collection"));
    }
    atomically(rs, |rs| {
        let len = current_len(rs, owner, &feature)?;
        if from >= len || to >= len {
            return Err(ModelError::bad_value(
                feature.name(),
                format!("move {} -> {} out of range 0..{}", from, to, len),
            ));
        }
        if from == to {
            return Ok(());
        }
        if let Some(value) = rs.list_move(owner, &feature, from, to) {
            rs.queue(Notification::object(
                owner,
                &feature,
                NotificationKind::Move,
                Value::Int(from as i64),
                value,
                Some(to),
            ));
        }
        Ok(())
    })
}

/// Remove every element; the feature stays set
///
/// # Errors
///
/// `BadValue` for single-valued features, `DerivedFeatureReadOnly`.
pub fn clear(rs: &mut ResourceSet, owner: ObjectId, feature: impl FeatureKey) -> Result<()> {
    let (owner, feature) = prepare(rs, owner, feature)?;
    atomically(rs, |rs| clear_inner(rs, owner, &feature))
}

/// Slice assignment: replace elements `start..end` with `values`
///
/// The removed slice notifies before the inserted elements.
///
/// # Errors
///
/// `BadValue` for an invalid range or element; nothing changes on error.
pub fn splice(
    rs: &mut ResourceSet,
    owner: ObjectId,
    feature: impl FeatureKey,
    start: usize,
    end: usize,
    values: Vec<Value>,
) -> Result<()> {
    let (owner, feature) = prepare(rs, owner, feature)?;
    atomically(rs, |rs| splice_inner(rs, owner, &feature, start, end, values))
}
