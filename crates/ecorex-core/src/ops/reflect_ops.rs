//! Reflective read and write of object features
//!
//! `set` runs the check, bookkeep, apply and notify pipeline for one
//! single-valued feature. Containment, opposite and inverse-relation
//! bookkeeping lives here as well and is shared with `collection_ops`.

use crate::errors::{ModelError, Result};
use crate::meta::{EClass, EStructuralFeature};
use crate::model::{Containment, EList, ObjectId, Slot, ValueList};
use crate::ops::notify::{Notification, NotificationKind};
use crate::ops::{atomically, collection_ops, proxy_ops, ResourceSet};
use crate::value::Value;

/// Anything that names a feature of a class: the feature itself or its name
pub trait FeatureKey {
    /// # Errors
    ///
    /// `UnknownFeature` when `class` has no such feature.
    fn resolve_in(&self, class: &EClass) -> Result<EStructuralFeature>;
}

impl FeatureKey for &str {
    fn resolve_in(&self, class: &EClass) -> Result<EStructuralFeature> {
        class.feature(self)
    }
}

impl FeatureKey for String {
    fn resolve_in(&self, class: &EClass) -> Result<EStructuralFeature> {
        class.feature(self)
    }
}

impl FeatureKey for &String {
    fn resolve_in(&self, class: &EClass) -> Result<EStructuralFeature> {
        class.feature(self)
    }
}

impl FeatureKey for EStructuralFeature {
    fn resolve_in(&self, class: &EClass) -> Result<EStructuralFeature> {
        (&self).resolve_in(class)
    }
}

impl FeatureKey for &EStructuralFeature {
    fn resolve_in(&self, class: &EClass) -> Result<EStructuralFeature> {
        if class.has_feature(self) {
            Ok((*self).clone())
        } else {
            Err(ModelError::UnknownFeature {
                class: class.name(),
                feature: self.name(),
                line: None,
            })
        }
    }
}

/// Resolve proxies and the feature key of a reflective call
fn target(rs: &mut ResourceSet, object: ObjectId, key: impl FeatureKey) -> Result<(ObjectId, EStructuralFeature)> {
    let object = proxy_ops::deref(rs, object)?;
    let feature = key.resolve_in(&rs.class_of(object)?)?;
    Ok((object, feature))
}

/// Read a feature
///
/// An unset single-valued feature reads as its default; an unset many-valued
/// feature gets an empty list installed and reads as empty. Neither marks the
/// feature set. References to unresolved proxies are returned unresolved.
///
/// # Errors
///
/// `UnknownFeature`, `ObjectNotFound`, or `UnresolvedProxy` when `object` is
/// a proxy that cannot be resolved.
pub fn get(rs: &mut ResourceSet, object: ObjectId, feature: impl FeatureKey) -> Result<Value> {
    let (object, feature) = target(rs, object, feature)?;
    if feature.is_many() && feature.derivation().is_none() && !feature.is_container() {
        let installed = rs.object_data(object)?.many(&feature).is_some();
        if !installed {
            rs.raw_replace_slot(object, &feature, Some(Slot::Many(ValueList::new())));
        }
    }
    peek(rs, object, &feature)
}

/// Read a feature without side effects and without resolving proxies
///
/// # Errors
///
/// `ObjectNotFound`, or whatever a derived feature's computation returns.
pub fn peek(rs: &ResourceSet, object: ObjectId, feature: &EStructuralFeature) -> Result<Value> {
    let object = rs.effective(object);
    if let Some(derivation) = feature.derivation() {
        return (derivation.getter)(rs, object);
    }
    let data = rs.object_data(object)?;
    if feature.is_container() {
        return Ok(match &data.container {
            Some(c) if feature.opposite().as_ref() == Some(&c.feature) => Value::Object(c.parent),
            _ => Value::Null,
        });
    }
    match data.slots.get(feature) {
        Some(Slot::Single(v)) => Ok(transparent(rs, v.clone())),
        Some(Slot::Many(list)) => Ok(Value::List(
            list.iter().cloned().map(|v| transparent(rs, v)).collect(),
        )),
        None if feature.is_many() => Ok(Value::List(Vec::new())),
        None => feature.default_value(),
    }
}

fn transparent(rs: &ResourceSet, value: Value) -> Value {
    match value {
        Value::Object(id) => Value::Object(rs.effective(id)),
        other => other,
    }
}

/// Collection handle for a many-valued feature
///
/// # Errors
///
/// `BadValue` if the feature is single-valued, plus the errors of [`get`].
pub fn list(rs: &mut ResourceSet, object: ObjectId, feature: impl FeatureKey) -> Result<EList> {
    let (object, feature) = target(rs, object, feature)?;
    if !feature.is_many() {
        return Err(ModelError::bad_value(feature.name(), "feature is single-valued"));
    }
    get(rs, object, &feature)?;
    Ok(EList::new(object, feature))
}

/// Whether the feature was explicitly written
///
/// # Errors
///
/// `UnknownFeature`, `ObjectNotFound`, `UnresolvedProxy`.
pub fn is_set(rs: &mut ResourceSet, object: ObjectId, feature: impl FeatureKey) -> Result<bool> {
    let (object, feature) = target(rs, object, feature)?;
    if feature.derivation().is_some() {
        return Ok(match peek(rs, object, &feature)? {
            Value::Null => false,
            Value::List(items) => !items.is_empty(),
            _ => true,
        });
    }
    let data = rs.object_data(object)?;
    if feature.is_container() {
        return Ok(data
            .container
            .as_ref()
            .is_some_and(|c| feature.opposite().as_ref() == Some(&c.feature)));
    }
    Ok(data.set_features.contains(&feature))
}

fn check_writable(rs: &mut ResourceSet, object: ObjectId, feature: &EStructuralFeature, value: &Value) -> Result<bool> {
    if let Some(derivation) = feature.derivation() {
        return match derivation.setter {
            Some(setter) => {
                setter(rs, object, value.clone())?;
                Ok(false)
            }
            None => Err(ModelError::DerivedFeatureReadOnly {
                feature: feature.name(),
            }),
        };
    }
    if feature.is_derived() {
        return Err(ModelError::DerivedFeatureReadOnly {
            feature: feature.name(),
        });
    }
    if !feature.is_changeable() {
        return Err(ModelError::bad_value(feature.name(), "feature is not changeable"));
    }
    Ok(true)
}

/// Write a feature
///
/// Many-valued features take a `Value::List` that replaces the contents;
/// single-valued features reject lists. Any successful write marks the
/// feature set, including a write of `Null`.
///
/// # Errors
///
/// `BadValue` for type, enum or cardinality mismatches, unchangeable
/// features and containment cycles; `DerivedFeatureReadOnly`;
/// `UnknownFeature`; `UnresolvedProxy`.
pub fn set(rs: &mut ResourceSet, object: ObjectId, feature: impl FeatureKey, value: impl Into<Value>) -> Result<()> {
    let (object, feature) = target(rs, object, feature)?;
    let value = value.into();
    atomically(rs, |rs| {
        if !check_writable(rs, object, &feature, &value)? {
            return Ok(());
        }
        if feature.is_many() {
            let Value::List(items) = value else {
                return Err(ModelError::bad_value(
                    feature.name(),
                    format!("many-valued feature needs a list, got {}", value.type_name()),
                ));
            };
            collection_ops::replace_all(rs, object, &feature, items)?;
            rs.set_flag(object, &feature, true);
            return Ok(());
        }
        if matches!(value, Value::List(_)) {
            return Err(ModelError::bad_value(feature.name(), "single-valued feature cannot hold a list"));
        }
        set_single(rs, object, &feature, value)
    })
}

/// Clear a feature back to its default and mark it unset
///
/// # Errors
///
/// As [`set`].
pub fn unset(rs: &mut ResourceSet, object: ObjectId, feature: impl FeatureKey) -> Result<()> {
    let (object, feature) = target(rs, object, feature)?;
    atomically(rs, |rs| {
        if !check_writable(rs, object, &feature, &Value::Null)? {
            return Ok(());
        }
        if feature.is_container() {
            return detach(rs, object);
        }
        if feature.is_many() {
            collection_ops::clear_inner(rs, object, &feature)?;
            rs.write_slot(object, &feature, None);
            rs.set_flag(object, &feature, false);
            return Ok(());
        }
        let previous = current_single(rs, object, &feature)?;
        if let Some(prev) = previous.as_object() {
            unlink(rs, object, &feature, prev)?;
        }
        rs.write_slot(object, &feature, None);
        rs.set_flag(object, &feature, false);
        let default = feature.default_value()?;
        rs.queue(Notification::object(
            object,
            &feature,
            NotificationKind::Unset,
            previous,
            default,
            None,
        ));
        Ok(())
    })
}

fn current_single(rs: &ResourceSet, object: ObjectId, feature: &EStructuralFeature) -> Result<Value> {
    Ok(rs.object_data(object)?.single(feature).cloned().unwrap_or(Value::Null))
}

/// Single-valued write inside an open frame
pub(crate) fn set_single(rs: &mut ResourceSet, object: ObjectId, feature: &EStructuralFeature, value: Value) -> Result<()> {
    let value = transparent(rs, feature.check_element(rs, value)?);
    if feature.is_container() {
        return set_container_reference(rs, object, feature, value);
    }
    let previous = current_single(rs, object, feature)?;
    if previous != value {
        if let Some(target) = value.as_object() {
            if feature.is_containment() {
                check_no_cycle(rs, object, target, feature)?;
            }
        }
        if let Some(prev) = previous.as_object() {
            unlink(rs, object, feature, prev)?;
        }
        if let Some(target) = value.as_object() {
            link(rs, object, feature, target)?;
        }
        rs.write_slot(object, feature, Some(Slot::Single(value.clone())));
    } else if rs.object_data(object)?.single(feature).is_none() {
        rs.write_slot(object, feature, Some(Slot::Single(value.clone())));
    }
    rs.set_flag(object, feature, true);
    let kind = if value.is_null() {
        NotificationKind::Unset
    } else {
        NotificationKind::Set
    };
    rs.queue(Notification::object(object, feature, kind, previous, value, None));
    Ok(())
}

/// Writing the container end of a containment moves the object
fn set_container_reference(rs: &mut ResourceSet, object: ObjectId, feature: &EStructuralFeature, value: Value) -> Result<()> {
    let Some(containment) = feature.opposite() else {
        return Ok(());
    };
    match value.as_object() {
        None => detach(rs, object),
        Some(parent) => {
            if containment.is_many() {
                collection_ops::insert_inner(rs, parent, &containment, None, Value::Object(object)).map(|_| ())
            } else {
                set_single(rs, parent, &containment, Value::Object(object))
            }
        }
    }
}

/// Fail when containing `target` under `owner` would close a cycle
pub(crate) fn check_no_cycle(rs: &ResourceSet, owner: ObjectId, target: ObjectId, feature: &EStructuralFeature) -> Result<()> {
    let mut current = Some(owner);
    while let Some(id) = current {
        if id == target {
            return Err(ModelError::bad_value(
                feature.name(),
                format!("containing {} under {} would create a containment cycle", target, owner),
            ));
        }
        current = rs.object_data(id)?.container.as_ref().map(|c| c.parent);
    }
    Ok(())
}

fn is_unresolved_proxy(rs: &ResourceSet, object: ObjectId) -> bool {
    rs.object_data(object)
        .is_ok_and(|d| d.proxy.as_ref().is_some_and(|p| p.resolved.is_none()))
}

/// Bookkeeping for `owner.feature` gaining `target`
pub(crate) fn link(rs: &mut ResourceSet, owner: ObjectId, feature: &EStructuralFeature, target: ObjectId) -> Result<()> {
    if feature.is_containment() {
        detach(rs, target)?;
        rs.set_container(
            target,
            Some(Containment {
                parent: owner,
                feature: feature.clone(),
            }),
        );
        return Ok(());
    }
    if is_unresolved_proxy(rs, target) {
        rs.add_inverse(target, owner, feature);
        return Ok(());
    }
    match feature.opposite() {
        Some(opposite) if is_self_link(rs, owner, feature, target, &opposite) => Ok(()),
        Some(opposite) => link_opposite(rs, target, &opposite, owner),
        None => {
            rs.add_inverse(target, owner, feature);
            Ok(())
        }
    }
}

/// Bookkeeping for `owner.feature` losing `target`
pub(crate) fn unlink(rs: &mut ResourceSet, owner: ObjectId, feature: &EStructuralFeature, target: ObjectId) -> Result<()> {
    if feature.is_containment() {
        rs.set_container(target, None);
        return Ok(());
    }
    if is_unresolved_proxy(rs, target) {
        rs.remove_inverse(target, owner, feature);
        return Ok(());
    }
    match feature.opposite() {
        Some(opposite) if is_self_link(rs, owner, feature, target, &opposite) => Ok(()),
        Some(opposite) => unlink_opposite(rs, target, &opposite, owner),
        None => {
            rs.remove_inverse(target, owner, feature);
            Ok(())
        }
    }
}

/// An object linked to itself through a feature that is its own opposite;
/// the caller's write already covers both ends
fn is_self_link(
    rs: &ResourceSet,
    owner: ObjectId,
    feature: &EStructuralFeature,
    target: ObjectId,
    opposite: &EStructuralFeature,
) -> bool {
    opposite == feature && rs.effective(owner) == rs.effective(target)
}

/// Make `target.opposite` include `source`
fn link_opposite(rs: &mut ResourceSet, target: ObjectId, opposite: &EStructuralFeature, source: ObjectId) -> Result<()> {
    let entry = Value::Object(source);
    if opposite.is_many() {
        let present = rs
            .object_data(target)?
            .many(opposite)
            .is_some_and(|list| list.contains(&entry));
        if !present {
            let at = rs.object_data(target)?.many(opposite).map_or(0, ValueList::len);
            let at = rs.list_insert(target, opposite, at, entry.clone());
            rs.set_flag(target, opposite, true);
            rs.queue(Notification::object(target, opposite, NotificationKind::Add, Value::Null, entry, Some(at)));
        }
        return Ok(());
    }
    let previous = current_single(rs, target, opposite)?;
    if previous == entry {
        return Ok(());
    }
    if let (Some(stale), Some(back)) = (previous.as_object(), opposite.opposite()) {
        unlink_opposite(rs, stale, &back, target)?;
    }
    rs.write_slot(target, opposite, Some(Slot::Single(entry.clone())));
    rs.set_flag(target, opposite, true);
    rs.queue(Notification::object(target, opposite, NotificationKind::Set, previous, entry, None));
    Ok(())
}

/// Remove `source` from `target.opposite`
fn unlink_opposite(rs: &mut ResourceSet, target: ObjectId, opposite: &EStructuralFeature, source: ObjectId) -> Result<()> {
    let entry = Value::Object(source);
    if opposite.is_many() {
        let index = rs.object_data(target)?.many(opposite).and_then(|list| list.index_of(&entry));
        if let Some(index) = index {
            rs.list_remove(target, opposite, index);
            rs.queue(Notification::object(target, opposite, NotificationKind::Remove, entry, Value::Null, Some(index)));
        }
        return Ok(());
    }
    if current_single(rs, target, opposite)? == entry {
        rs.write_slot(target, opposite, Some(Slot::Single(Value::Null)));
        rs.queue(Notification::object(target, opposite, NotificationKind::Unset, entry, Value::Null, None));
    }
    Ok(())
}

/// Remove an object from its container or from its resource's roots
pub(crate) fn detach(rs: &mut ResourceSet, object: ObjectId) -> Result<()> {
    let data = rs.object_data(object)?;
    if let Some(Containment { parent, feature }) = data.container.clone() {
        let entry = Value::Object(object);
        if feature.is_many() {
            let index = rs.object_data(parent)?.many(&feature).and_then(|list| list.index_of(&entry));
            if let Some(index) = index {
                rs.list_remove(parent, &feature, index);
                rs.queue(Notification::object(parent, &feature, NotificationKind::Remove, entry, Value::Null, Some(index)));
            }
        } else {
            rs.write_slot(parent, &feature, None);
            rs.set_flag(parent, &feature, false);
            rs.queue(Notification::object(parent, &feature, NotificationKind::Unset, entry, Value::Null, None));
        }
        rs.set_container(object, None);
        if let Some(container_end) = feature.opposite() {
            rs.queue(Notification::object(
                object,
                &container_end,
                NotificationKind::Unset,
                Value::Object(parent),
                Value::Null,
                None,
            ));
        }
    } else if let Some(resource) = data.resource {
        let index = rs.resource(resource)?.contents.iter().position(|o| *o == object);
        if let Some(index) = index {
            rs.root_remove(resource, index);
            rs.queue(Notification::resource(
                resource,
                NotificationKind::Remove,
                Value::Object(object),
                Value::Null,
                Some(index),
            ));
        }
        rs.set_root_resource(object, None);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, ecore, make_class, make_enum, make_package, set_opposite};
    use crate::ops::object_ops;

    struct Fixture {
        rs: ResourceSet,
        node: EClass,
    }

    fn fixture() -> Fixture {
        let pkg = make_package("tree", "http://reflect.test", "t");
        let node = make_class(&pkg, "Node");
        let color = make_enum(&pkg, "Color", &["red", "green"]);
        add_feature(&node, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
        add_feature(&node, EStructuralFeature::attribute("size", &ecore::e_int()).with_default(Value::Int(7))).unwrap();
        add_feature(&node, EStructuralFeature::attribute("color", &color)).unwrap();
        add_feature(&node, EStructuralFeature::attribute("tags", &ecore::e_string()).many()).unwrap();
        add_feature(&node, EStructuralFeature::containment("child", &node)).unwrap();
        let kids = add_feature(&node, EStructuralFeature::containment("kids", &node).many()).unwrap();
        let parent = add_feature(&node, EStructuralFeature::reference("parent", &node)).unwrap();
        set_opposite(&kids, &parent).unwrap();
        let partner = add_feature(&node, EStructuralFeature::reference("partner", &node)).unwrap();
        set_opposite(&partner, &partner).unwrap();
        add_feature(&node, EStructuralFeature::reference("friend", &node)).unwrap();
        add_feature(
            &node,
            EStructuralFeature::attribute("upper", &ecore::e_string()).derived(|rs, id| {
                let data = rs.object_data(id)?;
                Ok(data
                    .slots
                    .iter()
                    .find(|(f, _)| f.name() == "name")
                    .and_then(|(_, s)| match s {
                        Slot::Single(Value::String(s)) => Some(Value::String(s.to_uppercase())),
                        _ => None,
                    })
                    .unwrap_or(Value::Null))
            }),
        )
        .unwrap();
        Fixture {
            rs: ResourceSet::new(),
            node,
        }
    }

    #[test]
    fn test_unset_reads_default_without_marking() {
        let Fixture { mut rs, node } = fixture();
        let n = object_ops::create(&mut rs, &node).unwrap();

        assert_eq!(get(&mut rs, n, "size").unwrap(), Value::Int(7));
        assert_eq!(get(&mut rs, n, "name").unwrap(), Value::Null);
        assert!(!is_set(&mut rs, n, "size").unwrap());
    }

    #[test]
    fn test_many_read_installs_same_list() {
        let Fixture { mut rs, node } = fixture();
        let n = object_ops::create(&mut rs, &node).unwrap();

        let first = list(&mut rs, n, "tags").unwrap();
        first.append(&mut rs, "a").unwrap();
        let second = list(&mut rs, n, "tags").unwrap();

        assert_eq!(first, second);
        assert_eq!(second.to_vec(&rs), vec![Value::from("a")]);
    }

    #[test]
    fn test_write_null_marks_set() {
        let Fixture { mut rs, node } = fixture();
        let n = object_ops::create(&mut rs, &node).unwrap();

        set(&mut rs, n, "name", Value::Null).unwrap();
        assert!(is_set(&mut rs, n, "name").unwrap());

        unset(&mut rs, n, "name").unwrap();
        assert!(!is_set(&mut rs, n, "name").unwrap());
    }

    #[test]
    fn test_enum_accepts_literal_name() {
        let Fixture { mut rs, node } = fixture();
        let n = object_ops::create(&mut rs, &node).unwrap();

        set(&mut rs, n, "color", "green").unwrap();
        let value = get(&mut rs, n, "color").unwrap();
        assert_eq!(value.as_literal().map(|l| l.name()).as_deref(), Some("green"));

        let err = set(&mut rs, n, "color", "blue").unwrap_err();
        assert!(matches!(err, ModelError::BadValue { .. }));
    }

    #[test]
    fn test_cardinality_mismatch_rejected() {
        let Fixture { mut rs, node } = fixture();
        let n = object_ops::create(&mut rs, &node).unwrap();

        assert!(matches!(set(&mut rs, n, "tags", "x"), Err(ModelError::BadValue { .. })));
        assert!(matches!(
            set(&mut rs, n, "name", Value::List(vec![])),
            Err(ModelError::BadValue { .. })
        ));
        assert!(matches!(set(&mut rs, n, "size", "big"), Err(ModelError::BadValue { .. })));
    }

    #[test]
    fn test_containment_cycle_rejected() {
        let Fixture { mut rs, node } = fixture();
        let a = object_ops::create(&mut rs, &node).unwrap();
        let b = object_ops::create(&mut rs, &node).unwrap();
        set(&mut rs, a, "child", b).unwrap();

        let err = set(&mut rs, b, "child", a).unwrap_err();
        assert!(matches!(err, ModelError::BadValue { .. }));
        assert!(matches!(set(&mut rs, a, "child", a), Err(ModelError::BadValue { .. })));
        assert_eq!(get(&mut rs, b, "child").unwrap(), Value::Null);
    }

    #[test]
    fn test_container_end_tracks_containment() {
        let Fixture { mut rs, node } = fixture();
        let p = object_ops::create(&mut rs, &node).unwrap();
        let c = object_ops::create(&mut rs, &node).unwrap();

        set(&mut rs, c, "parent", p).unwrap();
        assert_eq!(get(&mut rs, p, "kids").unwrap(), Value::List(vec![Value::Object(c)]));
        assert!(is_set(&mut rs, c, "parent").unwrap());

        unset(&mut rs, c, "parent").unwrap();
        assert_eq!(get(&mut rs, p, "kids").unwrap(), Value::List(vec![]));
        assert_eq!(get(&mut rs, c, "parent").unwrap(), Value::Null);
    }

    #[test]
    fn test_single_opposite_steals_partner() {
        let Fixture { mut rs, node } = fixture();
        let a = object_ops::create(&mut rs, &node).unwrap();
        let b = object_ops::create(&mut rs, &node).unwrap();
        let c = object_ops::create(&mut rs, &node).unwrap();

        set(&mut rs, a, "partner", b).unwrap();
        assert_eq!(get(&mut rs, b, "partner").unwrap(), Value::Object(a));

        set(&mut rs, c, "partner", b).unwrap();
        assert_eq!(get(&mut rs, b, "partner").unwrap(), Value::Object(c));
        assert_eq!(get(&mut rs, a, "partner").unwrap(), Value::Null);
    }

    #[test]
    fn test_plain_reference_tracks_inverse() {
        let Fixture { mut rs, node } = fixture();
        let a = object_ops::create(&mut rs, &node).unwrap();
        let b = object_ops::create(&mut rs, &node).unwrap();
        let c = object_ops::create(&mut rs, &node).unwrap();
        let friend = node.feature("friend").unwrap();

        set(&mut rs, a, "friend", b).unwrap();
        assert_eq!(rs.object_data(b).unwrap().inverse_rels, vec![(a, friend.clone())]);

        set(&mut rs, a, "friend", c).unwrap();
        assert!(rs.object_data(b).unwrap().inverse_rels.is_empty());
        assert_eq!(rs.object_data(c).unwrap().inverse_rels, vec![(a, friend)]);
    }

    #[test]
    fn test_derived_is_read_only() {
        let Fixture { mut rs, node } = fixture();
        let n = object_ops::create(&mut rs, &node).unwrap();
        set(&mut rs, n, "name", "ada").unwrap();

        assert_eq!(get(&mut rs, n, "upper").unwrap(), Value::from("ADA"));
        assert!(matches!(
            set(&mut rs, n, "upper", "x"),
            Err(ModelError::DerivedFeatureReadOnly { .. })
        ));
    }

    #[test]
    fn test_unknown_feature() {
        let Fixture { mut rs, node } = fixture();
        let n = object_ops::create(&mut rs, &node).unwrap();
        assert!(matches!(get(&mut rs, n, "nope"), Err(ModelError::UnknownFeature { .. })));
    }
}
