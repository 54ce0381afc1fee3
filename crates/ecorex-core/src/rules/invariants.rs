use crate::meta::EStructuralFeature;
use crate::model::{ObjectId, Slot};
use crate::ops::{navigation, ResourceSet};
use crate::value::Value;

/// `root` followed by everything it contains, pre-order
pub fn tree(rs: &ResourceSet, root: ObjectId) -> Vec<ObjectId> {
    let root = rs.effective(root);
    let mut out = vec![root];
    out.extend(navigation::all_contents(rs, root));
    out
}

fn slot_targets(slot: Option<&Slot>) -> Vec<ObjectId> {
    match slot {
        Some(Slot::Single(v)) => v.objects(),
        Some(Slot::Many(list)) => list.iter().filter_map(Value::as_object).collect(),
        None => Vec::new(),
    }
}

fn holds(rs: &ResourceSet, owner: ObjectId, feature: &EStructuralFeature, target: ObjectId) -> bool {
    rs.object_data(owner)
        .map(|d| {
            slot_targets(d.slots.get(feature))
                .into_iter()
                .any(|t| rs.effective(t) == target)
        })
        .unwrap_or(false)
}

fn is_proxy(rs: &ResourceSet, object: ObjectId) -> bool {
    navigation::is_proxy(rs, object) && rs.effective(object) == object
}

/// Find containment edges whose two sides disagree
///
/// Checks both directions: a child whose recorded container does not hold
/// it, and a parent slot holding a child whose recorded container is
/// elsewhere.
///
/// Returns list of (child, parent, feature name) tuples
pub fn find_containment_violations(rs: &ResourceSet, root: ObjectId) -> Vec<(ObjectId, ObjectId, String)> {
    let mut violations = Vec::new();

    for object in tree(rs, root) {
        let Ok(data) = rs.object_data(object) else {
            continue;
        };

        if let Some(containment) = &data.container {
            if !holds(rs, containment.parent, &containment.feature, object) {
                violations.push((object, containment.parent, containment.feature.name()));
            }
        }

        for feature in data.class.all_containments() {
            if feature.derivation().is_some() {
                continue;
            }
            for child in slot_targets(data.slots.get(&feature)) {
                let recorded = rs.object_data(child).ok().and_then(|d| d.container.clone());
                let consistent = recorded.is_some_and(|c| c.parent == object && c.feature == feature);
                if !consistent {
                    violations.push((child, object, feature.name()));
                }
            }
        }
    }

    violations
}

/// Find references whose opposite end does not point back
///
/// Unresolved proxies are skipped: their side of the pair is not loaded.
///
/// Returns list of (owner, feature name, target) tuples
pub fn find_opposite_violations(rs: &ResourceSet, root: ObjectId) -> Vec<(ObjectId, String, ObjectId)> {
    let mut violations = Vec::new();

    for object in tree(rs, root) {
        let Ok(data) = rs.object_data(object) else {
            continue;
        };
        for feature in data.class.all_references() {
            if feature.is_containment() || feature.is_container() || feature.derivation().is_some() {
                continue;
            }
            let Some(opposite) = feature.opposite() else {
                continue;
            };
            for target in slot_targets(data.slots.get(&feature)) {
                if is_proxy(rs, target) {
                    continue;
                }
                let target = rs.effective(target);
                if !holds(rs, target, &opposite, object) {
                    violations.push((object, feature.name(), target));
                }
            }
        }
    }

    violations
}

/// Find plain references missing from their target's inverse-relation
/// table, and table entries no longer backed by a reference
///
/// Returns list of (source, feature name, target) tuples
pub fn find_inverse_violations(rs: &ResourceSet, root: ObjectId) -> Vec<(ObjectId, String, ObjectId)> {
    let mut violations = Vec::new();

    for object in tree(rs, root) {
        let Ok(data) = rs.object_data(object) else {
            continue;
        };

        for feature in data.class.all_references() {
            if feature.is_containment()
                || feature.is_container()
                || feature.opposite().is_some()
                || feature.derivation().is_some()
            {
                continue;
            }
            for target in slot_targets(data.slots.get(&feature)) {
                if is_proxy(rs, target) {
                    continue;
                }
                let target = rs.effective(target);
                let recorded = rs
                    .object_data(target)
                    .is_ok_and(|d| d.inverse_rels.iter().any(|(s, f)| *s == object && *f == feature));
                if !recorded {
                    violations.push((object, feature.name(), target));
                }
            }
        }

        for (source, feature) in &data.inverse_rels {
            let source = rs.effective(*source);
            if !holds(rs, source, feature, object) {
                violations.push((source, feature.name(), object));
            }
        }
    }

    violations
}

/// Find features whose number of values falls outside their bounds
///
/// A feature is checked when it is set or required. Single-valued features
/// count one for a non-null value.
///
/// Returns list of (object, feature name, count, lower, upper) tuples;
/// `upper` is -1 for unbounded
pub fn find_cardinality_violations(rs: &ResourceSet, root: ObjectId) -> Vec<(ObjectId, String, usize, i64, i64)> {
    let mut violations = Vec::new();

    for object in tree(rs, root) {
        if is_proxy(rs, object) {
            continue;
        }
        let Ok(data) = rs.object_data(object) else {
            continue;
        };
        for feature in data.class.all_features() {
            if feature.is_derived() || feature.is_container() {
                continue;
            }
            let lower = feature.lower_bound();
            let upper = feature.upper_bound();
            if lower <= 0 && !data.set_features.contains(&feature) {
                continue;
            }
            let count = match data.slots.get(&feature) {
                Some(Slot::Single(Value::Null)) | None => 0,
                Some(Slot::Single(_)) => 1,
                Some(Slot::Many(list)) => list.len(),
            };
            let too_few = (count as i64) < lower;
            let too_many = upper >= 0 && (count as i64) > upper;
            if too_few || too_many {
                violations.push((object, feature.name(), count, lower, upper));
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, ecore, make_class, make_package, set_opposite};
    use crate::ops::{collection_ops, object_ops, reflect_ops};

    #[test]
    fn test_consistent_tree_has_no_violations() {
        let pkg = make_package("inv", "http://invariants.test/ok", "inv");
        let node = make_class(&pkg, "Node");
        add_feature(&node, EStructuralFeature::containment("kids", &node).many()).unwrap();
        let peers = add_feature(&node, EStructuralFeature::reference("peers", &node).many()).unwrap();
        let back = add_feature(&node, EStructuralFeature::reference("peerOf", &node).many()).unwrap();
        set_opposite(&peers, &back).unwrap();
        add_feature(&node, EStructuralFeature::reference("likes", &node)).unwrap();

        let mut rs = ResourceSet::new();
        let root = object_ops::create(&mut rs, &node).unwrap();
        let a = object_ops::create_in(&mut rs, root, "kids", &node).unwrap();
        let b = object_ops::create_in(&mut rs, root, "kids", &node).unwrap();
        collection_ops::append(&mut rs, a, "peers", b).unwrap();
        reflect_ops::set(&mut rs, b, "likes", a).unwrap();

        assert_eq!(tree(&rs, root).len(), 3);
        assert!(find_containment_violations(&rs, root).is_empty());
        assert!(find_opposite_violations(&rs, root).is_empty());
        assert!(find_inverse_violations(&rs, root).is_empty());
        assert!(find_cardinality_violations(&rs, root).is_empty());
    }

    #[test]
    fn test_broken_opposite_is_reported() {
        let pkg = make_package("inv", "http://invariants.test/opp", "inv");
        let node = make_class(&pkg, "Node");
        let peers = add_feature(&node, EStructuralFeature::reference("peers", &node).many()).unwrap();
        let back = add_feature(&node, EStructuralFeature::reference("peerOf", &node).many()).unwrap();
        set_opposite(&peers, &back).unwrap();

        let mut rs = ResourceSet::new();
        let a = object_ops::create(&mut rs, &node).unwrap();
        let b = object_ops::create(&mut rs, &node).unwrap();
        collection_ops::append(&mut rs, a, "peers", b).unwrap();
        rs.raw_replace_slot(b, &back, None);

        let violations = find_opposite_violations(&rs, a);
        assert_eq!(violations, vec![(a, "peers".to_string(), b)]);
    }

    #[test]
    fn test_required_feature_unset_is_reported() {
        let pkg = make_package("inv", "http://invariants.test/card", "inv");
        let item = make_class(&pkg, "Item");
        add_feature(&item, EStructuralFeature::attribute("name", &ecore::e_string()).required()).unwrap();
        add_feature(&item, EStructuralFeature::attribute("tags", &ecore::e_string()).bounds(0, 2)).unwrap();

        let mut rs = ResourceSet::new();
        let obj = object_ops::create(&mut rs, &item).unwrap();
        collection_ops::extend(&mut rs, obj, "tags", vec!["a".into(), "b".into(), "c".into()]).unwrap_err();

        let violations = find_cardinality_violations(&rs, obj);
        assert_eq!(violations, vec![(obj, "name".to_string(), 0, 1, 1)]);
    }

    #[test]
    fn test_stale_inverse_entry_is_reported() {
        let pkg = make_package("inv", "http://invariants.test/inverse", "inv");
        let node = make_class(&pkg, "Node");
        let likes = add_feature(&node, EStructuralFeature::reference("likes", &node)).unwrap();

        let mut rs = ResourceSet::new();
        let a = object_ops::create(&mut rs, &node).unwrap();
        let b = object_ops::create(&mut rs, &node).unwrap();
        reflect_ops::set(&mut rs, a, "likes", b).unwrap();
        rs.raw_replace_slot(a, &likes, None);

        let violations = find_inverse_violations(&rs, b);
        assert_eq!(violations, vec![(a, "likes".to_string(), b)]);
    }
}
