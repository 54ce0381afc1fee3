//! Read-only navigation of the containment tree and cross references
//!
//! Nothing here resolves proxies or performs I/O; already-resolved proxies
//! are followed transparently.

use crate::meta::{EClass, EStructuralFeature};
use crate::model::{ObjectId, ResourceId, Slot};
use crate::ops::ResourceSet;
use crate::persistence::fragment;
use crate::value::Value;

/// Direct container of an object
pub fn container(rs: &ResourceSet, object: ObjectId) -> Option<ObjectId> {
    let data = rs.object_data(rs.effective(object)).ok()?;
    data.container.as_ref().map(|c| c.parent)
}

/// Feature of the container that holds the object
pub fn containment_feature(rs: &ResourceSet, object: ObjectId) -> Option<EStructuralFeature> {
    let data = rs.object_data(rs.effective(object)).ok()?;
    data.container.as_ref().map(|c| c.feature.clone())
}

/// Top of the containment chain (the object itself when uncontained)
pub fn root(rs: &ResourceSet, object: ObjectId) -> ObjectId {
    let mut current = rs.effective(object);
    while let Some(parent) = container(rs, current) {
        current = parent;
    }
    current
}

/// Whether `ancestor` contains `object`, directly or transitively
pub fn is_ancestor(rs: &ResourceSet, ancestor: ObjectId, object: ObjectId) -> bool {
    let ancestor = rs.effective(ancestor);
    let mut current = container(rs, object);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = container(rs, id);
    }
    false
}

/// Resource whose tree holds the object
pub fn resource_of(rs: &ResourceSet, object: ObjectId) -> Option<ResourceId> {
    rs.resource_id_of(object)
}

/// Meta-class of the object (the declared type for unresolved proxies)
pub fn class_of(rs: &ResourceSet, object: ObjectId) -> Option<EClass> {
    rs.class_of(object).ok()
}

/// Directly contained objects, by containment feature then position
pub fn e_contents(rs: &ResourceSet, object: ObjectId) -> Vec<ObjectId> {
    let object = rs.effective(object);
    let (Ok(class), Ok(data)) = (rs.class_of(object), rs.object_data(object)) else {
        return Vec::new();
    };
    class
        .all_containments()
        .iter()
        .filter(|f| f.derivation().is_none())
        .flat_map(|f| data.targets(f))
        .collect()
}

/// Every object below `object`, depth-first pre-order
pub fn all_contents(rs: &ResourceSet, object: ObjectId) -> Vec<ObjectId> {
    let mut out = Vec::new();
    let mut stack: Vec<ObjectId> = e_contents(rs, object).into_iter().rev().collect();
    while let Some(next) = stack.pop() {
        out.push(next);
        stack.extend(e_contents(rs, next).into_iter().rev());
    }
    out
}

/// Outgoing non-containment references: `(feature, target)` pairs
pub fn cross_references(rs: &ResourceSet, object: ObjectId) -> Vec<(EStructuralFeature, ObjectId)> {
    let object = rs.effective(object);
    let (Ok(class), Ok(data)) = (rs.class_of(object), rs.object_data(object)) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for feature in class.all_references() {
        if feature.is_containment() || feature.is_container() || feature.derivation().is_some() {
            continue;
        }
        let targets = match data.slots.get(&feature) {
            Some(Slot::Single(v)) => v.objects(),
            Some(Slot::Many(list)) => list.iter().filter_map(Value::as_object).collect(),
            None => Vec::new(),
        };
        out.extend(targets.into_iter().map(|t| (feature.clone(), rs.effective(t))));
    }
    out
}

/// Objects holding a non-opposite, non-containment reference to `object`
pub fn inverse_references(rs: &ResourceSet, object: ObjectId) -> Vec<(ObjectId, EStructuralFeature)> {
    rs.object_data(rs.effective(object))
        .map(|d| d.inverse_rels.clone())
        .unwrap_or_default()
}

/// Whether the handle is a proxy (resolved or not)
pub fn is_proxy(rs: &ResourceSet, object: ObjectId) -> bool {
    rs.object_data(object).is_ok_and(|d| d.proxy.is_some())
}

/// Target URI (`uri#fragment`) of a proxy
pub fn proxy_uri(rs: &ResourceSet, object: ObjectId) -> Option<String> {
    rs.object_data(object)
        .ok()
        .and_then(|d| d.proxy.as_ref().map(|p| p.target_uri()))
}

/// Fragment addressing the object inside its resource
///
/// Explicit ids win, then the class ID attribute, then the positional path.
/// `None` when the object is not in a resource.
pub fn uri_fragment(rs: &ResourceSet, object: ObjectId) -> Option<String> {
    fragment::fragment_of(rs, object)
}

/// `uri#fragment` of an object in a resource
pub fn uri_of(rs: &ResourceSet, object: ObjectId) -> Option<String> {
    if let Some(uri) = proxy_uri(rs, object).filter(|_| rs.effective(object) == object) {
        return Some(uri);
    }
    let resource = rs.resource_id_of(object)?;
    let uri = rs.resource(resource).ok()?.uri().to_string();
    Some(format!("{}#{}", uri, uri_fragment(rs, object)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, make_class, make_package};
    use crate::ops::{collection_ops, object_ops, reflect_ops, resource_ops};

    #[test]
    fn test_all_contents_is_preorder() {
        let pkg = make_package("nav", "http://navigation.test", "nav");
        let node = make_class(&pkg, "Node");
        add_feature(&node, EStructuralFeature::containment("kids", &node).many()).unwrap();
        let mut rs = ResourceSet::new();
        let root_node = object_ops::create(&mut rs, &node).unwrap();
        let a = object_ops::create_in(&mut rs, root_node, "kids", &node).unwrap();
        let a1 = object_ops::create_in(&mut rs, a, "kids", &node).unwrap();
        let b = object_ops::create_in(&mut rs, root_node, "kids", &node).unwrap();

        assert_eq!(all_contents(&rs, root_node), vec![a, a1, b]);
        assert_eq!(root(&rs, a1), root_node);
        assert!(is_ancestor(&rs, root_node, a1));
        assert!(!is_ancestor(&rs, b, a1));
    }

    #[test]
    fn test_positional_fragment() {
        let pkg = make_package("nav", "http://navigation.test/frag", "nav");
        let node = make_class(&pkg, "Node");
        add_feature(&node, EStructuralFeature::containment("kids", &node).many()).unwrap();
        add_feature(&node, EStructuralFeature::containment("only", &node)).unwrap();
        let mut rs = ResourceSet::new();
        let res = resource_ops::create_resource(&mut rs, "nav.json").unwrap();
        let first = object_ops::create(&mut rs, &node).unwrap();
        let second = object_ops::create(&mut rs, &node).unwrap();
        resource_ops::append(&mut rs, res, first).unwrap();
        resource_ops::append(&mut rs, res, second).unwrap();
        let kid = object_ops::create(&mut rs, &node).unwrap();
        collection_ops::append(&mut rs, second, "kids", kid).unwrap();
        let only = object_ops::create(&mut rs, &node).unwrap();
        reflect_ops::set(&mut rs, kid, "only", only).unwrap();

        assert_eq!(uri_fragment(&rs, second).as_deref(), Some("/1"));
        assert_eq!(uri_fragment(&rs, only).as_deref(), Some("/1/@kids.0/only"));
        assert_eq!(uri_of(&rs, kid).as_deref(), Some("nav.json#/1/@kids.0"));
        assert_eq!(resource_ops::resolve(&rs, res, "/1/@kids.0/only").unwrap(), Some(only));
    }
}
