//! Intra-resource addressing
//!
//! ```text
//! fragment := id | path
//! path     := "/" root ( "/" step )*
//! root     := "" | index | root-name
//! step     := name | "@" name "." index
//! ```
//!
//! An empty root selector means the first root. `name` selects a
//! single-valued containment, `@name.index` an element of a many-valued one.

use crate::model::{ObjectId, ResourceId, Slot};
use crate::ops::{navigation, object_ops, ResourceSet};
use crate::value::Value;

/// Fragment of an object inside its resource; `None` when it is in none
///
/// The explicit document id wins, then the class ID attribute, then the
/// positional path.
pub fn fragment_of(rs: &ResourceSet, object: ObjectId) -> Option<String> {
    let object = rs.effective(object);
    let resource = rs.resource_id_of(object)?;
    if let Some(id) = object_ops::id_of(rs, object) {
        return Some(id);
    }
    if let Some(id) = object_ops::id_attribute_value(rs, object) {
        return Some(id);
    }
    positional(rs, resource, object)
}

/// The positional path, ignoring ids
pub fn positional(rs: &ResourceSet, resource: ResourceId, object: ObjectId) -> Option<String> {
    let mut steps = Vec::new();
    let mut current = rs.effective(object);
    while let Some(containment) = rs.object_data(current).ok()?.container.clone() {
        let feature = containment.feature;
        if feature.is_many() {
            let index = rs
                .object_data(containment.parent)
                .ok()?
                .many(&feature)?
                .index_of(&Value::Object(current))?;
            steps.push(format!("@{}.{}", feature.name(), index));
        } else {
            steps.push(feature.name());
        }
        current = containment.parent;
    }
    let index = rs.resource(resource).ok()?.contents().iter().position(|r| *r == current)?;
    let mut path = format!("/{}", index);
    for step in steps.iter().rev() {
        path.push('/');
        path.push_str(step);
    }
    Some(path)
}

/// Object addressed by `fragment` in a resource
///
/// Unknown ids, out-of-range indices and unknown names yield `None`.
pub fn resolve(rs: &ResourceSet, resource: ResourceId, fragment: &str) -> Option<ObjectId> {
    let res = rs.resource(resource).ok()?;
    let Some(path) = fragment.strip_prefix('/') else {
        return resolve_id(rs, resource, fragment);
    };
    let mut steps = path.split('/');
    let selector = steps.next().unwrap_or("");
    let mut current = match selector {
        "" => *res.contents().first()?,
        s => match s.parse::<usize>() {
            Ok(index) => *res.contents().get(index)?,
            Err(_) => root_named(rs, res.contents(), s)?,
        },
    };
    for step in steps {
        if step.is_empty() {
            continue;
        }
        current = rs.effective(current);
        let class = rs.class_of(current).ok()?;
        let data = rs.object_data(current).ok()?;
        let (name, index) = match step.strip_prefix('@') {
            Some(rest) => match rest.rsplit_once('.') {
                Some((name, index)) => (name, Some(index.parse::<usize>().ok()?)),
                None => (rest, None),
            },
            None => (step, None),
        };
        let feature = class.lookup_feature(name)?;
        if !feature.is_containment() {
            return None;
        }
        current = match data.slots.get(&feature)? {
            Slot::Single(value) => value.as_object()?,
            Slot::Many(list) => list.get(index.unwrap_or(0))?.as_object()?,
        };
    }
    Some(rs.effective(current))
}

fn resolve_id(rs: &ResourceSet, resource: ResourceId, id: &str) -> Option<ObjectId> {
    let res = rs.resource(resource).ok()?;
    if let Some(object) = res.object_by_id(id) {
        return Some(object);
    }
    res.contents()
        .iter()
        .flat_map(|root| std::iter::once(*root).chain(navigation::all_contents(rs, *root)))
        .find(|o| object_ops::id_attribute_value(rs, *o).as_deref() == Some(id))
}

/// Root whose ID attribute or `name` feature equals `name`
fn root_named(rs: &ResourceSet, roots: &[ObjectId], name: &str) -> Option<ObjectId> {
    roots.iter().copied().find(|root| {
        if object_ops::id_attribute_value(rs, *root).as_deref() == Some(name) {
            return true;
        }
        rs.class_of(*root)
            .ok()
            .and_then(|c| c.lookup_feature("name"))
            .and_then(|f| rs.object_data(*root).ok()?.single(&f).cloned())
            .is_some_and(|v| v.as_str() == Some(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, ecore, make_class, make_package, EStructuralFeature};
    use crate::ops::{collection_ops, reflect_ops, resource_ops};

    #[test]
    fn test_id_attribute_and_root_name() {
        let pkg = make_package("frag", "http://fragment.test", "frag");
        let item = make_class(&pkg, "Item");
        add_feature(&item, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
        add_feature(&item, EStructuralFeature::attribute("code", &ecore::e_string()).id()).unwrap();
        add_feature(&item, EStructuralFeature::containment("parts", &item).many()).unwrap();
        let mut rs = ResourceSet::new();
        let res = resource_ops::create_resource(&mut rs, "frag.json").unwrap();
        let root = object_ops::create(&mut rs, &item).unwrap();
        reflect_ops::set(&mut rs, root, "name", "top").unwrap();
        resource_ops::append(&mut rs, res, root).unwrap();
        let part = object_ops::create(&mut rs, &item).unwrap();
        collection_ops::append(&mut rs, root, "parts", part).unwrap();

        assert_eq!(fragment_of(&rs, part).as_deref(), Some("/0/@parts.0"));
        assert_eq!(resolve(&rs, res, "//@parts.0"), Some(part));
        assert_eq!(resolve(&rs, res, "/top/@parts.0"), Some(part));
        assert_eq!(resolve(&rs, res, "/0/@parts.3"), None);

        reflect_ops::set(&mut rs, part, "code", "P-1").unwrap();
        assert_eq!(fragment_of(&rs, part).as_deref(), Some("P-1"));
        assert_eq!(resolve(&rs, res, "P-1"), Some(part));
    }
}
