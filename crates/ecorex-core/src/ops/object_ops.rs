use crate::errors::{ModelError, Result};
use crate::meta::EClass;
use crate::model::{ObjectId, ProxyState};
use crate::ops::reflect_ops::FeatureKey;
use crate::ops::{atomically, collection_ops, navigation, proxy_ops, reflect_ops, ResourceSet};
use crate::value::Value;

/// Instantiate a class
///
/// The new object has no container, no resource and no set features.
///
/// # Arguments
/// * `rs` - Resource set that will own the object
/// * `class` - Concrete class to instantiate
///
/// # Errors
/// * `AbstractInstantiation` - If the class is abstract or an interface
pub fn create(rs: &mut ResourceSet, class: &EClass) -> Result<ObjectId> {
    if class.is_abstract() || class.is_interface() {
        return Err(ModelError::AbstractInstantiation { class: class.name() });
    }
    Ok(rs.alloc_object(class))
}

/// Instantiate a class and add it to `parent.feature`
///
/// # Errors
/// * `AbstractInstantiation` - If the class is abstract
/// * `BadValue` - If the feature is not a containment of a compatible type
pub fn create_in(
    rs: &mut ResourceSet,
    parent: ObjectId,
    feature: impl FeatureKey,
    class: &EClass,
) -> Result<ObjectId> {
    let parent = proxy_ops::deref(rs, parent)?;
    let feature = feature.resolve_in(&rs.class_of(parent)?)?;
    if !feature.is_containment() {
        return Err(ModelError::bad_value(feature.name(), "not a containment reference"));
    }
    let child = create(rs, class)?;
    if feature.is_many() {
        collection_ops::append(rs, parent, &feature, child)?;
    } else {
        reflect_ops::set(rs, parent, &feature, child)?;
    }
    Ok(child)
}

/// Create a placeholder for the object at `uri#fragment`
///
/// `class` is the declared type; it may be abstract. Nothing is loaded until
/// the proxy is touched.
pub fn create_proxy(rs: &mut ResourceSet, class: &EClass, uri: &str, fragment: &str) -> ObjectId {
    let id = rs.alloc_object(class);
    rs.raw_set_proxy(
        id,
        Some(ProxyState {
            uri: uri.to_string(),
            fragment: fragment.to_string(),
            resolved: None,
        }),
    );
    id
}

/// Assign an explicit document id, used as the object's fragment
///
/// # Errors
/// * `ObjectNotFound` - For a foreign handle
pub fn set_id(rs: &mut ResourceSet, object: ObjectId, id: Option<&str>) -> Result<()> {
    let object = proxy_ops::deref(rs, object)?;
    atomically(rs, |rs| {
        let resource = rs.resource_id_of(object);
        let previous = rs.object_data(object)?.xmi_id.clone();
        if let (Some(resource), Some(previous)) = (resource, previous.as_deref()) {
            rs.id_map_put(resource, previous, None);
        }
        rs.set_xmi_id(object, id.map(str::to_string));
        if let (Some(resource), Some(id)) = (resource, id) {
            rs.id_map_put(resource, id, Some(object));
        }
        Ok(())
    })
}

/// Explicit document id of an object
pub fn id_of(rs: &ResourceSet, object: ObjectId) -> Option<String> {
    rs.object_data(rs.effective(object)).ok().and_then(|d| d.xmi_id.clone())
}

/// Value of the class ID attribute, rendered as a string
pub fn id_attribute_value(rs: &ResourceSet, object: ObjectId) -> Option<String> {
    let object = rs.effective(object);
    let class = rs.class_of(object).ok()?;
    let feature = class.id_attribute()?;
    let value = rs.object_data(object).ok()?.single(&feature)?.clone();
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => feature.data_type().ok()?.to_string(&other).ok(),
    }
}

/// Copy an object's attribute values and containment subtree
///
/// Non-containment references inside the copied subtree are redirected to
/// the copies; references leaving the subtree point at the original targets.
///
/// # Errors
/// * `AbstractInstantiation`, `BadValue` - Propagated from the writes
pub fn copy(rs: &mut ResourceSet, object: ObjectId) -> Result<ObjectId> {
    let object = proxy_ops::deref(rs, object)?;
    atomically(rs, |rs| {
        let mut originals = vec![object];
        originals.extend(navigation::all_contents(rs, object));
        let mut copies = std::collections::HashMap::new();
        for original in &originals {
            let class = rs.class_of(*original)?;
            copies.insert(*original, rs.alloc_object(&class));
        }
        let mapped = |v: Value| match v {
            Value::Object(id) => Value::Object(copies.get(&id).copied().unwrap_or(id)),
            other => other,
        };
        for original in &originals {
            let class = rs.class_of(*original)?;
            let copy = copies[original];
            for feature in class.all_features() {
                if feature.is_derived() || feature.is_container() {
                    continue;
                }
                if !rs.object_data(*original)?.set_features.contains(&feature) {
                    continue;
                }
                let value = reflect_ops::peek(rs, *original, &feature)?;
                if feature.opposite().is_some() && !feature.is_containment() {
                    // only edges inside the subtree, each created once from whichever end comes first
                    for target in value.objects() {
                        let Some(target_copy) = copies.get(&target).copied() else {
                            continue;
                        };
                        if reflect_ops::peek(rs, copy, &feature)?.objects().contains(&target_copy) {
                            continue;
                        }
                        if feature.is_many() {
                            collection_ops::insert_inner(rs, copy, &feature, None, Value::Object(target_copy))?;
                        } else {
                            reflect_ops::set_single(rs, copy, &feature, Value::Object(target_copy))?;
                        }
                    }
                    continue;
                }
                match value {
                    Value::List(items) => {
                        let items = items.into_iter().map(mapped).collect();
                        collection_ops::replace_all(rs, copy, &feature, items)?;
                        rs.set_flag(copy, &feature, true);
                    }
                    other => reflect_ops::set_single(rs, copy, &feature, mapped(other))?,
                }
            }
        }
        Ok(copies[&object])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, ecore, make_abstract_class, make_class, make_package, EStructuralFeature};
    use crate::ops::resource_ops;

    #[test]
    fn test_create_abstract_fails() {
        let pkg = make_package("o", "http://objects.test", "o");
        let shape = make_abstract_class(&pkg, "Shape");
        let mut rs = ResourceSet::new();

        let err = create(&mut rs, &shape).unwrap_err();
        assert!(matches!(err, ModelError::AbstractInstantiation { .. }));
    }

    #[test]
    fn test_set_id_registers_in_resource() {
        let pkg = make_package("o", "http://objects.test/ids", "o");
        let item = make_class(&pkg, "Item");
        let mut rs = ResourceSet::new();
        let res = resource_ops::create_resource(&mut rs, "ids.json").unwrap();
        let obj = create(&mut rs, &item).unwrap();
        resource_ops::append(&mut rs, res, obj).unwrap();

        set_id(&mut rs, obj, Some("item-1")).unwrap();
        assert_eq!(rs.resource(res).unwrap().object_by_id("item-1"), Some(obj));

        set_id(&mut rs, obj, Some("item-2")).unwrap();
        assert_eq!(rs.resource(res).unwrap().object_by_id("item-1"), None);
        assert_eq!(id_of(&rs, obj).as_deref(), Some("item-2"));
    }

    #[test]
    fn test_copy_redirects_internal_references() {
        let pkg = make_package("o", "http://objects.test/copy", "o");
        let node = make_class(&pkg, "Node");
        add_feature(&node, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
        add_feature(&node, EStructuralFeature::containment("kids", &node).many()).unwrap();
        add_feature(&node, EStructuralFeature::reference("buddy", &node)).unwrap();
        let mut rs = ResourceSet::new();
        let root = create(&mut rs, &node).unwrap();
        let kid = create_in(&mut rs, root, "kids", &node).unwrap();
        reflect_ops::set(&mut rs, kid, "name", "k").unwrap();
        reflect_ops::set(&mut rs, root, "buddy", kid).unwrap();

        let clone = copy(&mut rs, root).unwrap();

        let kids = reflect_ops::get(&mut rs, clone, "kids").unwrap().objects();
        assert_eq!(kids.len(), 1);
        assert_ne!(kids[0], kid);
        assert_eq!(reflect_ops::get(&mut rs, kids[0], "name").unwrap(), Value::from("k"));
        assert_eq!(reflect_ops::get(&mut rs, clone, "buddy").unwrap(), Value::Object(kids[0]));
    }
}
