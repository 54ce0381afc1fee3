//! Model serializer: resource contents to a document tree
//!
//! A single root becomes the document element; zero or several roots are
//! wrapped in `xmi:XMI`. Each object element carries `xsi:type` when its
//! class differs from the declared type of the feature that contains it.

use crate::errors::{ModelError, Result};
use crate::meta::{EClass, EPackage, EStructuralFeature};
use crate::model::{uri, ObjectId, ResourceId, Slot};
use crate::ops::{navigation, ResourceSet};
use crate::persistence::{fragment, DocNode, SaveOptions};
use crate::value::{Value, ValueKind};

pub const XMI_NS: &str = "http://www.omg.org/XMI";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XMI_VERSION: &str = "2.0";
pub const XMI_WRAPPER: &str = "xmi:XMI";

/// Result of serializing one resource
#[derive(Debug, Clone)]
pub struct Written {
    pub root: DocNode,
    /// References that could not be written (targets outside any resource)
    pub warnings: Vec<String>,
}

/// Serialize the contents of a resource
///
/// # Errors
///
/// `UnknownType` when an object's class belongs to no package, `BadValue`
/// when an attribute value has no string form.
pub fn write_resource(rs: &ResourceSet, resource: ResourceId, options: &SaveOptions) -> Result<Written> {
    let res = rs.resource(resource)?;
    let mut writer = ModelWriter {
        rs,
        resource,
        uri: rs.normalize_uri(res.uri()),
        options,
        packages: Vec::new(),
        warnings: Vec::new(),
    };
    let roots = res.contents().to_vec();
    let root = if roots.len() == 1 {
        let class = rs.class_of(roots[0])?;
        let tag = writer.qualified_name(&class)?;
        let node = writer.write_object(roots[0], tag, None)?;
        writer.with_header(node)
    } else {
        let mut wrapper = DocNode::new(XMI_WRAPPER);
        for object in roots {
            let class = rs.class_of(object)?;
            let tag = writer.qualified_name(&class)?;
            wrapper.push(writer.write_object(object, tag, None)?);
        }
        writer.with_header(wrapper)
    };
    Ok(Written {
        root,
        warnings: writer.warnings,
    })
}

struct ModelWriter<'a> {
    rs: &'a ResourceSet,
    resource: ResourceId,
    uri: String,
    options: &'a SaveOptions,
    packages: Vec<EPackage>,
    warnings: Vec<String>,
}

impl ModelWriter<'_> {
    /// `prefix:Name`, recording the package for the namespace header
    fn qualified_name(&mut self, class: &EClass) -> Result<String> {
        let package = class.package().ok_or_else(|| ModelError::UnknownType {
            name: class.name(),
            line: None,
        })?;
        let prefix = package.ns_prefix();
        if !self.packages.contains(&package) {
            self.packages.push(package);
        }
        Ok(format!("{}:{}", prefix, class.name()))
    }

    fn with_header(&self, mut node: DocNode) -> DocNode {
        let mut header = vec![
            ("xmi:version".to_string(), XMI_VERSION.to_string()),
            ("xmlns:xmi".to_string(), XMI_NS.to_string()),
            ("xmlns:xsi".to_string(), XSI_NS.to_string()),
        ];
        for package in &self.packages {
            header.push((format!("xmlns:{}", package.ns_prefix()), package.ns_uri()));
        }
        header.append(&mut node.attributes);
        node.attributes = header;
        node
    }

    fn write_object(&mut self, object: ObjectId, tag: String, declared: Option<&EClass>) -> Result<DocNode> {
        let rs = self.rs;
        let class = rs.class_of(object)?;
        let data = rs.object_data(object)?;
        let mut node = DocNode::new(tag);
        if declared.is_some_and(|d| *d != class) {
            let type_name = self.qualified_name(&class)?;
            node.set_attr("xsi:type", type_name);
        }
        if let Some(id) = &data.xmi_id {
            node.set_attr("xmi:id", id.clone());
        }
        for feature in class.all_features() {
            if feature.is_transient() || feature.is_derived() || feature.derivation().is_some() || feature.is_container() {
                continue;
            }
            let is_set = data.set_features.contains(&feature);
            if feature.is_attribute() {
                if is_set || (self.options.emit_defaults && !feature.is_many()) {
                    self.write_attribute(&mut node, object, &feature)?;
                }
            } else if is_set {
                let targets = match data.slots.get(&feature) {
                    Some(Slot::Single(v)) => v.objects(),
                    Some(Slot::Many(list)) => list.iter().filter_map(Value::as_object).collect(),
                    None => Vec::new(),
                };
                if feature.is_containment() {
                    let declared = feature.reference_type()?;
                    for child in targets {
                        let element = self.write_object(child, feature.name(), Some(&declared))?;
                        node.push(element);
                    }
                } else {
                    self.write_reference(&mut node, object, &feature, targets);
                }
            }
        }
        Ok(node)
    }

    fn write_attribute(&self, node: &mut DocNode, object: ObjectId, feature: &EStructuralFeature) -> Result<()> {
        let data_type = feature.data_type()?;
        let value = crate::ops::reflect_ops::peek(self.rs, object, feature)?;
        match value {
            Value::Null => {}
            Value::List(items) => {
                if items.is_empty() {
                    return Ok(());
                }
                if data_type.kind() == ValueKind::String {
                    for item in &items {
                        node.push(DocNode::new(feature.name()).with_text(data_type.to_string(item)?));
                    }
                } else {
                    let encoded = items
                        .iter()
                        .map(|v| data_type.to_string(v))
                        .collect::<Result<Vec<_>>>()?;
                    node.set_attr(feature.name(), encoded.join(" "));
                }
            }
            single => node.set_attr(feature.name(), data_type.to_string(&single)?),
        }
        Ok(())
    }

    /// Same-resource targets become a fragment attribute; if any target lives
    /// elsewhere every target is written as an `href` child instead
    fn write_reference(&mut self, node: &mut DocNode, owner: ObjectId, feature: &EStructuralFeature, targets: Vec<ObjectId>) {
        let mut refs = Vec::with_capacity(targets.len());
        for target in targets {
            match self.reference_text(target) {
                Some(text) => refs.push(text),
                None => self.warnings.push(format!(
                    "{}.{}: target {} is not in a resource",
                    owner,
                    feature.name(),
                    target
                )),
            }
        }
        if refs.is_empty() {
            return;
        }
        if refs.iter().all(|(_, local)| *local) {
            let joined: Vec<String> = refs.into_iter().map(|(t, _)| t).collect();
            node.set_attr(feature.name(), joined.join(" "));
        } else {
            for (text, local) in refs {
                let href = if local { format!("#{}", text) } else { text };
                node.push(DocNode::new(feature.name()).with_attr("href", href));
            }
        }
    }

    /// Reference text and whether it is a bare same-resource fragment
    fn reference_text(&self, target: ObjectId) -> Option<(String, bool)> {
        let rs = self.rs;
        let effective = rs.effective(target);
        if effective == target && navigation::is_proxy(rs, target) {
            let proxy = rs.object_data(target).ok()?.proxy.clone()?;
            return Some((format!("{}#{}", self.relative(&proxy.uri), proxy.fragment), false));
        }
        let resource = rs.resource_id_of(effective)?;
        let frag = fragment::fragment_of(rs, effective)?;
        if resource == self.resource {
            return Some((frag, true));
        }
        let target_uri = rs.resource(resource).ok()?.uri().to_string();
        Some((format!("{}#{}", self.relative(&target_uri), frag), false))
    }

    /// Mapped form when a URI-mapper entry matches, else relative to this
    /// resource
    fn relative(&self, target_uri: &str) -> String {
        match self.rs.uri_mapper().unmap(target_uri) {
            Some(mapped) => mapped,
            None => uri::relativize(&self.uri, target_uri),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, add_supertype, ecore, make_abstract_class, make_class, make_package};
    use crate::ops::{collection_ops, object_ops, reflect_ops, resource_ops};

    #[test]
    fn test_type_discriminator_and_header() {
        let pkg = make_package("zoo", "http://writer.test/zoo", "zoo");
        let animal = make_abstract_class(&pkg, "Animal");
        let cat = make_class(&pkg, "Cat");
        add_supertype(&cat, &animal).unwrap();
        let zoo = make_class(&pkg, "Zoo");
        add_feature(&zoo, EStructuralFeature::containment("animals", &animal).many()).unwrap();
        add_feature(&zoo, EStructuralFeature::attribute("tags", &ecore::e_string()).many()).unwrap();
        add_feature(&zoo, EStructuralFeature::attribute("sizes", &ecore::e_int()).many()).unwrap();
        let mut rs = ResourceSet::new();
        let res = resource_ops::create_resource(&mut rs, "zoo.json").unwrap();
        let z = object_ops::create(&mut rs, &zoo).unwrap();
        resource_ops::append(&mut rs, res, z).unwrap();
        object_ops::create_in(&mut rs, z, "animals", &cat).unwrap();
        collection_ops::extend(&mut rs, z, "tags", vec!["a".into(), "b".into()]).unwrap();
        collection_ops::extend(&mut rs, z, "sizes", vec![Value::Int(1), Value::Int(2)]).unwrap();

        let written = write_resource(&rs, res, &SaveOptions::default()).unwrap();
        let root = written.root;
        assert_eq!(root.tag, "zoo:Zoo");
        assert_eq!(root.attr("xmlns:zoo"), Some("http://writer.test/zoo"));
        assert_eq!(root.attr("sizes"), Some("1 2"));
        let animal_node = root.children.iter().find(|c| c.tag == "animals").unwrap();
        assert_eq!(animal_node.attr("xsi:type"), Some("zoo:Cat"));
        let tags: Vec<_> = root.children.iter().filter(|c| c.tag == "tags").map(|c| c.text.clone()).collect();
        assert_eq!(tags, vec![Some("a".to_string()), Some("b".to_string())]);
    }

    #[test]
    fn test_dangling_reference_is_warned() {
        let pkg = make_package("w", "http://writer.test/dangling", "w");
        let item = make_class(&pkg, "Item");
        add_feature(&item, EStructuralFeature::reference("other", &item)).unwrap();
        let mut rs = ResourceSet::new();
        let res = resource_ops::create_resource(&mut rs, "w.json").unwrap();
        let a = object_ops::create(&mut rs, &item).unwrap();
        let b = object_ops::create(&mut rs, &item).unwrap();
        resource_ops::append(&mut rs, res, a).unwrap();
        reflect_ops::set(&mut rs, a, "other", b).unwrap();

        let written = write_resource(&rs, res, &SaveOptions::default()).unwrap();
        assert_eq!(written.root.attr("other"), None);
        assert_eq!(written.warnings.len(), 1);
    }

    #[test]
    fn test_empty_resource_is_wrapped() {
        let mut rs = ResourceSet::new();
        let res = resource_ops::create_resource(&mut rs, "empty.json").unwrap();

        let written = write_resource(&rs, res, &SaveOptions::default()).unwrap();
        assert_eq!(written.root.tag, XMI_WRAPPER);
        assert!(written.root.children.is_empty());
    }
}
