//! Model deserializer: document tree to resource contents
//!
//! Two passes. The first builds every object and containment edge and
//! decodes attributes; non-containment references are collected as raw
//! strings. The second resolves them: same-resource fragments to objects,
//! anything else to proxies. References with an opposite are installed
//! last, both ends at once, without the usual two-way sync.
//!
//! The reader writes through the journaled primitives so a failed load can
//! be reverted by the caller's frame. It queues no notifications.

use std::collections::HashMap;

use crate::errors::{ModelError, Result};
use crate::meta::{EClass, EStructuralFeature};
use crate::model::{uri, Containment, ObjectId, ResourceId, Slot};
use crate::ops::{object_ops, proxy_ops, ResourceSet};
use crate::persistence::writer::XMI_WRAPPER;
use crate::persistence::{fragment, DocNode};
use crate::value::Value;

/// A non-containment reference waiting for pass two
#[derive(Debug)]
struct Deferred {
    owner: ObjectId,
    feature: EStructuralFeature,
    tokens: Vec<String>,
    line: Option<usize>,
}

/// Populate an empty resource from a document tree
///
/// Returns the proxies created for references that leave the resource.
///
/// # Errors
///
/// `UnexpectedRoot` for a root that is neither an object element nor an
/// `xmi:XMI` wrapper; `UnknownType` / `UnknownFeature` (with the source
/// line when known); `AbstractInstantiation`; `BadValue` for attribute text
/// that does not decode.
pub fn read_resource(rs: &mut ResourceSet, resource: ResourceId, root: &DocNode) -> Result<Vec<ObjectId>> {
    let uri = rs.normalize_uri(rs.resource(resource)?.uri());
    let mut reader = ModelReader {
        rs,
        resource,
        uri,
        namespaces: root
            .namespaces()
            .map(|(p, u)| (p.to_string(), u.to_string()))
            .collect(),
        deferred: Vec::new(),
        proxies: HashMap::new(),
        created_proxies: Vec::new(),
    };
    let roots: Vec<&DocNode> = if root.tag == XMI_WRAPPER {
        root.children.iter().collect()
    } else if root.prefix().is_some() {
        vec![root]
    } else {
        return Err(ModelError::UnexpectedRoot { tag: root.tag.clone() });
    };
    for node in roots {
        let type_name = node.attr("xsi:type").unwrap_or(&node.tag);
        let class = reader.resolve_class(type_name, node.line)?;
        let object = object_ops::create(reader.rs, &class)?;
        let len = reader.rs.resource(resource)?.contents().len();
        reader.rs.root_insert(resource, len, object);
        reader.rs.set_root_resource(object, Some(resource));
        reader.read_object(object, &class, node)?;
    }
    reader.resolve_deferred()?;
    Ok(reader.created_proxies)
}

struct ModelReader<'a> {
    rs: &'a mut ResourceSet,
    resource: ResourceId,
    uri: String,
    namespaces: HashMap<String, String>,
    deferred: Vec<Deferred>,
    proxies: HashMap<String, ObjectId>,
    created_proxies: Vec<ObjectId>,
}

impl ModelReader<'_> {
    /// Resolve `prefix:Name` through the document's namespace declarations
    fn resolve_class(&self, qualified: &str, line: Option<usize>) -> Result<EClass> {
        let unknown = || ModelError::UnknownType {
            name: qualified.to_string(),
            line,
        };
        let (prefix, name) = qualified.split_once(':').ok_or_else(unknown)?;
        let package = match self.namespaces.get(prefix) {
            Some(ns_uri) => self.rs.registry().get(ns_uri).ok_or_else(|| ModelError::UnknownType {
                name: ns_uri.clone(),
                line,
            })?,
            None => self.rs.registry().by_prefix(prefix).ok_or_else(unknown)?,
        };
        package
            .lookup_classifier(name)
            .and_then(|c| c.as_class().cloned())
            .ok_or_else(unknown)
    }

    fn feature(&self, class: &EClass, name: &str, line: Option<usize>) -> Result<EStructuralFeature> {
        class.lookup_feature(name).ok_or_else(|| ModelError::UnknownFeature {
            class: class.name(),
            feature: name.to_string(),
            line,
        })
    }

    fn read_object(&mut self, object: ObjectId, class: &EClass, node: &DocNode) -> Result<()> {
        for (name, value) in &node.attributes {
            if name == "xsi:type" || name == "xmi:version" || name.starts_with("xmlns") {
                continue;
            }
            if name == "xmi:id" {
                self.rs.set_xmi_id(object, Some(value.clone()));
                self.rs.id_map_put(self.resource, value, Some(object));
                continue;
            }
            let feature = self.feature(class, name, node.line)?;
            if feature.is_attribute() {
                self.read_attribute(object, &feature, value)?;
            } else if feature.is_containment() {
                return Err(ModelError::malformed(
                    format!("containment '{}' written as an attribute", name),
                    node.line,
                ));
            } else {
                self.deferred.push(Deferred {
                    owner: object,
                    feature,
                    tokens: value.split_whitespace().map(str::to_string).collect(),
                    line: node.line,
                });
            }
        }
        for child in &node.children {
            let feature = self.feature(class, child.local_name(), child.line)?;
            if feature.is_attribute() {
                let data_type = feature.data_type()?;
                let value = data_type.from_string(child.text.as_deref().unwrap_or(""))?;
                self.install_attribute(object, &feature, value);
            } else if feature.is_containment() {
                self.read_child(object, &feature, child)?;
            } else {
                let href = child.attr("href").ok_or_else(|| {
                    ModelError::malformed(format!("reference element '{}' has no href", child.tag), child.line)
                })?;
                self.deferred.push(Deferred {
                    owner: object,
                    feature,
                    tokens: vec![href.to_string()],
                    line: child.line,
                });
            }
        }
        Ok(())
    }

    fn read_attribute(&mut self, object: ObjectId, feature: &EStructuralFeature, text: &str) -> Result<()> {
        let data_type = feature.data_type()?;
        if feature.is_many() {
            for token in text.split_whitespace() {
                let value = data_type.from_string(token)?;
                self.install_attribute(object, feature, value);
            }
            self.rs.set_flag(object, feature, true);
            return Ok(());
        }
        let value = data_type.from_string(text)?;
        self.install_attribute(object, feature, value);
        Ok(())
    }

    fn install_attribute(&mut self, object: ObjectId, feature: &EStructuralFeature, value: Value) {
        if feature.is_many() {
            let len = self.list_len(object, feature);
            self.rs.list_insert(object, feature, len, value);
        } else {
            self.rs.write_slot(object, feature, Some(Slot::Single(value)));
        }
        self.rs.set_flag(object, feature, true);
    }

    fn read_child(&mut self, parent: ObjectId, feature: &EStructuralFeature, node: &DocNode) -> Result<()> {
        if node.attr("href").is_some() {
            return Err(ModelError::malformed(
                format!("cross-document containment in '{}' is not supported", node.tag),
                node.line,
            ));
        }
        let class = match node.attr("xsi:type") {
            Some(type_name) => self.resolve_class(type_name, node.line)?,
            None => feature.reference_type()?,
        };
        let child = object_ops::create(self.rs, &class)?;
        self.link_raw(parent, feature, child);
        self.rs.set_container(
            child,
            Some(Containment {
                parent,
                feature: feature.clone(),
            }),
        );
        self.read_object(child, &class, node)
    }

    fn list_len(&self, object: ObjectId, feature: &EStructuralFeature) -> usize {
        self.rs
            .object_data(object)
            .ok()
            .and_then(|d| d.many(feature).map(|l| l.len()))
            .unwrap_or(0)
    }

    /// Install `owner.feature -> target` without bookkeeping; no-op when
    /// already present
    fn link_raw(&mut self, owner: ObjectId, feature: &EStructuralFeature, target: ObjectId) {
        let entry = Value::Object(target);
        if feature.is_many() {
            let rs: &ResourceSet = self.rs;
            let present = rs
                .object_data(owner)
                .ok()
                .and_then(|d| d.many(feature))
                .is_some_and(|l| {
                    l.iter()
                        .any(|v| v.as_object().is_some_and(|o| proxy_ops::designates(rs, o, target)))
                });
            if !present {
                let len = self.list_len(owner, feature);
                self.rs.list_insert(owner, feature, len, entry);
            }
        } else {
            self.rs.write_slot(owner, feature, Some(Slot::Single(entry)));
        }
        self.rs.set_flag(owner, feature, true);
    }

    fn resolve_deferred(&mut self) -> Result<()> {
        let deferred = std::mem::take(&mut self.deferred);
        let (plain, opposites): (Vec<_>, Vec<_>) = deferred.into_iter().partition(|d| d.feature.opposite().is_none());
        for entry in plain.into_iter().chain(opposites) {
            let declared = entry.feature.reference_type()?;
            for token in &entry.tokens {
                let target = self.resolve_token(token, &declared);
                self.check_type(&entry, &declared, target)?;
                self.install_reference(&entry, target);
            }
        }
        Ok(())
    }

    fn check_type(&self, entry: &Deferred, declared: &EClass, target: ObjectId) -> Result<()> {
        let actual = self.rs.class_of(target)?;
        if self.is_proxy(target) || declared.is_super_type_of(&actual) {
            return Ok(());
        }
        Err(ModelError::malformed(
            format!(
                "'{}' expects {} but the document points at a {}",
                entry.feature.name(),
                declared.name(),
                actual.name()
            ),
            entry.line,
        ))
    }

    fn is_proxy(&self, object: ObjectId) -> bool {
        self.rs.object_data(object).is_ok_and(|d| d.proxy.is_some())
    }

    fn install_reference(&mut self, entry: &Deferred, target: ObjectId) {
        let Deferred { owner, feature, .. } = entry;
        self.link_raw(*owner, feature, target);
        match feature.opposite() {
            Some(opposite) if !self.is_proxy(target) => {
                if opposite.is_many() {
                    self.link_raw(target, &opposite, *owner);
                } else {
                    self.rs.write_slot(target, &opposite, Some(Slot::Single(Value::Object(*owner))));
                    self.rs.set_flag(target, &opposite, true);
                }
            }
            _ => self.rs.add_inverse(target, *owner, feature),
        }
    }

    /// `fragment`, `#fragment` or `uri#fragment`
    fn resolve_token(&mut self, token: &str, declared: &EClass) -> ObjectId {
        let (uri_part, frag) = token.split_once('#').unwrap_or(("", token));
        let target_uri = if uri_part.is_empty() {
            self.uri.clone()
        } else {
            self.rs.normalize_uri(&uri::resolve(&self.uri, uri_part))
        };
        if target_uri == self.uri {
            if let Some(found) = fragment::resolve(self.rs, self.resource, frag) {
                return found;
            }
        }
        let key = format!("{}#{}", target_uri, frag);
        if let Some(proxy) = self.proxies.get(&key) {
            return *proxy;
        }
        let proxy = object_ops::create_proxy(self.rs, declared, &target_uri, frag);
        self.proxies.insert(key, proxy);
        self.created_proxies.push(proxy);
        proxy
    }
}
