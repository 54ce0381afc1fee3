//! Metamodel documents
//!
//! An `.ecore` document holds one `ecore:EPackage` tree. Meta-entities are
//! written through their [`MetaObject`] attributes (defaults omitted, `name`
//! first); structural links become child elements. Type references inside
//! the document use `#//Name` fragments, references into other packages
//! use `nsURI#//Name`, optionally preceded by a type hint such as
//! `ecore:EDataType` which readers ignore.
//!
//! Reading is two-pass like model loading: pass one creates every package,
//! classifier, feature and operation; pass two binds types, super-types and
//! opposites once every name in the document is known.

use std::time::Instant;

use crate::errors::{ModelError, Result};
use crate::meta::ecore::{self, ECORE_NS_PREFIX, ECORE_NS_URI};
use crate::meta::{
    add_enum_literal, add_feature, add_supertype, EClass, EClassifier, EDataType, EGenericType,
    EOperation, EPackage, EParameter, EStructuralFeature, ETypeParameter, FeatureKind, MetaObject,
    Registry,
};
use crate::persistence::writer::{XMI_NS, XMI_VERSION, XMI_WRAPPER, XSI_NS};
use crate::persistence::DocNode;
use crate::value::{Value, ValueKind};
use crate::{log_op_end, log_op_error, log_op_start};

pub const PACKAGE_TAG: &str = "ecore:EPackage";

/// Feature attributes and the values that are not written
fn feature_defaults() -> Vec<(&'static str, Value)> {
    vec![
        ("ordered", Value::Bool(true)),
        ("unique", Value::Bool(true)),
        ("lowerBound", Value::Int(0)),
        ("upperBound", Value::Int(1)),
        ("changeable", Value::Bool(true)),
        ("volatile", Value::Bool(false)),
        ("transient", Value::Bool(false)),
        ("unsettable", Value::Bool(false)),
        ("derived", Value::Bool(false)),
        ("iD", Value::Bool(false)),
        ("containment", Value::Bool(false)),
        ("resolveProxies", Value::Bool(true)),
    ]
}

const BOOL_ATTRIBUTES: &[&str] = &[
    "abstract",
    "interface",
    "serializable",
    "ordered",
    "unique",
    "changeable",
    "volatile",
    "transient",
    "unsettable",
    "derived",
    "iD",
    "containment",
    "resolveProxies",
];

const INT_ATTRIBUTES: &[&str] = &["lowerBound", "upperBound", "value"];

/// Whether a document tree holds a metamodel rather than a model
pub fn is_metamodel(root: &DocNode) -> bool {
    root.tag == PACKAGE_TAG
        || (root.tag == XMI_WRAPPER
            && !root.children.is_empty()
            && root.children.iter().all(|c| c.tag == PACKAGE_TAG))
}

/// Write packages as a document tree; several packages share an `xmi:XMI`
/// wrapper
///
/// # Errors
///
/// `UnboundType` when a feature has no type.
pub fn write_packages(packages: &[EPackage]) -> Result<DocNode> {
    log_op_start!("ecore_save", packages = packages.len());
    let start = Instant::now();

    let result = write_packages_impl(packages).map_err(|e| {
        log_op_error!("ecore_save", e.clone(), duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;

    log_op_end!("ecore_save", duration_ms = start.elapsed().as_millis() as u64);
    Ok(result)
}

fn write_packages_impl(packages: &[EPackage]) -> Result<DocNode> {
    let mut root = match packages {
        [single] => PackageWriter { root: single }.package(single, PACKAGE_TAG)?,
        _ => {
            let mut wrapper = DocNode::new(XMI_WRAPPER);
            for package in packages {
                wrapper.push(PackageWriter { root: package }.package(package, PACKAGE_TAG)?);
            }
            wrapper
        }
    };
    let mut header = vec![
        ("xmi:version".to_string(), XMI_VERSION.to_string()),
        ("xmlns:xmi".to_string(), XMI_NS.to_string()),
        ("xmlns:xsi".to_string(), XSI_NS.to_string()),
        (format!("xmlns:{}", ECORE_NS_PREFIX), ECORE_NS_URI.to_string()),
    ];
    header.append(&mut root.attributes);
    root.attributes = header;
    Ok(root)
}

struct PackageWriter<'a> {
    root: &'a EPackage,
}

impl PackageWriter<'_> {
    fn package(&self, package: &EPackage, tag: &str) -> Result<DocNode> {
        let mut node = DocNode::new(tag);
        write_meta_attributes(&mut node, package, &["name", "nsURI", "nsPrefix"], &[]);
        for classifier in package.classifiers() {
            node.push(self.classifier(&classifier)?);
        }
        for sub in package.sub_packages() {
            node.push(self.package(&sub, "eSubpackages")?);
        }
        Ok(node)
    }

    fn classifier(&self, classifier: &EClassifier) -> Result<DocNode> {
        let mut node = DocNode::new("eClassifiers");
        match classifier {
            EClassifier::Class(class) => {
                node.set_attr("xsi:type", "ecore:EClass");
                write_meta_attributes(
                    &mut node,
                    class,
                    &["name", "abstract", "interface", "instanceClassName"],
                    &[("abstract", Value::Bool(false)), ("interface", Value::Bool(false))],
                );
                let supers: Vec<String> = class
                    .super_types()
                    .iter()
                    .map(|s| self.type_ref(&EClassifier::Class(s.clone())))
                    .collect();
                if !supers.is_empty() {
                    node.set_attr("eSuperTypes", supers.join(" "));
                }
                for parameter in class.type_parameters() {
                    node.push(self.type_parameter(&parameter));
                }
                for operation in class.operations() {
                    node.push(self.operation(&operation));
                }
                for feature in class.features() {
                    node.push(self.feature(&feature)?);
                }
            }
            EClassifier::DataType(data_type) if data_type.is_enum() => {
                node.set_attr("xsi:type", "ecore:EEnum");
                write_meta_attributes(&mut node, data_type, &["name"], &[]);
                for literal in data_type.literals() {
                    let mut child = DocNode::new("eLiterals");
                    write_meta_attributes(&mut child, &literal, &["name", "value", "literal"], &[]);
                    node.push(child);
                }
            }
            EClassifier::DataType(data_type) => {
                node.set_attr("xsi:type", "ecore:EDataType");
                write_meta_attributes(
                    &mut node,
                    data_type,
                    &["name", "instanceClassName", "serializable"],
                    &[("serializable", Value::Bool(true))],
                );
            }
        }
        Ok(node)
    }

    fn feature(&self, feature: &EStructuralFeature) -> Result<DocNode> {
        let mut node = DocNode::new("eStructuralFeatures");
        let type_hint = if feature.is_attribute() {
            "ecore:EAttribute"
        } else {
            "ecore:EReference"
        };
        node.set_attr("xsi:type", type_hint);
        let defaults = feature_defaults();
        let mut names = vec!["name"];
        names.extend(defaults.iter().map(|(n, _)| *n));
        names.push("defaultValueLiteral");
        write_meta_attributes(&mut node, feature, &names, &defaults);
        node.set_attr("eType", self.type_ref(&feature.e_type()?));
        if let Some(opposite) = feature.opposite() {
            if let Some(owner) = opposite.containing_class() {
                let class_ref = self.type_ref(&EClassifier::Class(owner));
                node.set_attr("eOpposite", format!("{}/{}", class_ref, opposite.name()));
            }
        }
        Ok(node)
    }

    fn operation(&self, operation: &EOperation) -> DocNode {
        let mut node = DocNode::new("eOperations");
        write_meta_attributes(
            &mut node,
            operation,
            &["name", "lowerBound", "upperBound"],
            &[("lowerBound", Value::Int(0)), ("upperBound", Value::Int(1))],
        );
        if let Some(e_type) = operation.e_type() {
            node.set_attr("eType", self.type_ref(&e_type));
        }
        for parameter in operation.type_parameters() {
            node.push(self.type_parameter(&parameter));
        }
        for parameter in operation.parameters() {
            node.push(self.parameter(&parameter));
        }
        node
    }

    fn parameter(&self, parameter: &EParameter) -> DocNode {
        let mut node = DocNode::new("eParameters");
        write_meta_attributes(
            &mut node,
            parameter,
            &["name", "lowerBound", "upperBound"],
            &[("lowerBound", Value::Int(0)), ("upperBound", Value::Int(1))],
        );
        if let Some(e_type) = parameter.e_type() {
            node.set_attr("eType", self.type_ref(&e_type));
        }
        node
    }

    fn type_parameter(&self, parameter: &ETypeParameter) -> DocNode {
        let mut node = DocNode::new("eTypeParameters").with_attr("name", parameter.name());
        for bound in parameter.bounds() {
            if let Some(classifier) = &bound.classifier {
                node.push(DocNode::new("eBounds").with_attr("eClassifier", self.type_ref(classifier)));
            }
        }
        node
    }

    /// `#//Sub/Name` inside the document, `[hint ]nsURI#//Name` outside
    fn type_ref(&self, classifier: &EClassifier) -> String {
        let Some(package) = classifier.package() else {
            return format!("#//{}", classifier.name());
        };
        if package.root_package() == *self.root {
            let mut path = vec![classifier.name()];
            let mut current = package;
            while let Some(parent) = current.super_package() {
                path.push(current.name());
                current = parent;
            }
            path.reverse();
            return format!("#//{}", path.join("/"));
        }
        let hint = match classifier {
            EClassifier::Class(_) => "ecore:EClass",
            EClassifier::DataType(d) if d.is_enum() => "ecore:EEnum",
            EClassifier::DataType(_) => "ecore:EDataType",
        };
        format!("{} {}", hint, classifier.uri())
    }
}

fn write_meta_attributes(node: &mut DocNode, entity: &impl MetaObject, names: &[&str], defaults: &[(&str, Value)]) {
    for name in names {
        let Some(value) = entity.meta_attribute(name) else {
            continue;
        };
        if defaults.iter().any(|(n, d)| n == name && *d == value) {
            continue;
        }
        let text = match value {
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            _ => continue,
        };
        node.set_attr(*name, text);
    }
}

// ----- reading -----

/// Pass-two work: a textual link and where it came from
enum Pending {
    FeatureType(EStructuralFeature, String, Option<usize>),
    Opposite(EStructuralFeature, String, Option<usize>),
    SuperTypes(EClass, String, Option<usize>),
    OperationType(EOperation, String, Option<usize>),
    ParameterType(EParameter, String, Option<usize>),
    Bound(ETypeParameter, String, Option<usize>),
}

/// Build packages from a metamodel document
///
/// Types outside the document are looked up in `registry`.
///
/// # Errors
///
/// `UnexpectedRoot` if the root is not a package, `UnknownType` for type
/// references that match nothing, `UnknownFeature` for unknown attributes,
/// `DocumentMalformed` for values that do not parse.
pub fn read_packages(root: &DocNode, registry: &Registry) -> Result<Vec<EPackage>> {
    log_op_start!("ecore_load", root_tag = %root.tag);
    let start = Instant::now();

    let packages = read_packages_impl(root, registry).map_err(|e| {
        log_op_error!("ecore_load", e.clone(), duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;

    log_op_end!(
        "ecore_load",
        duration_ms = start.elapsed().as_millis() as u64,
        packages = packages.len()
    );
    Ok(packages)
}

fn read_packages_impl(root: &DocNode, registry: &Registry) -> Result<Vec<EPackage>> {
    let nodes: Vec<&DocNode> = if root.tag == PACKAGE_TAG {
        vec![root]
    } else if is_metamodel(root) {
        root.children.iter().collect()
    } else {
        return Err(ModelError::UnexpectedRoot { tag: root.tag.clone() });
    };
    let mut packages = Vec::new();
    for node in nodes {
        let mut reader = PackageReader {
            registry,
            root: None,
            pending: Vec::new(),
        };
        let package = reader.package(node)?;
        reader.root = Some(package.clone());
        reader.link()?;
        packages.push(package);
    }
    Ok(packages)
}

struct PackageReader<'a> {
    registry: &'a Registry,
    root: Option<EPackage>,
    pending: Vec<Pending>,
}

impl PackageReader<'_> {
    fn package(&mut self, node: &DocNode) -> Result<EPackage> {
        let name = node.attr("name").unwrap_or_default();
        let package = EPackage::new(name, node.attr("nsURI").unwrap_or_default(), node.attr("nsPrefix").unwrap_or(name));
        for child in &node.children {
            match child.tag.as_str() {
                "eClassifiers" => {
                    let classifier = self.classifier(child)?;
                    package.add_classifier(classifier);
                }
                "eSubpackages" => {
                    let sub = self.package(child)?;
                    package.add_sub_package(&sub)?;
                }
                "eAnnotations" => {}
                other => return Err(unknown_child("EPackage", other, child.line)),
            }
        }
        Ok(package)
    }

    fn classifier(&mut self, node: &DocNode) -> Result<EClassifier> {
        let type_hint = node.attr("xsi:type").unwrap_or("ecore:EClass");
        match type_hint.rsplit(':').next().unwrap_or(type_hint) {
            "EClass" => self.class(node).map(EClassifier::Class),
            "EEnum" => {
                let enumeration = EDataType::new_enum(node.attr("name").unwrap_or_default());
                read_meta_attributes(&enumeration, node, &["xsi:type"])?;
                for (index, child) in node.children.iter().enumerate() {
                    if child.tag != "eLiterals" {
                        continue;
                    }
                    let value = match child.attr("value") {
                        Some(text) => parse_int("value", text, child.line)?,
                        None => index as i64,
                    };
                    let literal = add_enum_literal(&enumeration, child.attr("name").unwrap_or_default(), value);
                    if let Some(text) = child.attr("literal") {
                        literal.set_literal(Some(text));
                    }
                }
                Ok(EClassifier::DataType(enumeration))
            }
            "EDataType" => {
                let data_type = EDataType::new(node.attr("name").unwrap_or_default(), ValueKind::String);
                read_meta_attributes(&data_type, node, &["xsi:type"])?;
                Ok(EClassifier::DataType(data_type))
            }
            other => Err(ModelError::UnknownType {
                name: other.to_string(),
                line: node.line,
            }),
        }
    }

    fn class(&mut self, node: &DocNode) -> Result<EClass> {
        let class = EClass::new(node.attr("name").unwrap_or_default());
        read_meta_attributes(&class, node, &["xsi:type", "eSuperTypes"])?;
        if let Some(supers) = node.attr("eSuperTypes") {
            self.pending
                .push(Pending::SuperTypes(class.clone(), supers.to_string(), node.line));
        }
        for child in &node.children {
            match child.tag.as_str() {
                "eStructuralFeatures" => {
                    let feature = self.feature(child)?;
                    add_feature(&class, feature)?;
                }
                "eOperations" => {
                    let operation = self.operation(child)?;
                    class.add_operation(operation)?;
                }
                "eTypeParameters" => class.add_type_parameter(self.type_parameter(child)),
                "eAnnotations" | "eGenericSuperTypes" => {}
                other => return Err(unknown_child("EClass", other, child.line)),
            }
        }
        Ok(class)
    }

    fn feature(&mut self, node: &DocNode) -> Result<EStructuralFeature> {
        let kind = match node.attr("xsi:type") {
            Some("ecore:EReference") => FeatureKind::Reference,
            Some("ecore:EAttribute") => FeatureKind::Attribute,
            Some(other) => {
                return Err(ModelError::UnknownType {
                    name: other.to_string(),
                    line: node.line,
                })
            }
            None => {
                return Err(ModelError::malformed(
                    "structural feature without xsi:type",
                    node.line,
                ))
            }
        };
        let feature = EStructuralFeature::unbound(kind, node.attr("name").unwrap_or_default());
        read_meta_attributes(&feature, node, &["xsi:type", "eType", "eOpposite"])?;
        match node.attr("eType") {
            Some(text) => self
                .pending
                .push(Pending::FeatureType(feature.clone(), text.to_string(), node.line)),
            None => {
                return Err(ModelError::malformed(
                    format!("feature '{}' has no eType", feature.name()),
                    node.line,
                ))
            }
        }
        if let Some(text) = node.attr("eOpposite") {
            self.pending
                .push(Pending::Opposite(feature.clone(), text.to_string(), node.line));
        }
        Ok(feature)
    }

    fn operation(&mut self, node: &DocNode) -> Result<EOperation> {
        let operation = EOperation::new(node.attr("name").unwrap_or_default(), None);
        read_meta_attributes(&operation, node, &["eType"])?;
        if let Some(text) = node.attr("eType") {
            self.pending
                .push(Pending::OperationType(operation.clone(), text.to_string(), node.line));
        }
        for child in &node.children {
            match child.tag.as_str() {
                "eParameters" => {
                    let parameter = EParameter::new(child.attr("name").unwrap_or_default(), None);
                    read_meta_attributes(&parameter, child, &["eType"])?;
                    if let Some(text) = child.attr("eType") {
                        self.pending
                            .push(Pending::ParameterType(parameter.clone(), text.to_string(), child.line));
                    }
                    operation.push_parameter(parameter);
                }
                "eTypeParameters" => operation.add_type_parameter(self.type_parameter(child)),
                "eAnnotations" => {}
                other => return Err(unknown_child("EOperation", other, child.line)),
            }
        }
        Ok(operation)
    }

    fn type_parameter(&mut self, node: &DocNode) -> ETypeParameter {
        let parameter = ETypeParameter::new(node.attr("name").unwrap_or_default());
        for bound in node.children.iter().filter(|c| c.tag == "eBounds") {
            if let Some(text) = bound.attr("eClassifier") {
                self.pending
                    .push(Pending::Bound(parameter.clone(), text.to_string(), bound.line));
            }
        }
        parameter
    }

    /// Pass two
    fn link(&mut self) -> Result<()> {
        for pending in std::mem::take(&mut self.pending) {
            match pending {
                Pending::FeatureType(feature, text, line) => {
                    let e_type = self.resolve_type(&text, line)?;
                    if feature.is_reference() && e_type.as_class().is_none() {
                        return Err(ModelError::malformed(
                            format!("reference '{}' is typed by data type {}", feature.name(), e_type.name()),
                            line,
                        ));
                    }
                    feature.bind_type(e_type);
                }
                Pending::SuperTypes(class, text, line) => {
                    for token in split_refs(&text) {
                        let super_type = self.resolve_type(&token, line)?;
                        let super_class = super_type.as_class().ok_or_else(|| {
                            ModelError::malformed(format!("super-type {} is not a class", super_type.name()), line)
                        })?;
                        add_supertype(&class, super_class)?;
                    }
                }
                Pending::OperationType(operation, text, line) => {
                    operation.set_e_type(Some(self.resolve_type(&text, line)?));
                }
                Pending::ParameterType(parameter, text, line) => {
                    parameter.set_e_type(Some(self.resolve_type(&text, line)?));
                }
                Pending::Bound(parameter, text, line) => {
                    parameter.add_bound(EGenericType::of(self.resolve_type(&text, line)?));
                }
                Pending::Opposite(feature, text, line) => {
                    let opposite = self.resolve_feature(&text, line)?;
                    feature.set_opposite_raw(Some(&opposite));
                }
            }
        }
        Ok(())
    }

    /// Local fragment or registry URI; a leading type hint is skipped
    fn resolve_type(&self, text: &str, line: Option<usize>) -> Result<EClassifier> {
        let unknown = || ModelError::UnknownType {
            name: text.to_string(),
            line,
        };
        let reference = text.split_whitespace().last().ok_or_else(unknown)?;
        let (uri, fragment) = reference.split_once('#').ok_or_else(unknown)?;
        if uri.is_empty() {
            let mut segments = path_segments(fragment);
            let name = segments.pop().ok_or_else(unknown)?;
            return self.local_package(&segments)?
                .and_then(|p| p.lookup_classifier(name))
                .ok_or_else(unknown);
        }
        if uri == ECORE_NS_URI {
            if let Some(classifier) = ecore::ecore().package.lookup_classifier(fragment.trim_start_matches('/')) {
                return Ok(classifier);
            }
        }
        self.registry.classifier(reference).ok_or_else(unknown)
    }

    fn resolve_feature(&self, text: &str, line: Option<usize>) -> Result<EStructuralFeature> {
        let unknown = || ModelError::UnknownFeature {
            class: text.to_string(),
            feature: text.to_string(),
            line,
        };
        let reference = text.split_whitespace().last().ok_or_else(unknown)?;
        let (uri, fragment) = reference.split_once('#').ok_or_else(unknown)?;
        let mut segments = path_segments(fragment);
        let feature_name = segments.pop().ok_or_else(unknown)?;
        let class_name = segments.pop().ok_or_else(unknown)?;
        let class = if uri.is_empty() {
            self.local_package(&segments)?
                .and_then(|p| p.lookup_classifier(class_name))
        } else {
            let mut path = segments.clone();
            path.push(class_name);
            self.registry.classifier(&format!("{}#//{}", uri, path.join("/")))
        };
        class
            .as_ref()
            .and_then(EClassifier::as_class)
            .and_then(|c| c.features().into_iter().find(|f| f.name() == feature_name))
            .ok_or_else(unknown)
    }

    /// Sub-package of the document root named by `segments`
    fn local_package(&self, segments: &[&str]) -> Result<Option<EPackage>> {
        let Some(mut package) = self.root.clone() else {
            return Err(ModelError::Internal {
                message: "metamodel root not set before linking".to_string(),
            });
        };
        for segment in segments {
            match package.lookup_sub_package(segment) {
                Some(sub) => package = sub,
                None => return Ok(None),
            }
        }
        Ok(Some(package))
    }
}

/// Apply every remaining attribute through the meta-class
fn read_meta_attributes(entity: &impl MetaObject, node: &DocNode, skip: &[&str]) -> Result<()> {
    for (name, text) in &node.attributes {
        if skip.contains(&name.as_str()) || name.starts_with("xmlns") || name.starts_with("xmi:") {
            continue;
        }
        let value = if BOOL_ATTRIBUTES.contains(&name.as_str()) {
            match text.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => {
                    return Err(ModelError::malformed(
                        format!("'{}' is not a boolean for {}", text, name),
                        node.line,
                    ))
                }
            }
        } else if INT_ATTRIBUTES.contains(&name.as_str()) {
            Value::Int(parse_int(name, text, node.line)?)
        } else {
            Value::String(text.clone())
        };
        entity.set_meta_attribute(name, &value).map_err(|e| match e {
            ModelError::UnknownFeature { class, feature, .. } => ModelError::UnknownFeature {
                class,
                feature,
                line: node.line,
            },
            other => other,
        })?;
    }
    Ok(())
}

fn parse_int(name: &str, text: &str, line: Option<usize>) -> Result<i64> {
    text.parse::<i64>()
        .map_err(|_| ModelError::malformed(format!("'{}' is not an integer for {}", text, name), line))
}

fn path_segments(fragment: &str) -> Vec<&str> {
    fragment
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Space-separated references; a type hint binds to the reference after it
fn split_refs(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|t| t.contains('#'))
        .map(str::to_string)
        .collect()
}

fn unknown_child(owner: &str, tag: &str, line: Option<usize>) -> ModelError {
    ModelError::UnknownFeature {
        class: owner.to_string(),
        feature: tag.to_string(),
        line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{make_class, make_enum, make_package, set_opposite};

    fn library() -> EPackage {
        let pkg = make_package("library", "http://codec.test/library", "lib");
        let named = make_class(&pkg, "Named");
        named.set_abstract(true);
        add_feature(&named, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
        let writer = make_class(&pkg, "Writer");
        add_supertype(&writer, &named).unwrap();
        let book = make_class(&pkg, "Book");
        make_enum(&pkg, "Genre", &["Fiction", "Poetry"]);
        let books = add_feature(&writer, EStructuralFeature::reference("books", &book).many()).unwrap();
        let authors = add_feature(&book, EStructuralFeature::reference("authors", &writer).many()).unwrap();
        set_opposite(&books, &authors).unwrap();
        let op = EOperation::new("describe", Some(EClassifier::DataType(ecore::e_string())));
        op.add_parameter("verbose", ecore::e_boolean());
        writer.add_operation(op).unwrap();
        pkg
    }

    #[test]
    fn test_metamodel_round_trip() {
        let written = write_packages(&[library()]).unwrap();
        assert!(is_metamodel(&written));
        assert_eq!(written.attr("xmlns:ecore"), Some(ECORE_NS_URI));

        let packages = read_packages(&written, &Registry::new()).unwrap();
        let pkg = &packages[0];
        assert_eq!(pkg.ns_uri(), "http://codec.test/library");
        let writer = pkg.class("Writer").unwrap();
        let named = pkg.class("Named").unwrap();
        assert!(named.is_abstract());
        assert_eq!(writer.super_types(), vec![named]);
        assert_eq!(writer.lookup_feature("name").unwrap().data_type().unwrap(), ecore::e_string());

        let books = writer.lookup_feature("books").unwrap();
        assert!(books.is_many());
        let authors = books.opposite().unwrap();
        assert_eq!(authors.name(), "authors");
        assert_eq!(authors.opposite(), Some(books));

        let genre = pkg.lookup_classifier("Genre").unwrap();
        let literals: Vec<String> = genre.as_data_type().unwrap().literals().iter().map(|l| l.name()).collect();
        assert_eq!(literals, vec!["Fiction", "Poetry"]);

        let describe = writer.lookup_operation("describe").unwrap();
        assert_eq!(describe.parameters()[0].name(), "verbose");
    }

    #[test]
    fn test_feature_defaults_are_omitted() {
        let written = write_packages(&[library()]).unwrap();
        let book = written.children.iter().find(|c| c.attr("name") == Some("Book")).unwrap();
        let authors = &book.children[0];
        assert_eq!(authors.attr("upperBound"), Some("-1"));
        assert_eq!(authors.attr("ordered"), None);
        assert_eq!(authors.attr("eType"), Some("#//Writer"));
        assert_eq!(authors.attr("eOpposite"), Some("#//Writer/books"));
    }

    #[test]
    fn test_unknown_type_reports_line() {
        let mut root = DocNode::new(PACKAGE_TAG)
            .with_attr("name", "p")
            .with_attr("nsURI", "http://codec.test/bad")
            .with_attr("nsPrefix", "p");
        let mut class = DocNode::new("eClassifiers").with_attr("xsi:type", "ecore:EClass").with_attr("name", "C");
        class.push(
            DocNode::new("eStructuralFeatures")
                .with_attr("xsi:type", "ecore:EReference")
                .with_attr("name", "r")
                .with_attr("eType", "#//Missing")
                .with_line(7),
        );
        root.push(class);

        let err = read_packages(&root, &Registry::new()).unwrap_err();
        assert!(matches!(err, ModelError::UnknownType { line: Some(7), .. }));
    }

    #[test]
    fn test_model_root_is_not_a_metamodel() {
        let err = read_packages(&DocNode::new("lib:Library"), &Registry::new()).unwrap_err();
        assert!(matches!(err, ModelError::UnexpectedRoot { .. }));
    }
}
