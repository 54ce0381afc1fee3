//! Classes

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use super::{
    ecore, meta_handle, EClassifier, EOperation, EPackage, EStructuralFeature, ETypeParameter,
    MetaObject,
};
use crate::errors::{ModelError, Result};
use crate::value::Value;

#[derive(Default)]
struct FeatureCache {
    epoch: u64,
    all_features: Option<Vec<EStructuralFeature>>,
    by_name: HashMap<String, Option<EStructuralFeature>>,
}

pub(crate) struct ClassData {
    pub(crate) name: RefCell<String>,
    is_abstract: Cell<bool>,
    is_interface: Cell<bool>,
    instance_class_name: RefCell<Option<String>>,
    features: RefCell<Vec<EStructuralFeature>>,
    operations: RefCell<Vec<EOperation>>,
    super_types: RefCell<Vec<EClass>>,
    type_parameters: RefCell<Vec<ETypeParameter>>,
    /// Owning package, held strongly so a class keeps its namespace
    pub(crate) package: RefCell<Option<EPackage>>,
    cache: RefCell<FeatureCache>,
    pub(crate) meta: RefCell<Weak<ClassData>>,
}

/// A class: the template of model objects
#[derive(Clone)]
pub struct EClass(pub(crate) Rc<ClassData>);

meta_handle!(EClass, ClassData);

impl EClass {
    pub fn new(name: &str) -> Self {
        EClass(Rc::new(ClassData {
            name: RefCell::new(name.to_string()),
            is_abstract: Cell::new(false),
            is_interface: Cell::new(false),
            instance_class_name: RefCell::new(None),
            features: RefCell::new(Vec::new()),
            operations: RefCell::new(Vec::new()),
            super_types: RefCell::new(Vec::new()),
            type_parameters: RefCell::new(Vec::new()),
            package: RefCell::new(None),
            cache: RefCell::new(FeatureCache::default()),
            meta: RefCell::new(ecore::meta_class_weak(ecore::MetaKind::Class)),
        }))
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.0.name.borrow_mut() = name.to_string();
    }

    /// `package.Class` style name used in diagnostics
    pub fn qualified_name(&self) -> String {
        match self.package() {
            Some(p) => format!("{}.{}", p.name(), self.name()),
            None => self.name(),
        }
    }

    pub fn is_abstract(&self) -> bool {
        self.0.is_abstract.get()
    }

    pub fn set_abstract(&self, is_abstract: bool) {
        self.0.is_abstract.set(is_abstract);
    }

    pub fn is_interface(&self) -> bool {
        self.0.is_interface.get()
    }

    pub fn set_interface(&self, is_interface: bool) {
        self.0.is_interface.set(is_interface);
    }

    pub fn instance_class_name(&self) -> Option<String> {
        self.0.instance_class_name.borrow().clone()
    }

    pub fn package(&self) -> Option<EPackage> {
        self.0.package.borrow().clone()
    }

    /// Features declared directly on this class, in insertion order
    pub fn features(&self) -> Vec<EStructuralFeature> {
        self.0.features.borrow().clone()
    }

    pub fn operations(&self) -> Vec<EOperation> {
        self.0.operations.borrow().clone()
    }

    pub fn super_types(&self) -> Vec<EClass> {
        self.0.super_types.borrow().clone()
    }

    pub fn type_parameters(&self) -> Vec<ETypeParameter> {
        self.0.type_parameters.borrow().clone()
    }

    pub fn add_type_parameter(&self, parameter: ETypeParameter) {
        self.0.type_parameters.borrow_mut().push(parameter);
    }

    pub(crate) fn add_feature(&self, feature: EStructuralFeature) -> Result<()> {
        let name = feature.name();
        if self.0.features.borrow().iter().any(|f| f.name() == name) {
            return Err(ModelError::bad_value(
                &name,
                format!("{} already declares a feature named '{}'", self.name(), name),
            ));
        }
        if let Some(owner) = feature.containing_class() {
            return Err(ModelError::bad_value(
                &name,
                format!("feature is already declared by {}", owner.name()),
            ));
        }
        feature.set_containing_class(Some(self));
        self.0.features.borrow_mut().push(feature);
        super::bump_epoch();
        Ok(())
    }

    /// Remove a declared feature (used by metamodel editing)
    pub fn remove_feature(&self, feature: &EStructuralFeature) -> bool {
        let mut features = self.0.features.borrow_mut();
        match features.iter().position(|f| f == feature) {
            Some(index) => {
                features.remove(index);
                feature.set_containing_class(None);
                super::bump_epoch();
                true
            }
            None => false,
        }
    }

    /// Declare an operation on this class
    ///
    /// # Errors
    ///
    /// `BadValue` if the operation already belongs to a class.
    pub fn add_operation(&self, operation: EOperation) -> Result<EOperation> {
        if let Some(owner) = operation.containing_class() {
            return Err(ModelError::bad_value(
                operation.name(),
                format!("operation is already declared by {}", owner.name()),
            ));
        }
        operation.set_containing_class(Some(self));
        self.0.operations.borrow_mut().push(operation.clone());
        Ok(operation)
    }

    pub(crate) fn add_super_type(&self, super_type: &EClass) -> Result<()> {
        if super_type == self || super_type.all_super_types().contains(self) {
            return Err(ModelError::CycleInSupertypes {
                class: self.name(),
                super_type: super_type.name(),
            });
        }
        if self.0.super_types.borrow().contains(super_type) {
            return Ok(());
        }
        self.0.super_types.borrow_mut().push(super_type.clone());
        super::bump_epoch();
        Ok(())
    }

    pub fn remove_super_type(&self, super_type: &EClass) -> bool {
        let mut supers = self.0.super_types.borrow_mut();
        let before = supers.len();
        supers.retain(|s| s != super_type);
        let removed = supers.len() != before;
        if removed {
            super::bump_epoch();
        }
        removed
    }

    /// Linearized super-class closure: depth first in declaration order,
    /// each class once, excluding `self`
    pub fn all_super_types(&self) -> Vec<EClass> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_super_types(&mut out, &mut seen);
        out
    }

    fn collect_super_types(&self, out: &mut Vec<EClass>, seen: &mut HashSet<EClass>) {
        for super_type in self.super_types() {
            if seen.insert(super_type.clone()) {
                out.push(super_type.clone());
                super_type.collect_super_types(out, seen);
            }
        }
    }

    /// Whether instances of `other` are instances of `self`
    ///
    /// Every class is a subtype of `EObject`.
    pub fn is_super_type_of(&self, other: &EClass) -> bool {
        if self == other || ecore::is_e_object(self) {
            return true;
        }
        other.all_super_types().contains(self)
    }

    fn refresh_cache(&self) {
        let current = super::epoch();
        let mut cache = self.0.cache.borrow_mut();
        if cache.epoch != current {
            cache.epoch = current;
            cache.all_features = None;
            cache.by_name.clear();
        }
    }

    /// Effective features: declared first (insertion order), then each
    /// super-class in declaration order, de-duplicated by identity
    pub fn all_features(&self) -> Vec<EStructuralFeature> {
        self.refresh_cache();
        if let Some(cached) = self.0.cache.borrow().all_features.as_ref() {
            return cached.clone();
        }
        let mut out = self.features();
        for super_type in self.super_types() {
            for feature in super_type.all_features() {
                if !out.contains(&feature) {
                    out.push(feature);
                }
            }
        }
        self.0.cache.borrow_mut().all_features = Some(out.clone());
        out
    }

    pub fn all_attributes(&self) -> Vec<EStructuralFeature> {
        self.all_features()
            .into_iter()
            .filter(EStructuralFeature::is_attribute)
            .collect()
    }

    pub fn all_references(&self) -> Vec<EStructuralFeature> {
        self.all_features()
            .into_iter()
            .filter(EStructuralFeature::is_reference)
            .collect()
    }

    pub fn all_containments(&self) -> Vec<EStructuralFeature> {
        self.all_features()
            .into_iter()
            .filter(EStructuralFeature::is_containment)
            .collect()
    }

    /// Find a feature by name; the most specific declaration wins
    pub fn lookup_feature(&self, name: &str) -> Option<EStructuralFeature> {
        self.refresh_cache();
        if let Some(hit) = self.0.cache.borrow().by_name.get(name) {
            return hit.clone();
        }
        let found = self.all_features().into_iter().find(|f| f.name() == name);
        self.0
            .cache
            .borrow_mut()
            .by_name
            .insert(name.to_string(), found.clone());
        found
    }

    /// Find a feature by name
    ///
    /// # Errors
    ///
    /// `UnknownFeature` when neither the class nor its super-classes declare it.
    pub fn feature(&self, name: &str) -> Result<EStructuralFeature> {
        self.lookup_feature(name)
            .ok_or_else(|| ModelError::UnknownFeature {
                class: self.name(),
                feature: name.to_string(),
                line: None,
            })
    }

    /// Whether `feature` belongs to the effective feature set
    pub fn has_feature(&self, feature: &EStructuralFeature) -> bool {
        self.all_features().contains(feature)
    }

    /// The attribute flagged as ID, if any
    pub fn id_attribute(&self) -> Option<EStructuralFeature> {
        self.all_attributes().into_iter().find(EStructuralFeature::is_id)
    }

    /// All operations, most specific first
    pub fn all_operations(&self) -> Vec<EOperation> {
        let mut out = self.operations();
        for super_type in self.all_super_types() {
            out.extend(super_type.operations());
        }
        out
    }

    /// Most specific operation named `name`
    pub fn lookup_operation(&self, name: &str) -> Option<EOperation> {
        self.all_operations().into_iter().find(|o| o.name() == name)
    }
}

impl MetaObject for EClass {
    fn e_class(&self) -> EClass {
        ecore::resolve_meta(&self.0.meta, ecore::MetaKind::Class)
    }

    fn meta_attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name())),
            "abstract" => Some(Value::Bool(self.is_abstract())),
            "interface" => Some(Value::Bool(self.is_interface())),
            "instanceClassName" => self.instance_class_name().map(Value::String),
            _ => None,
        }
    }

    fn set_meta_attribute(&self, name: &str, value: &Value) -> Result<()> {
        match name {
            "name" => self.set_name(&ecore::expect_string(name, value)?),
            "abstract" => self.set_abstract(ecore::expect_bool(name, value)?),
            "interface" => self.set_interface(ecore::expect_bool(name, value)?),
            "instanceClassName" => {
                *self.0.instance_class_name.borrow_mut() = Some(ecore::expect_string(name, value)?)
            }
            _ => return Err(ecore::unknown_meta_feature(&self.e_class(), name)),
        }
        Ok(())
    }
}

impl From<&EClass> for EClassifier {
    fn from(class: &EClass) -> Self {
        EClassifier::Class(class.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, add_supertype, ecore, make_class, make_package};

    #[test]
    fn test_class_outlives_package_handle() {
        let class = {
            let pkg = make_package("scoped", "http://scoped", "sc");
            make_class(&pkg, "Thing")
        };

        let package = class.package().unwrap();
        assert_eq!(package.ns_uri(), "http://scoped");
        assert_eq!(package.class("Thing").unwrap(), class);
    }

    #[test]
    fn test_all_features_order() {
        let pkg = make_package("p", "http://p", "p");
        let named = make_class(&pkg, "Named");
        let dated = make_class(&pkg, "Dated");
        let doc = make_class(&pkg, "Doc");
        let name = add_feature(&named, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
        let date = add_feature(&dated, EStructuralFeature::attribute("date", &ecore::e_date())).unwrap();
        let body = add_feature(&doc, EStructuralFeature::attribute("body", &ecore::e_string())).unwrap();
        add_supertype(&doc, &named).unwrap();
        add_supertype(&doc, &dated).unwrap();

        assert_eq!(doc.all_features(), vec![body, name, date]);
    }

    #[test]
    fn test_diamond_dedup_by_identity() {
        let pkg = make_package("p", "http://p", "p");
        let base = make_class(&pkg, "Base");
        let left = make_class(&pkg, "Left");
        let right = make_class(&pkg, "Right");
        let bottom = make_class(&pkg, "Bottom");
        let id = add_feature(&base, EStructuralFeature::attribute("id", &ecore::e_string())).unwrap();
        add_supertype(&left, &base).unwrap();
        add_supertype(&right, &base).unwrap();
        add_supertype(&bottom, &left).unwrap();
        add_supertype(&bottom, &right).unwrap();

        assert_eq!(bottom.all_features(), vec![id]);
        assert_eq!(bottom.all_super_types(), vec![left, base, right]);
    }

    #[test]
    fn test_lookup_most_specific_wins() {
        let pkg = make_package("p", "http://p", "p");
        let base = make_class(&pkg, "Base");
        let sub = make_class(&pkg, "Sub");
        add_feature(&base, EStructuralFeature::attribute("label", &ecore::e_string())).unwrap();
        let own = add_feature(&sub, EStructuralFeature::attribute("label", &ecore::e_int())).unwrap();
        add_supertype(&sub, &base).unwrap();

        assert_eq!(sub.lookup_feature("label"), Some(own));
    }

    #[test]
    fn test_cache_invalidated_by_late_feature() {
        let pkg = make_package("p", "http://p", "p");
        let base = make_class(&pkg, "Base");
        let sub = make_class(&pkg, "Sub");
        add_supertype(&sub, &base).unwrap();
        assert!(sub.lookup_feature("late").is_none());

        let late = add_feature(&base, EStructuralFeature::attribute("late", &ecore::e_string())).unwrap();

        assert_eq!(sub.lookup_feature("late"), Some(late));
    }

    #[test]
    fn test_supertype_cycle_rejected() {
        let pkg = make_package("p", "http://p", "p");
        let a = make_class(&pkg, "A");
        let b = make_class(&pkg, "B");
        add_supertype(&a, &b).unwrap();

        let result = add_supertype(&b, &a);

        assert!(matches!(result, Err(ModelError::CycleInSupertypes { .. })));
        assert!(matches!(add_supertype(&a, &a), Err(ModelError::CycleInSupertypes { .. })));
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let pkg = make_package("p", "http://p", "p");
        let a = make_class(&pkg, "A");
        add_feature(&a, EStructuralFeature::attribute("x", &ecore::e_int())).unwrap();
        assert!(add_feature(&a, EStructuralFeature::attribute("x", &ecore::e_int())).is_err());
    }

    #[test]
    fn test_every_class_is_an_e_object() {
        let pkg = make_package("p", "http://p", "p");
        let a = make_class(&pkg, "A");
        assert!(ecore::ecore().e_object.is_super_type_of(&a));
        assert!(!a.is_super_type_of(&ecore::ecore().e_object));
    }
}
