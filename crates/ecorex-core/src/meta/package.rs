//! Packages: namespaces of classifiers identified by their nsURI

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::class::ClassData;
use super::{ecore, meta_handle, EClass, EClassifier, MetaObject};
use crate::errors::{ModelError, Result};
use crate::value::Value;

/// Structural change of a package, delivered to package listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageEvent {
    ClassifierAdded(EClassifier),
    ClassifierRemoved(EClassifier),
    SubPackageAdded(EPackage),
    SubPackageRemoved(EPackage),
}

impl PackageEvent {
    /// Name of the package feature that changed
    pub fn feature_name(&self) -> &'static str {
        match self {
            PackageEvent::ClassifierAdded(_) | PackageEvent::ClassifierRemoved(_) => "eClassifiers",
            PackageEvent::SubPackageAdded(_) | PackageEvent::SubPackageRemoved(_) => "eSubpackages",
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(
            self,
            PackageEvent::ClassifierAdded(_) | PackageEvent::SubPackageAdded(_)
        )
    }
}

/// Handle returned by [`EPackage::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackageListenerId(u64);

type PackageListener = Rc<dyn Fn(&PackageEvent)>;

pub(crate) struct PackageData {
    pub(crate) name: RefCell<String>,
    ns_uri: RefCell<String>,
    ns_prefix: RefCell<String>,
    classifiers: RefCell<Vec<EClassifier>>,
    sub_packages: RefCell<Vec<EPackage>>,
    super_package: RefCell<Weak<PackageData>>,
    listeners: RefCell<Vec<(PackageListenerId, PackageListener)>>,
    next_listener: Cell<u64>,
    pub(crate) meta: RefCell<Weak<ClassData>>,
}

/// A package of classifiers
#[derive(Clone)]
pub struct EPackage(pub(crate) Rc<PackageData>);

meta_handle!(EPackage, PackageData);

impl EPackage {
    pub fn new(name: &str, ns_uri: &str, ns_prefix: &str) -> Self {
        EPackage(Rc::new(PackageData {
            name: RefCell::new(name.to_string()),
            ns_uri: RefCell::new(ns_uri.to_string()),
            ns_prefix: RefCell::new(ns_prefix.to_string()),
            classifiers: RefCell::new(Vec::new()),
            sub_packages: RefCell::new(Vec::new()),
            super_package: RefCell::new(Weak::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            meta: RefCell::new(ecore::meta_class_weak(ecore::MetaKind::Package)),
        }))
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.0.name.borrow_mut() = name.to_string();
    }

    pub fn ns_uri(&self) -> String {
        self.0.ns_uri.borrow().clone()
    }

    pub fn set_ns_uri(&self, ns_uri: &str) {
        *self.0.ns_uri.borrow_mut() = ns_uri.to_string();
    }

    pub fn ns_prefix(&self) -> String {
        self.0.ns_prefix.borrow().clone()
    }

    pub fn set_ns_prefix(&self, prefix: &str) {
        *self.0.ns_prefix.borrow_mut() = prefix.to_string();
    }

    pub fn classifiers(&self) -> Vec<EClassifier> {
        self.0.classifiers.borrow().clone()
    }

    pub fn classes(&self) -> Vec<EClass> {
        self.0
            .classifiers
            .borrow()
            .iter()
            .filter_map(|c| c.as_class().cloned())
            .collect()
    }

    pub fn sub_packages(&self) -> Vec<EPackage> {
        self.0.sub_packages.borrow().clone()
    }

    pub fn super_package(&self) -> Option<EPackage> {
        EPackage::from_weak(&self.0.super_package.borrow())
    }

    /// Outermost package of the nesting chain
    pub fn root_package(&self) -> EPackage {
        let mut current = self.clone();
        while let Some(parent) = current.super_package() {
            current = parent;
        }
        current
    }

    /// Find a classifier by name (linear scan)
    pub fn lookup_classifier(&self, name: &str) -> Option<EClassifier> {
        self.0
            .classifiers
            .borrow()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Find a class by name
    ///
    /// # Errors
    ///
    /// `UnknownType` when no classifier has that name or it is not a class.
    pub fn class(&self, name: &str) -> Result<EClass> {
        self.lookup_classifier(name)
            .and_then(|c| c.as_class().cloned())
            .ok_or_else(|| ModelError::UnknownType {
                name: format!("{}::{}", self.name(), name),
                line: None,
            })
    }

    pub fn lookup_sub_package(&self, name: &str) -> Option<EPackage> {
        self.0
            .sub_packages
            .borrow()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// Add a classifier, detaching it from any previous package
    pub fn add_classifier(&self, classifier: EClassifier) {
        if let Some(previous) = classifier.package() {
            if previous == *self {
                return;
            }
            previous.remove_classifier(&classifier);
        }
        classifier.set_package(Some(self));
        self.0.classifiers.borrow_mut().push(classifier.clone());
        self.fire(PackageEvent::ClassifierAdded(classifier));
    }

    pub fn remove_classifier(&self, classifier: &EClassifier) -> bool {
        let removed = {
            let mut classifiers = self.0.classifiers.borrow_mut();
            match classifiers.iter().position(|c| c == classifier) {
                Some(index) => {
                    classifiers.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            classifier.set_package(None);
            self.fire(PackageEvent::ClassifierRemoved(classifier.clone()));
        }
        removed
    }

    /// Nest `package` under this one
    ///
    /// # Errors
    ///
    /// `BadValue` when the nesting would make a package its own ancestor.
    pub fn add_sub_package(&self, package: &EPackage) -> Result<()> {
        let mut cursor = Some(self.clone());
        while let Some(p) = cursor {
            if p == *package {
                return Err(ModelError::bad_value(
                    "eSubpackages",
                    format!("package '{}' cannot contain itself", package.name()),
                ));
            }
            cursor = p.super_package();
        }
        if let Some(previous) = package.super_package() {
            previous.remove_sub_package(package);
        }
        *package.0.super_package.borrow_mut() = self.downgrade();
        self.0.sub_packages.borrow_mut().push(package.clone());
        self.fire(PackageEvent::SubPackageAdded(package.clone()));
        Ok(())
    }

    pub fn remove_sub_package(&self, package: &EPackage) -> bool {
        let removed = {
            let mut subs = self.0.sub_packages.borrow_mut();
            match subs.iter().position(|p| p == package) {
                Some(index) => {
                    subs.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            *package.0.super_package.borrow_mut() = Weak::new();
            self.fire(PackageEvent::SubPackageRemoved(package.clone()));
        }
        removed
    }

    /// This package followed by all nested packages, depth first
    pub fn all_packages(&self) -> Vec<EPackage> {
        let mut out = vec![self.clone()];
        for sub in self.sub_packages() {
            out.extend(sub.all_packages());
        }
        out
    }

    /// Register a structural-change listener
    pub fn subscribe(&self, listener: impl Fn(&PackageEvent) + 'static) -> PackageListenerId {
        let id = PackageListenerId(self.0.next_listener.get());
        self.0.next_listener.set(id.0 + 1);
        self.0
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: PackageListenerId) -> bool {
        let mut listeners = self.0.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn fire(&self, event: PackageEvent) {
        super::bump_epoch();
        let snapshot: Vec<PackageListener> = self
            .0
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in snapshot {
            listener(&event);
        }
    }
}

impl MetaObject for EPackage {
    fn e_class(&self) -> EClass {
        ecore::resolve_meta(&self.0.meta, ecore::MetaKind::Package)
    }

    fn meta_attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name())),
            "nsURI" => Some(Value::String(self.ns_uri())),
            "nsPrefix" => Some(Value::String(self.ns_prefix())),
            _ => None,
        }
    }

    fn set_meta_attribute(&self, name: &str, value: &Value) -> Result<()> {
        let text = ecore::expect_string(name, value)?;
        match name {
            "name" => self.set_name(&text),
            "nsURI" => self.set_ns_uri(&text),
            "nsPrefix" => self.set_ns_prefix(&text),
            _ => return Err(ecore::unknown_meta_feature(&self.e_class(), name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::make_class;
    use std::cell::RefCell;

    #[test]
    fn test_lookup_classifier() {
        let pkg = EPackage::new("lib", "http://lib", "lib");
        let writer = make_class(&pkg, "Writer");
        assert_eq!(pkg.lookup_classifier("Writer").and_then(|c| c.as_class().cloned()), Some(writer.clone()));
        assert_eq!(writer.package(), Some(pkg.clone()));
        assert!(pkg.lookup_classifier("Book").is_none());
        assert!(matches!(pkg.class("Book"), Err(ModelError::UnknownType { .. })));
    }

    #[test]
    fn test_moving_classifier_between_packages() {
        let a = EPackage::new("a", "http://a", "a");
        let b = EPackage::new("b", "http://b", "b");
        let class = make_class(&a, "Thing");

        b.add_classifier(EClassifier::Class(class.clone()));

        assert!(a.classifiers().is_empty());
        assert_eq!(class.package(), Some(b));
    }

    #[test]
    fn test_sub_package_cycle_rejected() {
        let outer = EPackage::new("outer", "http://outer", "o");
        let inner = EPackage::new("inner", "http://inner", "i");
        outer.add_sub_package(&inner).unwrap();

        assert_eq!(inner.super_package(), Some(outer.clone()));
        assert_eq!(inner.root_package(), outer);
        assert!(inner.add_sub_package(&outer).is_err());
    }

    #[test]
    fn test_listener_sees_add_and_remove() {
        let pkg = EPackage::new("p", "http://p", "p");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let id = pkg.subscribe(move |e| sink.borrow_mut().push(e.is_add()));

        let class = make_class(&pkg, "C");
        pkg.remove_classifier(&EClassifier::Class(class));
        assert!(pkg.unsubscribe(id));
        make_class(&pkg, "D");

        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn test_meta_attributes() {
        let pkg = EPackage::new("p", "http://p", "p");
        pkg.set_meta_attribute("nsPrefix", &Value::from("q")).unwrap();
        assert_eq!(pkg.ns_prefix(), "q");
        assert_eq!(pkg.e_class().name(), "EPackage");
        assert!(pkg.set_meta_attribute("bogus", &Value::from("x")).is_err());
    }
}
