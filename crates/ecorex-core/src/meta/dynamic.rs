//! Name-based view over a package
//!
//! `DynamicPackage` exposes each classifier and sub-package of a package by
//! name. Lookups go to the package on every call, so renames and membership
//! changes are always visible. The package subscription only bumps a
//! revision counter that callers caching lookups can compare against.

use std::cell::Cell;
use std::rc::Rc;

use super::{EClass, EClassifier, EDataType, EPackage, PackageListenerId};

/// A named member of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Classifier(EClassifier),
    Package(EPackage),
}

pub struct DynamicPackage {
    package: EPackage,
    revision: Rc<Cell<u64>>,
    listener: PackageListenerId,
}

impl DynamicPackage {
    pub fn new(package: &EPackage) -> Self {
        let revision = Rc::new(Cell::new(0));
        let sink = revision.clone();
        let listener = package.subscribe(move |_| sink.set(sink.get() + 1));
        DynamicPackage {
            package: package.clone(),
            revision,
            listener,
        }
    }

    pub fn package(&self) -> &EPackage {
        &self.package
    }

    /// Count of classifier and sub-package additions and removals seen so far
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Member named `name`; a classifier shadows a sub-package of the same name
    pub fn get(&self, name: &str) -> Option<Member> {
        self.package
            .lookup_classifier(name)
            .map(Member::Classifier)
            .or_else(|| self.package.lookup_sub_package(name).map(Member::Package))
    }

    pub fn class(&self, name: &str) -> Option<EClass> {
        self.package
            .classifiers()
            .into_iter()
            .find_map(|c| match c {
                EClassifier::Class(class) if class.name() == name => Some(class),
                _ => None,
            })
    }

    pub fn data_type(&self, name: &str) -> Option<EDataType> {
        self.package
            .classifiers()
            .into_iter()
            .find_map(|c| match c {
                EClassifier::DataType(data_type) if data_type.name() == name => Some(data_type),
                _ => None,
            })
    }

    pub fn sub_package(&self, name: &str) -> Option<EPackage> {
        self.package.lookup_sub_package(name)
    }

    /// Member names, sorted and deduplicated
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .package
            .classifiers()
            .iter()
            .map(EClassifier::name)
            .chain(self.package.sub_packages().iter().map(EPackage::name))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl Drop for DynamicPackage {
    fn drop(&mut self) {
        self.package.unsubscribe(self.listener);
    }
}
