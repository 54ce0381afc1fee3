//! Metamodel registry: nsURI → package
//!
//! Every `ResourceSet` owns a `Registry` seeded from the thread's global
//! table (which always contains Ecore). Entries added to a resource set's
//! registry override the seed without touching it.

use std::cell::RefCell;
use std::collections::HashMap;

use super::{ecore, EClassifier, EPackage};

#[derive(Clone, Default)]
pub struct Registry {
    packages: HashMap<String, EPackage>,
    order: Vec<String>,
}

thread_local! {
    static GLOBAL: RefCell<Option<Registry>> = const { RefCell::new(None) };
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the thread's default table
    pub fn global() -> Registry {
        GLOBAL.with(|g| {
            g.borrow_mut()
                .get_or_insert_with(|| {
                    let mut seed = Registry::new();
                    seed.register(&ecore::ecore().package);
                    seed
                })
                .clone()
        })
    }

    /// Add a package to the thread's default table; later resource sets see it
    pub fn register_global(package: &EPackage) {
        let mut current = Registry::global();
        current.register(package);
        GLOBAL.with(|g| *g.borrow_mut() = Some(current));
    }

    /// Register a package and its nested packages under their nsURIs
    pub fn register(&mut self, package: &EPackage) {
        for p in package.all_packages() {
            let ns_uri = p.ns_uri();
            if ns_uri.is_empty() {
                continue;
            }
            if !self.packages.contains_key(&ns_uri) {
                self.order.push(ns_uri.clone());
            }
            self.packages.insert(ns_uri, p);
        }
    }

    pub fn unregister(&mut self, ns_uri: &str) -> Option<EPackage> {
        self.order.retain(|u| u != ns_uri);
        self.packages.remove(ns_uri)
    }

    pub fn get(&self, ns_uri: &str) -> Option<EPackage> {
        self.packages.get(ns_uri).cloned()
    }

    pub fn contains(&self, ns_uri: &str) -> bool {
        self.packages.contains_key(ns_uri)
    }

    /// Registered packages in registration order
    pub fn packages(&self) -> Vec<EPackage> {
        self.order
            .iter()
            .filter_map(|u| self.packages.get(u).cloned())
            .collect()
    }

    /// Find a package by its namespace prefix
    pub fn by_prefix(&self, prefix: &str) -> Option<EPackage> {
        self.packages()
            .into_iter()
            .find(|p| p.ns_prefix() == prefix)
    }

    /// Resolve `nsURI#//Name` (or `nsURI#//Sub/Name`)
    pub fn classifier(&self, uri: &str) -> Option<EClassifier> {
        let (ns_uri, fragment) = uri.split_once('#')?;
        let mut package = self.get(ns_uri)?;
        let path = fragment.trim_start_matches('/');
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let name = segments.pop()?;
        for segment in segments {
            package = package.lookup_sub_package(segment)?;
        }
        package.lookup_classifier(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.order.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{make_class, make_package};

    #[test]
    fn test_global_contains_ecore() {
        let registry = Registry::global();
        assert!(registry.contains(ecore::ECORE_NS_URI));
        let string = registry.classifier("http://www.eclipse.org/emf/2002/Ecore#//EString");
        assert_eq!(string.and_then(|c| c.as_data_type().cloned()), Some(ecore::e_string()));
    }

    #[test]
    fn test_local_override_does_not_touch_global() {
        let mut local = Registry::global();
        let pkg = make_package("local", "http://local.example", "loc");
        local.register(&pkg);

        assert!(local.contains("http://local.example"));
        assert!(!Registry::global().contains("http://local.example"));
    }

    #[test]
    fn test_nested_packages_registered() {
        let outer = make_package("outer", "http://outer", "o");
        let inner = make_package("inner", "http://inner", "i");
        outer.add_sub_package(&inner).unwrap();
        let widget = make_class(&inner, "Widget");
        let mut registry = Registry::new();

        registry.register(&outer);

        assert_eq!(registry.get("http://inner"), Some(inner));
        assert_eq!(registry.by_prefix("o"), Some(outer));
        assert_eq!(
            registry.classifier("http://inner#//Widget"),
            Some(EClassifier::Class(widget))
        );
    }
}
