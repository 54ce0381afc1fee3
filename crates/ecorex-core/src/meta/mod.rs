//! Meta layer
//!
//! Packages, classifiers, features and operations as shared, interior-mutable
//! records. Handles compare and hash by identity, never by name. Every
//! meta-entity is itself described by a class of the bootstrap Ecore package
//! (see [`ecore`]), reachable through [`MetaObject::e_class`].
//!
//! Construction is inside-out (feature, then class, then package) but types
//! may be bound late: a feature created without a type reports
//! `UnboundType` until [`EStructuralFeature::bind_type`] is called.

mod class;
mod classifier;
pub mod dynamic;
pub mod ecore;
mod feature;
mod generic;
mod operation;
mod package;
pub mod registry;

use std::cell::Cell;

pub use class::EClass;
pub use classifier::{DataTypeCodec, EClassifier, EDataType, EEnumLiteral};
pub use dynamic::DynamicPackage;
pub use feature::{Derivation, DerivedGetter, DerivedSetter, EStructuralFeature, FeatureKind};
pub use generic::{EGenericType, ETypeParameter};
pub use operation::{EOperation, EParameter, OperationBody};
pub use package::{EPackage, PackageEvent, PackageListenerId};
pub use registry::Registry;

use crate::errors::Result;
use crate::value::{Value, ValueKind};

/// Reflective view of a meta-entity through its Ecore meta-class
///
/// Only attributes (names, flags, bounds, literals) are reachable this way;
/// structural links are navigated through the typed handle API.
pub trait MetaObject {
    /// The Ecore class describing this entity
    fn e_class(&self) -> EClass;

    /// Read an Ecore attribute by its feature name
    fn meta_attribute(&self, name: &str) -> Option<Value>;

    /// Write an Ecore attribute by its feature name
    ///
    /// # Errors
    ///
    /// `UnknownFeature` when the meta-class has no such attribute, `BadValue`
    /// when the value has the wrong kind.
    fn set_meta_attribute(&self, name: &str, value: &Value) -> Result<()>;
}

thread_local! {
    static META_EPOCH: Cell<u64> = const { Cell::new(0) };
}

/// Invalidate every per-class feature cache on this thread
pub(crate) fn bump_epoch() {
    META_EPOCH.with(|e| e.set(e.get().wrapping_add(1)));
}

pub(crate) fn epoch() -> u64 {
    META_EPOCH.with(Cell::get)
}

/// Implements identity equality, identity hashing and a name-based `Debug`
/// for an `Rc`-backed meta handle.
macro_rules! meta_handle {
    ($handle:ident, $data:ident) => {
        impl PartialEq for $handle {
            fn eq(&self, other: &Self) -> bool {
                std::rc::Rc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $handle {}

        impl std::hash::Hash for $handle {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                std::ptr::hash(std::rc::Rc::as_ptr(&self.0), state)
            }
        }

        impl std::fmt::Debug for $handle {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($handle), self.0.name.borrow())
            }
        }

        impl $handle {
            #[allow(dead_code)]
            pub(crate) fn downgrade(&self) -> std::rc::Weak<$data> {
                std::rc::Rc::downgrade(&self.0)
            }

            #[allow(dead_code)]
            pub(crate) fn from_weak(weak: &std::rc::Weak<$data>) -> Option<Self> {
                weak.upgrade().map($handle)
            }
        }
    };
}

pub(crate) use meta_handle;

/// Create a package
///
/// ```
/// use ecorex_core::meta::make_package;
///
/// let pkg = make_package("library", "http://example.org/library", "lib");
/// assert_eq!(pkg.ns_uri(), "http://example.org/library");
/// ```
pub fn make_package(name: &str, ns_uri: &str, ns_prefix: &str) -> EPackage {
    EPackage::new(name, ns_uri, ns_prefix)
}

/// Create a concrete class and add it to `package`
pub fn make_class(package: &EPackage, name: &str) -> EClass {
    let class = EClass::new(name);
    package.add_classifier(EClassifier::Class(class.clone()));
    class
}

/// Create an abstract class and add it to `package`
pub fn make_abstract_class(package: &EPackage, name: &str) -> EClass {
    let class = make_class(package, name);
    class.set_abstract(true);
    class
}

/// Create a data type with the given backing kind and add it to `package`
pub fn make_data_type(package: &EPackage, name: &str, kind: ValueKind) -> EDataType {
    let data_type = EDataType::new(name, kind);
    package.add_classifier(EClassifier::DataType(data_type.clone()));
    data_type
}

/// Create an enumeration with the given literals, valued 0, 1, 2 ...
pub fn make_enum(package: &EPackage, name: &str, literals: &[&str]) -> EDataType {
    let enumeration = EDataType::new_enum(name);
    for (value, literal) in literals.iter().enumerate() {
        add_enum_literal(&enumeration, literal, value as i64);
    }
    package.add_classifier(EClassifier::DataType(enumeration.clone()));
    enumeration
}

/// Append a literal to an enumeration
pub fn add_enum_literal(enumeration: &EDataType, name: &str, value: i64) -> EEnumLiteral {
    enumeration.add_literal(name, value)
}

/// Declare `feature` on `class`
///
/// # Errors
///
/// `BadValue` if the class already declares a feature with that name or the
/// feature is already owned by another class.
pub fn add_feature(class: &EClass, feature: EStructuralFeature) -> Result<EStructuralFeature> {
    class.add_feature(feature.clone())?;
    Ok(feature)
}

/// Add `super_type` to the ordered super-class list of `class`
///
/// # Errors
///
/// `CycleInSupertypes` if `class` is already a super-class of `super_type`.
pub fn add_supertype(class: &EClass, super_type: &EClass) -> Result<()> {
    class.add_super_type(super_type)
}

/// Pair two references as opposites of each other
///
/// # Errors
///
/// `OppositeViolation` if the endpoint classes do not line up or both sides
/// are containment.
pub fn set_opposite(reference: &EStructuralFeature, opposite: &EStructuralFeature) -> Result<()> {
    EStructuralFeature::pair_opposites(reference, opposite)
}
