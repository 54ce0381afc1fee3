//! Structural features: attributes and references

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::class::ClassData;
use super::{ecore, meta_handle, EClass, EClassifier, EDataType, EGenericType, MetaObject};
use crate::errors::{ModelError, Result};
use crate::model::ObjectId;
use crate::ops::ResourceSet;
use crate::value::Value;

/// Attribute or reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Attribute,
    Reference,
}

pub type DerivedGetter = Rc<dyn Fn(&ResourceSet, ObjectId) -> Result<Value>>;
pub type DerivedSetter = Rc<dyn Fn(&mut ResourceSet, ObjectId, Value) -> Result<()>>;

/// User computation backing a derived feature
#[derive(Clone)]
pub struct Derivation {
    pub getter: DerivedGetter,
    pub setter: Option<DerivedSetter>,
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derivation")
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

pub(crate) struct FeatureData {
    kind: FeatureKind,
    pub(crate) name: RefCell<String>,
    e_type: RefCell<Option<EClassifier>>,
    generic_type: RefCell<Option<EGenericType>>,
    lower: Cell<i64>,
    upper: Cell<i64>,
    ordered: Cell<bool>,
    unique: Cell<bool>,
    changeable: Cell<bool>,
    volatile: Cell<bool>,
    transient: Cell<bool>,
    derived: Cell<bool>,
    unsettable: Cell<bool>,
    default_literal: RefCell<Option<String>>,
    default_value: RefCell<Option<Value>>,
    id: Cell<bool>,
    containment: Cell<bool>,
    resolve_proxies: Cell<bool>,
    opposite: RefCell<Weak<FeatureData>>,
    containing_class: RefCell<Weak<ClassData>>,
    derivation: RefCell<Option<Derivation>>,
    pub(crate) meta: RefCell<Weak<ClassData>>,
}

/// An attribute (typed by a data type) or a reference (typed by a class)
///
/// Builder methods consume and return the handle so declarations chain:
///
/// ```
/// use ecorex_core::meta::{ecore, EStructuralFeature};
///
/// let tags = EStructuralFeature::attribute("tags", &ecore::e_string()).many();
/// assert!(tags.is_many());
/// ```
#[derive(Clone)]
pub struct EStructuralFeature(pub(crate) Rc<FeatureData>);

meta_handle!(EStructuralFeature, FeatureData);

impl EStructuralFeature {
    fn raw(kind: FeatureKind, name: &str, e_type: Option<EClassifier>) -> Self {
        let meta_kind = match kind {
            FeatureKind::Attribute => ecore::MetaKind::Attribute,
            FeatureKind::Reference => ecore::MetaKind::Reference,
        };
        EStructuralFeature(Rc::new(FeatureData {
            kind,
            name: RefCell::new(name.to_string()),
            e_type: RefCell::new(e_type),
            generic_type: RefCell::new(None),
            lower: Cell::new(0),
            upper: Cell::new(1),
            ordered: Cell::new(true),
            unique: Cell::new(true),
            changeable: Cell::new(true),
            volatile: Cell::new(false),
            transient: Cell::new(false),
            derived: Cell::new(false),
            unsettable: Cell::new(false),
            default_literal: RefCell::new(None),
            default_value: RefCell::new(None),
            id: Cell::new(false),
            containment: Cell::new(false),
            resolve_proxies: Cell::new(true),
            opposite: RefCell::new(Weak::new()),
            containing_class: RefCell::new(Weak::new()),
            derivation: RefCell::new(None),
            meta: RefCell::new(ecore::meta_class_weak(meta_kind)),
        }))
    }

    /// Single-valued attribute of `data_type`
    pub fn attribute(name: &str, data_type: &EDataType) -> Self {
        Self::raw(
            FeatureKind::Attribute,
            name,
            Some(EClassifier::DataType(data_type.clone())),
        )
    }

    /// Single-valued, non-containment reference to `class`
    pub fn reference(name: &str, class: &EClass) -> Self {
        Self::raw(
            FeatureKind::Reference,
            name,
            Some(EClassifier::Class(class.clone())),
        )
    }

    /// Containment reference to `class`
    pub fn containment(name: &str, class: &EClass) -> Self {
        let feature = Self::reference(name, class);
        feature.0.containment.set(true);
        feature
    }

    /// Feature whose type is bound later with [`Self::bind_type`]
    pub fn unbound(kind: FeatureKind, name: &str) -> Self {
        Self::raw(kind, name, None)
    }

    // ----- builders -----

    pub fn many(self) -> Self {
        self.0.upper.set(-1);
        self
    }

    pub fn bounds(self, lower: i64, upper: i64) -> Self {
        self.set_bounds(lower, upper);
        self
    }

    pub fn required(self) -> Self {
        self.0.lower.set(self.0.lower.get().max(1));
        self
    }

    pub fn ordered(self, ordered: bool) -> Self {
        self.0.ordered.set(ordered);
        self
    }

    pub fn unique(self, unique: bool) -> Self {
        self.0.unique.set(unique);
        self
    }

    pub fn changeable(self, changeable: bool) -> Self {
        self.0.changeable.set(changeable);
        self
    }

    pub fn transient(self, transient: bool) -> Self {
        self.0.transient.set(transient);
        self
    }

    pub fn unsettable(self, unsettable: bool) -> Self {
        self.0.unsettable.set(unsettable);
        self
    }

    pub fn id(self) -> Self {
        self.0.id.set(true);
        self
    }

    pub fn with_default(self, value: Value) -> Self {
        *self.0.default_value.borrow_mut() = Some(value);
        self
    }

    /// Make the feature derived, computed by `getter`
    pub fn derived(self, getter: impl Fn(&ResourceSet, ObjectId) -> Result<Value> + 'static) -> Self {
        self.set_derivation(Derivation {
            getter: Rc::new(getter),
            setter: None,
        });
        self
    }

    /// Flag the feature derived without a computation (metamodel bookkeeping)
    pub(crate) fn derived_flag(self) -> Self {
        self.0.derived.set(true);
        self.0.transient.set(true);
        self.0.volatile.set(true);
        self
    }

    /// Give a derived feature a setter
    pub fn with_setter(
        self,
        setter: impl Fn(&mut ResourceSet, ObjectId, Value) -> Result<()> + 'static,
    ) -> Self {
        if let Some(derivation) = self.0.derivation.borrow_mut().as_mut() {
            derivation.setter = Some(Rc::new(setter));
        }
        self
    }

    // ----- accessors -----

    pub fn kind(&self) -> FeatureKind {
        self.0.kind
    }

    pub fn is_attribute(&self) -> bool {
        self.0.kind == FeatureKind::Attribute
    }

    pub fn is_reference(&self) -> bool {
        self.0.kind == FeatureKind::Reference
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.0.name.borrow_mut() = name.to_string();
        super::bump_epoch();
    }

    /// Declared type
    ///
    /// # Errors
    ///
    /// `UnboundType` until a type has been bound.
    pub fn e_type(&self) -> Result<EClassifier> {
        self.0
            .e_type
            .borrow()
            .clone()
            .ok_or_else(|| ModelError::UnboundType {
                feature: self.name(),
            })
    }

    /// Declared type, `None` while unbound
    pub fn e_type_opt(&self) -> Option<EClassifier> {
        self.0.e_type.borrow().clone()
    }

    /// Bind (or rebind) the declared type
    pub fn bind_type(&self, e_type: impl Into<EClassifier>) {
        *self.0.e_type.borrow_mut() = Some(e_type.into());
    }

    /// Declared data type of an attribute
    ///
    /// # Errors
    ///
    /// `UnboundType` if unbound, `BadValue` if the type is a class.
    pub fn data_type(&self) -> Result<EDataType> {
        match self.e_type()? {
            EClassifier::DataType(d) => Ok(d),
            EClassifier::Class(c) => Err(ModelError::bad_value(
                self.name(),
                format!("typed by class {} where a data type is required", c.name()),
            )),
        }
    }

    /// Declared class of a reference
    ///
    /// # Errors
    ///
    /// `UnboundType` if unbound, `BadValue` if the type is a data type.
    pub fn reference_type(&self) -> Result<EClass> {
        match self.e_type()? {
            EClassifier::Class(c) => Ok(c),
            EClassifier::DataType(d) => Err(ModelError::bad_value(
                self.name(),
                format!("typed by data type {} where a class is required", d.name()),
            )),
        }
    }

    pub fn generic_type(&self) -> Option<EGenericType> {
        self.0.generic_type.borrow().clone()
    }

    /// Type the feature generically; the erasure becomes the declared type
    pub fn set_generic_type(&self, generic: EGenericType) {
        if let Some(erasure) = generic.erasure() {
            *self.0.e_type.borrow_mut() = Some(erasure);
        }
        *self.0.generic_type.borrow_mut() = Some(generic);
    }

    pub fn lower_bound(&self) -> i64 {
        self.0.lower.get()
    }

    /// Upper bound; -1 means unbounded
    pub fn upper_bound(&self) -> i64 {
        self.0.upper.get()
    }

    pub fn set_bounds(&self, lower: i64, upper: i64) {
        self.0.lower.set(lower);
        self.0.upper.set(upper);
    }

    pub fn is_many(&self) -> bool {
        let upper = self.0.upper.get();
        upper < 0 || upper > 1
    }

    pub fn is_required(&self) -> bool {
        self.0.lower.get() >= 1
    }

    pub fn is_ordered(&self) -> bool {
        self.0.ordered.get()
    }

    pub fn is_unique(&self) -> bool {
        self.0.unique.get()
    }

    pub fn is_changeable(&self) -> bool {
        self.0.changeable.get()
    }

    pub fn is_volatile(&self) -> bool {
        self.0.volatile.get()
    }

    pub fn is_transient(&self) -> bool {
        self.0.transient.get()
    }

    pub fn is_derived(&self) -> bool {
        self.0.derived.get()
    }

    pub fn is_unsettable(&self) -> bool {
        self.0.unsettable.get()
    }

    pub fn is_id(&self) -> bool {
        self.0.id.get()
    }

    pub fn is_containment(&self) -> bool {
        self.0.containment.get()
    }

    /// A reference whose opposite is a containment: it points at the container
    pub fn is_container(&self) -> bool {
        self.opposite().is_some_and(|o| o.is_containment())
    }

    pub fn resolves_proxies(&self) -> bool {
        self.0.resolve_proxies.get()
    }

    pub fn opposite(&self) -> Option<EStructuralFeature> {
        EStructuralFeature::from_weak(&self.0.opposite.borrow())
    }

    pub fn containing_class(&self) -> Option<EClass> {
        EClass::from_weak(&self.0.containing_class.borrow())
    }

    pub(crate) fn set_containing_class(&self, class: Option<&EClass>) {
        *self.0.containing_class.borrow_mut() = class.map(EClass::downgrade).unwrap_or_default();
    }

    pub fn derivation(&self) -> Option<Derivation> {
        self.0.derivation.borrow().clone()
    }

    /// Attach a computation; marks the feature derived, transient and volatile
    pub fn set_derivation(&self, derivation: Derivation) {
        self.0.derived.set(true);
        self.0.transient.set(true);
        self.0.volatile.set(true);
        *self.0.derivation.borrow_mut() = Some(derivation);
    }

    pub fn default_value_literal(&self) -> Option<String> {
        self.0.default_literal.borrow().clone()
    }

    /// Value read from an unset single-valued feature
    ///
    /// Per-feature default first (value, then literal decoded by the data
    /// type), then the data type's default. References default to `Null`.
    ///
    /// # Errors
    ///
    /// `UnboundType` for an unbound attribute, `BadValue` when the default
    /// literal does not decode.
    pub fn default_value(&self) -> Result<Value> {
        if self.is_many() || self.is_reference() {
            return Ok(Value::Null);
        }
        if let Some(v) = self.0.default_value.borrow().as_ref() {
            return Ok(v.clone());
        }
        let data_type = self.data_type()?;
        if let Some(literal) = self.0.default_literal.borrow().as_ref() {
            return data_type.from_string(literal);
        }
        Ok(data_type.default_value())
    }

    /// Check a single element written to this feature
    ///
    /// # Errors
    ///
    /// `BadValue` when the value's kind or class does not fit the type.
    pub fn check_element(&self, rs: &ResourceSet, value: Value) -> Result<Value> {
        match self.e_type()? {
            EClassifier::DataType(data_type) => data_type.check(&self.name(), value),
            EClassifier::Class(class) => match value {
                Value::Null => Ok(Value::Null),
                Value::Object(id) => {
                    let actual = rs.class_of(id)?;
                    if class.is_super_type_of(&actual) {
                        Ok(Value::Object(id))
                    } else {
                        Err(ModelError::bad_value(
                            self.name(),
                            format!("{} is not an instance of {}", actual.name(), class.name()),
                        ))
                    }
                }
                other => Err(ModelError::bad_value(
                    self.name(),
                    format!("expected a {} object but got {}", class.name(), other.type_name()),
                )),
            },
        }
    }

    /// Declare `a` and `b` opposites of each other
    pub(crate) fn pair_opposites(a: &EStructuralFeature, b: &EStructuralFeature) -> Result<()> {
        let violation = |reason: &str| ModelError::OppositeViolation {
            feature: a.name(),
            opposite: b.name(),
            reason: reason.to_string(),
        };
        if !a.is_reference() || !b.is_reference() {
            return Err(violation("both ends must be references"));
        }
        if a.is_containment() && b.is_containment() {
            return Err(violation("both ends are containment"));
        }
        if a.is_containment() && b.is_many() {
            return Err(violation("the container end of a containment must be single-valued"));
        }
        if b.is_containment() && a.is_many() {
            return Err(violation("the container end of a containment must be single-valued"));
        }
        if let (Some(a_owner), Ok(b_type)) = (a.containing_class(), b.reference_type()) {
            if !b_type.is_super_type_of(&a_owner) && !a_owner.is_super_type_of(&b_type) {
                return Err(violation("opposite type does not match the declaring class"));
            }
        }
        if let (Some(b_owner), Ok(a_type)) = (b.containing_class(), a.reference_type()) {
            if !a_type.is_super_type_of(&b_owner) && !b_owner.is_super_type_of(&a_type) {
                return Err(violation("type does not match the opposite's declaring class"));
            }
        }
        for (end, other) in [(a, b), (b, a)] {
            if let Some(existing) = end.opposite() {
                if existing != *other {
                    return Err(violation("already paired with another reference"));
                }
            }
        }
        *a.0.opposite.borrow_mut() = b.downgrade();
        *b.0.opposite.borrow_mut() = a.downgrade();
        Ok(())
    }

    /// Set one side only; pass 2 of metamodel loading pairs both ends itself
    pub(crate) fn set_opposite_raw(&self, opposite: Option<&EStructuralFeature>) {
        *self.0.opposite.borrow_mut() = opposite.map(EStructuralFeature::downgrade).unwrap_or_default();
    }
}

impl MetaObject for EStructuralFeature {
    fn e_class(&self) -> EClass {
        let kind = match self.0.kind {
            FeatureKind::Attribute => ecore::MetaKind::Attribute,
            FeatureKind::Reference => ecore::MetaKind::Reference,
        };
        ecore::resolve_meta(&self.0.meta, kind)
    }

    fn meta_attribute(&self, name: &str) -> Option<Value> {
        let value = match name {
            "name" => Value::String(self.name()),
            "ordered" => Value::Bool(self.is_ordered()),
            "unique" => Value::Bool(self.is_unique()),
            "lowerBound" => Value::Int(self.lower_bound()),
            "upperBound" => Value::Int(self.upper_bound()),
            "many" => Value::Bool(self.is_many()),
            "required" => Value::Bool(self.is_required()),
            "changeable" => Value::Bool(self.is_changeable()),
            "volatile" => Value::Bool(self.is_volatile()),
            "transient" => Value::Bool(self.is_transient()),
            "unsettable" => Value::Bool(self.is_unsettable()),
            "derived" => Value::Bool(self.is_derived()),
            "defaultValueLiteral" => return self.default_value_literal().map(Value::String),
            "iD" if self.is_attribute() => Value::Bool(self.is_id()),
            "containment" if self.is_reference() => Value::Bool(self.is_containment()),
            "container" if self.is_reference() => Value::Bool(self.is_container()),
            "resolveProxies" if self.is_reference() => Value::Bool(self.resolves_proxies()),
            _ => return None,
        };
        Some(value)
    }

    fn set_meta_attribute(&self, name: &str, value: &Value) -> Result<()> {
        let d = &self.0;
        match name {
            "name" => self.set_name(&ecore::expect_string(name, value)?),
            "ordered" => d.ordered.set(ecore::expect_bool(name, value)?),
            "unique" => d.unique.set(ecore::expect_bool(name, value)?),
            "lowerBound" => d.lower.set(ecore::expect_int(name, value)?),
            "upperBound" => d.upper.set(ecore::expect_int(name, value)?),
            "changeable" => d.changeable.set(ecore::expect_bool(name, value)?),
            "volatile" => d.volatile.set(ecore::expect_bool(name, value)?),
            "transient" => d.transient.set(ecore::expect_bool(name, value)?),
            "unsettable" => d.unsettable.set(ecore::expect_bool(name, value)?),
            "derived" => d.derived.set(ecore::expect_bool(name, value)?),
            "defaultValueLiteral" => {
                *d.default_literal.borrow_mut() = Some(ecore::expect_string(name, value)?)
            }
            "iD" if self.is_attribute() => d.id.set(ecore::expect_bool(name, value)?),
            "containment" if self.is_reference() => {
                d.containment.set(ecore::expect_bool(name, value)?)
            }
            "resolveProxies" if self.is_reference() => {
                d.resolve_proxies.set(ecore::expect_bool(name, value)?)
            }
            _ => return Err(ecore::unknown_meta_feature(&self.e_class(), name)),
        }
        Ok(())
    }
}
