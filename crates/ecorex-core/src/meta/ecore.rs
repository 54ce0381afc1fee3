//! Ecore bootstrap package
//!
//! The metamodel of metamodels, built once per thread. The structural spine
//! is constructed with empty meta-class pointers, then every record of the
//! package (including `EClass` itself) is retrofitted to point at its Ecore
//! class. Re-entry is a no-op: [`ecore`] hands out the same package on every
//! call, and records created while the spine is being built do not try to
//! resolve their meta-class.

use std::cell::{Cell, OnceCell, RefCell};
use std::rc::{Rc, Weak};

use super::class::ClassData;
use super::{
    make_class, make_data_type, EClass, EClassifier, EDataType, EPackage, EStructuralFeature,
};
use crate::errors::ModelError;
use crate::value::{Value, ValueKind};

pub const ECORE_NS_URI: &str = "http://www.eclipse.org/emf/2002/Ecore";
pub const ECORE_NS_PREFIX: &str = "ecore";

/// Which Ecore class describes a meta record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetaKind {
    Package,
    Class,
    DataType,
    Enum,
    EnumLiteral,
    Attribute,
    Reference,
    Operation,
    Parameter,
    TypeParameter,
}

/// The bootstrap package and handles onto its classifiers
pub struct Ecore {
    pub package: EPackage,

    pub e_object: EClass,
    pub e_model_element: EClass,
    pub e_named_element: EClass,
    pub e_classifier: EClass,
    pub e_class: EClass,
    pub e_data_type: EClass,
    pub e_enum: EClass,
    pub e_enum_literal: EClass,
    pub e_package: EClass,
    pub e_typed_element: EClass,
    pub e_structural_feature: EClass,
    pub e_attribute: EClass,
    pub e_reference: EClass,
    pub e_operation: EClass,
    pub e_parameter: EClass,
    pub e_type_parameter: EClass,
    pub e_generic_type: EClass,

    pub e_string: EDataType,
    pub e_int: EDataType,
    pub e_long: EDataType,
    pub e_short: EDataType,
    pub e_byte: EDataType,
    pub e_char: EDataType,
    pub e_boolean: EDataType,
    pub e_float: EDataType,
    pub e_double: EDataType,
    pub e_date: EDataType,
    pub e_byte_array: EDataType,
    pub e_java_object: EDataType,
    pub e_big_integer: EDataType,
    pub e_big_decimal: EDataType,
}

impl Ecore {
    pub(crate) fn class_for(&self, kind: MetaKind) -> &EClass {
        match kind {
            MetaKind::Package => &self.e_package,
            MetaKind::Class => &self.e_class,
            MetaKind::DataType => &self.e_data_type,
            MetaKind::Enum => &self.e_enum,
            MetaKind::EnumLiteral => &self.e_enum_literal,
            MetaKind::Attribute => &self.e_attribute,
            MetaKind::Reference => &self.e_reference,
            MetaKind::Operation => &self.e_operation,
            MetaKind::Parameter => &self.e_parameter,
            MetaKind::TypeParameter => &self.e_type_parameter,
        }
    }
}

thread_local! {
    static ECORE: OnceCell<Rc<Ecore>> = const { OnceCell::new() };
    static BOOTSTRAPPING: Cell<bool> = const { Cell::new(false) };
}

/// The Ecore package of this thread, building it on first use
pub fn ecore() -> Rc<Ecore> {
    ECORE.with(|cell| cell.get_or_init(bootstrap).clone())
}

/// Whether `class` is Ecore's `EObject`, the implicit root of every class
pub(crate) fn is_e_object(class: &EClass) -> bool {
    ECORE.with(|cell| cell.get().is_some_and(|e| e.e_object == *class))
}

pub(crate) fn meta_class_weak(kind: MetaKind) -> Weak<ClassData> {
    if BOOTSTRAPPING.with(Cell::get) {
        return Weak::new();
    }
    ecore().class_for(kind).downgrade()
}

pub(crate) fn resolve_meta(slot: &RefCell<Weak<ClassData>>, kind: MetaKind) -> EClass {
    match slot.borrow().upgrade() {
        Some(data) => EClass(data),
        None => ecore().class_for(kind).clone(),
    }
}

pub fn e_string() -> EDataType {
    ecore().e_string.clone()
}

pub fn e_int() -> EDataType {
    ecore().e_int.clone()
}

pub fn e_long() -> EDataType {
    ecore().e_long.clone()
}

pub fn e_boolean() -> EDataType {
    ecore().e_boolean.clone()
}

pub fn e_float() -> EDataType {
    ecore().e_float.clone()
}

pub fn e_double() -> EDataType {
    ecore().e_double.clone()
}

pub fn e_date() -> EDataType {
    ecore().e_date.clone()
}

pub fn e_byte_array() -> EDataType {
    ecore().e_byte_array.clone()
}

pub fn e_java_object() -> EDataType {
    ecore().e_java_object.clone()
}

pub fn e_object() -> EClass {
    ecore().e_object.clone()
}

/// Backing kind for a Java-style instance class name
pub fn kind_for_instance_class(name: &str) -> ValueKind {
    match name {
        "java.lang.String" | "String" | "char" | "java.lang.Character" => ValueKind::String,
        "int" | "long" | "short" | "byte" | "java.lang.Integer" | "java.lang.Long"
        | "java.lang.Short" | "java.lang.Byte" | "java.math.BigInteger" => ValueKind::Int,
        "boolean" | "java.lang.Boolean" => ValueKind::Bool,
        "float" | "double" | "java.lang.Float" | "java.lang.Double" | "java.math.BigDecimal" => {
            ValueKind::Float
        }
        "java.util.Date" => ValueKind::Date,
        "byte[]" => ValueKind::Bytes,
        _ => ValueKind::Object,
    }
}

pub(crate) fn expect_string(feature: &str, value: &Value) -> crate::errors::Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(ModelError::bad_value(
            feature,
            format!("expected string but got {}", other.type_name()),
        )),
    }
}

pub(crate) fn expect_bool(feature: &str, value: &Value) -> crate::errors::Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(ModelError::bad_value(
            feature,
            format!("expected bool but got {}", other.type_name()),
        )),
    }
}

pub(crate) fn expect_int(feature: &str, value: &Value) -> crate::errors::Result<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(ModelError::bad_value(
            feature,
            format!("expected int but got {}", other.type_name()),
        )),
    }
}

pub(crate) fn unknown_meta_feature(class: &EClass, name: &str) -> ModelError {
    ModelError::UnknownFeature {
        class: class.name(),
        feature: name.to_string(),
        line: None,
    }
}

fn attr(class: &EClass, name: &str, data_type: &EDataType) -> EStructuralFeature {
    let feature = EStructuralFeature::attribute(name, data_type);
    class.add_feature(feature.clone()).ok();
    feature
}

fn flag(class: &EClass, name: &str, data_type: &EDataType, default: bool) -> EStructuralFeature {
    let feature = EStructuralFeature::attribute(name, data_type).with_default(Value::Bool(default));
    class.add_feature(feature.clone()).ok();
    feature
}

fn reference(class: &EClass, name: &str, target: &EClass) -> EStructuralFeature {
    let feature = EStructuralFeature::reference(name, target);
    class.add_feature(feature.clone()).ok();
    feature
}

fn references(class: &EClass, name: &str, target: &EClass) -> EStructuralFeature {
    let feature = EStructuralFeature::reference(name, target).many();
    class.add_feature(feature.clone()).ok();
    feature
}

fn contains(class: &EClass, name: &str, target: &EClass) -> EStructuralFeature {
    let feature = EStructuralFeature::containment(name, target).many();
    class.add_feature(feature.clone()).ok();
    feature
}

fn derived(class: &EClass, feature: EStructuralFeature) {
    class.add_feature(feature.changeable(false).derived_flag()).ok();
}

fn pair(a: &EStructuralFeature, b: &EStructuralFeature) {
    a.set_opposite_raw(Some(b));
    b.set_opposite_raw(Some(a));
}

fn bootstrap() -> Rc<Ecore> {
    BOOTSTRAPPING.with(|b| b.set(true));
    let ecore = build_spine();
    retrofit(&ecore);
    BOOTSTRAPPING.with(|b| b.set(false));
    tracing::debug!(
        ns_uri = ECORE_NS_URI,
        classifiers = ecore.package.classifiers().len(),
        "ecore bootstrap complete"
    );
    Rc::new(ecore)
}

fn build_spine() -> Ecore {
    let package = EPackage::new("ecore", ECORE_NS_URI, ECORE_NS_PREFIX);

    let data_type = |name: &str, kind: ValueKind, instance_class: &str| {
        let d = make_data_type(&package, name, kind);
        d.set_instance_class_name(Some(instance_class));
        d
    };
    let e_string = data_type("EString", ValueKind::String, "java.lang.String");
    let e_int = data_type("EInt", ValueKind::Int, "int");
    let e_long = data_type("ELong", ValueKind::Int, "long");
    let e_short = data_type("EShort", ValueKind::Int, "short");
    let e_byte = data_type("EByte", ValueKind::Int, "byte");
    let e_char = data_type("EChar", ValueKind::String, "char");
    let e_boolean = data_type("EBoolean", ValueKind::Bool, "boolean");
    let e_float = data_type("EFloat", ValueKind::Float, "float");
    let e_double = data_type("EDouble", ValueKind::Float, "double");
    let e_date = data_type("EDate", ValueKind::Date, "java.util.Date");
    let e_byte_array = data_type("EByteArray", ValueKind::Bytes, "byte[]");
    let e_java_object = data_type("EJavaObject", ValueKind::Object, "java.lang.Object");
    let e_big_integer = data_type("EBigInteger", ValueKind::Int, "java.math.BigInteger");
    let e_big_decimal = data_type("EBigDecimal", ValueKind::Float, "java.math.BigDecimal");
    e_char.set_default_value(Some(Value::String(String::new())));

    let class = |name: &str, is_abstract: bool, supers: &[&EClass]| {
        let c = make_class(&package, name);
        c.set_abstract(is_abstract);
        for s in supers {
            c.add_super_type(s).ok();
        }
        c
    };
    let e_object = class("EObject", false, &[]);
    let e_model_element = class("EModelElement", true, &[]);
    let e_named_element = class("ENamedElement", true, &[&e_model_element]);
    let e_classifier = class("EClassifier", true, &[&e_named_element]);
    let e_class = class("EClass", false, &[&e_classifier]);
    let e_data_type = class("EDataType", false, &[&e_classifier]);
    let e_enum = class("EEnum", false, &[&e_data_type]);
    let e_enum_literal = class("EEnumLiteral", false, &[&e_named_element]);
    let e_package = class("EPackage", false, &[&e_named_element]);
    let e_typed_element = class("ETypedElement", true, &[&e_named_element]);
    let e_structural_feature = class("EStructuralFeature", true, &[&e_typed_element]);
    let e_attribute = class("EAttribute", false, &[&e_structural_feature]);
    let e_reference = class("EReference", false, &[&e_structural_feature]);
    let e_operation = class("EOperation", false, &[&e_typed_element]);
    let e_parameter = class("EParameter", false, &[&e_typed_element]);
    let e_type_parameter = class("ETypeParameter", false, &[&e_named_element]);
    let e_generic_type = class("EGenericType", false, &[]);

    attr(&e_named_element, "name", &e_string);

    attr(&e_classifier, "instanceClassName", &e_string);
    let classifier_package = reference(&e_classifier, "ePackage", &e_package)
        .changeable(false)
        .transient(true);
    contains(&e_classifier, "eTypeParameters", &e_type_parameter);

    flag(&e_class, "abstract", &e_boolean, false);
    flag(&e_class, "interface", &e_boolean, false);
    references(&e_class, "eSuperTypes", &e_class).unsettable(true);
    let class_features = contains(&e_class, "eStructuralFeatures", &e_structural_feature);
    let class_operations = contains(&e_class, "eOperations", &e_operation);
    derived(&e_class, EStructuralFeature::reference("eAllStructuralFeatures", &e_structural_feature).many());
    derived(&e_class, EStructuralFeature::reference("eAttributes", &e_attribute).many());
    derived(&e_class, EStructuralFeature::reference("eReferences", &e_reference).many());
    derived(&e_class, EStructuralFeature::reference("eAllSuperTypes", &e_class).many());

    flag(&e_data_type, "serializable", &e_boolean, true);

    let enum_literals = contains(&e_enum, "eLiterals", &e_enum_literal);
    attr(&e_enum_literal, "value", &e_int);
    attr(&e_enum_literal, "literal", &e_string);
    let literal_enum = reference(&e_enum_literal, "eEnum", &e_enum)
        .changeable(false)
        .transient(true);

    attr(&e_package, "nsURI", &e_string);
    attr(&e_package, "nsPrefix", &e_string);
    let package_classifiers = contains(&e_package, "eClassifiers", &e_classifier);
    let package_subs = contains(&e_package, "eSubpackages", &e_package);
    let package_super = reference(&e_package, "eSuperPackage", &e_package)
        .changeable(false)
        .transient(true);

    flag(&e_typed_element, "ordered", &e_boolean, true);
    flag(&e_typed_element, "unique", &e_boolean, true);
    attr(&e_typed_element, "lowerBound", &e_int);
    let upper = EStructuralFeature::attribute("upperBound", &e_int).with_default(Value::Int(1));
    e_typed_element.add_feature(upper).ok();
    derived(&e_typed_element, EStructuralFeature::attribute("many", &e_boolean));
    derived(&e_typed_element, EStructuralFeature::attribute("required", &e_boolean));
    reference(&e_typed_element, "eType", &e_classifier);
    let generic = EStructuralFeature::containment("eGenericType", &e_generic_type);
    e_typed_element.add_feature(generic).ok();

    flag(&e_structural_feature, "changeable", &e_boolean, true);
    flag(&e_structural_feature, "volatile", &e_boolean, false);
    flag(&e_structural_feature, "transient", &e_boolean, false);
    attr(&e_structural_feature, "defaultValueLiteral", &e_string);
    flag(&e_structural_feature, "unsettable", &e_boolean, false);
    flag(&e_structural_feature, "derived", &e_boolean, false);
    let feature_class = reference(&e_structural_feature, "eContainingClass", &e_class)
        .changeable(false)
        .transient(true);

    flag(&e_attribute, "iD", &e_boolean, false);

    flag(&e_reference, "containment", &e_boolean, false);
    derived(&e_reference, EStructuralFeature::attribute("container", &e_boolean));
    flag(&e_reference, "resolveProxies", &e_boolean, true);
    reference(&e_reference, "eOpposite", &e_reference);

    let operation_class = reference(&e_operation, "eContainingClass", &e_class)
        .changeable(false)
        .transient(true);
    let operation_parameters = contains(&e_operation, "eParameters", &e_parameter);
    contains(&e_operation, "eTypeParameters", &e_type_parameter);
    let parameter_operation = reference(&e_parameter, "eOperation", &e_operation)
        .changeable(false)
        .transient(true);

    contains(&e_type_parameter, "eBounds", &e_generic_type);

    reference(&e_generic_type, "eClassifier", &e_classifier);
    reference(&e_generic_type, "eTypeParameter", &e_type_parameter);
    contains(&e_generic_type, "eTypeArguments", &e_generic_type);

    pair(&package_classifiers, &classifier_package);
    pair(&package_subs, &package_super);
    pair(&class_features, &feature_class);
    pair(&class_operations, &operation_class);
    pair(&enum_literals, &literal_enum);
    pair(&operation_parameters, &parameter_operation);

    Ecore {
        package,
        e_object,
        e_model_element,
        e_named_element,
        e_classifier,
        e_class,
        e_data_type,
        e_enum,
        e_enum_literal,
        e_package,
        e_typed_element,
        e_structural_feature,
        e_attribute,
        e_reference,
        e_operation,
        e_parameter,
        e_type_parameter,
        e_generic_type,
        e_string,
        e_int,
        e_long,
        e_short,
        e_byte,
        e_char,
        e_boolean,
        e_float,
        e_double,
        e_date,
        e_byte_array,
        e_java_object,
        e_big_integer,
        e_big_decimal,
    }
}

/// Point every record of the spine at its Ecore class
fn retrofit(ecore: &Ecore) {
    let patch = |slot: &RefCell<Weak<ClassData>>, class: &EClass| {
        *slot.borrow_mut() = class.downgrade();
    };
    patch(&ecore.package.0.meta, &ecore.e_package);
    for classifier in ecore.package.classifiers() {
        match classifier {
            EClassifier::Class(class) => {
                patch(&class.0.meta, &ecore.e_class);
                for feature in class.features() {
                    let meta = if feature.is_attribute() {
                        &ecore.e_attribute
                    } else {
                        &ecore.e_reference
                    };
                    patch(&feature.0.meta, meta);
                }
            }
            EClassifier::DataType(data_type) => {
                patch(&data_type.0.meta, &ecore.e_data_type);
            }
        }
    }
}
