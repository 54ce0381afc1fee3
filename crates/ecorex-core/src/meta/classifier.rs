//! Classifiers: classes, data types and enumerations

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::class::ClassData;
use super::{ecore, meta_handle, EClass, EPackage, MetaObject};
use crate::errors::{ModelError, Result};
use crate::value::{self, Value, ValueKind};

/// A class or a data type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EClassifier {
    Class(EClass),
    DataType(EDataType),
}

impl EClassifier {
    pub fn name(&self) -> String {
        match self {
            EClassifier::Class(c) => c.name(),
            EClassifier::DataType(d) => d.name(),
        }
    }

    pub fn package(&self) -> Option<EPackage> {
        match self {
            EClassifier::Class(c) => c.package(),
            EClassifier::DataType(d) => d.package(),
        }
    }

    pub(crate) fn set_package(&self, package: Option<&EPackage>) {
        let package = package.cloned();
        match self {
            EClassifier::Class(c) => *c.0.package.borrow_mut() = package,
            EClassifier::DataType(d) => *d.0.package.borrow_mut() = package,
        }
    }

    pub fn as_class(&self) -> Option<&EClass> {
        match self {
            EClassifier::Class(c) => Some(c),
            EClassifier::DataType(_) => None,
        }
    }

    pub fn as_data_type(&self) -> Option<&EDataType> {
        match self {
            EClassifier::DataType(d) => Some(d),
            EClassifier::Class(_) => None,
        }
    }

    /// `nsURI#//Name` form used for cross-package type references
    pub fn uri(&self) -> String {
        let ns_uri = self.package().map(|p| p.ns_uri()).unwrap_or_default();
        format!("{}#//{}", ns_uri, self.name())
    }

    pub fn e_class(&self) -> EClass {
        match self {
            EClassifier::Class(c) => c.e_class(),
            EClassifier::DataType(d) => d.e_class(),
        }
    }
}

impl From<EClass> for EClassifier {
    fn from(class: EClass) -> Self {
        EClassifier::Class(class)
    }
}

impl From<EDataType> for EClassifier {
    fn from(data_type: EDataType) -> Self {
        EClassifier::DataType(data_type)
    }
}

/// Custom string codec of a data type
#[derive(Clone)]
pub struct DataTypeCodec {
    pub from_string: Rc<dyn Fn(&str) -> Result<Value>>,
    pub to_string: Rc<dyn Fn(&Value) -> Result<String>>,
}

impl fmt::Debug for DataTypeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataTypeCodec")
    }
}

pub(crate) struct DataTypeData {
    pub(crate) name: RefCell<String>,
    kind: Cell<ValueKind>,
    instance_class_name: RefCell<Option<String>>,
    serializable: Cell<bool>,
    default: RefCell<Option<Value>>,
    codec: RefCell<Option<DataTypeCodec>>,
    literals: RefCell<Vec<EEnumLiteral>>,
    /// Owning package, held strongly so a class keeps its namespace
    pub(crate) package: RefCell<Option<EPackage>>,
    pub(crate) meta: RefCell<Weak<ClassData>>,
}

/// A data type; enumerations are data types of kind [`ValueKind::Enum`]
#[derive(Clone)]
pub struct EDataType(pub(crate) Rc<DataTypeData>);

meta_handle!(EDataType, DataTypeData);

impl EDataType {
    pub fn new(name: &str, kind: ValueKind) -> Self {
        let meta_kind = if kind == ValueKind::Enum {
            ecore::MetaKind::Enum
        } else {
            ecore::MetaKind::DataType
        };
        EDataType(Rc::new(DataTypeData {
            name: RefCell::new(name.to_string()),
            kind: Cell::new(kind),
            instance_class_name: RefCell::new(None),
            serializable: Cell::new(true),
            default: RefCell::new(None),
            codec: RefCell::new(None),
            literals: RefCell::new(Vec::new()),
            package: RefCell::new(None),
            meta: RefCell::new(ecore::meta_class_weak(meta_kind)),
        }))
    }

    pub fn new_enum(name: &str) -> Self {
        Self::new(name, ValueKind::Enum)
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.0.name.borrow_mut() = name.to_string();
        super::bump_epoch();
    }

    pub fn kind(&self) -> ValueKind {
        self.0.kind.get()
    }

    pub fn set_kind(&self, kind: ValueKind) {
        self.0.kind.set(kind);
    }

    pub fn is_enum(&self) -> bool {
        self.kind() == ValueKind::Enum
    }

    pub fn package(&self) -> Option<EPackage> {
        self.0.package.borrow().clone()
    }

    pub fn instance_class_name(&self) -> Option<String> {
        self.0.instance_class_name.borrow().clone()
    }

    pub fn set_instance_class_name(&self, name: Option<&str>) {
        *self.0.instance_class_name.borrow_mut() = name.map(str::to_string);
    }

    pub fn is_serializable(&self) -> bool {
        self.0.serializable.get()
    }

    pub fn set_serializable(&self, serializable: bool) {
        self.0.serializable.set(serializable);
    }

    pub fn set_default_value(&self, value: Option<Value>) {
        *self.0.default.borrow_mut() = value;
    }

    /// Install custom `to_string` / `from_string` functions
    pub fn set_codec(
        &self,
        from_string: impl Fn(&str) -> Result<Value> + 'static,
        to_string: impl Fn(&Value) -> Result<String> + 'static,
    ) {
        *self.0.codec.borrow_mut() = Some(DataTypeCodec {
            from_string: Rc::new(from_string),
            to_string: Rc::new(to_string),
        });
    }

    /// Default value of the type: explicit default, first literal for an
    /// enumeration, otherwise the kind's default
    pub fn default_value(&self) -> Value {
        if let Some(v) = self.0.default.borrow().as_ref() {
            return v.clone();
        }
        if self.is_enum() {
            return self
                .0
                .literals
                .borrow()
                .first()
                .cloned()
                .map(Value::Literal)
                .unwrap_or(Value::Null);
        }
        self.kind().default_value()
    }

    pub fn literals(&self) -> Vec<EEnumLiteral> {
        self.0.literals.borrow().clone()
    }

    pub(crate) fn add_literal(&self, name: &str, value: i64) -> EEnumLiteral {
        let literal = EEnumLiteral(Rc::new(LiteralData {
            name: RefCell::new(name.to_string()),
            value: Cell::new(value),
            literal: RefCell::new(None),
            enumeration: RefCell::new(self.downgrade()),
            meta: RefCell::new(ecore::meta_class_weak(ecore::MetaKind::EnumLiteral)),
        }));
        self.0.literals.borrow_mut().push(literal.clone());
        literal
    }

    /// Find a literal by name, falling back to its literal string
    pub fn literal(&self, name: &str) -> Option<EEnumLiteral> {
        let literals = self.0.literals.borrow();
        literals
            .iter()
            .find(|l| l.name() == name)
            .or_else(|| literals.iter().find(|l| l.literal() == name))
            .cloned()
    }

    pub fn literal_by_value(&self, value: i64) -> Option<EEnumLiteral> {
        self.0
            .literals
            .borrow()
            .iter()
            .find(|l| l.value() == value)
            .cloned()
    }

    /// Check (and coerce) a value written to a feature of this type
    ///
    /// # Errors
    ///
    /// `BadValue` on a kind mismatch or a literal outside this enumeration.
    pub fn check(&self, feature: &str, value: Value) -> Result<Value> {
        if !self.is_enum() {
            return value::coerce(self.kind(), value, feature);
        }
        match value {
            Value::Null => Ok(Value::Null),
            Value::Literal(lit) if lit.enumeration().as_ref() == Some(self) => {
                Ok(Value::Literal(lit))
            }
            Value::Literal(lit) => Err(ModelError::bad_value(
                feature,
                format!("literal '{}' is not a member of {}", lit.name(), self.name()),
            )),
            Value::String(name) => self.literal(&name).map(Value::Literal).ok_or_else(|| {
                ModelError::bad_value(
                    feature,
                    format!("'{}' is not a literal of {}", name, self.name()),
                )
            }),
            other => Err(ModelError::bad_value(
                feature,
                format!("expected a literal of {} but got {}", self.name(), other.type_name()),
            )),
        }
    }

    /// Decode a value from its string form
    ///
    /// # Errors
    ///
    /// `BadValue` when the text does not decode.
    pub fn from_string(&self, text: &str) -> Result<Value> {
        let codec = self.0.codec.borrow().clone();
        if let Some(codec) = codec {
            return (codec.from_string)(text);
        }
        if self.is_enum() {
            return self
                .literal(text)
                .or_else(|| text.trim().parse::<i64>().ok().and_then(|v| self.literal_by_value(v)))
                .map(Value::Literal)
                .ok_or_else(|| {
                    ModelError::bad_value(
                        self.name(),
                        format!("'{}' is not a literal of {}", text, self.name()),
                    )
                });
        }
        value::decode(self.kind(), text)
    }

    /// Encode a value to its string form
    ///
    /// # Errors
    ///
    /// `BadValue` for values that have no string form.
    pub fn to_string(&self, value: &Value) -> Result<String> {
        let codec = self.0.codec.borrow().clone();
        if let Some(codec) = codec {
            return (codec.to_string)(value);
        }
        match value {
            Value::Literal(lit) => Ok(lit.literal()),
            other => value::encode(self.kind(), other),
        }
    }
}

impl MetaObject for EDataType {
    fn e_class(&self) -> EClass {
        let kind = if self.is_enum() {
            ecore::MetaKind::Enum
        } else {
            ecore::MetaKind::DataType
        };
        ecore::resolve_meta(&self.0.meta, kind)
    }

    fn meta_attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name())),
            "instanceClassName" => self.instance_class_name().map(Value::String),
            "serializable" => Some(Value::Bool(self.is_serializable())),
            _ => None,
        }
    }

    fn set_meta_attribute(&self, name: &str, value: &Value) -> Result<()> {
        match name {
            "name" => self.set_name(&ecore::expect_string(name, value)?),
            "instanceClassName" => {
                let text = ecore::expect_string(name, value)?;
                if !self.is_enum() {
                    self.set_kind(ecore::kind_for_instance_class(&text));
                }
                self.set_instance_class_name(Some(&text));
            }
            "serializable" => self.set_serializable(ecore::expect_bool(name, value)?),
            _ => return Err(ecore::unknown_meta_feature(&self.e_class(), name)),
        }
        Ok(())
    }
}

pub(crate) struct LiteralData {
    pub(crate) name: RefCell<String>,
    value: Cell<i64>,
    literal: RefCell<Option<String>>,
    enumeration: RefCell<Weak<DataTypeData>>,
    pub(crate) meta: RefCell<Weak<ClassData>>,
}

/// A literal of an enumeration
#[derive(Clone)]
pub struct EEnumLiteral(pub(crate) Rc<LiteralData>);

meta_handle!(EEnumLiteral, LiteralData);

impl EEnumLiteral {
    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn value(&self) -> i64 {
        self.0.value.get()
    }

    /// Serialized form; defaults to the name
    pub fn literal(&self) -> String {
        self.0
            .literal
            .borrow()
            .clone()
            .unwrap_or_else(|| self.name())
    }

    pub fn set_literal(&self, literal: Option<&str>) {
        *self.0.literal.borrow_mut() = literal.map(str::to_string);
    }

    pub fn enumeration(&self) -> Option<EDataType> {
        EDataType::from_weak(&self.0.enumeration.borrow())
    }
}

impl MetaObject for EEnumLiteral {
    fn e_class(&self) -> EClass {
        ecore::resolve_meta(&self.0.meta, ecore::MetaKind::EnumLiteral)
    }

    fn meta_attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name())),
            "value" => Some(Value::Int(self.value())),
            "literal" => self.0.literal.borrow().clone().map(Value::String),
            _ => None,
        }
    }

    fn set_meta_attribute(&self, name: &str, value: &Value) -> Result<()> {
        match name {
            "name" => *self.0.name.borrow_mut() = ecore::expect_string(name, value)?,
            "value" => self.0.value.set(ecore::expect_int(name, value)?),
            "literal" => self.set_literal(Some(&ecore::expect_string(name, value)?)),
            _ => return Err(ecore::unknown_meta_feature(&self.e_class(), name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colors() -> EDataType {
        let e = EDataType::new_enum("Color");
        e.add_literal("red", 0);
        e.add_literal("green", 1);
        e
    }

    #[test]
    fn test_enum_default_is_first_literal() {
        let e = colors();
        let default = e.default_value();
        assert_eq!(default.as_literal().map(EEnumLiteral::name), Some("red".to_string()));
    }

    #[test]
    fn test_enum_accepts_name_or_literal() {
        let e = colors();
        let by_name = e.check("color", Value::from("green")).unwrap();
        let green = e.literal("green").unwrap();
        assert_eq!(by_name, Value::Literal(green.clone()));
        assert_eq!(e.check("color", Value::Literal(green.clone())).unwrap(), Value::Literal(green));
    }

    #[test]
    fn test_enum_rejects_foreign_literal() {
        let e = colors();
        let other = EDataType::new_enum("Size");
        let small = other.add_literal("small", 0);
        assert!(matches!(e.check("color", Value::Literal(small)), Err(ModelError::BadValue { .. })));
        assert!(e.check("color", Value::from("purple")).is_err());
        assert!(e.check("color", Value::Int(1)).is_err());
    }

    #[test]
    fn test_enum_string_codec() {
        let e = colors();
        let green = e.from_string("green").unwrap();
        assert_eq!(e.to_string(&green).unwrap(), "green");
        assert_eq!(e.from_string("1").unwrap(), green);
    }

    #[test]
    fn test_custom_codec_wins() {
        let t = EDataType::new("Upper", ValueKind::String);
        t.set_codec(
            |s| Ok(Value::String(s.to_lowercase())),
            |v| Ok(v.as_str().unwrap_or_default().to_uppercase()),
        );
        assert_eq!(t.from_string("ABC").unwrap(), Value::from("abc"));
        assert_eq!(t.to_string(&Value::from("abc")).unwrap(), "ABC");
    }

    #[test]
    fn test_data_type_default_override() {
        let t = EDataType::new("Count", ValueKind::Int);
        assert_eq!(t.default_value(), Value::Int(0));
        t.set_default_value(Some(Value::Int(7)));
        assert_eq!(t.default_value(), Value::Int(7));
    }
}
