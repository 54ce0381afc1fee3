//! Operations and their parameters

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::class::ClassData;
use super::{ecore, meta_handle, EClass, EClassifier, ETypeParameter, MetaObject};
use crate::errors::Result;
use crate::model::ObjectId;
use crate::ops::ResourceSet;
use crate::value::Value;

/// Behavior bound to an operation: `(resource set, receiver, arguments)`
pub type OperationBody = Rc<dyn Fn(&mut ResourceSet, ObjectId, &[Value]) -> Result<Value>>;

pub(crate) struct OperationData {
    pub(crate) name: RefCell<String>,
    e_type: RefCell<Option<EClassifier>>,
    lower: Cell<i64>,
    upper: Cell<i64>,
    parameters: RefCell<Vec<EParameter>>,
    type_parameters: RefCell<Vec<ETypeParameter>>,
    containing_class: RefCell<Weak<ClassData>>,
    body: RefCell<Option<OperationBody>>,
    pub(crate) meta: RefCell<Weak<ClassData>>,
}

/// An operation declared on a class
#[derive(Clone)]
pub struct EOperation(pub(crate) Rc<OperationData>);

meta_handle!(EOperation, OperationData);

impl EOperation {
    /// Operation returning `return_type` (`None` for no result)
    pub fn new(name: &str, return_type: Option<EClassifier>) -> Self {
        EOperation(Rc::new(OperationData {
            name: RefCell::new(name.to_string()),
            e_type: RefCell::new(return_type),
            lower: Cell::new(0),
            upper: Cell::new(1),
            parameters: RefCell::new(Vec::new()),
            type_parameters: RefCell::new(Vec::new()),
            containing_class: RefCell::new(Weak::new()),
            body: RefCell::new(None),
            meta: RefCell::new(ecore::meta_class_weak(ecore::MetaKind::Operation)),
        }))
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn e_type(&self) -> Option<EClassifier> {
        self.0.e_type.borrow().clone()
    }

    pub fn set_e_type(&self, e_type: Option<EClassifier>) {
        *self.0.e_type.borrow_mut() = e_type;
    }

    pub fn is_many(&self) -> bool {
        let upper = self.0.upper.get();
        upper < 0 || upper > 1
    }

    pub fn set_bounds(&self, lower: i64, upper: i64) {
        self.0.lower.set(lower);
        self.0.upper.set(upper);
    }

    pub fn parameters(&self) -> Vec<EParameter> {
        self.0.parameters.borrow().clone()
    }

    /// Append a parameter
    pub fn add_parameter(&self, name: &str, e_type: impl Into<EClassifier>) -> EParameter {
        let parameter = EParameter::new(name, Some(e_type.into()));
        self.push_parameter(parameter.clone());
        parameter
    }

    pub(crate) fn push_parameter(&self, parameter: EParameter) {
        *parameter.0.operation.borrow_mut() = self.downgrade();
        self.0.parameters.borrow_mut().push(parameter);
    }

    pub fn type_parameters(&self) -> Vec<ETypeParameter> {
        self.0.type_parameters.borrow().clone()
    }

    pub fn add_type_parameter(&self, parameter: ETypeParameter) {
        self.0.type_parameters.borrow_mut().push(parameter);
    }

    pub fn containing_class(&self) -> Option<EClass> {
        EClass::from_weak(&self.0.containing_class.borrow())
    }

    pub(crate) fn set_containing_class(&self, class: Option<&EClass>) {
        *self.0.containing_class.borrow_mut() = class.map(EClass::downgrade).unwrap_or_default();
    }

    pub fn body(&self) -> Option<OperationBody> {
        self.0.body.borrow().clone()
    }

    /// Bind the behavior invoked by `ops::invoke`
    pub fn set_body(
        &self,
        body: impl Fn(&mut ResourceSet, ObjectId, &[Value]) -> Result<Value> + 'static,
    ) {
        *self.0.body.borrow_mut() = Some(Rc::new(body));
    }

    /// Builder form of [`Self::set_body`]
    pub fn with_body(
        self,
        body: impl Fn(&mut ResourceSet, ObjectId, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.set_body(body);
        self
    }
}

impl MetaObject for EOperation {
    fn e_class(&self) -> EClass {
        ecore::resolve_meta(&self.0.meta, ecore::MetaKind::Operation)
    }

    fn meta_attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name())),
            "lowerBound" => Some(Value::Int(self.0.lower.get())),
            "upperBound" => Some(Value::Int(self.0.upper.get())),
            "ordered" | "unique" => Some(Value::Bool(true)),
            "many" => Some(Value::Bool(self.is_many())),
            _ => None,
        }
    }

    fn set_meta_attribute(&self, name: &str, value: &Value) -> Result<()> {
        match name {
            "name" => *self.0.name.borrow_mut() = ecore::expect_string(name, value)?,
            "lowerBound" => self.0.lower.set(ecore::expect_int(name, value)?),
            "upperBound" => self.0.upper.set(ecore::expect_int(name, value)?),
            "ordered" | "unique" => {
                ecore::expect_bool(name, value)?;
            }
            _ => return Err(ecore::unknown_meta_feature(&self.e_class(), name)),
        }
        Ok(())
    }
}

pub(crate) struct ParameterData {
    pub(crate) name: RefCell<String>,
    e_type: RefCell<Option<EClassifier>>,
    lower: Cell<i64>,
    upper: Cell<i64>,
    operation: RefCell<Weak<OperationData>>,
    pub(crate) meta: RefCell<Weak<ClassData>>,
}

/// A parameter of an operation
#[derive(Clone)]
pub struct EParameter(pub(crate) Rc<ParameterData>);

meta_handle!(EParameter, ParameterData);

impl EParameter {
    pub fn new(name: &str, e_type: Option<EClassifier>) -> Self {
        EParameter(Rc::new(ParameterData {
            name: RefCell::new(name.to_string()),
            e_type: RefCell::new(e_type),
            lower: Cell::new(0),
            upper: Cell::new(1),
            operation: RefCell::new(Weak::new()),
            meta: RefCell::new(ecore::meta_class_weak(ecore::MetaKind::Parameter)),
        }))
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn e_type(&self) -> Option<EClassifier> {
        self.0.e_type.borrow().clone()
    }

    pub fn set_e_type(&self, e_type: Option<EClassifier>) {
        *self.0.e_type.borrow_mut() = e_type;
    }

    pub fn is_many(&self) -> bool {
        let upper = self.0.upper.get();
        upper < 0 || upper > 1
    }

    pub fn operation(&self) -> Option<EOperation> {
        EOperation::from_weak(&self.0.operation.borrow())
    }
}

impl MetaObject for EParameter {
    fn e_class(&self) -> EClass {
        ecore::resolve_meta(&self.0.meta, ecore::MetaKind::Parameter)
    }

    fn meta_attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name())),
            "lowerBound" => Some(Value::Int(self.0.lower.get())),
            "upperBound" => Some(Value::Int(self.0.upper.get())),
            "ordered" | "unique" => Some(Value::Bool(true)),
            "many" => Some(Value::Bool(self.is_many())),
            _ => None,
        }
    }

    fn set_meta_attribute(&self, name: &str, value: &Value) -> Result<()> {
        match name {
            "name" => *self.0.name.borrow_mut() = ecore::expect_string(name, value)?,
            "lowerBound" => self.0.lower.set(ecore::expect_int(name, value)?),
            "upperBound" => self.0.upper.set(ecore::expect_int(name, value)?),
            "ordered" | "unique" => {
                ecore::expect_bool(name, value)?;
            }
            _ => return Err(ecore::unknown_meta_feature(&self.e_class(), name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{make_class, make_package};

    #[test]
    fn test_parameters_point_back_to_operation() {
        let op = EOperation::new("rename", None);
        let p = op.add_parameter("to", ecore::e_string());
        assert_eq!(p.operation(), Some(op.clone()));
        assert_eq!(op.parameters(), vec![p]);
    }

    #[test]
    fn test_add_operation_sets_owner() {
        let pkg = make_package("o", "http://o", "o");
        let class = make_class(&pkg, "Counter");
        let op = class.add_operation(EOperation::new("next", Some(ecore::e_int().into()))).unwrap();

        assert_eq!(op.containing_class(), Some(class.clone()));
        assert_eq!(class.lookup_operation("next"), Some(op.clone()));
        assert!(class.add_operation(op).is_err());
    }
}
