//! Type parameters and generic types

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::class::ClassData;
use super::{ecore, meta_handle, EClass, EClassifier, MetaObject};
use crate::errors::Result;
use crate::value::Value;

pub(crate) struct TypeParameterData {
    pub(crate) name: RefCell<String>,
    bounds: RefCell<Vec<EGenericType>>,
    pub(crate) meta: RefCell<Weak<ClassData>>,
}

/// A type parameter of a generic class or operation
#[derive(Clone)]
pub struct ETypeParameter(pub(crate) Rc<TypeParameterData>);

meta_handle!(ETypeParameter, TypeParameterData);

impl ETypeParameter {
    pub fn new(name: &str) -> Self {
        ETypeParameter(Rc::new(TypeParameterData {
            name: RefCell::new(name.to_string()),
            bounds: RefCell::new(Vec::new()),
            meta: RefCell::new(ecore::meta_class_weak(ecore::MetaKind::TypeParameter)),
        }))
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn bounds(&self) -> Vec<EGenericType> {
        self.0.bounds.borrow().clone()
    }

    pub fn add_bound(&self, bound: EGenericType) {
        self.0.bounds.borrow_mut().push(bound);
    }

    /// Erasure: the first bound's erasure, `None` for an unbounded parameter
    pub fn erasure(&self) -> Option<EClassifier> {
        self.0.bounds.borrow().first().and_then(EGenericType::erasure)
    }
}

impl MetaObject for ETypeParameter {
    fn e_class(&self) -> EClass {
        ecore::resolve_meta(&self.0.meta, ecore::MetaKind::TypeParameter)
    }

    fn meta_attribute(&self, name: &str) -> Option<Value> {
        (name == "name").then(|| Value::String(self.name()))
    }

    fn set_meta_attribute(&self, name: &str, value: &Value) -> Result<()> {
        if name != "name" {
            return Err(ecore::unknown_meta_feature(&self.e_class(), name));
        }
        *self.0.name.borrow_mut() = ecore::expect_string(name, value)?;
        Ok(())
    }
}

/// A type expression: a classifier with arguments, or a type parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EGenericType {
    pub classifier: Option<EClassifier>,
    pub type_parameter: Option<ETypeParameter>,
    pub arguments: Vec<EGenericType>,
}

impl EGenericType {
    pub fn of(classifier: impl Into<EClassifier>) -> Self {
        EGenericType {
            classifier: Some(classifier.into()),
            type_parameter: None,
            arguments: Vec::new(),
        }
    }

    pub fn parameter(parameter: &ETypeParameter) -> Self {
        EGenericType {
            classifier: None,
            type_parameter: Some(parameter.clone()),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: EGenericType) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Raw classifier values of this type must conform to
    pub fn erasure(&self) -> Option<EClassifier> {
        match (&self.classifier, &self.type_parameter) {
            (Some(c), _) => Some(c.clone()),
            (None, Some(p)) => p.erasure(),
            (None, None) => None,
        }
    }

    pub fn e_class(&self) -> EClass {
        ecore::ecore().e_generic_type.clone()
    }
}
