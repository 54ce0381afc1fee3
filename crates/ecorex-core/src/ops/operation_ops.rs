//! Invoking operations with bound behavior

use crate::errors::{ModelError, Result};
use crate::meta::{EClassifier, EParameter};
use crate::model::ObjectId;
use crate::ops::{atomically, proxy_ops, ResourceSet};
use crate::value::Value;

/// Call the most specific operation `name` of the receiver's class
///
/// Arguments are checked against the parameter types (data-type values are
/// coerced the same way feature writes are). The body runs as one atomic
/// mutation: if it fails, every write it made is reverted.
///
/// # Errors
///
/// `UnknownOperation` when no class in the super-type closure declares
/// `name`, `BadValue` for an arity or type mismatch, and
/// `OperationNotImplemented` when the operation has no behavior bound.
pub fn invoke(rs: &mut ResourceSet, object: ObjectId, name: &str, args: &[Value]) -> Result<Value> {
    let object = proxy_ops::deref(rs, object)?;
    let class = rs.class_of(object)?;
    let operation = class.lookup_operation(name).ok_or_else(|| ModelError::UnknownOperation {
        class: class.name(),
        operation: name.to_string(),
    })?;
    let parameters = operation.parameters();
    if parameters.len() != args.len() {
        return Err(ModelError::bad_value(
            name,
            format!("expected {} arguments, got {}", parameters.len(), args.len()),
        ));
    }
    let args = parameters
        .iter()
        .zip(args)
        .map(|(p, a)| check_argument(rs, p, a.clone()))
        .collect::<Result<Vec<_>>>()?;
    let body = operation.body().ok_or_else(|| ModelError::OperationNotImplemented {
        operation: format!("{}.{}", class.name(), name),
    })?;
    tracing::debug!(object = %object, operation = name, "invoke");
    atomically(rs, |rs| body(rs, object, &args))
}

fn check_argument(rs: &ResourceSet, parameter: &EParameter, value: Value) -> Result<Value> {
    if parameter.is_many() {
        let Value::List(items) = value else {
            return Err(ModelError::bad_value(parameter.name(), "many-valued parameter needs a list"));
        };
        return items
            .into_iter()
            .map(|item| check_element(rs, parameter, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::List);
    }
    check_element(rs, parameter, value)
}

fn check_element(rs: &ResourceSet, parameter: &EParameter, value: Value) -> Result<Value> {
    match parameter.e_type() {
        None => Ok(value),
        Some(EClassifier::DataType(data_type)) => data_type.check(&parameter.name(), value),
        Some(EClassifier::Class(class)) => match value {
            Value::Null => Ok(Value::Null),
            Value::Object(id) if class.is_super_type_of(&rs.class_of(id)?) => Ok(Value::Object(id)),
            other => Err(ModelError::bad_value(
                parameter.name(),
                format!("expected a {} object but got {}", class.name(), other.type_name()),
            )),
        },
    }
}
