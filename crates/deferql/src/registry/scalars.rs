//! Best-effort output coercion for the built-in scalars. Custom scalars
//! without their own serializer pass values through untouched.

use std::sync::Arc;

use serde_json::Value;

use crate::{context::BoxSerializer, Error, Result};

/// The serializer for a built-in scalar, if `name` is one.
pub fn builtin_serializer(name: &str) -> Option<BoxSerializer> {
    let coerce: fn(Value) -> Result<Value, Error> = match name {
        "Int" => coerce_int,
        "Float" => coerce_float,
        "String" => coerce_string,
        "Boolean" => coerce_boolean,
        "ID" => coerce_id,
        _ => return None,
    };
    Some(Arc::new(move |value| Box::pin(async move { coerce(value) })))
}

fn coerce_int(value: Value) -> Result<Value, Error> {
    match &value {
        Value::Null => Ok(value),
        Value::Number(number) if number.is_i64() || number.is_u64() => Ok(value),
        other => Err(Error::new(format!("Cannot represent {} as an Int", kind_str(other)))),
    }
}

fn coerce_float(value: Value) -> Result<Value, Error> {
    match &value {
        Value::Null | Value::Number(_) => Ok(value),
        other => Err(Error::new(format!("Cannot represent {} as a Float", kind_str(other)))),
    }
}

fn coerce_string(value: Value) -> Result<Value, Error> {
    match value {
        Value::Null | Value::String(_) => Ok(value),
        Value::Number(number) => Ok(Value::String(number.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(Error::new(format!("Cannot represent {} as a String", kind_str(&other)))),
    }
}

fn coerce_boolean(value: Value) -> Result<Value, Error> {
    match &value {
        Value::Null | Value::Bool(_) => Ok(value),
        other => Err(Error::new(format!("Cannot represent {} as a Boolean", kind_str(other)))),
    }
}

fn coerce_id(value: Value) -> Result<Value, Error> {
    match value {
        Value::Null | Value::String(_) => Ok(value),
        Value::Number(number) if number.is_i64() || number.is_u64() => Ok(Value::String(number.to_string())),
        other => Err(Error::new(format!("Cannot represent {} as an ID", kind_str(&other)))),
    }
}

fn kind_str(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
