use serde_json::Value;

use crate::{
    error::{PathSegment, ServerError},
    query_path::QueryPathSegment,
};

/// The result of executing a query.
#[derive(Debug, Default, serde::Serialize)]
pub struct Response {
    /// Data of the query result. `null` when nothing completed at the top
    /// level or when a non-null violation propagated all the way up.
    pub data: Value,

    /// Errors, deduplicated, in order of first appearance.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<ServerError>,
}

impl Response {
    /// Create a new successful response with the data.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    /// Create a response from some errors.
    #[must_use]
    pub fn from_errors(errors: Vec<ServerError>) -> Self {
        Self {
            data: Value::Null,
            errors,
        }
    }

    pub fn to_json_value(&self) -> serde_json::Result<Value> {
        let mut fields = serde_json::Map::new();
        fields.insert("data".to_string(), self.data.clone());
        if !self.errors.is_empty() {
            fields.insert("errors".to_string(), serde_json::to_value(&self.errors)?);
        }
        Ok(Value::Object(fields))
    }

    /// Returns `true` if the response carries no errors.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    #[inline]
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    /// Extract the errors from the response. Only if the `errors` field is
    /// empty will this return `Ok`.
    #[inline]
    pub fn into_result(self) -> Result<Self, Vec<ServerError>> {
        if self.is_err() {
            Err(self.errors)
        } else {
            Ok(self)
        }
    }
}

/// Folds one completed piece into the response tree, creating intermediate
/// objects and arrays on the way. String segments demand objects, numeric
/// segments demand arrays; a conflict is a programmer error. List positions
/// skipped over fill with `null`.
pub(crate) fn insert_at_path(data: &mut Value, path: &[QueryPathSegment], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        *data = value;
        return;
    };
    match segment {
        QueryPathSegment::Field(key) => {
            if data.is_null() {
                *data = Value::Object(serde_json::Map::new());
            }
            let Value::Object(map) = data else {
                panic!("expected an object while inserting `{key}` into the response tree");
            };
            let slot = map.entry(key.clone()).or_insert(Value::Null);
            insert_at_path(slot, rest, value);
        }
        QueryPathSegment::Index(index) => {
            if data.is_null() {
                *data = Value::Array(Vec::new());
            }
            let Value::Array(items) = data else {
                panic!("expected a list while inserting index {index} into the response tree");
            };
            while items.len() <= *index {
                items.push(Value::Null);
            }
            insert_at_path(&mut items[*index], rest, value);
        }
        QueryPathSegment::Flatten => {
            panic!("completed piece paths are always concrete");
        }
    }
}

/// Nulls the value at an error path prefix, for non-null propagation. The
/// addressed position is created when missing; an unresolved `"@"` segment
/// conservatively nulls the list it stands in.
pub(crate) fn set_null_at(data: &mut Value, path: &[PathSegment]) {
    let Some((segment, rest)) = path.split_first() else {
        *data = Value::Null;
        return;
    };
    match segment {
        PathSegment::Field(name) if name == "@" => {
            *data = Value::Null;
        }
        PathSegment::Field(name) => {
            if data.is_null() {
                *data = Value::Object(serde_json::Map::new());
            }
            let Value::Object(map) = data else {
                return;
            };
            let slot = map.entry(name.clone()).or_insert(Value::Null);
            set_null_at(slot, rest);
        }
        PathSegment::Index(index) => {
            if data.is_null() {
                *data = Value::Array(Vec::new());
            }
            let Value::Array(items) = data else {
                return;
            };
            while items.len() <= *index {
                items.push(Value::Null);
            }
            set_null_at(&mut items[*index], rest);
        }
    }
}
