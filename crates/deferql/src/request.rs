use std::any::Any;

use async_graphql_parser::{
    types::{DocumentOperations, ExecutableDocument, OperationDefinition},
    Positioned,
};
use async_graphql_value::Variables;

use crate::{context::Data, error::ServerError};

/// One GraphQL request: the query source plus everything the execution
/// environment is seeded with.
#[derive(Debug)]
pub struct Request {
    pub query: String,
    pub operation_name: Option<String>,
    pub variables: Variables,
    pub root_value: serde_json::Value,
    pub data: Data,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: Variables::default(),
            root_value: serde_json::Value::Null,
            data: Data::default(),
        }
    }

    #[must_use]
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn root_value(mut self, value: serde_json::Value) -> Self {
        self.root_value = value;
        self
    }

    /// Insert request-scoped data reachable from `ResolveInfo::data`.
    #[must_use]
    pub fn data<D: Any + Send + Sync>(mut self, data: D) -> Self {
        self.data.insert(data);
        self
    }
}

impl<T: Into<String>> From<T> for Request {
    fn from(query: T) -> Self {
        Self::new(query)
    }
}

/// Pick the operation the request asks for. Documents are assumed validated
/// upstream, but operation selection can still fail.
pub(crate) fn extract_operation(
    document: &ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<Positioned<OperationDefinition>, ServerError> {
    match (&document.operations, operation_name) {
        (DocumentOperations::Single(operation), _) => Ok(operation.clone()),
        (DocumentOperations::Multiple(operations), Some(name)) => operations
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::new(format!(r#"Unknown operation named "{name}""#), None)),
        (DocumentOperations::Multiple(operations), None) => {
            if operations.len() == 1 {
                Ok(operations.values().next().expect("length checked").clone())
            } else {
                Err(ServerError::new("Operation name required in request", None))
            }
        }
    }
}
