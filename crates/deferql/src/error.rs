use std::{
    any::Any,
    collections::BTreeMap,
    fmt::{self, Debug, Display, Formatter},
    sync::Arc,
};

use async_graphql_parser::Pos;
use serde::ser::SerializeMap;

/// Alias for `Result<T, ServerError>`.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// An alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A path segment of a GraphQL error, as it appears in the response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A field name or response key.
    Field(String),
    /// An index into a list.
    Index(usize),
}

/// Extensions attached to an error, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ErrorExtensionValues(pub BTreeMap<String, serde_json::Value>);

impl ErrorExtensionValues {
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An error that appears in the `errors` array of a GraphQL response.
#[derive(Clone)]
pub struct ServerError {
    /// The error message.
    pub message: String,
    /// The underlying error, if any, for callers that want to downcast.
    pub source: Option<Arc<dyn Any + Send + Sync>>,
    /// Locations in the query document this error applies to.
    pub locations: Vec<Pos>,
    /// The response path of the field that errored.
    pub path: Vec<PathSegment>,
    /// Extensions to the error.
    pub extensions: Option<ErrorExtensionValues>,
}

impl ServerError {
    pub fn new(message: impl Into<String>, pos: Option<Pos>) -> Self {
        Self {
            message: message.into(),
            source: None,
            locations: pos.into_iter().collect(),
            path: Vec::new(),
            extensions: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    /// A stable identity for deduplication: errors serializing to the same
    /// JSON are considered the same error.
    pub(crate) fn fingerprint(&self) -> String {
        serde_json::to_string(self).expect("ServerError serialization is infallible")
    }
}

impl Debug for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerError")
            .field("message", &self.message)
            .field("locations", &self.locations)
            .field("path", &self.path)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ServerError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
            && self.locations == other.locations
            && self.path == other.path
            && self.extensions == other.extensions
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl serde::Serialize for ServerError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct Location {
            line: usize,
            column: usize,
        }

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("message", &self.message)?;
        if !self.locations.is_empty() {
            let locations = self
                .locations
                .iter()
                .map(|pos| Location {
                    line: pos.line,
                    column: pos.column,
                })
                .collect::<Vec<_>>();
            map.serialize_entry("locations", &locations)?;
        }
        if !self.path.is_empty() {
            map.serialize_entry("path", &self.path)?;
        }
        if let Some(extensions) = self.extensions.as_ref().filter(|e| !e.is_empty()) {
            map.serialize_entry("extensions", extensions)?;
        }
        map.end()
    }
}

/// Marker stored as an [`Error`] source when a resolver awaited a wrapped
/// value whose data has not been materialized yet. The scheduler intercepts
/// it to restage the field after the next batch; it never escapes `execute`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NextStage;

/// An error raised by a resolver, a serializer or the deferred backend.
#[derive(Clone)]
pub struct Error {
    /// The error message.
    pub message: String,
    /// The source of the error.
    pub source: Option<Arc<dyn Any + Send + Sync>>,
    /// Extensions to the error.
    pub extensions: Option<ErrorExtensionValues>,
}

impl Error {
    /// Create an error from the given error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            extensions: None,
        }
    }

    /// Create an error with a type that implements `Display`, and it will also
    /// set the `source` of the error to this value.
    pub fn new_with_source(source: impl Display + Send + Sync + 'static) -> Self {
        Self {
            message: source.to_string(),
            source: Some(Arc::new(source)),
            extensions: None,
        }
    }

    /// The sentinel raised by awaiting an unmaterialized wrapped value.
    pub(crate) fn next_stage() -> Self {
        Self {
            message: "deferred value has not been materialized yet".to_string(),
            source: Some(Arc::new(NextStage)),
            extensions: None,
        }
    }

    pub(crate) fn is_next_stage(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| source.downcast_ref::<NextStage>().is_some())
    }

    /// Convert the error to a server error at the given position.
    #[must_use]
    pub fn into_server_error(self, pos: Pos) -> ServerError {
        ServerError {
            message: self.message,
            source: self.source,
            locations: vec![pos],
            path: Vec::new(),
            extensions: self.extensions,
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("message", &self.message)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message && self.extensions == other.extensions
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::new(value.to_string())
    }
}

impl From<ServerError> for Error {
    fn from(value: ServerError) -> Self {
        Self {
            message: value.message,
            source: value.source,
            extensions: value.extensions,
        }
    }
}
