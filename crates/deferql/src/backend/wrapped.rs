use std::sync::Arc;

use super::DeferredBackend;
use crate::{Error, Result};

/// A facade over a deferred expression through which a resolver can both
/// synthesize new expressions by property access and, by awaiting
/// [`WrappedValue::materialized`], ask for the actual data. The latter
/// suspends the field until the next batch boundary.
pub struct WrappedValue<B: DeferredBackend> {
    backend: Arc<B>,
    expr: B::Expr,
}

impl<B: DeferredBackend> Clone for WrappedValue<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            expr: self.expr.clone(),
        }
    }
}

impl<B: DeferredBackend> WrappedValue<B> {
    pub(crate) fn new(backend: Arc<B>, expr: B::Expr) -> Self {
        Self { backend, expr }
    }

    /// A wrapped value selecting the given property of this one.
    #[must_use]
    pub fn get(&self, field: &str) -> WrappedValue<B> {
        WrappedValue {
            backend: Arc::clone(&self.backend),
            expr: self.backend.project(&self.expr, field),
        }
    }

    pub fn expr(&self) -> &B::Expr {
        &self.expr
    }

    pub fn into_expr(self) -> B::Expr {
        self.expr
    }

    /// The materialized data behind this expression.
    ///
    /// The data is never available on the first pass; this fails with the
    /// restage sentinel, the executor parks the field, and re-runs the
    /// resolver with a material source once the batch has returned.
    pub async fn materialized(&self) -> Result<serde_json::Value, Error> {
        Err(Error::next_stage())
    }
}

/// The source value a resolver receives: either plain data or a wrapped
/// deferred expression.
pub enum FieldSource<B: DeferredBackend> {
    Material(serde_json::Value),
    Wrapped(WrappedValue<B>),
}

impl<B: DeferredBackend> Clone for FieldSource<B> {
    fn clone(&self) -> Self {
        match self {
            FieldSource::Material(value) => FieldSource::Material(value.clone()),
            FieldSource::Wrapped(wrapped) => FieldSource::Wrapped(wrapped.clone()),
        }
    }
}

impl<B: DeferredBackend> FieldSource<B> {
    /// Select a property of the source, staying deferred if the source is.
    #[must_use]
    pub fn get(&self, field: &str) -> FieldSource<B> {
        match self {
            FieldSource::Material(value) => {
                FieldSource::Material(value.get(field).cloned().unwrap_or(serde_json::Value::Null))
            }
            FieldSource::Wrapped(wrapped) => FieldSource::Wrapped(wrapped.get(field)),
        }
    }

    /// The materialized source data. For a wrapped source this suspends the
    /// field until the batch that computes it has returned.
    pub async fn materialized(&self) -> Result<serde_json::Value, Error> {
        match self {
            FieldSource::Material(value) => Ok(value.clone()),
            FieldSource::Wrapped(wrapped) => wrapped.materialized().await,
        }
    }

    pub fn as_material(&self) -> Option<&serde_json::Value> {
        match self {
            FieldSource::Material(value) => Some(value),
            FieldSource::Wrapped(_) => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, FieldSource::Wrapped(_))
    }
}

/// What a resolver returned: plain data, a deferred expression, or a wrapped
/// value (unwrapped to its expression before scheduling).
pub enum ResolvedValue<B: DeferredBackend> {
    Material(serde_json::Value),
    Deferred(B::Expr),
    Wrapped(WrappedValue<B>),
}

impl<B: DeferredBackend> ResolvedValue<B> {
    pub fn null() -> Self {
        ResolvedValue::Material(serde_json::Value::Null)
    }

    pub fn is_deferred(&self) -> bool {
        !matches!(self, ResolvedValue::Material(_))
    }
}

impl<B: DeferredBackend> From<serde_json::Value> for ResolvedValue<B> {
    fn from(value: serde_json::Value) -> Self {
        ResolvedValue::Material(value)
    }
}

impl<B: DeferredBackend> From<WrappedValue<B>> for ResolvedValue<B> {
    fn from(wrapped: WrappedValue<B>) -> Self {
        ResolvedValue::Wrapped(wrapped)
    }
}

/// A task-side source: material data or a bare deferred expression. Wrapped
/// into a [`FieldSource`] right before the resolver runs.
pub(crate) enum SourceValue<B: DeferredBackend> {
    Material(serde_json::Value),
    Deferred(B::Expr),
}

impl<B: DeferredBackend> Clone for SourceValue<B> {
    fn clone(&self) -> Self {
        match self {
            SourceValue::Material(value) => SourceValue::Material(value.clone()),
            SourceValue::Deferred(expr) => SourceValue::Deferred(expr.clone()),
        }
    }
}
