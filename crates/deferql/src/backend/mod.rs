//! The pluggable contract for a deferred-expression system.
//!
//! A deferred backend owns an opaque expression type. Resolvers may return
//! such expressions instead of values; the executor collects every expression
//! that can be computed without further resolver input into one batch and
//! submits it in a single [`DeferredBackend::resolve_deferred`] call.

use std::sync::Arc;

use crate::{query_path::QueryPathSegment, Error, Result};

pub(crate) mod expand;
mod wrapped;

pub use wrapped::{FieldSource, ResolvedValue, WrappedValue};

pub(crate) use wrapped::SourceValue;

/// Installs an updated expression into a batch slot or into a composite
/// expression builder owned by the backend. Calling it again replaces the
/// previous contribution; the batch freezes whatever was installed last.
pub type ExprSetter<E> = Arc<dyn Fn(E) + Send + Sync>;

/// A field selected under a deferred parent, as the backend sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedField {
    /// The key the field occupies in the response (alias or name).
    pub response_key: String,
    /// The schema field name.
    pub field_name: String,
}

/// One child produced by [`DeferredBackend::expand_children`]: the deferred
/// source the child's resolver will receive, and the setter through which the
/// child's own expression joins the parent composite.
pub struct ExpandedChild<E> {
    pub response_key: String,
    pub source: E,
    pub set_data: ExprSetter<E>,
}

/// The result of expanding a deferred object or list parent.
pub struct ExpandedChildren<E> {
    /// Path segments the expansion appended below the parent: one `Flatten`
    /// per unwrapped list layer.
    pub appended: Vec<QueryPathSegment>,
    pub children: Vec<ExpandedChild<E>>,
}

/// A concrete candidate of an abstract type, with the fields selected for it.
#[derive(Debug, Clone)]
pub struct AbstractCandidate {
    pub type_name: String,
    pub fields: Vec<SelectedField>,
}

/// One concrete branch produced by [`DeferredBackend::expand_abstract_type`].
pub struct ExpandedConcrete<E> {
    pub type_name: String,
    /// One `Flatten` per unwrapped list layer, as for [`ExpandedChildren`].
    pub appended: Vec<QueryPathSegment>,
    pub children: Vec<ExpandedChild<E>>,
}


/// A deferred-expression system the executor can batch work against.
#[async_trait::async_trait]
pub trait DeferredBackend: Send + Sync + 'static {
    /// The opaque expression type. The backend decides identity.
    type Expr: Clone + Send + Sync + 'static;

    /// Lift an already-materialized value into an expression, so it can ride
    /// a batch slot next to genuinely deferred siblings.
    fn lit(&self, value: serde_json::Value) -> Self::Expr;

    /// The expression selecting a property of a deferred parent. Drives
    /// property access on wrapped values.
    fn project(&self, parent: &Self::Expr, field: &str) -> Self::Expr;

    /// Evaluate the whole batch in one round-trip, returning one result per
    /// entry, in order. A transport failure fails the entire batch.
    async fn resolve_deferred(&self, batch: Vec<Self::Expr>) -> Result<Vec<serde_json::Value>, Error>;

    /// Expand a deferred object (or list of objects, `list_depth` layers
    /// deep) into one child per selected field. Each child's `set_data`
    /// updates a composite owned by the backend, which must re-install the
    /// whole updated expression through `set_parent`. When materialized, the
    /// composite yields one object per (nested) element carrying exactly the
    /// installed keys.
    fn expand_children(
        &self,
        parent: &Self::Expr,
        list_depth: usize,
        fields: &[SelectedField],
        set_parent: ExprSetter<Self::Expr>,
    ) -> Result<ExpandedChildren<Self::Expr>, Error>;

    /// Expand a deferred value of an abstract type into one branch per
    /// concrete candidate. The materialized composite must carry a
    /// `__typename` sibling on every (nested) element so the executor can
    /// tell which branch applies. Backends that cannot dispatch abstract
    /// types statically keep the default.
    fn expand_abstract_type(
        &self,
        _parent: &Self::Expr,
        abstract_type: &str,
        _candidates: &[AbstractCandidate],
        _list_depth: usize,
        _set_parent: ExprSetter<Self::Expr>,
    ) -> Result<Vec<ExpandedConcrete<Self::Expr>>, Error> {
        Err(Error::new(format!(
            "The deferred backend cannot expand the abstract type `{abstract_type}`"
        )))
    }

    /// Decode a per-field error annotation the backend may have embedded in
    /// an otherwise-normal materialized result.
    fn error_message(&self, _value: &serde_json::Value) -> Option<String> {
        None
    }
}
