//! Per-execution environment and the values handed to resolvers.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    ops::Deref,
    sync::Arc,
};

use async_graphql_parser::{
    types::{Field, FragmentDefinition, OperationDefinition},
    Positioned,
};
use async_graphql_value::{ConstValue, Name, Variables};
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use ulid::Ulid;

use crate::{
    backend::{DeferredBackend, FieldSource, ResolvedValue},
    query_path::QueryPath,
    registry::MetaFieldType,
    Error, Result,
};

/// Schema- and request-scoped data, a type map as in `Request::data`.
#[derive(Default)]
pub struct Data(HashMap<TypeId, Box<dyn Any + Send + Sync>>);

impl Data {
    pub fn insert<D: Any + Send + Sync>(&mut self, data: D) {
        self.0.insert(TypeId::of::<D>(), Box::new(data));
    }

    pub fn get<D: Any + Send + Sync>(&self) -> Option<&D> {
        self.0.get(&TypeId::of::<D>()).and_then(|d| d.downcast_ref::<D>())
    }
}

impl Debug for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data").finish_non_exhaustive()
    }
}

/// Everything about the current execution that is shared between fields.
pub struct QueryEnvInner {
    pub operation: Positioned<OperationDefinition>,
    pub operation_name: Option<String>,
    pub fragments: HashMap<Name, Positioned<FragmentDefinition>>,
    pub variables: Variables,
    pub root_value: serde_json::Value,
    pub data: Arc<Data>,
    /// Unique per execution; resolvers can use it as a memoization key.
    pub execution_id: Ulid,
}

/// Cheap-clone handle to the execution environment.
#[derive(Clone)]
pub struct QueryEnv(Arc<QueryEnvInner>);

impl QueryEnv {
    pub fn new(inner: QueryEnvInner) -> Self {
        Self(Arc::new(inner))
    }
}

impl Deref for QueryEnv {
    type Target = QueryEnvInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Information about the field currently being resolved. Constructed per
/// invocation; resolvers must not retain it beyond the call.
#[derive(Clone)]
pub struct ResolveInfo {
    pub env: QueryEnv,
    /// Name of the type the field was selected on.
    pub parent_type: String,
    pub field_name: String,
    /// The response path of this field.
    pub path: QueryPath,
    pub return_type: MetaFieldType,
    pub field_node: Positioned<Field>,
}

impl ResolveInfo {
    /// The key this field occupies in the response.
    pub fn response_key(&self) -> &str {
        self.field_node.node.response_key().node.as_str()
    }

    pub fn data<D: Any + Send + Sync>(&self) -> Option<&D> {
        self.env.data.get::<D>()
    }
}

/// The arguments a field resolver is invoked with.
pub struct ResolverParams<B: DeferredBackend> {
    pub source: FieldSource<B>,
    pub args: IndexMap<Name, ConstValue>,
    pub info: ResolveInfo,
}

impl<B: DeferredBackend> ResolverParams<B> {
    pub fn arg(&self, name: &str) -> Option<&ConstValue> {
        self.args.get(name)
    }
}

/// A field resolver. Receives the parent source (material or wrapped), the
/// coerced arguments and the per-invocation info; returns plain data, a
/// deferred expression, or a wrapped value.
pub type BoxFieldResolver<B> =
    Arc<dyn Fn(ResolverParams<B>) -> BoxFuture<'static, Result<ResolvedValue<B>, Error>> + Send + Sync>;

/// Resolves the concrete object type of an abstract-typed value, or `None`
/// when it cannot tell.
pub type BoxTypeResolver =
    Arc<dyn Fn(&serde_json::Value, &ResolveInfo) -> Result<Option<String>, Error> + Send + Sync>;

/// Serializes a leaf value for the response.
pub type BoxSerializer =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, Error>> + Send + Sync>;

/// The default field resolver: property access on the source, staying
/// deferred when the source is deferred.
pub fn default_field_resolver<B: DeferredBackend>() -> BoxFieldResolver<B> {
    Arc::new(|params: ResolverParams<B>| {
        Box::pin(async move {
            match params.source.get(&params.info.field_name) {
                FieldSource::Material(value) => Ok(ResolvedValue::Material(value)),
                FieldSource::Wrapped(wrapped) => Ok(ResolvedValue::Wrapped(wrapped)),
            }
        })
    })
}

/// The default type resolver: reads the value's `__typename` property.
pub fn default_type_resolver() -> BoxTypeResolver {
    Arc::new(|value: &serde_json::Value, _info: &ResolveInfo| {
        Ok(value
            .get("__typename")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string))
    })
}

/// The identity serializer.
pub fn identity_serializer() -> BoxSerializer {
    Arc::new(|value| Box::pin(async move { Ok(value) }))
}
