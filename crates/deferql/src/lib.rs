//! # A multi-stage GraphQL executor for deferred backends
//!
//! Resolvers in this executor may return *deferred expressions*: opaque,
//! backend-owned descriptions of computation to run remotely. The scheduler
//! collects every deferred sub-tree that needs no further resolver input
//! into one combined batch, submits it in a single backend round-trip,
//! re-enters the resolver pipeline for fields that inspected materialized
//! data, and repeats until quiescence, assembling one GraphQL response with
//! standard semantics (field ordering, null propagation, abstract-type
//! dispatch, leaf serialization, error bubbling).
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::too_many_lines)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod context;
mod error;
mod executor;
pub mod middleware;
mod query_path;
pub mod registry;
mod request;
mod response;
pub mod resolver_utils;
mod schema;

pub use async_graphql_parser as parser;
pub use async_graphql_value::{ConstValue as Value, Name, Number, Variables};

pub use backend::{
    AbstractCandidate, DeferredBackend, ExpandedChild, ExpandedChildren, ExpandedConcrete, ExprSetter,
    FieldSource, ResolvedValue, SelectedField, WrappedValue,
};
pub use context::{
    default_field_resolver, default_type_resolver, BoxFieldResolver, BoxSerializer, BoxTypeResolver, Data,
    QueryEnv, ResolveInfo, ResolverParams,
};
pub use error::{Error, ErrorExtensionValues, PathSegment, Result, ServerError, ServerResult};
pub use executor::ExecutionOverrides;
pub use query_path::{DeferredPath, QueryPath, QueryPathSegment};
pub use registry::{
    EnumType, InputObjectType, InterfaceType, MetaField, MetaFieldType, MetaInputValue, MetaType, MetaTypeName,
    ObjectType, Registry, ScalarType, UnionType,
};
pub use request::Request;
pub use response::Response;
pub use schema::{Schema, SchemaBuilder};
