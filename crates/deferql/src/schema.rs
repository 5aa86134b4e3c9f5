use std::sync::Arc;

use async_graphql_parser::{parse_query, types::OperationType};
use ulid::Ulid;

use crate::{
    backend::DeferredBackend,
    context::{default_field_resolver, default_type_resolver, BoxFieldResolver, BoxTypeResolver, QueryEnv, QueryEnvInner},
    error::ServerError,
    executor::{Execution, ExecutionOverrides},
    middleware::MiddlewareBundles,
    registry::Registry,
    request::{extract_operation, Request},
    response::Response,
};

pub(crate) struct SchemaInner<B: DeferredBackend> {
    pub registry: Registry<B>,
    pub backend: Arc<B>,
    pub middlewares: MiddlewareBundles<B>,
    pub field_resolver: BoxFieldResolver<B>,
    pub type_resolver: BoxTypeResolver,
}

/// A registry bound to a deferred backend, plus the executor defaults.
/// Cheap to clone.
pub struct Schema<B: DeferredBackend>(Arc<SchemaInner<B>>);

impl<B: DeferredBackend> Clone for Schema<B> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<B: DeferredBackend> Schema<B> {
    pub fn build(registry: Registry<B>, backend: B) -> SchemaBuilder<B> {
        SchemaBuilder {
            registry,
            backend: Arc::new(backend),
            middlewares: MiddlewareBundles::default(),
            field_resolver: default_field_resolver(),
            type_resolver: default_type_resolver(),
        }
    }

    pub(crate) fn inner(&self) -> &SchemaInner<B> {
        &self.0
    }

    /// Execute one request to completion. Never fails outside the returned
    /// errors; programmer invariant violations panic instead.
    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        self.execute_with_overrides(request.into(), ExecutionOverrides::default())
            .await
    }

    /// Execute with per-request middleware bundles and resolver defaults
    /// composed outside the schema's.
    pub async fn execute_with_overrides(&self, request: Request, overrides: ExecutionOverrides<B>) -> Response {
        let document = match parse_query(&request.query) {
            Ok(document) => document,
            Err(error) => return Response::from_errors(vec![ServerError::new(error.to_string(), None)]),
        };

        let operation = match extract_operation(&document, request.operation_name.as_deref()) {
            Ok(operation) => operation,
            Err(error) => return Response::from_errors(vec![error]),
        };
        let serial = operation.node.ty == OperationType::Mutation;

        let env = QueryEnv::new(QueryEnvInner {
            operation,
            operation_name: request.operation_name,
            fragments: document.fragments,
            variables: request.variables,
            root_value: request.root_value,
            data: Arc::new(request.data),
            execution_id: Ulid::new(),
        });

        Execution::new(self.clone(), env, overrides, serial).run().await
    }
}

pub struct SchemaBuilder<B: DeferredBackend> {
    registry: Registry<B>,
    backend: Arc<B>,
    middlewares: MiddlewareBundles<B>,
    field_resolver: BoxFieldResolver<B>,
    type_resolver: BoxTypeResolver,
}

impl<B: DeferredBackend> SchemaBuilder<B> {
    /// Default middleware bundles applied to every execution.
    #[must_use]
    pub fn middlewares(mut self, middlewares: MiddlewareBundles<B>) -> Self {
        self.middlewares = middlewares;
        self
    }

    /// The resolver used by fields without one of their own.
    #[must_use]
    pub fn field_resolver(mut self, resolver: BoxFieldResolver<B>) -> Self {
        self.field_resolver = resolver;
        self
    }

    /// The type resolver used for abstract types.
    #[must_use]
    pub fn type_resolver(mut self, resolver: BoxTypeResolver) -> Self {
        self.type_resolver = resolver;
        self
    }

    pub fn finish(mut self) -> Schema<B> {
        self.registry.finalize();
        Schema(Arc::new(SchemaInner {
            registry: self.registry,
            backend: self.backend,
            middlewares: self.middlewares,
            field_resolver: self.field_resolver,
            type_resolver: self.type_resolver,
        }))
    }
}
