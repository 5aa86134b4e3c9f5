//! Decorator composition for the executor's injection points.
//!
//! Every injection point takes middlewares of the shape `next -> next'`.
//! Composition is a right fold: the rightmost middleware wraps the base and
//! each middleware to its left wraps the result, so the leftmost runs
//! outermost. Per-request middlewares are prepended to the schema defaults,
//! which makes them outermost overall.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::{
    backend::DeferredBackend,
    context::{BoxFieldResolver, BoxSerializer, BoxTypeResolver},
    registry::{MetaField, MetaType},
    Error, Result,
};

/// Produces the resolver for a field definition.
pub type BoxFieldResolverGetter<B> =
    Arc<dyn for<'a> Fn(&'a MetaField<B>) -> BoxFieldResolver<B> + Send + Sync>;

/// Produces the type resolver for an abstract type.
pub type BoxTypeResolverGetter<B> = Arc<dyn for<'a> Fn(&'a MetaType<B>) -> BoxTypeResolver + Send + Sync>;

/// Produces the serializer for a leaf type.
pub type BoxSerializerGetter<B> = Arc<dyn for<'a> Fn(&'a MetaType<B>) -> BoxSerializer + Send + Sync>;

/// Submits one batch of deferred expressions.
pub type BoxResolveDeferred<B> = Arc<
    dyn Fn(Vec<<B as DeferredBackend>::Expr>) -> BoxFuture<'static, Result<Vec<serde_json::Value>, Error>>
        + Send
        + Sync,
>;

pub type FieldResolverMiddleware<B> = Arc<dyn Fn(BoxFieldResolver<B>) -> BoxFieldResolver<B> + Send + Sync>;
pub type FieldResolverGetterMiddleware<B> =
    Arc<dyn Fn(BoxFieldResolverGetter<B>) -> BoxFieldResolverGetter<B> + Send + Sync>;
pub type TypeResolverGetterMiddleware<B> =
    Arc<dyn Fn(BoxTypeResolverGetter<B>) -> BoxTypeResolverGetter<B> + Send + Sync>;
pub type SerializerGetterMiddleware<B> =
    Arc<dyn Fn(BoxSerializerGetter<B>) -> BoxSerializerGetter<B> + Send + Sync>;
pub type ResolveDeferredMiddleware<B> = Arc<dyn Fn(BoxResolveDeferred<B>) -> BoxResolveDeferred<B> + Send + Sync>;

/// Right-fold composition over a middleware chain.
pub fn compose<T>(chain: &[Arc<dyn Fn(T) -> T + Send + Sync>], base: T) -> T {
    chain.iter().rev().fold(base, |next, middleware| middleware(next))
}

/// The middleware bundles of the five injection points.
pub struct MiddlewareBundles<B: DeferredBackend> {
    /// Wraps each resolver returned by the field-resolver getter.
    pub field_resolver: Vec<FieldResolverMiddleware<B>>,
    pub field_resolver_getter: Vec<FieldResolverGetterMiddleware<B>>,
    pub type_resolver_getter: Vec<TypeResolverGetterMiddleware<B>>,
    pub serializer_getter: Vec<SerializerGetterMiddleware<B>>,
    pub resolve_deferred: Vec<ResolveDeferredMiddleware<B>>,
}

impl<B: DeferredBackend> Default for MiddlewareBundles<B> {
    fn default() -> Self {
        Self {
            field_resolver: Vec::new(),
            field_resolver_getter: Vec::new(),
            type_resolver_getter: Vec::new(),
            serializer_getter: Vec::new(),
            resolve_deferred: Vec::new(),
        }
    }
}

impl<B: DeferredBackend> Clone for MiddlewareBundles<B> {
    fn clone(&self) -> Self {
        Self {
            field_resolver: self.field_resolver.clone(),
            field_resolver_getter: self.field_resolver_getter.clone(),
            type_resolver_getter: self.type_resolver_getter.clone(),
            serializer_getter: self.serializer_getter.clone(),
            resolve_deferred: self.resolve_deferred.clone(),
        }
    }
}

impl<B: DeferredBackend> MiddlewareBundles<B> {
    #[must_use]
    pub fn with_field_resolver(mut self, middleware: FieldResolverMiddleware<B>) -> Self {
        self.field_resolver.push(middleware);
        self
    }

    #[must_use]
    pub fn with_field_resolver_getter(mut self, middleware: FieldResolverGetterMiddleware<B>) -> Self {
        self.field_resolver_getter.push(middleware);
        self
    }

    #[must_use]
    pub fn with_type_resolver_getter(mut self, middleware: TypeResolverGetterMiddleware<B>) -> Self {
        self.type_resolver_getter.push(middleware);
        self
    }

    #[must_use]
    pub fn with_serializer_getter(mut self, middleware: SerializerGetterMiddleware<B>) -> Self {
        self.serializer_getter.push(middleware);
        self
    }

    #[must_use]
    pub fn with_resolve_deferred(mut self, middleware: ResolveDeferredMiddleware<B>) -> Self {
        self.resolve_deferred.push(middleware);
        self
    }

    /// The per-request (`outer`) bundles composed before these defaults.
    pub(crate) fn stacked_onto(mut self, outer: MiddlewareBundles<B>) -> MiddlewareBundles<B> {
        let mut stacked = outer;
        stacked.field_resolver.append(&mut self.field_resolver);
        stacked.field_resolver_getter.append(&mut self.field_resolver_getter);
        stacked.type_resolver_getter.append(&mut self.type_resolver_getter);
        stacked.serializer_getter.append(&mut self.serializer_getter);
        stacked.resolve_deferred.append(&mut self.resolve_deferred);
        stacked
    }
}
