//! Helpers for end-to-end executor tests.

use std::{future::Future, sync::Arc};

use deferql::{BoxFieldResolver, Error, Registry, ResolvedValue, ResolverParams, Response, Schema};

pub use deferred_mocks::{JsonBackend, JsonExpr};

/// The runtime every test drives its execution on.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build the test runtime")
}

pub trait ResponseExt {
    /// The response as the JSON a client would see.
    fn into_value(self) -> serde_json::Value;
}

impl ResponseExt for Response {
    fn into_value(self) -> serde_json::Value {
        self.to_json_value().expect("responses always serialize")
    }
}

/// A schema over a fresh mock backend, returning a handle that still counts
/// batches after the backend moved into the schema.
pub fn schema_with(registry: Registry<JsonBackend>) -> (Schema<JsonBackend>, JsonBackend) {
    let backend = JsonBackend::new();
    let handle = backend.clone();
    (Schema::build(registry, backend).finish(), handle)
}

/// Wrap an async closure as a field resolver.
pub fn resolver<F, Fut>(f: F) -> BoxFieldResolver<JsonBackend>
where
    F: Fn(ResolverParams<JsonBackend>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResolvedValue<JsonBackend>, Error>> + Send + 'static,
{
    Arc::new(move |params| Box::pin(f(params)))
}

/// A resolver that always returns the given material value.
pub fn value_resolver(value: serde_json::Value) -> BoxFieldResolver<JsonBackend> {
    resolver(move |_| {
        let value = value.clone();
        async move { Ok(ResolvedValue::Material(value)) }
    })
}

/// A resolver that always returns the given deferred expression.
pub fn expr_resolver(expr: JsonExpr) -> BoxFieldResolver<JsonBackend> {
    resolver(move |_| {
        let expr = expr.clone();
        async move { Ok(ResolvedValue::Deferred(expr)) }
    })
}

/// A resolver that always fails with the given message.
pub fn failing_resolver(message: &'static str) -> BoxFieldResolver<JsonBackend> {
    resolver(move |_| async move { Err(Error::new(message)) })
}
