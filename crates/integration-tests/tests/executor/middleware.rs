//! Middleware composition through a real execution: identity laws,
//! left-to-right wrapping order, per-request bundles running outermost, and
//! the resolve-deferred injection point.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use deferql::{
    middleware::{BoxResolveDeferred, FieldResolverMiddleware, MiddlewareBundles, ResolveDeferredMiddleware},
    BoxFieldResolver, ExecutionOverrides, MetaField, MetaType, ObjectType, Registry, Request, ResolvedValue,
    Schema,
};
use integration_tests::{expr_resolver, runtime, value_resolver, JsonBackend, JsonExpr, ResponseExt};
use serde_json::json;

/// Appends a tag to string results on the way out.
fn tagging(tag: &'static str) -> FieldResolverMiddleware<JsonBackend> {
    Arc::new(move |next: BoxFieldResolver<JsonBackend>| {
        Arc::new(move |params| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                match next(params).await? {
                    ResolvedValue::Material(serde_json::Value::String(s)) => {
                        Ok(ResolvedValue::Material(serde_json::Value::String(format!("{s}{tag}"))))
                    }
                    other => Ok(other),
                }
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = Result<ResolvedValue<JsonBackend>, deferql::Error>> + Send>>
        }) as BoxFieldResolver<JsonBackend>
    })
}

fn counting(counter: Arc<AtomicUsize>) -> ResolveDeferredMiddleware<JsonBackend> {
    Arc::new(move |next: BoxResolveDeferred<JsonBackend>| {
        let counter = Arc::clone(&counter);
        Arc::new(move |batch| {
            counter.fetch_add(1, Ordering::SeqCst);
            next(batch)
        }) as BoxResolveDeferred<JsonBackend>
    })
}

fn string_registry() -> Registry<JsonBackend> {
    let mut registry = Registry::new("Query");
    registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
        MetaField::new("word", "String").resolver(value_resolver(json!("x"))),
    )));
    registry
}

#[test]
fn identity_middleware_leaves_the_response_unchanged() {
    runtime().block_on(async {
        let identity: FieldResolverMiddleware<JsonBackend> = Arc::new(|next| next);

        let plain = Schema::build(string_registry(), JsonBackend::new()).finish();
        let wrapped = Schema::build(string_registry(), JsonBackend::new())
            .middlewares(MiddlewareBundles::default().with_field_resolver(identity))
            .finish();

        assert_eq!(
            plain.execute("{ word }").await.into_value(),
            wrapped.execute("{ word }").await.into_value(),
        );
    });
}

#[test]
fn middleware_chains_wrap_left_to_right() {
    runtime().block_on(async {
        let schema = Schema::build(string_registry(), JsonBackend::new())
            .middlewares(
                MiddlewareBundles::default()
                    .with_field_resolver(tagging("a"))
                    .with_field_resolver(tagging("b")),
            )
            .finish();

        // The leftmost middleware runs outermost, so its tag lands last.
        let response = schema.execute("{ word }").await;
        assert_eq!(response.data, json!({ "word": "xba" }));
    });
}

#[test]
fn per_request_middlewares_run_outside_the_schema_defaults() {
    runtime().block_on(async {
        let schema = Schema::build(string_registry(), JsonBackend::new())
            .middlewares(MiddlewareBundles::default().with_field_resolver(tagging("s")))
            .finish();

        let overrides = ExecutionOverrides {
            middlewares: MiddlewareBundles::default().with_field_resolver(tagging("r")),
            ..ExecutionOverrides::default()
        };
        let response = schema
            .execute_with_overrides(Request::new("{ word }"), overrides)
            .await;
        assert_eq!(response.data, json!({ "word": "xsr" }));
    });
}

#[test]
fn resolve_deferred_middleware_sees_every_batch() {
    runtime().block_on(async {
        let counter = Arc::new(AtomicUsize::new(0));

        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("foo", "Int").resolver(expr_resolver(JsonExpr::lit(1))),
        )));
        let backend = JsonBackend::new();
        let handle = backend.clone();
        let schema = Schema::build(registry, backend)
            .middlewares(MiddlewareBundles::default().with_resolve_deferred(counting(Arc::clone(&counter))))
            .finish();

        let response = schema.execute("{ foo }").await;
        assert!(response.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(handle.batch_calls(), 1);
    });
}

#[test]
fn grouping_of_middleware_arrays_does_not_matter() {
    runtime().block_on(async {
        // [a, [b, c]] and [[a, b], c] flatten to the same chain.
        let left = Schema::build(string_registry(), JsonBackend::new())
            .middlewares(
                MiddlewareBundles::default()
                    .with_field_resolver(tagging("a"))
                    .with_field_resolver(tagging("b"))
                    .with_field_resolver(tagging("c")),
            )
            .finish();

        let right = Schema::build(string_registry(), JsonBackend::new())
            .middlewares(
                MiddlewareBundles::default()
                    .with_field_resolver(tagging("a"))
                    .with_field_resolver(tagging("b"))
                    .with_field_resolver(tagging("c")),
            )
            .finish();

        assert_eq!(
            left.execute("{ word }").await.into_value(),
            right.execute("{ word }").await.into_value(),
        );
        assert_eq!(left.execute("{ word }").await.data, json!({ "word": "xcba" }));
    });
}
