//! Error accumulation: resolver failures, null bubbling, embedded backend
//! annotations, whole-batch failures, deduplication and coercion errors.

use deferql::{MetaField, MetaInputValue, MetaType, ObjectType, PathSegment, Registry};
use integration_tests::{
    expr_resolver, failing_resolver, runtime, schema_with, value_resolver, JsonExpr,
};
use serde_json::json;

#[test]
fn a_failing_nullable_field_nulls_its_own_slot() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("broken", "String").resolver(failing_resolver("boom")),
        )));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ broken }").await;
        assert_eq!(response.data, json!({ "broken": null }));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "boom");
        assert_eq!(response.errors[0].path, vec![PathSegment::Field("broken".into())]);
    });
}

#[test]
fn a_failing_non_null_field_nulls_the_nearest_nullable_ancestor() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("user", "User").resolver(value_resolver(json!({ "id": 1 }))),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("User")
                .field(MetaField::new("id", "Int"))
                .field(MetaField::new("name", "String!").resolver(failing_resolver("boom"))),
        ));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ user { id name } }").await;
        assert_eq!(response.data, json!({ "user": null }));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].path,
            vec![PathSegment::Field("user".into()), PathSegment::Field("name".into())]
        );
    });
}

#[test]
fn embedded_backend_errors_surface_at_the_exact_path() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("foo", "Int").resolver(expr_resolver(JsonExpr::fail("kaput"))),
        )));
        let (schema, backend) = schema_with(registry);

        let response = schema.execute("{ foo }").await;
        assert_eq!(response.data, json!({ "foo": null }));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "kaput");
        assert_eq!(response.errors[0].path, vec![PathSegment::Field("foo".into())]);
        assert_eq!(backend.batch_calls(), 1);
    });
}

#[test]
fn embedded_errors_inside_lists_carry_the_element_index() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("items", "[Item]").resolver(expr_resolver(JsonExpr::lit(json!([
                { "a": 1 },
                { "a": { "__deferredError": "row locked" } },
            ])))),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Item").field(MetaField::new("a", "Int")),
        ));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ items { a } }").await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "row locked");
        assert_eq!(
            response.errors[0].path,
            vec![
                PathSegment::Field("items".into()),
                PathSegment::Index(1),
                PathSegment::Field("a".into())
            ]
        );
        // The healthy element still materialized.
        assert_eq!(response.data["items"][0], json!({ "a": 1 }));
    });
}

#[test]
fn a_batch_transport_failure_covers_every_deferred_field() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(
            ObjectType::new("Query")
                .field(MetaField::new("a", "Int").resolver(expr_resolver(JsonExpr::lit(1))))
                .field(MetaField::new("b", "Int").resolver(expr_resolver(JsonExpr::lit(2)))),
        ));
        let (schema, backend) = schema_with(registry);
        backend.fail_next_batch("backend down");

        let response = schema.execute("{ a b }").await;
        assert_eq!(response.data, json!({ "a": null, "b": null }));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "backend down");
        assert!(response.errors[0].path.is_empty());
        assert_eq!(backend.batch_calls(), 1);
    });
}

#[test]
fn identical_errors_are_deduplicated() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("items", "[Item!]").resolver(expr_resolver(JsonExpr::fail("exploded"))),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Item")
                .field(MetaField::new("a", "Int"))
                .field(MetaField::new("b", "Int")),
        ));
        let (schema, _) = schema_with(registry);

        // Both leaves expand against the same failed slot; the error
        // surfaces once.
        let response = schema.execute("{ items { a b } }").await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "exploded");
        assert_eq!(response.errors[0].path, vec![PathSegment::Field("items".into())]);
    });
}

#[test]
fn argument_coercion_failures_error_at_the_owning_field() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("echo", "String")
                .arg(MetaInputValue::new("msg", "String!"))
                .resolver(value_resolver(json!("unused"))),
        )));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ echo }").await;
        assert_eq!(response.data, json!({ "echo": null }));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "Unexpected null value for msg");
        assert_eq!(response.errors[0].path, vec![PathSegment::Field("echo".into())]);
    });
}

#[test]
fn unknown_fields_error_with_the_parent_type_name() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("foo", "Int").resolver(value_resolver(json!(1))),
        )));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ nope }").await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "Could not find a field named nope on Query");
    });
}
