//! Abstract-type dispatch: material values through the type resolver,
//! deferred values through the backend's abstract expansion, interface
//! fragment conditions, and dispatch failures.

use std::sync::Arc;

use deferql::{
    ExecutionOverrides, InterfaceType, MetaField, MetaType, ObjectType, PathSegment, Registry, Request,
    UnionType,
};
use integration_tests::{expr_resolver, runtime, schema_with, value_resolver, JsonExpr, ResponseExt};
use serde_json::json;

fn foo_hello_registry() -> Registry<integration_tests::JsonBackend> {
    let mut registry = Registry::new("Query");
    registry.insert_type(MetaType::Object(
        ObjectType::new("Foo").field(MetaField::new("foo", "String")),
    ));
    registry.insert_type(MetaType::Object(
        ObjectType::new("Hello").field(MetaField::new("hello", "String")),
    ));
    registry.insert_type(MetaType::Union(UnionType::new("FooHello", ["Foo", "Hello"])));
    registry
}

#[test]
fn material_union_values_dispatch_through_the_type_resolver() {
    runtime().block_on(async {
        let mut registry = foo_hello_registry();
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("any", "FooHello").resolver(value_resolver(json!({
                "__typename": "Foo",
                "foo": "bar",
            }))),
        )));
        let (schema, backend) = schema_with(registry);

        let query = "{ any { __typename ... on Foo { foo } ... on Hello { hello } } }";
        insta::assert_json_snapshot!(schema.execute(query).await.into_value(), @r###"
        {
          "data": {
            "any": {
              "__typename": "Foo",
              "foo": "bar"
            }
          }
        }
        "###);
        assert_eq!(backend.batch_calls(), 0);
    });
}

#[test]
fn deferred_abstract_objects_expand_with_a_typename_sibling() {
    runtime().block_on(async {
        let mut registry = foo_hello_registry();
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("any", "FooHello").resolver(expr_resolver(JsonExpr::lit(json!({
                "__typename": "Hello",
                "hello": "world",
            })))),
        )));
        let (schema, backend) = schema_with(registry);

        let query = "{ any { ... on Foo { foo } ... on Hello { hello } __typename } }";
        insta::assert_json_snapshot!(schema.execute(query).await.into_value(), @r###"
        {
          "data": {
            "any": {
              "hello": "world",
              "__typename": "Hello"
            }
          }
        }
        "###);
        assert_eq!(backend.batch_calls(), 1);
    });
}

#[test]
fn interface_conditions_apply_transitively_to_implementors() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Interface(
            InterfaceType::new("Node").field(MetaField::new("id", "ID")),
        ));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Dog")
                .implement("Node")
                .field(MetaField::new("id", "ID"))
                .field(MetaField::new("name", "String")),
        ));
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("node", "Node").resolver(value_resolver(json!({
                "__typename": "Dog",
                "id": 7,
                "name": "Rex",
            }))),
        )));
        let (schema, _) = schema_with(registry);

        let query = "{ node { ... on Node { id } ... on Dog { name } } }";
        insta::assert_json_snapshot!(schema.execute(query).await.into_value(), @r###"
        {
          "data": {
            "node": {
              "id": "7",
              "name": "Rex"
            }
          }
        }
        "###);
    });
}

#[test]
fn unresolvable_concrete_type_is_an_error() {
    runtime().block_on(async {
        let mut registry = foo_hello_registry();
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("any", "FooHello").resolver(value_resolver(json!({ "foo": "bar" }))),
        )));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ any { ... on Foo { foo } } }").await;
        assert_eq!(response.data, json!({ "any": null }));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].message,
            "Failed to resolve concrete type for `FooHello`"
        );
        assert_eq!(response.errors[0].path, vec![PathSegment::Field("any".into())]);
    });
}

#[test]
fn a_request_level_type_resolver_wins_over_the_default() {
    runtime().block_on(async {
        let mut registry = foo_hello_registry();
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("any", "FooHello").resolver(value_resolver(json!({ "foo": "bar" }))),
        )));
        let (schema, _) = schema_with(registry);

        let overrides = ExecutionOverrides {
            type_resolver: Some(Arc::new(|_value: &serde_json::Value, _info: &deferql::ResolveInfo| {
                Ok(Some("Foo".to_string()))
            })),
            ..ExecutionOverrides::default()
        };
        let response = schema
            .execute_with_overrides(Request::new("{ any { ... on Foo { foo } } }"), overrides)
            .await;
        assert_eq!(response.data, json!({ "any": { "foo": "bar" } }));
        assert!(response.is_ok());
    });
}
