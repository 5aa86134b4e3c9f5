//! The core multi-stage scheduling behaviors, one test per shape: no
//! batch, one batch, restage across two batches, list fan-out and abstract
//! dispatch over a deferred list.

use deferql::{
    Error, MetaField, MetaType, ObjectType, PathSegment, Registry, ResolvedValue, UnionType,
};
use integration_tests::{expr_resolver, resolver, runtime, schema_with, JsonExpr, ResponseExt};
use serde_json::json;

#[test]
fn plain_literal_resolves_without_any_batch() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("foo", "Int").resolver(resolver(|_| async { Ok(ResolvedValue::Material(json!(9001))) })),
        )));
        let (schema, backend) = schema_with(registry);

        insta::assert_json_snapshot!(schema.execute("{ foo }").await.into_value(), @r###"
        {
          "data": {
            "foo": 9001
          }
        }
        "###);
        assert_eq!(backend.batch_calls(), 0);
    });
}

#[test]
fn deferred_leaf_costs_exactly_one_batch() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("foo", "Int").resolver(expr_resolver(JsonExpr::lit(9001))),
        )));
        let (schema, backend) = schema_with(registry);

        insta::assert_json_snapshot!(schema.execute("{ foo }").await.into_value(), @r###"
        {
          "data": {
            "foo": 9001
          }
        }
        "###);
        assert_eq!(backend.batch_calls(), 1);
    });
}

#[test]
fn deferred_null_in_non_null_field_nulls_the_data() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("foo", "Int!").resolver(expr_resolver(JsonExpr::lit(serde_json::Value::Null))),
        )));
        let (schema, backend) = schema_with(registry);

        let response = schema.execute("{ foo }").await;
        assert_eq!(response.data, serde_json::Value::Null);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "Cannot return null for non-nullable field");
        assert_eq!(response.errors[0].path, vec![PathSegment::Field("foo".into())]);
        assert_eq!(backend.batch_calls(), 1);
    });
}

#[test]
fn deferred_list_of_deferred_projections_materializes_in_one_batch() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("items", "[Item!]").resolver(expr_resolver(JsonExpr::lit(json!([
                { "a": 1, "b": 2 },
                { "a": 3, "b": 4 },
            ])))),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Item")
                .field(MetaField::new("a", "Int"))
                .field(MetaField::new("b", "Int")),
        ));
        let (schema, backend) = schema_with(registry);

        insta::assert_json_snapshot!(schema.execute("{ items { a b } }").await.into_value(), @r###"
        {
          "data": {
            "items": [
              {
                "a": 1,
                "b": 2
              },
              {
                "a": 3,
                "b": 4
              }
            ]
          }
        }
        "###);
        assert_eq!(backend.batch_calls(), 1);
    });
}

#[test]
fn awaiting_a_wrapped_value_restages_and_costs_a_second_batch() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("wrap", "Wrap").resolver(expr_resolver(JsonExpr::lit(json!({ "name": "hello" })))),
        )));
        registry.insert_type(MetaType::Object(ObjectType::new("Wrap").field(
            MetaField::new("greeting", "String").resolver(resolver(|params| async move {
                // Needs the materialized parent, which forces a restage.
                let name = params.source.get("name").materialized().await?;
                Ok(ResolvedValue::Deferred(JsonExpr::concat([
                    JsonExpr::Lit(name),
                    JsonExpr::lit(" world"),
                ])))
            })),
        )));
        let (schema, backend) = schema_with(registry);

        insta::assert_json_snapshot!(schema.execute("{ wrap { greeting } }").await.into_value(), @r###"
        {
          "data": {
            "wrap": {
              "greeting": "hello world"
            }
          }
        }
        "###);
        assert_eq!(backend.batch_calls(), 2);
    });
}

#[test]
fn abstract_dispatch_over_a_deferred_list_excludes_foreign_keys() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("any", "[FooHello]").resolver(expr_resolver(JsonExpr::lit(json!([
                { "__typename": "Foo", "foo": "bar" },
                { "__typename": "Hello", "hello": "world" },
            ])))),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Foo").field(MetaField::new("foo", "String")),
        ));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Hello").field(MetaField::new("hello", "String")),
        ));
        registry.insert_type(MetaType::Union(UnionType::new("FooHello", ["Foo", "Hello"])));
        let (schema, backend) = schema_with(registry);

        let query = "{ any { ... on Foo { foo } ... on Hello { hello } __typename } }";
        insta::assert_json_snapshot!(schema.execute(query).await.into_value(), @r###"
        {
          "data": {
            "any": [
              {
                "foo": "bar",
                "__typename": "Foo"
              },
              {
                "hello": "world",
                "__typename": "Hello"
              }
            ]
          }
        }
        "###);
        assert_eq!(backend.batch_calls(), 1);
    });
}

#[test]
fn resolvers_may_mix_material_and_deferred_siblings() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(
            ObjectType::new("Query")
                .field(MetaField::new("eager", "String").resolver(resolver(|_| async {
                    Ok(ResolvedValue::Material(json!("ready")))
                })))
                .field(MetaField::new("lazy", "String").resolver(expr_resolver(JsonExpr::lit("later"))))
                .field(MetaField::new("broken", "String").resolver(resolver(|_| async {
                    Err(Error::new("nope"))
                }))),
        ));
        let (schema, backend) = schema_with(registry);

        let response = schema.execute("{ eager lazy broken }").await;
        assert_eq!(response.data, json!({ "eager": "ready", "lazy": "later", "broken": null }));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "nope");
        assert_eq!(backend.batch_calls(), 1);
    });
}
