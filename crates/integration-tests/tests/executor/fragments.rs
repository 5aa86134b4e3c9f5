//! Selection flattening through real queries: aliases, named and inline
//! fragments, nested-fragment merging, conflicts and `__typename`.

use deferql::{MetaField, MetaInputValue, MetaType, ObjectType, Registry, ResolvedValue, Value as ConstValue};
use integration_tests::{resolver, runtime, schema_with, value_resolver, ResponseExt};
use serde_json::json;

#[test]
fn aliases_resolve_the_same_field_twice() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("pet", "Pet")
                .arg(MetaInputValue::new("id", "Int!"))
                .resolver(resolver(|params| async move {
                    let id = match params.arg("id") {
                        Some(ConstValue::Number(id)) => id.as_i64().unwrap_or_default(),
                        _ => 0,
                    };
                    Ok(ResolvedValue::Material(json!({ "name": format!("pet{id}") })))
                })),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Pet").field(MetaField::new("name", "String")),
        ));
        let (schema, _) = schema_with(registry);

        let query = "{ goodDoggo: pet(id: 123) { name } veryGoodDoggo: pet(id: 456) { name } }";
        insta::assert_json_snapshot!(schema.execute(query).await.into_value(), @r###"
        {
          "data": {
            "goodDoggo": {
              "name": "pet123"
            },
            "veryGoodDoggo": {
              "name": "pet456"
            }
          }
        }
        "###);
    });
}

#[test]
fn nested_fragments_merge_instead_of_overwriting() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("pullRequest", "PullRequest").resolver(value_resolver(json!({
                "checks": ["Success!"],
                "author": { "name": "Jim", "email": "jim@example.com" },
            }))),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("PullRequest")
                .field(MetaField::new("checks", "[String]"))
                .field(MetaField::new("author", "User")),
        ));
        registry.insert_type(MetaType::Object(
            ObjectType::new("User")
                .field(MetaField::new("name", "String"))
                .field(MetaField::new("email", "String")),
        ));
        let (schema, _) = schema_with(registry);

        // The two inline fragments select `author` with different nested
        // fragments; the selections must merge, not clobber each other.
        let query = indoc::indoc! {
            r#"
                query {
                    pullRequest {
                        ... on PullRequest {
                            checks
                            author { ...AuthorFragmentOne }
                        }
                        ... on PullRequest {
                            author { ...AuthorFragmentTwo }
                        }
                    }
                }

                fragment AuthorFragmentOne on User { name }
                fragment AuthorFragmentTwo on User { email }
            "#
        };
        let response = schema.execute(query).await;
        assert!(response.is_ok(), "{:?}", response.errors);
        assert_eq!(
            response.data,
            json!({
                "pullRequest": {
                    "checks": ["Success!"],
                    "author": { "name": "Jim", "email": "jim@example.com" },
                }
            })
        );
    });
}

#[test]
fn duplicate_response_keys_with_different_arguments_conflict() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("pet", "Pet")
                .arg(MetaInputValue::new("id", "Int!"))
                .resolver(value_resolver(json!({ "name": "x" }))),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Pet").field(MetaField::new("name", "String")),
        ));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ pet(id: 1) { name } pet(id: 2) { name } }").await;
        assert_eq!(response.data, serde_json::Value::Null);
        assert_eq!(response.errors.len(), 1);
        assert!(
            response.errors[0].message.contains("conflict"),
            "unexpected message: {}",
            response.errors[0].message
        );
    });
}

#[test]
fn unknown_fragments_error_at_the_enclosing_field() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("pet", "Pet").resolver(value_resolver(json!({ "name": "x" }))),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Pet").field(MetaField::new("name", "String")),
        ));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ pet { ...Missing } }").await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, r#"Unknown fragment "Missing"."#);
    });
}

#[test]
fn typename_resolves_on_the_root_type() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("noop", "Int").resolver(value_resolver(json!(0))),
        )));
        let (schema, backend) = schema_with(registry);

        let response = schema.execute("{ __typename }").await;
        assert_eq!(response.data, json!({ "__typename": "Query" }));
        assert_eq!(backend.batch_calls(), 0);
    });
}

#[test]
fn identical_duplicate_selections_merge_silently() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("pet", "Pet").resolver(value_resolver(json!({ "name": "x", "age": 3 }))),
        )));
        registry.insert_type(MetaType::Object(
            ObjectType::new("Pet")
                .field(MetaField::new("name", "String"))
                .field(MetaField::new("age", "Int")),
        ));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ pet { name } pet { age } }").await;
        assert!(response.is_ok(), "{:?}", response.errors);
        assert_eq!(response.data, json!({ "pet": { "name": "x", "age": 3 } }));
    });
}
