//! Argument coercion: literals, variables, defaults, single-value list
//! coercion, input objects and enums.

use deferql::{
    EnumType, InputObjectType, MetaField, MetaInputValue, MetaType, ObjectType, Registry, Request,
    ResolvedValue, ScalarType, Value as ConstValue, Variables,
};
use integration_tests::{resolver, runtime, schema_with, JsonBackend};
use serde_json::json;

fn greet_registry() -> Registry<JsonBackend> {
    let mut registry = Registry::new("Query");
    registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
        MetaField::new("greet", "String")
            .arg(MetaInputValue::new("name", "String!"))
            .resolver(resolver(|params| async move {
                let name = match params.arg("name") {
                    Some(ConstValue::String(name)) => name.clone(),
                    other => format!("<{other:?}>"),
                };
                Ok(ResolvedValue::Material(json!(format!("hello {name}"))))
            })),
    )));
    registry
}

#[test]
fn literal_arguments_reach_the_resolver_coerced() {
    runtime().block_on(async {
        let (schema, _) = schema_with(greet_registry());
        let response = schema.execute(r#"{ greet(name: "ada") }"#).await;
        assert_eq!(response.data, json!({ "greet": "hello ada" }));
    });
}

#[test]
fn variables_resolve_through_the_request() {
    runtime().block_on(async {
        let (schema, _) = schema_with(greet_registry());
        let variables: Variables = serde_json::from_value(json!({ "who": "grace" })).unwrap();
        let response = schema
            .execute(
                Request::new("query Hello($who: String!) { greet(name: $who) }").variables(variables),
            )
            .await;
        assert_eq!(response.data, json!({ "greet": "hello grace" }));
    });
}

#[test]
fn absent_arguments_fall_back_to_defaults() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("greet", "String")
                .arg(MetaInputValue::new("name", "String!").default_value(ConstValue::String("world".into())))
                .resolver(resolver(|params| async move {
                    let name = match params.arg("name") {
                        Some(ConstValue::String(name)) => name.clone(),
                        _ => "missing".to_string(),
                    };
                    Ok(ResolvedValue::Material(json!(format!("hello {name}"))))
                })),
        )));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ greet }").await;
        assert_eq!(response.data, json!({ "greet": "hello world" }));
    });
}

#[test]
fn single_values_coerce_into_lists() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Scalar(ScalarType::new("JSON")));
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("ids", "JSON")
                .arg(MetaInputValue::new("of", "[Int!]"))
                .resolver(resolver(|params| async move {
                    let ids = params.arg("of").cloned().unwrap_or(ConstValue::Null);
                    Ok(ResolvedValue::Material(ids.into_json()?))
                })),
        )));
        let (schema, _) = schema_with(registry);

        // A bare value coerces into a one-element list.
        let response = schema.execute("{ ids(of: 3) }").await;
        assert!(response.is_ok(), "{:?}", response.errors);
        assert_eq!(response.data, json!({ "ids": [3] }));
    });
}

#[test]
fn input_objects_apply_nested_defaults() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Scalar(ScalarType::new("JSON")));
        registry.insert_type(MetaType::InputObject(
            InputObjectType::new("Filter")
                .field(MetaInputValue::new("search", "String!"))
                .field(MetaInputValue::new("limit", "Int").default_value(ConstValue::Number(10.into()))),
        ));
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("find", "JSON")
                .arg(MetaInputValue::new("filter", "Filter!"))
                .resolver(resolver(|params| async move {
                    let filter = params.arg("filter").cloned().unwrap_or(ConstValue::Null);
                    Ok(ResolvedValue::Material(filter.into_json()?))
                })),
        )));
        let (schema, _) = schema_with(registry);

        let response = schema.execute(r#"{ find(filter: { search: "x" }) }"#).await;
        assert!(response.is_ok(), "{:?}", response.errors);
        assert_eq!(response.data, json!({ "find": { "search": "x", "limit": 10 } }));
    });
}

#[test]
fn enum_arguments_check_membership() {
    runtime().block_on(async {
        let mut registry = Registry::new("Query");
        registry.insert_type(MetaType::Enum(EnumType::new("Color", ["RED", "GREEN"])));
        registry.insert_type(MetaType::Object(ObjectType::new("Query").field(
            MetaField::new("paint", "String")
                .arg(MetaInputValue::new("color", "Color!"))
                .resolver(resolver(|params| async move {
                    let color = params.arg("color").cloned().unwrap_or(ConstValue::Null);
                    Ok(ResolvedValue::Material(json!(color.to_string())))
                })),
        )));
        let (schema, _) = schema_with(registry);

        let response = schema.execute("{ paint(color: GREEN) }").await;
        assert_eq!(response.data, json!({ "paint": "GREEN" }));

        let response = schema.execute("{ paint(color: PURPLE) }").await;
        assert_eq!(response.data, json!({ "paint": null }));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "Unknown enum value `PURPLE` for color");
    });
}

#[test]
fn explicit_null_for_a_non_null_argument_fails() {
    runtime().block_on(async {
        let (schema, _) = schema_with(greet_registry());
        let response = schema.execute("{ greet(name: null) }").await;
        assert_eq!(response.data, json!({ "greet": null }));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "Unexpected null value for name");
    });
}
