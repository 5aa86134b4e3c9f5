use std::borrow::{Borrow, Cow};

use async_graphql_parser::{Pos, Positioned};
use async_graphql_value::{ConstValue, Name, Value as AstValue, Variables};
use indexmap::IndexMap;

use crate::{
    backend::DeferredBackend,
    error::{ServerError, ServerResult},
    registry::{MetaInputValue, MetaType, MetaTypeName, Registry},
    Error,
};

/// Coerces a field's argument AST against its argument definitions, looking
/// variables up in `variables`. Produces one entry per defined argument that
/// ends up with a value.
pub fn resolve_arguments<B: DeferredBackend>(
    registry: &Registry<B>,
    variables: &Variables,
    arg_defs: &IndexMap<String, MetaInputValue>,
    arguments: &[(Positioned<Name>, Positioned<AstValue>)],
    error_pos: Pos,
) -> ServerResult<IndexMap<Name, ConstValue>> {
    let mut coerced = IndexMap::with_capacity(arg_defs.len());
    for (name, def) in arg_defs {
        let ast = arguments
            .iter()
            .find(|(arg_name, _)| arg_name.node.as_str() == name.as_str())
            .map(|(_, value)| value);

        let value = match ast {
            None => None,
            // A variable the request did not provide counts as an absent
            // argument, so defaults still apply.
            Some(value) => match &value.node {
                AstValue::Variable(var_name) => variables.get(var_name).cloned(),
                other => Some(
                    other
                        .clone()
                        .into_const_with(|var_name| {
                            Ok::<_, Error>(variables.get(&var_name).cloned().unwrap_or(ConstValue::Null))
                        })
                        .map_err(|err| err.into_server_error(error_pos))?,
                ),
            },
        };

        let ty = def.ty.to_string();
        let rctx = ResolveContext {
            registry,
            path: PathNode::new(name),
            ty: Cow::Borrowed(&ty),
            allow_list_coercion: true,
            default_value: def.default_value.as_ref(),
        };
        if let Some(value) = resolve_maybe_absent_input(rctx, value).map_err(|err| err.into_server_error(error_pos))? {
            coerced.insert(Name::new(name), value);
        }
    }
    Ok(coerced)
}

#[derive(Clone, Copy)]
struct PathNode<'a> {
    name: &'a str,
    previous: Option<&'a PathNode<'a>>,
}

impl<'a> PathNode<'a> {
    fn new(name: &'a str) -> PathNode<'a> {
        PathNode { name, previous: None }
    }

    fn with(&'a self, name: &'a str) -> PathNode<'a> {
        PathNode {
            name,
            previous: Some(self),
        }
    }

    fn into_vec(self) -> Vec<String> {
        let mut previous = self.previous.map(|node| node.into_vec()).unwrap_or_default();
        previous.push(self.name.to_string());
        previous
    }
}

struct ResolveContext<'a, B: DeferredBackend> {
    registry: &'a Registry<B>,
    path: PathNode<'a>,
    /// Expected GraphQL input type at this point of the descent.
    ty: Cow<'a, str>,
    /// List coercion of a bare value is legal everywhere except directly
    /// inside an explicit multi-element list literal.
    allow_list_coercion: bool,
    default_value: Option<&'a ConstValue>,
}

impl<'a, B: DeferredBackend> Clone for ResolveContext<'a, B> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            path: self.path,
            ty: self.ty.clone(),
            allow_list_coercion: self.allow_list_coercion,
            default_value: self.default_value,
        }
    }
}

impl<'a, B: DeferredBackend> ResolveContext<'a, B> {
    fn with_input(&'a self, path: &'a str, input: &'a MetaInputValue) -> ResolveContext<'a, B> {
        ResolveContext {
            registry: self.registry,
            path: self.path.with(path),
            ty: Cow::Borrowed(input.ty.as_str()),
            allow_list_coercion: true,
            default_value: input.default_value.as_ref(),
        }
    }

    fn input_error(self, expected: &str) -> Error {
        Error::new(format!("{expected} for {}", self.path.into_vec().join(".")))
    }
}

fn resolve_maybe_absent_input<B: DeferredBackend>(
    rctx: ResolveContext<'_, B>,
    value: Option<ConstValue>,
) -> Result<Option<ConstValue>, Error> {
    match value.or_else(|| rctx.default_value.cloned()) {
        Some(value) => resolve_present_input(rctx, value).map(Some),
        None => matches!(MetaTypeName::create(rctx.ty.borrow()), MetaTypeName::NonNull(_))
            .then_some(Err(rctx.input_error("Unexpected null value")))
            .transpose(),
    }
}

fn resolve_present_input<B: DeferredBackend>(
    rctx: ResolveContext<'_, B>,
    value: ConstValue,
) -> Result<ConstValue, Error> {
    match MetaTypeName::create(rctx.ty.clone().borrow()) {
        MetaTypeName::NonNull(type_name) => {
            if matches!(value, ConstValue::Null) {
                return Err(rctx.input_error("Unexpected null value"));
            }
            resolve_present_input(
                ResolveContext {
                    ty: Cow::Borrowed(type_name),
                    ..rctx
                },
                value,
            )
        }
        MetaTypeName::List(type_name) => {
            if matches!(value, ConstValue::Null) {
                return Ok(value);
            }
            if let ConstValue::List(list) = value {
                let rctx = ResolveContext {
                    ty: Cow::Borrowed(type_name),
                    allow_list_coercion: list.len() <= 1,
                    default_value: None,
                    ..rctx
                };
                let mut items = Vec::with_capacity(list.len());
                for (idx, element) in list.into_iter().enumerate() {
                    let path = idx.to_string();
                    let rctx = ResolveContext {
                        path: rctx.path.with(&path),
                        ..rctx.clone()
                    };
                    items.push(resolve_present_input(rctx, element)?);
                }
                Ok(ConstValue::List(items))
            } else if rctx.allow_list_coercion {
                Ok(ConstValue::List(vec![resolve_present_input(
                    ResolveContext {
                        ty: Cow::Borrowed(type_name),
                        allow_list_coercion: true,
                        default_value: None,
                        ..rctx
                    },
                    value,
                )?]))
            } else {
                Err(rctx.input_error("Expected a List"))
            }
        }
        MetaTypeName::Named(type_name) => {
            if matches!(value, ConstValue::Null) {
                return Ok(value);
            }
            match rctx.registry.lookup_type(type_name) {
                Some(MetaType::InputObject(input_object)) => {
                    if let ConstValue::Object(mut object) = value {
                        let mut coerced = IndexMap::with_capacity(object.len());
                        for (field_name, input) in &input_object.input_fields {
                            if let Some(field_value) = resolve_maybe_absent_input(
                                rctx.with_input(field_name, input),
                                object.shift_remove(&Name::new(field_name)),
                            )? {
                                coerced.insert(Name::new(field_name), field_value);
                            }
                        }
                        Ok(ConstValue::Object(coerced))
                    } else {
                        Err(rctx.input_error("Expected an Object"))
                    }
                }
                Some(MetaType::Enum(enum_type)) => {
                    let name = match &value {
                        ConstValue::Enum(name) => name.as_str(),
                        ConstValue::String(string) => string.as_str(),
                        other => {
                            return Err(rctx.input_error(&format!("Expected an enum, not {}", kind_str(other))))
                        }
                    };
                    if !enum_type.values.contains(name) {
                        return Err(rctx.input_error(&format!("Unknown enum value `{name}`")));
                    }
                    Ok(ConstValue::Enum(Name::new(name)))
                }
                Some(MetaType::Scalar(scalar)) => match &scalar.parse {
                    Some(parse) => parse(value),
                    None => parse_builtin_scalar(rctx, type_name, value),
                },
                _ => Err(rctx
                    .clone()
                    .input_error(&format!("Internal error: unsupported input type {type_name}"))),
            }
        }
    }
}

fn parse_builtin_scalar<B: DeferredBackend>(
    rctx: ResolveContext<'_, B>,
    type_name: &str,
    value: ConstValue,
) -> Result<ConstValue, Error> {
    let ok = match type_name {
        "Int" => matches!(&value, ConstValue::Number(n) if n.is_i64() || n.is_u64()),
        "Float" => matches!(&value, ConstValue::Number(_)),
        "String" => matches!(&value, ConstValue::String(_)),
        "Boolean" => matches!(&value, ConstValue::Boolean(_)),
        "ID" => matches!(&value, ConstValue::String(_) | ConstValue::Number(_)),
        // Custom scalars without a parser accept any literal.
        _ => true,
    };
    if ok {
        Ok(value)
    } else {
        Err(rctx.input_error(&format!("Expected a {type_name}, not {}", kind_str(&value))))
    }
}

fn kind_str(value: &ConstValue) -> &'static str {
    match value {
        ConstValue::Null => "null",
        ConstValue::Number(_) => "a number",
        ConstValue::String(_) => "a string",
        ConstValue::Boolean(_) => "a boolean",
        ConstValue::Binary(_) => "a binary value",
        ConstValue::Enum(_) => "an enum value",
        ConstValue::List(_) => "a list",
        ConstValue::Object(_) => "an object",
    }
}
