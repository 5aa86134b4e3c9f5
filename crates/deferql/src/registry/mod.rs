//! The resolver-bearing schema: types, fields and the resolvers attached to
//! them. Built by hand (or by whatever schema layer sits above this crate)
//! and finalized before execution.

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use async_graphql_parser::types::OperationType;
use async_graphql_value::ConstValue;
use indexmap::{IndexMap, IndexSet};

use crate::{
    backend::DeferredBackend,
    context::{BoxFieldResolver, BoxSerializer},
    Error, Result,
};

pub mod scalars;
mod type_names;

pub use type_names::{MetaFieldType, MetaTypeName};

/// Parses a literal or variable value of a custom scalar during argument
/// coercion.
pub type ScalarParseFn = Arc<dyn Fn(ConstValue) -> Result<ConstValue, Error> + Send + Sync>;

/// An argument or input-object field definition.
#[derive(Clone)]
pub struct MetaInputValue {
    pub name: String,
    pub ty: MetaFieldType,
    pub default_value: Option<ConstValue>,
}

impl MetaInputValue {
    pub fn new(name: impl Into<String>, ty: impl Into<MetaFieldType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            default_value: None,
        }
    }

    #[must_use]
    pub fn default_value(mut self, value: ConstValue) -> Self {
        self.default_value = Some(value);
        self
    }
}

impl Debug for MetaInputValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaInputValue")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// A field definition: output type, argument definitions and an optional
/// resolver. Fields without a resolver fall back to the default property
/// resolver of the execution.
pub struct MetaField<B: DeferredBackend> {
    pub name: String,
    pub ty: MetaFieldType,
    pub args: IndexMap<String, MetaInputValue>,
    pub resolver: Option<BoxFieldResolver<B>>,
}

impl<B: DeferredBackend> MetaField<B> {
    pub fn new(name: impl Into<String>, ty: impl Into<MetaFieldType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            args: IndexMap::new(),
            resolver: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: MetaInputValue) -> Self {
        self.args.insert(arg.name.clone(), arg);
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: BoxFieldResolver<B>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

impl<B: DeferredBackend> Debug for MetaField<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaField")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

pub struct ObjectType<B: DeferredBackend> {
    pub name: String,
    pub fields: IndexMap<String, MetaField<B>>,
    /// Interfaces this object directly declares.
    pub implements: IndexSet<String>,
}

impl<B: DeferredBackend> ObjectType<B> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            implements: IndexSet::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: MetaField<B>) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    #[must_use]
    pub fn implement(mut self, interface: impl Into<String>) -> Self {
        self.implements.insert(interface.into());
        self
    }
}

pub struct InterfaceType<B: DeferredBackend> {
    pub name: String,
    pub fields: IndexMap<String, MetaField<B>>,
    /// Interfaces this interface itself declares.
    pub implements: IndexSet<String>,
    /// Filled in by [`Registry::finalize`] from the objects' declarations.
    pub possible_types: IndexSet<String>,
}

impl<B: DeferredBackend> InterfaceType<B> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            implements: IndexSet::new(),
            possible_types: IndexSet::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: MetaField<B>) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    #[must_use]
    pub fn implement(mut self, interface: impl Into<String>) -> Self {
        self.implements.insert(interface.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct UnionType {
    pub name: String,
    pub possible_types: IndexSet<String>,
}

impl UnionType {
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            possible_types: members.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub values: IndexSet<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

pub struct ScalarType {
    pub name: String,
    /// Output serializer; `None` falls back to the built-in best-effort
    /// coercion for the five spec scalars and passthrough otherwise.
    pub serialize: Option<BoxSerializer>,
    /// Input parser; `None` accepts any literal as-is.
    pub parse: Option<ScalarParseFn>,
}

impl ScalarType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serialize: None,
            parse: None,
        }
    }

    #[must_use]
    pub fn serialize(mut self, serialize: BoxSerializer) -> Self {
        self.serialize = Some(serialize);
        self
    }

    #[must_use]
    pub fn parse(mut self, parse: ScalarParseFn) -> Self {
        self.parse = Some(parse);
        self
    }
}

impl Debug for ScalarType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarType").field("name", &self.name).finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct InputObjectType {
    pub name: String,
    pub input_fields: IndexMap<String, MetaInputValue>,
}

impl InputObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_fields: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: MetaInputValue) -> Self {
        self.input_fields.insert(field.name.clone(), field);
        self
    }
}

pub enum MetaType<B: DeferredBackend> {
    Object(ObjectType<B>),
    Interface(InterfaceType<B>),
    Union(UnionType),
    Enum(EnumType),
    Scalar(ScalarType),
    InputObject(InputObjectType),
}

impl<B: DeferredBackend> MetaType<B> {
    pub fn name(&self) -> &str {
        match self {
            MetaType::Object(inner) => &inner.name,
            MetaType::Interface(inner) => &inner.name,
            MetaType::Union(inner) => &inner.name,
            MetaType::Enum(inner) => &inner.name,
            MetaType::Scalar(inner) => &inner.name,
            MetaType::InputObject(inner) => &inner.name,
        }
    }

    pub fn fields(&self) -> Option<&IndexMap<String, MetaField<B>>> {
        match self {
            MetaType::Object(inner) => Some(&inner.fields),
            MetaType::Interface(inner) => Some(&inner.fields),
            _ => None,
        }
    }

    pub fn field_by_name(&self, name: &str) -> Option<&MetaField<B>> {
        self.fields().and_then(|fields| fields.get(name))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, MetaType::Enum(_) | MetaType::Scalar(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, MetaType::Interface(_) | MetaType::Union(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, MetaType::Object(_))
    }

    pub fn possible_types(&self) -> Option<&IndexSet<String>> {
        match self {
            MetaType::Interface(inner) => Some(&inner.possible_types),
            MetaType::Union(inner) => Some(&inner.possible_types),
            _ => None,
        }
    }
}

impl<B: DeferredBackend> Debug for MetaType<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = match self {
            MetaType::Object(_) => "Object",
            MetaType::Interface(_) => "Interface",
            MetaType::Union(_) => "Union",
            MetaType::Enum(_) => "Enum",
            MetaType::Scalar(_) => "Scalar",
            MetaType::InputObject(_) => "InputObject",
        };
        write!(f, "MetaType::{kind}({})", self.name())
    }
}

/// All the types of a schema plus the root operation types.
pub struct Registry<B: DeferredBackend> {
    pub types: IndexMap<String, MetaType<B>>,
    /// For every concrete or interface type, the interfaces it transitively
    /// implements. Computed by [`Registry::finalize`].
    pub implements: HashMap<String, HashSet<String>>,
    pub query_type: String,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
}

impl<B: DeferredBackend> Registry<B> {
    pub fn new(query_type: impl Into<String>) -> Self {
        let mut registry = Self {
            types: IndexMap::new(),
            implements: HashMap::new(),
            query_type: query_type.into(),
            mutation_type: None,
            subscription_type: None,
        };
        for scalar in ["Int", "Float", "String", "Boolean", "ID"] {
            registry.insert_type(MetaType::Scalar(ScalarType::new(scalar)));
        }
        registry
    }

    #[must_use]
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.mutation_type = Some(name.into());
        self
    }

    #[must_use]
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.subscription_type = Some(name.into());
        self
    }

    pub fn insert_type(&mut self, ty: MetaType<B>) {
        self.types.insert(ty.name().to_string(), ty);
    }

    #[must_use]
    pub fn register(mut self, ty: MetaType<B>) -> Self {
        self.insert_type(ty);
        self
    }

    pub fn lookup_type(&self, name: &str) -> Option<&MetaType<B>> {
        self.types.get(name)
    }

    pub fn root_type_name(&self, operation: OperationType) -> Option<&str> {
        match operation {
            OperationType::Query => Some(self.query_type.as_str()),
            OperationType::Mutation => self.mutation_type.as_deref(),
            // Subscriptions execute as plain queries in this core.
            OperationType::Subscription => self.subscription_type.as_deref(),
        }
    }

    /// Whether `concrete` satisfies the fragment type condition `condition`.
    pub fn type_condition_applies(&self, concrete: &str, condition: &str) -> bool {
        if concrete == condition {
            return true;
        }
        if self
            .implements
            .get(concrete)
            .is_some_and(|interfaces| interfaces.contains(condition))
        {
            return true;
        }
        matches!(
            self.lookup_type(condition),
            Some(MetaType::Union(union)) if union.possible_types.contains(concrete)
        )
    }

    /// Computes the transitive `implements` closure and fills interface
    /// `possible_types` from the objects' declarations. Must run before the
    /// registry is handed to an execution.
    pub fn finalize(&mut self) {
        let mut direct: HashMap<String, IndexSet<String>> = HashMap::new();
        for ty in self.types.values() {
            match ty {
                MetaType::Object(object) => {
                    direct.insert(object.name.clone(), object.implements.clone());
                }
                MetaType::Interface(interface) => {
                    direct.insert(interface.name.clone(), interface.implements.clone());
                }
                _ => {}
            }
        }

        let mut closure: HashMap<String, HashSet<String>> = HashMap::new();
        for name in direct.keys() {
            let mut seen = HashSet::new();
            let mut stack: Vec<&str> = direct[name].iter().map(String::as_str).collect();
            while let Some(interface) = stack.pop() {
                if seen.insert(interface.to_string()) {
                    if let Some(parents) = direct.get(interface) {
                        stack.extend(parents.iter().map(String::as_str));
                    }
                }
            }
            closure.insert(name.clone(), seen);
        }
        self.implements = closure;

        let mut possible: HashMap<String, IndexSet<String>> = HashMap::new();
        for ty in self.types.values() {
            if let MetaType::Object(object) = ty {
                for interface in self.implements.get(&object.name).into_iter().flatten() {
                    possible
                        .entry(interface.clone())
                        .or_default()
                        .insert(object.name.clone());
                }
            }
        }
        for ty in self.types.values_mut() {
            if let MetaType::Interface(interface) = ty {
                if let Some(types) = possible.remove(&interface.name) {
                    interface.possible_types = types;
                }
            }
        }
    }
}

impl<B: DeferredBackend> Debug for Registry<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("query_type", &self.query_type)
            .field("mutation_type", &self.mutation_type)
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
