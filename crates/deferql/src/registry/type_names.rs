//! Types for working with GraphQL type names in SDL notation.

/// The output type of a field, in SDL notation (e.g. `[Int!]!`).
///
/// A newtype around a string lets us hang wrapper inspection off the type
/// while keeping the registry serializable and easy to build by hand.
#[derive(Clone, Default, Hash, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct MetaFieldType(String);

impl std::fmt::Display for MetaFieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MetaFieldType {
    fn from(value: &str) -> MetaFieldType {
        MetaFieldType(value.to_string())
    }
}

impl From<String> for MetaFieldType {
    fn from(value: String) -> MetaFieldType {
        MetaFieldType(value)
    }
}

impl MetaFieldType {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_non_null(&self) -> bool {
        self.0.ends_with('!')
    }

    /// Whether this is a list, nullable or not.
    pub fn is_list(&self) -> bool {
        self.0.starts_with('[')
    }

    /// The name of the type with all list and non-null wrappers stripped.
    pub fn named_type(&self) -> &str {
        named_type_from_type_str(&self.0)
    }

    /// How many list layers wrap the named type.
    pub fn list_depth(&self) -> usize {
        fn depth(ty: &str) -> usize {
            match MetaTypeName::create(ty) {
                MetaTypeName::NonNull(inner) => depth(inner),
                MetaTypeName::List(inner) => 1 + depth(inner),
                MetaTypeName::Named(_) => 0,
            }
        }
        depth(&self.0)
    }
}

/// One peeled layer of an SDL type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaTypeName<'a> {
    List(&'a str),
    NonNull(&'a str),
    Named(&'a str),
}

impl<'a> MetaTypeName<'a> {
    pub fn create(type_name: &str) -> MetaTypeName<'_> {
        if let Some(inner) = type_name.strip_suffix('!') {
            MetaTypeName::NonNull(inner)
        } else if let Some(inner) = type_name.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            MetaTypeName::List(inner)
        } else {
            MetaTypeName::Named(type_name)
        }
    }

    pub fn concrete_typename(type_name: &str) -> &str {
        named_type_from_type_str(type_name)
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, MetaTypeName::NonNull(_))
    }
}

impl std::fmt::Display for MetaTypeName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaTypeName::List(inner) => write!(f, "[{inner}]"),
            MetaTypeName::NonNull(inner) => write!(f, "{inner}!"),
            MetaTypeName::Named(name) => write!(f, "{name}"),
        }
    }
}

fn named_type_from_type_str(mut ty: &str) -> &str {
    loop {
        match MetaTypeName::create(ty) {
            MetaTypeName::NonNull(inner) | MetaTypeName::List(inner) => ty = inner,
            MetaTypeName::Named(name) => return name,
        }
    }
}
