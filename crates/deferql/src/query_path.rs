use std::fmt::{self, Display, Formatter};

use crate::error::PathSegment;

/// A segment of a response path.
///
/// `Flatten` stands for a list index that is not known yet because the list
/// lives inside a deferred expression that has not been materialized. It only
/// ever appears in deferred paths and in the transient paths of fields that
/// live under an unmaterialized list; completed response paths are always
/// concrete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryPathSegment {
    Field(String),
    Index(usize),
    Flatten,
}

impl QueryPathSegment {
    pub fn is_flatten(&self) -> bool {
        matches!(self, QueryPathSegment::Flatten)
    }
}

impl Display for QueryPathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueryPathSegment::Field(name) => f.write_str(name),
            QueryPathSegment::Index(index) => write!(f, "{index}"),
            QueryPathSegment::Flatten => f.write_str("@"),
        }
    }
}

impl From<&str> for QueryPathSegment {
    fn from(value: &str) -> Self {
        QueryPathSegment::Field(value.to_string())
    }
}

impl From<String> for QueryPathSegment {
    fn from(value: String) -> Self {
        QueryPathSegment::Field(value)
    }
}

impl From<usize> for QueryPathSegment {
    fn from(value: usize) -> Self {
        QueryPathSegment::Index(value)
    }
}

/// A response path from the root to a field, cheap to clone and extend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPath(Vec<QueryPathSegment>);

impl QueryPath {
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child(&self, segment: impl Into<QueryPathSegment>) -> QueryPath {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    pub fn push(&mut self, segment: impl Into<QueryPathSegment>) {
        self.0.push(segment.into());
    }

    #[must_use]
    pub fn extend(&self, segments: &[QueryPathSegment]) -> QueryPath {
        let mut path = self.clone();
        path.0.extend(segments.iter().cloned());
        path
    }

    /// The path without its last segment, and that segment.
    pub fn split_last(&self) -> Option<(QueryPath, &QueryPathSegment)> {
        let (last, parent) = self.0.split_last()?;
        Some((QueryPath(parent.to_vec()), last))
    }

    pub fn last(&self) -> Option<&QueryPathSegment> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryPathSegment> {
        self.0.iter()
    }

    pub fn segments(&self) -> &[QueryPathSegment] {
        &self.0
    }

    /// How many segments are unresolved list placeholders.
    pub fn flatten_count(&self) -> usize {
        self.0.iter().filter(|segment| segment.is_flatten()).count()
    }

    /// The path as it appears in a GraphQL error. Transient placeholders
    /// serialize as `"@"`.
    pub fn to_error_path(&self) -> Vec<PathSegment> {
        self.0
            .iter()
            .map(|segment| match segment {
                QueryPathSegment::Field(name) => PathSegment::Field(name.clone()),
                QueryPathSegment::Index(index) => PathSegment::Index(*index),
                QueryPathSegment::Flatten => PathSegment::Field("@".to_string()),
            })
            .collect()
    }

    /// Whether an error recorded at `error_path` covers this path or one of
    /// its ancestors. A `"@"` segment in an error path matches any index.
    pub fn is_covered_by(&self, error_path: &[PathSegment]) -> bool {
        if error_path.is_empty() || error_path.len() > self.0.len() {
            return false;
        }
        error_path
            .iter()
            .zip(self.0.iter())
            .all(|(error_segment, segment)| match (error_segment, segment) {
                (PathSegment::Field(a), QueryPathSegment::Field(b)) => a == b,
                (PathSegment::Field(a), QueryPathSegment::Index(_) | QueryPathSegment::Flatten) => a == "@",
                (PathSegment::Index(a), QueryPathSegment::Index(b)) => a == b,
                (PathSegment::Index(_), QueryPathSegment::Flatten) => true,
                (PathSegment::Index(_), QueryPathSegment::Field(_)) => false,
            })
    }
}

impl Display for QueryPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            segment.fmt(f)?;
        }
        Ok(())
    }
}

impl From<Vec<QueryPathSegment>> for QueryPath {
    fn from(segments: Vec<QueryPathSegment>) -> Self {
        QueryPath(segments)
    }
}

impl FromIterator<QueryPathSegment> for QueryPath {
    fn from_iter<T: IntoIterator<Item = QueryPathSegment>>(iter: T) -> Self {
        QueryPath(iter.into_iter().collect())
    }
}

/// A path addressing into the materialized result of a deferred batch: the
/// slot selects an entry of the batch, the segments descend into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredPath {
    pub slot: usize,
    pub segments: QueryPath,
}

impl DeferredPath {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            segments: QueryPath::empty(),
        }
    }

    #[must_use]
    pub fn child(&self, segment: impl Into<QueryPathSegment>) -> DeferredPath {
        DeferredPath {
            slot: self.slot,
            segments: self.segments.child(segment),
        }
    }

    #[must_use]
    pub fn extend(&self, segments: &[QueryPathSegment]) -> DeferredPath {
        let mut path = self.clone();
        for segment in segments {
            path.segments.push(segment.clone());
        }
        path
    }

    pub fn flatten_count(&self) -> usize {
        self.segments.flatten_count()
    }
}

impl Display for DeferredPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.slot)?;
        if !self.segments.is_empty() {
            write!(f, ".{}", self.segments)?;
        }
        Ok(())
    }
}
