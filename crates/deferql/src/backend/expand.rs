//! The path-expand engine: maps a materialized batch result and a deferred
//! path onto concrete `(path, value)` pairs, fanning out over list
//! placeholders and short-circuiting on nulls and embedded backend errors.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    backend::DeferredBackend,
    error::{PathSegment, ServerError, ServerResult},
    query_path::{DeferredPath, QueryPath, QueryPathSegment},
};

/// Prunes expansion branches. Receives the deferred-path segments traversed
/// so far (relative to the batch slot) and the value about to be descended
/// into; returning `true` drops the branch. Abstract-type dispatch uses this
/// to keep one concrete type's fields away from the other types' elements.
pub(crate) type ExclusionFilter = Arc<dyn Fn(&[QueryPathSegment], &Value) -> bool + Send + Sync>;

/// What one deferred path expanded to: the concrete pairs produced before
/// the walk ended, and the embedded backend error that stopped it, if any.
pub(crate) struct Expansion {
    pub pairs: Vec<(QueryPath, Value)>,
    pub error: Option<ServerError>,
}

/// Expands one deferred path against the batch results.
///
/// `hint_path` is the (possibly placeholder-carrying) output path the pairs
/// are produced against; every `Flatten` in it is substituted with the
/// concrete index chosen during fan-out. The placeholder counts of
/// `deferred_path` and `hint_path` must match; a mismatch is a programmer
/// error.
pub(crate) fn expand_deferred_results<B: DeferredBackend>(
    backend: &B,
    results: &[Value],
    deferred_path: &DeferredPath,
    hint_path: &QueryPath,
    exclude: Option<&ExclusionFilter>,
    error_paths: &[Vec<PathSegment>],
) -> Expansion {
    assert_eq!(
        deferred_path.flatten_count(),
        hint_path.flatten_count(),
        "placeholder counts of deferred path {deferred_path} and output path {hint_path} diverge",
    );

    let tail = deferred_path.segments.segments();
    assert!(
        hint_path.len() >= tail.len(),
        "output path {hint_path} is shorter than the deferred tail of {deferred_path}",
    );
    let prefix: QueryPath = hint_path.segments()[..hint_path.len() - tail.len()]
        .iter()
        .cloned()
        .collect();

    let value = results
        .get(deferred_path.slot)
        .unwrap_or_else(|| panic!("batch slot {} out of range", deferred_path.slot));

    let mut pairs = Vec::new();
    let mut walk = Walk {
        backend,
        exclude,
        error_paths,
        pairs: &mut pairs,
    };
    let error = walk.step(value, tail, prefix, Vec::new()).err();
    Expansion { pairs, error }
}

struct Walk<'a, B: DeferredBackend> {
    backend: &'a B,
    exclude: Option<&'a ExclusionFilter>,
    error_paths: &'a [Vec<PathSegment>],
    pairs: &'a mut Vec<(QueryPath, Value)>,
}

impl<B: DeferredBackend> Walk<'_, B> {
    fn step(
        &mut self,
        value: &Value,
        tail: &[QueryPathSegment],
        out_path: QueryPath,
        traversed: Vec<QueryPathSegment>,
    ) -> ServerResult<()> {
        // An error already recorded for an ancestor suppresses this branch.
        if self.error_paths.iter().any(|path| out_path.is_covered_by(path)) {
            return Ok(());
        }

        if let Some(message) = self.backend.error_message(value) {
            return Err(ServerError::new(message, None).with_path(out_path.to_error_path()));
        }

        if let Some(exclude) = self.exclude {
            if exclude(&traversed, value) {
                return Ok(());
            }
        }

        if value.is_null() {
            self.pairs.push((out_path, Value::Null));
            return Ok(());
        }

        let Some((segment, rest)) = tail.split_first() else {
            self.pairs.push((out_path, value.clone()));
            return Ok(());
        };

        match segment {
            QueryPathSegment::Field(key) => {
                let out_path = out_path.child(key.as_str());
                let mut traversed = traversed;
                traversed.push(segment.clone());
                match value.get(key.as_str()) {
                    Some(child) => self.step(child, rest, out_path, traversed),
                    None => {
                        self.pairs.push((out_path, Value::Null));
                        Ok(())
                    }
                }
            }
            QueryPathSegment::Index(index) => {
                let out_path = out_path.child(*index);
                let mut traversed = traversed;
                traversed.push(segment.clone());
                match value.get(index) {
                    Some(child) => self.step(child, rest, out_path, traversed),
                    None => {
                        self.pairs.push((out_path, Value::Null));
                        Ok(())
                    }
                }
            }
            QueryPathSegment::Flatten => {
                let Some(elements) = value.as_array() else {
                    return Err(ServerError::new(
                        format!("The deferred backend returned a non-list value for the list at `{out_path}`"),
                        None,
                    )
                    .with_path(out_path.to_error_path()));
                };
                if elements.is_empty() {
                    self.pairs.push((out_path, Value::Array(Vec::new())));
                    return Ok(());
                }
                for (index, element) in elements.iter().enumerate() {
                    let mut traversed = traversed.clone();
                    traversed.push(QueryPathSegment::Index(index));
                    self.step(element, rest, out_path.child(index), traversed)?;
                }
                Ok(())
            }
        }
    }
}
