//! The follow-up drains consumed after a batch boundary: restage feeds
//! resolver work whose source just materialized, revalidate feeds leaves
//! whose values did.

use serde_json::Value;

use crate::{
    backend::{expand::expand_deferred_results, DeferredBackend, SourceValue},
    query_path::{QueryPath, QueryPathSegment},
};

use super::{
    tasks::{FieldToResolve, FieldToRestage, FieldToRevalidate, FieldToValidate},
    Execution,
};

impl<B: DeferredBackend> Execution<B> {
    pub(super) fn drain_restage(&mut self, results: &[Value]) {
        while let Some(task) = self.q_restage.pop_front() {
            let key = task.field_node.node.response_key().node.to_string();
            let hint = task.prev_path.child(key.as_str());
            let error_paths = self.error_paths();

            let expansion = expand_deferred_results(
                self.backend().as_ref(),
                results,
                &task.deferred_path,
                &hint,
                task.exclude.as_ref(),
                &error_paths,
            );
            if let Some(error) = expansion.error {
                self.record(error, false);
            }

            for (path, value) in expansion.pairs {
                // Fan-out that stopped short of the field (a null or an
                // ancestor that collapsed) completes as-is; everything else
                // re-enters the resolver pipeline with a material source.
                if value.is_null() || !ends_with_key(&path, &key) {
                    self.complete(path, value, task.field_node.pos);
                    continue;
                }
                let (parent_path, _) = path.split_last().expect("pair paths end with the response key");
                self.q_resolve.push_back(FieldToResolve {
                    parent_path,
                    parent_type: task.parent_type.clone(),
                    field_node: task.field_node.clone(),
                    sibling_nodes: task.sibling_nodes.clone(),
                    source: SourceValue::Material(value),
                    deferral: None,
                    override_resolver: task.override_resolver.clone(),
                    exclude: None,
                });
            }
        }
    }

    pub(super) fn drain_revalidate(&mut self, results: &[Value]) {
        while let Some(task) = self.q_revalidate.pop_front() {
            let key = task.field_node.node.response_key().node.to_string();
            let error_paths = self.error_paths();

            let expansion = expand_deferred_results(
                self.backend().as_ref(),
                results,
                &task.deferred_path,
                &task.output_path,
                task.exclude.as_ref(),
                &error_paths,
            );
            if let Some(error) = expansion.error {
                self.record(error, false);
            }

            for (path, value) in expansion.pairs {
                if !ends_with_key(&path, &key) {
                    self.complete(path, value, task.field_node.pos);
                    continue;
                }
                self.q_validate.push_back(FieldToValidate {
                    field_type: task.field_type.clone(),
                    field_node: task.field_node.clone(),
                    value,
                    parent_type: task.parent_type.clone(),
                    output_path: path,
                });
            }
        }
    }
}

fn ends_with_key(path: &QueryPath, key: &str) -> bool {
    matches!(path.last(), Some(QueryPathSegment::Field(name)) if name == key)
}
