//! The discriminate drain: decides, per resolved value, whether it can be
//! validated directly or must ride the deferred batch, and fans composite
//! deferred values out into child resolver work.

use std::sync::Arc;

use async_graphql_parser::{types::Field, Positioned};
use serde_json::Value;

use crate::{
    backend::{
        expand::ExclusionFilter, AbstractCandidate, DeferredBackend, ExpandedConcrete, ExprSetter, ResolvedValue,
        SelectedField, SourceValue,
    },
    context::default_field_resolver,
    error::ServerError,
    query_path::DeferredPath,
    registry::MetaType,
    resolver_utils::collect_fields,
};

use super::{
    tasks::{Deferral, FieldToDiscriminate, FieldToResolve, FieldToRevalidate, FieldToValidate},
    Execution,
};

impl<B: DeferredBackend> Execution<B> {
    pub(super) fn drain_discriminate(&mut self) {
        while let Some(task) = self.q_discriminate.pop_front() {
            self.discriminate(task);
        }
    }

    fn discriminate(&mut self, task: FieldToDiscriminate<B>) {
        if self.is_suppressed(&task.output_path) {
            return;
        }

        let FieldToDiscriminate {
            field_node,
            field_type,
            value,
            parent_type,
            output_path,
            deferral,
            exclude,
        } = task;

        // Material values at concrete paths skip the batch entirely.
        if let ResolvedValue::Material(value) = &value {
            if output_path.flatten_count() == 0 {
                self.q_validate.push_back(FieldToValidate {
                    field_type,
                    field_node,
                    value: value.clone(),
                    parent_type,
                    output_path,
                });
                return;
            }
        }

        let pos = field_node.pos;
        let response_key = field_node.node.response_key().node.to_string();

        let expr = match value {
            ResolvedValue::Deferred(expr) => expr,
            ResolvedValue::Wrapped(wrapped) => wrapped.into_expr(),
            // A material value under an unmaterialized list still has to go
            // through the batch so the expansion can place it per element.
            ResolvedValue::Material(value) => self.backend().lit(value),
        };

        let (deferred_path, set_parent): (DeferredPath, ExprSetter<B::Expr>) = match &deferral {
            Some(deferral) => {
                (deferral.set)(expr.clone());
                (deferral.path.child(response_key.as_str()), Arc::clone(&deferral.set))
            }
            None => {
                if output_path.flatten_count() > 0 {
                    self.record(
                        ServerError::new(
                            format!("Expected a deferral for field `{}`", field_node.node.name.node),
                            Some(pos),
                        )
                        .with_path(output_path.to_error_path()),
                        false,
                    );
                    return;
                }
                let (slot, setter) = self.batch.allocate(expr.clone(), output_path.clone());
                (DeferredPath::new(slot), setter)
            }
        };

        let named_type = field_type.named_type().to_string();
        let Some(ty) = self.registry().lookup_type(&named_type) else {
            self.record(
                ServerError::new(format!("Unknown type `{named_type}`"), Some(pos))
                    .with_path(output_path.to_error_path()),
                false,
            );
            return;
        };

        if ty.is_leaf() {
            self.q_revalidate.push_back(FieldToRevalidate {
                field_type,
                field_node,
                parent_type,
                output_path,
                deferred_path,
                exclude,
            });
            return;
        }

        let list_depth = field_type.list_depth();

        if ty.is_abstract() {
            self.discriminate_abstract(
                field_node,
                output_path,
                deferred_path,
                expr,
                list_depth,
                set_parent,
                exclude,
                &named_type,
            );
            return;
        }

        // Concrete object: expand one child per selected field.
        let selected = match collect_fields(self.registry(), ty, &field_node.node.selection_set, &self.env.fragments)
        {
            Ok(selected) => selected,
            Err(error) => {
                self.record(error.with_path(output_path.to_error_path()), false);
                return;
            }
        };
        let fields = selected_fields(&selected);

        let expanded = match self
            .backend()
            .expand_children(&expr, list_depth, &fields, set_parent)
        {
            Ok(expanded) => expanded,
            Err(error) => {
                self.record(
                    error.into_server_error(pos).with_path(output_path.to_error_path()),
                    false,
                );
                return;
            }
        };

        let sibling_nodes = Arc::new(selected);
        let child_parent_path = output_path.extend(&expanded.appended);
        let child_deferred_path = deferred_path.extend(&expanded.appended);
        for child in expanded.children {
            let Some(node) = sibling_nodes
                .iter()
                .find(|field| field.node.response_key().node.as_str() == child.response_key)
            else {
                tracing::debug!(key = %child.response_key, "backend expanded an unselected field, skipping");
                continue;
            };
            if child_parent_path.flatten_count() == 0 {
                // Concrete child slots are reserved up front, as in the
                // material path, to keep sibling order stable.
                self.complete(
                    child_parent_path.child(child.response_key.as_str()),
                    Value::Null,
                    node.pos,
                );
            }
            self.q_resolve.push_back(FieldToResolve {
                parent_path: child_parent_path.clone(),
                parent_type: named_type.clone(),
                field_node: node.clone(),
                sibling_nodes: Arc::clone(&sibling_nodes),
                source: SourceValue::Deferred(child.source),
                deferral: Some(Deferral {
                    set: child.set_data,
                    path: child_deferred_path.clone(),
                }),
                override_resolver: None,
                exclude: exclude.clone(),
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn discriminate_abstract(
        &mut self,
        field_node: Positioned<Field>,
        output_path: crate::query_path::QueryPath,
        deferred_path: DeferredPath,
        expr: B::Expr,
        list_depth: usize,
        set_parent: ExprSetter<B::Expr>,
        exclude: Option<ExclusionFilter>,
        abstract_type: &str,
    ) {
        let pos = field_node.pos;

        let possible: Vec<String> = self
            .registry()
            .lookup_type(abstract_type)
            .and_then(MetaType::possible_types)
            .map(|types| types.iter().cloned().collect())
            .unwrap_or_default();

        let mut candidates = Vec::with_capacity(possible.len());
        let mut selected_per_type = Vec::with_capacity(possible.len());
        for type_name in possible {
            let Some(concrete) = self.registry().lookup_type(&type_name) else {
                continue;
            };
            let selected =
                match collect_fields(self.registry(), concrete, &field_node.node.selection_set, &self.env.fragments)
                {
                    Ok(selected) => selected,
                    Err(error) => {
                        self.record(error.with_path(output_path.to_error_path()), false);
                        return;
                    }
                };
            candidates.push(AbstractCandidate {
                type_name: type_name.clone(),
                fields: selected_fields(&selected),
            });
            selected_per_type.push((type_name, selected));
        }

        let expanded = match self.backend().expand_abstract_type(
            &expr,
            abstract_type,
            &candidates,
            list_depth,
            set_parent,
        ) {
            Ok(expanded) => expanded,
            Err(error) => {
                self.record(
                    error.into_server_error(pos).with_path(output_path.to_error_path()),
                    false,
                );
                return;
            }
        };

        for ExpandedConcrete {
            type_name,
            appended,
            children,
        } in expanded
        {
            let Some((_, selected)) = selected_per_type.iter().find(|(name, _)| *name == type_name) else {
                continue;
            };
            // The composite carries every candidate's keys; this filter
            // keeps the fields of one concrete type away from elements that
            // materialized as a different one.
            let admitted = type_name.clone();
            let typename_filter: ExclusionFilter = Arc::new(move |_, value: &Value| {
                value
                    .get("__typename")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name != admitted)
            });
            let exclude = Some(combine_excludes(exclude.clone(), typename_filter));

            let sibling_nodes = Arc::new(selected.clone());
            let child_parent_path = output_path.extend(&appended);
            let child_deferred_path = deferred_path.extend(&appended);
            for child in children {
                let Some(node) = sibling_nodes
                    .iter()
                    .find(|field| field.node.response_key().node.as_str() == child.response_key)
                else {
                    continue;
                };
                // `__typename` under abstract dispatch reads the value's own
                // type tag rather than assuming the candidate.
                let override_resolver = (node.node.name.node == "__typename")
                    .then(default_field_resolver::<B>);
                self.q_resolve.push_back(FieldToResolve {
                    parent_path: child_parent_path.clone(),
                    parent_type: type_name.clone(),
                    field_node: node.clone(),
                    sibling_nodes: Arc::clone(&sibling_nodes),
                    source: SourceValue::Deferred(child.source),
                    deferral: Some(Deferral {
                        set: child.set_data,
                        path: child_deferred_path.clone(),
                    }),
                    override_resolver,
                    exclude: exclude.clone(),
                });
            }
        }
    }
}

fn selected_fields(selected: &[Positioned<Field>]) -> Vec<SelectedField> {
    selected
        .iter()
        .map(|field| SelectedField {
            response_key: field.node.response_key().node.to_string(),
            field_name: field.node.name.node.to_string(),
        })
        .collect()
}

fn combine_excludes(current: Option<ExclusionFilter>, additional: ExclusionFilter) -> ExclusionFilter {
    match current {
        None => additional,
        Some(current) => Arc::new(move |traversed, value| current(traversed, value) || additional(traversed, value)),
    }
}
