//! The validate drain: shape checks, null checks, leaf serialization
//! dispatch and recursion into the children of material composites.

use std::sync::Arc;

use async_graphql_parser::{types::Field, Positioned};
use serde_json::Value;

use crate::{
    backend::{DeferredBackend, SourceValue},
    context::ResolveInfo,
    error::ServerError,
    registry::{MetaFieldType, MetaType, MetaTypeName},
    resolver_utils::collect_fields,
};

use super::{
    tasks::{CompletedPiece, FieldToResolve, FieldToValidate},
    Execution,
};

impl<B: DeferredBackend> Execution<B> {
    pub(super) fn drain_validate(&mut self) {
        while let Some(task) = self.q_validate.pop_front() {
            if self.is_suppressed(&task.output_path) {
                continue;
            }
            let ty = task.field_type.to_string();
            self.validate_value(&ty, false, task);
        }
    }

    fn validate_value(&mut self, ty: &str, non_null: bool, task: FieldToValidate) {
        let pos = task.field_node.pos;
        match MetaTypeName::create(ty) {
            MetaTypeName::NonNull(inner) => {
                if task.value.is_null() {
                    self.record(
                        ServerError::new("Cannot return null for non-nullable field", Some(pos))
                            .with_path(task.output_path.to_error_path()),
                        true,
                    );
                } else {
                    self.validate_value(inner, true, task);
                }
            }
            _ if task.value.is_null() => {
                self.complete(task.output_path, Value::Null, pos);
            }
            MetaTypeName::List(inner) => match task.value {
                Value::Array(items) => {
                    if items.is_empty() {
                        self.complete(task.output_path, Value::Array(Vec::new()), pos);
                        return;
                    }
                    for (index, item) in items.into_iter().enumerate() {
                        self.q_validate.push_back(FieldToValidate {
                            field_type: MetaFieldType::from(inner),
                            field_node: task.field_node.clone(),
                            value: item,
                            parent_type: task.parent_type.clone(),
                            output_path: task.output_path.child(index),
                        });
                    }
                }
                _ => {
                    self.record_field_error(
                        &task.output_path,
                        pos,
                        non_null,
                        ServerError::new("Cannot return non-list value for list field", Some(pos)),
                    );
                }
            },
            MetaTypeName::Named(name) => {
                let Some(named_type) = self.registry().lookup_type(name) else {
                    self.record(
                        ServerError::new(format!("Unknown type `{name}`"), Some(pos))
                            .with_path(task.output_path.to_error_path()),
                        false,
                    );
                    return;
                };
                match named_type {
                    MetaType::Scalar(_) => {
                        let serializer = (self.serializer_getter)(named_type);
                        self.completed.push(CompletedPiece {
                            path: task.output_path,
                            value: task.value,
                            serializer: Some(serializer),
                            pos,
                        });
                    }
                    MetaType::Enum(enum_type) => {
                        if task.value.is_array() {
                            self.record_field_error(
                                &task.output_path,
                                pos,
                                non_null,
                                ServerError::new("Cannot return list value for non-list field", Some(pos)),
                            );
                            return;
                        }
                        let member = task.value.as_str().map(|value| enum_type.values.contains(value));
                        if member != Some(true) {
                            let error = ServerError::new(
                                format!("Enum `{}` cannot represent value {}", enum_type.name, task.value),
                                Some(pos),
                            );
                            self.record_field_error(&task.output_path, pos, non_null, error);
                            return;
                        }
                        let serializer = (self.serializer_getter)(named_type);
                        self.completed.push(CompletedPiece {
                            path: task.output_path,
                            value: task.value,
                            serializer: Some(serializer),
                            pos,
                        });
                    }
                    MetaType::Object(_) => {
                        if task.value.is_array() {
                            self.record_field_error(
                                &task.output_path,
                                pos,
                                non_null,
                                ServerError::new("Cannot return list value for non-list field", Some(pos)),
                            );
                            return;
                        }
                        let concrete = name.to_string();
                        self.validate_children(&concrete, task);
                    }
                    MetaType::Interface(_) | MetaType::Union(_) => {
                        self.validate_abstract(name, non_null, task);
                    }
                    MetaType::InputObject(_) => {
                        self.record(
                            ServerError::new(
                                format!("Input object `{name}` cannot be used in output position"),
                                Some(pos),
                            )
                            .with_path(task.output_path.to_error_path()),
                            false,
                        );
                    }
                }
            }
        }
    }

    /// Abstract dispatch over a material value: ask the type resolver for
    /// the concrete object type, then recurse into its selection.
    fn validate_abstract(&mut self, abstract_name: &str, non_null: bool, task: FieldToValidate) {
        let pos = task.field_node.pos;
        let info = ResolveInfo {
            env: self.env.clone(),
            parent_type: task.parent_type.clone(),
            field_name: task.field_node.node.name.node.to_string(),
            path: task.output_path.clone(),
            return_type: task.field_type.clone(),
            field_node: task.field_node.clone(),
        };

        let abstract_type = self
            .registry()
            .lookup_type(abstract_name)
            .expect("caller looked the abstract type up already");
        let type_resolver = (self.type_resolver_getter)(abstract_type);

        let resolved = match type_resolver(&task.value, &info) {
            Ok(resolved) => resolved,
            Err(error) => {
                self.record_field_error(&task.output_path, pos, non_null, error.into_server_error(pos));
                return;
            }
        };

        let concrete = resolved.and_then(|name| {
            let admits = self.registry().type_condition_applies(&name, abstract_name)
                && self.registry().lookup_type(&name).is_some_and(MetaType::is_object);
            admits.then_some(name)
        });
        let Some(concrete) = concrete else {
            let error = ServerError::new(
                format!("Failed to resolve concrete type for `{abstract_name}`"),
                Some(pos),
            );
            self.record_field_error(&task.output_path, pos, non_null, error);
            return;
        };

        self.validate_children(&concrete, task);
    }

    /// A material composite recurses by re-entering the resolve queue, one
    /// task per flattened child selection.
    fn validate_children(&mut self, concrete: &str, task: FieldToValidate) {
        let Some(concrete_type) = self.registry().lookup_type(concrete) else {
            self.record(
                ServerError::new(format!("Unknown type `{concrete}`"), Some(task.field_node.pos))
                    .with_path(task.output_path.to_error_path()),
                false,
            );
            return;
        };

        let selected = match collect_fields(
            self.registry(),
            concrete_type,
            &task.field_node.node.selection_set,
            &self.env.fragments,
        ) {
            Ok(selected) => selected,
            Err(error) => {
                self.record(error.with_path(task.output_path.to_error_path()), false);
                return;
            }
        };

        let sibling_nodes: Arc<Vec<Positioned<Field>>> = Arc::new(selected);
        for field_node in sibling_nodes.iter() {
            // Slot reservation keeps sibling order stable across rounds.
            self.complete(
                task.output_path.child(field_node.node.response_key().node.as_str()),
                Value::Null,
                field_node.pos,
            );
            self.q_resolve.push_back(FieldToResolve {
                parent_path: task.output_path.clone(),
                parent_type: concrete.to_string(),
                field_node: field_node.clone(),
                sibling_nodes: Arc::clone(&sibling_nodes),
                source: SourceValue::Material(task.value.clone()),
                deferral: None,
                override_resolver: None,
                exclude: None,
            });
        }
    }
}
