//! The resolve drain: runs field resolvers and routes their results onward.

use std::sync::Arc;

use async_graphql_parser::{types::Field, Pos, Positioned};
use futures_util::future::{join_all, BoxFuture};
use serde_json::Value;

use crate::{
    backend::{expand::ExclusionFilter, DeferredBackend, FieldSource, ResolvedValue, SourceValue, WrappedValue},
    context::{BoxFieldResolver, ResolveInfo, ResolverParams},
    error::ServerError,
    middleware::compose,
    query_path::QueryPath,
    registry::MetaFieldType,
    resolver_utils::resolve_arguments,
    Error,
};

use super::{
    tasks::{CompletedPiece, Deferral, FieldToDiscriminate, FieldToResolve, FieldToRestage},
    Execution,
};

/// Everything `finish_resolve` needs once the resolver future has settled.
struct ResolveMeta<B: DeferredBackend> {
    parent_path: QueryPath,
    parent_type: String,
    field_node: Positioned<Field>,
    sibling_nodes: Arc<Vec<Positioned<Field>>>,
    deferral: Option<Deferral<B>>,
    override_resolver: Option<BoxFieldResolver<B>>,
    exclude: Option<ExclusionFilter>,
    /// The deferred source expression, kept for the restage case.
    source_expr: Option<B::Expr>,
    output_path: QueryPath,
    response_key: String,
    field_type: MetaFieldType,
    field_non_null: bool,
    pos: Pos,
}

type ResolveFuture<B> = BoxFuture<'static, Result<ResolvedValue<B>, Error>>;

impl<B: DeferredBackend> Execution<B> {
    pub(super) async fn drain_resolve(&mut self) {
        while !self.q_resolve.is_empty() {
            let tasks: Vec<_> = self.q_resolve.drain(..).collect();
            tracing::trace!(tasks = tasks.len(), "draining resolve queue");

            let mut prepared = Vec::with_capacity(tasks.len());
            for task in tasks {
                if let Some(entry) = self.prepare_resolve(task) {
                    prepared.push(entry);
                }
            }

            // Resolvers of one snapshot are awaited together; mutations run
            // them one at a time instead.
            let settled: Vec<(ResolveMeta<B>, Result<ResolvedValue<B>, Error>)> = if self.serial {
                let mut settled = Vec::with_capacity(prepared.len());
                for (meta, fut) in prepared {
                    let result = fut.await;
                    settled.push((meta, result));
                }
                settled
            } else {
                let (metas, futures): (Vec<_>, Vec<_>) = prepared.into_iter().unzip();
                metas.into_iter().zip(join_all(futures).await).collect()
            };

            for (meta, result) in settled {
                self.finish_resolve(meta, result);
            }
        }
    }

    fn prepare_resolve(&mut self, task: FieldToResolve<B>) -> Option<(ResolveMeta<B>, ResolveFuture<B>)> {
        let FieldToResolve {
            parent_path,
            parent_type,
            field_node,
            sibling_nodes,
            source,
            deferral,
            override_resolver,
            exclude,
        } = task;

        let response_key = field_node.node.response_key().node.to_string();
        let output_path = parent_path.child(response_key.as_str());
        if self.is_suppressed(&output_path) {
            return None;
        }
        let pos = field_node.pos;
        let field_name = field_node.node.name.node.to_string();

        // `__typename` has no field definition. On a known concrete type it
        // resolves to a constant; under abstract dispatch an override
        // resolver projects the tag out of the (possibly deferred) value.
        if field_name == "__typename" {
            let (fut, source_expr): (ResolveFuture<B>, Option<B::Expr>) = match &override_resolver {
                None => {
                    let typename = parent_type.clone();
                    (
                        Box::pin(async move { Ok(ResolvedValue::Material(Value::String(typename))) }),
                        None,
                    )
                }
                Some(resolver) => {
                    let (field_source, source_expr) = self.split_source(source);
                    let info = ResolveInfo {
                        env: self.env.clone(),
                        parent_type: parent_type.clone(),
                        field_name,
                        path: output_path.clone(),
                        return_type: MetaFieldType::from("String!"),
                        field_node: field_node.clone(),
                    };
                    (
                        resolver(ResolverParams {
                            source: field_source,
                            args: Default::default(),
                            info,
                        }),
                        source_expr,
                    )
                }
            };
            let meta = ResolveMeta {
                parent_path,
                parent_type,
                field_node,
                sibling_nodes,
                deferral,
                override_resolver,
                exclude,
                source_expr,
                output_path,
                response_key,
                field_type: MetaFieldType::from("String!"),
                field_non_null: true,
                pos,
            };
            return Some((meta, fut));
        }

        let Some(parent) = self.registry().lookup_type(&parent_type) else {
            self.record(
                ServerError::new(format!("Unknown type `{parent_type}`"), Some(pos))
                    .with_path(output_path.to_error_path()),
                false,
            );
            return None;
        };
        let Some(field) = parent.field_by_name(&field_name) else {
            self.record(
                ServerError::new(
                    format!("Could not find a field named {field_name} on {parent_type}"),
                    Some(pos),
                )
                .with_path(output_path.to_error_path()),
                false,
            );
            return None;
        };
        let field_type = field.ty.clone();
        let field_non_null = field_type.is_non_null();

        let args = match resolve_arguments(
            self.registry(),
            &self.env.variables,
            &field.args,
            &field_node.node.arguments,
            pos,
        ) {
            Ok(args) => args,
            Err(error) => {
                self.record_field_error(&output_path, pos, field_non_null, error);
                return None;
            }
        };

        let resolver = match &override_resolver {
            Some(resolver) => Arc::clone(resolver),
            None => compose(&self.resolver_middleware, (self.resolver_getter)(field)),
        };

        let (field_source, source_expr) = self.split_source(source);

        let info = ResolveInfo {
            env: self.env.clone(),
            parent_type: parent_type.clone(),
            field_name,
            path: output_path.clone(),
            return_type: field_type.clone(),
            field_node: field_node.clone(),
        };

        let fut = resolver(ResolverParams {
            source: field_source,
            args,
            info,
        });

        let meta = ResolveMeta {
            parent_path,
            parent_type,
            field_node,
            sibling_nodes,
            deferral,
            override_resolver,
            exclude,
            source_expr,
            output_path,
            response_key,
            field_type,
            field_non_null,
            pos,
        };
        Some((meta, fut))
    }

    fn finish_resolve(&mut self, meta: ResolveMeta<B>, result: Result<ResolvedValue<B>, Error>) {
        match result {
            Ok(value) => {
                // A returned wrapped value stands for its expression.
                let value = match value {
                    ResolvedValue::Wrapped(wrapped) => ResolvedValue::Deferred(wrapped.into_expr()),
                    other => other,
                };
                self.q_discriminate.push_back(FieldToDiscriminate {
                    field_node: meta.field_node,
                    field_type: meta.field_type,
                    value,
                    parent_type: meta.parent_type,
                    output_path: meta.output_path,
                    deferral: meta.deferral,
                    exclude: meta.exclude,
                });
            }
            Err(error) if error.is_next_stage() => match (meta.deferral, meta.source_expr) {
                (Some(deferral), Some(expr)) => {
                    // Park the field: its slot in the ancestor composite
                    // carries the source as-is, so the materialized batch
                    // hands the resolver its data on the second pass.
                    (deferral.set)(expr);
                    let deferred_path = deferral.path.child(meta.response_key.as_str());
                    tracing::trace!(path = %meta.output_path, "restaging field after next batch");
                    self.q_restage.push_back(FieldToRestage {
                        field_node: meta.field_node,
                        sibling_nodes: meta.sibling_nodes,
                        parent_type: meta.parent_type,
                        prev_path: meta.parent_path,
                        deferred_path,
                        exclude: meta.exclude,
                        override_resolver: meta.override_resolver,
                    });
                }
                _ => {
                    let message = format!(
                        "Expected a deferral for field `{}`",
                        meta.field_node.node.name.node
                    );
                    self.record_field_error(
                        &meta.output_path,
                        meta.pos,
                        meta.field_non_null,
                        ServerError::new(message, Some(meta.pos)),
                    );
                }
            },
            Err(error) => {
                self.record_field_error(
                    &meta.output_path,
                    meta.pos,
                    meta.field_non_null,
                    error.into_server_error(meta.pos),
                );
            }
        }
    }

    /// A wrapped source keeps its expression around for a possible restage.
    fn split_source(&self, source: SourceValue<B>) -> (FieldSource<B>, Option<B::Expr>) {
        match source {
            SourceValue::Material(value) => (FieldSource::Material(value), None),
            SourceValue::Deferred(expr) => (
                FieldSource::Wrapped(WrappedValue::new(Arc::clone(self.backend()), expr.clone())),
                Some(expr),
            ),
        }
    }

    pub(super) fn complete(&mut self, path: QueryPath, value: Value, pos: Pos) {
        self.completed.push(CompletedPiece {
            path,
            value,
            serializer: None,
            pos,
        });
    }
}
