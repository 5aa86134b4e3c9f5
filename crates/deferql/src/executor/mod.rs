//! The multi-stage scheduler.
//!
//! Execution is a cooperative loop over FIFO work queues. Each pass drains
//! `resolve`, `discriminate` and `validate` to exhaustion; if deferred
//! expressions accumulated in the batch, one combined backend call is
//! issued, after which `restage` and `revalidate` feed fresh work back into
//! `resolve` and `validate`. The loop ends when every queue and the batch
//! are empty.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use async_graphql_parser::Pos;
use serde_json::Value;

use crate::{
    backend::DeferredBackend,
    context::{identity_serializer, BoxFieldResolver, BoxTypeResolver, QueryEnv},
    error::{PathSegment, ServerError},
    middleware::{
        compose, BoxFieldResolverGetter, BoxResolveDeferred, BoxSerializerGetter, BoxTypeResolverGetter,
        FieldResolverMiddleware, MiddlewareBundles,
    },
    query_path::QueryPath,
    registry::{scalars, MetaField, MetaType, MetaTypeName, Registry},
    resolver_utils::collect_fields,
    response::{insert_at_path, set_null_at, Response},
    schema::Schema,
    Error,
};

mod discriminate;
mod followup;
mod resolve;
mod tasks;
mod validate;

use tasks::{
    CompletedPiece, DeferredBatch, FieldToDiscriminate, FieldToResolve, FieldToRestage, FieldToRevalidate,
    FieldToValidate, RecordedError,
};

/// Per-request overrides for the execution surface: middleware bundles
/// composed outside the schema defaults, and replacement default resolvers.
pub struct ExecutionOverrides<B: DeferredBackend> {
    pub middlewares: MiddlewareBundles<B>,
    pub field_resolver: Option<BoxFieldResolver<B>>,
    pub type_resolver: Option<BoxTypeResolver>,
}

impl<B: DeferredBackend> Default for ExecutionOverrides<B> {
    fn default() -> Self {
        Self {
            middlewares: MiddlewareBundles::default(),
            field_resolver: None,
            type_resolver: None,
        }
    }
}

pub(crate) struct Execution<B: DeferredBackend> {
    schema: Schema<B>,
    env: QueryEnv,

    resolver_getter: BoxFieldResolverGetter<B>,
    resolver_middleware: Vec<FieldResolverMiddleware<B>>,
    type_resolver_getter: BoxTypeResolverGetter<B>,
    serializer_getter: BoxSerializerGetter<B>,
    resolve_deferred: BoxResolveDeferred<B>,
    /// Mutations drain their resolvers serially.
    serial: bool,

    q_resolve: VecDeque<FieldToResolve<B>>,
    q_discriminate: VecDeque<FieldToDiscriminate<B>>,
    q_validate: VecDeque<FieldToValidate>,
    q_restage: VecDeque<FieldToRestage<B>>,
    q_revalidate: VecDeque<FieldToRevalidate>,
    batch: DeferredBatch<B::Expr>,

    completed: Vec<CompletedPiece>,
    errors: Vec<RecordedError>,
}

impl<B: DeferredBackend> Execution<B> {
    pub(crate) fn new(schema: Schema<B>, env: QueryEnv, overrides: ExecutionOverrides<B>, serial: bool) -> Self {
        let bundles = schema.inner().middlewares.clone().stacked_onto(overrides.middlewares);

        let default_field_resolver = overrides
            .field_resolver
            .unwrap_or_else(|| schema.inner().field_resolver.clone());
        let getter_base: BoxFieldResolverGetter<B> = Arc::new(move |field: &MetaField<B>| {
            field
                .resolver
                .clone()
                .unwrap_or_else(|| default_field_resolver.clone())
        });
        let resolver_getter = compose(&bundles.field_resolver_getter, getter_base);

        let default_type_resolver = overrides
            .type_resolver
            .unwrap_or_else(|| schema.inner().type_resolver.clone());
        let type_getter_base: BoxTypeResolverGetter<B> =
            Arc::new(move |_: &MetaType<B>| default_type_resolver.clone());
        let type_resolver_getter = compose(&bundles.type_resolver_getter, type_getter_base);

        let serializer_base: BoxSerializerGetter<B> = Arc::new(|ty: &MetaType<B>| match ty {
            MetaType::Scalar(scalar) => scalar
                .serialize
                .clone()
                .or_else(|| scalars::builtin_serializer(&scalar.name))
                .unwrap_or_else(identity_serializer),
            _ => identity_serializer(),
        });
        let serializer_getter = compose(&bundles.serializer_getter, serializer_base);

        let backend = Arc::clone(&schema.inner().backend);
        let resolve_base: BoxResolveDeferred<B> = Arc::new(move |batch| {
            let backend = Arc::clone(&backend);
            Box::pin(async move { backend.resolve_deferred(batch).await })
        });
        let resolve_deferred = compose(&bundles.resolve_deferred, resolve_base);

        Self {
            schema,
            env,
            resolver_getter,
            resolver_middleware: bundles.field_resolver,
            type_resolver_getter,
            serializer_getter,
            resolve_deferred,
            serial,
            q_resolve: VecDeque::new(),
            q_discriminate: VecDeque::new(),
            q_validate: VecDeque::new(),
            q_restage: VecDeque::new(),
            q_revalidate: VecDeque::new(),
            batch: DeferredBatch::new(),
            completed: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn registry(&self) -> &Registry<B> {
        &self.schema.inner().registry
    }

    fn backend(&self) -> &Arc<B> {
        &self.schema.inner().backend
    }

    /// An error recorded for a path suppresses any work underneath it.
    fn is_suppressed(&self, path: &QueryPath) -> bool {
        self.errors.iter().any(|recorded| path.is_covered_by(&recorded.error.path))
    }

    fn error_paths(&self) -> Vec<Vec<PathSegment>> {
        self.errors.iter().map(|recorded| recorded.error.path.clone()).collect()
    }

    fn record(&mut self, error: ServerError, bubbles: bool) {
        self.errors.push(RecordedError { error, bubbles });
    }

    /// A failed field: the error is recorded and, when the field is
    /// nullable, its slot completes as `null`. Non-null failures bubble at
    /// assembly time instead.
    fn record_field_error(&mut self, output_path: &QueryPath, pos: Pos, non_null: bool, error: ServerError) {
        let error = if error.path.is_empty() {
            error.with_path(output_path.to_error_path())
        } else {
            error
        };
        self.record(error, non_null);
        // A field that failed before its list ancestors materialized has no
        // concrete slots to null out; the recorded error already suppresses
        // the expansion underneath it.
        if !non_null && output_path.flatten_count() == 0 {
            self.completed.push(CompletedPiece {
                path: output_path.clone(),
                value: Value::Null,
                serializer: None,
                pos,
            });
        }
    }

    fn seed(&mut self) -> Result<(), ServerError> {
        let operation = &self.env.operation;
        let Some(root_name) = self.registry().root_type_name(operation.node.ty).map(str::to_string) else {
            return Err(ServerError::new(
                format!("Schema is not configured for {}s", operation_kind(operation.node.ty)),
                Some(operation.pos),
            ));
        };
        let Some(root_type) = self.registry().lookup_type(&root_name) else {
            return Err(ServerError::new(
                format!("Unknown root type `{root_name}`"),
                Some(operation.pos),
            ));
        };

        let selected = collect_fields(
            self.registry(),
            root_type,
            &operation.node.selection_set,
            &self.env.fragments,
        )?;
        let sibling_nodes = Arc::new(selected.clone());
        let root_value = self.env.root_value.clone();
        for field_node in selected {
            // Reserve the response slot now so sibling fields that complete
            // in different rounds still land in selection order.
            self.completed.push(CompletedPiece {
                path: QueryPath::empty().child(field_node.node.response_key().node.as_str()),
                value: Value::Null,
                serializer: None,
                pos: field_node.pos,
            });
            self.q_resolve.push_back(FieldToResolve {
                parent_path: QueryPath::empty(),
                parent_type: root_name.clone(),
                field_node,
                sibling_nodes: Arc::clone(&sibling_nodes),
                source: crate::backend::SourceValue::Material(root_value.clone()),
                deferral: None,
                override_resolver: None,
                exclude: None,
            });
        }
        Ok(())
    }

    pub(crate) async fn run(mut self) -> Response {
        if let Err(error) = self.seed() {
            self.record(error, false);
            return self.assemble().await;
        }

        loop {
            while !(self.q_resolve.is_empty() && self.q_discriminate.is_empty() && self.q_validate.is_empty()) {
                self.drain_resolve().await;
                self.drain_discriminate();
                self.drain_validate();
            }

            if self.batch.is_empty() {
                debug_assert!(self.q_restage.is_empty() && self.q_revalidate.is_empty());
                break;
            }

            let frozen = self.batch.take();
            let expected = frozen.len();
            let exprs = frozen.into_iter().map(|(expr, _)| expr).collect::<Vec<_>>();
            tracing::debug!(slots = expected, "submitting deferred batch");

            match (self.resolve_deferred.clone())(exprs).await {
                Ok(results) if results.len() == expected => {
                    self.drain_restage(&results);
                    self.drain_revalidate(&results);
                }
                Ok(results) => {
                    self.record_batch_failure(Error::new(format!(
                        "The deferred backend returned {} results for a batch of {expected}",
                        results.len()
                    )));
                }
                Err(error) => self.record_batch_failure(error),
            }

            debug_assert!(self.batch.is_empty() || !self.q_resolve.is_empty() || !self.q_validate.is_empty());
        }

        self.assemble().await
    }

    /// A transport-level batch failure covers every output path filed
    /// against the batch; the follow-up work scheduled on it is dropped and
    /// the affected fields stay null.
    fn record_batch_failure(&mut self, error: Error) {
        tracing::debug!(message = %error.message, "deferred batch failed");
        let mut server_error = ServerError::new(error.message.clone(), None);
        server_error.source = error.source;
        self.record(server_error, false);
        self.q_restage.clear();
        self.q_revalidate.clear();
    }

    async fn assemble(self) -> Response {
        let Execution {
            schema,
            env,
            completed,
            errors,
            ..
        } = self;

        let registry = &schema.inner().registry;
        let root_type = registry
            .root_type_name(env.operation.node.ty)
            .unwrap_or(registry.query_type.as_str())
            .to_string();

        let mut recorded = errors;
        let mut data = Value::Null;
        for piece in completed {
            let value = match piece.serializer {
                Some(serialize) => match serialize(piece.value).await {
                    Ok(value) => value,
                    Err(error) => {
                        recorded.push(RecordedError {
                            error: error
                                .into_server_error(piece.pos)
                                .with_path(piece.path.to_error_path()),
                            bubbles: false,
                        });
                        continue;
                    }
                },
                None => piece.value,
            };
            insert_at_path(&mut data, piece.path.segments(), value);
        }

        for recorded_error in recorded.iter().filter(|recorded| recorded.bubbles) {
            match nearest_nullable_ancestor(registry, &root_type, &recorded_error.error.path) {
                Some(prefix) => set_null_at(&mut data, &recorded_error.error.path[..prefix]),
                None => data = Value::Null,
            }
        }

        let mut seen = HashSet::new();
        let mut errors = Vec::new();
        for recorded_error in recorded {
            if seen.insert(recorded_error.error.fingerprint()) {
                errors.push(recorded_error.error);
            }
        }

        Response { data, errors }
    }
}

fn operation_kind(ty: async_graphql_parser::types::OperationType) -> &'static str {
    match ty {
        async_graphql_parser::types::OperationType::Query => "query",
        async_graphql_parser::types::OperationType::Mutation => "mutation",
        async_graphql_parser::types::OperationType::Subscription => "subscription",
    }
}

/// The deepest strictly-proper ancestor of `path` whose type is nullable,
/// as a prefix length; `None` when the null must reach the root. Positions
/// the registry cannot see through (e.g. fields of union members) end the
/// walk early, which only ever makes propagation reach further up.
fn nearest_nullable_ancestor<B: DeferredBackend>(
    registry: &Registry<B>,
    root_type: &str,
    path: &[PathSegment],
) -> Option<usize> {
    if path.is_empty() {
        return None;
    }

    let mut nullable_at = Vec::with_capacity(path.len());
    let mut current_type = Some(root_type.to_string());
    let mut wrapper: Option<String> = None;

    for segment in path {
        match segment {
            PathSegment::Field(name) if name != "@" => {
                let Some(field_ty) = current_type
                    .as_ref()
                    .and_then(|name| registry.lookup_type(name))
                    .and_then(|ty| ty.field_by_name(name))
                    .map(|field| field.ty.clone())
                else {
                    break;
                };
                nullable_at.push(!field_ty.is_non_null());
                current_type = Some(field_ty.named_type().to_string());
                wrapper = Some(field_ty.to_string());
            }
            _ => {
                let Some(current) = wrapper.clone() else { break };
                let peeled = match MetaTypeName::create(&current) {
                    MetaTypeName::NonNull(inner) => inner.to_string(),
                    _ => current,
                };
                let MetaTypeName::List(element) = MetaTypeName::create(&peeled) else {
                    break;
                };
                nullable_at.push(!element.ends_with('!'));
                wrapper = Some(element.to_string());
            }
        }
    }

    let error_position = path.len() - 1;
    (0..nullable_at.len().min(error_position))
        .rev()
        .find(|&i| nullable_at[i])
        .map(|i| i + 1)
}
