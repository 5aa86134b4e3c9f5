//! The work items the scheduler moves between its queues, and the batch
//! accumulator deferred expressions are collected into.

use std::sync::{Arc, Mutex};

use async_graphql_parser::{types::Field, Pos, Positioned};

use crate::{
    backend::{expand::ExclusionFilter, DeferredBackend, ExprSetter, ResolvedValue, SourceValue},
    context::{BoxFieldResolver, BoxSerializer},
    error::ServerError,
    query_path::{DeferredPath, QueryPath},
    registry::MetaFieldType,
};

/// Where a field under a deferred ancestor installs its contribution, and
/// the deferred-path prefix addressing that ancestor in the batch result.
pub(crate) struct Deferral<B: DeferredBackend> {
    pub set: ExprSetter<B::Expr>,
    pub path: DeferredPath,
}

impl<B: DeferredBackend> Clone for Deferral<B> {
    fn clone(&self) -> Self {
        Self {
            set: Arc::clone(&self.set),
            path: self.path.clone(),
        }
    }
}

pub(crate) struct FieldToResolve<B: DeferredBackend> {
    pub parent_path: QueryPath,
    /// Name of the concrete type the field is selected on.
    pub parent_type: String,
    pub field_node: Positioned<Field>,
    /// Every flattened sibling selected on the parent, this field included.
    pub sibling_nodes: Arc<Vec<Positioned<Field>>>,
    pub source: SourceValue<B>,
    pub deferral: Option<Deferral<B>>,
    pub override_resolver: Option<BoxFieldResolver<B>>,
    pub exclude: Option<ExclusionFilter>,
}

pub(crate) struct FieldToDiscriminate<B: DeferredBackend> {
    pub field_node: Positioned<Field>,
    pub field_type: MetaFieldType,
    pub value: ResolvedValue<B>,
    pub parent_type: String,
    pub output_path: QueryPath,
    pub deferral: Option<Deferral<B>>,
    pub exclude: Option<ExclusionFilter>,
}

pub(crate) struct FieldToValidate {
    pub field_type: MetaFieldType,
    pub field_node: Positioned<Field>,
    pub value: serde_json::Value,
    pub parent_type: String,
    pub output_path: QueryPath,
}

pub(crate) struct FieldToRestage<B: DeferredBackend> {
    pub field_node: Positioned<Field>,
    pub sibling_nodes: Arc<Vec<Positioned<Field>>>,
    pub parent_type: String,
    pub prev_path: QueryPath,
    pub deferred_path: DeferredPath,
    pub exclude: Option<ExclusionFilter>,
    pub override_resolver: Option<BoxFieldResolver<B>>,
}

pub(crate) struct FieldToRevalidate {
    pub field_type: MetaFieldType,
    pub field_node: Positioned<Field>,
    pub parent_type: String,
    pub output_path: QueryPath,
    pub deferred_path: DeferredPath,
    pub exclude: Option<ExclusionFilter>,
}

/// A value destined for the response tree, with the serializer to run when
/// the tree is folded.
pub(crate) struct CompletedPiece {
    pub path: QueryPath,
    pub value: serde_json::Value,
    pub serializer: Option<BoxSerializer>,
    pub pos: Pos,
}

/// An error accumulated during execution. `bubbles` marks null-in-non-null
/// violations whose null must propagate to the nearest nullable ancestor
/// when the response is assembled.
pub(crate) struct RecordedError {
    pub error: ServerError,
    pub bubbles: bool,
}

struct Slot<E> {
    expr: E,
    path: QueryPath,
}

/// The batch accumulator. Slots are handed out in insertion order; the
/// setter returned by [`DeferredBatch::allocate`] replaces the slot's
/// expression whenever a child contribution updates the composite, until
/// [`DeferredBatch::take`] freezes the round.
pub(crate) struct DeferredBatch<E> {
    slots: Arc<Mutex<Vec<Slot<E>>>>,
}

impl<E> Default for DeferredBatch<E> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Send + 'static> DeferredBatch<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn allocate(&self, expr: E, path: QueryPath) -> (usize, ExprSetter<E>) {
        let mut slots = self.slots.lock().unwrap();
        let index = slots.len();
        slots.push(Slot { expr, path });
        drop(slots);

        let slots = Arc::clone(&self.slots);
        let setter: ExprSetter<E> = Arc::new(move |expr| {
            // A setter that outlives its round has nothing to update.
            if let Some(slot) = slots.lock().unwrap().get_mut(index) {
                slot.expr = expr;
            }
        });
        (index, setter)
    }

    /// Freezes and drains the current round.
    pub fn take(&self) -> Vec<(E, QueryPath)> {
        std::mem::take(&mut *self.slots.lock().unwrap())
            .into_iter()
            .map(|slot| (slot.expr, slot.path))
            .collect()
    }
}
