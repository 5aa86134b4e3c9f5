use std::collections::HashMap;

use async_graphql_parser::{
    types::{Directive, Field, FragmentDefinition, Selection, SelectionSet},
    Positioned,
};
use async_graphql_value::Name;
use indexmap::IndexMap;

use crate::{
    backend::DeferredBackend,
    error::{ServerError, ServerResult},
    registry::{MetaType, Registry},
};

/// Flattens a selection set against a concrete type into an ordered,
/// deduplicated list of field nodes.
///
/// Fragment spreads and inline fragments are resolved recursively; a type
/// condition admits the selection when the concrete type is the named type,
/// transitively implements the named interface, or is a member of the named
/// union. Duplicate response keys merge their nested selection sets, and
/// must agree on field name, arguments and directives to do so.
pub fn collect_fields<B: DeferredBackend>(
    registry: &Registry<B>,
    concrete_type: &MetaType<B>,
    selection_set: &Positioned<SelectionSet>,
    fragments: &HashMap<Name, Positioned<FragmentDefinition>>,
) -> ServerResult<Vec<Positioned<Field>>> {
    let mut fields: IndexMap<String, Positioned<Field>> = IndexMap::new();
    collect_into(registry, concrete_type, selection_set, fragments, &mut fields)?;
    Ok(fields.into_values().collect())
}

fn collect_into<B: DeferredBackend>(
    registry: &Registry<B>,
    concrete_type: &MetaType<B>,
    selection_set: &Positioned<SelectionSet>,
    fragments: &HashMap<Name, Positioned<FragmentDefinition>>,
    fields: &mut IndexMap<String, Positioned<Field>>,
) -> ServerResult<()> {
    for selection in &selection_set.node.items {
        match &selection.node {
            Selection::Field(field) => {
                let key = field.node.response_key().node.to_string();
                match fields.get_mut(&key) {
                    None => {
                        fields.insert(key, field.clone());
                    }
                    Some(existing) => {
                        let compatible = existing.node.name == field.node.name
                            && existing.node.arguments == field.node.arguments
                            && directives_equal(&existing.node.directives, &field.node.directives);
                        if !compatible {
                            return Err(ServerError::new(
                                format!(
                                    "Fields for response key `{key}` conflict: they must have \
                                     identical field names, arguments and directives"
                                ),
                                Some(field.pos),
                            ));
                        }
                        existing
                            .node
                            .selection_set
                            .node
                            .items
                            .extend(field.node.selection_set.node.items.iter().cloned());
                    }
                }
            }
            selection => {
                let (type_condition, selection_set) = match selection {
                    Selection::Field(_) => unreachable!(),
                    Selection::FragmentSpread(spread) => {
                        let Some(fragment) = fragments.get(&spread.node.fragment_name.node) else {
                            return Err(ServerError::new(
                                format!(r#"Unknown fragment "{}"."#, spread.node.fragment_name.node),
                                Some(spread.pos),
                            ));
                        };
                        (Some(&fragment.node.type_condition), &fragment.node.selection_set)
                    }
                    Selection::InlineFragment(fragment) => {
                        (fragment.node.type_condition.as_ref(), &fragment.node.selection_set)
                    }
                };

                let applies = type_condition.map_or(true, |condition| {
                    registry.type_condition_applies(concrete_type.name(), condition.node.on.node.as_str())
                });
                if applies {
                    collect_into(registry, concrete_type, selection_set, fragments, fields)?;
                }
            }
        }
    }
    Ok(())
}

fn directives_equal(a: &[Positioned<Directive>], b: &[Positioned<Directive>]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(left, right)| left.node.name == right.node.name && left.node.arguments == right.node.arguments)
}
