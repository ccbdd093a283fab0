use std::collections::HashSet;

use indexmap::IndexMap;
use parser::types::{Directive, Field, Selection, SelectionSet};
use parser::Positioned;
use value::{Number, Value};

use crate::visitor::{Visitor, VisitorContext};

/// Two field selections that land under the same response key must carry
/// identical `@stream` directives (same `if`, `label`, and `initialCount`),
/// or none at all. Aliasing one of the fields resolves the conflict.
#[derive(Default)]
pub struct ConflictingStreamDirectives;

impl<'a> Visitor<'a> for ConflictingStreamDirectives {
    fn enter_selection_set(
        &mut self,
        ctx: &mut VisitorContext<'a>,
        selection_set: &'a Positioned<SelectionSet>,
    ) {
        let mut seen = IndexMap::new();
        let mut visited_fragments = HashSet::new();
        check_selection_set(ctx, &selection_set.node, &mut seen, &mut visited_fragments);
    }
}

struct SeenField<'a> {
    field: &'a Positioned<Field>,
    stream: Option<&'a Positioned<Directive>>,
    conflicted: bool,
}

fn check_selection_set<'a>(
    ctx: &mut VisitorContext<'a>,
    selection_set: &'a SelectionSet,
    seen: &mut IndexMap<&'a str, SeenField<'a>>,
    visited_fragments: &mut HashSet<&'a str>,
) {
    for selection in &selection_set.items {
        match &selection.node {
            Selection::Field(field) => {
                let response_key = field.node.response_key().node.as_str();
                let stream = field
                    .node
                    .directives
                    .iter()
                    .find(|directive| directive.node.name.node.as_str() == "stream");
                match seen.get_mut(response_key) {
                    Some(entry) => {
                        if !entry.conflicted && !same_stream(entry.stream, stream) {
                            entry.conflicted = true;
                            ctx.report_error(
                                vec![entry.field.pos, field.pos],
                                format!(
                                    "Fields \"{}\" conflict because they have differing stream directives. \
                                     Use different aliases on the fields to fetch both if this was intentional.",
                                    response_key
                                ),
                            );
                        }
                    }
                    None => {
                        seen.insert(
                            response_key,
                            SeenField {
                                field,
                                stream,
                                conflicted: false,
                            },
                        );
                    }
                }
            }
            Selection::FragmentSpread(fragment_spread) => {
                let name = fragment_spread.node.fragment_name.node.as_str();
                if visited_fragments.insert(name) {
                    if let Some(fragment) = ctx.fragment(name) {
                        check_selection_set(
                            ctx,
                            &fragment.node.selection_set.node,
                            seen,
                            visited_fragments,
                        );
                    }
                }
            }
            Selection::InlineFragment(inline_fragment) => {
                check_selection_set(
                    ctx,
                    &inline_fragment.node.selection_set.node,
                    seen,
                    visited_fragments,
                );
            }
        }
    }
}

fn directive_argument<'a>(directive: &'a Positioned<Directive>, name: &str) -> Option<&'a Value> {
    directive
        .node
        .arguments
        .iter()
        .find(|(arg_name, _)| arg_name.node.as_str() == name)
        .map(|(_, value)| &value.node)
}

fn argument_or_default<'a>(
    directive: &'a Positioned<Directive>,
    name: &str,
    default: &'a Value,
) -> &'a Value {
    directive_argument(directive, name).unwrap_or(default)
}

fn same_stream(a: Option<&Positioned<Directive>>, b: Option<&Positioned<Directive>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            let defaults = [
                ("if", Value::Boolean(true)),
                ("label", Value::Null),
                ("initialCount", Value::Number(Number::from(0))),
            ];
            defaults.iter().all(|(name, default)| {
                argument_or_default(a, name, default) == argument_or_default(b, name, default)
            })
        }
        _ => false,
    }
}
