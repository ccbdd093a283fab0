use graphflow_schema::MetaType;
use indexmap::IndexMap;
use parser::types::{Field, Selection, SelectionSet, TypeCondition};
use parser::Positioned;
use value::{ConstValue, Name};

use crate::directives::{defer_options, should_include};
use crate::dispatcher::PatchEmission;
use crate::executor::ExecContext;
use crate::fields::execute_selection_sets;
use crate::path::{PathSegment, QueryPathNode};
use crate::response::IncrementalPayload;

/// A deferred fragment lifted out of the walk. Owns everything its worker
/// needs, so it can outlive the scope that collected it.
pub(crate) struct DeferredWorkload {
    pub label: Option<String>,
    pub path: Vec<PathSegment>,
    pub parent_type: Name,
    pub selection_set: Positioned<SelectionSet>,
    pub source: ConstValue,
}

#[derive(Default)]
pub(crate) struct CollectedFields<'a> {
    /// Response key to the field nodes that merged under it, in selection
    /// order of the first occurrence.
    pub groups: IndexMap<Name, Vec<&'a Positioned<Field>>>,
    pub deferred: Vec<DeferredWorkload>,
}

/// Walks a selection set in source order, applying `@skip`/`@include`,
/// flattening applicable fragments, and splitting off `@defer`red fragments
/// as separately schedulable workloads (without recursing into them).
pub(crate) fn collect_fields<'a>(
    ctx: &'a ExecContext,
    parent_type: &'a MetaType,
    selection_set: &'a SelectionSet,
    source: &ConstValue,
    path: Option<&QueryPathNode<'_>>,
    collected: &mut CollectedFields<'a>,
) {
    for selection in &selection_set.items {
        match &selection.node {
            Selection::Field(field) => {
                if !should_include(ctx, &field.node.directives) {
                    continue;
                }
                collected
                    .groups
                    .entry(field.node.response_key().node.clone())
                    .or_default()
                    .push(field);
            }
            Selection::FragmentSpread(fragment_spread) => {
                if !should_include(ctx, &fragment_spread.node.directives) {
                    continue;
                }
                let fragment = match ctx
                    .env
                    .document
                    .fragments
                    .get(&fragment_spread.node.fragment_name.node)
                {
                    Some(fragment) => fragment,
                    // Unknown fragments are the validator's responsibility.
                    None => continue,
                };
                if !fragment_applies(ctx, parent_type, Some(&fragment.node.type_condition)) {
                    continue;
                }
                match defer_options(ctx, &fragment_spread.node.directives) {
                    Some(options) => collected.deferred.push(DeferredWorkload {
                        label: options.label,
                        path: ctx.full_path(path),
                        parent_type: parent_type.name.clone(),
                        selection_set: fragment.node.selection_set.clone(),
                        source: source.clone(),
                    }),
                    None => collect_fields(
                        ctx,
                        parent_type,
                        &fragment.node.selection_set.node,
                        source,
                        path,
                        collected,
                    ),
                }
            }
            Selection::InlineFragment(inline_fragment) => {
                if !should_include(ctx, &inline_fragment.node.directives) {
                    continue;
                }
                if !fragment_applies(
                    ctx,
                    parent_type,
                    inline_fragment.node.type_condition.as_ref(),
                ) {
                    continue;
                }
                match defer_options(ctx, &inline_fragment.node.directives) {
                    Some(options) => collected.deferred.push(DeferredWorkload {
                        label: options.label,
                        path: ctx.full_path(path),
                        parent_type: parent_type.name.clone(),
                        selection_set: inline_fragment.node.selection_set.clone(),
                        source: source.clone(),
                    }),
                    None => collect_fields(
                        ctx,
                        parent_type,
                        &inline_fragment.node.selection_set.node,
                        source,
                        path,
                        collected,
                    ),
                }
            }
        }
    }
}

/// Type-condition applicability: equal object type, object implementing the
/// interface, or object belonging to the union. No condition always applies.
fn fragment_applies(
    ctx: &ExecContext,
    parent_type: &MetaType,
    condition: Option<&Positioned<TypeCondition>>,
) -> bool {
    match condition {
        None => true,
        Some(condition) => {
            let on_type = condition.node.on.node.as_str();
            ctx.env
                .schema
                .type_by_name(on_type)
                .map(|condition_type| condition_type.is_possible_type(parent_type.name.as_str()))
                .unwrap_or(false)
        }
    }
}

/// Hands a deferred fragment to the dispatcher. The worker re-collects the
/// fragment's selection set against the captured parent type and source at
/// the captured path; anything it defers or streams in turn is scheduled
/// through its own dispatcher handle.
pub(crate) fn schedule_deferred(ctx: &ExecContext, workload: DeferredWorkload) {
    tracing::debug!(path = ?workload.path, label = ?workload.label, "defer scheduled");
    let env = ctx.env.clone();
    let dispatcher = ctx.dispatcher.clone();
    ctx.dispatcher.schedule(Box::pin(async move {
        let worker = ExecContext {
            env: env.clone(),
            dispatcher,
            errors: Default::default(),
            base_path: workload.path.clone(),
        };
        let data = match env.schema.type_by_name(workload.parent_type.as_str()) {
            Some(parent_type) => {
                match execute_selection_sets(
                    &worker,
                    parent_type,
                    &[&workload.selection_set.node],
                    &workload.source,
                    None,
                    false,
                )
                .await
                {
                    Ok(value) => value,
                    // A null escaping a non-null region at the fragment's
                    // root lands here; the located error goes on this
                    // patch's errors list, never on the initial result.
                    Err(error) => {
                        worker.add_error(error);
                        ConstValue::Null
                    }
                }
            }
            None => ConstValue::Null,
        };
        let errors = worker.take_errors();
        PatchEmission {
            payload: IncrementalPayload {
                data: Some(data),
                path: Some(workload.path),
                label: workload.label,
                errors,
                has_next: true,
            },
            next: None,
        }
    }));
}
