use futures_util::future::{join_all, BoxFuture};
use futures_util::StreamExt;
use graphflow_schema::{MetaField, MetaType, TypeKind};
use indexmap::IndexMap;
use parser::types::{BaseType, Field, SelectionSet, Type};
use parser::{Pos, Positioned};
use value::{ConstValue, Name};

use crate::collector::{collect_fields, schedule_deferred, CollectedFields};
use crate::directives::{stream_options, StreamOptions};
use crate::executor::ExecContext;
use crate::path::{QueryPathNode, QueryPathSegment};
use crate::resolver::{default_resolve_field, ResolvedValue, ResolverContext};
use crate::response::ServerError;
use crate::stream;

pub(crate) fn positions(nodes: &[&Positioned<Field>]) -> Vec<Pos> {
    nodes.iter().map(|node| node.pos).collect()
}

/// Executes merged selection sets against a resolved source value. Deferred
/// fragments are handed to the dispatcher, the remaining field groups
/// resolve concurrently (or strictly in source order for root mutation
/// fields), and result keys keep selection order.
///
/// `Err` means a null escaped a non-null region somewhere below and the
/// object itself must become null; the caller owns the recording decision.
pub(crate) async fn execute_selection_sets(
    ctx: &ExecContext,
    parent_type: &MetaType,
    selection_sets: &[&SelectionSet],
    source: &ConstValue,
    path: Option<&QueryPathNode<'_>>,
    ordered: bool,
) -> Result<ConstValue, ServerError> {
    let mut collected = CollectedFields::default();
    for selection_set in selection_sets {
        collect_fields(ctx, parent_type, selection_set, source, path, &mut collected);
    }
    let CollectedFields { groups, deferred } = collected;
    for workload in deferred {
        schedule_deferred(ctx, workload);
    }

    let mut object = IndexMap::new();
    if ordered {
        for (response_key, nodes) in groups {
            let value =
                execute_field(ctx, parent_type, &response_key, &nodes, source, path).await?;
            object.insert(response_key, value);
        }
    } else {
        let futures = groups
            .iter()
            .map(|(response_key, nodes)| {
                execute_field(ctx, parent_type, response_key, nodes, source, path)
            })
            .collect::<Vec<_>>();
        let values = join_all(futures).await;
        for (response_key, value) in groups.keys().cloned().zip(values) {
            object.insert(response_key, value?);
        }
    }
    Ok(ConstValue::Object(object))
}

/// Resolves and completes one field group under an object.
pub(crate) async fn execute_field(
    ctx: &ExecContext,
    parent_type: &MetaType,
    response_key: &Name,
    nodes: &[&Positioned<Field>],
    source: &ConstValue,
    path: Option<&QueryPathNode<'_>>,
) -> Result<ConstValue, ServerError> {
    let field_node = nodes[0];
    let field_name = field_node.node.name.node.as_str();

    if field_name == "__typename" {
        return Ok(ConstValue::String(parent_type.name.to_string()));
    }

    let field_definition = match parent_type.field_by_name(field_name) {
        Some(field_definition) => field_definition,
        // Unknown fields are the validator's responsibility.
        None => return Ok(ConstValue::Null),
    };

    let path_node = QueryPathNode {
        parent: path,
        segment: QueryPathSegment::Name(response_key.as_str()),
    };

    match invoke_resolver(ctx, parent_type, field_definition, &field_node.node, source).await {
        Ok(resolved) => {
            // The stream driver is armed once, for the field's outermost
            // list; element completion below never re-reads the directive.
            let options = stream_options(ctx, &field_node.node.directives);
            complete_value(
                ctx,
                parent_type,
                &field_definition.ty,
                nodes,
                Some(&path_node),
                resolved,
                options,
            )
            .await
        }
        Err(error) => {
            let located = ServerError::from_resolver_error(
                error,
                positions(nodes),
                ctx.full_path(Some(&path_node)),
            );
            if field_definition.ty.nullable {
                ctx.add_error(located);
                Ok(ConstValue::Null)
            } else {
                Err(located)
            }
        }
    }
}

async fn invoke_resolver(
    ctx: &ExecContext,
    parent_type: &MetaType,
    field_definition: &MetaField,
    field: &Field,
    source: &ConstValue,
) -> anyhow::Result<ResolvedValue> {
    let resolver = ctx
        .env
        .resolvers
        .field_resolver(parent_type.name.as_str(), field_definition.name.as_str());
    match resolver {
        Some(resolver) => {
            let arguments = coerce_arguments(ctx, field_definition, field);
            resolver(ResolverContext {
                source: source.clone(),
                args: arguments,
                context: ctx.env.context_value.clone(),
            })
            .await
        }
        None => Ok(default_resolve_field(
            source,
            field_definition.name.as_str(),
        )),
    }
}

/// Coerces the field's argument values against the variables. Declared
/// arguments that are missing (or reference unbound variables) fall back to
/// their schema defaults; undeclared arguments are ignored.
fn coerce_arguments(
    ctx: &ExecContext,
    field_definition: &MetaField,
    field: &Field,
) -> IndexMap<Name, ConstValue> {
    let mut arguments = IndexMap::new();
    for (name, meta_argument) in &field_definition.arguments {
        let provided = field
            .arguments
            .iter()
            .find(|(argument_name, _)| argument_name.node == *name)
            .and_then(|(_, value)| {
                value
                    .node
                    .clone()
                    .into_const_with(|var_name| {
                        ctx.env.variables.get(&var_name).cloned().ok_or(())
                    })
                    .ok()
            });
        if let Some(value) = provided.or_else(|| meta_argument.default_value.clone()) {
            arguments.insert(name.clone(), value);
        }
    }
    arguments
}

/// Completes a resolved value against the field's declared type.
///
/// `Err` carries a located error upward until the nearest nullable ancestor
/// records it (exactly once) and becomes null itself.
pub(crate) fn complete_value<'a>(
    ctx: &'a ExecContext,
    parent_type: &'a MetaType,
    ty: &'a Type,
    nodes: &'a [&'a Positioned<Field>],
    path: Option<&'a QueryPathNode<'a>>,
    resolved: ResolvedValue,
    options: Option<StreamOptions>,
) -> BoxFuture<'a, Result<ConstValue, ServerError>> {
    Box::pin(async move {
        if ty.nullable {
            match complete_base(ctx, parent_type, ty, nodes, path, resolved, options).await {
                Ok(value) => Ok(value),
                Err(error) => {
                    ctx.add_error(error);
                    Ok(ConstValue::Null)
                }
            }
        } else {
            let value = complete_base(ctx, parent_type, ty, nodes, path, resolved, options).await?;
            if matches!(value, ConstValue::Null) {
                Err(ServerError::new(format!(
                    "Cannot return null for non-nullable field {}.{}.",
                    parent_type.name, nodes[0].node.name.node
                ))
                .locations(positions(nodes))
                .path(ctx.full_path(path)))
            } else {
                Ok(value)
            }
        }
    })
}

async fn complete_base(
    ctx: &ExecContext,
    parent_type: &MetaType,
    ty: &Type,
    nodes: &[&Positioned<Field>],
    path: Option<&QueryPathNode<'_>>,
    resolved: ResolvedValue,
    options: Option<StreamOptions>,
) -> Result<ConstValue, ServerError> {
    match &ty.base {
        BaseType::List(item_type) => {
            complete_list(ctx, parent_type, item_type, nodes, path, resolved, options).await
        }
        BaseType::Named(type_name) => match resolved {
            ResolvedValue::Value(ConstValue::Null) => Ok(ConstValue::Null),
            ResolvedValue::Stream(_) => Err(ServerError::new(format!(
                "Field {}.{} resolved to a stream, but its type \"{}\" is not a list.",
                parent_type.name, nodes[0].node.name.node, type_name
            ))
            .locations(positions(nodes))
            .path(ctx.full_path(path))),
            ResolvedValue::Value(value) => {
                let meta_type = match ctx.env.schema.type_by_name(type_name) {
                    Some(meta_type) => meta_type,
                    None => {
                        return Err(ServerError::new(format!(
                            "Unknown type \"{}\".",
                            type_name
                        ))
                        .locations(positions(nodes))
                        .path(ctx.full_path(path)))
                    }
                };
                if meta_type.is_leaf() {
                    complete_leaf(ctx, meta_type, value, nodes, path)
                } else {
                    let runtime_type =
                        resolve_runtime_type(ctx, meta_type, &value, nodes, path).await?;
                    let selection_sets = nodes
                        .iter()
                        .map(|node| &node.node.selection_set.node)
                        .collect::<Vec<_>>();
                    execute_selection_sets(ctx, runtime_type, &selection_sets, &value, path, false)
                        .await
                }
            }
        },
    }
}

async fn complete_list(
    ctx: &ExecContext,
    parent_type: &MetaType,
    item_type: &Type,
    nodes: &[&Positioned<Field>],
    path: Option<&QueryPathNode<'_>>,
    resolved: ResolvedValue,
    options: Option<StreamOptions>,
) -> Result<ConstValue, ServerError> {
    match resolved {
        ResolvedValue::Stream(item_stream) => match options {
            Some(options) => {
                stream::complete_streamed_iterator(
                    ctx,
                    parent_type,
                    item_type,
                    nodes,
                    path,
                    item_stream,
                    options,
                )
                .await
            }
            None => {
                // No active @stream: drain the iterator before completing.
                let mut item_stream = item_stream;
                let mut items = Vec::new();
                while let Some(item) = item_stream.next().await {
                    match item {
                        Ok(item) => items.push(item),
                        Err(error) => {
                            return Err(ServerError::from_resolver_error(
                                error,
                                positions(nodes),
                                ctx.full_path(path),
                            ))
                        }
                    }
                }
                let values =
                    complete_list_items(ctx, parent_type, item_type, nodes, path, items, 0).await?;
                Ok(ConstValue::List(values))
            }
        },
        ResolvedValue::Value(ConstValue::Null) => Ok(ConstValue::Null),
        ResolvedValue::Value(ConstValue::List(items)) => match options {
            Some(options) => {
                stream::complete_streamed_sequence(
                    ctx,
                    parent_type,
                    item_type,
                    nodes,
                    path,
                    items,
                    options,
                )
                .await
            }
            None => {
                let values =
                    complete_list_items(ctx, parent_type, item_type, nodes, path, items, 0).await?;
                Ok(ConstValue::List(values))
            }
        },
        ResolvedValue::Value(_) => Err(ServerError::new(format!(
            "Expected Iterable, but did not find one for field \"{}.{}\".",
            parent_type.name, nodes[0].node.name.node
        ))
        .locations(positions(nodes))
        .path(ctx.full_path(path))),
    }
}

/// Completes already-materialized list elements, each at its index path.
/// Eventual elements resolve concurrently; the list settles when all do.
pub(crate) async fn complete_list_items(
    ctx: &ExecContext,
    parent_type: &MetaType,
    item_type: &Type,
    nodes: &[&Positioned<Field>],
    path: Option<&QueryPathNode<'_>>,
    items: Vec<ConstValue>,
    start_index: usize,
) -> Result<Vec<ConstValue>, ServerError> {
    let futures = items
        .into_iter()
        .enumerate()
        .map(|(offset, item)| async move {
            let index_node = QueryPathNode {
                parent: path,
                segment: QueryPathSegment::Index(start_index + offset),
            };
            complete_value(
                ctx,
                parent_type,
                item_type,
                nodes,
                Some(&index_node),
                ResolvedValue::Value(item),
                None,
            )
            .await
        })
        .collect::<Vec<_>>();
    join_all(futures).await.into_iter().collect()
}

fn complete_leaf(
    ctx: &ExecContext,
    meta_type: &MetaType,
    value: ConstValue,
    nodes: &[&Positioned<Field>],
    path: Option<&QueryPathNode<'_>>,
) -> Result<ConstValue, ServerError> {
    meta_type.serialize_leaf(value).map_err(|message| {
        ServerError::new(message)
            .locations(positions(nodes))
            .path(ctx.full_path(path))
    })
}

/// Picks the runtime object type for a value of an abstract declared type.
/// The type resolver itself may settle asynchronously.
async fn resolve_runtime_type<'a>(
    ctx: &'a ExecContext,
    declared_type: &'a MetaType,
    value: &ConstValue,
    nodes: &[&Positioned<Field>],
    path: Option<&QueryPathNode<'_>>,
) -> Result<&'a MetaType, ServerError> {
    if !declared_type.is_abstract() {
        return Ok(declared_type);
    }
    let type_name = match ctx
        .env
        .resolvers
        .resolve_type(declared_type.name.as_str(), value)
        .await
    {
        Some(type_name) => type_name,
        None => {
            return Err(ServerError::new(format!(
                "Abstract type \"{}\" must resolve to an Object type at runtime.",
                declared_type.name
            ))
            .locations(positions(nodes))
            .path(ctx.full_path(path)))
        }
    };
    match ctx.env.schema.type_by_name(type_name.as_str()) {
        Some(runtime_type)
            if runtime_type.kind == TypeKind::Object
                && declared_type.is_possible_type(runtime_type.name.as_str()) =>
        {
            Ok(runtime_type)
        }
        _ => Err(ServerError::new(format!(
            "Runtime Object type \"{}\" is not a possible type for \"{}\".",
            type_name, declared_type.name
        ))
        .locations(positions(nodes))
        .path(ctx.full_path(path))),
    }
}
