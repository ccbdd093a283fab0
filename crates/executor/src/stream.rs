use std::sync::Arc;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use graphflow_schema::MetaType;
use parser::types::{Field, Type};
use parser::Positioned;
use value::{ConstValue, Name};

use crate::directives::StreamOptions;
use crate::dispatcher::{Dispatcher, PatchEmission, PatchFuture};
use crate::executor::{ExecContext, OperationEnv};
use crate::fields::{complete_list_items, complete_value, positions};
use crate::path::{PathSegment, QueryPathNode};
use crate::resolver::ResolvedValue;
use crate::response::{IncrementalPayload, ServerError};

/// Streams a list whose source is an ordered, already-materialized
/// sequence: `initialCount` elements complete inline, every later element
/// becomes its own patch worker. Emission follows completion order; each
/// patch keeps its original index.
pub(crate) async fn complete_streamed_sequence(
    ctx: &ExecContext,
    parent_type: &MetaType,
    item_type: &Type,
    nodes: &[&Positioned<Field>],
    path: Option<&QueryPathNode<'_>>,
    mut items: Vec<ConstValue>,
    options: StreamOptions,
) -> Result<ConstValue, ServerError> {
    let initial_count = options.initial_count.min(items.len());
    let rest = items.split_off(initial_count);
    let inline = complete_list_items(ctx, parent_type, item_type, nodes, path, items, 0).await?;
    for (offset, item) in rest.into_iter().enumerate() {
        let worker = StreamItem::capture(
            ctx,
            parent_type,
            item_type,
            nodes,
            path,
            initial_count + offset,
            options.label.clone(),
        );
        ctx.dispatcher.schedule(worker.into_patch(item));
    }
    Ok(ConstValue::List(inline))
}

/// Streams a list backed by an async iterator: `initialCount` elements are
/// drawn eagerly so they appear inline, then a chained worker pulls one
/// element per emission. When the iterator closes, a final marker payload
/// with neither data nor path announces stream closure.
pub(crate) async fn complete_streamed_iterator(
    ctx: &ExecContext,
    parent_type: &MetaType,
    item_type: &Type,
    nodes: &[&Positioned<Field>],
    path: Option<&QueryPathNode<'_>>,
    mut item_stream: BoxStream<'static, anyhow::Result<ConstValue>>,
    options: StreamOptions,
) -> Result<ConstValue, ServerError> {
    let mut inline_items = Vec::new();
    let mut exhausted = false;
    while inline_items.len() < options.initial_count {
        match item_stream.next().await {
            Some(Ok(item)) => inline_items.push(item),
            Some(Err(error)) => {
                // A failure while drawing the inline prefix aborts the list.
                return Err(ServerError::from_resolver_error(
                    error,
                    positions(nodes),
                    ctx.full_path(path),
                ));
            }
            None => {
                exhausted = true;
                break;
            }
        }
    }

    let next_index = inline_items.len();
    let inline =
        complete_list_items(ctx, parent_type, item_type, nodes, path, inline_items, 0).await?;

    if !exhausted {
        let tail = StreamTail {
            item: StreamItem::capture(
                ctx,
                parent_type,
                item_type,
                nodes,
                path,
                next_index,
                options.label,
            ),
            stream: item_stream,
        };
        ctx.dispatcher.schedule(tail.into_patch());
    }

    Ok(ConstValue::List(inline))
}

/// Everything one streamed element's worker needs, owned so that it can
/// outlive the scope that scheduled it.
struct StreamItem {
    env: Arc<OperationEnv>,
    dispatcher: Dispatcher,
    parent_type: Name,
    item_type: Type,
    nodes: Vec<Positioned<Field>>,
    list_path: Vec<PathSegment>,
    index: usize,
    label: Option<String>,
}

impl StreamItem {
    fn capture(
        ctx: &ExecContext,
        parent_type: &MetaType,
        item_type: &Type,
        nodes: &[&Positioned<Field>],
        path: Option<&QueryPathNode<'_>>,
        index: usize,
        label: Option<String>,
    ) -> Self {
        StreamItem {
            env: ctx.env.clone(),
            dispatcher: ctx.dispatcher.clone(),
            parent_type: parent_type.name.clone(),
            item_type: item_type.clone(),
            nodes: nodes.iter().map(|node| (*node).clone()).collect(),
            list_path: ctx.full_path(path),
            index,
            label,
        }
    }

    fn item_path(&self) -> Vec<PathSegment> {
        let mut path = self.list_path.clone();
        path.push(PathSegment::Index(self.index));
        path
    }

    /// Completes the element's sub-selection in its own scope and renders
    /// the result as one patch.
    async fn complete(&self, item: ConstValue) -> IncrementalPayload {
        let item_path = self.item_path();
        let ctx = ExecContext {
            env: self.env.clone(),
            dispatcher: self.dispatcher.clone(),
            errors: Default::default(),
            base_path: item_path.clone(),
        };
        let node_refs = self.nodes.iter().collect::<Vec<_>>();
        let data = match self.env.schema.type_by_name(self.parent_type.as_str()) {
            Some(parent_type) => {
                match complete_value(
                    &ctx,
                    parent_type,
                    &self.item_type,
                    &node_refs,
                    None,
                    ResolvedValue::Value(item),
                    None,
                )
                .await
                {
                    Ok(value) => value,
                    Err(error) => {
                        ctx.add_error(error);
                        ConstValue::Null
                    }
                }
            }
            None => ConstValue::Null,
        };
        IncrementalPayload {
            data: Some(data),
            path: Some(item_path),
            label: self.label.clone(),
            errors: ctx.take_errors(),
            has_next: true,
        }
    }

    fn into_patch(self, item: ConstValue) -> PatchFuture {
        Box::pin(async move {
            PatchEmission {
                payload: self.complete(item).await,
                next: None,
            }
        })
    }
}

struct StreamTail {
    item: StreamItem,
    stream: BoxStream<'static, anyhow::Result<ConstValue>>,
}

impl StreamTail {
    fn into_patch(mut self) -> PatchFuture {
        Box::pin(async move {
            match self.stream.next().await {
                // Iterator closed: the terminal marker carries neither data
                // nor path.
                None => PatchEmission {
                    payload: IncrementalPayload {
                        data: None,
                        path: None,
                        label: None,
                        errors: Vec::new(),
                        has_next: false,
                    },
                    next: None,
                },
                // A failing element ends the stream with one last patch.
                Some(Err(error)) => {
                    let item_path = self.item.item_path();
                    let located = ServerError::from_resolver_error(
                        error,
                        self.item.nodes.iter().map(|node| node.pos).collect(),
                        item_path.clone(),
                    );
                    PatchEmission {
                        payload: IncrementalPayload {
                            data: Some(ConstValue::Null),
                            path: Some(item_path),
                            label: self.item.label.clone(),
                            errors: vec![located],
                            has_next: false,
                        },
                        next: None,
                    }
                }
                Some(Ok(item)) => {
                    let payload = self.item.complete(item).await;
                    self.item.index += 1;
                    PatchEmission {
                        payload,
                        next: Some(self.into_patch()),
                    }
                }
            }
        })
    }
}
