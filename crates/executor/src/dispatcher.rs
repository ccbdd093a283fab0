use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, FuturesUnordered, StreamExt};
use tokio::sync::mpsc;

use crate::response::{IncrementalPayload, Response, StreamingPayload};

/// What a patch worker produces when it settles: the payload to emit (its
/// `has_next` flag is filled in at emission time) and, for multi-emission
/// sources such as async-iterated streams, the continuation that produces
/// the next payload.
pub(crate) struct PatchEmission {
    pub payload: IncrementalPayload,
    pub next: Option<PatchFuture>,
}

pub(crate) type PatchFuture = BoxFuture<'static, PatchEmission>;

/// Scheduling handle held by every execution scope. Workers clone it, so a
/// deferred fragment can schedule nested deferrals while it runs.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    sender: mpsc::UnboundedSender<PatchFuture>,
}

impl Dispatcher {
    pub fn new() -> (Dispatcher, PatchQueue) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Dispatcher { sender }, PatchQueue { receiver })
    }

    pub fn schedule(&self, patch: PatchFuture) {
        // A send failure means the consumer abandoned the result sequence;
        // the workload is discarded.
        let _ = self.sender.send(patch);
    }
}

/// Receiving end of the dispatcher: owns the scheduled-but-not-yet-raced
/// patch futures and turns them into the lazy result sequence.
pub(crate) struct PatchQueue {
    receiver: mpsc::UnboundedReceiver<PatchFuture>,
}

impl PatchQueue {
    /// Takes one scheduled patch without blocking. The executor uses this to
    /// decide between the single-result and incremental response shapes.
    pub fn try_take(&mut self) -> Option<PatchFuture> {
        self.receiver.try_recv().ok()
    }

    /// Builds the lazy result sequence: the initial result first, then each
    /// patch as it completes. New work scheduled by in-flight workers joins
    /// the race at the next pull; `has_next` is recomputed at every emission
    /// and is false exactly on the last one. Dropping the stream abandons
    /// all outstanding workers.
    pub fn into_stream(
        mut self,
        first: PatchFuture,
        initial: Response,
    ) -> BoxStream<'static, StreamingPayload> {
        Box::pin(async_stream::stream! {
            let mut outstanding = FuturesUnordered::new();
            outstanding.push(first);

            yield StreamingPayload::Initial {
                data: initial.data,
                errors: initial.errors,
                has_next: true,
            };

            loop {
                self.drain_into(&mut outstanding);
                if outstanding.is_empty() {
                    break;
                }
                let settled = tokio::select! {
                    // A running worker scheduled new work (nested defer or
                    // stream); it joins the race immediately so it can settle
                    // ahead of its scheduler.
                    Some(patch) = self.receiver.recv() => {
                        outstanding.push(patch);
                        None
                    }
                    Some(emission) = outstanding.next() => {
                        // Everything the settled worker scheduled must join
                        // before the terminal flag is computed.
                        self.drain_into(&mut outstanding);
                        if let Some(next) = emission.next {
                            outstanding.push(next);
                        }
                        let mut payload = emission.payload;
                        payload.has_next = !outstanding.is_empty();
                        Some(payload)
                    }
                };
                if let Some(payload) = settled {
                    tracing::debug!(
                        path = ?payload.path,
                        label = ?payload.label,
                        has_next = payload.has_next,
                        "patch emitted"
                    );
                    yield StreamingPayload::Incremental(payload);
                }
            }
        })
    }

    fn drain_into(&mut self, outstanding: &mut FuturesUnordered<PatchFuture>) {
        while let Ok(patch) = self.receiver.try_recv() {
            outstanding.push(patch);
        }
    }
}
