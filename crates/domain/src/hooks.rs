//! Extension points the host can register callbacks on. Callbacks run in
//! registration order.

use crate::events::{EventKind, PropagationEvent};
use crate::models::{Comment, PostId};
use crate::protocol::PushRequest;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum HookDecision<T> {
    Proceed,
    Replace(T),
    Abort,
}

type DispatchGate = Arc<dyn Fn(&PropagationEvent) -> bool + Send + Sync>;
type PayloadFilter =
    Arc<dyn Fn(EventKind, PostId, &PushRequest) -> HookDecision<PushRequest> + Send + Sync>;
type InsertGate = Arc<dyn Fn(PostId, &Comment) -> bool + Send + Sync>;
type ApplyListener = Arc<dyn Fn(EventKind, PostId) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    before_dispatch: Vec<DispatchGate>,
    before_send: Vec<PayloadFilter>,
    before_insert: Vec<InsertGate>,
    after_apply: Vec<ApplyListener>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Veto a propagation event before any subscription is contacted.
    pub fn on_before_dispatch(
        &mut self,
        f: impl Fn(&PropagationEvent) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.before_dispatch.push(Arc::new(f));
        self
    }

    /// Rewrite or drop the body sent to one subscription.
    pub fn on_before_send(
        &mut self,
        f: impl Fn(EventKind, PostId, &PushRequest) -> HookDecision<PushRequest>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.before_send.push(Arc::new(f));
        self
    }

    /// Veto a fresh insert on the destination. `PostId` is the local post.
    pub fn on_before_insert(
        &mut self,
        f: impl Fn(PostId, &Comment) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.before_insert.push(Arc::new(f));
        self
    }

    pub fn on_after_apply(
        &mut self,
        f: impl Fn(EventKind, PostId) + Send + Sync + 'static,
    ) -> &mut Self {
        self.after_apply.push(Arc::new(f));
        self
    }

    pub fn allow_dispatch(&self, event: &PropagationEvent) -> bool {
        self.before_dispatch.iter().all(|gate| gate(event))
    }

    /// Returns `None` when a filter aborted the send.
    pub fn filter_payload(
        &self,
        kind: EventKind,
        post_id: PostId,
        mut request: PushRequest,
    ) -> Option<PushRequest> {
        for filter in &self.before_send {
            match filter(kind, post_id, &request) {
                HookDecision::Proceed => {}
                HookDecision::Replace(next) => request = next,
                HookDecision::Abort => return None,
            }
        }
        Some(request)
    }

    pub fn allow_insert(&self, post_id: PostId, comment: &Comment) -> bool {
        self.before_insert.iter().all(|gate| gate(post_id, comment))
    }

    pub fn applied(&self, kind: EventKind, post_id: PostId) {
        for listener in &self.after_apply {
            listener(kind, post_id);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_dispatch", &self.before_dispatch.len())
            .field("before_send", &self.before_send.len())
            .field("before_insert", &self.before_insert.len())
            .field("after_apply", &self.after_apply.len())
            .finish()
    }
}
