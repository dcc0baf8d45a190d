use crate::traits::PushTransport;
use domain::protocol::{endpoint_url, PushRequest, PushResponse};
use domain::{EventKind, Hooks, PostId, PropagationEvent, Subscription, SubscriptionId};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The destination answered; its status may still be an error.
    Delivered(PushResponse),
    /// The push never got an answer.
    Failed(String),
    /// A before-send hook dropped the push.
    Aborted,
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered(_))
    }
}

/// Per-subscription results of one propagation event.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub kind: EventKind,
    pub post_id: PostId,
    pub results: BTreeMap<SubscriptionId, DispatchOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.results.values().filter(|o| o.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .values()
            .filter(|o| matches!(o, DispatchOutcome::Failed(_)))
            .count()
    }
}

/// Fans a propagation event out to subscriptions. Pushes are independent: one
/// failing never stops or undoes another.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn PushTransport>,
    hooks: Arc<Hooks>,
    max_in_flight: usize,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn PushTransport>, hooks: Arc<Hooks>, max_in_flight: usize) -> Self {
        Self {
            transport,
            hooks,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub async fn dispatch(
        &self,
        event: &PropagationEvent,
        subscriptions: &[Subscription],
    ) -> DispatchReport {
        let comment_data = event.comment_data();

        let pushes: Vec<_> = subscriptions
            .iter()
            .filter_map(|sub| {
                if !sub.is_complete() {
                    warn!(subscription_id = %sub.id, "skipping incomplete subscription");
                    return None;
                }
                let request = PushRequest {
                    post_id: sub.remote_post_id,
                    signature: sub.signature.clone(),
                    comment_data: comment_data.clone(),
                    comment_status: event.target_status.filter(|_| event.kind.carries_status()),
                    origin_post_id: Some(event.post_id),
                };
                Some((sub.id, endpoint_url(&sub.target_url, event.kind), request))
            })
            .collect();

        // each push owns its data so the fan-out stays `Send` inside spawned workers
        let (kind, post_id) = (event.kind, event.post_id);
        let dispatcher = self.clone();
        let results = stream::iter(pushes)
            .map(move |(id, url, request)| {
                let this = dispatcher.clone();
                async move {
                    let outcome = this.push_one(kind, post_id, id, &url, request).await;
                    (id, outcome)
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect::<BTreeMap<_, _>>()
            .await;

        DispatchReport {
            kind: event.kind,
            post_id: event.post_id,
            results,
        }
    }

    async fn push_one(
        &self,
        kind: EventKind,
        post_id: PostId,
        subscription_id: SubscriptionId,
        url: &str,
        request: PushRequest,
    ) -> DispatchOutcome {
        let Some(request) = self.hooks.filter_payload(kind, post_id, request) else {
            info!(%subscription_id, %kind, "push aborted by hook");
            return DispatchOutcome::Aborted;
        };

        match self.transport.push(url, &request).await {
            Ok(resp) => {
                info!(
                    %subscription_id,
                    %kind,
                    status = resp.status,
                    "pushed comments"
                );
                DispatchOutcome::Delivered(resp)
            }
            Err(e) => {
                warn!(%subscription_id, %kind, error = %e, "push failed");
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}
