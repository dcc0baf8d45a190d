use crate::dispatcher::{DispatchReport, Dispatcher};
use domain::protocol::CommentPayload;
use domain::{
    CommentId, CommentStatus, EventKind, Hooks, Notification, PostId, PropagationEvent,
    Subscription,
};
use std::sync::Arc;
use storage::Db;
use tracing::debug;

/// Statuses included in the full-thread push of a new subscription.
const INITIAL_PUSH_STATUSES: [CommentStatus; 2] = [CommentStatus::Approved, CommentStatus::Hold];

/// Turns local notifications into propagation events and hands them to the
/// dispatcher.
#[derive(Clone)]
pub struct Observer {
    db: Db,
    dispatcher: Dispatcher,
    hooks: Arc<Hooks>,
}

impl Observer {
    pub fn new(db: Db, dispatcher: Dispatcher, hooks: Arc<Hooks>) -> Self {
        Self {
            db,
            dispatcher,
            hooks,
        }
    }

    /// Returns `None` when the notification is irrelevant, vetoed, or the
    /// post has nobody to tell.
    pub async fn handle(&self, notification: Notification) -> anyhow::Result<Option<DispatchReport>> {
        let Some((event, targets)) = self.plan(notification).await? else {
            return Ok(None);
        };
        if targets.is_empty() {
            debug!(post_id = %event.post_id, kind = %event.kind, "no subscriptions");
            return Ok(None);
        }
        if !self.hooks.allow_dispatch(&event) {
            debug!(post_id = %event.post_id, kind = %event.kind, "dispatch vetoed by hook");
            return Ok(None);
        }
        Ok(Some(self.dispatcher.dispatch(&event, &targets).await))
    }

    async fn plan(
        &self,
        notification: Notification,
    ) -> anyhow::Result<Option<(PropagationEvent, Vec<Subscription>)>> {
        let planned = match notification {
            Notification::SubscriptionCreated {
                post_id,
                subscription_id,
            } => {
                let Some(sub) = self.db.get_subscription(subscription_id).await? else {
                    return Ok(None);
                };
                let thread = self.db.list_comments(post_id, &INITIAL_PUSH_STATUSES).await?;
                if thread.is_empty() {
                    return Ok(None);
                }
                let mut payloads = Vec::with_capacity(thread.len());
                for comment in thread {
                    let comment_meta = self.db.get_comment_meta(comment.id).await?;
                    payloads.push(CommentPayload {
                        comment_data: comment,
                        comment_meta,
                    });
                }
                let event = PropagationEvent::with_comments(EventKind::Insert, post_id, payloads);
                Some((event, vec![sub]))
            }
            Notification::CommentInserted { comment_id } => {
                self.single_comment(EventKind::Insert, comment_id).await?
            }
            Notification::CommentUpdated { comment_id } => {
                self.single_comment(EventKind::Update, comment_id).await?
            }
            Notification::CommentTrashed {
                post_id,
                comment_id,
            } => self.ids_only(EventKind::Trash, post_id, comment_id, None).await?,
            Notification::CommentDeleted {
                post_id,
                comment_id,
            } => self.ids_only(EventKind::Delete, post_id, comment_id, None).await?,
            Notification::CommentSpammed {
                post_id,
                comment_id,
            } => self.ids_only(EventKind::Spam, post_id, comment_id, None).await?,
            Notification::CommentUntrashed { comment_id } => {
                self.restored(EventKind::Untrash, comment_id).await?
            }
            Notification::CommentUnspammed { comment_id } => {
                self.restored(EventKind::Unspam, comment_id).await?
            }
            Notification::StatusChanged {
                post_id,
                comment_id,
                status,
            } => match status {
                // the destination may never have seen a comment that was held
                // until now, so approval ships the whole comment
                CommentStatus::Approved => self.single_comment(EventKind::Update, comment_id).await?,
                CommentStatus::Hold => {
                    self.ids_only(EventKind::StatusChange, post_id, comment_id, Some(status))
                        .await?
                }
                // spam and trash have their own notifications
                _ => None,
            },
        };
        Ok(planned)
    }

    /// `insert` / `update` of one comment, only once it is approved.
    async fn single_comment(
        &self,
        kind: EventKind,
        comment_id: CommentId,
    ) -> anyhow::Result<Option<(PropagationEvent, Vec<Subscription>)>> {
        let Some(comment) = self.db.get_comment(comment_id).await? else {
            return Ok(None);
        };
        if comment.status != CommentStatus::Approved {
            debug!(%comment_id, status = %comment.status, "not approved, not propagating");
            return Ok(None);
        }
        let post_id = comment.post_id;
        let targets = self.db.list_subscriptions(post_id).await?;
        let comment_meta = self.db.get_comment_meta(comment_id).await?;
        let payload = CommentPayload {
            comment_data: comment,
            comment_meta,
        };
        let event = PropagationEvent::with_comments(kind, post_id, vec![payload]);
        Ok(Some((event, targets)))
    }

    async fn ids_only(
        &self,
        kind: EventKind,
        post_id: PostId,
        comment_id: CommentId,
        target_status: Option<CommentStatus>,
    ) -> anyhow::Result<Option<(PropagationEvent, Vec<Subscription>)>> {
        let targets = self.db.list_subscriptions(post_id).await?;
        let event = PropagationEvent::for_ids(kind, post_id, vec![comment_id], target_status);
        Ok(Some((event, targets)))
    }

    /// Untrash / unspam carry the status the comment ended up in locally.
    async fn restored(
        &self,
        kind: EventKind,
        comment_id: CommentId,
    ) -> anyhow::Result<Option<(PropagationEvent, Vec<Subscription>)>> {
        let Some(comment) = self.db.get_comment(comment_id).await? else {
            return Ok(None);
        };
        self.ids_only(kind, comment.post_id, comment_id, Some(comment.status))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::tests::ScriptedTransport;
    use crate::dispatcher::DispatchOutcome;
    use chrono::NaiveDate;
    use domain::protocol::CommentData;
    use domain::{Comment, Transition};
    use serde_json::json;

    struct Fixture {
        db: Db,
        transport: Arc<ScriptedTransport>,
        observer: Observer,
        post: PostId,
    }

    async fn fixture(hooks: Hooks) -> Fixture {
        let db = Db::new("sqlite::memory:").await.unwrap();
        let post = db.create_post("hub post", None).await.unwrap();
        let transport = Arc::new(ScriptedTransport::default());
        let hooks = Arc::new(hooks);
        let dispatcher = Dispatcher::new(transport.clone(), hooks.clone(), 4);
        let observer = Observer::new(db.clone(), dispatcher, hooks);
        Fixture {
            db,
            transport,
            observer,
            post,
        }
    }

    fn comment(post_id: PostId, parent: CommentId, status: CommentStatus) -> Comment {
        let at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Comment {
            id: CommentId::ROOT,
            post_id,
            parent,
            author_name: "bo".into(),
            author_email: String::new(),
            author_url: String::new(),
            author_ip: String::new(),
            created_at: at,
            created_at_gmt: at,
            content: "text".into(),
            karma: 0,
            status,
            agent: String::new(),
            comment_type: "comment".into(),
        }
    }

    #[tokio::test]
    async fn nothing_is_sent_without_subscriptions() {
        let f = fixture(Hooks::new()).await;
        let id = f
            .db
            .insert_comment(&comment(f.post, CommentId::ROOT, CommentStatus::Approved))
            .await
            .unwrap();

        let report = f
            .observer
            .handle(Notification::CommentInserted { comment_id: id })
            .await
            .unwrap();
        assert!(report.is_none());
        assert!(f.transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn held_comments_are_not_inserted() {
        let f = fixture(Hooks::new()).await;
        f.db.create_subscription(f.post, "http://dest.example", PostId::new(50), "s")
            .await
            .unwrap();
        let id = f
            .db
            .insert_comment(&comment(f.post, CommentId::ROOT, CommentStatus::Hold))
            .await
            .unwrap();

        for n in [
            Notification::CommentInserted { comment_id: id },
            Notification::CommentUpdated { comment_id: id },
        ] {
            assert!(f.observer.handle(n).await.unwrap().is_none());
        }
        assert!(f.transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn approved_insert_goes_to_every_subscription() {
        let f = fixture(Hooks::new()).await;
        for (i, host) in ["http://a.example", "http://b.example"].iter().enumerate() {
            f.db.create_subscription(f.post, host, PostId::new(50 + i as i64), "s")
                .await
                .unwrap();
        }
        let id = f
            .db
            .insert_comment(&comment(f.post, CommentId::ROOT, CommentStatus::Approved))
            .await
            .unwrap();
        f.db.add_comment_meta(id, "rating", &json!(5)).await.unwrap();

        let report = f
            .observer
            .handle(Notification::CommentInserted { comment_id: id })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.kind, EventKind::Insert);
        assert_eq!(report.delivered(), 2);

        let calls = f.transport.calls.lock().unwrap();
        let CommentData::Comments(items) = &calls[0].1.comment_data else {
            panic!("insert must carry full comments");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].comment_data.id, id);
        assert_eq!(items[0].comment_meta["rating"], vec![json!(5)]);
    }

    #[tokio::test]
    async fn initial_push_sends_whole_thread_to_new_subscription_only() {
        let f = fixture(Hooks::new()).await;
        f.db.create_subscription(f.post, "http://old.example", PostId::new(40), "old")
            .await
            .unwrap();
        let new_sub = f
            .db
            .create_subscription(f.post, "http://new.example", PostId::new(50), "new")
            .await
            .unwrap();
        let a = f
            .db
            .insert_comment(&comment(f.post, CommentId::ROOT, CommentStatus::Approved))
            .await
            .unwrap();
        let b = f
            .db
            .insert_comment(&comment(f.post, a, CommentStatus::Approved))
            .await
            .unwrap();
        let spam = f
            .db
            .insert_comment(&comment(f.post, CommentId::ROOT, CommentStatus::Approved))
            .await
            .unwrap();
        f.db.transition_comment(spam, Transition::Spam).await.unwrap();

        let report = f
            .observer
            .handle(Notification::SubscriptionCreated {
                post_id: f.post,
                subscription_id: new_sub,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(report.results.contains_key(&new_sub));

        let calls = f.transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.ends_with("/comments/insert"));
        let CommentData::Comments(items) = &calls[0].1.comment_data else {
            panic!("initial push must carry full comments");
        };
        let ids: Vec<_> = items.iter().map(|i| i.comment_data.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[tokio::test]
    async fn initial_push_of_empty_thread_is_skipped() {
        let f = fixture(Hooks::new()).await;
        let sub = f
            .db
            .create_subscription(f.post, "http://new.example", PostId::new(50), "new")
            .await
            .unwrap();
        let report = f
            .observer
            .handle(Notification::SubscriptionCreated {
                post_id: f.post,
                subscription_id: sub,
            })
            .await
            .unwrap();
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn veto_hook_stops_initial_push() {
        let mut hooks = Hooks::new();
        hooks.on_before_dispatch(|event| event.kind != EventKind::Insert);
        let f = fixture(hooks).await;
        let sub = f
            .db
            .create_subscription(f.post, "http://new.example", PostId::new(50), "new")
            .await
            .unwrap();
        f.db.insert_comment(&comment(f.post, CommentId::ROOT, CommentStatus::Approved))
            .await
            .unwrap();

        let report = f
            .observer
            .handle(Notification::SubscriptionCreated {
                post_id: f.post,
                subscription_id: sub,
            })
            .await
            .unwrap();
        assert!(report.is_none());
        assert!(f.transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_changes_only_for_approve_and_hold() {
        let f = fixture(Hooks::new()).await;
        f.db.create_subscription(f.post, "http://dest.example", PostId::new(50), "s")
            .await
            .unwrap();
        let id = CommentId::new(9);

        let ignored = f
            .observer
            .handle(Notification::StatusChanged {
                post_id: f.post,
                comment_id: id,
                status: CommentStatus::Spam,
            })
            .await
            .unwrap();
        assert!(ignored.is_none());

        let report = f
            .observer
            .handle(Notification::StatusChanged {
                post_id: f.post,
                comment_id: id,
                status: CommentStatus::Hold,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.kind, EventKind::StatusChange);

        let calls = f.transport.calls.lock().unwrap();
        assert_eq!(calls[0].1.comment_status, Some(CommentStatus::Hold));
        assert_eq!(calls[0].1.comment_data, CommentData::Id(id));
    }

    #[tokio::test]
    async fn approving_a_held_comment_ships_it_in_full() {
        let f = fixture(Hooks::new()).await;
        f.db.create_subscription(f.post, "http://dest.example", PostId::new(50), "s")
            .await
            .unwrap();
        let id = f
            .db
            .insert_comment(&comment(f.post, CommentId::ROOT, CommentStatus::Hold))
            .await
            .unwrap();
        assert!(f
            .observer
            .handle(Notification::CommentInserted { comment_id: id })
            .await
            .unwrap()
            .is_none());

        f.db.transition_comment(id, Transition::Set(CommentStatus::Approved))
            .await
            .unwrap();
        let report = f
            .observer
            .handle(Notification::StatusChanged {
                post_id: f.post,
                comment_id: id,
                status: CommentStatus::Approved,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.kind, EventKind::Update);

        let calls = f.transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.ends_with("/comments/update"));
        let CommentData::Comments(items) = &calls[0].1.comment_data else {
            panic!("approval must carry the full comment");
        };
        assert_eq!(items[0].comment_data.id, id);
        assert_eq!(items[0].comment_data.status, CommentStatus::Approved);
    }

    #[tokio::test]
    async fn untrash_carries_restored_status() {
        let f = fixture(Hooks::new()).await;
        f.db.create_subscription(f.post, "http://dest.example", PostId::new(50), "s")
            .await
            .unwrap();
        let id = f
            .db
            .insert_comment(&comment(f.post, CommentId::ROOT, CommentStatus::Approved))
            .await
            .unwrap();
        f.db.transition_comment(id, Transition::Trash).await.unwrap();
        f.db.transition_comment(id, Transition::Untrash).await.unwrap();

        let report = f
            .observer
            .handle(Notification::CommentUntrashed { comment_id: id })
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            report.results.values().next(),
            Some(DispatchOutcome::Delivered(_))
        ));
        let calls = f.transport.calls.lock().unwrap();
        assert!(calls[0].0.ends_with("/comments/untrash"));
        assert_eq!(calls[0].1.comment_status, Some(CommentStatus::Approved));
    }
}
