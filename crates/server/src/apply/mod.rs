//! Applies hub pushes to local comments.
//!
//! Every public operation runs behind one lock, recounts the target post once
//! at the end and then notifies the after-apply listeners.

mod meta;

use anyhow::anyhow;
use domain::protocol::{ApplyOutcome, CommentPayload};
use domain::{CommentId, CommentStatus, EventKind, Hooks, PostId, Transition};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use storage::Db;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Delete,
    Transition(Transition),
    /// Undo a trash/spam, then force the status the hub says the comment has.
    Restore(Transition, CommentStatus),
}

#[derive(Clone)]
pub struct ApplyEngine {
    db: Db,
    hooks: Arc<Hooks>,
    meta_denylist: Arc<HashSet<String>>,
    lock: Arc<Mutex<()>>,
}

impl ApplyEngine {
    pub fn new(db: Db, hooks: Arc<Hooks>, meta_denylist: Vec<String>) -> Self {
        Self {
            db,
            hooks,
            meta_denylist: Arc::new(meta_denylist.into_iter().collect()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn insert(
        &self,
        post_id: PostId,
        comments: Vec<CommentPayload>,
    ) -> anyhow::Result<ApplyOutcome> {
        self.run(EventKind::Insert, post_id, self.upsert_comments(post_id, comments))
            .await
    }

    /// Same as insert: comments the destination has never seen are created.
    pub async fn update(
        &self,
        post_id: PostId,
        comments: Vec<CommentPayload>,
    ) -> anyhow::Result<ApplyOutcome> {
        self.run(EventKind::Update, post_id, self.upsert_comments(post_id, comments))
            .await
    }

    pub async fn trash(
        &self,
        post_id: PostId,
        origin_post_id: Option<PostId>,
        ids: Vec<CommentId>,
    ) -> anyhow::Result<ApplyOutcome> {
        let mutation = Mutation::Transition(Transition::Trash);
        self.run(
            EventKind::Trash,
            post_id,
            self.mutate_comments(post_id, origin_post_id, ids, mutation),
        )
        .await
    }

    pub async fn untrash(
        &self,
        post_id: PostId,
        origin_post_id: Option<PostId>,
        ids: Vec<CommentId>,
        status: CommentStatus,
    ) -> anyhow::Result<ApplyOutcome> {
        let mutation = Mutation::Restore(Transition::Untrash, status);
        self.run(
            EventKind::Untrash,
            post_id,
            self.mutate_comments(post_id, origin_post_id, ids, mutation),
        )
        .await
    }

    pub async fn delete(
        &self,
        post_id: PostId,
        origin_post_id: Option<PostId>,
        ids: Vec<CommentId>,
    ) -> anyhow::Result<ApplyOutcome> {
        self.run(
            EventKind::Delete,
            post_id,
            self.mutate_comments(post_id, origin_post_id, ids, Mutation::Delete),
        )
        .await
    }

    pub async fn spam(
        &self,
        post_id: PostId,
        origin_post_id: Option<PostId>,
        ids: Vec<CommentId>,
    ) -> anyhow::Result<ApplyOutcome> {
        let mutation = Mutation::Transition(Transition::Spam);
        self.run(
            EventKind::Spam,
            post_id,
            self.mutate_comments(post_id, origin_post_id, ids, mutation),
        )
        .await
    }

    pub async fn unspam(
        &self,
        post_id: PostId,
        origin_post_id: Option<PostId>,
        ids: Vec<CommentId>,
        status: CommentStatus,
    ) -> anyhow::Result<ApplyOutcome> {
        let mutation = Mutation::Restore(Transition::Unspam, status);
        self.run(
            EventKind::Unspam,
            post_id,
            self.mutate_comments(post_id, origin_post_id, ids, mutation),
        )
        .await
    }

    pub async fn change_status(
        &self,
        post_id: PostId,
        origin_post_id: Option<PostId>,
        ids: Vec<CommentId>,
        status: CommentStatus,
    ) -> anyhow::Result<ApplyOutcome> {
        let mutation = Mutation::Transition(Transition::Set(status));
        self.run(
            EventKind::StatusChange,
            post_id,
            self.mutate_comments(post_id, origin_post_id, ids, mutation),
        )
        .await
    }

    async fn run<F>(&self, kind: EventKind, post_id: PostId, work: F) -> anyhow::Result<ApplyOutcome>
    where
        F: Future<Output = anyhow::Result<ApplyOutcome>>,
    {
        let _guard = self.lock.lock().await;
        let outcome = work.await?;
        let count = self.db.update_comment_count(post_id).await?;
        self.hooks.applied(kind, post_id);
        info!(
            %kind,
            %post_id,
            success = outcome.success.len(),
            fail = outcome.fail.len(),
            unresolved = outcome.unresolved.len(),
            comment_count = count,
            "applied push"
        );
        Ok(outcome)
    }

    /// Replies may arrive before their parent. Each pass applies whatever has
    /// a resolvable parent and defers the rest; passes stop once one makes no
    /// progress, so the loop runs at most `comments.len()` times.
    async fn upsert_comments(
        &self,
        post_id: PostId,
        comments: Vec<CommentPayload>,
    ) -> anyhow::Result<ApplyOutcome> {
        let mut outcome = ApplyOutcome::default();
        let mut pending = comments;

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();

            for payload in pending {
                let origin_id = payload.comment_data.id;
                let parent = match self.resolve_parent(&payload).await {
                    Ok(Some(parent)) => parent,
                    Ok(None) => {
                        deferred.push(payload);
                        continue;
                    }
                    Err(e) => {
                        outcome.failed(origin_id, e);
                        continue;
                    }
                };
                match self.upsert_one(post_id, payload, parent).await {
                    Ok(true) => outcome.success.push(origin_id),
                    Ok(false) => outcome.failed(origin_id, "insert rejected by hook"),
                    Err(e) => {
                        warn!(%origin_id, error = %e, "failed to apply comment");
                        outcome.failed(origin_id, e);
                    }
                }
            }

            if deferred.len() == before {
                for payload in &deferred {
                    warn!(
                        origin_id = %payload.comment_data.id,
                        parent = %payload.comment_data.parent,
                        "parent never resolved, comment not applied"
                    );
                }
                outcome
                    .unresolved
                    .extend(deferred.iter().map(|p| p.comment_data.id));
                break;
            }
            pending = deferred;
        }
        Ok(outcome)
    }

    async fn resolve_parent(&self, payload: &CommentPayload) -> anyhow::Result<Option<CommentId>> {
        let comment = &payload.comment_data;
        if comment.parent.is_root() {
            return Ok(Some(CommentId::ROOT));
        }
        self.db
            .find_local_confirmed(comment.parent, comment.post_id)
            .await
    }

    /// Returns `false` when a before-insert hook vetoed a fresh insert.
    async fn upsert_one(
        &self,
        post_id: PostId,
        payload: CommentPayload,
        parent: CommentId,
    ) -> anyhow::Result<bool> {
        let CommentPayload {
            comment_data: mut comment,
            comment_meta,
        } = payload;
        let origin_post_id = comment.post_id;
        let origin_id = comment.id;

        comment.post_id = post_id;
        comment.parent = parent;

        let local_id = match self.db.find_local_confirmed(origin_id, origin_post_id).await? {
            Some(local_id) => {
                comment.id = local_id;
                if !self.db.update_comment(&comment).await? {
                    return Err(anyhow!("local comment {} disappeared", local_id));
                }
                debug!(%origin_id, %local_id, "updated mirror");
                local_id
            }
            None => {
                if !self.hooks.allow_insert(post_id, &comment) {
                    return Ok(false);
                }
                let local_id = self.db.insert_comment(&comment).await?;
                debug!(%origin_id, %local_id, "inserted mirror");
                local_id
            }
        };

        meta::merge_comment_meta(&self.db, local_id, comment_meta, &self.meta_denylist).await?;
        self.db
            .record_identity(local_id, origin_post_id, origin_id)
            .await?;
        Ok(true)
    }

    async fn mutate_comments(
        &self,
        post_id: PostId,
        origin_post_id: Option<PostId>,
        ids: Vec<CommentId>,
        mutation: Mutation,
    ) -> anyhow::Result<ApplyOutcome> {
        let mut outcome = ApplyOutcome::default();
        for origin_id in ids {
            let found = match origin_post_id {
                Some(origin_post_id) => {
                    self.db
                        .find_local_confirmed(origin_id, origin_post_id)
                        .await
                }
                None => self.db.find_local_in_post(origin_id, post_id).await,
            };
            let local_id = match found {
                Ok(Some(local_id)) => local_id,
                Ok(None) => {
                    debug!(%origin_id, "no local mirror");
                    outcome.unresolved.push(origin_id);
                    continue;
                }
                Err(e) => {
                    outcome.failed(origin_id, e);
                    continue;
                }
            };
            match self.mutate_one(local_id, mutation).await {
                Ok(()) => outcome.success.push(origin_id),
                Err(e) => {
                    warn!(%origin_id, %local_id, ?mutation, error = %e, "mutation failed");
                    outcome.failed(origin_id, e);
                }
            }
        }
        Ok(outcome)
    }

    async fn mutate_one(&self, local_id: CommentId, mutation: Mutation) -> anyhow::Result<()> {
        match mutation {
            Mutation::Delete => {
                if !self.db.delete_comment(local_id).await? {
                    return Err(anyhow!("local comment {} disappeared", local_id));
                }
            }
            Mutation::Transition(transition) => {
                self.db.transition_comment(local_id, transition).await?;
            }
            Mutation::Restore(transition, status) => {
                self.db.transition_comment(local_id, transition).await?;
                self.db
                    .transition_comment(local_id, Transition::Set(status))
                    .await?;
            }
        }
        Ok(())
    }
}
