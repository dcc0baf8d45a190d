use crate::models::{CommentId, CommentStatus, PostId};
use crate::protocol::{CommentData, CommentPayload};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The comment lifecycle changes a hub propagates. Each kind has its own
/// endpoint on the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Insert,
    Update,
    Trash,
    Untrash,
    Delete,
    StatusChange,
    Spam,
    Unspam,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Insert,
        EventKind::Update,
        EventKind::Trash,
        EventKind::Untrash,
        EventKind::Delete,
        EventKind::StatusChange,
        EventKind::Spam,
        EventKind::Unspam,
    ];

    /// Path segment under the distributor comments prefix.
    pub fn as_path(self) -> &'static str {
        match self {
            EventKind::Insert => "insert",
            EventKind::Update => "update",
            EventKind::Trash => "trash",
            EventKind::Untrash => "untrash",
            EventKind::Delete => "delete",
            EventKind::StatusChange => "status_change",
            EventKind::Spam => "spam",
            EventKind::Unspam => "unspam",
        }
    }

    /// Kinds whose destination must be told which status to end up in.
    pub fn carries_status(self) -> bool {
        matches!(
            self,
            EventKind::Untrash | EventKind::Unspam | EventKind::StatusChange
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

/// What happened to which comments of a hub post, and what to send about it.
/// Lives only for the duration of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationEvent {
    pub kind: EventKind,
    pub post_id: PostId,
    pub comment_ids: Vec<CommentId>,
    /// Full records for `insert` and `update`; empty for the id-only kinds.
    pub comments: Vec<CommentPayload>,
    pub target_status: Option<CommentStatus>,
}

impl PropagationEvent {
    pub fn with_comments(kind: EventKind, post_id: PostId, comments: Vec<CommentPayload>) -> Self {
        let comment_ids = comments.iter().map(|c| c.comment_data.id).collect();
        Self {
            kind,
            post_id,
            comment_ids,
            comments,
            target_status: None,
        }
    }

    pub fn for_ids(
        kind: EventKind,
        post_id: PostId,
        comment_ids: Vec<CommentId>,
        target_status: Option<CommentStatus>,
    ) -> Self {
        Self {
            kind,
            post_id,
            comment_ids,
            comments: Vec::new(),
            target_status,
        }
    }

    /// The `comment_data` field of the outbound request.
    pub fn comment_data(&self) -> CommentData {
        match self.kind {
            EventKind::Insert | EventKind::Update => CommentData::Comments(self.comments.clone()),
            _ => match self.comment_ids.as_slice() {
                [single] => CommentData::Id(*single),
                ids => CommentData::Ids(ids.to_vec()),
            },
        }
    }
}
