use crate::models::{CommentId, CommentStatus, PostId, SubscriptionId};

/// Local comment lifecycle notifications published by the host onto the
/// notification bus. The hub observer turns them into propagation events.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A destination subscribed to `post_id`; its whole thread should follow.
    SubscriptionCreated {
        post_id: PostId,
        subscription_id: SubscriptionId,
    },
    CommentInserted {
        comment_id: CommentId,
    },
    CommentUpdated {
        comment_id: CommentId,
    },
    CommentTrashed {
        post_id: PostId,
        comment_id: CommentId,
    },
    CommentUntrashed {
        comment_id: CommentId,
    },
    /// The comment row is gone by the time this is observed.
    CommentDeleted {
        post_id: PostId,
        comment_id: CommentId,
    },
    CommentSpammed {
        post_id: PostId,
        comment_id: CommentId,
    },
    CommentUnspammed {
        comment_id: CommentId,
    },
    StatusChanged {
        post_id: PostId,
        comment_id: CommentId,
        status: CommentStatus,
    },
}
