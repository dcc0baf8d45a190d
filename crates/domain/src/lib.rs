mod error;
mod events;
pub mod hooks;
mod models;
mod notifications;
pub mod protocol;

pub use error::{IdError, TransitionError};
pub use events::{EventKind, PropagationEvent};
pub use hooks::{HookDecision, Hooks};
pub use models::{
    Comment, CommentId, CommentMeta, CommentStatus, Post, PostId, Subscription, SubscriptionId,
    Transition,
};
pub use notifications::Notification;
