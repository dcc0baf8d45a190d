pub mod comments;
pub mod identity;
pub mod meta;
pub mod posts;
pub mod subscriptions;
