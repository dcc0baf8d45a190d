use crate::models::CommentStatus;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("'{0}' is not a numeric id")]
    NotNumeric(String),
    #[error("id must not be negative, got {0}")]
    Negative(i64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("comment is already in '{0}'")]
    AlreadyIn(CommentStatus),
    #[error("comment must be in '{0}' but is in '{1}'")]
    NotIn(CommentStatus, CommentStatus),
    #[error("unknown comment status '{0}'")]
    UnknownStatus(String),
}
