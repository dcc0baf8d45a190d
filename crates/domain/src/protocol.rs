//! Wire contract between a hub and its destinations.

use crate::events::EventKind;
use crate::models::{Comment, CommentId, CommentMeta, CommentStatus, PostId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every distributor endpoint lives under this path, one segment per [`EventKind`].
pub const COMMENTS_ROUTE_PREFIX: &str = "/wp/v2/distributor/comments";

pub const ERR_INVALID_ID: &str = "rest_post_invalid_id";
pub const ERR_INVALID_SUBSCRIPTION: &str = "rest_post_invalid_subscription";

pub fn endpoint_url(target_url: &str, kind: EventKind) -> String {
    format!(
        "{}{}/{}",
        target_url.trim_end_matches('/'),
        COMMENTS_ROUTE_PREFIX,
        kind.as_path()
    )
}

/// A comment together with its extension metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPayload {
    pub comment_data: Comment,
    #[serde(default)]
    pub comment_meta: CommentMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentData {
    Id(CommentId),
    Ids(Vec<CommentId>),
    Comments(Vec<CommentPayload>),
}

/// Accepts a single value where a list is expected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(v) => vec![v],
        }
    }
}

/// Body a hub POSTs to a destination endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// The post id as known on the destination.
    pub post_id: PostId,
    pub signature: String,
    pub comment_data: CommentData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_status: Option<CommentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_post_id: Option<PostId>,
}

/// Common accessors for authenticating any inbound request.
pub trait SignedRequest {
    fn post_id(&self) -> PostId;
    fn signature(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsertRequest {
    pub post_id: PostId,
    pub signature: String,
    pub comment_data: Vec<CommentPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRequest {
    pub post_id: PostId,
    pub signature: String,
    pub comment_data: OneOrMany<CommentPayload>,
}

/// `delete`, `trash` and `spam`.
#[derive(Debug, Clone, Deserialize)]
pub struct IdsRequest {
    pub post_id: PostId,
    pub signature: String,
    pub comment_data: OneOrMany<CommentId>,
    #[serde(default)]
    pub origin_post_id: Option<PostId>,
}

/// `untrash`, `unspam` and `status_change`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusRequest {
    pub post_id: PostId,
    pub signature: String,
    pub comment_data: OneOrMany<CommentId>,
    pub comment_status: CommentStatus,
    #[serde(default)]
    pub origin_post_id: Option<PostId>,
}

macro_rules! signed {
    ($($ty:ty),*) => {
        $(impl SignedRequest for $ty {
            fn post_id(&self) -> PostId {
                self.post_id
            }

            fn signature(&self) -> &str {
                &self.signature
            }
        })*
    };
}

signed!(InsertRequest, UpdateRequest, IdsRequest, StatusRequest);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub comment_id: CommentId,
    pub error: String,
}

/// Split result of one bulk endpoint call. The call itself succeeds even when
/// some items land in `fail`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub success: Vec<CommentId>,
    pub fail: Vec<ApplyFailure>,
    /// Items that could not be mapped to a local comment (unknown id, or a
    /// parent that never arrived).
    pub unresolved: Vec<CommentId>,
}

impl ApplyOutcome {
    pub fn failed(&mut self, comment_id: CommentId, error: impl ToString) {
        self.fail.push(ApplyFailure {
            comment_id,
            error: error.to_string(),
        });
    }
}

/// What a destination answered, as seen by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub status: u16,
}

/// Structured error returned by the distributor endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub data: ErrorData,
}

/// Strings holding a serialized object or array are decoded, everything else
/// is kept as is.
pub fn decode_meta_value(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                if let Ok(decoded) = serde_json::from_str::<Value>(&s) {
                    return decoded;
                }
            }
            Value::String(s)
        }
        other => other,
    }
}
