use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{IdError, TransitionError};

/// Ids arrive either as JSON numbers or as numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericRepr {
    Int(i64),
    Text(String),
}

fn parse_numeric(raw: &str) -> Result<i64, IdError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| IdError::NotNumeric(raw.to_string()))?;
    if value < 0 {
        return Err(IdError::Negative(value));
    }
    Ok(value)
}

macro_rules! numeric_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_numeric(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match NumericRepr::deserialize(deserializer)? {
                    NumericRepr::Int(v) if v >= 0 => Ok(Self(v)),
                    NumericRepr::Int(v) => Err(serde::de::Error::custom(IdError::Negative(v))),
                    NumericRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
                }
            }
        }
    };
}

numeric_id!(
    /// Identity of a post on the node that stores it.
    PostId
);
numeric_id!(
    /// Identity of a comment on the node that stores it. `0` means "no parent".
    CommentId
);
numeric_id!(SubscriptionId);

impl CommentId {
    pub const ROOT: CommentId = CommentId(0);

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

/// Approval state of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentStatus {
    #[serde(rename = "approve", alias = "approved", alias = "1")]
    Approved,
    #[serde(rename = "hold", alias = "unapproved", alias = "0")]
    Hold,
    #[serde(rename = "spam")]
    Spam,
    #[serde(rename = "trash")]
    Trash,
}

impl CommentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentStatus::Approved => "approve",
            CommentStatus::Hold => "hold",
            CommentStatus::Spam => "spam",
            CommentStatus::Trash => "trash",
        }
    }

    /// Checks whether `transition` may be applied to a comment currently in `self`.
    pub fn check(self, transition: Transition) -> Result<(), TransitionError> {
        match (transition, self) {
            (Transition::Trash, CommentStatus::Trash) => Err(TransitionError::AlreadyIn(self)),
            (Transition::Spam, CommentStatus::Spam) => Err(TransitionError::AlreadyIn(self)),
            (Transition::Untrash, s) if s != CommentStatus::Trash => {
                Err(TransitionError::NotIn(CommentStatus::Trash, s))
            }
            (Transition::Unspam, s) if s != CommentStatus::Spam => {
                Err(TransitionError::NotIn(CommentStatus::Spam, s))
            }
            _ => Ok(()),
        }
    }
}

impl FromStr for CommentStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" | "approved" | "1" => Ok(CommentStatus::Approved),
            "hold" | "unapproved" | "0" => Ok(CommentStatus::Hold),
            "spam" => Ok(CommentStatus::Spam),
            "trash" => Ok(CommentStatus::Trash),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform-level mutations that move a comment between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Trash,
    Untrash,
    Spam,
    Unspam,
    Set(CommentStatus),
}

/// Extension metadata: a key may carry several values, kept in insertion order.
pub type CommentMeta = BTreeMap<String, Vec<serde_json::Value>>;

/// `comment_date` values are written `2024-03-01 10:00:00`; the ISO `T`
/// separator is accepted as well.
mod comment_date {
    use super::*;

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(at: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&at.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let normalized = raw.trim().replacen('T', " ", 1);
        NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f")
            .map_err(|e| serde::de::Error::custom(format!("invalid comment date {raw:?}: {e}")))
    }
}

fn default_comment_type() -> String {
    "comment".to_string()
}

/// A comment as stored on one node. Serialized with the field names the
/// distributor endpoints exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "comment_ID")]
    pub id: CommentId,
    #[serde(rename = "comment_post_ID")]
    pub post_id: PostId,
    #[serde(rename = "comment_parent", default)]
    pub parent: CommentId,
    #[serde(rename = "comment_author", default)]
    pub author_name: String,
    #[serde(rename = "comment_author_email", default)]
    pub author_email: String,
    #[serde(rename = "comment_author_url", default)]
    pub author_url: String,
    #[serde(rename = "comment_author_IP", default)]
    pub author_ip: String,
    #[serde(rename = "comment_date", with = "comment_date")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "comment_date_gmt", with = "comment_date")]
    pub created_at_gmt: NaiveDateTime,
    #[serde(rename = "comment_content")]
    pub content: String,
    #[serde(rename = "comment_karma", default)]
    pub karma: i64,
    #[serde(rename = "comment_approved")]
    pub status: CommentStatus,
    #[serde(rename = "comment_agent", default)]
    pub agent: String,
    #[serde(rename = "comment_type", default = "default_comment_type")]
    pub comment_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    /// Shared secret a hub must present when pushing comments for this post.
    pub subscription_signature: Option<String>,
    pub comment_count: i64,
    pub created_at: NaiveDateTime,
}

/// One destination mirroring one hub post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub post_id: PostId,
    pub target_url: String,
    pub remote_post_id: PostId,
    pub signature: String,
}

impl Subscription {
    /// A subscription is only usable when every remote coordinate is present.
    pub fn is_complete(&self) -> bool {
        !self.signature.is_empty()
            && !self.target_url.trim().is_empty()
            && self.remote_post_id.get() > 0
    }
}
