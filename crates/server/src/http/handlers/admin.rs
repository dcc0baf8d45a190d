use crate::http::error::ApiError;
use crate::http::handlers::comments::require_post;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use domain::{
    Comment, CommentId, CommentStatus, Notification, Post, PostId, Subscription, Transition,
    TransitionError,
};
use serde::Deserialize;

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    let expected_token = format!("Bearer {}", state.admin_token);
    if auth_header != expected_token {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

async fn require_comment(state: &AppState, comment_id: i64) -> Result<Comment, ApiError> {
    let comment_id = CommentId::new(comment_id);
    state
        .db
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("comment {} not found", comment_id)))
}

fn generate_signature() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    /// Signature a hub must present when pushing to this post.
    pub signature: Option<String>,
    #[serde(default)]
    pub generate_signature: bool,
}

pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    authorize(&state, &headers)?;

    let signature = match payload.signature {
        Some(sig) if !sig.trim().is_empty() => Some(sig.trim().to_string()),
        _ if payload.generate_signature => Some(generate_signature()),
        _ => None,
    };
    let post_id = state
        .db
        .create_post(payload.title.trim(), signature.as_deref())
        .await?;
    let post = state
        .db
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("post {} not found", post_id)))?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Deserialize)]
pub struct CreateSubscriptionRequest {
    pub target_url: String,
    pub remote_post_id: PostId,
    pub signature: String,
}

/// Registers a destination for a local post and triggers the initial push of
/// its thread.
pub async fn create_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>), ApiError> {
    authorize(&state, &headers)?;
    let post_id = require_post(&state.db, post_id).await?;

    let target_url = payload.target_url.trim();
    if target_url.is_empty() || payload.signature.is_empty() {
        return Err(ApiError::BadRequest(
            "target_url and signature are required".into(),
        ));
    }

    let subscription_id = state
        .db
        .create_subscription(post_id, target_url, payload.remote_post_id, &payload.signature)
        .await?;
    let subscription = state
        .db
        .get_subscription(subscription_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("subscription {} not found", subscription_id)))?;

    state
        .publish(Notification::SubscriptionCreated {
            post_id,
            subscription_id,
        })
        .await;
    Ok((StatusCode::CREATED, Json(subscription)))
}

#[derive(Deserialize)]
pub struct EditCommentRequest {
    pub content: String,
}

pub async fn edit_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
    Json(payload): Json<EditCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    authorize(&state, &headers)?;
    let mut comment = require_comment(&state, comment_id).await?;

    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment content is empty".into()));
    }
    comment.content = content.to_string();
    state.db.update_comment(&comment).await?;

    state
        .publish(Notification::CommentUpdated {
            comment_id: comment.id,
        })
        .await;
    Ok(Json(comment))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Hold,
    Spam,
    Unspam,
    Trash,
    Untrash,
}

impl ModerationAction {
    fn transition(self) -> Transition {
        match self {
            ModerationAction::Approve => Transition::Set(CommentStatus::Approved),
            ModerationAction::Hold => Transition::Set(CommentStatus::Hold),
            ModerationAction::Spam => Transition::Spam,
            ModerationAction::Unspam => Transition::Unspam,
            ModerationAction::Trash => Transition::Trash,
            ModerationAction::Untrash => Transition::Untrash,
        }
    }

    fn notification(self, post_id: PostId, comment_id: CommentId, status: CommentStatus) -> Notification {
        match self {
            ModerationAction::Approve | ModerationAction::Hold => Notification::StatusChanged {
                post_id,
                comment_id,
                status,
            },
            ModerationAction::Spam => Notification::CommentSpammed { post_id, comment_id },
            ModerationAction::Unspam => Notification::CommentUnspammed { comment_id },
            ModerationAction::Trash => Notification::CommentTrashed { post_id, comment_id },
            ModerationAction::Untrash => Notification::CommentUntrashed { comment_id },
        }
    }
}

#[derive(Deserialize)]
pub struct ModerateRequest {
    pub action: ModerationAction,
}

pub async fn moderate_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
    Json(payload): Json<ModerateRequest>,
) -> Result<Json<Comment>, ApiError> {
    authorize(&state, &headers)?;
    let mut comment = require_comment(&state, comment_id).await?;

    let status = state
        .db
        .transition_comment(comment.id, payload.action.transition())
        .await
        .map_err(|e| match e.downcast_ref::<TransitionError>() {
            Some(rejected) => ApiError::BadRequest(rejected.to_string()),
            None => ApiError::Internal(e),
        })?;
    state.db.update_comment_count(comment.post_id).await?;
    comment.status = status;

    state
        .publish(payload.action.notification(comment.post_id, comment.id, status))
        .await;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    let comment = require_comment(&state, comment_id).await?;

    state.db.delete_comment(comment.id).await?;
    state.db.update_comment_count(comment.post_id).await?;

    state
        .publish(Notification::CommentDeleted {
            post_id: comment.post_id,
            comment_id: comment.id,
        })
        .await;
    Ok(StatusCode::NO_CONTENT)
}
