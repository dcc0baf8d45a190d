use crate::http::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{Local, Utc};
use domain::{Comment, CommentId, CommentStatus, Notification, PostId};
use serde::Deserialize;
use storage::Db;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub author_name: String,
    #[serde(default)]
    pub author_email: String,
    #[serde(default)]
    pub author_url: String,
    pub parent: Option<CommentId>,
    /// Leave the comment waiting for moderation instead of approving it.
    #[serde(default)]
    pub hold: bool,
}

pub(crate) async fn require_post(db: &Db, post_id: i64) -> Result<PostId, ApiError> {
    let post_id = PostId::new(post_id);
    match db.get_post(post_id).await? {
        Some(post) => Ok(post.id),
        None => Err(ApiError::NotFound(format!("post {} not found", post_id))),
    }
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let post_id = require_post(&state.db, post_id).await?;
    let comments = state
        .db
        .list_comments(post_id, &[CommentStatus::Approved])
        .await?;
    Ok(Json(comments))
}

pub async fn post_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let post_id = require_post(&state.db, post_id).await?;

    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment content is empty".into()));
    }
    let author_name = payload.author_name.trim();
    if author_name.is_empty() {
        return Err(ApiError::BadRequest("Author name is required".into()));
    }

    let parent = payload.parent.unwrap_or(CommentId::ROOT);
    if !parent.is_root() {
        match state.db.get_comment(parent).await? {
            Some(p) if p.post_id == post_id => {}
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "Invalid parent comment: {}",
                    parent
                )))
            }
        }
    }

    let agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut comment = Comment {
        id: CommentId::ROOT,
        post_id,
        parent,
        author_name: author_name.to_string(),
        author_email: payload.author_email,
        author_url: payload.author_url,
        author_ip: String::new(),
        created_at: Local::now().naive_local(),
        created_at_gmt: Utc::now().naive_utc(),
        content: content.to_string(),
        karma: 0,
        status: if payload.hold {
            CommentStatus::Hold
        } else {
            CommentStatus::Approved
        },
        agent,
        comment_type: "comment".into(),
    };
    comment.id = state.db.insert_comment(&comment).await?;
    state.db.update_comment_count(post_id).await?;

    state
        .publish(Notification::CommentInserted {
            comment_id: comment.id,
        })
        .await;
    Ok((StatusCode::CREATED, Json(comment)))
}
