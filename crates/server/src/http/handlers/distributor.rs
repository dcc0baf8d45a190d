//! Endpoints a hub pushes comment changes to. The per-post subscription
//! signature is the only authentication.

use crate::http::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, Json};
use domain::protocol::{
    ApplyOutcome, IdsRequest, InsertRequest, SignedRequest, StatusRequest, UpdateRequest,
};
use storage::Db;
use tracing::warn;

async fn authenticate(db: &Db, req: &impl SignedRequest) -> Result<(), ApiError> {
    let post = db
        .get_post(req.post_id())
        .await?
        .ok_or(ApiError::InvalidPostId)?;
    match post.subscription_signature.as_deref() {
        Some(expected) if !expected.is_empty() && expected == req.signature() => Ok(()),
        _ => {
            warn!(post_id = %post.id, "rejected push with bad signature");
            Err(ApiError::InvalidSubscription)
        }
    }
}

pub async fn insert_comments(
    State(state): State<AppState>,
    Json(req): Json<InsertRequest>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    authenticate(&state.db, &req).await?;
    let outcome = state.engine.insert(req.post_id, req.comment_data).await?;
    Ok(Json(outcome))
}

pub async fn update_comments(
    State(state): State<AppState>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    authenticate(&state.db, &req).await?;
    let outcome = state
        .engine
        .update(req.post_id, req.comment_data.into_vec())
        .await?;
    Ok(Json(outcome))
}

pub async fn trash_comments(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    authenticate(&state.db, &req).await?;
    let outcome = state
        .engine
        .trash(req.post_id, req.origin_post_id, req.comment_data.into_vec())
        .await?;
    Ok(Json(outcome))
}

pub async fn untrash_comments(
    State(state): State<AppState>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    authenticate(&state.db, &req).await?;
    let outcome = state
        .engine
        .untrash(
            req.post_id,
            req.origin_post_id,
            req.comment_data.into_vec(),
            req.comment_status,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn delete_comments(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    authenticate(&state.db, &req).await?;
    let outcome = state
        .engine
        .delete(req.post_id, req.origin_post_id, req.comment_data.into_vec())
        .await?;
    Ok(Json(outcome))
}

pub async fn change_status(
    State(state): State<AppState>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    authenticate(&state.db, &req).await?;
    let outcome = state
        .engine
        .change_status(
            req.post_id,
            req.origin_post_id,
            req.comment_data.into_vec(),
            req.comment_status,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn spam_comments(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    authenticate(&state.db, &req).await?;
    let outcome = state
        .engine
        .spam(req.post_id, req.origin_post_id, req.comment_data.into_vec())
        .await?;
    Ok(Json(outcome))
}

pub async fn unspam_comments(
    State(state): State<AppState>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    authenticate(&state.db, &req).await?;
    let outcome = state
        .engine
        .unspam(
            req.post_id,
            req.origin_post_id,
            req.comment_data.into_vec(),
            req.comment_status,
        )
        .await?;
    Ok(Json(outcome))
}
