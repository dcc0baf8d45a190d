#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use domain::{Hooks, Notification, PostId};
use serde_json::{json, Value};
use server::{build_router, AppState, ApplyEngine};
use std::sync::Arc;
use storage::Db;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "test-admin";
pub const SIGNATURE: &str = "s3cret";

pub struct TestApp {
    pub router: Router,
    pub db: Db,
    pub notifications: mpsc::Receiver<Notification>,
    /// A local post that accepts pushes signed with [`SIGNATURE`].
    pub post: PostId,
}

pub async fn app() -> TestApp {
    let db = Db::new("sqlite::memory:").await.unwrap();
    let post = db.create_post("mirror", Some(SIGNATURE)).await.unwrap();
    let (router, notifications) = router_for(db.clone());
    TestApp {
        router,
        db,
        notifications,
        post,
    }
}

pub fn router_for(db: Db) -> (Router, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(16);
    let state = AppState {
        engine: ApplyEngine::new(db.clone(), Arc::new(Hooks::new()), Vec::new()),
        db,
        notifier: tx,
        admin_token: ADMIN_TOKEN.to_string(),
    };
    (build_router(state, "*"), rx)
}

pub fn comment_json(id: i64, parent: i64, origin_post: i64) -> Value {
    json!({
        "comment_data": {
            "comment_ID": id,
            "comment_post_ID": origin_post,
            "comment_parent": parent,
            "comment_author": format!("author {id}"),
            "comment_author_email": "",
            "comment_author_url": "",
            "comment_author_IP": "10.0.0.1",
            "comment_date": "2024-03-01T09:30:00",
            "comment_date_gmt": "2024-03-01T09:30:00",
            "comment_content": format!("comment {id}"),
            "comment_karma": 0,
            "comment_approved": "1",
            "comment_agent": "",
            "comment_type": "comment"
        },
        "comment_meta": {}
    })
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub async fn push(router: &Router, kind: &str, body: Value) -> (StatusCode, Value) {
    send(
        router,
        "POST",
        &format!("/wp/v2/distributor/comments/{kind}"),
        None,
        Some(body),
    )
    .await
}
