use super::handlers::{admin, comments, distributor};
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use domain::protocol::COMMENTS_ROUTE_PREFIX;
use domain::EventKind;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    if allowed_origins == "*" {
        return CorsLayer::new()
            .allow_methods(METHODS)
            .allow_origin(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS config is invalid or empty, falling back to allow ANY.");
        CorsLayer::new()
            .allow_methods(METHODS)
            .allow_origin(Any)
            .allow_headers(Any)
    } else {
        tracing::info!("CORS enabled for origins: {:?}", origins);
        CorsLayer::new()
            .allow_methods(METHODS)
            .allow_origin(origins)
            .allow_headers(Any)
    }
}

fn distributor_routes() -> Router<AppState> {
    let path = |kind: EventKind| format!("/{}", kind.as_path());

    Router::new()
        .route(&path(EventKind::Insert), post(distributor::insert_comments))
        .route(&path(EventKind::Update), post(distributor::update_comments))
        .route(&path(EventKind::Trash), post(distributor::trash_comments))
        .route(&path(EventKind::Untrash), post(distributor::untrash_comments))
        .route(&path(EventKind::Delete), post(distributor::delete_comments))
        .route(&path(EventKind::StatusChange), post(distributor::change_status))
        .route(&path(EventKind::Spam), post(distributor::spam_comments))
        .route(&path(EventKind::Unspam), post(distributor::unspam_comments))
}

pub fn build_router(state: AppState, allowed_origins: &str) -> Router {
    Router::new()
        .nest(COMMENTS_ROUTE_PREFIX, distributor_routes())
        .route(
            "/api/posts/:post_id/comments",
            get(comments::list_comments).post(comments::post_comment),
        )
        .route("/api/admin/posts", post(admin::create_post))
        .route(
            "/api/admin/posts/:post_id/subscriptions",
            post(admin::create_subscription),
        )
        .route(
            "/api/admin/comments/:comment_id",
            put(admin::edit_comment).delete(admin::delete_comment),
        )
        .route(
            "/api/admin/comments/:comment_id/moderate",
            post(admin::moderate_comment),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}
