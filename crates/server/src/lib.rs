pub mod apply;
pub mod config;
pub mod http;
pub mod state;

pub use apply::ApplyEngine;
pub use http::router::build_router;
pub use state::AppState;
