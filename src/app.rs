use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::routes::{admin, health, portfolios, portfolios_v2};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/v1", portfolios::router())
        .nest("/api/v2", portfolios_v2::router())
        .nest("/api/admin", admin::router())
        .layer(cors)
        .with_state(state)
}
