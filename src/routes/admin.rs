use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::services::validation_cache::CacheStats;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/validation-cache",
        get(get_validation_cache_stats).delete(clear_validation_cache),
    )
}

#[derive(Debug, Serialize)]
pub struct ValidationCacheStatus {
    pub enabled: bool,
    pub capacity: usize,
    pub stats: CacheStats,
}

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    /// `existence` clears only existence observations; `all` (the default) clears
    /// everything. Other values are rejected.
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub scope: String,
}

pub async fn get_validation_cache_stats(
    State(state): State<AppState>,
) -> Json<ValidationCacheStatus> {
    info!("GET /api/admin/validation-cache - Fetching cache statistics");
    let status = match &state.validation_cache {
        Some(cache) => ValidationCacheStatus {
            enabled: true,
            capacity: cache.capacity(),
            stats: cache.stats(),
        },
        None => ValidationCacheStatus {
            enabled: false,
            capacity: 0,
            stats: CacheStats::default(),
        },
    };
    Json(status)
}

pub async fn clear_validation_cache(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Result<Json<ClearResponse>, AppError> {
    let scope = params.scope.unwrap_or_else(|| "all".to_string());
    info!("DELETE /api/admin/validation-cache?scope={} - Clearing cache", scope);

    let Some(cache) = &state.validation_cache else {
        warn!("Validation cache clear requested but caching is disabled");
        return Ok(Json(ClearResponse {
            message: "Validation cache is disabled".to_string(),
            scope,
        }));
    };

    match scope.as_str() {
        "existence" => cache.clear_existence(),
        "all" => cache.clear(),
        other => {
            return Err(AppError::Validation(format!(
                "Unknown cache scope '{}': expected 'all' or 'existence'",
                other
            )))
        }
    }

    Ok(Json(ClearResponse {
        message: format!("Validation cache cleared ({})", scope),
        scope,
    }))
}
