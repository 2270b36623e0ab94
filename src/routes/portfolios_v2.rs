use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::{
    CreatePortfolio, ExistsQuery, ExistsResponse, Pagination, PortfolioResponse,
    PortfolioSearchResponse, SearchQuery, MAX_PAGE_SIZE,
};
use crate::services::name_validator;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/portfolios", get(search_portfolios))
        .route("/portfolios/bulk", post(create_portfolios_bulk))
        .route("/portfolios/exists", get(portfolio_exists))
}

/// Rejects malformed search parameters before they reach the store.
pub fn validate_search_query(query: &SearchQuery) -> Result<(), AppError> {
    if query.name.is_some() && query.name_like.is_some() {
        return Err(AppError::Validation(
            "Cannot specify both 'name' and 'name_like' parameters".to_string(),
        ));
    }

    for (param, value) in [("name", &query.name), ("name_like", &query.name_like)] {
        if let Some(value) = value {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::Validation(format!("'{}' parameter cannot be empty", param)));
            }
            if !name_validator::is_valid_format(trimmed) {
                return Err(AppError::Validation(format!(
                    "Invalid '{}' parameter format: {}",
                    param, value
                )));
            }
        }
    }

    if query.limit < 1 || query.limit > MAX_PAGE_SIZE {
        return Err(AppError::Validation(format!(
            "'limit' must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if query.offset < 0 {
        return Err(AppError::Validation("'offset' must be non-negative".to_string()));
    }
    Ok(())
}

pub async fn search_portfolios(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PortfolioSearchResponse>, AppError> {
    info!(
        "GET /api/v2/portfolios - Searching (name={:?}, name_like={:?}, limit={}, offset={})",
        query.name, query.name_like, query.limit, query.offset
    );
    validate_search_query(&query).map_err(|e| {
        warn!("Rejected search parameters: {}", e);
        e
    })?;

    let (portfolios, total) = state.service.search(&query).await.map_err(|e| {
        error!("Failed to search portfolios: {}", e);
        e
    })?;

    Ok(Json(PortfolioSearchResponse {
        portfolios: portfolios.into_iter().map(PortfolioResponse::from).collect(),
        pagination: Pagination::from_window(total, query.limit, query.offset),
    }))
}

pub async fn create_portfolios_bulk(
    State(state): State<AppState>,
    Json(items): Json<Vec<CreatePortfolio>>,
) -> Result<(StatusCode, Json<Vec<PortfolioResponse>>), AppError> {
    info!("POST /api/v2/portfolios/bulk - Creating {} portfolios", items.len());
    let portfolios = state.service.create_bulk(items).await.map_err(|e| {
        error!("Bulk portfolio creation failed: {}", e);
        e
    })?;
    Ok((
        StatusCode::CREATED,
        Json(portfolios.into_iter().map(PortfolioResponse::from).collect()),
    ))
}

pub async fn portfolio_exists(
    State(state): State<AppState>,
    Query(query): Query<ExistsQuery>,
) -> Result<Json<ExistsResponse>, AppError> {
    info!("GET /api/v2/portfolios/exists - Checking name '{}'", query.name);
    if query.name.trim().is_empty() {
        return Err(AppError::Validation("'name' parameter cannot be empty".to_string()));
    }

    let exists = state.service.name_exists(&query.name).await.map_err(|e| {
        error!("Failed to check portfolio name '{}': {}", query.name, e);
        e
    })?;
    Ok(Json(ExistsResponse {
        name: query.name,
        exists,
    }))
}
