use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CreatePortfolio, DeleteParams, PortfolioResponse, UpdatePortfolio};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/portfolios", post(create_portfolio).get(fetch_portfolios))
        .route(
            "/portfolio/:id",
            get(get_portfolio).put(update_portfolio).delete(delete_portfolio),
        )
}

pub async fn create_portfolio(
    State(state): State<AppState>,
    Json(data): Json<CreatePortfolio>,
) -> Result<(StatusCode, Json<PortfolioResponse>), AppError> {
    info!("POST /api/v1/portfolios - Creating portfolio '{}'", data.name);
    let portfolio = state.service.create(data).await.map_err(|e| {
        error!("Failed to create portfolio: {}", e);
        e
    })?;
    Ok((StatusCode::CREATED, Json(portfolio.into())))
}

pub async fn fetch_portfolios(
    State(state): State<AppState>,
) -> Result<Json<Vec<PortfolioResponse>>, AppError> {
    info!("GET /api/v1/portfolios - Fetching all portfolios");
    let portfolios = state.service.list_all().await.map_err(|e| {
        error!("Failed to fetch portfolios: {}", e);
        e
    })?;
    Ok(Json(portfolios.into_iter().map(PortfolioResponse::from).collect()))
}

pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PortfolioResponse>, AppError> {
    info!("GET /api/v1/portfolio/{} - Fetching portfolio", id);
    let portfolio = state.service.get(id).await.map_err(|e| {
        error!("Failed to fetch portfolio {}: {}", id, e);
        e
    })?;
    Ok(Json(portfolio.into()))
}

pub async fn update_portfolio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdatePortfolio>,
) -> Result<Json<PortfolioResponse>, AppError> {
    info!("PUT /api/v1/portfolio/{} - Updating portfolio", id);
    let portfolio = state.service.update(id, data).await.map_err(|e| {
        error!("Failed to update portfolio {}: {}", id, e);
        e
    })?;
    Ok(Json(portfolio.into()))
}

pub async fn delete_portfolio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, AppError> {
    info!("DELETE /api/v1/portfolio/{}?version={} - Deleting portfolio", id, params.version);
    state.service.delete(id, params.version).await.map_err(|e| {
        error!("Failed to delete portfolio {}: {}", id, e);
        e
    })?;
    Ok(StatusCode::NO_CONTENT)
}
