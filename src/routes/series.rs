//! HTTP routes for series

use crate::routes::{created, ok, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::services::series::{self, SeriesListQuery, SeriesRequest, UpdateSeriesRequest};
use crate::services::{parse_id, viewer_of};
use crate::types::Result;

pub async fn handle_list(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let query: SeriesListQuery = req.query()?;
    Ok(ok(series::list_series(&*state.store, query).await?))
}

pub async fn handle_create(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let user = req.require_user(state).await?;
    let body: SeriesRequest = req.json()?;
    Ok(created(series::create_series(&*state.store, &user, body).await?))
}

pub async fn handle_get(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "series")?;
    let user = req.user(state).await?;
    let view = series::get_series(&*state.store, &viewer_of(user.as_ref()), id).await?;
    Ok(ok(view))
}

pub async fn handle_update(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "series")?;
    let user = req.require_user(state).await?;
    let body: UpdateSeriesRequest = req.json()?;
    Ok(ok(series::update_series(&*state.store, &user, id, body).await?))
}

pub async fn handle_delete(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "series")?;
    let user = req.require_user(state).await?;
    series::delete_series(&*state.store, &user, id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}
