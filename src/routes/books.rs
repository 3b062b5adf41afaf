//! HTTP routes for books and their characters

use crate::db::schemas::ActivityKind;
use crate::routes::{created, ok, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::services::books::{self, BookListQuery, CreateBookRequest, UpdateBookRequest};
use crate::services::characters::{self, CharacterRequest, UpdateCharacterRequest};
use crate::services::{activity, parse_id, viewer_of};
use crate::types::Result;

// =============================================================================
// Books
// =============================================================================

pub async fn handle_list(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let query: BookListQuery = req.query()?;
    let user = req.user(state).await?;
    let page = books::list_books(&*state.store, &viewer_of(user.as_ref()), query).await?;
    Ok(ok(page))
}

pub async fn handle_create(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let user = req.require_user(state).await?;
    let body: CreateBookRequest = req.json()?;
    Ok(created(books::create_book(&*state.store, &user, body).await?))
}

pub async fn handle_get(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "book")?;
    let user = req.user(state).await?;
    let detail = books::get_book(&*state.store, &viewer_of(user.as_ref()), id).await?;
    Ok(ok(detail))
}

pub async fn handle_update(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "book")?;
    let user = req.require_user(state).await?;
    let body: UpdateBookRequest = req.json()?;
    Ok(ok(books::update_book(&*state.store, &user, id, body).await?))
}

pub async fn handle_delete(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "book")?;
    let user = req.require_user(state).await?;
    books::delete_book(&*state.store, &user, id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}

pub async fn handle_follow(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    toggle(req, state, ActivityKind::BookFollow, id, "book").await
}

pub async fn handle_favorite(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    toggle(req, state, ActivityKind::FavoriteBook, id, "book").await
}

/// Shared by the book and chapter toggles
pub(crate) async fn toggle(
    req: &ApiRequest,
    state: &AppState,
    kind: ActivityKind,
    id: &str,
    what: &str,
) -> Result<ApiResponse> {
    let target_id = parse_id(id, what)?;
    let user = req.require_user(state).await?;
    Ok(ok(activity::toggle(&*state.store, &user, kind, target_id).await?))
}

// =============================================================================
// Characters
// =============================================================================

pub async fn handle_list_characters(req: &ApiRequest, state: &AppState, book_id: &str) -> Result<ApiResponse> {
    let book_id = parse_id(book_id, "book")?;
    let user = req.user(state).await?;
    let list = characters::list_characters(&*state.store, &viewer_of(user.as_ref()), book_id).await?;
    Ok(ok(list))
}

pub async fn handle_create_character(req: &ApiRequest, state: &AppState, book_id: &str) -> Result<ApiResponse> {
    let book_id = parse_id(book_id, "book")?;
    let user = req.require_user(state).await?;
    let body: CharacterRequest = req.json()?;
    Ok(created(
        characters::create_character(&*state.store, &user, book_id, body).await?,
    ))
}

pub async fn handle_get_character(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "character")?;
    let user = req.user(state).await?;
    let view = characters::get_character(&*state.store, &viewer_of(user.as_ref()), id).await?;
    Ok(ok(view))
}

pub async fn handle_update_character(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "character")?;
    let user = req.require_user(state).await?;
    let body: UpdateCharacterRequest = req.json()?;
    Ok(ok(characters::update_character(&*state.store, &user, id, body).await?))
}

pub async fn handle_delete_character(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "character")?;
    let user = req.require_user(state).await?;
    characters::delete_character(&*state.store, &user, id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}
