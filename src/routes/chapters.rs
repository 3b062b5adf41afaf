//! HTTP routes for chapters, their ordering and their comments

use crate::db::schemas::ActivityKind;
use crate::routes::books::toggle;
use crate::routes::{created, ok, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::services::chapters::{self, CreateChapterRequest, ReorderRequest, UpdateChapterRequest};
use crate::services::comments::{self, CreateCommentRequest, UpdateCommentRequest};
use crate::services::{parse_id, viewer_of};
use crate::types::Result;

// =============================================================================
// Chapters
// =============================================================================

pub async fn handle_list(req: &ApiRequest, state: &AppState, book_id: &str) -> Result<ApiResponse> {
    let book_id = parse_id(book_id, "book")?;
    let user = req.user(state).await?;
    let list = chapters::list_chapters(&*state.store, &viewer_of(user.as_ref()), book_id).await?;
    Ok(ok(list))
}

pub async fn handle_create(req: &ApiRequest, state: &AppState, book_id: &str) -> Result<ApiResponse> {
    let book_id = parse_id(book_id, "book")?;
    let user = req.require_user(state).await?;
    let body: CreateChapterRequest = req.json()?;
    Ok(created(
        chapters::create_chapter(&*state.store, &user, book_id, body).await?,
    ))
}

pub async fn handle_get(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "chapter")?;
    let (viewer, wpm) = req.viewer(state).await?;
    Ok(ok(chapters::get_chapter(&*state.store, &viewer, wpm, id).await?))
}

pub async fn handle_update(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "chapter")?;
    let user = req.require_user(state).await?;
    let body: UpdateChapterRequest = req.json()?;
    Ok(ok(chapters::update_chapter(&*state.store, &user, id, body).await?))
}

pub async fn handle_delete(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "chapter")?;
    let user = req.require_user(state).await?;
    chapters::delete_chapter(&*state.store, &user, id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}

pub async fn handle_reorder(req: &ApiRequest, state: &AppState, book_id: &str) -> Result<ApiResponse> {
    let book_id = parse_id(book_id, "book")?;
    let user = req.require_user(state).await?;
    let body: ReorderRequest = req.json()?;
    Ok(ok(chapters::reorder_chapters(&*state.store, &user, book_id, body).await?))
}

pub async fn handle_favorite(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    toggle(req, state, ActivityKind::FavoriteChapter, id, "chapter").await
}

pub async fn handle_read(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    toggle(req, state, ActivityKind::ChapterRead, id, "chapter").await
}

// =============================================================================
// Comments
// =============================================================================

pub async fn handle_list_comments(req: &ApiRequest, state: &AppState, chapter_id: &str) -> Result<ApiResponse> {
    let chapter_id = parse_id(chapter_id, "chapter")?;
    let user = req.user(state).await?;
    let tree = comments::list_comments(&*state.store, &viewer_of(user.as_ref()), chapter_id).await?;
    Ok(ok(tree))
}

pub async fn handle_create_comment(req: &ApiRequest, state: &AppState, chapter_id: &str) -> Result<ApiResponse> {
    let chapter_id = parse_id(chapter_id, "chapter")?;
    let user = req.require_user(state).await?;
    let body: CreateCommentRequest = req.json()?;
    Ok(created(
        comments::create_comment(&*state.store, &user, chapter_id, body).await?,
    ))
}

pub async fn handle_update_comment(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "comment")?;
    let user = req.require_user(state).await?;
    let body: UpdateCommentRequest = req.json()?;
    Ok(ok(comments::update_comment(&*state.store, &user, id, body).await?))
}

pub async fn handle_delete_comment(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let id = parse_id(id, "comment")?;
    let user = req.require_user(state).await?;
    comments::delete_comment(&*state.store, &user, id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::*;
    use crate::server::AppState;
    use hyper::{Method, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// A published book with chapters titled by their position
    async fn book_with_chapters(state: &Arc<AppState>, token: &str, count: usize) -> (String, Vec<String>) {
        let (status, body) = call(
            state,
            Method::POST,
            "/api/books",
            Some(token),
            Some(json!({"title": "Serial", "status": "PUBLISHED"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let book = body["data"]["id"].as_str().unwrap().to_string();

        let mut chapters = Vec::new();
        for n in 1..=count {
            let (status, body) = call(
                state,
                Method::POST,
                &format!("/api/books/{book}/chapters"),
                Some(token),
                Some(json!({
                    "title": format!("Chapter {n}"),
                    "content": "<p>one two three four five</p>",
                    "status": "PUBLISHED",
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            assert_eq!(body["data"]["order"], n);
            chapters.push(body["data"]["id"].as_str().unwrap().to_string());
        }
        (book, chapters)
    }

    #[tokio::test]
    async fn test_chapter_detail_and_navigation() {
        let state = state();
        let author = register_author(&state, "writer").await;
        let (_, chapters) = book_with_chapters(&state, &author, 2).await;

        let (status, body) = call(&state, Method::GET, &format!("/api/chapters/{}", chapters[0]), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["word_count"], 5);
        assert_eq!(body["data"]["reading_minutes"], 1);
        assert_eq!(body["data"]["next_id"], Value::String(chapters[1].clone()));
        assert!(body["data"]["previous_id"].is_null());
    }

    #[tokio::test]
    async fn test_reorder_swaps_positions() {
        let state = state();
        let author = register_author(&state, "writer").await;
        let other = register_author(&state, "other").await;
        let (book, chapters) = book_with_chapters(&state, &author, 3).await;
        let order = json!({"chapters": [
            {"id": chapters[0], "order": 3},
            {"id": chapters[2], "order": 1},
        ]});

        let (status, _) = call(
            &state,
            Method::PUT,
            &format!("/api/books/{book}/chapters/order"),
            Some(&other),
            Some(order.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &state,
            Method::PUT,
            &format!("/api/books/{book}/chapters/order"),
            Some(&author),
            Some(order),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (_, body) = call(&state, Method::GET, &format!("/api/books/{book}/chapters"), None, None).await;
        let titles: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, ["Chapter 3", "Chapter 2", "Chapter 1"]);

        let (status, _) = call(
            &state,
            Method::PUT,
            &format!("/api/books/{book}/chapters/order"),
            Some(&author),
            Some(json!({"chapters": [{"id": chapters[1], "order": 1}]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_comment_thread() {
        let state = state();
        let author = register_author(&state, "writer").await;
        let reader = register(&state, "reader").await;
        let (_, chapters) = book_with_chapters(&state, &author, 1).await;
        let uri = format!("/api/chapters/{}/comments", chapters[0]);

        let (status, _) = call(&state, Method::POST, &uri, None, Some(json!({"content": "hi"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&state, Method::POST, &uri, Some(&reader), Some(json!({"content": "First!"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let root = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &state,
            Method::POST,
            &uri,
            Some(&author),
            Some(json!({"content": "Thanks", "parent_id": root})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&state, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["reply_count"], 1);
        assert_eq!(body["data"][0]["replies"][0]["content"], "Thanks");

        let (status, _) = call(&state, Method::DELETE, &format!("/api/comments/{root}"), Some(&reader), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &state,
            Method::PATCH,
            &format!("/api/comments/{root}"),
            Some(&reader),
            Some(json!({"content": "First, edited"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["content"], "First, edited");
    }

    #[tokio::test]
    async fn test_read_marker_toggle() {
        let state = state();
        let author = register_author(&state, "writer").await;
        let reader = register(&state, "reader").await;
        let (_, chapters) = book_with_chapters(&state, &author, 1).await;

        let (status, body) = call(&state, Method::POST, &format!("/api/chapters/{}/read", chapters[0]), Some(&reader), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["active"], true);

        let (_, body) = call(&state, Method::GET, &format!("/api/chapters/{}", chapters[0]), Some(&reader), None).await;
        assert_eq!(body["data"]["is_read"], true);
        assert_eq!(body["data"]["read_count"], 1);
    }
}
