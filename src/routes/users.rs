//! HTTP routes for profiles and account settings

use crate::routes::{ok, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::services::users::{self, ReadingTestRequest, SetRolesRequest, UpdateProfileRequest};
use crate::services::{activity, parse_id, viewer_of};
use crate::types::Result;

pub async fn handle_profile(req: &ApiRequest, state: &AppState, username: &str) -> Result<ApiResponse> {
    let user = req.user(state).await?;
    let view = users::profile(&*state.store, &viewer_of(user.as_ref()), username).await?;
    Ok(ok(view))
}

pub async fn handle_update_profile(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let user = req.require_user(state).await?;
    let body: UpdateProfileRequest = req.json()?;
    Ok(ok(users::update_profile(&*state.store, &user, body).await?))
}

pub async fn handle_reading_test(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let user = req.require_user(state).await?;
    let body: ReadingTestRequest = req.json()?;
    Ok(ok(users::reading_test(&*state.store, &user, body).await?))
}

pub async fn handle_become_author(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let user = req.require_user(state).await?;
    Ok(ok(users::become_author(&*state.store, &user).await?))
}

pub async fn handle_favorites(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let user = req.require_user(state).await?;
    Ok(ok(activity::favorites(&*state.store, &user).await?))
}

pub async fn handle_set_roles(req: &ApiRequest, state: &AppState, id: &str) -> Result<ApiResponse> {
    let admin = req.require_user(state).await?;
    let target_id = parse_id(id, "user")?;
    let body: SetRolesRequest = req.json()?;
    Ok(ok(users::set_roles(&*state.store, &admin, target_id, body).await?))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::*;
    use hyper::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_profile_settings() {
        let state = state();
        let token = register(&state, "reader").await;

        let (status, body) = call(
            &state,
            Method::PATCH,
            "/api/users/me",
            Some(&token),
            Some(json!({"bio": "Reads at night", "wpm": 300})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["wpm"], 300);

        let (status, _) = call(
            &state,
            Method::PATCH,
            "/api/users/me",
            Some(&token),
            Some(json!({"wpm": 10})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/users/me/reading-test",
            Some(&token),
            Some(json!({"words": 500, "seconds": 100.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["wpm"], 300);

        let (status, body) = call(&state, Method::GET, "/api/users/reader", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["bio"], "Reads at night");
        assert!(body["data"]["user"].get("email").is_none());
    }

    #[tokio::test]
    async fn test_roles_need_admin() {
        let state = state();
        let token = register(&state, "reader").await;
        let (_, me) = call(&state, Method::GET, "/api/auth/me", Some(&token), None).await;
        let id = me["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &state,
            Method::PUT,
            &format!("/api/users/{id}/roles"),
            Some(&token),
            Some(json!({"roles": ["ADMIN"]})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&state, Method::POST, "/api/users/me/author", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["roles"]
            .as_array()
            .unwrap()
            .contains(&json!("AUTHOR")));
    }

    #[tokio::test]
    async fn test_favorites_require_login() {
        let state = state();
        let (status, _) = call(&state, Method::GET, "/api/users/me/favorites", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&state, Method::GET, "/api/users/nobody", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
