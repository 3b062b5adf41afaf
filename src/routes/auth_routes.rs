//! HTTP routes for sessions
//!
//! - POST /api/auth/register   - Create an account and get a token
//! - POST /api/auth/login      - Authenticate with username or email
//! - POST /api/auth/refresh    - Issue a fresh token for a live session
//! - POST /api/auth/logout-all - Revoke every token of the account
//! - GET  /api/auth/me         - Current user

use tracing::info;

use crate::routes::{created, ok, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::services::users::{self, LoginRequest, RegisterRequest};
use crate::types::Result;

// =============================================================================
// Handlers
// =============================================================================

pub async fn handle_register(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let body: RegisterRequest = req.json()?;
    let view = users::register(&*state.store, &state.jwt, state.args.default_wpm, body).await?;
    info!(username = %view.user.username, "User registered");
    Ok(created(view))
}

pub async fn handle_login(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let body: LoginRequest = req.json()?;
    let view = users::login(&*state.store, &state.jwt, body).await?;
    Ok(ok(view))
}

pub async fn handle_refresh(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let user = req.require_user(state).await?;
    Ok(ok(users::refresh(&state.jwt, &user)?))
}

pub async fn handle_logout_all(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let user = req.require_user(state).await?;
    users::logout_all(&*state.store, &user).await?;
    Ok(ok(serde_json::json!({ "revoked": true })))
}

pub async fn handle_me(req: &ApiRequest, state: &AppState) -> Result<ApiResponse> {
    let user = req.require_user(state).await?;
    Ok(ok(users::me(&user)))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::*;
    use hyper::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_register_login_me() {
        let state = state();
        let token = register(&state, "writer").await;

        let (status, body) = call(&state, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "writer");

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"identifier": "WRITER@example.com", "password": "long enough password"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["token"].is_string());

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"identifier": "writer", "password": "wrong password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid username/email or password");
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let state = state();
        register(&state, "writer").await;
        let (status, body) = call(
            &state,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "writer",
                "email": "another@example.com",
                "password": "long enough password",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_logout_all_revokes_tokens() {
        let state = state();
        let token = register(&state, "writer").await;

        let (status, body) = call(&state, Method::POST, "/api/auth/refresh", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let refreshed = body["data"]["token"].as_str().unwrap().to_string();

        let (status, _) = call(&state, Method::POST, "/api/auth/logout-all", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        for stale in [&token, &refreshed] {
            let (status, _) = call(&state, Method::GET, "/api/auth/me", Some(stale), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
    }
}
