//! HTTP routes for Wriders
//!
//! `route` maps `(method, path segments)` to a handler. Handlers receive an
//! [`ApiRequest`] whose body has already been read under the size limit, and
//! return `Result`s that are rendered into the JSON envelope here.

pub mod auth_routes;
pub mod books;
pub mod chapters;
pub mod health;
pub mod series;
pub mod users;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, AUTHORIZATION, CONTENT_LENGTH};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::auth::{extract_token_from_header, Viewer};
use crate::db::schemas::UserDoc;
use crate::server::AppState;
use crate::services::users::authenticate;
use crate::services::viewer_of;
use crate::types::{Result, WridersError};

pub use health::health_check;

pub type ApiResponse = Response<Full<Bytes>>;

// =============================================================================
// Request
// =============================================================================

/// A request with its body collected
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    /// Collect the body, failing with `PayloadTooLarge` past `limit` bytes
    pub async fn collect<B>(req: Request<B>, limit: usize) -> Result<Self>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(WridersError::PayloadTooLarge);
        }

        let (parts, body) = req.into_parts();
        let body = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(WridersError::PayloadTooLarge)
            }
            Err(e) => {
                return Err(WridersError::Validation(format!(
                    "Failed to read body: {}",
                    e
                )))
            }
        };

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }

    /// Decode the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(WridersError::Validation("Request body is required".into()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| WridersError::Validation(format!("Invalid JSON: {}", e)))
    }

    /// Decode the query string
    pub fn query<T: DeserializeOwned>(&self) -> Result<T> {
        serde_urlencoded::from_str(self.query.as_deref().unwrap_or(""))
            .map_err(|e| WridersError::Validation(format!("Invalid query: {}", e)))
    }

    pub fn bearer_token(&self) -> Option<&str> {
        let header = self
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        extract_token_from_header(header)
    }

    /// The authenticated user, if a token was sent. A bad token is an error.
    pub async fn user(&self, state: &AppState) -> Result<Option<UserDoc>> {
        match self.bearer_token() {
            Some(token) => Ok(Some(authenticate(&*state.store, &state.jwt, token).await?)),
            None => Ok(None),
        }
    }

    pub async fn require_user(&self, state: &AppState) -> Result<UserDoc> {
        self.user(state)
            .await?
            .ok_or_else(|| WridersError::Unauthenticated("Authentication required".into()))
    }

    /// Visibility identity plus reading speed of the requester
    pub async fn viewer(&self, state: &AppState) -> Result<(Viewer, u32)> {
        let user = self.user(state).await?;
        let wpm = user
            .as_ref()
            .map_or(state.args.default_wpm, |u| u.wpm);
        Ok((viewer_of(user.as_ref()), wpm))
    }
}

// =============================================================================
// Response Helpers
// =============================================================================

const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> ApiResponse {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", ALLOW_METHODS)
        .header("Access-Control-Allow-Headers", ALLOW_HEADERS)
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// `{"success": true, "data": ...}`
pub fn success<T: Serialize>(status: StatusCode, data: T) -> ApiResponse {
    json_response(
        status,
        &serde_json::json!({ "success": true, "data": data }),
    )
}

pub fn ok<T: Serialize>(data: T) -> ApiResponse {
    success(StatusCode::OK, data)
}

pub fn created<T: Serialize>(data: T) -> ApiResponse {
    success(StatusCode::CREATED, data)
}

/// `{"success": false, "message": ..., "code": ...}`
pub fn error_response(err: &WridersError) -> ApiResponse {
    let status = err.status();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    json_response(
        status,
        &serde_json::json!({
            "success": false,
            "message": err.public_message(),
            "code": err.code(),
        }),
    )
}

pub fn preflight_response() -> ApiResponse {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", ALLOW_METHODS)
        .header("Access-Control-Allow-Headers", ALLOW_HEADERS)
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn not_found_response(path: &str) -> ApiResponse {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "success": false,
            "message": format!("No route for {}", path),
            "code": "NOT_FOUND",
        }),
    )
}

fn method_not_allowed_response(allowed: &str) -> ApiResponse {
    let mut response = json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({
            "success": false,
            "message": "Method not allowed",
            "code": "METHOD_NOT_ALLOWED",
        }),
    );
    if let Ok(value) = allowed.parse() {
        response.headers_mut().insert("Allow", value);
    }
    response
}

// =============================================================================
// Main Router
// =============================================================================

/// Methods served on a path shape, if the path exists
fn allowed_methods(segments: &[&str]) -> Option<&'static str> {
    let allowed = match segments {
        ["health"] => "GET",
        ["api", "auth", "register" | "login" | "refresh" | "logout-all"] => "POST",
        ["api", "auth", "me"] => "GET",
        ["api", "users", "me"] => "PATCH",
        ["api", "users", "me", "reading-test" | "author"] => "POST",
        ["api", "users", "me", "favorites"] => "GET",
        ["api", "users", _, "roles"] => "PUT",
        ["api", "users", _] => "GET",
        ["api", "series"] | ["api", "books"] => "GET, POST",
        ["api", "series", _] | ["api", "books", _] => "GET, PATCH, DELETE",
        ["api", "books", _, "follow" | "favorite"] => "POST",
        ["api", "books", _, "chapters" | "characters"] => "GET, POST",
        ["api", "books", _, "chapters", "order"] => "PUT",
        ["api", "chapters", _] | ["api", "characters", _] => "GET, PATCH, DELETE",
        ["api", "chapters", _, "favorite" | "read"] => "POST",
        ["api", "chapters", _, "comments"] => "GET, POST",
        ["api", "comments", _] => "PATCH, DELETE",
        _ => return None,
    };
    Some(allowed)
}

/// Dispatch a collected request
pub async fn route(req: ApiRequest, state: Arc<AppState>) -> ApiResponse {
    if req.method == Method::OPTIONS {
        return preflight_response();
    }

    let path = req.path.clone();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let state = &*state;

    let result = match (req.method.clone(), segments.as_slice()) {
        (Method::GET, ["health"]) => Ok(health_check(state).await),

        // Sessions
        (Method::POST, ["api", "auth", "register"]) => auth_routes::handle_register(&req, state).await,
        (Method::POST, ["api", "auth", "login"]) => auth_routes::handle_login(&req, state).await,
        (Method::POST, ["api", "auth", "refresh"]) => auth_routes::handle_refresh(&req, state).await,
        (Method::POST, ["api", "auth", "logout-all"]) => auth_routes::handle_logout_all(&req, state).await,
        (Method::GET, ["api", "auth", "me"]) => auth_routes::handle_me(&req, state).await,

        // Users
        (Method::PATCH, ["api", "users", "me"]) => users::handle_update_profile(&req, state).await,
        (Method::POST, ["api", "users", "me", "reading-test"]) => users::handle_reading_test(&req, state).await,
        (Method::POST, ["api", "users", "me", "author"]) => users::handle_become_author(&req, state).await,
        (Method::GET, ["api", "users", "me", "favorites"]) => users::handle_favorites(&req, state).await,
        (Method::PUT, ["api", "users", id, "roles"]) => users::handle_set_roles(&req, state, id).await,
        (Method::GET, ["api", "users", username]) => users::handle_profile(&req, state, username).await,

        // Series
        (Method::GET, ["api", "series"]) => series::handle_list(&req, state).await,
        (Method::POST, ["api", "series"]) => series::handle_create(&req, state).await,
        (Method::GET, ["api", "series", id]) => series::handle_get(&req, state, id).await,
        (Method::PATCH, ["api", "series", id]) => series::handle_update(&req, state, id).await,
        (Method::DELETE, ["api", "series", id]) => series::handle_delete(&req, state, id).await,

        // Books
        (Method::GET, ["api", "books"]) => books::handle_list(&req, state).await,
        (Method::POST, ["api", "books"]) => books::handle_create(&req, state).await,
        (Method::GET, ["api", "books", id]) => books::handle_get(&req, state, id).await,
        (Method::PATCH, ["api", "books", id]) => books::handle_update(&req, state, id).await,
        (Method::DELETE, ["api", "books", id]) => books::handle_delete(&req, state, id).await,
        (Method::POST, ["api", "books", id, "follow"]) => books::handle_follow(&req, state, id).await,
        (Method::POST, ["api", "books", id, "favorite"]) => books::handle_favorite(&req, state, id).await,
        (Method::GET, ["api", "books", id, "chapters"]) => chapters::handle_list(&req, state, id).await,
        (Method::POST, ["api", "books", id, "chapters"]) => chapters::handle_create(&req, state, id).await,
        (Method::PUT, ["api", "books", id, "chapters", "order"]) => chapters::handle_reorder(&req, state, id).await,
        (Method::GET, ["api", "books", id, "characters"]) => books::handle_list_characters(&req, state, id).await,
        (Method::POST, ["api", "books", id, "characters"]) => books::handle_create_character(&req, state, id).await,

        // Chapters and comments
        (Method::GET, ["api", "chapters", id]) => chapters::handle_get(&req, state, id).await,
        (Method::PATCH, ["api", "chapters", id]) => chapters::handle_update(&req, state, id).await,
        (Method::DELETE, ["api", "chapters", id]) => chapters::handle_delete(&req, state, id).await,
        (Method::POST, ["api", "chapters", id, "favorite"]) => chapters::handle_favorite(&req, state, id).await,
        (Method::POST, ["api", "chapters", id, "read"]) => chapters::handle_read(&req, state, id).await,
        (Method::GET, ["api", "chapters", id, "comments"]) => chapters::handle_list_comments(&req, state, id).await,
        (Method::POST, ["api", "chapters", id, "comments"]) => chapters::handle_create_comment(&req, state, id).await,
        (Method::PATCH, ["api", "comments", id]) => chapters::handle_update_comment(&req, state, id).await,
        (Method::DELETE, ["api", "comments", id]) => chapters::handle_delete_comment(&req, state, id).await,

        // Characters
        (Method::GET, ["api", "characters", id]) => books::handle_get_character(&req, state, id).await,
        (Method::PATCH, ["api", "characters", id]) => books::handle_update_character(&req, state, id).await,
        (Method::DELETE, ["api", "characters", id]) => books::handle_delete_character(&req, state, id).await,

        (_, shape) => {
            return match allowed_methods(shape) {
                Some(allowed) => method_not_allowed_response(allowed),
                None => not_found_response(&path),
            }
        }
    };

    result.unwrap_or_else(|err| error_response(&err))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router harness over the in-memory store

    use super::*;
    use crate::config::Args;
    use crate::db::MemoryStore;

    pub fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Args::for_tests(), Arc::new(MemoryStore::new())).unwrap())
    }

    pub async fn call(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let req = builder.body(Full::new(Bytes::from(body))).unwrap();

        let response = crate::server::handle_request(Arc::clone(state), req).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Register an account and return its token
    pub async fn register(state: &Arc<AppState>, username: &str) -> String {
        let (status, body) = call(
            state,
            Method::POST,
            "/api/auth/register",
            None,
            Some(serde_json::json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "long enough password",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Register an account with the AUTHOR role
    pub async fn register_author(state: &Arc<AppState>, username: &str) -> String {
        let token = register(state, username).await;
        let (status, _) = call(state, Method::POST, "/api/users/me/author", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        token
    }
}
