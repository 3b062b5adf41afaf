//! Accounts, sessions and reader preferences

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{
    check_password_policy, hash_password, is_admin, normalize_roles, verify_password,
    JwtValidator, Role, TokenInput, Viewer,
};
use crate::db::schemas::{rfc3339, UserDoc};
use crate::db::{BookQuery, Store};
use crate::logging::{AuditEvent, EventType};
use crate::services::books::{book_views, scope_for, BookView};
use crate::services::MAX_PAGE_SIZE;
use crate::types::{Result, WridersError};

pub const MIN_WPM: u32 = 50;
pub const MAX_WPM: u32 = 1500;
const MAX_NAME_LEN: usize = 100;
const MAX_BIO_LEN: usize = 1000;
const INVALID_CREDENTIALS: &str = "Invalid username/email or password";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Normalized registration fields
pub struct Registration {
    pub username: String,
    pub email: String,
    pub name: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<Registration> {
        let username = check_username(&self.username)?;
        let email = check_email(&self.email)?;
        check_password_policy(&self.password)?;
        let name = match self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => check_name(name)?,
            None => username.clone(),
        };
        Ok(Registration {
            username,
            email,
            name,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub identifier: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() || self.password.is_empty() {
            return Err(WridersError::Validation(
                "identifier and password are required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// Empty string clears the bio
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub wpm: Option<u32>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(bio) = &self.bio {
            check_bio(bio)?;
        }
        if let Some(wpm) = self.wpm {
            check_wpm(wpm)?;
        }
        Ok(())
    }
}

/// Result of a timed reading sample
#[derive(Debug, Deserialize)]
pub struct ReadingTestRequest {
    pub words: u32,
    pub seconds: f64,
}

impl ReadingTestRequest {
    /// Measured speed, clamped to the accepted range
    pub fn validate(&self) -> Result<u32> {
        if self.words == 0 {
            return Err(WridersError::Validation("words must be positive".into()));
        }
        if !self.seconds.is_finite() || self.seconds <= 0.0 {
            return Err(WridersError::Validation(
                "seconds must be a positive number".into(),
            ));
        }
        let measured = (f64::from(self.words) * 60.0 / self.seconds).round();
        Ok(measured.clamp(f64::from(MIN_WPM), f64::from(MAX_WPM)) as u32)
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    pub roles: Vec<Role>,
}

/// The account as its owner sees it
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub roles: Vec<Role>,
    pub wpm: u32,
    pub created_at: String,
}

impl From<&UserDoc> for UserView {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            bio: user.bio.clone(),
            roles: user.roles.clone(),
            wpm: user.wpm,
            created_at: rfc3339(user.metadata.created_at),
        }
    }
}

/// The account as other people see it
#[derive(Debug, Serialize)]
pub struct PublicUserView {
    pub id: String,
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub roles: Vec<Role>,
    pub created_at: String,
}

impl From<&UserDoc> for PublicUserView {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username.clone(),
            name: user.name.clone(),
            bio: user.bio.clone(),
            roles: user.roles.clone(),
            created_at: rfc3339(user.metadata.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user: PublicUserView,
    /// Books by this user the viewer may see, newest first
    pub books: Vec<BookView>,
}

#[derive(Debug, Serialize)]
pub struct AuthView {
    pub token: String,
    /// Unix seconds
    pub expires_at: u64,
    pub user: UserView,
}

// =============================================================================
// Validation
// =============================================================================

fn check_username(raw: &str) -> Result<String> {
    let username = raw.trim();
    let valid_len = (3..=32).contains(&username.len());
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_len || !valid_chars {
        return Err(WridersError::Validation(
            "Username must be 3 to 32 letters, digits, '_' or '-'".into(),
        ));
    }
    Ok(username.to_string())
}

fn check_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(WridersError::Validation("Invalid email address".into()));
    }
    Ok(email)
}

fn check_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(WridersError::Validation(format!(
            "Name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn check_bio(raw: &str) -> Result<Option<String>> {
    let bio = raw.trim();
    if bio.chars().count() > MAX_BIO_LEN {
        return Err(WridersError::Validation(format!(
            "Bio must be at most {MAX_BIO_LEN} characters"
        )));
    }
    Ok((!bio.is_empty()).then(|| bio.to_string()))
}

fn check_wpm(wpm: u32) -> Result<()> {
    if !(MIN_WPM..=MAX_WPM).contains(&wpm) {
        return Err(WridersError::Validation(format!(
            "wpm must be between {MIN_WPM} and {MAX_WPM}"
        )));
    }
    Ok(())
}

// =============================================================================
// Sessions
// =============================================================================

fn issue_token(jwt: &JwtValidator, user: &UserDoc) -> Result<AuthView> {
    let (token, claims) = jwt.generate_token(TokenInput {
        user_id: user.id,
        username: user.username.clone(),
        token_version: user.token_version,
    })?;
    Ok(AuthView {
        token,
        expires_at: claims.exp,
        user: UserView::from(user),
    })
}

/// Resolve a bearer token to its user, rejecting revoked sessions
pub async fn authenticate(store: &dyn Store, jwt: &JwtValidator, token: &str) -> Result<UserDoc> {
    let result = jwt.verify_token(token);
    let claims = match (result.valid, result.claims) {
        (true, Some(claims)) => claims,
        _ => {
            return Err(WridersError::Unauthenticated(
                result.error.unwrap_or_else(|| "Invalid token".into()),
            ))
        }
    };

    let user_id = claims
        .user_id()
        .ok_or_else(|| WridersError::Unauthenticated("Invalid token".into()))?;
    let user = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| WridersError::Unauthenticated("Account no longer exists".into()))?;

    if user.token_version != claims.token_version {
        return Err(WridersError::Unauthenticated("Session revoked".into()));
    }
    Ok(user)
}

pub async fn register(
    store: &dyn Store,
    jwt: &JwtValidator,
    default_wpm: u32,
    req: RegisterRequest,
) -> Result<AuthView> {
    let fields = req.validate()?;

    if store.find_user_by_username(&fields.username).await?.is_some() {
        return Err(WridersError::Conflict("Username already taken".into()));
    }
    if store.find_user_by_email(&fields.email).await?.is_some() {
        return Err(WridersError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = UserDoc::new(
        fields.username,
        fields.email,
        fields.name,
        password_hash,
        default_wpm,
    );
    store.insert_user(user.clone()).await?;

    info!(user = %user.id, username = %user.username, "User registered");
    AuditEvent::new(EventType::UserRegistered)
        .with_user(user.id)
        .emit();

    issue_token(jwt, &user)
}

pub async fn login(store: &dyn Store, jwt: &JwtValidator, req: LoginRequest) -> Result<AuthView> {
    req.validate()?;
    let identifier = req.identifier.trim();

    let found = if identifier.contains('@') {
        store.find_user_by_email(&identifier.to_lowercase()).await?
    } else {
        store.find_user_by_username(identifier).await?
    };

    let Some(user) = found else {
        warn!("Login failed for unknown identifier");
        AuditEvent::new(EventType::LoginFailed).emit();
        return Err(WridersError::Unauthenticated(INVALID_CREDENTIALS.into()));
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user = %user.id, "Login failed: wrong password");
        AuditEvent::new(EventType::LoginFailed)
            .with_user(user.id)
            .emit();
        return Err(WridersError::Unauthenticated(INVALID_CREDENTIALS.into()));
    }

    AuditEvent::new(EventType::LoginSucceeded)
        .with_user(user.id)
        .emit();
    issue_token(jwt, &user)
}

/// Fresh token for an authenticated session
pub fn refresh(jwt: &JwtValidator, user: &UserDoc) -> Result<AuthView> {
    issue_token(jwt, user)
}

pub fn me(user: &UserDoc) -> UserView {
    UserView::from(user)
}

/// Invalidate every outstanding token of the user
pub async fn logout_all(store: &dyn Store, user: &UserDoc) -> Result<()> {
    let mut user = user.clone();
    user.token_version += 1;
    user.metadata.touch();
    store.replace_user(&user).await?;

    AuditEvent::new(EventType::SessionsRevoked)
        .with_user(user.id)
        .emit();
    Ok(())
}

// =============================================================================
// Profiles and preferences
// =============================================================================

pub async fn profile(store: &dyn Store, viewer: &Viewer, username: &str) -> Result<ProfileView> {
    let user = store
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| WridersError::not_found("User"))?;

    let query = BookQuery {
        scope: scope_for(store, viewer).await?,
        author_id: Some(user.id),
        series_id: None,
        skip: 0,
        limit: MAX_PAGE_SIZE,
    };
    let books = store.list_books(&query).await?;

    Ok(ProfileView {
        user: PublicUserView::from(&user),
        books: book_views(store, &books.items).await?,
    })
}

pub async fn update_profile(
    store: &dyn Store,
    user: &UserDoc,
    req: UpdateProfileRequest,
) -> Result<UserView> {
    req.validate()?;
    let mut user = user.clone();

    if let Some(name) = &req.name {
        user.name = check_name(name)?;
    }
    if let Some(bio) = &req.bio {
        user.bio = check_bio(bio)?;
    }
    if let Some(wpm) = req.wpm {
        user.wpm = wpm;
    }
    user.metadata.touch();
    store.replace_user(&user).await?;

    Ok(UserView::from(&user))
}

/// Store the reading speed measured by a timed sample
pub async fn reading_test(
    store: &dyn Store,
    user: &UserDoc,
    req: ReadingTestRequest,
) -> Result<UserView> {
    let wpm = req.validate()?;
    let mut user = user.clone();
    user.wpm = wpm;
    user.metadata.touch();
    store.replace_user(&user).await?;

    info!(user = %user.id, wpm, "Reading speed updated");
    Ok(UserView::from(&user))
}

/// Grant the AUTHOR role to oneself
pub async fn become_author(store: &dyn Store, user: &UserDoc) -> Result<UserView> {
    if user.has_role(Role::Author) {
        return Ok(UserView::from(user));
    }

    let mut user = user.clone();
    user.roles = normalize_roles(
        user.roles
            .iter()
            .copied()
            .chain(std::iter::once(Role::Author))
            .collect(),
    );
    user.metadata.touch();
    store.replace_user(&user).await?;

    AuditEvent::new(EventType::RolesChanged)
        .with_user(user.id)
        .with_entity("user", user.id)
        .with_metadata(serde_json::json!({ "roles": user.roles }))
        .emit();
    Ok(UserView::from(&user))
}

/// Replace another account's roles; administrators only
pub async fn set_roles(
    store: &dyn Store,
    admin: &UserDoc,
    target_id: ObjectId,
    req: SetRolesRequest,
) -> Result<UserView> {
    if !is_admin(&admin.roles) {
        return Err(WridersError::Forbidden(
            "Only administrators can change roles".into(),
        ));
    }

    let mut target = store
        .get_user(target_id)
        .await?
        .ok_or_else(|| WridersError::not_found("User"))?;
    target.roles = normalize_roles(req.roles);
    target.metadata.touch();
    store.replace_user(&target).await?;

    AuditEvent::new(EventType::RolesChanged)
        .with_user(admin.id)
        .with_entity("user", target.id)
        .with_metadata(serde_json::json!({ "roles": target.roles }))
        .emit();
    Ok(UserView::from(&target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserStore;
    use crate::db::schemas::{PublishStatus, Visibility};
    use crate::services::testing;

    fn register_req(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: "correct horse battery".into(),
            name: None,
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(register_req("ab", "a@b.c").validate().is_err());
        assert!(register_req(&"a".repeat(33), "a@b.c").validate().is_err());
        assert!(register_req("bad name", "a@b.c").validate().is_err());
        assert!(register_req("ada", "no-at-sign").validate().is_err());
        assert!(register_req("ada", "a@b@c").validate().is_err());
        assert!(register_req("ada", "@b.c").validate().is_err());

        let mut short = register_req("ada", "a@b.c");
        short.password = "short".into();
        assert!(short.validate().is_err());

        let fields = register_req("ada_L-1", " Ada@Example.COM ").validate().unwrap();
        assert_eq!(fields.email, "ada@example.com");
        assert_eq!(fields.name, "ada_L-1");
    }

    #[test]
    fn test_reading_test_math() {
        let req = ReadingTestRequest {
            words: 500,
            seconds: 120.0,
        };
        assert_eq!(req.validate().unwrap(), 250);

        let fast = ReadingTestRequest {
            words: 10_000,
            seconds: 1.0,
        };
        assert_eq!(fast.validate().unwrap(), MAX_WPM);

        let slow = ReadingTestRequest {
            words: 1,
            seconds: 60.0,
        };
        assert_eq!(slow.validate().unwrap(), MIN_WPM);

        let zero = ReadingTestRequest {
            words: 100,
            seconds: 0.0,
        };
        assert!(zero.validate().is_err());
    }

    #[tokio::test]
    async fn test_register_login_and_revoke() {
        let store = testing::store();
        let jwt = JwtValidator::new_dev();

        let registered = register(&store, &jwt, 250, register_req("ada", "ada@example.com"))
            .await
            .unwrap();
        assert_eq!(registered.user.roles, vec![Role::User]);
        assert_eq!(registered.user.wpm, 250);

        let err = register(&store, &jwt, 250, register_req("ada", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, WridersError::Conflict(_)));
        let err = register(&store, &jwt, 250, register_req("ada2", "ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, WridersError::Conflict(_)));

        let by_email = login(
            &store,
            &jwt,
            LoginRequest {
                identifier: "Ada@Example.com".into(),
                password: "correct horse battery".into(),
            },
        )
        .await
        .unwrap();
        let user = authenticate(&store, &jwt, &by_email.token).await.unwrap();
        assert_eq!(user.username, "ada");

        let err = login(
            &store,
            &jwt,
            LoginRequest {
                identifier: "ada".into(),
                password: "wrong password".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);

        logout_all(&store, &user).await.unwrap();
        let err = authenticate(&store, &jwt, &by_email.token).await.unwrap_err();
        assert!(matches!(err, WridersError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_profile_update_and_author_role() {
        let store = testing::store();
        let user = testing::user(&store, "reader", &[]).await;

        let req = UpdateProfileRequest {
            wpm: Some(20),
            ..Default::default()
        };
        assert!(update_profile(&store, &user, req).await.is_err());

        let req = UpdateProfileRequest {
            name: Some("Reader Person".into()),
            bio: Some("Likes serials".into()),
            wpm: Some(400),
        };
        let updated = update_profile(&store, &user, req).await.unwrap();
        assert_eq!(updated.wpm, 400);
        assert_eq!(updated.bio.as_deref(), Some("Likes serials"));

        let stored = store.get_user(user.id).await.unwrap().unwrap();
        let promoted = become_author(&store, &stored).await.unwrap();
        assert_eq!(promoted.roles, vec![Role::User, Role::Author]);
        let stored = store.get_user(user.id).await.unwrap().unwrap();
        let again = become_author(&store, &stored).await.unwrap();
        assert_eq!(again.roles, vec![Role::User, Role::Author]);
    }

    #[tokio::test]
    async fn test_set_roles_admin_only() {
        let store = testing::store();
        let admin = testing::user(&store, "admin", &[Role::Admin]).await;
        let target = testing::user(&store, "target", &[]).await;

        let req = || SetRolesRequest {
            roles: vec![Role::Editor],
        };
        let err = set_roles(&store, &target, admin.id, req()).await.unwrap_err();
        assert!(matches!(err, WridersError::Forbidden(_)));

        let updated = set_roles(&store, &admin, target.id, req()).await.unwrap();
        assert_eq!(updated.roles, vec![Role::User, Role::Editor]);

        let err = set_roles(&store, &admin, ObjectId::new(), req()).await.unwrap_err();
        assert!(matches!(err, WridersError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_public_profile_lists_visible_books() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        testing::book(&store, &author, PublishStatus::Published, Visibility::Public).await;
        testing::book(&store, &author, PublishStatus::Draft, Visibility::Public).await;

        let view = profile(&store, &Viewer::anonymous(), "writer").await.unwrap();
        assert_eq!(view.books.len(), 1);
        assert_eq!(view.user.username, "writer");

        let own = profile(&store, &Viewer::user(author.id), "writer").await.unwrap();
        assert_eq!(own.books.len(), 2);

        assert!(profile(&store, &Viewer::anonymous(), "ghost").await.is_err());
    }
}
