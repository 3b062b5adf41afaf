//! Session tokens
//!
//! HS256 JWTs carrying the user id and the token version. The version lets a
//! user invalidate every outstanding session at once.

use bson::oid::ObjectId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::types::WridersError;

const ISSUER: &str = "wriders";

/// Claims embedded in a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id (hex ObjectId)
    pub sub: String,
    pub username: String,
    pub token_version: i32,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    /// Parse the subject back into an ObjectId
    pub fn user_id(&self) -> Option<ObjectId> {
        ObjectId::parse_str(&self.sub).ok()
    }
}

/// Input for token generation
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub user_id: ObjectId,
    pub username: String,
    pub token_version: i32,
}

/// Result of verifying a token
#[derive(Debug, Clone)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_seconds: u64,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("expiry_seconds", &self.expiry_seconds)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, WridersError> {
        if secret.is_empty() {
            return Err(WridersError::Auth("JWT secret cannot be empty".into()));
        }
        if expiry_seconds == 0 {
            return Err(WridersError::Auth("JWT expiry must be positive".into()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        })
    }

    /// Validator for development mode
    pub fn new_dev() -> Self {
        Self {
            encoding: EncodingKey::from_secret(b"dev-only-insecure-secret"),
            decoding: DecodingKey::from_secret(b"dev-only-insecure-secret"),
            expiry_seconds: 7 * 24 * 3600,
        }
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    /// Generate a token valid from now
    pub fn generate_token(&self, input: TokenInput) -> Result<(String, Claims), WridersError> {
        self.generate_token_at(input, now_secs())
    }

    fn generate_token_at(
        &self,
        input: TokenInput,
        issued_at: u64,
    ) -> Result<(String, Claims), WridersError> {
        let claims = Claims {
            sub: input.user_id.to_hex(),
            username: input.username,
            token_version: input.token_version,
            iss: ISSUER.to_string(),
            iat: issued_at,
            exp: issued_at + self.expiry_seconds,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| WridersError::Auth(format!("Failed to sign token: {e}")))?;

        Ok((token, claims))
    }

    /// Verify signature, issuer and expiry
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => TokenValidationResult {
                valid: true,
                claims: Some(data.claims),
                error: None,
            },
            Err(e) => {
                let message = match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token expired",
                    _ => "Invalid token",
                };
                TokenValidationResult {
                    valid: false,
                    claims: None,
                    error: Some(message.to_string()),
                }
            }
        }
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
