//! Authentication and authorization for Wriders
//!
//! Provides:
//! - JWT session tokens
//! - Password hashing with Argon2
//! - Account roles
//! - Visibility and ownership rules for books, chapters and comments

pub mod access;
pub mod jwt;
pub mod password;
pub mod permissions;

pub use access::{
    can_manage_book, can_moderate_comment, can_view_book, can_view_chapter, BookScope, Viewer,
};
pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use password::{check_password_policy, hash_password, verify_password};
pub use permissions::{can_publish, is_admin, normalize_roles, Role};
