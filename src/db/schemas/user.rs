//! User document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub metadata: Metadata,

    /// Unique handle used in profile URLs
    pub username: String,

    /// Unique, stored lowercased
    pub email: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub bio: Option<String>,

    /// Argon2 password hash
    pub password_hash: String,

    pub roles: Vec<Role>,

    /// Reading speed in words per minute
    pub wpm: u32,

    /// Incremented to invalidate every outstanding session token
    #[serde(default)]
    pub token_version: i32,
}

impl UserDoc {
    pub fn new(
        username: String,
        email: String,
        name: String,
        password_hash: String,
        wpm: u32,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            username,
            email,
            name,
            bio: None,
            password_hash,
            roles: vec![Role::User],
            wpm,
            token_version: 1,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
