//! Comment document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

/// Collection name for comments
pub const COMMENT_COLLECTION: &str = "comments";

/// Deepest allowed nesting level; top-level comments are depth 1
pub const MAX_COMMENT_DEPTH: i32 = 4;

/// Comment document
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CommentDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub metadata: Metadata,

    /// Public, unique identifier
    pub slug: String,

    pub content: String,

    /// 1 for top-level comments, parent depth + 1 for replies
    pub depth: i32,

    pub author_id: ObjectId,

    pub chapter_id: ObjectId,

    #[serde(default)]
    pub parent_id: Option<ObjectId>,
}

impl IntoIndexes for CommentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "slug": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("slug_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "chapter_id": 1, "parent_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("chapter_parent_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
