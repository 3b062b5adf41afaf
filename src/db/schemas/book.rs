//! Book document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

/// Collection name for books
pub const BOOK_COLLECTION: &str = "books";

/// Publication status shared by books and chapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PublishStatus {
    #[default]
    Draft,
    /// Announced, not yet readable
    Soon,
    Published,
    Archived,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Draft => "DRAFT",
            PublishStatus::Soon => "SOON",
            PublishStatus::Published => "PUBLISHED",
            PublishStatus::Archived => "ARCHIVED",
        }
    }
}

/// Who may discover a non-draft book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    #[default]
    Public,
    /// Followers only
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "PUBLIC",
            Visibility::Private => "PRIVATE",
        }
    }
}

/// Book document
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BookDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub metadata: Metadata,

    pub author_id: ObjectId,

    #[serde(default)]
    pub series_id: Option<ObjectId>,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub cover_url: Option<String>,

    pub status: PublishStatus,

    pub visibility: Visibility,
}

impl BookDoc {
    pub fn new(author_id: ObjectId, title: String) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            author_id,
            series_id: None,
            title,
            description: None,
            cover_url: None,
            status: PublishStatus::Draft,
            visibility: Visibility::Public,
        }
    }
}

impl IntoIndexes for BookDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "author_id": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("author_recent_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "series_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("series_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "status": 1, "visibility": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_visibility_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
