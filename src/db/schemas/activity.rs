//! Reader activity records: follows, favorites and reads

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

/// Collection name for activity records
pub const ACTIVITY_COLLECTION: &str = "activities";

/// Kind of (user, target) relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    /// Target is a book
    BookFollow,
    /// Target is a book
    FavoriteBook,
    /// Target is a chapter
    FavoriteChapter,
    /// Target is a chapter
    ChapterRead,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::BookFollow => "BOOK_FOLLOW",
            ActivityKind::FavoriteBook => "FAVORITE_BOOK",
            ActivityKind::FavoriteChapter => "FAVORITE_CHAPTER",
            ActivityKind::ChapterRead => "CHAPTER_READ",
        }
    }

    /// Whether the target of this kind is a book (otherwise a chapter)
    pub fn targets_book(&self) -> bool {
        matches!(self, ActivityKind::BookFollow | ActivityKind::FavoriteBook)
    }
}

/// One (kind, user, target) record; unique per triple
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ActivityDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub metadata: Metadata,

    pub kind: ActivityKind,

    pub user_id: ObjectId,

    pub target_id: ObjectId,
}

impl ActivityDoc {
    pub fn new(kind: ActivityKind, user_id: ObjectId, target_id: ObjectId) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            kind,
            user_id,
            target_id,
        }
    }
}

impl IntoIndexes for ActivityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "kind": 1, "user_id": 1, "target_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("kind_user_target_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "kind": 1, "target_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("kind_target_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
