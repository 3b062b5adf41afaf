//! Chapter document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::{Metadata, PublishStatus};

/// Collection name for chapters
pub const CHAPTER_COLLECTION: &str = "chapters";

/// Chapter document
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChapterDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub metadata: Metadata,

    pub book_id: ObjectId,

    pub title: String,

    /// HTML body produced by the editor
    #[serde(default)]
    pub content: String,

    pub status: PublishStatus,

    /// Position within the book, unique per book
    pub order: i32,

    /// First time the chapter became PUBLISHED
    #[serde(default)]
    pub published_at: Option<DateTime>,
}

impl ChapterDoc {
    pub fn new(book_id: ObjectId, title: String, content: String, order: i32) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            book_id,
            title,
            content,
            status: PublishStatus::Draft,
            order,
            published_at: None,
        }
    }

    /// Change status, stamping `published_at` on first publication
    pub fn set_status(&mut self, status: PublishStatus) {
        if status == PublishStatus::Published && self.published_at.is_none() {
            self.published_at = Some(DateTime::now());
        }
        self.status = status;
    }
}

impl IntoIndexes for ChapterDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "book_id": 1, "order": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("book_order_unique".to_string())
                    .build(),
            ),
        )]
    }
}
