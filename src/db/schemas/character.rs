//! Character document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

/// Collection name for characters
pub const CHARACTER_COLLECTION: &str = "characters";

/// A character appearing in a book
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CharacterDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub metadata: Metadata,

    pub book_id: ObjectId,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Free-form role in the story, e.g. "protagonist"
    #[serde(default)]
    pub role: Option<String>,
}

impl IntoIndexes for CharacterDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "book_id": 1, "name": 1 },
            Some(
                IndexOptions::builder()
                    .name("book_name_index".to_string())
                    .build(),
            ),
        )]
    }
}
