//! Series document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

/// Collection name for series
pub const SERIES_COLLECTION: &str = "series";

/// A named group of books by one author
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SeriesDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub metadata: Metadata,

    pub author_id: ObjectId,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,
}

impl IntoIndexes for SeriesDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "author_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("author_index".to_string())
                    .build(),
            ),
        )]
    }
}
