//! Timestamps shared by every document

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Creation and last-update timestamps
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Metadata {
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Metadata {
    /// Metadata stamped with the current time
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    /// Metadata stamped with a fixed time
    pub fn at(time: DateTime) -> Self {
        Self {
            created_at: time,
            updated_at: time,
        }
    }

    /// Mark the document as modified now
    pub fn touch(&mut self) {
        self.updated_at = DateTime::now();
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// RFC 3339 rendering used in API responses
pub fn rfc3339(time: DateTime) -> String {
    time.to_chrono().to_rfc3339()
}
