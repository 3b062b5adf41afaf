//! Database schemas for Wriders
//!
//! Document structures for users, series, books, chapters, characters,
//! comments and reader activity.

mod activity;
mod book;
mod chapter;
mod character;
mod comment;
mod metadata;
mod series;
mod user;

pub use activity::{ActivityDoc, ActivityKind, ACTIVITY_COLLECTION};
pub use book::{BookDoc, PublishStatus, Visibility, BOOK_COLLECTION};
pub use chapter::{ChapterDoc, CHAPTER_COLLECTION};
pub use character::{CharacterDoc, CHARACTER_COLLECTION};
pub use comment::{CommentDoc, COMMENT_COLLECTION, MAX_COMMENT_DEPTH};
pub use metadata::{rfc3339, Metadata};
pub use series::{SeriesDoc, SERIES_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
