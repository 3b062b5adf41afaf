//! Storage traits
//!
//! Services talk to storage only through these traits, which lets the
//! MongoDB backend be swapped for the in-memory one in dev mode and tests.
//! Unique-constraint violations are reported as `WridersError::Conflict`.

use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::auth::BookScope;
use crate::db::schemas::{
    ActivityDoc, ActivityKind, BookDoc, ChapterDoc, CharacterDoc, CommentDoc, SeriesDoc, UserDoc,
};
use crate::types::Result;

/// Filter and page for book listings
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    /// Visibility scope of the requester
    pub scope: BookScope,
    pub author_id: Option<ObjectId>,
    pub series_id: Option<ObjectId>,
    pub skip: u64,
    pub limit: u64,
}

/// One page of results with the total match count
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: UserDoc) -> Result<()>;
    async fn get_user(&self, id: ObjectId) -> Result<Option<UserDoc>>;
    async fn get_users(&self, ids: &[ObjectId]) -> Result<Vec<UserDoc>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDoc>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>>;
    /// Replace a stored user; `NotFound` if it does not exist
    async fn replace_user(&self, user: &UserDoc) -> Result<()>;
}

#[async_trait]
pub trait SeriesStore: Send + Sync {
    async fn insert_series(&self, series: SeriesDoc) -> Result<()>;
    async fn get_series(&self, id: ObjectId) -> Result<Option<SeriesDoc>>;
    async fn replace_series(&self, series: &SeriesDoc) -> Result<()>;
    /// Delete a series and detach its books
    async fn delete_series(&self, id: ObjectId) -> Result<bool>;
    async fn list_series(&self, author_id: Option<ObjectId>) -> Result<Vec<SeriesDoc>>;
}

#[async_trait]
pub trait BookStore: Send + Sync {
    async fn insert_book(&self, book: BookDoc) -> Result<()>;
    async fn get_book(&self, id: ObjectId) -> Result<Option<BookDoc>>;
    async fn get_books(&self, ids: &[ObjectId]) -> Result<Vec<BookDoc>>;
    async fn replace_book(&self, book: &BookDoc) -> Result<()>;
    /// Delete a book with its chapters (and their comments and activity),
    /// characters and book activity
    async fn delete_book(&self, id: ObjectId) -> Result<bool>;
    /// Newest first
    async fn list_books(&self, query: &BookQuery) -> Result<Page<BookDoc>>;
}

#[async_trait]
pub trait ChapterStore: Send + Sync {
    async fn insert_chapter(&self, chapter: ChapterDoc) -> Result<()>;
    async fn get_chapter(&self, id: ObjectId) -> Result<Option<ChapterDoc>>;
    async fn get_chapters(&self, ids: &[ObjectId]) -> Result<Vec<ChapterDoc>>;
    async fn replace_chapter(&self, chapter: &ChapterDoc) -> Result<()>;
    /// Delete a chapter with its comments and activity
    async fn delete_chapter(&self, id: ObjectId) -> Result<bool>;
    /// All chapters of a book by ascending order
    async fn list_chapters(&self, book_id: ObjectId) -> Result<Vec<ChapterDoc>>;
    /// Atomically assign new orders to chapters of one book.
    ///
    /// Runs in two passes, first moving every target to `-(index + 1)` and
    /// then to its requested order, so the per-book unique index on `order`
    /// never sees two chapters swapping into each other's slot.
    async fn reorder_chapters(&self, book_id: ObjectId, orders: &[(ObjectId, i32)]) -> Result<()>;
}

#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn insert_character(&self, character: CharacterDoc) -> Result<()>;
    async fn get_character(&self, id: ObjectId) -> Result<Option<CharacterDoc>>;
    async fn replace_character(&self, character: &CharacterDoc) -> Result<()>;
    async fn delete_character(&self, id: ObjectId) -> Result<bool>;
    /// Characters of a book by name
    async fn list_characters(&self, book_id: ObjectId) -> Result<Vec<CharacterDoc>>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(&self, comment: CommentDoc) -> Result<()>;
    async fn get_comment(&self, id: ObjectId) -> Result<Option<CommentDoc>>;
    async fn replace_comment(&self, comment: &CommentDoc) -> Result<()>;
    async fn delete_comment(&self, id: ObjectId) -> Result<bool>;
    /// Every comment of a chapter, any depth, unordered
    async fn list_comments(&self, chapter_id: ObjectId) -> Result<Vec<CommentDoc>>;
    async fn count_replies(&self, comment_id: ObjectId) -> Result<u64>;
    async fn count_comments(&self, chapter_id: ObjectId) -> Result<u64>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// `Conflict` if the (kind, user, target) triple already exists
    async fn insert_activity(&self, activity: ActivityDoc) -> Result<()>;
    async fn delete_activity(
        &self,
        kind: ActivityKind,
        user_id: ObjectId,
        target_id: ObjectId,
    ) -> Result<bool>;
    async fn has_activity(
        &self,
        kind: ActivityKind,
        user_id: ObjectId,
        target_id: ObjectId,
    ) -> Result<bool>;
    async fn count_activity(&self, kind: ActivityKind, target_id: ObjectId) -> Result<u64>;
    /// Targets of a user's records of one kind, most recent first
    async fn activity_targets(&self, kind: ActivityKind, user_id: ObjectId)
        -> Result<Vec<ObjectId>>;
}

/// Complete storage backend
pub trait Store:
    UserStore + SeriesStore + BookStore + ChapterStore + CharacterStore + CommentStore + ActivityStore
{
    /// Backend name for health reporting
    fn backend(&self) -> &'static str;
}
