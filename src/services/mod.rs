//! Business operations for Wriders
//!
//! Each module owns one resource. Services take the store as `&dyn Store`,
//! validate request types before touching it, and return serializable views.

pub mod activity;
pub mod books;
pub mod chapters;
pub mod characters;
pub mod comments;
pub mod reading;
pub mod series;
pub mod users;

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::{can_manage_book, can_view_book, can_view_chapter, Viewer};
use crate::db::schemas::{ActivityKind, BookDoc, ChapterDoc, UserDoc};
use crate::db::Store;
use crate::types::{Result, WridersError};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Parse a hex ObjectId from a path or body field
pub fn parse_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| WridersError::Validation(format!("Invalid {what} id")))
}

/// Trimmed title of 1..=200 characters
pub fn check_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(WridersError::Validation("Title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(WridersError::Validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

/// Optional description; blank becomes `None`
pub fn check_description(raw: Option<&str>) -> Result<Option<String>> {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(WridersError::Validation(format!(
            "Description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(Some(text.to_string()))
}

/// Page selection from the query string
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(WridersError::Validation("page must be at least 1".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.limit) {
            return Err(WridersError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        match (self.page - 1).checked_mul(self.limit) {
            Some(skip) if skip <= i64::MAX as u64 => Ok(()),
            _ => Err(WridersError::Validation("page out of range".into())),
        }
    }

    /// Offset of the first item; only meaningful after `validate`
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// One page of a listing
#[derive(Debug, Serialize)]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Author attribution embedded in other views
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub name: String,
}

impl From<&UserDoc> for UserSummary {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username.clone(),
            name: user.name.clone(),
        }
    }
}

/// Summaries for a set of user ids
pub(crate) async fn user_summaries(
    store: &dyn Store,
    ids: &[ObjectId],
) -> Result<HashMap<ObjectId, UserSummary>> {
    let mut unique = ids.to_vec();
    unique.sort();
    unique.dedup();

    let users = store.get_users(&unique).await?;
    Ok(users.iter().map(|u| (u.id, UserSummary::from(u))).collect())
}

pub fn viewer_of(user: Option<&UserDoc>) -> Viewer {
    match user {
        Some(user) => Viewer::user(user.id),
        None => Viewer::anonymous(),
    }
}

/// Whether the viewer follows the book
pub(crate) async fn follows(store: &dyn Store, viewer: &Viewer, book_id: ObjectId) -> Result<bool> {
    match viewer.id() {
        Some(user_id) => {
            store
                .has_activity(ActivityKind::BookFollow, user_id, book_id)
                .await
        }
        None => Ok(false),
    }
}

/// Load a book the viewer may see. Invisible books are reported as missing.
pub(crate) async fn load_visible_book(
    store: &dyn Store,
    viewer: &Viewer,
    book_id: ObjectId,
) -> Result<BookDoc> {
    let book = store
        .get_book(book_id)
        .await?
        .ok_or_else(|| WridersError::not_found("Book"))?;

    if can_view_book(viewer, &book, follows(store, viewer, book.id).await?) {
        Ok(book)
    } else {
        Err(WridersError::not_found("Book"))
    }
}

/// Load a chapter and its book if the viewer may see the chapter
pub(crate) async fn load_visible_chapter(
    store: &dyn Store,
    viewer: &Viewer,
    chapter_id: ObjectId,
) -> Result<(BookDoc, ChapterDoc)> {
    let chapter = store
        .get_chapter(chapter_id)
        .await?
        .ok_or_else(|| WridersError::not_found("Chapter"))?;
    let book = store
        .get_book(chapter.book_id)
        .await?
        .ok_or_else(|| WridersError::not_found("Chapter"))?;

    let follows = follows(store, viewer, book.id).await?;
    if can_view_chapter(viewer, &book, &chapter, follows) {
        Ok((book, chapter))
    } else {
        Err(WridersError::not_found("Chapter"))
    }
}

/// Load a book the viewer may change: 404 if invisible, 403 if not the author
pub(crate) async fn load_managed_book(
    store: &dyn Store,
    viewer: &Viewer,
    book_id: ObjectId,
) -> Result<BookDoc> {
    let book = load_visible_book(store, viewer, book_id).await?;
    if !can_manage_book(viewer, &book) {
        return Err(WridersError::Forbidden(
            "Only the author can modify this book".into(),
        ));
    }
    Ok(book)
}

/// Load a chapter whose book the viewer authors
pub(crate) async fn load_managed_chapter(
    store: &dyn Store,
    viewer: &Viewer,
    chapter_id: ObjectId,
) -> Result<(BookDoc, ChapterDoc)> {
    let (book, chapter) = load_visible_chapter(store, viewer, chapter_id).await?;
    if !can_manage_book(viewer, &book) {
        return Err(WridersError::Forbidden(
            "Only the author can modify this chapter".into(),
        ));
    }
    Ok((book, chapter))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by service tests

    use super::*;
    use crate::auth::Role;
    use crate::db::schemas::{PublishStatus, Visibility};
    use crate::db::MemoryStore;

    pub fn store() -> MemoryStore {
        MemoryStore::new()
    }

    pub async fn user(store: &dyn Store, username: &str, roles: &[Role]) -> UserDoc {
        let mut user = UserDoc::new(
            username.to_string(),
            format!("{username}@example.com"),
            username.to_string(),
            "unused-hash".to_string(),
            250,
        );
        user.roles.extend_from_slice(roles);
        store.insert_user(user.clone()).await.unwrap();
        user
    }

    pub async fn author(store: &dyn Store, username: &str) -> UserDoc {
        user(store, username, &[Role::Author]).await
    }

    pub async fn book(
        store: &dyn Store,
        author: &UserDoc,
        status: PublishStatus,
        visibility: Visibility,
    ) -> BookDoc {
        let mut book = BookDoc::new(author.id, "A Serial".into());
        book.status = status;
        book.visibility = visibility;
        store.insert_book(book.clone()).await.unwrap();
        book
    }

    pub async fn chapter(
        store: &dyn Store,
        book: &BookDoc,
        order: i32,
        status: PublishStatus,
    ) -> ChapterDoc {
        let mut chapter = ChapterDoc::new(
            book.id,
            format!("Chapter {order}"),
            "<p>Once upon a time</p>".into(),
            order,
        );
        chapter.set_status(status);
        store.insert_chapter(chapter.clone()).await.unwrap();
        chapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_bounds() {
        assert!(check_title("   ").is_err());
        assert_eq!(check_title("  Dune ").unwrap(), "Dune");
        assert!(check_title(&"x".repeat(200)).is_ok());
        assert!(check_title(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_description_bounds() {
        assert_eq!(check_description(None).unwrap(), None);
        assert_eq!(check_description(Some("  ")).unwrap(), None);
        assert!(check_description(Some(&"y".repeat(5000))).is_ok());
        assert!(check_description(Some(&"y".repeat(5001))).is_err());
    }

    #[test]
    fn test_pagination() {
        let page = Pagination { page: 3, limit: 20 };
        assert!(page.validate().is_ok());
        assert_eq!(page.skip(), 40);

        assert!(Pagination { page: 0, limit: 20 }.validate().is_err());
        assert!(Pagination { page: 1, limit: 0 }.validate().is_err());
        assert!(Pagination { page: 1, limit: 101 }.validate().is_err());
        assert!(Pagination { page: 1, limit: 100 }.validate().is_ok());
    }

    #[test]
    fn test_pagination_rejects_huge_pages() {
        let huge = Pagination { page: u64::MAX, limit: 100 };
        let err = huge.validate().unwrap_err();
        assert!(matches!(err, WridersError::Validation(ref m) if m == "page out of range"));
        assert_eq!(huge.skip(), u64::MAX);

        let past_i64 = Pagination { page: (i64::MAX as u64) / 2, limit: 100 };
        assert!(past_i64.validate().is_err());

        let last = Pagination { page: (i64::MAX as u64) / 100 + 1, limit: 100 };
        assert!(last.validate().is_ok());
    }

    #[test]
    fn test_parse_id() {
        let id = ObjectId::new();
        assert_eq!(parse_id(&id.to_hex(), "book").unwrap(), id);
        let err = parse_id("nope", "book").unwrap_err();
        assert_eq!(err.to_string(), "Invalid book id");
    }
}
