//! Chapters: writing, reading and ordering

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::auth::{can_manage_book, Viewer};
use crate::db::schemas::{rfc3339, ActivityKind, ChapterDoc, PublishStatus, UserDoc};
use crate::db::Store;
use crate::logging::{AuditEvent, EventType};
use crate::services::reading::{reading_minutes, word_count};
use crate::services::{
    check_title, load_managed_book, load_managed_chapter, load_visible_book,
    load_visible_chapter, parse_id, viewer_of,
};
use crate::types::{Result, WridersError};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateChapterRequest {
    pub title: String,
    /// HTML body
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: Option<PublishStatus>,
}

impl CreateChapterRequest {
    pub fn validate(&self) -> Result<String> {
        check_title(&self.title)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateChapterRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<PublishStatus>,
}

impl UpdateChapterRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChapterOrderEntry {
    pub id: String,
    pub order: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub chapters: Vec<ChapterOrderEntry>,
}

impl ReorderRequest {
    /// Parsed `(chapter id, order)` pairs
    pub fn validate(&self) -> Result<Vec<(ObjectId, i32)>> {
        if self.chapters.is_empty() {
            return Err(WridersError::Validation(
                "At least one chapter is required".into(),
            ));
        }

        let mut ids = HashSet::new();
        let mut orders = HashSet::new();
        let mut entries = Vec::with_capacity(self.chapters.len());
        for entry in &self.chapters {
            let id = parse_id(&entry.id, "chapter")?;
            if entry.order < 1 {
                return Err(WridersError::Validation(
                    "Chapter order must be at least 1".into(),
                ));
            }
            if !ids.insert(id) {
                return Err(WridersError::Validation(format!(
                    "Duplicate chapter id {}",
                    entry.id
                )));
            }
            if !orders.insert(entry.order) {
                return Err(WridersError::Validation(format!(
                    "Duplicate chapter order {}",
                    entry.order
                )));
            }
            entries.push((id, entry.order));
        }
        Ok(entries)
    }
}

/// Chapter as listed in a book's table of contents
#[derive(Debug, Clone, Serialize)]
pub struct ChapterSummary {
    pub id: String,
    pub book_id: String,
    pub title: String,
    pub order: i32,
    pub status: PublishStatus,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ChapterDoc> for ChapterSummary {
    fn from(chapter: &ChapterDoc) -> Self {
        Self {
            id: chapter.id.to_hex(),
            book_id: chapter.book_id.to_hex(),
            title: chapter.title.clone(),
            order: chapter.order,
            status: chapter.status,
            published_at: chapter.published_at.map(rfc3339),
            created_at: rfc3339(chapter.metadata.created_at),
            updated_at: rfc3339(chapter.metadata.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChapterDetail {
    #[serde(flatten)]
    pub chapter: ChapterSummary,
    pub content: String,
    pub word_count: usize,
    pub reading_minutes: u32,
    pub read_count: u64,
    pub comment_count: u64,
    pub favorite_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    pub previous_id: Option<String>,
    pub next_id: Option<String>,
}

/// Chapters of a book the viewer may read, by ascending order
fn visible_chapters(
    viewer: &Viewer,
    book_author: ObjectId,
    chapters: Vec<ChapterDoc>,
) -> Vec<ChapterDoc> {
    if viewer.is(book_author) {
        return chapters;
    }
    chapters
        .into_iter()
        .filter(|c| c.status == PublishStatus::Published)
        .collect()
}

// =============================================================================
// Operations
// =============================================================================

/// Append a chapter after the book's last one
pub async fn create_chapter(
    store: &dyn Store,
    user: &UserDoc,
    book_id: ObjectId,
    req: CreateChapterRequest,
) -> Result<ChapterSummary> {
    let title = req.validate()?;
    let book = load_managed_book(store, &viewer_of(Some(user)), book_id).await?;

    let next_order = store
        .list_chapters(book.id)
        .await?
        .iter()
        .map(|c| c.order)
        .max()
        .map_or(Some(1), |max| max.checked_add(1))
        .ok_or_else(|| WridersError::Conflict("No chapter position left after the last chapter".into()))?;

    let mut chapter = ChapterDoc::new(book.id, title, req.content, next_order);
    if let Some(status) = req.status {
        chapter.set_status(status);
    }
    store.insert_chapter(chapter.clone()).await?;

    AuditEvent::new(EventType::ContentCreated)
        .with_user(user.id)
        .with_entity("chapter", chapter.id)
        .emit();

    Ok(ChapterSummary::from(&chapter))
}

pub async fn list_chapters(
    store: &dyn Store,
    viewer: &Viewer,
    book_id: ObjectId,
) -> Result<Vec<ChapterSummary>> {
    let book = load_visible_book(store, viewer, book_id).await?;
    let chapters = store.list_chapters(book.id).await?;

    Ok(visible_chapters(viewer, book.author_id, chapters)
        .iter()
        .map(ChapterSummary::from)
        .collect())
}

/// Chapter with reading time at `wpm` and reader counters
pub async fn get_chapter(
    store: &dyn Store,
    viewer: &Viewer,
    wpm: u32,
    chapter_id: ObjectId,
) -> Result<ChapterDetail> {
    let (book, chapter) = load_visible_chapter(store, viewer, chapter_id).await?;

    let siblings = visible_chapters(viewer, book.author_id, store.list_chapters(book.id).await?);
    let position = siblings.iter().position(|c| c.id == chapter.id);
    let previous_id = position
        .and_then(|p| p.checked_sub(1))
        .and_then(|p| siblings.get(p))
        .map(|c| c.id.to_hex());
    let next_id = position
        .and_then(|p| siblings.get(p + 1))
        .map(|c| c.id.to_hex());

    let (is_read, is_favorite) = match viewer.id() {
        Some(user_id) => (
            Some(
                store
                    .has_activity(ActivityKind::ChapterRead, user_id, chapter.id)
                    .await?,
            ),
            Some(
                store
                    .has_activity(ActivityKind::FavoriteChapter, user_id, chapter.id)
                    .await?,
            ),
        ),
        None => (None, None),
    };

    let words = word_count(&chapter.content);
    Ok(ChapterDetail {
        chapter: ChapterSummary::from(&chapter),
        word_count: words,
        reading_minutes: reading_minutes(words, wpm),
        read_count: store
            .count_activity(ActivityKind::ChapterRead, chapter.id)
            .await?,
        comment_count: store.count_comments(chapter.id).await?,
        favorite_count: store
            .count_activity(ActivityKind::FavoriteChapter, chapter.id)
            .await?,
        is_read,
        is_favorite,
        previous_id,
        next_id,
        content: chapter.content,
    })
}

pub async fn update_chapter(
    store: &dyn Store,
    user: &UserDoc,
    chapter_id: ObjectId,
    req: UpdateChapterRequest,
) -> Result<ChapterSummary> {
    req.validate()?;
    let (_, mut chapter) = load_managed_chapter(store, &viewer_of(Some(user)), chapter_id).await?;

    if let Some(title) = &req.title {
        chapter.title = check_title(title)?;
    }
    if let Some(content) = req.content {
        chapter.content = content;
    }
    if let Some(status) = req.status {
        chapter.set_status(status);
    }
    chapter.metadata.touch();
    store.replace_chapter(&chapter).await?;

    AuditEvent::new(EventType::ContentUpdated)
        .with_user(user.id)
        .with_entity("chapter", chapter.id)
        .emit();

    Ok(ChapterSummary::from(&chapter))
}

/// Delete a chapter with its comments and reader activity
pub async fn delete_chapter(store: &dyn Store, user: &UserDoc, chapter_id: ObjectId) -> Result<()> {
    let (_, chapter) = load_managed_chapter(store, &viewer_of(Some(user)), chapter_id).await?;
    if !store.delete_chapter(chapter.id).await? {
        return Err(WridersError::not_found("Chapter"));
    }

    AuditEvent::new(EventType::ContentDeleted)
        .with_user(user.id)
        .with_entity("chapter", chapter.id)
        .emit();
    Ok(())
}

/// Assign new orders to chapters of a book in one atomic step
pub async fn reorder_chapters(
    store: &dyn Store,
    user: &UserDoc,
    book_id: ObjectId,
    req: ReorderRequest,
) -> Result<Vec<ChapterSummary>> {
    let entries = req.validate()?;
    let viewer = viewer_of(Some(user));
    let book = load_visible_book(store, &viewer, book_id).await?;
    if !can_manage_book(&viewer, &book) {
        return Err(WridersError::Forbidden(
            "Only the author can reorder chapters".into(),
        ));
    }

    let ids: Vec<ObjectId> = entries.iter().map(|(id, _)| *id).collect();
    let found = store.get_chapters(&ids).await?;
    for (id, _) in &entries {
        let belongs = found.iter().any(|c| c.id == *id && c.book_id == book.id);
        if !belongs {
            return Err(WridersError::Validation(format!(
                "Chapter {} does not belong to this book",
                id.to_hex()
            )));
        }
    }

    store.reorder_chapters(book.id, &entries).await?;
    info!(book = %book.id, chapters = entries.len(), "Chapters reordered");

    AuditEvent::new(EventType::ChaptersReordered)
        .with_user(user.id)
        .with_entity("book", book.id)
        .with_metadata(serde_json::json!({ "chapters": entries.len() }))
        .emit();

    Ok(store
        .list_chapters(book.id)
        .await?
        .iter()
        .map(ChapterSummary::from)
        .collect())
}
