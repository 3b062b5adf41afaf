//! In-memory storage backend
//!
//! Used in dev mode when MongoDB is not configured and by the test suite.
//! Enforces the same unique constraints as the MongoDB indexes.

use async_trait::async_trait;
use bson::oid::ObjectId;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::schemas::{
    ActivityDoc, ActivityKind, BookDoc, ChapterDoc, CharacterDoc, CommentDoc, SeriesDoc, UserDoc,
};
use crate::db::store::{
    ActivityStore, BookQuery, BookStore, ChapterStore, CharacterStore, CommentStore, Page,
    SeriesStore, Store, UserStore,
};
use crate::types::{Result, WridersError};

#[derive(Default)]
struct Tables {
    users: HashMap<ObjectId, UserDoc>,
    series: HashMap<ObjectId, SeriesDoc>,
    books: HashMap<ObjectId, BookDoc>,
    chapters: HashMap<ObjectId, ChapterDoc>,
    characters: HashMap<ObjectId, CharacterDoc>,
    comments: HashMap<ObjectId, CommentDoc>,
    activities: HashMap<ObjectId, ActivityDoc>,
}

impl Tables {
    fn user_conflict(&self, user: &UserDoc) -> Option<&'static str> {
        self.users.values().find_map(|u| {
            if u.id == user.id {
                None
            } else if u.username == user.username {
                Some("Username already taken")
            } else if u.email == user.email {
                Some("Email already registered")
            } else {
                None
            }
        })
    }

    fn chapter_order_taken(&self, chapter: &ChapterDoc) -> bool {
        self.chapters
            .values()
            .any(|c| c.id != chapter.id && c.book_id == chapter.book_id && c.order == chapter.order)
    }

    fn book_orders_unique(&self, book_id: ObjectId) -> bool {
        let mut seen = HashSet::new();
        self.chapters
            .values()
            .filter(|c| c.book_id == book_id)
            .all(|c| seen.insert(c.order))
    }

    fn remove_activity_for(&mut self, target_id: ObjectId) {
        self.activities.retain(|_, a| a.target_id != target_id);
    }

    fn remove_chapter_cascade(&mut self, chapter_id: ObjectId) -> bool {
        let removed = self.chapters.remove(&chapter_id).is_some();
        if removed {
            self.comments.retain(|_, c| c.chapter_id != chapter_id);
            self.remove_activity_for(chapter_id);
        }
        removed
    }
}

/// In-process store behind a single lock
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(what: &str) -> WridersError {
    WridersError::not_found(what)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: UserDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        if let Some(msg) = t.user_conflict(&user) {
            return Err(WridersError::Conflict(msg.into()));
        }
        t.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: ObjectId) -> Result<Option<UserDoc>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_users(&self, ids: &[ObjectId]) -> Result<Vec<UserDoc>> {
        let t = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| t.users.get(id).cloned()).collect())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDoc>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn replace_user(&self, user: &UserDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user.id) {
            return Err(missing("User"));
        }
        if let Some(msg) = t.user_conflict(user) {
            return Err(WridersError::Conflict(msg.into()));
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    async fn insert_series(&self, series: SeriesDoc) -> Result<()> {
        self.tables.write().await.series.insert(series.id, series);
        Ok(())
    }

    async fn get_series(&self, id: ObjectId) -> Result<Option<SeriesDoc>> {
        Ok(self.tables.read().await.series.get(&id).cloned())
    }

    async fn replace_series(&self, series: &SeriesDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        match t.series.get_mut(&series.id) {
            Some(existing) => {
                *existing = series.clone();
                Ok(())
            }
            None => Err(missing("Series")),
        }
    }

    async fn delete_series(&self, id: ObjectId) -> Result<bool> {
        let mut t = self.tables.write().await;
        if t.series.remove(&id).is_none() {
            return Ok(false);
        }
        for book in t.books.values_mut().filter(|b| b.series_id == Some(id)) {
            book.series_id = None;
        }
        Ok(true)
    }

    async fn list_series(&self, author_id: Option<ObjectId>) -> Result<Vec<SeriesDoc>> {
        let t = self.tables.read().await;
        let mut items: Vec<SeriesDoc> = t
            .series
            .values()
            .filter(|s| author_id.map_or(true, |a| s.author_id == a))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(items)
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn insert_book(&self, book: BookDoc) -> Result<()> {
        self.tables.write().await.books.insert(book.id, book);
        Ok(())
    }

    async fn get_book(&self, id: ObjectId) -> Result<Option<BookDoc>> {
        Ok(self.tables.read().await.books.get(&id).cloned())
    }

    async fn get_books(&self, ids: &[ObjectId]) -> Result<Vec<BookDoc>> {
        let t = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| t.books.get(id).cloned()).collect())
    }

    async fn replace_book(&self, book: &BookDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        match t.books.get_mut(&book.id) {
            Some(existing) => {
                *existing = book.clone();
                Ok(())
            }
            None => Err(missing("Book")),
        }
    }

    async fn delete_book(&self, id: ObjectId) -> Result<bool> {
        let mut t = self.tables.write().await;
        if t.books.remove(&id).is_none() {
            return Ok(false);
        }
        let chapter_ids: Vec<ObjectId> = t
            .chapters
            .values()
            .filter(|c| c.book_id == id)
            .map(|c| c.id)
            .collect();
        for chapter_id in &chapter_ids {
            t.remove_chapter_cascade(*chapter_id);
        }
        t.characters.retain(|_, c| c.book_id != id);
        t.remove_activity_for(id);
        debug!(book = %id, chapters = chapter_ids.len(), "Deleted book from memory store");
        Ok(true)
    }

    async fn list_books(&self, query: &BookQuery) -> Result<Page<BookDoc>> {
        let t = self.tables.read().await;
        let mut matches: Vec<&BookDoc> = t
            .books
            .values()
            .filter(|b| query.author_id.map_or(true, |a| b.author_id == a))
            .filter(|b| query.series_id.map_or(true, |s| b.series_id == Some(s)))
            .filter(|b| query.scope.admits(b))
            .collect();
        matches.sort_by(|a, b| {
            b.metadata
                .created_at
                .cmp(&a.metadata.created_at)
                .then(b.id.cmp(&a.id))
        });

        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }
}

#[async_trait]
impl ChapterStore for MemoryStore {
    async fn insert_chapter(&self, chapter: ChapterDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.chapter_order_taken(&chapter) {
            return Err(WridersError::Conflict(format!(
                "Chapter order {} already used in this book",
                chapter.order
            )));
        }
        t.chapters.insert(chapter.id, chapter);
        Ok(())
    }

    async fn get_chapter(&self, id: ObjectId) -> Result<Option<ChapterDoc>> {
        Ok(self.tables.read().await.chapters.get(&id).cloned())
    }

    async fn get_chapters(&self, ids: &[ObjectId]) -> Result<Vec<ChapterDoc>> {
        let t = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| t.chapters.get(id).cloned()).collect())
    }

    async fn replace_chapter(&self, chapter: &ChapterDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        if !t.chapters.contains_key(&chapter.id) {
            return Err(missing("Chapter"));
        }
        if t.chapter_order_taken(chapter) {
            return Err(WridersError::Conflict(format!(
                "Chapter order {} already used in this book",
                chapter.order
            )));
        }
        t.chapters.insert(chapter.id, chapter.clone());
        Ok(())
    }

    async fn delete_chapter(&self, id: ObjectId) -> Result<bool> {
        Ok(self.tables.write().await.remove_chapter_cascade(id))
    }

    async fn list_chapters(&self, book_id: ObjectId) -> Result<Vec<ChapterDoc>> {
        let t = self.tables.read().await;
        let mut chapters: Vec<ChapterDoc> = t
            .chapters
            .values()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.order);
        Ok(chapters)
    }

    async fn reorder_chapters(&self, book_id: ObjectId, orders: &[(ObjectId, i32)]) -> Result<()> {
        let mut t = self.tables.write().await;

        for (id, _) in orders {
            match t.chapters.get(id) {
                Some(c) if c.book_id == book_id => {}
                _ => return Err(missing("Chapter")),
            }
        }

        let snapshot: Vec<(ObjectId, i32)> = orders
            .iter()
            .filter_map(|(id, _)| t.chapters.get(id).map(|c| (*id, c.order)))
            .collect();

        let passes: [Vec<(ObjectId, i32)>; 2] = [
            orders
                .iter()
                .enumerate()
                .map(|(index, (id, _))| (*id, -(index as i32 + 1)))
                .collect(),
            orders.to_vec(),
        ];

        for pass in passes.iter() {
            for (id, order) in pass {
                if let Some(chapter) = t.chapters.get_mut(id) {
                    chapter.order = *order;
                }
            }
            if !t.book_orders_unique(book_id) {
                for (id, order) in &snapshot {
                    if let Some(chapter) = t.chapters.get_mut(id) {
                        chapter.order = *order;
                    }
                }
                return Err(WridersError::Conflict(
                    "Chapter order collides with an existing chapter".into(),
                ));
            }
        }

        let now = bson::DateTime::now();
        for (id, _) in orders {
            if let Some(chapter) = t.chapters.get_mut(id) {
                chapter.metadata.updated_at = now;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn insert_character(&self, character: CharacterDoc) -> Result<()> {
        self.tables
            .write()
            .await
            .characters
            .insert(character.id, character);
        Ok(())
    }

    async fn get_character(&self, id: ObjectId) -> Result<Option<CharacterDoc>> {
        Ok(self.tables.read().await.characters.get(&id).cloned())
    }

    async fn replace_character(&self, character: &CharacterDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        match t.characters.get_mut(&character.id) {
            Some(existing) => {
                *existing = character.clone();
                Ok(())
            }
            None => Err(missing("Character")),
        }
    }

    async fn delete_character(&self, id: ObjectId) -> Result<bool> {
        Ok(self.tables.write().await.characters.remove(&id).is_some())
    }

    async fn list_characters(&self, book_id: ObjectId) -> Result<Vec<CharacterDoc>> {
        let t = self.tables.read().await;
        let mut items: Vec<CharacterDoc> = t
            .characters
            .values()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(items)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(&self, comment: CommentDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.comments.values().any(|c| c.slug == comment.slug) {
            return Err(WridersError::Conflict("Comment slug already exists".into()));
        }
        t.comments.insert(comment.id, comment);
        Ok(())
    }

    async fn get_comment(&self, id: ObjectId) -> Result<Option<CommentDoc>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn replace_comment(&self, comment: &CommentDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        match t.comments.get_mut(&comment.id) {
            Some(existing) => {
                *existing = comment.clone();
                Ok(())
            }
            None => Err(missing("Comment")),
        }
    }

    async fn delete_comment(&self, id: ObjectId) -> Result<bool> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }

    async fn list_comments(&self, chapter_id: ObjectId) -> Result<Vec<CommentDoc>> {
        let t = self.tables.read().await;
        Ok(t.comments
            .values()
            .filter(|c| c.chapter_id == chapter_id)
            .cloned()
            .collect())
    }

    async fn count_replies(&self, comment_id: ObjectId) -> Result<u64> {
        let t = self.tables.read().await;
        Ok(t.comments
            .values()
            .filter(|c| c.parent_id == Some(comment_id))
            .count() as u64)
    }

    async fn count_comments(&self, chapter_id: ObjectId) -> Result<u64> {
        let t = self.tables.read().await;
        Ok(t.comments
            .values()
            .filter(|c| c.chapter_id == chapter_id)
            .count() as u64)
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn insert_activity(&self, activity: ActivityDoc) -> Result<()> {
        let mut t = self.tables.write().await;
        let duplicate = t.activities.values().any(|a| {
            a.kind == activity.kind
                && a.user_id == activity.user_id
                && a.target_id == activity.target_id
        });
        if duplicate {
            return Err(WridersError::Conflict(format!(
                "{} already recorded",
                activity.kind.as_str()
            )));
        }
        t.activities.insert(activity.id, activity);
        Ok(())
    }

    async fn delete_activity(
        &self,
        kind: ActivityKind,
        user_id: ObjectId,
        target_id: ObjectId,
    ) -> Result<bool> {
        let mut t = self.tables.write().await;
        let before = t.activities.len();
        t.activities
            .retain(|_, a| !(a.kind == kind && a.user_id == user_id && a.target_id == target_id));
        Ok(t.activities.len() != before)
    }

    async fn has_activity(
        &self,
        kind: ActivityKind,
        user_id: ObjectId,
        target_id: ObjectId,
    ) -> Result<bool> {
        let t = self.tables.read().await;
        Ok(t.activities
            .values()
            .any(|a| a.kind == kind && a.user_id == user_id && a.target_id == target_id))
    }

    async fn count_activity(&self, kind: ActivityKind, target_id: ObjectId) -> Result<u64> {
        let t = self.tables.read().await;
        Ok(t.activities
            .values()
            .filter(|a| a.kind == kind && a.target_id == target_id)
            .count() as u64)
    }

    async fn activity_targets(
        &self,
        kind: ActivityKind,
        user_id: ObjectId,
    ) -> Result<Vec<ObjectId>> {
        let t = self.tables.read().await;
        let mut records: Vec<&ActivityDoc> = t
            .activities
            .values()
            .filter(|a| a.kind == kind && a.user_id == user_id)
            .collect();
        records.sort_by(|a, b| {
            b.metadata
                .created_at
                .cmp(&a.metadata.created_at)
                .then(b.id.cmp(&a.id))
        });
        Ok(records.into_iter().map(|a| a.target_id).collect())
    }
}

impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }
}
