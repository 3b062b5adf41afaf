//! MongoDB client, typed collection wrapper and the MongoDB store backend

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, ClientSession, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::db::schemas::{
    ActivityDoc, ActivityKind, BookDoc, ChapterDoc, CharacterDoc, CommentDoc, SeriesDoc, UserDoc,
    ACTIVITY_COLLECTION, BOOK_COLLECTION, CHAPTER_COLLECTION, CHARACTER_COLLECTION,
    COMMENT_COLLECTION, SERIES_COLLECTION, USER_COLLECTION,
};
use crate::db::store::{
    ActivityStore, BookQuery, BookStore, ChapterStore, CharacterStore, CommentStore, Page,
    SeriesStore, Store, UserStore,
};
use crate::types::{Result, WridersError};

const DUPLICATE_KEY: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Map a driver error, turning unique index violations into `Conflict`
fn map_err(op: &str, conflict: &str, err: MongoError) -> WridersError {
    if is_duplicate_key(&err) {
        WridersError::Conflict(conflict.to_string())
    } else {
        WridersError::Database(format!("{op} failed: {err}"))
    }
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| WridersError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| WridersError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection with its indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub async fn start_session(&self) -> Result<ClientSession> {
        self.client
            .start_session()
            .await
            .map_err(|e| WridersError::Database(format!("Failed to start session: {}", e)))
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
{
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| WridersError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document; `conflict` is the message used on a unique violation
    pub async fn insert_one(&self, item: &T, conflict: &str) -> Result<()> {
        self.inner
            .insert_one(item)
            .await
            .map_err(|e| map_err("Insert", conflict, e))?;
        Ok(())
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| WridersError::Database(format!("Find failed: {}", e)))
    }

    /// Find documents by filter with optional sort, skip and limit
    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
        skip: Option<u64>,
        limit: Option<i64>,
    ) -> Result<Vec<T>> {
        let mut find = self.inner.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        if let Some(skip) = skip {
            find = find.skip(skip);
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }

        let cursor = find
            .await
            .map_err(|e| WridersError::Database(format!("Find failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| WridersError::Database(format!("Cursor read failed: {}", e)))
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.inner
            .count_documents(filter)
            .await
            .map_err(|e| WridersError::Database(format!("Count failed: {}", e)))
    }

    /// Replace the document with the given id; false if nothing matched
    pub async fn replace_one(&self, id: ObjectId, item: &T, conflict: &str) -> Result<bool> {
        let result = self
            .inner
            .replace_one(doc! { "_id": id }, item)
            .await
            .map_err(|e| map_err("Replace", conflict, e))?;
        Ok(result.matched_count > 0)
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult> {
        self.inner
            .update_many(filter, update)
            .await
            .map_err(|e| WridersError::Database(format!("Update failed: {}", e)))
    }

    /// Update one document inside a session
    pub async fn update_one_in(
        &self,
        session: &mut ClientSession,
        filter: Document,
        update: Document,
        conflict: &str,
    ) -> Result<UpdateResult> {
        self.inner
            .update_one(filter, update)
            .session(session)
            .await
            .map_err(|e| map_err("Update", conflict, e))
    }

    pub async fn delete_one(&self, filter: Document) -> Result<bool> {
        let result = self
            .inner
            .delete_one(filter)
            .await
            .map_err(|e| WridersError::Database(format!("Delete failed: {}", e)))?;
        Ok(result.deleted_count > 0)
    }

    pub async fn delete_many(&self, filter: Document) -> Result<u64> {
        let result = self
            .inner
            .delete_many(filter)
            .await
            .map_err(|e| WridersError::Database(format!("Delete failed: {}", e)))?;
        Ok(result.deleted_count)
    }
}

/// Order fetched documents to match the requested ids, dropping misses
fn in_id_order<T>(ids: &[ObjectId], mut docs: Vec<T>, id_of: impl Fn(&T) -> ObjectId) -> Vec<T> {
    let mut ordered = Vec::with_capacity(docs.len());
    for id in ids {
        if let Some(pos) = docs.iter().position(|d| id_of(d) == *id) {
            ordered.push(docs.swap_remove(pos));
        }
    }
    ordered
}

fn newest_first() -> Document {
    doc! { "metadata.created_at": -1, "_id": -1 }
}

/// Store backed by MongoDB collections
pub struct MongoStore {
    client: MongoClient,
    users: MongoCollection<UserDoc>,
    series: MongoCollection<SeriesDoc>,
    books: MongoCollection<BookDoc>,
    chapters: MongoCollection<ChapterDoc>,
    characters: MongoCollection<CharacterDoc>,
    comments: MongoCollection<CommentDoc>,
    activities: MongoCollection<ActivityDoc>,
}

impl MongoStore {
    /// Connect and make sure every collection has its indexes
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = MongoClient::new(uri, db_name).await?;

        Ok(Self {
            users: client.collection(USER_COLLECTION).await?,
            series: client.collection(SERIES_COLLECTION).await?,
            books: client.collection(BOOK_COLLECTION).await?,
            chapters: client.collection(CHAPTER_COLLECTION).await?,
            characters: client.collection(CHARACTER_COLLECTION).await?,
            comments: client.collection(COMMENT_COLLECTION).await?,
            activities: client.collection(ACTIVITY_COLLECTION).await?,
            client,
        })
    }

    async fn delete_chapters_where(&self, filter: Document) -> Result<u64> {
        let ids: Vec<ObjectId> = self
            .chapters
            .find_many(filter, None, None, None)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        self.comments
            .delete_many(doc! { "chapter_id": { "$in": ids.clone() } })
            .await?;
        self.activities
            .delete_many(doc! { "target_id": { "$in": ids.clone() } })
            .await?;
        self.chapters
            .delete_many(doc! { "_id": { "$in": ids } })
            .await
    }

    async fn run_reorder(
        &self,
        session: &mut ClientSession,
        book_id: ObjectId,
        orders: &[(ObjectId, i32)],
    ) -> Result<()> {
        const CONFLICT: &str = "Chapter order collides with an existing chapter";

        for (index, (id, _)) in orders.iter().enumerate() {
            let staged = -(index as i32 + 1);
            let result = self
                .chapters
                .update_one_in(
                    session,
                    doc! { "_id": *id, "book_id": book_id },
                    doc! { "$set": { "order": staged } },
                    CONFLICT,
                )
                .await?;
            if result.matched_count == 0 {
                return Err(WridersError::not_found("Chapter"));
            }
        }

        let now = DateTime::now();
        for (id, order) in orders {
            self.chapters
                .update_one_in(
                    session,
                    doc! { "_id": *id, "book_id": book_id },
                    doc! { "$set": { "order": *order, "metadata.updated_at": now } },
                    CONFLICT,
                )
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn insert_user(&self, user: UserDoc) -> Result<()> {
        self.users
            .insert_one(&user, "Username or email already registered")
            .await
    }

    async fn get_user(&self, id: ObjectId) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "_id": id }).await
    }

    async fn get_users(&self, ids: &[ObjectId]) -> Result<Vec<UserDoc>> {
        let docs = self
            .users
            .find_many(doc! { "_id": { "$in": ids.to_vec() } }, None, None, None)
            .await?;
        Ok(in_id_order(ids, docs, |u| u.id))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "username": username }).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "email": email }).await
    }

    async fn replace_user(&self, user: &UserDoc) -> Result<()> {
        if self
            .users
            .replace_one(user.id, user, "Username or email already registered")
            .await?
        {
            Ok(())
        } else {
            Err(WridersError::not_found("User"))
        }
    }
}

#[async_trait]
impl SeriesStore for MongoStore {
    async fn insert_series(&self, series: SeriesDoc) -> Result<()> {
        self.series.insert_one(&series, "Series already exists").await
    }

    async fn get_series(&self, id: ObjectId) -> Result<Option<SeriesDoc>> {
        self.series.find_one(doc! { "_id": id }).await
    }

    async fn replace_series(&self, series: &SeriesDoc) -> Result<()> {
        if self
            .series
            .replace_one(series.id, series, "Series already exists")
            .await?
        {
            Ok(())
        } else {
            Err(WridersError::not_found("Series"))
        }
    }

    async fn delete_series(&self, id: ObjectId) -> Result<bool> {
        if !self.series.delete_one(doc! { "_id": id }).await? {
            return Ok(false);
        }
        let detached = self
            .books
            .update_many(
                doc! { "series_id": id },
                doc! { "$set": { "series_id": null, "metadata.updated_at": DateTime::now() } },
            )
            .await?;
        debug!(series = %id, books = detached.modified_count, "Detached books from deleted series");
        Ok(true)
    }

    async fn list_series(&self, author_id: Option<ObjectId>) -> Result<Vec<SeriesDoc>> {
        let filter = match author_id {
            Some(author_id) => doc! { "author_id": author_id },
            None => doc! {},
        };
        self.series
            .find_many(filter, Some(doc! { "title": 1, "_id": 1 }), None, None)
            .await
    }
}

#[async_trait]
impl BookStore for MongoStore {
    async fn insert_book(&self, book: BookDoc) -> Result<()> {
        self.books.insert_one(&book, "Book already exists").await
    }

    async fn get_book(&self, id: ObjectId) -> Result<Option<BookDoc>> {
        self.books.find_one(doc! { "_id": id }).await
    }

    async fn get_books(&self, ids: &[ObjectId]) -> Result<Vec<BookDoc>> {
        let docs = self
            .books
            .find_many(doc! { "_id": { "$in": ids.to_vec() } }, None, None, None)
            .await?;
        Ok(in_id_order(ids, docs, |b| b.id))
    }

    async fn replace_book(&self, book: &BookDoc) -> Result<()> {
        if self.books.replace_one(book.id, book, "Book already exists").await? {
            Ok(())
        } else {
            Err(WridersError::not_found("Book"))
        }
    }

    async fn delete_book(&self, id: ObjectId) -> Result<bool> {
        if !self.books.delete_one(doc! { "_id": id }).await? {
            return Ok(false);
        }
        let chapters = self.delete_chapters_where(doc! { "book_id": id }).await?;
        self.characters.delete_many(doc! { "book_id": id }).await?;
        self.activities.delete_many(doc! { "target_id": id }).await?;
        debug!(book = %id, chapters, "Deleted book with dependents");
        Ok(true)
    }

    async fn list_books(&self, query: &BookQuery) -> Result<Page<BookDoc>> {
        let mut filter = query.scope.to_document();
        if let Some(author_id) = query.author_id {
            filter.insert("author_id", author_id);
        }
        if let Some(series_id) = query.series_id {
            filter.insert("series_id", series_id);
        }

        let total = self.books.count(filter.clone()).await?;
        let items = self
            .books
            .find_many(
                filter,
                Some(newest_first()),
                Some(query.skip),
                Some(query.limit as i64),
            )
            .await?;
        Ok(Page { items, total })
    }
}

#[async_trait]
impl ChapterStore for MongoStore {
    async fn insert_chapter(&self, chapter: ChapterDoc) -> Result<()> {
        let conflict = format!("Chapter order {} already used in this book", chapter.order);
        self.chapters.insert_one(&chapter, &conflict).await
    }

    async fn get_chapter(&self, id: ObjectId) -> Result<Option<ChapterDoc>> {
        self.chapters.find_one(doc! { "_id": id }).await
    }

    async fn get_chapters(&self, ids: &[ObjectId]) -> Result<Vec<ChapterDoc>> {
        let docs = self
            .chapters
            .find_many(doc! { "_id": { "$in": ids.to_vec() } }, None, None, None)
            .await?;
        Ok(in_id_order(ids, docs, |c| c.id))
    }

    async fn replace_chapter(&self, chapter: &ChapterDoc) -> Result<()> {
        let conflict = format!("Chapter order {} already used in this book", chapter.order);
        if self.chapters.replace_one(chapter.id, chapter, &conflict).await? {
            Ok(())
        } else {
            Err(WridersError::not_found("Chapter"))
        }
    }

    async fn delete_chapter(&self, id: ObjectId) -> Result<bool> {
        Ok(self.delete_chapters_where(doc! { "_id": id }).await? > 0)
    }

    async fn list_chapters(&self, book_id: ObjectId) -> Result<Vec<ChapterDoc>> {
        self.chapters
            .find_many(doc! { "book_id": book_id }, Some(doc! { "order": 1 }), None, None)
            .await
    }

    async fn reorder_chapters(&self, book_id: ObjectId, orders: &[(ObjectId, i32)]) -> Result<()> {
        let mut session = self.client.start_session().await?;
        session
            .start_transaction()
            .await
            .map_err(|e| WridersError::Database(format!("Failed to start transaction: {}", e)))?;

        match self.run_reorder(&mut session, book_id, orders).await {
            Ok(()) => session
                .commit_transaction()
                .await
                .map_err(|e| WridersError::Database(format!("Commit failed: {}", e))),
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    warn!(book = %book_id, "Failed to abort reorder transaction: {}", abort);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl CharacterStore for MongoStore {
    async fn insert_character(&self, character: CharacterDoc) -> Result<()> {
        self.characters
            .insert_one(&character, "Character already exists")
            .await
    }

    async fn get_character(&self, id: ObjectId) -> Result<Option<CharacterDoc>> {
        self.characters.find_one(doc! { "_id": id }).await
    }

    async fn replace_character(&self, character: &CharacterDoc) -> Result<()> {
        if self
            .characters
            .replace_one(character.id, character, "Character already exists")
            .await?
        {
            Ok(())
        } else {
            Err(WridersError::not_found("Character"))
        }
    }

    async fn delete_character(&self, id: ObjectId) -> Result<bool> {
        self.characters.delete_one(doc! { "_id": id }).await
    }

    async fn list_characters(&self, book_id: ObjectId) -> Result<Vec<CharacterDoc>> {
        self.characters
            .find_many(
                doc! { "book_id": book_id },
                Some(doc! { "name": 1, "_id": 1 }),
                None,
                None,
            )
            .await
    }
}

#[async_trait]
impl CommentStore for MongoStore {
    async fn insert_comment(&self, comment: CommentDoc) -> Result<()> {
        self.comments
            .insert_one(&comment, "Comment slug already exists")
            .await
    }

    async fn get_comment(&self, id: ObjectId) -> Result<Option<CommentDoc>> {
        self.comments.find_one(doc! { "_id": id }).await
    }

    async fn replace_comment(&self, comment: &CommentDoc) -> Result<()> {
        if self
            .comments
            .replace_one(comment.id, comment, "Comment slug already exists")
            .await?
        {
            Ok(())
        } else {
            Err(WridersError::not_found("Comment"))
        }
    }

    async fn delete_comment(&self, id: ObjectId) -> Result<bool> {
        self.comments.delete_one(doc! { "_id": id }).await
    }

    async fn list_comments(&self, chapter_id: ObjectId) -> Result<Vec<CommentDoc>> {
        self.comments
            .find_many(doc! { "chapter_id": chapter_id }, None, None, None)
            .await
    }

    async fn count_replies(&self, comment_id: ObjectId) -> Result<u64> {
        self.comments.count(doc! { "parent_id": comment_id }).await
    }

    async fn count_comments(&self, chapter_id: ObjectId) -> Result<u64> {
        self.comments.count(doc! { "chapter_id": chapter_id }).await
    }
}

#[async_trait]
impl ActivityStore for MongoStore {
    async fn insert_activity(&self, activity: ActivityDoc) -> Result<()> {
        let conflict = format!("{} already recorded", activity.kind.as_str());
        self.activities.insert_one(&activity, &conflict).await
    }

    async fn delete_activity(
        &self,
        kind: ActivityKind,
        user_id: ObjectId,
        target_id: ObjectId,
    ) -> Result<bool> {
        self.activities
            .delete_one(doc! { "kind": kind.as_str(), "user_id": user_id, "target_id": target_id })
            .await
    }

    async fn has_activity(
        &self,
        kind: ActivityKind,
        user_id: ObjectId,
        target_id: ObjectId,
    ) -> Result<bool> {
        let found = self
            .activities
            .find_one(doc! { "kind": kind.as_str(), "user_id": user_id, "target_id": target_id })
            .await?;
        Ok(found.is_some())
    }

    async fn count_activity(&self, kind: ActivityKind, target_id: ObjectId) -> Result<u64> {
        self.activities
            .count(doc! { "kind": kind.as_str(), "target_id": target_id })
            .await
    }

    async fn activity_targets(
        &self,
        kind: ActivityKind,
        user_id: ObjectId,
    ) -> Result<Vec<ObjectId>> {
        let records = self
            .activities
            .find_many(
                doc! { "kind": kind.as_str(), "user_id": user_id },
                Some(newest_first()),
                None,
                None,
            )
            .await?;
        Ok(records.into_iter().map(|a| a.target_id).collect())
    }
}

impl Store for MongoStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }
}
