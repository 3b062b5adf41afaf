//! Books: creation, discovery and management

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::{can_publish, BookScope, Viewer};
use crate::db::schemas::{
    rfc3339, ActivityKind, BookDoc, PublishStatus, UserDoc, Visibility,
};
use crate::db::{BookQuery, Store};
use crate::logging::{AuditEvent, EventType};
use crate::services::{
    check_description, check_title, load_managed_book, load_visible_book, parse_id,
    user_summaries, viewer_of, PageView, Pagination, UserSummary,
};
use crate::types::{Result, WridersError};

const MAX_URL_LEN: usize = 2048;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub status: Option<PublishStatus>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

/// Validated book fields
pub struct BookFields {
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub series_id: Option<ObjectId>,
}

impl CreateBookRequest {
    pub fn validate(&self) -> Result<BookFields> {
        Ok(BookFields {
            title: check_title(&self.title)?,
            description: check_description(self.description.as_deref())?,
            cover_url: check_cover_url(self.cover_url.as_deref())?,
            series_id: check_series_ref(self.series_id.as_deref())?,
        })
    }
}

/// Partial update. An empty string clears `description`, `cover_url` and
/// `series_id`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub status: Option<PublishStatus>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

impl UpdateBookRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        check_description(self.description.as_deref())?;
        check_cover_url(self.cover_url.as_deref())?;
        check_series_ref(self.series_id.as_deref())?;
        Ok(())
    }
}

fn check_cover_url(raw: Option<&str>) -> Result<Option<String>> {
    let Some(url) = raw.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    if url.len() > MAX_URL_LEN || !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(WridersError::Validation(
            "cover_url must be an http(s) URL".into(),
        ));
    }
    Ok(Some(url.to_string()))
}

fn check_series_ref(raw: Option<&str>) -> Result<Option<ObjectId>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => Ok(Some(parse_id(id, "series")?)),
        None => Ok(None),
    }
}

/// Query string of the book listing
#[derive(Debug, Default, Deserialize)]
pub struct BookListQuery {
    /// Author id or username
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl BookListQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub status: PublishStatus,
    pub visibility: Visibility,
    pub series_id: Option<String>,
    pub author: Option<UserSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl BookView {
    pub fn new(book: &BookDoc, author: Option<UserSummary>) -> Self {
        Self {
            id: book.id.to_hex(),
            title: book.title.clone(),
            description: book.description.clone(),
            cover_url: book.cover_url.clone(),
            status: book.status,
            visibility: book.visibility,
            series_id: book.series_id.map(|s| s.to_hex()),
            author,
            created_at: rfc3339(book.metadata.created_at),
            updated_at: rfc3339(book.metadata.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: BookView,
    pub chapter_count: usize,
    pub follower_count: u64,
    pub favorite_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

/// Book views with author summaries, preserving order
pub(crate) async fn book_views(store: &dyn Store, books: &[BookDoc]) -> Result<Vec<BookView>> {
    let author_ids: Vec<ObjectId> = books.iter().map(|b| b.author_id).collect();
    let authors = user_summaries(store, &author_ids).await?;
    Ok(books
        .iter()
        .map(|b| BookView::new(b, authors.get(&b.author_id).cloned()))
        .collect())
}

/// Listing scope for a viewer, including the books they follow
pub(crate) async fn scope_for(store: &dyn Store, viewer: &Viewer) -> Result<BookScope> {
    let followed = match viewer.id() {
        Some(user_id) => {
            store
                .activity_targets(ActivityKind::BookFollow, user_id)
                .await?
        }
        None => Vec::new(),
    };
    Ok(BookScope::new(*viewer, followed))
}

/// A series reference must name a series owned by the book's author
async fn check_series_owner(
    store: &dyn Store,
    author_id: ObjectId,
    series_id: Option<ObjectId>,
) -> Result<()> {
    let Some(series_id) = series_id else {
        return Ok(());
    };
    let series = store
        .get_series(series_id)
        .await?
        .ok_or_else(|| WridersError::not_found("Series"))?;
    if series.author_id != author_id {
        return Err(WridersError::Forbidden(
            "Series belongs to another author".into(),
        ));
    }
    Ok(())
}

// =============================================================================
// Operations
// =============================================================================

pub async fn create_book(
    store: &dyn Store,
    user: &UserDoc,
    req: CreateBookRequest,
) -> Result<BookView> {
    let fields = req.validate()?;
    if !can_publish(&user.roles) {
        return Err(WridersError::Forbidden(
            "Only authors can create books".into(),
        ));
    }
    check_series_owner(store, user.id, fields.series_id).await?;

    let mut book = BookDoc::new(user.id, fields.title);
    book.description = fields.description;
    book.cover_url = fields.cover_url;
    book.series_id = fields.series_id;
    book.status = req.status.unwrap_or_default();
    book.visibility = req.visibility.unwrap_or_default();
    store.insert_book(book.clone()).await?;

    AuditEvent::new(EventType::ContentCreated)
        .with_user(user.id)
        .with_entity("book", book.id)
        .emit();

    Ok(BookView::new(&book, Some(UserSummary::from(user))))
}

pub async fn list_books(
    store: &dyn Store,
    viewer: &Viewer,
    query: BookListQuery,
) -> Result<PageView<BookView>> {
    let pagination = query.pagination();
    pagination.validate()?;
    let series_id = match query.series.as_deref() {
        Some(raw) => Some(parse_id(raw, "series")?),
        None => None,
    };

    let author_id = match query.author.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match ObjectId::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => match store.find_user_by_username(raw).await? {
                Some(user) => Some(user.id),
                None => {
                    return Ok(PageView {
                        items: Vec::new(),
                        total: 0,
                        page: pagination.page,
                        limit: pagination.limit,
                    })
                }
            },
        },
    };

    let book_query = BookQuery {
        scope: scope_for(store, viewer).await?,
        author_id,
        series_id,
        skip: pagination.skip(),
        limit: pagination.limit,
    };
    let page = store.list_books(&book_query).await?;

    Ok(PageView {
        items: book_views(store, &page.items).await?,
        total: page.total,
        page: pagination.page,
        limit: pagination.limit,
    })
}

pub async fn get_book(store: &dyn Store, viewer: &Viewer, book_id: ObjectId) -> Result<BookDetail> {
    let book = load_visible_book(store, viewer, book_id).await?;
    let authors: HashMap<ObjectId, UserSummary> = user_summaries(store, &[book.author_id]).await?;

    let chapters = store.list_chapters(book.id).await?;
    let chapter_count = chapters
        .iter()
        .filter(|c| viewer.is(book.author_id) || c.status == PublishStatus::Published)
        .count();

    let (is_following, is_favorite) = match viewer.id() {
        Some(user_id) => {
            let (following, favorite) = futures::try_join!(
                store.has_activity(ActivityKind::BookFollow, user_id, book.id),
                store.has_activity(ActivityKind::FavoriteBook, user_id, book.id),
            )?;
            (Some(following), Some(favorite))
        }
        None => (None, None),
    };
    let (follower_count, favorite_count) = futures::try_join!(
        store.count_activity(ActivityKind::BookFollow, book.id),
        store.count_activity(ActivityKind::FavoriteBook, book.id),
    )?;

    Ok(BookDetail {
        chapter_count,
        follower_count,
        favorite_count,
        is_following,
        is_favorite,
        book: BookView::new(&book, authors.get(&book.author_id).cloned()),
    })
}

pub async fn update_book(
    store: &dyn Store,
    user: &UserDoc,
    book_id: ObjectId,
    req: UpdateBookRequest,
) -> Result<BookView> {
    req.validate()?;
    let mut book = load_managed_book(store, &viewer_of(Some(user)), book_id).await?;

    if let Some(title) = &req.title {
        book.title = check_title(title)?;
    }
    if req.description.is_some() {
        book.description = check_description(req.description.as_deref())?;
    }
    if req.cover_url.is_some() {
        book.cover_url = check_cover_url(req.cover_url.as_deref())?;
    }
    if req.series_id.is_some() {
        let series_id = check_series_ref(req.series_id.as_deref())?;
        check_series_owner(store, book.author_id, series_id).await?;
        book.series_id = series_id;
    }
    if let Some(status) = req.status {
        book.status = status;
    }
    if let Some(visibility) = req.visibility {
        book.visibility = visibility;
    }
    book.metadata.touch();
    store.replace_book(&book).await?;

    AuditEvent::new(EventType::ContentUpdated)
        .with_user(user.id)
        .with_entity("book", book.id)
        .emit();

    Ok(BookView::new(&book, Some(UserSummary::from(user))))
}

/// Delete a book with its chapters, comments, characters and activity
pub async fn delete_book(store: &dyn Store, user: &UserDoc, book_id: ObjectId) -> Result<()> {
    let book = load_managed_book(store, &viewer_of(Some(user)), book_id).await?;
    if !store.delete_book(book.id).await? {
        return Err(WridersError::not_found("Book"));
    }

    AuditEvent::new(EventType::ContentDeleted)
        .with_user(user.id)
        .with_entity("book", book.id)
        .emit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ActivityStore, BookStore};
    use crate::auth::Role;
    use crate::services::{activity, testing};

    fn create(title: &str) -> CreateBookRequest {
        CreateBookRequest {
            title: title.into(),
            description: None,
            cover_url: None,
            series_id: None,
            status: None,
            visibility: None,
        }
    }

    #[tokio::test]
    async fn test_create_requires_author_role() {
        let store = testing::store();
        let reader = testing::user(&store, "reader", &[]).await;
        let admin = testing::user(&store, "admin", &[Role::Admin]).await;
        let author = testing::author(&store, "writer").await;

        let err = create_book(&store, &reader, create("Mine")).await.unwrap_err();
        assert!(matches!(err, WridersError::Forbidden(_)));

        let book = create_book(&store, &author, create("  Mine  ")).await.unwrap();
        assert_eq!(book.title, "Mine");
        assert_eq!(book.status, PublishStatus::Draft);
        assert_eq!(book.visibility, Visibility::Public);
        create_book(&store, &admin, create("Admin's")).await.unwrap();
    }

    #[tokio::test]
    async fn test_validation_before_role_check() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;

        let err = create_book(&store, &author, create("")).await.unwrap_err();
        assert!(matches!(err, WridersError::Validation(_)));

        let mut req = create("Covered");
        req.cover_url = Some("ftp://example.com/c.png".into());
        assert!(create_book(&store, &author, req).await.is_err());
    }

    #[tokio::test]
    async fn test_private_book_visible_to_followers_only() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let follower = testing::user(&store, "follower", &[]).await;
        let stranger = testing::user(&store, "stranger", &[]).await;
        let book = testing::book(&store, &author, PublishStatus::Published, Visibility::Private).await;

        // A private book cannot be followed through the toggle by someone who
        // cannot see it, so record the follow directly
        store
            .insert_activity(crate::db::schemas::ActivityDoc::new(
                ActivityKind::BookFollow,
                follower.id,
                book.id,
            ))
            .await
            .unwrap();

        assert!(get_book(&store, &Viewer::user(follower.id), book.id).await.is_ok());
        assert!(get_book(&store, &Viewer::user(author.id), book.id).await.is_ok());
        let err = get_book(&store, &Viewer::user(stranger.id), book.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WridersError::NotFound(_)));
        assert!(get_book(&store, &Viewer::anonymous(), book.id).await.is_err());

        let listed = list_books(&store, &Viewer::user(stranger.id), BookListQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.total, 0);
        let listed = list_books(&store, &Viewer::user(follower.id), BookListQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
    }

    #[tokio::test]
    async fn test_listing_filters_and_pages() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let other = testing::author(&store, "other").await;
        for _ in 0..3 {
            testing::book(&store, &author, PublishStatus::Published, Visibility::Public).await;
        }
        testing::book(&store, &author, PublishStatus::Draft, Visibility::Public).await;
        testing::book(&store, &other, PublishStatus::Soon, Visibility::Public).await;

        let anon = Viewer::anonymous();
        let all = list_books(&store, &anon, BookListQuery::default()).await.unwrap();
        assert_eq!(all.total, 4);

        let query = BookListQuery {
            author: Some("writer".into()),
            page: Some(2),
            limit: Some(2),
            ..Default::default()
        };
        let page = list_books(&store, &anon, query).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);

        let own = BookListQuery {
            author: Some(author.id.to_hex()),
            ..Default::default()
        };
        let mine = list_books(&store, &Viewer::user(author.id), own).await.unwrap();
        assert_eq!(mine.total, 4);

        let query = BookListQuery {
            author: Some("nobody".into()),
            ..Default::default()
        };
        assert_eq!(list_books(&store, &anon, query).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_update_and_delete_by_owner_only() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let other = testing::author(&store, "other").await;
        let book = testing::book(&store, &author, PublishStatus::Published, Visibility::Public).await;

        let req = UpdateBookRequest {
            title: Some("Renamed".into()),
            ..Default::default()
        };
        let err = update_book(&store, &other, book.id, req).await.unwrap_err();
        assert!(matches!(err, WridersError::Forbidden(_)));

        let req = UpdateBookRequest {
            title: Some("Renamed".into()),
            description: Some("A story".into()),
            visibility: Some(Visibility::Private),
            ..Default::default()
        };
        let updated = update_book(&store, &author, book.id, req).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description.as_deref(), Some("A story"));
        assert_eq!(updated.visibility, Visibility::Private);

        // Private now, so the other author no longer sees it at all
        let err = delete_book(&store, &other, book.id).await.unwrap_err();
        assert!(matches!(err, WridersError::NotFound(_)));

        delete_book(&store, &author, book.id).await.unwrap();
        assert!(store.get_book(book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_series_must_belong_to_author() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let other = testing::author(&store, "other").await;
        let series = crate::services::series::create_series(
            &store,
            &other,
            crate::services::series::SeriesRequest {
                title: "Saga".into(),
                description: None,
            },
        )
        .await
        .unwrap();

        let mut req = create("Part One");
        req.series_id = Some(series.id.clone());
        let err = create_book(&store, &author, req).await.unwrap_err();
        assert!(matches!(err, WridersError::Forbidden(_)));

        let mut req = create("Part One");
        req.series_id = Some(series.id);
        let book = create_book(&store, &other, req).await.unwrap();
        assert!(book.series_id.is_some());
    }

    #[tokio::test]
    async fn test_detail_counts() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let reader = testing::user(&store, "reader", &[]).await;
        let book = testing::book(&store, &author, PublishStatus::Published, Visibility::Public).await;
        testing::chapter(&store, &book, 1, PublishStatus::Published).await;
        testing::chapter(&store, &book, 2, PublishStatus::Draft).await;

        activity::toggle(&store, &reader, ActivityKind::BookFollow, book.id)
            .await
            .unwrap();
        activity::toggle(&store, &reader, ActivityKind::FavoriteBook, book.id)
            .await
            .unwrap();

        let detail = get_book(&store, &Viewer::user(reader.id), book.id).await.unwrap();
        assert_eq!(detail.chapter_count, 1);
        assert_eq!(detail.follower_count, 1);
        assert_eq!(detail.favorite_count, 1);
        assert_eq!(detail.is_following, Some(true));
        assert_eq!(detail.is_favorite, Some(true));

        let detail = get_book(&store, &Viewer::user(author.id), book.id).await.unwrap();
        assert_eq!(detail.chapter_count, 2);
        assert_eq!(detail.is_favorite, Some(false));

        let detail = get_book(&store, &Viewer::anonymous(), book.id).await.unwrap();
        assert_eq!(detail.is_following, None);
    }
}
