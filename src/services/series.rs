//! Series: named groups of books by one author

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::auth::{can_publish, Viewer};
use crate::db::schemas::{rfc3339, Metadata, SeriesDoc, UserDoc};
use crate::db::{BookQuery, Store};
use crate::logging::{AuditEvent, EventType};
use crate::services::books::{book_views, scope_for, BookView};
use crate::services::{check_description, check_title, user_summaries, UserSummary, MAX_PAGE_SIZE};
use crate::types::{Result, WridersError};

#[derive(Debug, Deserialize)]
pub struct SeriesRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl SeriesRequest {
    pub fn validate(&self) -> Result<(String, Option<String>)> {
        Ok((
            check_title(&self.title)?,
            check_description(self.description.as_deref())?,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSeriesRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UpdateSeriesRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        check_description(self.description.as_deref())?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct SeriesListQuery {
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<UserSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl SeriesView {
    fn new(series: &SeriesDoc, author: Option<UserSummary>) -> Self {
        Self {
            id: series.id.to_hex(),
            title: series.title.clone(),
            description: series.description.clone(),
            author,
            created_at: rfc3339(series.metadata.created_at),
            updated_at: rfc3339(series.metadata.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SeriesDetail {
    #[serde(flatten)]
    pub series: SeriesView,
    /// Books of the series the viewer may see
    pub books: Vec<BookView>,
}

async fn load_owned_series(store: &dyn Store, user: &UserDoc, id: ObjectId) -> Result<SeriesDoc> {
    let series = store
        .get_series(id)
        .await?
        .ok_or_else(|| WridersError::not_found("Series"))?;
    if series.author_id != user.id {
        return Err(WridersError::Forbidden(
            "Only the author can modify this series".into(),
        ));
    }
    Ok(series)
}

pub async fn create_series(
    store: &dyn Store,
    user: &UserDoc,
    req: SeriesRequest,
) -> Result<SeriesView> {
    let (title, description) = req.validate()?;
    if !can_publish(&user.roles) {
        return Err(WridersError::Forbidden(
            "Only authors can create series".into(),
        ));
    }

    let series = SeriesDoc {
        id: ObjectId::new(),
        metadata: Metadata::new(),
        author_id: user.id,
        title,
        description,
    };
    store.insert_series(series.clone()).await?;

    AuditEvent::new(EventType::ContentCreated)
        .with_user(user.id)
        .with_entity("series", series.id)
        .emit();

    Ok(SeriesView::new(&series, Some(UserSummary::from(user))))
}

/// All series, or one author's when `author` (id or username) is given
pub async fn list_series(store: &dyn Store, query: SeriesListQuery) -> Result<Vec<SeriesView>> {
    let author_id = match query.author.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match ObjectId::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => match store.find_user_by_username(raw).await? {
                Some(user) => Some(user.id),
                None => return Ok(Vec::new()),
            },
        },
    };

    let series = store.list_series(author_id).await?;
    let author_ids: Vec<ObjectId> = series.iter().map(|s| s.author_id).collect();
    let authors = user_summaries(store, &author_ids).await?;
    Ok(series
        .iter()
        .map(|s| SeriesView::new(s, authors.get(&s.author_id).cloned()))
        .collect())
}

pub async fn get_series(store: &dyn Store, viewer: &Viewer, id: ObjectId) -> Result<SeriesDetail> {
    let series = store
        .get_series(id)
        .await?
        .ok_or_else(|| WridersError::not_found("Series"))?;

    let query = BookQuery {
        scope: scope_for(store, viewer).await?,
        author_id: None,
        series_id: Some(series.id),
        skip: 0,
        limit: MAX_PAGE_SIZE,
    };
    let books = store.list_books(&query).await?;
    let authors = user_summaries(store, &[series.author_id]).await?;

    Ok(SeriesDetail {
        series: SeriesView::new(&series, authors.get(&series.author_id).cloned()),
        books: book_views(store, &books.items).await?,
    })
}

pub async fn update_series(
    store: &dyn Store,
    user: &UserDoc,
    id: ObjectId,
    req: UpdateSeriesRequest,
) -> Result<SeriesView> {
    req.validate()?;
    let mut series = load_owned_series(store, user, id).await?;

    if let Some(title) = &req.title {
        series.title = check_title(title)?;
    }
    if req.description.is_some() {
        series.description = check_description(req.description.as_deref())?;
    }
    series.metadata.touch();
    store.replace_series(&series).await?;

    Ok(SeriesView::new(&series, Some(UserSummary::from(user))))
}

/// Delete a series; its books stay and lose the series reference
pub async fn delete_series(store: &dyn Store, user: &UserDoc, id: ObjectId) -> Result<()> {
    let series = load_owned_series(store, user, id).await?;
    store.delete_series(series.id).await?;

    AuditEvent::new(EventType::ContentDeleted)
        .with_user(user.id)
        .with_entity("series", series.id)
        .emit();
    Ok(())
}
