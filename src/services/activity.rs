//! Follows, favorites and read markers

use bson::oid::ObjectId;
use serde::Serialize;

use crate::auth::{can_view_book, can_view_chapter};
use crate::db::schemas::{ActivityDoc, ActivityKind, UserDoc};
use crate::db::Store;
use crate::logging::{AuditEvent, EventType};
use crate::services::books::{book_views, BookView};
use crate::services::chapters::ChapterSummary;
use crate::services::{load_visible_book, load_visible_chapter, viewer_of};
use crate::types::{Result, WridersError};

#[derive(Debug, Serialize)]
pub struct ToggleView {
    /// Whether the record exists after the call
    pub active: bool,
    /// Records of this kind on the target
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct FavoritesView {
    pub books: Vec<BookView>,
    pub chapters: Vec<ChapterSummary>,
}

/// Flip a (kind, user, target) record.
///
/// The target must be visible to the user. A concurrent insert of the same
/// record counts as active.
pub async fn toggle(
    store: &dyn Store,
    user: &UserDoc,
    kind: ActivityKind,
    target_id: ObjectId,
) -> Result<ToggleView> {
    let viewer = viewer_of(Some(user));
    if kind.targets_book() {
        load_visible_book(store, &viewer, target_id).await?;
    } else {
        load_visible_chapter(store, &viewer, target_id).await?;
    }

    let active = if store.delete_activity(kind, user.id, target_id).await? {
        false
    } else {
        match store
            .insert_activity(ActivityDoc::new(kind, user.id, target_id))
            .await
        {
            Ok(()) | Err(WridersError::Conflict(_)) => true,
            Err(e) => return Err(e),
        }
    };

    AuditEvent::new(EventType::ActivityToggled)
        .with_user(user.id)
        .with_metadata(serde_json::json!({
            "kind": kind.as_str(),
            "target_id": target_id.to_hex(),
            "active": active,
        }))
        .emit();

    Ok(ToggleView {
        active,
        count: store.count_activity(kind, target_id).await?,
    })
}

/// Favorite books and chapters the user can still see, most recent first
pub async fn favorites(store: &dyn Store, user: &UserDoc) -> Result<FavoritesView> {
    let viewer = viewer_of(Some(user));
    let followed = store
        .activity_targets(ActivityKind::BookFollow, user.id)
        .await?;

    let book_ids = store
        .activity_targets(ActivityKind::FavoriteBook, user.id)
        .await?;
    let books: Vec<_> = store
        .get_books(&book_ids)
        .await?
        .into_iter()
        .filter(|b| can_view_book(&viewer, b, followed.contains(&b.id)))
        .collect();

    let chapter_ids = store
        .activity_targets(ActivityKind::FavoriteChapter, user.id)
        .await?;
    let chapters = store.get_chapters(&chapter_ids).await?;
    let mut parent_ids: Vec<ObjectId> = chapters.iter().map(|c| c.book_id).collect();
    parent_ids.sort();
    parent_ids.dedup();
    let parents = store.get_books(&parent_ids).await?;

    let chapters = chapters
        .iter()
        .filter(|c| {
            parents.iter().any(|b| {
                b.id == c.book_id && can_view_chapter(&viewer, b, c, followed.contains(&b.id))
            })
        })
        .map(ChapterSummary::from)
        .collect();

    Ok(FavoritesView {
        books: book_views(store, &books).await?,
        chapters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{PublishStatus, Visibility};
    use crate::db::BookStore;
    use crate::services::testing;

    #[tokio::test]
    async fn test_favorite_twice_toggles_off() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let reader = testing::user(&store, "reader", &[]).await;
        let book = testing::book(&store, &author, PublishStatus::Published, Visibility::Public).await;

        let first = toggle(&store, &reader, ActivityKind::FavoriteBook, book.id)
            .await
            .unwrap();
        assert!(first.active);
        assert_eq!(first.count, 1);

        let second = toggle(&store, &reader, ActivityKind::FavoriteBook, book.id)
            .await
            .unwrap();
        assert!(!second.active);
        assert_eq!(second.count, 0);
    }

    #[tokio::test]
    async fn test_invisible_target_rejected() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let reader = testing::user(&store, "reader", &[]).await;
        let book = testing::book(&store, &author, PublishStatus::Draft, Visibility::Public).await;
        let chapter = testing::chapter(&store, &book, 1, PublishStatus::Published).await;

        let err = toggle(&store, &reader, ActivityKind::BookFollow, book.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WridersError::NotFound(_)));
        let err = toggle(&store, &reader, ActivityKind::ChapterRead, chapter.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WridersError::NotFound(_)));

        // Authors may follow their own book
        assert!(toggle(&store, &author, ActivityKind::BookFollow, book.id)
            .await
            .unwrap()
            .active);
    }

    #[tokio::test]
    async fn test_favorites_skip_hidden_targets() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let reader = testing::user(&store, "reader", &[]).await;
        let mut book = testing::book(&store, &author, PublishStatus::Published, Visibility::Public).await;
        let chapter = testing::chapter(&store, &book, 1, PublishStatus::Published).await;

        toggle(&store, &reader, ActivityKind::FavoriteBook, book.id).await.unwrap();
        toggle(&store, &reader, ActivityKind::FavoriteChapter, chapter.id)
            .await
            .unwrap();

        let favs = favorites(&store, &reader).await.unwrap();
        assert_eq!(favs.books.len(), 1);
        assert_eq!(favs.chapters.len(), 1);

        book.visibility = Visibility::Private;
        store.replace_book(&book).await.unwrap();

        let favs = favorites(&store, &reader).await.unwrap();
        assert!(favs.books.is_empty());
        assert!(favs.chapters.is_empty());
    }

    #[tokio::test]
    async fn test_private_book_keeps_existing_followers() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let follower = testing::user(&store, "follower", &[]).await;
        let late = testing::user(&store, "late", &[]).await;
        let mut book = testing::book(&store, &author, PublishStatus::Published, Visibility::Public).await;

        toggle(&store, &follower, ActivityKind::BookFollow, book.id).await.unwrap();
        book.visibility = Visibility::Private;
        store.replace_book(&book).await.unwrap();

        let err = toggle(&store, &late, ActivityKind::BookFollow, book.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WridersError::NotFound(_)));

        // Unfollowing is the last action a follower can take on it
        let off = toggle(&store, &follower, ActivityKind::BookFollow, book.id)
            .await
            .unwrap();
        assert!(!off.active);
        let err = toggle(&store, &follower, ActivityKind::BookFollow, book.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WridersError::NotFound(_)));
    }
}
