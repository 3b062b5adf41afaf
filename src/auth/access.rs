//! Visibility and ownership rules
//!
//! Every "who may see / who may change" decision lives here so that routes,
//! services and both store backends agree.

use bson::{doc, oid::ObjectId, Document};

use crate::db::schemas::{BookDoc, ChapterDoc, CommentDoc, PublishStatus, Visibility};

/// The requester a visibility decision is made for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewer {
    user_id: Option<ObjectId>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(id: ObjectId) -> Self {
        Self { user_id: Some(id) }
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.user_id
    }

    /// Whether the viewer is the given user
    pub fn is(&self, id: ObjectId) -> bool {
        self.user_id == Some(id)
    }
}

/// A book is visible to its author, and to everyone else once it leaves
/// DRAFT, provided it is PUBLIC or the viewer follows it.
pub fn can_view_book(viewer: &Viewer, book: &BookDoc, follows: bool) -> bool {
    if viewer.is(book.author_id) {
        return true;
    }
    if book.status == PublishStatus::Draft {
        return false;
    }
    match book.visibility {
        Visibility::Public => true,
        Visibility::Private => follows && viewer.id().is_some(),
    }
}

/// A chapter is visible to the book's author, and to readers when it is
/// PUBLISHED and its book is visible to them.
pub fn can_view_chapter(
    viewer: &Viewer,
    book: &BookDoc,
    chapter: &ChapterDoc,
    follows: bool,
) -> bool {
    if viewer.is(book.author_id) {
        return true;
    }
    chapter.status == PublishStatus::Published && can_view_book(viewer, book, follows)
}

/// Only the author manages a book and everything hanging off it
pub fn can_manage_book(viewer: &Viewer, book: &BookDoc) -> bool {
    viewer.is(book.author_id)
}

/// The comment's author and the author of the chapter's book may edit or
/// delete a comment
pub fn can_moderate_comment(viewer: &Viewer, comment: &CommentDoc, book: &BookDoc) -> bool {
    viewer.is(comment.author_id) || viewer.is(book.author_id)
}

/// Book listing scope for one viewer.
///
/// `followed` holds the ids of books the viewer follows. The same scope is
/// rendered as an in-memory predicate and as a MongoDB filter.
#[derive(Debug, Clone, Default)]
pub struct BookScope {
    pub viewer: Viewer,
    pub followed: Vec<ObjectId>,
}

impl BookScope {
    pub fn new(viewer: Viewer, followed: Vec<ObjectId>) -> Self {
        Self { viewer, followed }
    }

    pub fn admits(&self, book: &BookDoc) -> bool {
        can_view_book(&self.viewer, book, self.followed.contains(&book.id))
    }

    pub fn to_document(&self) -> Document {
        let draft = PublishStatus::Draft.as_str();
        let public = doc! {
            "status": { "$ne": draft },
            "visibility": Visibility::Public.as_str(),
        };

        match self.viewer.id() {
            None => public,
            Some(viewer_id) => {
                let mut clauses = vec![doc! { "author_id": viewer_id }, public];
                if !self.followed.is_empty() {
                    clauses.push(doc! {
                        "status": { "$ne": draft },
                        "visibility": Visibility::Private.as_str(),
                        "_id": { "$in": self.followed.clone() },
                    });
                }
                doc! { "$or": clauses }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::ChapterDoc;

    fn book(author: ObjectId, status: PublishStatus, visibility: Visibility) -> BookDoc {
        let mut book = BookDoc::new(author, "The Long Road".into());
        book.status = status;
        book.visibility = visibility;
        book
    }

    #[test]
    fn test_private_published_book_needs_follow() {
        let author = ObjectId::new();
        let reader = Viewer::user(ObjectId::new());
        let b = book(author, PublishStatus::Published, Visibility::Private);

        assert!(!can_view_book(&reader, &b, false));
        assert!(can_view_book(&reader, &b, true));
        assert!(can_view_book(&Viewer::user(author), &b, false));
        assert!(!can_view_book(&Viewer::anonymous(), &b, true));
    }

    #[test]
    fn test_draft_book_only_for_author() {
        let author = ObjectId::new();
        let b = book(author, PublishStatus::Draft, Visibility::Public);

        assert!(!can_view_book(&Viewer::anonymous(), &b, false));
        assert!(!can_view_book(&Viewer::user(ObjectId::new()), &b, true));
        assert!(can_view_book(&Viewer::user(author), &b, false));
    }

    #[test]
    fn test_chapter_requires_published_status() {
        let author = ObjectId::new();
        let b = book(author, PublishStatus::Published, Visibility::Public);
        let mut chapter = ChapterDoc::new(b.id, "One".into(), String::new(), 1);
        let reader = Viewer::user(ObjectId::new());

        assert!(!can_view_chapter(&reader, &b, &chapter, false));
        assert!(can_view_chapter(&Viewer::user(author), &b, &chapter, false));

        chapter.set_status(PublishStatus::Published);
        assert!(can_view_chapter(&reader, &b, &chapter, false));
    }

    #[test]
    fn test_comment_moderation() {
        let author = ObjectId::new();
        let commenter = ObjectId::new();
        let b = book(author, PublishStatus::Published, Visibility::Public);
        let comment = CommentDoc {
            id: ObjectId::new(),
            metadata: Default::default(),
            slug: "s".into(),
            content: "hi".into(),
            depth: 1,
            author_id: commenter,
            chapter_id: ObjectId::new(),
            parent_id: None,
        };

        assert!(can_moderate_comment(&Viewer::user(commenter), &comment, &b));
        assert!(can_moderate_comment(&Viewer::user(author), &comment, &b));
        assert!(!can_moderate_comment(&Viewer::user(ObjectId::new()), &comment, &b));
        assert!(!can_moderate_comment(&Viewer::anonymous(), &comment, &b));
    }

    #[test]
    fn test_scope_document_shape() {
        let anon = BookScope::new(Viewer::anonymous(), vec![]).to_document();
        assert!(anon.get("$or").is_none());
        assert_eq!(anon.get_str("visibility").unwrap(), "PUBLIC");

        let followed = ObjectId::new();
        let scoped = BookScope::new(Viewer::user(ObjectId::new()), vec![followed]).to_document();
        assert_eq!(scoped.get_array("$or").unwrap().len(), 3);
    }

    #[test]
    fn test_scope_admits_followed_private() {
        let b = book(ObjectId::new(), PublishStatus::Published, Visibility::Private);
        let reader = Viewer::user(ObjectId::new());

        assert!(!BookScope::new(reader, vec![]).admits(&b));
        assert!(BookScope::new(reader, vec![b.id]).admits(&b));
    }
}
