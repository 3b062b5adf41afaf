//! Threaded chapter comments

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::auth::{can_moderate_comment, Viewer};
use crate::db::schemas::{rfc3339, CommentDoc, Metadata, UserDoc, MAX_COMMENT_DEPTH};
use crate::db::Store;
use crate::logging::{AuditEvent, EventType};
use crate::services::{load_visible_chapter, parse_id, user_summaries, viewer_of, UserSummary};
use crate::types::{Result, WridersError};

pub const MAX_COMMENT_LEN: usize = 5000;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl CreateCommentRequest {
    /// Trimmed content and parsed parent id
    pub fn validate(&self) -> Result<(String, Option<ObjectId>)> {
        let content = check_content(&self.content)?;
        let parent_id = match self.parent_id.as_deref() {
            Some(raw) => Some(parse_id(raw, "parent comment")?),
            None => None,
        };
        Ok((content, parent_id))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

impl UpdateCommentRequest {
    pub fn validate(&self) -> Result<String> {
        check_content(&self.content)
    }
}

fn check_content(raw: &str) -> Result<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(WridersError::Validation("Comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(WridersError::Validation(format!(
            "Comment must be at most {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(content.to_string())
}

/// A comment without its replies
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub slug: String,
    pub content: String,
    pub depth: i32,
    pub chapter_id: String,
    pub parent_id: Option<String>,
    pub author: Option<UserSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl CommentView {
    fn new(comment: &CommentDoc, author: Option<UserSummary>) -> Self {
        Self {
            id: comment.id.to_hex(),
            slug: comment.slug.clone(),
            content: comment.content.clone(),
            depth: comment.depth,
            chapter_id: comment.chapter_id.to_hex(),
            parent_id: comment.parent_id.map(|p| p.to_hex()),
            author,
            created_at: rfc3339(comment.metadata.created_at),
            updated_at: rfc3339(comment.metadata.updated_at),
        }
    }
}

/// A comment with its nested replies
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,
    /// Direct replies stored for this comment
    pub reply_count: usize,
    pub replies: Vec<CommentNode>,
}

// =============================================================================
// Tree Assembly
// =============================================================================

/// Assemble a chapter's comments into a tree.
///
/// Top-level comments come newest first, replies at every level oldest first.
/// Levels past `MAX_COMMENT_DEPTH` and rows whose parent is missing are left
/// out.
pub fn build_comment_tree(
    comments: Vec<CommentDoc>,
    authors: &HashMap<ObjectId, UserSummary>,
) -> Vec<CommentNode> {
    let mut children: HashMap<Option<ObjectId>, Vec<CommentDoc>> = HashMap::new();
    for comment in comments {
        children.entry(comment.parent_id).or_default().push(comment);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| {
            a.metadata
                .created_at
                .cmp(&b.metadata.created_at)
                .then(a.id.cmp(&b.id))
        });
    }

    let mut roots = children.remove(&None).unwrap_or_default();
    roots.reverse();

    roots
        .iter()
        .map(|root| build_node(root, 1, &children, authors))
        .collect()
}

fn build_node(
    comment: &CommentDoc,
    level: i32,
    children: &HashMap<Option<ObjectId>, Vec<CommentDoc>>,
    authors: &HashMap<ObjectId, UserSummary>,
) -> CommentNode {
    let direct = children.get(&Some(comment.id)).map(Vec::as_slice).unwrap_or(&[]);
    let replies = if level < MAX_COMMENT_DEPTH {
        direct
            .iter()
            .map(|reply| build_node(reply, level + 1, children, authors))
            .collect()
    } else {
        Vec::new()
    };

    CommentNode {
        comment: CommentView::new(comment, authors.get(&comment.author_id).cloned()),
        reply_count: direct.len(),
        replies,
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Comment tree of a chapter the viewer may see
pub async fn list_comments(
    store: &dyn Store,
    viewer: &Viewer,
    chapter_id: ObjectId,
) -> Result<Vec<CommentNode>> {
    load_visible_chapter(store, viewer, chapter_id).await?;

    let comments = store.list_comments(chapter_id).await?;
    let author_ids: Vec<ObjectId> = comments.iter().map(|c| c.author_id).collect();
    let authors = user_summaries(store, &author_ids).await?;

    Ok(build_comment_tree(comments, &authors))
}

pub async fn create_comment(
    store: &dyn Store,
    user: &UserDoc,
    chapter_id: ObjectId,
    req: CreateCommentRequest,
) -> Result<CommentView> {
    let (content, parent_id) = req.validate()?;
    let viewer = viewer_of(Some(user));
    load_visible_chapter(store, &viewer, chapter_id).await?;

    let depth = match parent_id {
        None => 1,
        Some(parent_id) => {
            let parent = store
                .get_comment(parent_id)
                .await?
                .ok_or_else(|| WridersError::not_found("Parent comment"))?;
            if parent.chapter_id != chapter_id {
                return Err(WridersError::Validation(
                    "Parent comment belongs to another chapter".into(),
                ));
            }
            parent.depth + 1
        }
    };
    if depth > MAX_COMMENT_DEPTH {
        return Err(WridersError::Validation(
            "Maximum comment depth exceeded".into(),
        ));
    }

    let comment = CommentDoc {
        id: ObjectId::new(),
        metadata: Metadata::new(),
        slug: Uuid::new_v4().to_string(),
        content,
        depth,
        author_id: user.id,
        chapter_id,
        parent_id,
    };
    store.insert_comment(comment.clone()).await?;
    debug!(comment = %comment.id, chapter = %chapter_id, depth, "Comment created");

    Ok(CommentView::new(&comment, Some(UserSummary::from(user))))
}

/// Load a comment the user may moderate
async fn load_moderated_comment(
    store: &dyn Store,
    user: &UserDoc,
    comment_id: ObjectId,
) -> Result<CommentDoc> {
    let comment = store
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| WridersError::not_found("Comment"))?;

    let viewer = viewer_of(Some(user));
    let (book, _) = load_visible_chapter(store, &viewer, comment.chapter_id)
        .await
        .map_err(|e| match e {
            WridersError::NotFound(_) => WridersError::not_found("Comment"),
            other => other,
        })?;

    if !can_moderate_comment(&viewer, &comment, &book) {
        return Err(WridersError::Forbidden(
            "Only the comment author or the book author can change this comment".into(),
        ));
    }
    Ok(comment)
}

pub async fn update_comment(
    store: &dyn Store,
    user: &UserDoc,
    comment_id: ObjectId,
    req: UpdateCommentRequest,
) -> Result<CommentView> {
    let content = req.validate()?;
    let mut comment = load_moderated_comment(store, user, comment_id).await?;

    comment.content = content;
    comment.metadata.touch();
    store.replace_comment(&comment).await?;

    let authors = user_summaries(store, &[comment.author_id]).await?;
    Ok(CommentView::new(
        &comment,
        authors.get(&comment.author_id).cloned(),
    ))
}

pub async fn delete_comment(store: &dyn Store, user: &UserDoc, comment_id: ObjectId) -> Result<()> {
    let comment = load_moderated_comment(store, user, comment_id).await?;

    if store.count_replies(comment.id).await? > 0 {
        return Err(WridersError::Conflict(
            "Comment has replies and cannot be deleted".into(),
        ));
    }
    store.delete_comment(comment.id).await?;

    AuditEvent::new(EventType::ContentDeleted)
        .with_user(user.id)
        .with_entity("comment", comment.id)
        .emit();
    Ok(())
}
