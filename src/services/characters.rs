//! Characters appearing in a book

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::auth::Viewer;
use crate::db::schemas::{rfc3339, CharacterDoc, Metadata, UserDoc};
use crate::db::Store;
use crate::services::{check_description, load_managed_book, load_visible_book, viewer_of};
use crate::types::{Result, WridersError};

pub const MAX_NAME_LEN: usize = 100;
const MAX_ROLE_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CharacterRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl CharacterRequest {
    pub fn validate(&self) -> Result<(String, Option<String>, Option<String>)> {
        Ok((
            check_name(&self.name)?,
            check_description(self.description.as_deref())?,
            check_role(self.role.as_deref())?,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCharacterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl UpdateCharacterRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        check_description(self.description.as_deref())?;
        check_role(self.role.as_deref())?;
        Ok(())
    }
}

fn check_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(WridersError::Validation(format!(
            "Character name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn check_role(raw: Option<&str>) -> Result<Option<String>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(role) if role.chars().count() > MAX_ROLE_LEN => Err(WridersError::Validation(
            format!("Character role must be at most {MAX_ROLE_LEN} characters"),
        )),
        Some(role) => Ok(Some(role.to_string())),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterView {
    pub id: String,
    pub book_id: String,
    pub name: String,
    pub description: Option<String>,
    pub role: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&CharacterDoc> for CharacterView {
    fn from(character: &CharacterDoc) -> Self {
        Self {
            id: character.id.to_hex(),
            book_id: character.book_id.to_hex(),
            name: character.name.clone(),
            description: character.description.clone(),
            role: character.role.clone(),
            created_at: rfc3339(character.metadata.created_at),
            updated_at: rfc3339(character.metadata.updated_at),
        }
    }
}

async fn load_character(store: &dyn Store, id: ObjectId) -> Result<CharacterDoc> {
    store
        .get_character(id)
        .await?
        .ok_or_else(|| WridersError::not_found("Character"))
}

pub async fn create_character(
    store: &dyn Store,
    user: &UserDoc,
    book_id: ObjectId,
    req: CharacterRequest,
) -> Result<CharacterView> {
    let (name, description, role) = req.validate()?;
    let book = load_managed_book(store, &viewer_of(Some(user)), book_id).await?;

    let character = CharacterDoc {
        id: ObjectId::new(),
        metadata: Metadata::new(),
        book_id: book.id,
        name,
        description,
        role,
    };
    store.insert_character(character.clone()).await?;
    Ok(CharacterView::from(&character))
}

pub async fn list_characters(
    store: &dyn Store,
    viewer: &Viewer,
    book_id: ObjectId,
) -> Result<Vec<CharacterView>> {
    let book = load_visible_book(store, viewer, book_id).await?;
    Ok(store
        .list_characters(book.id)
        .await?
        .iter()
        .map(CharacterView::from)
        .collect())
}

pub async fn get_character(store: &dyn Store, viewer: &Viewer, id: ObjectId) -> Result<CharacterView> {
    let character = load_character(store, id).await?;
    load_visible_book(store, viewer, character.book_id)
        .await
        .map_err(|e| match e {
            WridersError::NotFound(_) => WridersError::not_found("Character"),
            other => other,
        })?;
    Ok(CharacterView::from(&character))
}

pub async fn update_character(
    store: &dyn Store,
    user: &UserDoc,
    id: ObjectId,
    req: UpdateCharacterRequest,
) -> Result<CharacterView> {
    req.validate()?;
    let mut character = load_character(store, id).await?;
    load_managed_book(store, &viewer_of(Some(user)), character.book_id).await?;

    if let Some(name) = &req.name {
        character.name = check_name(name)?;
    }
    if req.description.is_some() {
        character.description = check_description(req.description.as_deref())?;
    }
    if req.role.is_some() {
        character.role = check_role(req.role.as_deref())?;
    }
    character.metadata.touch();
    store.replace_character(&character).await?;

    Ok(CharacterView::from(&character))
}

pub async fn delete_character(store: &dyn Store, user: &UserDoc, id: ObjectId) -> Result<()> {
    let character = load_character(store, id).await?;
    load_managed_book(store, &viewer_of(Some(user)), character.book_id).await?;
    store.delete_character(character.id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{PublishStatus, Visibility};
    use crate::services::{parse_id, testing};

    fn request(name: &str) -> CharacterRequest {
        CharacterRequest {
            name: name.into(),
            description: None,
            role: Some("protagonist".into()),
        }
    }

    #[test]
    fn test_name_bounds() {
        assert!(request(" ").validate().is_err());
        assert!(request(&"n".repeat(100)).validate().is_ok());
        assert!(request(&"n".repeat(101)).validate().is_err());
    }

    #[tokio::test]
    async fn test_characters_follow_book_ownership() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let other = testing::author(&store, "other").await;
        let book = testing::book(&store, &author, PublishStatus::Published, Visibility::Public).await;

        let err = create_character(&store, &other, book.id, request("Ahab"))
            .await
            .unwrap_err();
        assert!(matches!(err, WridersError::Forbidden(_)));

        create_character(&store, &author, book.id, request("Starbuck")).await.unwrap();
        let ahab = create_character(&store, &author, book.id, request("Ahab")).await.unwrap();
        let id = parse_id(&ahab.id, "character").unwrap();

        let listed = list_characters(&store, &Viewer::anonymous(), book.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Ahab");

        let req = UpdateCharacterRequest {
            role: Some("captain".into()),
            ..Default::default()
        };
        let err = update_character(&store, &other, id, req).await.unwrap_err();
        assert!(matches!(err, WridersError::Forbidden(_)));

        let req = UpdateCharacterRequest {
            role: Some("captain".into()),
            ..Default::default()
        };
        let updated = update_character(&store, &author, id, req).await.unwrap();
        assert_eq!(updated.role.as_deref(), Some("captain"));

        delete_character(&store, &author, id).await.unwrap();
        assert!(get_character(&store, &Viewer::anonymous(), id).await.is_err());
    }

    #[tokio::test]
    async fn test_draft_book_characters_hidden() {
        let store = testing::store();
        let author = testing::author(&store, "writer").await;
        let book = testing::book(&store, &author, PublishStatus::Draft, Visibility::Public).await;
        let created = create_character(&store, &author, book.id, request("Secret")).await.unwrap();
        let id = parse_id(&created.id, "character").unwrap();

        let err = get_character(&store, &Viewer::anonymous(), id).await.unwrap_err();
        assert_eq!(err.to_string(), "Character not found");
        assert!(get_character(&store, &Viewer::user(author.id), id).await.is_ok());
    }
}
