//! # Repositories
//!
//! A [`Repository<T>`] is a thin CRUD layer over one collection of the
//! document store. Models are plain serde types; stored documents carry their
//! id in `_id` next to the model's own fields.
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize)]
//! struct Car { model: String }
//!
//! let repo = ctx.repo::<Repository<Car>>("carRepo").unwrap();
//! let car = repo.create(Car { model: "Volvo".into() }).await?;
//! let same = repo.get_by_id(car.id.to_string().as_str()).await?;
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::context::AppContext;
use crate::db::{Database, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("invalid document id `{0}`")]
    InvalidId(String),

    #[error("repository `{collection}` has no database configured")]
    NoDatabase { collection: String },

    #[error("application context is not available")]
    ContextUnavailable,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("document does not match the model: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Native document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self).map_err(|_| RepoError::InvalidId(s.to_string()))
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Accepts either the native id or its string form.
pub trait IntoDocumentId {
    fn into_document_id(self) -> Result<DocumentId, RepoError>;
}

impl IntoDocumentId for DocumentId {
    fn into_document_id(self) -> Result<DocumentId, RepoError> {
        Ok(self)
    }
}

impl IntoDocumentId for Uuid {
    fn into_document_id(self) -> Result<DocumentId, RepoError> {
        Ok(DocumentId(self))
    }
}

impl IntoDocumentId for &str {
    fn into_document_id(self) -> Result<DocumentId, RepoError> {
        self.parse()
    }
}

impl IntoDocumentId for String {
    fn into_document_id(self) -> Result<DocumentId, RepoError> {
        self.parse()
    }
}

/// A stored model with its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(flatten)]
    pub model: T,
}

/// What a repository factory receives.
#[derive(Debug, Clone)]
pub struct RepoBinding {
    pub collection: String,
    pub ctx: Weak<AppContext>,
    pub db: Option<Database>,
}

pub struct Repository<T> {
    collection: String,
    ctx: Weak<AppContext>,
    db: Option<Database>,
    _model: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.collection)
            .field("db", &self.db)
            .finish()
    }
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(binding: RepoBinding) -> Self {
        Self {
            collection: binding.collection,
            ctx: binding.ctx,
            db: binding.db,
            _model: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The application context this repository belongs to.
    pub fn ctx(&self) -> Result<Arc<AppContext>, RepoError> {
        self.ctx.upgrade().ok_or(RepoError::ContextUnavailable)
    }

    fn db(&self) -> Result<&Database, RepoError> {
        self.db.as_ref().ok_or_else(|| RepoError::NoDatabase {
            collection: self.collection.clone(),
        })
    }

    /// Every document whose top-level fields equal those of `query`.
    /// An empty query (`{}` or `null`) matches everything.
    pub async fn find_all(&self, query: Value) -> Result<Vec<Document<T>>, RepoError> {
        let documents = self.db()?.all(&self.collection).await?;
        documents
            .into_iter()
            .filter(|(id, body)| matches_query(id, body, &query))
            .map(|(id, body)| to_document(&id, body))
            .collect()
    }

    pub async fn get_by_id(&self, id: impl IntoDocumentId) -> Result<Option<Document<T>>, RepoError> {
        let id = id.into_document_id()?.to_string();
        match self.db()?.get(&self.collection, &id).await? {
            Some(body) => Ok(Some(to_document(&id, body)?)),
            None => Ok(None),
        }
    }

    pub async fn get_one(&self, query: Value) -> Result<Option<Document<T>>, RepoError> {
        let documents = self.db()?.all(&self.collection).await?;
        documents
            .into_iter()
            .find(|(id, body)| matches_query(id, body, &query))
            .map(|(id, body)| to_document(&id, body))
            .transpose()
    }

    /// Stores `model` under a fresh id.
    pub async fn create(&self, model: T) -> Result<Document<T>, RepoError> {
        let db = self.db()?;
        let id = DocumentId::new();
        let mut body = serde_json::to_value(&model)?;
        if let Value::Object(fields) = &mut body {
            fields.remove("_id");
        }
        db.insert(&self.collection, &id.to_string(), &body).await?;
        Ok(Document { id, model })
    }

    /// Merges the top-level fields of `partial` into one document. Returns
    /// the updated document, or `None` if it does not exist.
    pub async fn update_one(&self, id: impl IntoDocumentId, partial: Value) -> Result<Option<Document<T>>, RepoError> {
        let id = id.into_document_id()?.to_string();
        let db = self.db()?;
        let Some(mut body) = db.get(&self.collection, &id).await? else {
            return Ok(None);
        };
        merge(&mut body, &partial);
        // reject partials that break the model before writing
        let document = to_document(&id, body.clone())?;
        if !db.replace(&self.collection, &id, &body).await? {
            return Ok(None);
        }
        Ok(Some(document))
    }

    /// Applies `partial` to every document matching `query`. Returns the
    /// number of modified documents.
    pub async fn update_many(&self, query: Value, partial: Value) -> Result<usize, RepoError> {
        let db = self.db()?;
        let mut modified = 0;
        for (id, mut body) in db.all(&self.collection).await? {
            if !matches_query(&id, &body, &query) {
                continue;
            }
            merge(&mut body, &partial);
            to_document::<T>(&id, body.clone())?;
            if db.replace(&self.collection, &id, &body).await? {
                modified += 1;
            }
        }
        Ok(modified)
    }

    /// Returns the number of deleted documents (0 or 1).
    pub async fn delete_by_id(&self, id: impl IntoDocumentId) -> Result<usize, RepoError> {
        let id = id.into_document_id()?.to_string();
        Ok(self.db()?.delete(&self.collection, &id).await?)
    }
}

fn to_document<T: DeserializeOwned>(id: &str, body: Value) -> Result<Document<T>, RepoError> {
    Ok(Document {
        id: id.parse()?,
        model: serde_json::from_value(body)?,
    })
}

fn matches_query(id: &str, body: &Value, query: &Value) -> bool {
    match query {
        Value::Null => true,
        Value::Object(fields) => fields.iter().all(|(key, expected)| {
            if key == "_id" {
                // ids live outside the stored body
                return expected.as_str() == Some(id);
            }
            body.get(key) == Some(expected)
        }),
        _ => false,
    }
}

fn merge(body: &mut Value, partial: &Value) {
    let (Value::Object(target), Value::Object(fields)) = (body, partial) else {
        return;
    };
    for (key, value) in fields {
        if key != "_id" {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Car {
        model: String,
        #[serde(default)]
        year: Option<u32>,
    }

    async fn repo() -> Repository<Car> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Repository::new(RepoBinding {
            collection: "car".to_string(),
            ctx: Weak::new(),
            db: Some(db),
        })
    }

    fn car(model: &str, year: u32) -> Car {
        Car {
            model: model.to_string(),
            year: Some(year),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = repo().await;
        let created = repo.create(car("Volvo", 1999)).await.unwrap();

        let by_native = repo.get_by_id(created.id).await.unwrap().unwrap();
        let by_string = repo.get_by_id(created.id.to_string()).await.unwrap().unwrap();
        assert_eq!(by_native, created);
        assert_eq!(by_string, created);
        assert!(repo.get_by_id(DocumentId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_id_is_rejected() {
        let repo = repo().await;
        assert!(matches!(repo.get_by_id("not-an-id").await, Err(RepoError::InvalidId(_))));
        assert!(matches!(repo.delete_by_id("42").await, Err(RepoError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_queries() {
        let repo = repo().await;
        repo.create(car("Volvo", 1999)).await.unwrap();
        repo.create(car("Volvo", 2005)).await.unwrap();
        repo.create(car("Saab", 1999)).await.unwrap();

        assert_eq!(repo.find_all(json!({})).await.unwrap().len(), 3);
        assert_eq!(repo.find_all(json!({ "model": "Volvo" })).await.unwrap().len(), 2);
        let saab = repo.get_one(json!({ "year": 1999, "model": "Saab" })).await.unwrap().unwrap();
        assert_eq!(saab.model.model, "Saab");
        assert!(repo.get_one(json!({ "model": "Fiat" })).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_updates_and_delete() {
        let repo = repo().await;
        let volvo = repo.create(car("Volvo", 1999)).await.unwrap();
        repo.create(car("Volvo", 2005)).await.unwrap();

        let updated = repo.update_one(volvo.id, json!({ "year": 2000 })).await.unwrap().unwrap();
        assert_eq!(updated.model.year, Some(2000));
        assert_eq!(updated.id, volvo.id);
        assert!(repo.update_one(DocumentId::new(), json!({ "year": 1 })).await.unwrap().is_none());

        let modified = repo.update_many(json!({ "model": "Volvo" }), json!({ "model": "V70" })).await.unwrap();
        assert_eq!(modified, 2);
        assert_eq!(repo.find_all(json!({ "model": "V70" })).await.unwrap().len(), 2);

        assert_eq!(repo.delete_by_id(volvo.id).await.unwrap(), 1);
        assert_eq!(repo.delete_by_id(volvo.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_database_fails_on_access() {
        let repo: Repository<Car> = Repository::new(RepoBinding {
            collection: "car".to_string(),
            ctx: Weak::new(),
            db: None,
        });
        assert!(matches!(repo.find_all(Value::Null).await, Err(RepoError::NoDatabase { .. })));
        assert!(matches!(repo.ctx(), Err(RepoError::ContextUnavailable)));
    }
}
