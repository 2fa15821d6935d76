use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{ClientOptions, UpdateOptions},
    Client, Database,
};
use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{SeedError, SeedResult};

static INSERT_IF_ABSENT_OPTIONS: Lazy<UpdateOptions> =
    Lazy::new(|| UpdateOptions::builder().upsert(Some(true)).build());

/// The handful of document-store operations seeding needs.
#[async_trait]
pub trait SeedStore: Send + Sync {
    async fn count(&self, collection: &str) -> SeedResult<u64>;

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> SeedResult<()>;

    /// Inserts `document` unless something already matches `key`. Returns
    /// whether a document was written.
    async fn insert_if_absent(
        &self,
        collection: &str,
        key: Document,
        document: Document,
    ) -> SeedResult<bool>;

    async fn find_all(&self, collection: &str) -> SeedResult<Vec<Document>>;
}

pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Opens a client and pings the server, so a bad URL or bad credentials
    /// fail here instead of on the first write.
    pub async fn connect(url: &SecretString, database_name: &str) -> SeedResult<MongoStore> {
        let mut client_options = ClientOptions::parse(url.expose_secret())
            .await
            .map_err(|e| SeedError::StoreUnavailable(e.to_string()))?;

        client_options.app_name = Some("Pi-Bot Seeder".to_string());

        let client = Client::with_options(client_options)
            .map_err(|e| SeedError::StoreUnavailable(e.to_string()))?;
        let database = client.database(database_name);

        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| SeedError::StoreUnavailable(e.to_string()))?;

        tracing::info!(database = database_name, "Connected to MongoDB");

        Ok(MongoStore { client, database })
    }

    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

#[async_trait]
impl SeedStore for MongoStore {
    async fn count(&self, collection: &str) -> SeedResult<u64> {
        self.database
            .collection::<Document>(collection)
            .count_documents(None, None)
            .await
            .map_err(|e| SeedError::from_mongo(collection, e))
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> SeedResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        self.database
            .collection::<Document>(collection)
            .insert_many(documents, None)
            .await
            .map_err(|e| SeedError::from_mongo(collection, e))?;

        Ok(())
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        key: Document,
        document: Document,
    ) -> SeedResult<bool> {
        let result = self
            .database
            .collection::<Document>(collection)
            .update_one(
                key,
                doc! { "$setOnInsert": document },
                INSERT_IF_ABSENT_OPTIONS.clone(),
            )
            .await
            .map_err(|e| SeedError::from_mongo(collection, e))?;

        Ok(result.upserted_id.is_some())
    }

    async fn find_all(&self, collection: &str) -> SeedResult<Vec<Document>> {
        self.database
            .collection::<Document>(collection)
            .find(None, None)
            .await
            .map_err(|e| SeedError::from_mongo(collection, e))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| SeedError::from_mongo(collection, e))
    }
}

/// A process-local store. Used by the tests, and handy for checking what a
/// manifest would write without a database.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    unique_fields: HashMap<String, String>,
    reachable: bool,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            reachable: true,
            ..Default::default()
        }
    }

    /// A store whose every call fails as if the server were down.
    #[cfg(test)]
    pub fn unreachable() -> MemoryStore {
        MemoryStore::default()
    }

    /// Rejects writes that would repeat `field` within `collection`, like a
    /// unique index.
    #[cfg(test)]
    pub fn with_unique_field(mut self, collection: &str, field: &str) -> MemoryStore {
        self.unique_fields
            .insert(collection.to_string(), field.to_string());
        self
    }

    fn check_reachable(&self) -> SeedResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(SeedError::StoreUnavailable(
                "connection refused".to_string(),
            ))
        }
    }

    fn check_unique(
        &self,
        collection: &str,
        existing: &[Document],
        document: &Document,
    ) -> SeedResult<()> {
        let Some(field) = self.unique_fields.get(collection) else {
            return Ok(());
        };

        match document.get(field) {
            Some(value) if existing.iter().any(|doc| doc.get(field) == Some(value)) => {
                Err(SeedError::WriteRejected {
                    collection: collection.to_string(),
                    reason: format!("duplicate key {}: {}", field, value),
                })
            }
            _ => Ok(()),
        }
    }
}

pub(crate) fn matches_key(document: &Document, key: &Document) -> bool {
    key.iter()
        .all(|(field, value)| document.get(field) == Some(value))
}

#[async_trait]
impl SeedStore for MemoryStore {
    async fn count(&self, collection: &str) -> SeedResult<u64> {
        self.check_reachable()?;

        let collections = self.collections.lock().unwrap();
        Ok(collections.get(collection).map_or(0, |docs| docs.len() as u64))
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> SeedResult<()> {
        self.check_reachable()?;

        let mut collections = self.collections.lock().unwrap();
        let existing = collections.entry(collection.to_string()).or_default();

        // ordered insert: documents before the rejected one stay written
        for document in documents {
            self.check_unique(collection, &existing[..], &document)?;
            existing.push(document);
        }

        Ok(())
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        key: Document,
        document: Document,
    ) -> SeedResult<bool> {
        self.check_reachable()?;

        let mut collections = self.collections.lock().unwrap();
        let existing = collections.entry(collection.to_string()).or_default();

        if existing.iter().any(|doc| matches_key(doc, &key)) {
            return Ok(false);
        }

        self.check_unique(collection, &existing[..], &document)?;
        existing.push(document);

        Ok(true)
    }

    async fn find_all(&self, collection: &str) -> SeedResult<Vec<Document>> {
        self.check_reachable()?;

        let collections = self.collections.lock().unwrap();
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_if_absent_matches_on_key_only() {
        let store = MemoryStore::new();

        let first = store
            .insert_if_absent(
                "events",
                doc! { "name": "Astronomy" },
                doc! { "name": "Astronomy", "aliases": ["astro"] },
            )
            .await
            .unwrap();
        let second = store
            .insert_if_absent(
                "events",
                doc! { "name": "Astronomy" },
                doc! { "name": "Astronomy", "aliases": [] },
            )
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(
            store.find_all("events").await.unwrap(),
            vec![doc! { "name": "Astronomy", "aliases": ["astro"] }]
        );
    }

    #[tokio::test]
    async fn empty_key_matches_any_document() {
        let store = MemoryStore::new();
        store
            .insert_many("settings", vec![doc! { "invitational_season": 2022 }])
            .await
            .unwrap();

        let inserted = store
            .insert_if_absent("settings", doc! {}, doc! { "invitational_season": 2023 })
            .await
            .unwrap();

        assert!(!inserted);
        assert_eq!(store.count("settings").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unique_field_rejects_and_keeps_earlier_documents() {
        let store = MemoryStore::new().with_unique_field("events", "name");

        let result = store
            .insert_many(
                "events",
                vec![
                    doc! { "name": "Astronomy" },
                    doc! { "name": "Astronomy" },
                    doc! { "name": "Robot Tour" },
                ],
            )
            .await;

        assert!(matches!(result, Err(SeedError::WriteRejected { .. })));
        assert_eq!(store.count("events").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unreachable_store_fails_every_call() {
        let store = MemoryStore::unreachable();

        assert!(matches!(
            store.count("censor").await,
            Err(SeedError::StoreUnavailable(_))
        ));
        assert!(matches!(
            store.find_all("censor").await,
            Err(SeedError::StoreUnavailable(_))
        ));
    }
}
