use std::fmt;

use clap::ValueEnum;
use mongodb::bson::Document;
use serde::Serialize;

use crate::{
    error::{SeedError, SeedResult},
    manifest::{Manifest, SeedRecord},
    store::{matches_key, SeedStore},
    validation::{validate_manifest, WindowPolicy},
};

/// How records are written to a collection that may already hold data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SeedStrategy {
    /// Insert every record, every run. Re-running duplicates everything.
    Insert,
    /// Insert every record into an empty collection; leave anything else alone.
    IfEmpty,
    /// Insert each record whose natural key is not in the collection yet.
    #[default]
    Upsert,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SeedOptions {
    pub strategy: SeedStrategy,
    pub window_policy: WindowPolicy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub collection: String,
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub collections: Vec<CollectionReport>,
}

impl SeedReport {
    pub fn inserted(&self) -> usize {
        self.collections.iter().map(|c| c.inserted).sum()
    }
}

impl fmt::Display for SeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.collections {
            writeln!(
                f,
                "{}: {} inserted, {} skipped",
                report.collection, report.inserted, report.skipped
            )?;
        }
        Ok(())
    }
}

pub async fn load_collection(
    store: &dyn SeedStore,
    name: &str,
    records: Vec<SeedRecord>,
    strategy: SeedStrategy,
) -> SeedResult<CollectionReport> {
    let total = records.len();

    let inserted = match strategy {
        SeedStrategy::Insert => {
            store
                .insert_many(name, records.into_iter().map(|r| r.document).collect())
                .await?;
            total
        }
        SeedStrategy::IfEmpty => {
            let existing = store.count(name).await?;
            if existing > 0 {
                tracing::info!(
                    collection = name,
                    existing,
                    "Collection already has documents; leaving it alone"
                );
                0
            } else {
                store
                    .insert_many(name, records.into_iter().map(|r| r.document).collect())
                    .await?;
                total
            }
        }
        SeedStrategy::Upsert => {
            let mut inserted = 0;
            for record in records {
                if store
                    .insert_if_absent(name, record.key, record.document)
                    .await?
                {
                    inserted += 1;
                } else {
                    tracing::debug!(collection = name, record = %record.label, "Already present");
                }
            }
            inserted
        }
    };

    tracing::info!(
        collection = name,
        inserted,
        skipped = total - inserted,
        "Seeded collection"
    );

    Ok(CollectionReport {
        collection: name.to_string(),
        inserted,
        skipped: total - inserted,
    })
}

/// Validates `manifest`, then seeds censor, events, invitationals and
/// settings in that order. Stops at the first failure; collections seeded
/// before it are not rolled back.
pub async fn seed_all(
    store: &dyn SeedStore,
    manifest: &Manifest,
    options: SeedOptions,
) -> SeedResult<SeedReport> {
    let errors = validate_manifest(manifest, options.window_policy);
    if !errors.is_empty() {
        return Err(SeedError::Validation(errors));
    }

    let mut report = SeedReport::default();

    for collection in manifest.collections()? {
        let collection_report =
            match load_collection(store, collection.name, collection.records, options.strategy)
                .await
            {
                Ok(collection_report) => collection_report,
                Err(e) => {
                    tracing::error!(
                        collection = collection.name,
                        already_seeded = report.collections.len(),
                        "Seeding aborted: {}",
                        e
                    );
                    return Err(e);
                }
            };
        report.collections.push(collection_report);
    }

    Ok(report)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionCheck {
    pub collection: String,
    /// Manifest records with no stored document under their key.
    pub missing: Vec<String>,
    /// Records that exist but no longer equal the manifest. The bot edits
    /// voters, status and settings after seeding, so this is not a failure.
    pub differs: Vec<String>,
    /// Records whose key matches more than one document, with the count.
    pub duplicated: Vec<(String, usize)>,
}

impl CollectionCheck {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.duplicated.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub collections: Vec<CollectionCheck>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.collections.iter().all(CollectionCheck::is_ok)
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.collections {
            if check.is_ok() && check.differs.is_empty() {
                writeln!(f, "{}: ok", check.collection)?;
                continue;
            }
            writeln!(f, "{}:", check.collection)?;
            for label in &check.missing {
                writeln!(f, "  missing {}", label)?;
            }
            for (label, copies) in &check.duplicated {
                writeln!(f, "  duplicated {} ({} documents)", label, copies)?;
            }
            for label in &check.differs {
                writeln!(f, "  differs {} (changed since seeding)", label)?;
            }
        }
        Ok(())
    }
}

fn without_id(document: &Document) -> Document {
    let mut document = document.clone();
    document.remove("_id");
    document
}

/// Reads every collection back and compares it with `manifest`.
pub async fn verify(store: &dyn SeedStore, manifest: &Manifest) -> SeedResult<VerifyReport> {
    let mut report = VerifyReport::default();

    for collection in manifest.collections()? {
        let stored = store
            .find_all(collection.name)
            .await?
            .iter()
            .map(without_id)
            .collect::<Vec<_>>();

        let mut check = CollectionCheck {
            collection: collection.name.to_string(),
            missing: Vec::new(),
            differs: Vec::new(),
            duplicated: Vec::new(),
        };

        for record in &collection.records {
            let matching = stored
                .iter()
                .filter(|doc| matches_key(doc, &record.key))
                .collect::<Vec<_>>();

            if matching.is_empty() {
                check.missing.push(record.label.clone());
                continue;
            }
            if !matching.contains(&&record.document) {
                check.differs.push(record.label.clone());
            }
            if matching.len() > 1 {
                check
                    .duplicated
                    .push((record.label.clone(), matching.len()));
            }
        }

        if !check.is_ok() {
            tracing::warn!(
                collection = collection.name,
                missing = check.missing.len(),
                differs = check.differs.len(),
                duplicated = check.duplicated.len(),
                "Collection does not match the manifest"
            );
        }

        report.collections.push(check);
    }

    Ok(report)
}
