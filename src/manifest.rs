use std::{fs, path::Path};

use chrono::{DateTime, TimeZone, Utc};
use mongodb::bson::{self, doc, Document};
use serde::{Deserialize, Serialize};

use crate::{
    error::{SeedError, SeedResult},
    models::{
        DBCensor, DBEvent, DBInvitational, DBInvitational__new, DBSettings, InvitationalStatus,
        CENSOR_COLLECTION, EVENTS_COLLECTION, INVITATIONALS_COLLECTION, SETTINGS_COLLECTION,
    },
};

/// Everything the loader writes, grouped by collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub censor: DBCensor,
    pub events: Vec<DBEvent>,
    pub invitationals: Vec<DBInvitational>,
    pub settings: DBSettings,
}

/// One document plus the filter that identifies it in its collection.
#[derive(Clone, Debug, PartialEq)]
pub struct SeedRecord {
    pub label: String,
    pub key: Document,
    pub document: Document,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CollectionManifest {
    pub name: &'static str,
    pub records: Vec<SeedRecord>,
}

impl Manifest {
    /// The records a fresh bot database starts with.
    pub fn builtin() -> Manifest {
        Manifest {
            censor: DBCensor {
                words: vec![
                    "pineapple".to_string(),
                    "kangaroo".to_string(),
                    "cow".to_string(),
                ],
                emojis: vec!["\u{1F595}".to_string()],
            },
            events: vec![
                DBEvent::new("Anatomy and Physiology", &["anat", "anatomy", "ap"]),
                DBEvent::new("Astronomy", &["astro"]),
                DBEvent::new("Robot Tour", &[]),
            ],
            invitationals: vec![
                DBInvitational__new! {
                    official_name = "Bernard Invitational".to_string(),
                    channel_name = "bernard".to_string(),
                    emoji = "🐶".to_string(),
                    aliases = vec!["doggo".to_string()],
                    tourney_date = Utc.with_ymd_and_hms(2023, 12, 10, 0, 0, 0).unwrap(),
                    status = InvitationalStatus::Archived,
                },
                DBInvitational__new! {
                    official_name = "Big Bear Invitational".to_string(),
                    channel_name = "bigbear".to_string(),
                    emoji = "🐻".to_string(),
                    aliases = vec!["bearasauras".to_string()],
                    tourney_date = Utc.with_ymd_and_hms(2024, 2, 12, 0, 0, 0).unwrap(),
                    status = InvitationalStatus::Open,
                },
            ],
            settings: DBSettings::for_season(2023),
        }
    }

    pub fn from_json(json: &str) -> SeedResult<Manifest> {
        let file: ManifestFile =
            serde_json::from_str(json).map_err(|e| SeedError::Manifest(e.to_string()))?;

        Ok(file.into_manifest())
    }

    pub fn from_file(path: &Path) -> SeedResult<Manifest> {
        let json = fs::read_to_string(path)
            .map_err(|e| SeedError::Manifest(format!("{}: {}", path.display(), e)))?;

        Manifest::from_json(&json)
    }

    /// Per-collection documents in seeding order: censor, events,
    /// invitationals, settings.
    pub fn collections(&self) -> SeedResult<Vec<CollectionManifest>> {
        let censor = CollectionManifest {
            name: CENSOR_COLLECTION,
            records: vec![SeedRecord {
                label: CENSOR_COLLECTION.to_string(),
                key: doc! {},
                document: to_document(CENSOR_COLLECTION, &self.censor)?,
            }],
        };

        let events = CollectionManifest {
            name: EVENTS_COLLECTION,
            records: self
                .events
                .iter()
                .map(|event| {
                    Ok(SeedRecord {
                        label: event.name.clone(),
                        key: doc! { "name": event.name.as_str() },
                        document: to_document(EVENTS_COLLECTION, event)?,
                    })
                })
                .collect::<SeedResult<Vec<_>>>()?,
        };

        let invitationals = CollectionManifest {
            name: INVITATIONALS_COLLECTION,
            records: self
                .invitationals
                .iter()
                .map(|invitational| {
                    Ok(SeedRecord {
                        label: invitational.channel_name.clone(),
                        key: doc! { "channel_name": invitational.channel_name.as_str() },
                        document: to_document(INVITATIONALS_COLLECTION, invitational)?,
                    })
                })
                .collect::<SeedResult<Vec<_>>>()?,
        };

        let settings = CollectionManifest {
            name: SETTINGS_COLLECTION,
            records: vec![SeedRecord {
                label: SETTINGS_COLLECTION.to_string(),
                key: doc! {},
                document: to_document(SETTINGS_COLLECTION, &self.settings)?,
            }],
        };

        Ok(vec![censor, events, invitationals, settings])
    }
}

fn to_document<T: Serialize>(collection: &str, value: &T) -> SeedResult<Document> {
    bson::to_document(value)
        .map_err(|e| SeedError::Manifest(format!("could not encode {} record: {}", collection, e)))
}

/// On-disk manifest layout. Dates are RFC 3339 strings and the invitational
/// window lengths fall back to the bot's defaults when left out.
#[derive(Debug, Deserialize)]
struct ManifestFile {
    censor: DBCensor,
    #[serde(default)]
    events: Vec<DBEvent>,
    #[serde(default)]
    invitationals: Vec<InvitationalEntry>,
    settings: DBSettings,
}

#[derive(Debug, Deserialize)]
struct InvitationalEntry {
    official_name: String,
    channel_name: String,
    emoji: String,
    #[serde(default)]
    aliases: Vec<String>,
    tourney_date: DateTime<Utc>,
    open_days: Option<i32>,
    closed_days: Option<i32>,
    #[serde(default)]
    voters: Vec<i64>,
    status: InvitationalStatus,
}

impl ManifestFile {
    fn into_manifest(self) -> Manifest {
        Manifest {
            censor: self.censor,
            events: self.events,
            invitationals: self
                .invitationals
                .into_iter()
                .map(InvitationalEntry::into_invitational)
                .collect(),
            settings: self.settings,
        }
    }
}

impl InvitationalEntry {
    fn into_invitational(self) -> DBInvitational {
        let mut invitational = DBInvitational__new! {
            official_name = self.official_name,
            channel_name = self.channel_name,
            emoji = self.emoji,
            aliases = self.aliases,
            tourney_date = self.tourney_date,
            voters = self.voters,
            status = self.status,
        };

        if let Some(open_days) = self.open_days {
            invitational.open_days = open_days;
        }
        if let Some(closed_days) = self.closed_days {
            invitational.closed_days = closed_days;
        }

        invitational
    }
}
