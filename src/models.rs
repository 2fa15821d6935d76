use chrono::{DateTime, Utc};
use orderless::create_orderless;

use serde::{Deserialize, Serialize};

pub const CENSOR_COLLECTION: &str = "censor";
pub const EVENTS_COLLECTION: &str = "events";
pub const INVITATIONALS_COLLECTION: &str = "invitationals";
pub const SETTINGS_COLLECTION: &str = "settings";

/// Words and emojis the bot strips out of member messages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBCensor {
    pub words: Vec<String>,
    pub emojis: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBEvent {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl DBEvent {
    pub fn new(name: &str, aliases: &[&str]) -> DBEvent {
        DBEvent {
            name: name.to_string(),
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationalStatus {
    /// Proposed by staff, waiting on member votes
    Voting,
    Open,
    Closed,
    Archived,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBInvitational {
    pub official_name: String,
    pub channel_name: String,
    pub emoji: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub tourney_date: DateTime<Utc>,
    pub open_days: i32,
    pub closed_days: i32,
    #[serde(default)]
    pub voters: Vec<i64>,
    pub status: InvitationalStatus,
}

impl DBInvitational {
    pub fn new(
        official_name: String,
        channel_name: String,
        emoji: String,
        tourney_date: DateTime<Utc>,
        status: InvitationalStatus,
        aliases: Vec<String>,
        open_days: i32,
        closed_days: i32,
        voters: Vec<i64>,
    ) -> DBInvitational {
        DBInvitational {
            official_name,
            channel_name,
            emoji,
            aliases,
            tourney_date,
            open_days,
            closed_days,
            voters,
            status,
        }
    }
}

// open_days/closed_days defaults are what staff get from `/invitational add`
create_orderless! {
    public = true,
    func = DBInvitational::new,
    defs(official_name, channel_name, emoji, tourney_date, status, aliases = Vec::new(), open_days = 10, closed_days = 30, voters = Vec::new()),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatusType {
    Playing,
    Listening,
    Watching,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBSettings {
    pub custom_bot_status_text: Option<String>,
    pub custom_bot_status_type: Option<BotStatusType>,
    pub invitational_season: i32,
}

impl DBSettings {
    pub fn for_season(invitational_season: i32) -> DBSettings {
        DBSettings {
            custom_bot_status_text: None,
            custom_bot_status_type: None,
            invitational_season,
        }
    }
}
