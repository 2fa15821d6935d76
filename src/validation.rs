use std::collections::{HashMap, HashSet};

use clap::ValueEnum;

use crate::{
    error::ValidationErrors,
    manifest::Manifest,
    models::{
        CENSOR_COLLECTION, EVENTS_COLLECTION, INVITATIONALS_COLLECTION, SETTINGS_COLLECTION,
    },
};

/// What to do with an invitational that closes before it opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum WindowPolicy {
    #[default]
    Warn,
    Strict,
}

/// Checks the whole manifest and returns every problem found, so one run
/// surfaces all mistakes at once.
pub fn validate_manifest(manifest: &Manifest, window_policy: WindowPolicy) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    validate_censor(manifest, &mut errors);
    validate_events(manifest, &mut errors);
    validate_invitationals(manifest, window_policy, &mut errors);
    validate_settings(manifest, &mut errors);

    errors
}

fn check_label(
    errors: &mut ValidationErrors,
    collection: &'static str,
    record: &str,
    field: &str,
    value: &str,
) {
    if value.is_empty() {
        errors.push(collection, record, format!("{} is empty", field));
    } else if value.trim() != value {
        errors.push(
            collection,
            record,
            format!("{} `{}` has leading or trailing whitespace", field, value),
        );
    }
}

fn validate_censor(manifest: &Manifest, errors: &mut ValidationErrors) {
    let censor = &manifest.censor;

    for (field, entries) in [("words", &censor.words), ("emojis", &censor.emojis)] {
        let mut seen = HashSet::new();
        for entry in entries {
            check_label(errors, CENSOR_COLLECTION, CENSOR_COLLECTION, field, entry);
            // the censor matches case-insensitively, so `Cow` and `cow` are the same entry
            if !seen.insert(entry.to_lowercase()) {
                errors.push(
                    CENSOR_COLLECTION,
                    CENSOR_COLLECTION,
                    format!("`{}` is listed more than once in {}", entry, field),
                );
            }
        }
    }
}

fn is_word(alias: &str) -> bool {
    alias.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn validate_events(manifest: &Manifest, errors: &mut ValidationErrors) {
    // lowercased name or alias -> event that owns it
    let mut owners: HashMap<String, &str> = HashMap::new();

    for event in &manifest.events {
        check_label(errors, EVENTS_COLLECTION, &event.name, "name", &event.name);

        match owners.insert(event.name.to_lowercase(), &event.name) {
            Some(owner) if owner == event.name => errors.push(
                EVENTS_COLLECTION,
                &event.name,
                "event name is used more than once",
            ),
            Some(owner) => errors.push(
                EVENTS_COLLECTION,
                &event.name,
                format!("event name collides with `{}`", owner),
            ),
            None => {}
        }
    }

    for event in &manifest.events {
        for alias in &event.aliases {
            check_label(errors, EVENTS_COLLECTION, &event.name, "alias", alias);
            if !is_word(alias) {
                errors.push(
                    EVENTS_COLLECTION,
                    &event.name,
                    format!("alias `{}` may only contain letters, digits and `_`", alias),
                );
            }

            let key = alias.to_lowercase();
            match owners.get(&key).copied() {
                Some(owner) if owner != event.name => errors.push(
                    EVENTS_COLLECTION,
                    &event.name,
                    format!("alias `{}` already resolves to `{}`", alias, owner),
                ),
                // an alias may repeat its own event's name, but not another alias
                Some(_) if key != event.name.to_lowercase() => errors.push(
                    EVENTS_COLLECTION,
                    &event.name,
                    format!("alias `{}` is listed more than once", alias),
                ),
                Some(_) => {}
                None => {
                    owners.insert(key, &event.name);
                }
            }
        }
    }
}

fn validate_invitationals(
    manifest: &Manifest,
    window_policy: WindowPolicy,
    errors: &mut ValidationErrors,
) {
    let mut official_names = HashSet::new();
    let mut channel_names = HashSet::new();

    for invitational in &manifest.invitationals {
        let record = invitational.channel_name.as_str();

        check_label(
            errors,
            INVITATIONALS_COLLECTION,
            record,
            "official_name",
            &invitational.official_name,
        );
        check_label(
            errors,
            INVITATIONALS_COLLECTION,
            record,
            "channel_name",
            &invitational.channel_name,
        );
        check_label(
            errors,
            INVITATIONALS_COLLECTION,
            record,
            "emoji",
            &invitational.emoji,
        );
        for alias in &invitational.aliases {
            check_label(errors, INVITATIONALS_COLLECTION, record, "alias", alias);
        }

        if !official_names.insert(invitational.official_name.as_str()) {
            errors.push(
                INVITATIONALS_COLLECTION,
                record,
                format!(
                    "official name `{}` is used more than once",
                    invitational.official_name
                ),
            );
        }
        if !channel_names.insert(invitational.channel_name.as_str()) {
            errors.push(
                INVITATIONALS_COLLECTION,
                record,
                "channel name is used more than once",
            );
        }

        if invitational.channel_name.to_lowercase() != invitational.channel_name
            || invitational.channel_name.contains(char::is_whitespace)
        {
            errors.push(
                INVITATIONALS_COLLECTION,
                record,
                "channel name must be lowercase without spaces",
            );
        }

        if invitational.open_days < 0 {
            errors.push(
                INVITATIONALS_COLLECTION,
                record,
                format!("open_days is negative ({})", invitational.open_days),
            );
        }
        if invitational.closed_days < 0 {
            errors.push(
                INVITATIONALS_COLLECTION,
                record,
                format!("closed_days is negative ({})", invitational.closed_days),
            );
        }

        if invitational.closed_days < invitational.open_days {
            let message = format!(
                "closed_days ({}) is less than open_days ({})",
                invitational.closed_days, invitational.open_days
            );
            match window_policy {
                WindowPolicy::Warn => {
                    tracing::warn!(channel_name = record, "{}", message)
                }
                WindowPolicy::Strict => errors.push(INVITATIONALS_COLLECTION, record, message),
            }
        }

        if !invitational.voters.is_empty() {
            errors.push(
                INVITATIONALS_COLLECTION,
                record,
                "voters must be empty when seeding",
            );
        }
    }
}

fn validate_settings(manifest: &Manifest, errors: &mut ValidationErrors) {
    let settings = &manifest.settings;

    if settings.invitational_season <= 0 {
        errors.push(
            SETTINGS_COLLECTION,
            SETTINGS_COLLECTION,
            format!(
                "invitational_season must be a positive year, got {}",
                settings.invitational_season
            ),
        );
    }

    if settings.custom_bot_status_text.is_some() != settings.custom_bot_status_type.is_some() {
        errors.push(
            SETTINGS_COLLECTION,
            SETTINGS_COLLECTION,
            "custom bot status text and type must be set together",
        );
    }
}
