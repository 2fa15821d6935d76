use std::fmt;

use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    /// The store could not be reached, or refused our credentials.
    #[error("database is unavailable: {0}")]
    StoreUnavailable(String),

    /// The store refused a document, e.g. a unique index violation.
    #[error("database rejected a document in `{collection}`: {reason}")]
    WriteRejected { collection: String, reason: String },

    /// The manifest failed validation; nothing has been written.
    #[error("manifest failed validation:\n{0}")]
    Validation(ValidationErrors),

    #[error("could not load manifest: {0}")]
    Manifest(String),
}

impl SeedError {
    /// Sorts a driver error into the seed taxonomy. A document refused by
    /// the server or by the driver before sending is `WriteRejected`; write
    /// concern failures and everything else mean the store is not serving us.
    pub fn from_mongo(collection: &str, error: MongoError) -> SeedError {
        let rejected = match error.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(_)) => true,
            ErrorKind::BulkWrite(failure) => failure
                .write_errors
                .as_ref()
                .map_or(false, |errors| !errors.is_empty()),
            ErrorKind::InvalidArgument { .. } | ErrorKind::BsonSerialization(_) => true,
            _ => false,
        };

        if rejected {
            SeedError::WriteRejected {
                collection: collection.to_string(),
                reason: error.to_string(),
            }
        } else {
            SeedError::StoreUnavailable(error.to_string())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub collection: &'static str,
    pub record: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.collection, self.record, self.message)
    }
}

/// Every problem found in one validation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, collection: &'static str, record: &str, message: impl Into<String>) {
        self.0.push(ValidationIssue {
            collection,
            record: record.to_string(),
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for issue in &self.0 {
            writeln!(f, "  - {}", issue)?;
        }
        Ok(())
    }
}

pub type SeedResult<T> = Result<T, SeedError>;

#[cfg(test)]
mod tests {
    use std::io;

    use mongodb::{
        bson::{self, doc},
        error::{WriteConcernError, WriteError},
        options::ClientOptions,
    };

    use super::*;

    fn write_error(code: i32, message: &str) -> WriteError {
        bson::from_document(doc! { "code": code, "errmsg": message }).unwrap()
    }

    fn write_concern_error(code: i32, message: &str) -> WriteConcernError {
        bson::from_document(doc! { "code": code, "errmsg": message }).unwrap()
    }

    #[test]
    fn server_refused_document_is_write_rejected() {
        let error = MongoError::from(ErrorKind::Write(WriteFailure::WriteError(write_error(
            11000,
            "E11000 duplicate key error",
        ))));

        assert!(matches!(
            SeedError::from_mongo("events", error),
            SeedError::WriteRejected { ref collection, .. } if collection == "events"
        ));
    }

    #[test]
    fn write_concern_failure_is_store_unavailable() {
        let error = MongoError::from(ErrorKind::Write(WriteFailure::WriteConcernError(
            write_concern_error(64, "waiting for replication timed out"),
        )));

        assert!(matches!(
            SeedError::from_mongo("events", error),
            SeedError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn unencodable_document_is_write_rejected() {
        let bson_error = bson::to_document(&"not a document").unwrap_err();

        assert!(matches!(
            SeedError::from_mongo("settings", MongoError::from(bson_error)),
            SeedError::WriteRejected { .. }
        ));
    }

    #[test]
    fn io_failure_is_store_unavailable() {
        let error = MongoError::from(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));

        assert!(matches!(
            SeedError::from_mongo("censor", error),
            SeedError::StoreUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn invalid_argument_is_write_rejected() {
        let error = ClientOptions::parse("definitely not a connection string")
            .await
            .unwrap_err();
        assert!(matches!(
            error.kind.as_ref(),
            ErrorKind::InvalidArgument { .. }
        ));

        assert!(matches!(
            SeedError::from_mongo("invitationals", error),
            SeedError::WriteRejected { .. }
        ));
    }

    #[test]
    fn validation_errors_list_every_issue() {
        let mut errors = ValidationErrors::default();
        errors.push("events", "Astronomy", "duplicate event name");
        errors.push("settings", "settings", "invitational_season must be positive");

        assert_eq!(
            SeedError::Validation(errors).to_string(),
            "manifest failed validation:\n  - events [Astronomy]: duplicate event name\n  - \
             settings [settings]: invitational_season must be positive\n"
        );
    }

    #[test]
    fn write_rejected_names_the_collection() {
        let error = SeedError::WriteRejected {
            collection: "events".to_string(),
            reason: "E11000 duplicate key".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "database rejected a document in `events`: E11000 duplicate key"
        );
    }
}
