use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EditScope, ParseEditScopeError};
use crate::recurrence::RuleParseError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Transaction failed and was rolled back")]
    TransactionFailure(#[source] sqlx::Error),

    #[error("Invalid recurrence rule: {0}")]
    RuleParse(#[from] RuleParseError),

    #[error("Series not found: {0}")]
    SeriesNotFound(Uuid),

    #[error("Invalid edit scope: {0}")]
    InvalidScope(String),

    #[error("Scope '{0}' requires an occurrence timestamp")]
    AnchorRequired(EditScope),

    #[error("{at} is not an occurrence of series {series_id}")]
    NotAnOccurrence { series_id: Uuid, at: DateTime<Utc> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<ParseEditScopeError> for CoreError {
    fn from(err: ParseEditScopeError) -> Self {
        CoreError::InvalidScope(err.0)
    }
}

impl From<figment::Error> for CoreError {
    fn from(err: figment::Error) -> Self {
        CoreError::Config(Box::new(err))
    }
}
