//! Shared error types for the services crate.

use thiserror::Error;

use lingo_core::ValidationError;
use lingo_core::badges::CatalogError;
use lingo_core::model::SettingsError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Why a lifecycle transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InvalidState {
    #[error("session already completed")]
    AlreadyCompleted,
    #[error("session has {total} turns, at least {minimum} required to complete")]
    TooFewTurns { total: u32, minimum: u32 },
}

/// Errors emitted by the session/turn lifecycle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("session or turn not found")]
    NotFound,
    #[error(transparent)]
    InvalidState(#[from] InvalidState),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => SessionError::NotFound,
            other => SessionError::Storage(other),
        }
    }
}

/// Errors emitted while computing progress metrics.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `BadgeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BadgeError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
