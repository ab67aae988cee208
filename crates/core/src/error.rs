use thiserror::Error;

use crate::badges::CatalogError;
use crate::model::{SessionId, SettingsError};

/// Malformed input rejected before anything is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("invalid target language code: {raw:?}")]
    InvalidLanguage { raw: String },

    #[error("unknown difficulty: {raw:?}")]
    UnknownDifficulty { raw: String },

    #[error("turn belongs to session {payload}, but was submitted for session {context}")]
    SessionMismatch {
        context: SessionId,
        payload: SessionId,
    },

    #[error("turn number must be >= 1")]
    InvalidTurnNumber,

    #[error("turn number {turn_number} already exists in this session")]
    DuplicateTurnNumber { turn_number: u32 },

    #[error("target text cannot be empty")]
    EmptyTargetText,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
