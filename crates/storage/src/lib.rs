#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    BadgeRepository, InMemoryRepository, SessionCompletion, SessionRepository, Storage,
    StorageError, TurnRepository,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
