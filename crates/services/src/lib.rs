#![forbid(unsafe_code)]

mod activity;
pub mod app_services;
pub mod badge_service;
pub mod error;
pub mod progress;
pub mod sessions;

pub use lingo_core::Clock;

pub use app_services::AppServices;
pub use badge_service::BadgeService;
pub use error::{AppServicesError, BadgeError, InvalidState, ProgressError, SessionError};
pub use progress::{ProgressCache, ProgressService};
pub use sessions::{CompletedSession, SessionDetail, SessionLifecycleService};
