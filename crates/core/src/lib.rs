#![forbid(unsafe_code)]

pub mod badges;
pub mod error;
pub mod model;
pub mod progress;
pub mod time;

pub use error::{Error, ValidationError};
pub use time::Clock;
