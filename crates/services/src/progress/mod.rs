mod cache;
mod service;

pub use cache::ProgressCache;
pub use service::ProgressService;
