pub mod clean;
pub mod core;
pub mod extract;
pub mod fetch;
pub mod mcp;
pub mod store;
pub mod tools;

// --- Primary exports ---
pub use crate::core::app_state::AppState;
pub use crate::core::config::Config;
pub use crate::core::errors::PulseError;
pub use crate::core::types::*;
pub use crate::store::{ResourceEntry, ResourceStore, Tier};
pub use crate::tools::{crawl, map, scrape};
