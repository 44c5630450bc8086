// Public fallible APIs in this crate share one concrete error contract (`TabSeekError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod background;
pub mod config;
pub mod error;
pub mod extractor;
pub mod host;
pub mod index_store;
pub mod models;
pub mod overlay;
pub mod rpc;
pub mod search;
pub mod state;
pub mod synchronizer;
pub(crate) mod text;

pub use background::BackgroundService;
pub use config::AppConfig;
pub use error::{Result, TabSeekError};
pub use index_store::TabIndexStore;
pub use models::{IndexSnapshot, TabDescriptor, TabEntry, TabId};
pub use search::SearchEngine;
pub use synchronizer::TabSynchronizer;
