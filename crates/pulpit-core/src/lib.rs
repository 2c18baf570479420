//! Live-session monitoring and sermon catalog engine.
//!
//! [`monitor::LiveMonitor`] and [`catalog::CatalogService`] are independent
//! single-owner loops; hosts talk to them through their handles and read the
//! snapshots they publish.

pub mod api;
pub mod catalog;
pub mod credentials;
pub mod error;
pub mod format;
pub mod monitor;
pub mod source;

pub use api::ApiClient;
pub use error::{SourceError, SourceResult};
