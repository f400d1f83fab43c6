//! Shared model for the Autoflow decision core — events, option catalogs,
//! configuration, errors, and the audit event sink used by every engine.

pub mod catalog;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod types;

pub use catalog::{Catalog, StaticCatalog};
pub use config::AppConfig;
pub use error::{AutomationError, AutomationResult, ValidationError};
