//! Infrastructure layer: record stores, number allocation, config and the
//! application services that tie the domain crates to storage.

pub mod config;
pub mod error;
pub mod sequencer;
pub mod services;
pub mod store;


pub use config::{ConfigError, ReportingConfig, StoreConfig};
pub use error::{ServiceError, ServiceResult, StoreError};
pub use services::Services;
pub use store::{InMemoryStore, MovementQuery, PostgresStore, PurchaseOrderQuery, Store, StoreTx};
