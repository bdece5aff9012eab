pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod queue;
pub mod sql;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use store::Store;
