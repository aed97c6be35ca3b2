pub mod backends;
pub mod collections;
pub mod community;
pub mod config;
pub mod firestore;
pub mod gcs;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod storage;
pub mod store;
