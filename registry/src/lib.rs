//! Connection registry.
//!
//! Maps caller-chosen aliases to engine kinds and connection parameters:
//! - `params`: per-engine validation of caller-supplied fields
//! - `store`: durable keyed storage of connection entries
//! - `service`: the add/remove/list operations exposed to callers

pub mod params;
pub mod service;
pub mod store;

pub use service::ConnectionService;
pub use store::{ConnectionStore, SqliteConnectionStore};
