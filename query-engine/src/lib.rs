//! Multi-engine query execution.
//!
//! - `adapters`: one adapter per engine family behind [`EngineAdapter`]
//! - `binds`: named-to-positional bind parameter rewriting for sqlx engines
//! - `normalizer`: uniform result shape and document identifier coercion
//! - `dispatcher`: alias resolution, routing and error wrapping

pub mod adapters;
pub mod binds;
pub mod dispatcher;
pub mod error;
pub mod normalizer;

pub use adapters::{AdapterRegistry, EngineAdapter, ExecuteOptions, RawResult};
pub use dispatcher::Dispatcher;
pub use error::{EngineError, EngineResult};
