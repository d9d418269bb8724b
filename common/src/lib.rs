//! Shared building blocks for the database query gateway.
//!
//! - `config`: environment-driven application configuration
//! - `errors`: the gateway-wide error taxonomy
//! - `models`: connection entries, tool requests and query results
//! - `response`: the JSON envelope returned by every HTTP endpoint
//! - `middleware`: request-id propagation

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
