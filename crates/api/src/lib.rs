//! # SellerSync API
//!
//! HTTP application layer - routes, context wiring and the server binary.
//!
//! This crate contains:
//! - axum routes for the connect flow, webhooks, sync control and health
//! - Application context (dependency injection)
//! - Tracing setup for the `sellersync` binary
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires the hexagonal architecture together

pub mod context;
pub mod error;
pub mod routes;
pub mod utils;

pub use context::{AppContext, HealthReport};
pub use error::{ApiError, ApiResult};
pub use routes::router;
