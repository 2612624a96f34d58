//! # SellerSync Domain
//!
//! Business domain types for the marketplace credential and synchronization
//! engine.
//!
//! This crate contains:
//! - Account, credential and pending-authorization records
//! - Sync run state, webhook ledger entries and queue message payloads
//! - Mirrored marketplace resources (listings, orders, shipments, questions)
//! - The `SellerSyncError` taxonomy and `Result` alias
//! - Configuration structures and domain constants
//!
//! ## Architecture
//! - No dependencies on other SellerSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
