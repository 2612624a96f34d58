//! In-memory port implementations and a wiring harness for service tests
//!
//! Compiled for this crate's unit tests and, behind the `test-utils`
//! feature, for downstream crates.

mod harness;
mod marketplace;
mod repositories;

pub use harness::{harness, TestHarness};
pub use marketplace::{FakeMarketplace, RecordedCall};
pub use repositories::{
    InMemoryAccountRepository, InMemoryCredentialRepository, InMemoryMirrorRepository,
    InMemoryPendingAuthStore, InMemoryWebhookLedger,
};
