//! # SellerSync Core
//!
//! Business logic for connecting marketplace seller accounts and keeping
//! their resources mirrored locally.
//!
//! This crate contains:
//! - Port interfaces (traits) for persistence, the marketplace API and the
//!   delivery queue
//! - The OAuth handshake, token broker, sync orchestrator and webhook
//!   services
//!
//! ## Architecture Principles
//! - Depends only on `sellersync-common` and `sellersync-domain`
//! - No database or HTTP code; adapters live in `sellersync-infra`
//! - All external dependencies via traits

pub mod accounts;
pub mod marketplace;
pub mod oauth;
pub mod queue;
pub mod sync;
pub mod tokens;
pub mod webhooks;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use accounts::ports::{AccountRepository, CredentialRepository};
pub use marketplace::ports::{ApiMethod, ApiRequest, MarketplaceApi};
pub use oauth::ports::PendingAuthStore;
pub use oauth::{HandshakeSettings, OAuthHandshake};
pub use queue::ports::MessageQueue;
pub use sync::ports::MirrorRepository;
pub use sync::{AuthenticatedFetcher, SyncOrchestrator};
pub use tokens::{CredentialCodec, TokenBroker, TokenPair};
pub use webhooks::ports::WebhookLedger;
pub use webhooks::{ProcessOutcome, WebhookIngester, WebhookProcessor};
