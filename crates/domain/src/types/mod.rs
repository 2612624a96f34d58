//! Domain types and models

pub mod account;
pub mod mirror;
pub mod queue;
pub mod sync;
pub mod webhook;

pub use account::{
    Account, AuthorizationStart, ConnectedAccount, CredentialRecord, NewAccount,
    NewCredentialRecord, PendingAuthState,
};
pub use mirror::{json_id, Listing, Order, Question, Shipment, ShipmentRef, UpsertOutcome};
pub use queue::QueueMessage;
pub use sync::{clamp_window_days, ResourceCounters, ResourceKind, StartOutcome, SyncRun, SyncScope};
pub use webhook::{resource_id_from_path, IngestOutcome, WebhookLedgerEntry, WebhookNotification};
