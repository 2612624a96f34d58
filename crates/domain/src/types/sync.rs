//! Sync run state

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS, MIN_WINDOW_DAYS};
use crate::impl_domain_status_conversions;

/// A mirrored marketplace resource family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Items,
    Orders,
    Shipments,
    Questions,
}

impl_domain_status_conversions!(ResourceKind {
    Items => "items",
    Orders => "orders",
    Shipments => "shipments",
    Questions => "questions",
});

impl ResourceKind {
    /// Execution order within a full sync run.
    pub const ALL: [Self; 4] = [Self::Items, Self::Orders, Self::Shipments, Self::Questions];

    /// Map a webhook topic onto the resource it refers to.
    ///
    /// Topics are families (`orders_v2`, `items_prices`, ...) so the match is
    /// on the leading segment.
    #[must_use]
    pub fn from_topic(topic: &str) -> Option<Self> {
        let topic = topic.trim().to_ascii_lowercase();
        if topic.starts_with("items") {
            Some(Self::Items)
        } else if topic.starts_with("orders") {
            Some(Self::Orders)
        } else if topic.starts_with("shipments") {
            Some(Self::Shipments)
        } else if topic.starts_with("questions") {
            Some(Self::Questions)
        } else {
            None
        }
    }
}

/// Which resources a sync run covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    Items,
    Orders,
    Shipments,
    Questions,
    #[default]
    All,
}

impl_domain_status_conversions!(SyncScope {
    Items => "items",
    Orders => "orders",
    Shipments => "shipments",
    Questions => "questions",
    All => "all",
});

impl SyncScope {
    #[must_use]
    pub fn resources(self) -> &'static [ResourceKind] {
        match self {
            Self::Items => &[ResourceKind::Items],
            Self::Orders => &[ResourceKind::Orders],
            Self::Shipments => &[ResourceKind::Shipments],
            Self::Questions => &[ResourceKind::Questions],
            Self::All => &ResourceKind::ALL,
        }
    }
}

/// Clamp a caller-supplied order window to 1..=90 days (default 30).
#[must_use]
pub fn clamp_window_days(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(MIN_WINDOW_DAYS, MAX_WINDOW_DAYS)
}

/// Per-resource progress within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCounters {
    pub pages: u32,
    pub fetched: u64,
    pub created: u64,
    pub updated: u64,
    pub failed: u64,
}

/// Current or last sync run for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub account_id: Uuid,
    pub scope: SyncScope,
    pub window_days: u32,
    pub running: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counters: BTreeMap<ResourceKind, ResourceCounters>,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

impl SyncRun {
    /// A freshly started run.
    #[must_use]
    pub fn started(account_id: Uuid, scope: SyncScope, window_days: u32) -> Self {
        Self {
            account_id,
            scope,
            window_days,
            running: true,
            started_at: Utc::now(),
            finished_at: None,
            counters: BTreeMap::new(),
            errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn counters_mut(&mut self, kind: ResourceKind) -> &mut ResourceCounters {
        self.counters.entry(kind).or_default()
    }

    #[must_use]
    pub fn counters_for(&self, kind: ResourceKind) -> ResourceCounters {
        self.counters.get(&kind).copied().unwrap_or_default()
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Transition back to idle.
    pub fn finish(&mut self) {
        self.running = false;
        self.finished_at = Some(Utc::now());
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}
