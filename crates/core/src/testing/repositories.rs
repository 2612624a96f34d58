//! In-memory repositories

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sellersync_domain::{
    Account, CredentialRecord, Listing, NewAccount, NewCredentialRecord, Order, PendingAuthState,
    Question, Result, SellerSyncError, Shipment, ShipmentRef, UpsertOutcome, WebhookLedgerEntry,
};
use uuid::Uuid;

use crate::accounts::ports::{AccountRepository, CredentialRepository};
use crate::oauth::ports::PendingAuthStore;
use crate::sync::ports::MirrorRepository;
use crate::webhooks::ports::WebhookLedger;

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: Mutex<Vec<Account>>,
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn upsert_by_seller_id(&self, account: &NewAccount) -> Result<Account> {
        let mut accounts = self.accounts.lock();
        let now = Utc::now();
        if let Some(existing) = accounts.iter_mut().find(|a| a.seller_id == account.seller_id) {
            existing.display_name.clone_from(&account.display_name);
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let created = Account {
            id: Uuid::now_v7(),
            seller_id: account.seller_id.clone(),
            display_name: account.display_name.clone(),
            marketplace_id: account.marketplace_id.clone(),
            created_at: now,
            updated_at: now,
        };
        accounts.push(created.clone());
        Ok(created)
    }

    async fn get(&self, account_id: Uuid) -> Result<Option<Account>> {
        Ok(self.accounts.lock().iter().find(|a| a.id == account_id).cloned())
    }

    async fn find_by_seller_id(&self, seller_id: &str) -> Result<Option<Account>> {
        Ok(self.accounts.lock().iter().find(|a| a.seller_id == seller_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.lock().clone())
    }
}

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    records: Mutex<HashMap<Uuid, Vec<CredentialRecord>>>,
}

impl InMemoryCredentialRepository {
    #[must_use]
    pub fn record_count(&self, account_id: Uuid) -> usize {
        self.records.lock().get(&account_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn replace_active(&self, record: NewCredentialRecord) -> Result<CredentialRecord> {
        let record = record.into_record();
        self.records.lock().insert(record.account_id, vec![record.clone()]);
        Ok(record)
    }

    async fn active(&self, account_id: Uuid) -> Result<Option<CredentialRecord>> {
        Ok(self
            .records
            .lock()
            .get(&account_id)
            .and_then(|records| records.iter().max_by_key(|r| r.obtained_at).cloned()))
    }
}

pub struct InMemoryPendingAuthStore {
    entries: Mutex<HashMap<String, PendingAuthState>>,
    ttl: Duration,
}

impl InMemoryPendingAuthStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backdate an entry to simulate expiry.
    pub fn age(&self, state: &str, by: chrono::Duration) {
        if let Some(entry) = self.entries.lock().get_mut(state) {
            entry.created_at -= by;
        }
    }
}

#[async_trait]
impl PendingAuthStore for InMemoryPendingAuthStore {
    async fn put(&self, pending: PendingAuthState) -> Result<()> {
        self.entries.lock().insert(pending.state.clone(), pending);
        Ok(())
    }

    async fn take(&self, state: &str) -> Result<Option<PendingAuthState>> {
        let entry = self.entries.lock().remove(state);
        Ok(entry.filter(|p| !p.is_expired(self.ttl, Utc::now())))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, p| !p.is_expired(self.ttl, now));
        Ok(before - entries.len())
    }
}

type Keyed<T> = Mutex<BTreeMap<(Uuid, String), T>>;

#[derive(Default)]
pub struct InMemoryMirrorRepository {
    listings: Keyed<Listing>,
    orders: Keyed<Order>,
    shipments: Keyed<Shipment>,
    questions: Keyed<Question>,
}

fn upsert<T>(map: &Keyed<T>, account_id: Uuid, id: &str, value: T) -> UpsertOutcome {
    match map.lock().insert((account_id, id.to_string()), value) {
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Created,
    }
}

impl InMemoryMirrorRepository {
    #[must_use]
    pub fn listing(&self, account_id: Uuid, id: &str) -> Option<Listing> {
        self.listings.lock().get(&(account_id, id.to_string())).cloned()
    }

    #[must_use]
    pub fn order(&self, account_id: Uuid, id: &str) -> Option<Order> {
        self.orders.lock().get(&(account_id, id.to_string())).cloned()
    }

    #[must_use]
    pub fn shipment(&self, account_id: Uuid, id: &str) -> Option<Shipment> {
        self.shipments.lock().get(&(account_id, id.to_string())).cloned()
    }

    #[must_use]
    pub fn question(&self, account_id: Uuid, id: &str) -> Option<Question> {
        self.questions.lock().get(&(account_id, id.to_string())).cloned()
    }

    /// `(listings, orders, shipments, questions)` stored for the account.
    #[must_use]
    pub fn counts(&self, account_id: Uuid) -> (usize, usize, usize, usize) {
        fn count<T>(map: &Keyed<T>, account_id: Uuid) -> usize {
            map.lock().keys().filter(|(a, _)| *a == account_id).count()
        }
        (
            count(&self.listings, account_id),
            count(&self.orders, account_id),
            count(&self.shipments, account_id),
            count(&self.questions, account_id),
        )
    }
}

#[async_trait]
impl MirrorRepository for InMemoryMirrorRepository {
    async fn upsert_listing(&self, listing: &Listing) -> Result<UpsertOutcome> {
        Ok(upsert(&self.listings, listing.account_id, &listing.id, listing.clone()))
    }

    async fn upsert_order(&self, order: &Order) -> Result<UpsertOutcome> {
        Ok(upsert(&self.orders, order.account_id, &order.id, order.clone()))
    }

    async fn upsert_shipment(&self, shipment: &Shipment) -> Result<UpsertOutcome> {
        Ok(upsert(&self.shipments, shipment.account_id, &shipment.id, shipment.clone()))
    }

    async fn upsert_question(&self, question: &Question) -> Result<UpsertOutcome> {
        Ok(upsert(&self.questions, question.account_id, &question.id, question.clone()))
    }

    async fn shipment_refs(
        &self,
        account_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ShipmentRef>> {
        Ok(self
            .orders
            .lock()
            .values()
            .filter(|order| order.account_id == account_id)
            .filter_map(|order| {
                order.shipment_id.as_ref().map(|shipment_id| ShipmentRef {
                    order_id: order.id.clone(),
                    shipment_id: shipment_id.clone(),
                })
            })
            .skip(offset)
            .take(limit)
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryWebhookLedger {
    entries: Mutex<BTreeMap<String, WebhookLedgerEntry>>,
}

impl InMemoryWebhookLedger {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backdate an entry's `received_at`.
    pub fn age(&self, event_id: &str, by: chrono::Duration) {
        if let Some(entry) = self.entries.lock().get_mut(event_id) {
            entry.received_at -= by;
        }
    }
}

#[async_trait]
impl WebhookLedger for InMemoryWebhookLedger {
    async fn insert_if_absent(&self, entry: &WebhookLedgerEntry) -> Result<bool> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&entry.event_id) {
            return Ok(false);
        }
        entries.insert(entry.event_id.clone(), entry.clone());
        Ok(true)
    }

    async fn get(&self, event_id: &str) -> Result<Option<WebhookLedgerEntry>> {
        Ok(self.entries.lock().get(event_id).cloned())
    }

    async fn mark_processed(&self, event_id: &str, processed_at: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(event_id)
            .ok_or_else(|| SellerSyncError::NotFound(format!("webhook event {event_id}")))?;
        entry.processed = true;
        entry.processed_at = Some(processed_at);
        Ok(())
    }

    async fn list_unprocessed_older_than(
        &self,
        cutoff: DateTime<Utc>,
        max_requeues: u32,
        limit: usize,
    ) -> Result<Vec<WebhookLedgerEntry>> {
        let mut stale: Vec<WebhookLedgerEntry> = self
            .entries
            .lock()
            .values()
            .filter(|e| !e.processed && e.received_at < cutoff && e.requeue_count < max_requeues)
            .cloned()
            .collect();
        stale.sort_by_key(|e| e.received_at);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn record_requeue(&self, event_id: &str) -> Result<u32> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(event_id)
            .ok_or_else(|| SellerSyncError::NotFound(format!("webhook event {event_id}")))?;
        entry.requeue_count += 1;
        Ok(entry.requeue_count)
    }
}
