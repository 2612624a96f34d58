//! Local mirror of marketplace resources
//!
//! Each record keeps a handful of typed columns plus the raw provider
//! payload. Records are keyed by `(account_id, id)` where `id` is the stable
//! provider-assigned identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{Result, SellerSyncError};

/// Normalize a JSON id (string or number) into a string.
#[must_use]
pub fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_id(payload: &Value, field: &str, resource: &str) -> Result<String> {
    payload
        .get(field)
        .and_then(json_id)
        .ok_or_else(|| SellerSyncError::InvalidInput(format!("{resource} payload has no `{field}`")))
}

fn string_field(payload: &Value, field: &str) -> Option<String> {
    payload.get(field).and_then(Value::as_str).map(ToString::to_string)
}

/// Whether an upsert created a new record or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub account_id: Uuid,
    pub title: Option<String>,
    pub status: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub available_quantity: Option<i64>,
    pub permalink: Option<String>,
    pub remote_updated_at: Option<String>,
    pub raw: Value,
    pub synced_at: DateTime<Utc>,
}

impl Listing {
    pub fn from_payload(account_id: Uuid, payload: Value) -> Result<Self> {
        Ok(Self {
            id: required_id(&payload, "id", "item")?,
            account_id,
            title: string_field(&payload, "title"),
            status: string_field(&payload, "status"),
            price: payload.get("price").and_then(Value::as_f64),
            currency: string_field(&payload, "currency_id"),
            available_quantity: payload.get("available_quantity").and_then(Value::as_i64),
            permalink: string_field(&payload, "permalink"),
            remote_updated_at: string_field(&payload, "last_updated"),
            raw: payload,
            synced_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub account_id: Uuid,
    pub status: Option<String>,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    pub buyer_id: Option<String>,
    /// Shipment reference used to discover shipments.
    pub shipment_id: Option<String>,
    pub date_created: Option<String>,
    pub raw: Value,
    pub synced_at: DateTime<Utc>,
}

impl Order {
    pub fn from_payload(account_id: Uuid, payload: Value) -> Result<Self> {
        Ok(Self {
            id: required_id(&payload, "id", "order")?,
            account_id,
            status: string_field(&payload, "status"),
            total_amount: payload.get("total_amount").and_then(Value::as_f64),
            currency: string_field(&payload, "currency_id"),
            buyer_id: payload.pointer("/buyer/id").and_then(json_id),
            shipment_id: payload.pointer("/shipping/id").and_then(json_id),
            date_created: string_field(&payload, "date_created"),
            raw: payload,
            synced_at: Utc::now(),
        })
    }
}

/// Shipment reference discovered on a mirrored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRef {
    pub order_id: String,
    pub shipment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub account_id: Uuid,
    pub order_id: Option<String>,
    pub status: Option<String>,
    pub substatus: Option<String>,
    pub tracking_number: Option<String>,
    pub raw: Value,
    pub synced_at: DateTime<Utc>,
}

impl Shipment {
    pub fn from_payload(account_id: Uuid, payload: Value) -> Result<Self> {
        Ok(Self {
            id: required_id(&payload, "id", "shipment")?,
            account_id,
            order_id: payload.get("order_id").and_then(json_id),
            status: string_field(&payload, "status"),
            substatus: string_field(&payload, "substatus"),
            tracking_number: string_field(&payload, "tracking_number"),
            raw: payload,
            synced_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub account_id: Uuid,
    pub item_id: Option<String>,
    pub text: Option<String>,
    pub status: Option<String>,
    pub answer: Option<String>,
    pub date_created: Option<String>,
    pub raw: Value,
    pub synced_at: DateTime<Utc>,
}

impl Question {
    pub fn from_payload(account_id: Uuid, payload: Value) -> Result<Self> {
        Ok(Self {
            id: required_id(&payload, "id", "question")?,
            account_id,
            item_id: payload.get("item_id").and_then(json_id),
            text: string_field(&payload, "text"),
            status: string_field(&payload, "status"),
            answer: payload.pointer("/answer/text").and_then(Value::as_str).map(ToString::to_string),
            date_created: string_field(&payload, "date_created"),
            raw: payload,
            synced_at: Utc::now(),
        })
    }
}
