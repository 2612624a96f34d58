//! Marketplace endpoints and mirror writes per resource kind

use chrono::{DateTime, SecondsFormat, Utc};
use sellersync_domain::{
    Account, Listing, Order, Question, ResourceKind, Result, Shipment, UpsertOutcome,
};
use serde_json::Value;
use uuid::Uuid;

use super::ports::MirrorRepository;
use crate::marketplace::ports::ApiRequest;

/// Search request for one page of a remotely paged resource.
///
/// Shipments are not searchable; they are discovered through mirrored
/// orders, so `None` is returned for them.
#[must_use]
pub fn page_request(
    kind: ResourceKind,
    account: &Account,
    offset: u32,
    limit: u32,
    orders_since: DateTime<Utc>,
) -> Option<ApiRequest> {
    let request = match kind {
        ResourceKind::Items => {
            ApiRequest::get(format!("/users/{}/items/search", account.seller_id))
        }
        ResourceKind::Orders => ApiRequest::get("/orders/search")
            .query("seller", &account.seller_id)
            .query("order.date_created.from", orders_since.to_rfc3339_opts(SecondsFormat::Millis, true))
            .query("sort", "date_desc"),
        ResourceKind::Questions => {
            ApiRequest::get("/questions/search").query("seller_id", &account.seller_id)
        }
        ResourceKind::Shipments => return None,
    };
    Some(request.query("offset", offset).query("limit", limit))
}

/// Entries of a search page: item ids for items, full records otherwise.
#[must_use]
pub fn page_entries(kind: ResourceKind, body: &Value) -> Vec<Value> {
    let key = match kind {
        ResourceKind::Questions => "questions",
        _ => "results",
    };
    body.get(key).and_then(Value::as_array).cloned().unwrap_or_default()
}

/// Single-record endpoint.
#[must_use]
pub fn record_request(kind: ResourceKind, resource_id: &str) -> ApiRequest {
    let collection = match kind {
        ResourceKind::Items => "items",
        ResourceKind::Orders => "orders",
        ResourceKind::Shipments => "shipments",
        ResourceKind::Questions => "questions",
    };
    ApiRequest::get(format!("/{collection}/{resource_id}"))
}

/// Parse `payload` as `kind` and upsert it.
pub async fn store(
    mirror: &dyn MirrorRepository,
    kind: ResourceKind,
    account_id: Uuid,
    payload: Value,
) -> Result<UpsertOutcome> {
    match kind {
        ResourceKind::Items => mirror.upsert_listing(&Listing::from_payload(account_id, payload)?).await,
        ResourceKind::Orders => mirror.upsert_order(&Order::from_payload(account_id, payload)?).await,
        ResourceKind::Shipments => {
            mirror.upsert_shipment(&Shipment::from_payload(account_id, payload)?).await
        }
        ResourceKind::Questions => {
            mirror.upsert_question(&Question::from_payload(account_id, payload)?).await
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn account() -> Account {
        Account {
            id: Uuid::now_v7(),
            seller_id: "1001".into(),
            display_name: "seller".into(),
            marketplace_id: "default".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Validates search endpoints and paging parameters.
    #[test]
    fn test_page_requests() {
        let account = account();
        let since = DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z").unwrap().with_timezone(&Utc);

        let items = page_request(ResourceKind::Items, &account, 100, 50, since).unwrap();
        assert_eq!(items.path, "/users/1001/items/search");
        assert_eq!(items.query_value("offset"), Some("100"));
        assert_eq!(items.query_value("limit"), Some("50"));

        let orders = page_request(ResourceKind::Orders, &account, 0, 50, since).unwrap();
        assert_eq!(orders.path, "/orders/search");
        assert_eq!(orders.query_value("seller"), Some("1001"));
        assert_eq!(orders.query_value("order.date_created.from"), Some("2024-03-01T00:00:00.000Z"));

        let questions = page_request(ResourceKind::Questions, &account, 0, 50, since).unwrap();
        assert_eq!(questions.query_value("seller_id"), Some("1001"));

        assert!(page_request(ResourceKind::Shipments, &account, 0, 50, since).is_none());
    }

    #[test]
    fn test_page_entries() {
        let body = json!({"results": ["MLA1", "MLA2"], "paging": {"total": 2}});
        assert_eq!(page_entries(ResourceKind::Items, &body).len(), 2);
        assert!(page_entries(ResourceKind::Questions, &body).is_empty());
        assert_eq!(page_entries(ResourceKind::Questions, &json!({"questions": [{"id": 1}]})).len(), 1);
        assert!(page_entries(ResourceKind::Orders, &json!({})).is_empty());
    }

    #[test]
    fn test_record_request() {
        assert_eq!(record_request(ResourceKind::Shipments, "44").path, "/shipments/44");
        assert_eq!(record_request(ResourceKind::Items, "MLA1").path, "/items/MLA1");
    }
}
