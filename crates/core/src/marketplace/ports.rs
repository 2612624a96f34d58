//! Port interface for authenticated marketplace API calls

use async_trait::async_trait;
use sellersync_domain::Result;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// A marketplace API call, independent of the credentials it is sent with.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: ApiMethod,
    /// Path relative to the API base URL, starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: ApiMethod::Get, path: path.into(), query: Vec::new(), body: None }
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// First query value for `key`.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Trait for sending requests to the marketplace resource API
///
/// Implementations map a 401 to `SellerSyncError::Unauthorized`, any other
/// non-2xx to `SellerSyncError::UpstreamError` (message via
/// [`upstream_message`]) and transport failures to `SellerSyncError::Network`.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn send(&self, access_token: &str, request: &ApiRequest) -> Result<Value>;
}

/// Best-effort human message from a marketplace error payload.
///
/// Error bodies are not uniformly shaped: tries `message`, then `error`, then
/// a `cause` array of `{code, message}` objects joined with `; `.
#[must_use]
pub fn upstream_message(body: &Value) -> Option<String> {
    let non_empty = |v: &Value| v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    if let Some(message) = body.get("message").and_then(non_empty) {
        return Some(message);
    }
    if let Some(error) = body.get("error").and_then(non_empty) {
        return Some(error);
    }
    let causes: Vec<String> = body
        .get("cause")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|cause| {
            let message = cause.get("message").and_then(non_empty);
            let code = cause.get("code").and_then(|c| match c {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            match (code, message) {
                (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                (None, Some(message)) => Some(message),
                (Some(code), None) => Some(code),
                (None, None) => None,
            }
        })
        .collect();
    (!causes.is_empty()).then(|| causes.join("; "))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Validates message extraction precedence.
    ///
    /// Assertions:
    /// - `message` wins over `error` and `cause`.
    /// - `error` is used when `message` is absent or blank.
    /// - `cause` entries are joined in order.
    #[test]
    fn test_upstream_message_precedence() {
        assert_eq!(
            upstream_message(&json!({"message": "item not found", "error": "not_found"})).as_deref(),
            Some("item not found")
        );
        assert_eq!(
            upstream_message(&json!({"message": " ", "error": "forbidden"})).as_deref(),
            Some("forbidden")
        );
        assert_eq!(
            upstream_message(&json!({"cause": [
                {"code": "item.price.invalid", "message": "price too low"},
                {"code": 42, "message": "second"}
            ]}))
            .as_deref(),
            Some("item.price.invalid: price too low; 42: second")
        );
        assert_eq!(upstream_message(&json!({"status": 500})), None);
        assert_eq!(upstream_message(&json!("plain text")), None);
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get("/orders/search").query("seller", 7).query("offset", 0);
        assert_eq!(request.query_value("seller"), Some("7"));
        assert_eq!(request.query_value("limit"), None);
        assert_eq!(request.method, ApiMethod::Get);
    }
}
