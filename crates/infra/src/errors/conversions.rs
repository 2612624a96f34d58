//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use sellersync_domain::SellerSyncError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SellerSyncError);

impl From<InfraError> for SellerSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SellerSyncError> for InfraError {
    fn from(value: SellerSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoSellerSyncError {
    fn into_domain(self) -> SellerSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → SellerSyncError */
/* -------------------------------------------------------------------------- */

impl IntoSellerSyncError for SqlError {
    fn into_domain(self) -> SellerSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        fn looks_like_wrong_key(message: &str) -> bool {
            let lower = message.to_ascii_lowercase();
            lower.contains("not a database") || lower.contains("encrypted")
        }

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        SellerSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        SellerSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        SellerSyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        SellerSyncError::Database("foreign key constraint violation".into())
                    }
                    (ErrorCode::NotADatabase, _) => SellerSyncError::Config(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    (_, _) if looks_like_wrong_key(&message) => SellerSyncError::Config(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    _ => SellerSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => SellerSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                SellerSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                SellerSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                SellerSyncError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => SellerSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => SellerSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_domain())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → SellerSyncError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(SellerSyncError::Database(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → SellerSyncError */
/* -------------------------------------------------------------------------- */

impl IntoSellerSyncError for HttpError {
    fn into_domain(self) -> SellerSyncError {
        if self.is_timeout() {
            return SellerSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return SellerSyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 => SellerSyncError::Unauthorized(message),
                _ => SellerSyncError::UpstreamError { status: code, message },
            };
        }

        if self.is_decode() {
            return SellerSyncError::UpstreamError {
                status: 200,
                message: format!("undecodable response body: {self}"),
            };
        }

        SellerSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_domain())
    }
}

/// Map a rusqlite error straight to the domain error.
pub fn map_sql_error(err: SqlError) -> SellerSyncError {
    InfraError::from(err).into()
}

/// Map a failed `spawn_blocking` join to the domain error.
pub fn map_join_error(err: JoinError) -> SellerSyncError {
    if err.is_cancelled() {
        SellerSyncError::Internal("blocking database task was cancelled".into())
    } else {
        SellerSyncError::Internal(format!("blocking database task panicked: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: SellerSyncError = InfraError::from(err).into();
        match mapped {
            SellerSyncError::Database(msg) => {
                assert!(msg.contains("busy") || msg.contains("locked"));
            }
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_key_maps_to_config_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::NotADatabase, extended_code: 26 },
            Some("file is not a database".into()),
        );

        let mapped = map_sql_error(err);
        assert!(matches!(mapped, SellerSyncError::Config(msg) if msg.contains("SQLCipher")));
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        assert!(matches!(map_sql_error(SqlError::QueryReturnedNoRows), SellerSyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn http_status_401_maps_to_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: SellerSyncError = InfraError::from(error).into();
        match mapped {
            SellerSyncError::Unauthorized(msg) => assert!(msg.contains("401")),
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_status_503_maps_to_retriable_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::SERVICE_UNAVAILABLE))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: SellerSyncError = InfraError::from(error).into();
        assert!(matches!(mapped, SellerSyncError::UpstreamError { status: 503, .. }));
        assert!(mapped.is_retriable());
    }
}
