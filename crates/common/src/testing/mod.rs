//! Testing utilities and helpers
//!
//! - **[`mocks`]**: scripted [`OAuthClientTrait`](crate::auth::OAuthClientTrait)
//!   implementation for service tests in downstream crates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sellersync_common::testing::MockOAuthClient;
//!
//! let oauth = MockOAuthClient::new();
//! oauth.push_refresh(Err(MockOAuthClient::rejected(400, "invalid_grant")));
//! ```

#[cfg(feature = "platform")]
pub mod mocks;

#[cfg(feature = "platform")]
pub use mocks::MockOAuthClient;
