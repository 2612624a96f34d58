//! OAuth 2.0 + PKCE primitives for the marketplace
//!
//! # Architecture
//!
//! ```text
//! OAuthHandshake (core) ──► OAuthClientTrait ──► OAuthClient (token endpoint)
//!         │
//!         ├──► pkce            verifier / S256 challenge / state
//!         └──► state_cookie    signed fallback carrying the state token
//! ```
//!
//! Storage of pending state and issued tokens lives behind core ports; this
//! module only speaks the protocol.

pub mod client;
pub mod pkce;
pub mod state_cookie;
pub mod traits;
pub mod types;

pub use client::{OAuthClient, OAuthClientError};
pub use pkce::PKCEChallenge;
pub use state_cookie::StateCookieSigner;
pub use traits::OAuthClientTrait;
pub use types::{OAuthConfig, TokenResponse, TokenSet};
