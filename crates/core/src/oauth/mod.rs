//! PKCE authorization-code handshake

pub mod handshake;
pub mod ports;

pub use handshake::{HandshakeSettings, OAuthHandshake};
pub use ports::PendingAuthStore;
