//! Serving usable access tokens to the rest of the engine

pub mod broker;
pub mod codec;

pub use broker::TokenBroker;
pub use codec::{CredentialCodec, TokenPair};
