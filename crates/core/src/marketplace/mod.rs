//! Marketplace resource API

pub mod ports;

pub use ports::{upstream_message, ApiMethod, ApiRequest, MarketplaceApi};
