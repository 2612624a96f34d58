//! External service integrations

pub mod marketplace;

pub use marketplace::MarketplaceClient;
