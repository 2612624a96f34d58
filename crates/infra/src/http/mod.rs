//! HTTP client plumbing shared by outbound integrations.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
