//! Pull-sync of marketplace resources into the local mirror

pub mod fetcher;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod resources;

pub use fetcher::AuthenticatedFetcher;
pub use orchestrator::SyncOrchestrator;
pub use ports::MirrorRepository;
pub use registry::RunRegistry;
