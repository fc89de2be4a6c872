pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod store;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{DemoDataset, SeedError, SeedResult, SeededCollection, VerificationResult};
pub use store::SqlCollectionStore;
