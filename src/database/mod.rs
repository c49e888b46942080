pub mod manager;
pub mod memory;
pub mod postgres;
pub mod query_builder;
pub mod record;
pub mod store;

pub use manager::DatabaseManager;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use record::{Record, RecordError};
pub use store::{RecordStore, StoreError, StoreResult};
