pub mod error;
pub mod filter_where;
pub mod matcher;
pub mod query;
pub mod types;

pub use error::FilterError;
pub use types::*;
