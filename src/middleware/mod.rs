pub mod auth;
pub mod ownership;
pub mod response;
pub mod unique_fields;

pub use auth::AuthUser;
pub use response::{ApiResponse, ApiResult};
