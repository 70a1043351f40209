pub mod auth;
pub mod response;

pub use auth::forward_auth_middleware;
pub use response::{ApiResponse, ApiResult};
