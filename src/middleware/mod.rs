pub mod auth;
pub mod extract;
pub mod rate_limit;
pub mod response;

pub use auth::{jwt_auth_middleware, require_admin_middleware, AuthUser};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use rate_limit::{rate_limit_middleware, RateLimiter};
pub use response::{ApiResponse, ApiResult, CsvResponse};
