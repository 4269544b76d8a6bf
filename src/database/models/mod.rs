pub mod api_request;
pub mod api_token;
pub mod user;

pub use api_request::ApiRequestLog;
pub use api_token::ApiToken;
pub use user::User;
