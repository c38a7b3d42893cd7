//! Data models for the tryout-link client library.
//!
//! Defines the response envelope and the request/response bodies of the
//! auth endpoints.

pub mod auth_response;
pub mod envelope;
pub mod field_error;
pub mod http_version;
pub mod login_request;
pub mod refresh_request;
pub mod register_request;
pub mod token_pair;
pub mod update_profile_request;
pub mod user;
pub mod user_id;
pub mod user_role;


pub use auth_response::{AuthResponse, LogoutResponse, MeResponse, RefreshResponse};
pub use envelope::{ApiEnvelope, ErrorEnvelope};
pub use field_error::FieldError;
pub use http_version::HttpVersion;
pub use login_request::LoginRequest;
pub use refresh_request::RefreshRequest;
pub use register_request::RegisterRequest;
pub use token_pair::TokenPair;
pub use update_profile_request::UpdateProfileRequest;
pub use user::User;
pub use user_id::UserId;
pub use user_role::UserRole;
