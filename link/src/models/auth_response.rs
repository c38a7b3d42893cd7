use serde::{Deserialize, Serialize};

use super::token_pair::TokenPair;
use super::user::User;

/// Payload of a successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: TokenPair,
}

/// Payload of a successful token refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub tokens: TokenPair,
}

/// Payload of `POST /auth/logout`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutResponse {
    #[serde(default)]
    pub success: bool,
}

/// Payload of `GET /me` and `PATCH /me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: User,
}
