//! Token lifecycle outcomes
//!
//! These are results, not errors: a call that returns `IdentityNotActive`
//! executed successfully and denied the request.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    Ok,
    /// Bad structure or signature
    #[serde(rename = "TOKEN_INVALID")]
    Invalid,
    /// Record or its namespace is gone
    #[serde(rename = "TOKEN_NOT_FOUND")]
    NotFound,
    #[serde(rename = "TOKEN_DISABLED")]
    Disabled,
    #[serde(rename = "TOKEN_EXPIRED")]
    Expired,
    /// An access artifact was presented for refresh
    #[serde(rename = "TOKEN_IS_NOT_REFRESH_TOKEN")]
    NotRefreshToken,
    IdentityNotFound,
    IdentityNotActive,
    /// The identity's current policies no longer cover the token's scopes
    IdentityUnauthenticated,
    /// The requested scopes are not covered
    Unauthorized,
    CredentialsInvalid,
}

impl TokenStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, TokenStatus::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Ok => "OK",
            TokenStatus::Invalid => "TOKEN_INVALID",
            TokenStatus::NotFound => "TOKEN_NOT_FOUND",
            TokenStatus::Disabled => "TOKEN_DISABLED",
            TokenStatus::Expired => "TOKEN_EXPIRED",
            TokenStatus::NotRefreshToken => "TOKEN_IS_NOT_REFRESH_TOKEN",
            TokenStatus::IdentityNotFound => "IDENTITY_NOT_FOUND",
            TokenStatus::IdentityNotActive => "IDENTITY_NOT_ACTIVE",
            TokenStatus::IdentityUnauthenticated => "IDENTITY_UNAUTHENTICATED",
            TokenStatus::Unauthorized => "UNAUTHORIZED",
            TokenStatus::CredentialsInvalid => "CREDENTIALS_INVALID",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
