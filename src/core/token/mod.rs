//! Token lifecycle: signed artifacts, statuses and the manager

mod artifact;
mod manager;
mod status;

pub use artifact::{ArtifactError, ArtifactSigner, Claims, TokenKind};
pub use manager::{CreateTokenRequest, IssuedTokens, TokenManager, TokenResponse, TokenValidation};
pub use status::TokenStatus;
