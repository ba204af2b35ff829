//! Signed token artifacts (HS256 JWT)
//!
//! Every issued pair shares one token record and differs only in the `kind`
//! claim. Format is a standard three-part JWT:
//! - Header: `{"alg":"HS256","typ":"JWT"}`
//! - Payload: [`Claims`]
//! - Signature: HMAC-SHA256 over `base64url(header).base64url(payload)`
//!
//! Decoding checks structure and signature only. Expiry, disabled state and
//! existence are judged against the stored record, not the claims.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// JWT header (static for HS256)
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Errors from artifact decoding
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Invalid base64 encoding")]
    InvalidBase64,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unsupported algorithm")]
    UnsupportedAlgorithm,

    #[error("Invalid signature")]
    InvalidSignature,
}

/// Which half of a pair an artifact is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token record uuid
    pub jti: Uuid,
    /// Identity uuid
    pub sub: Uuid,
    /// Namespace of both the token and the identity
    pub ns: String,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Issued at, unix seconds
    pub iat: i64,
    pub kind: TokenKind,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Shared-secret signer/verifier
#[derive(Clone)]
pub struct ArtifactSigner {
    key: Vec<u8>,
}

impl ArtifactSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        ArtifactSigner {
            key: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size")
    }

    /// Encode and sign claims
    pub fn encode(&self, claims: &Claims) -> Result<String, serde_json::Error> {
        let header_b64 = URL_SAFE_NO_PAD.encode(JWT_HEADER);
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);

        let signing_input = format!("{header_b64}.{payload_b64}");

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify structure and signature, returning the claims
    pub fn decode(&self, token: &str) -> Result<Claims, ArtifactError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(ArtifactError::InvalidFormat);
        }

        let header_b64 = parts[0];
        let payload_b64 = parts[1];
        let signature_b64 = parts[2];

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| ArtifactError::InvalidBase64)?;
        let header: Header = serde_json::from_slice(&header_bytes)
            .map_err(|e| ArtifactError::InvalidJson(e.to_string()))?;
        if header.alg != "HS256" {
            return Err(ArtifactError::UnsupportedAlgorithm);
        }

        // Verify signature before trusting the payload
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| ArtifactError::InvalidBase64)?;

        let mut mac = self.mac();
        mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ArtifactError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| ArtifactError::InvalidBase64)?;

        serde_json::from_slice(&payload).map_err(|e| ArtifactError::InvalidJson(e.to_string()))
    }
}

impl std::fmt::Debug for ArtifactSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactSigner")
            .field("key", &"<redacted>")
            .finish()
    }
}
