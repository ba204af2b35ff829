//! Token lifecycle manager
//!
//! States: active, disabled, expired (derived from `expires_at`), and absent.
//!
//! Check order for a presented artifact, first failure wins:
//! 1. structure and signature (`TOKEN_INVALID`, no I/O)
//! 2. for refresh only, the `kind` claim (`TOKEN_IS_NOT_REFRESH_TOKEN`, no I/O)
//! 3. record existence (`TOKEN_NOT_FOUND`, also when the namespace is gone)
//! 4. disabled flag (`TOKEN_DISABLED`), so a disabled token that has also
//!    expired reports `TOKEN_DISABLED`
//! 5. expiry against the injected clock (`TOKEN_EXPIRED`)

use super::artifact::{ArtifactSigner, Claims, TokenKind};
use super::status::TokenStatus;
use crate::core::clock::Clock;
use crate::core::directory::{ActiveFilter, Directory, Identity, TokenData};
use crate::core::error::{IamError, Result};
use crate::core::iam::{Decision, Scope, ScopeAuthorizer};
use crate::core::storage::CredentialVerifier;
use crate::core::validation::{parse_uuid, validate_namespace, validate_scopes};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Parameters for issuing a token pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTokenRequest {
    pub namespace: String,
    /// Identity uuid, as text
    pub identity: String,
    pub secret: String,
    /// Requested scopes; empty means "everything the identity's policies grant"
    #[serde(default)]
    pub scopes: Vec<Scope>,
    #[serde(default)]
    pub metadata: String,
}

impl CreateTokenRequest {
    pub fn new(
        namespace: impl Into<String>,
        identity: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        CreateTokenRequest {
            namespace: namespace.into(),
            identity: identity.into(),
            secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<Scope>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }
}

/// A freshly signed access/refresh pair and its record
#[derive(Debug, Clone, Serialize)]
pub struct IssuedTokens {
    pub access: String,
    pub refresh: String,
    pub token: TokenData,
}

/// Result of `create` and `refresh`
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub status: TokenStatus,
    pub issued: Option<IssuedTokens>,
}

impl TokenResponse {
    fn denied(status: TokenStatus) -> Self {
        TokenResponse {
            status,
            issued: None,
        }
    }

    fn issued(tokens: IssuedTokens) -> Self {
        TokenResponse {
            status: TokenStatus::Ok,
            issued: Some(tokens),
        }
    }
}

/// Result of `validate`
#[derive(Debug, Clone, Serialize)]
pub struct TokenValidation {
    pub status: TokenStatus,
    /// Present only when the status is `OK`
    pub token: Option<TokenData>,
    pub kind: Option<TokenKind>,
}

enum Inspection {
    Valid { claims: Claims, token: TokenData },
    Rejected(TokenStatus),
}

/// Issues and retires token pairs for directory identities
pub struct TokenManager {
    directory: Directory,
    credentials: Arc<dyn CredentialVerifier>,
    signer: ArtifactSigner,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl TokenManager {
    pub fn new(
        directory: Directory,
        credentials: Arc<dyn CredentialVerifier>,
        signer: ArtifactSigner,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        TokenManager {
            directory,
            credentials,
            signer,
            clock,
            ttl,
        }
    }

    /// Authenticate an identity and issue a token pair
    ///
    /// Denials come back as statuses: `CREDENTIALS_INVALID` (unknown identity
    /// or wrong secret), `IDENTITY_NOT_ACTIVE`, `UNAUTHORIZED` (requested
    /// scopes not covered by the identity's policies).
    pub async fn create(&self, request: CreateTokenRequest) -> Result<TokenResponse> {
        validate_namespace(&request.namespace)?;
        let identity_id = parse_uuid("identity uuid", &request.identity)?;
        validate_scopes(&request.scopes)?;

        let namespace = request.namespace.as_str();

        let identity = match self
            .directory
            .identities()
            .lookup(namespace, identity_id, false)
            .await?
        {
            Some(identity) => identity,
            None => {
                warn!(namespace, identity = %identity_id, "token request for unknown identity");
                return Ok(TokenResponse::denied(TokenStatus::CredentialsInvalid));
            }
        };

        if !self
            .credentials
            .verify(&identity, namespace, &request.secret)
            .await?
        {
            warn!(namespace, identity = %identity_id, "token request with invalid credentials");
            return Ok(TokenResponse::denied(TokenStatus::CredentialsInvalid));
        }

        if !identity.active {
            warn!(namespace, identity = %identity_id, "token request for inactive identity");
            return Ok(TokenResponse::denied(TokenStatus::IdentityNotActive));
        }

        let held = self.directory.flatten_policies(&identity).await?;

        let scopes = if request.scopes.is_empty() {
            held
        } else {
            match ScopeAuthorizer::evaluate(&held, &request.scopes) {
                Decision::Allow => request.scopes,
                Decision::Deny {
                    namespace: scope_ns,
                    resource,
                    action,
                } => {
                    warn!(
                        namespace,
                        identity = %identity_id,
                        scope_namespace = %scope_ns,
                        resource = %resource,
                        action = %action,
                        "requested scope not covered by identity policies"
                    );
                    return Ok(TokenResponse::denied(TokenStatus::Unauthorized));
                }
            }
        };

        let issued = self.mint(&identity, scopes, request.metadata).await?;
        info!(
            namespace,
            identity = %identity_id,
            token = %issued.token.uuid,
            "token pair issued"
        );
        Ok(TokenResponse::issued(issued))
    }

    /// Check an artifact's signature and its record's state
    pub async fn validate(&self, artifact: &str, use_cache: bool) -> Result<TokenValidation> {
        match self.inspect(artifact, use_cache, false).await? {
            Inspection::Valid { claims, token } => Ok(TokenValidation {
                status: TokenStatus::Ok,
                token: Some(token),
                kind: Some(claims.kind),
            }),
            Inspection::Rejected(status) => Ok(TokenValidation {
                status,
                token: None,
                kind: None,
            }),
        }
    }

    /// Exchange a refresh artifact for a new pair
    ///
    /// After the artifact checks, the identity is re-resolved and its
    /// *current* policies must still cover the token's scopes; otherwise the
    /// status is `IDENTITY_UNAUTHENTICATED`. The new record copies scopes,
    /// namespace, identity and metadata and gets a fresh uuid and lifetime.
    /// The presented record is left as it is.
    pub async fn refresh(&self, artifact: &str) -> Result<TokenResponse> {
        let token = match self.inspect(artifact, false, true).await? {
            Inspection::Valid { token, .. } => token,
            Inspection::Rejected(status) => return Ok(TokenResponse::denied(status)),
        };

        let namespace = token.namespace.as_str();

        let identity = match self
            .directory
            .identities()
            .lookup(namespace, token.identity, false)
            .await?
        {
            Some(identity) => identity,
            None => {
                warn!(namespace, token = %token.uuid, "refresh for deleted identity");
                return Ok(TokenResponse::denied(TokenStatus::IdentityNotFound));
            }
        };

        if !identity.active {
            warn!(namespace, token = %token.uuid, "refresh for inactive identity");
            return Ok(TokenResponse::denied(TokenStatus::IdentityNotActive));
        }

        let held = self.directory.flatten_policies(&identity).await?;
        if let Decision::Deny {
            namespace: scope_ns,
            resource,
            action,
        } = ScopeAuthorizer::evaluate(&held, &token.scopes)
        {
            warn!(
                namespace,
                token = %token.uuid,
                scope_namespace = %scope_ns,
                resource = %resource,
                action = %action,
                "token scopes no longer covered by identity policies"
            );
            return Ok(TokenResponse::denied(TokenStatus::IdentityUnauthenticated));
        }

        let issued = self
            .mint(&identity, token.scopes.clone(), token.creation_metadata.clone())
            .await?;
        info!(
            namespace,
            previous = %token.uuid,
            token = %issued.token.uuid,
            "token pair refreshed"
        );
        Ok(TokenResponse::issued(issued))
    }

    /// Validate an artifact, then check its embedded scopes cover `requested`
    pub async fn check_access(&self, artifact: &str, requested: &[Scope]) -> Result<TokenStatus> {
        validate_scopes(requested)?;

        let token = match self.inspect(artifact, true, false).await? {
            Inspection::Valid { token, .. } => token,
            Inspection::Rejected(status) => return Ok(status),
        };

        match ScopeAuthorizer::evaluate(&token.scopes, requested) {
            Decision::Allow => Ok(TokenStatus::Ok),
            Decision::Deny {
                namespace,
                resource,
                action,
            } => {
                debug!(
                    token = %token.uuid,
                    scope_namespace = %namespace,
                    resource = %resource,
                    action = %action,
                    "access denied"
                );
                Ok(TokenStatus::Unauthorized)
            }
        }
    }

    /// Disable a token; missing or already-disabled tokens are no-ops
    pub async fn disable(&self, namespace: &str, uuid: &str) -> Result<()> {
        let uuid = parse_uuid("token uuid", uuid)?;
        validate_namespace(namespace)?;
        self.directory.tokens().disable(namespace, uuid).await?;
        Ok(())
    }

    /// Delete a token; missing tokens are no-ops
    pub async fn delete(&self, namespace: &str, uuid: &str) -> Result<()> {
        let uuid = parse_uuid("token uuid", uuid)?;
        validate_namespace(namespace)?;
        self.directory.tokens().delete(namespace, uuid).await?;
        Ok(())
    }

    /// Fetch a token record
    pub async fn get_token(&self, namespace: &str, uuid: &str, use_cache: bool) -> Result<TokenData> {
        self.directory.tokens().get(namespace, uuid, use_cache).await
    }

    /// Newest-first tokens of one identity, filtered then paginated
    pub async fn tokens_for_identity(
        &self,
        namespace: &str,
        identity: &str,
        filter: ActiveFilter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<TokenData>> {
        let identity = parse_uuid("identity uuid", identity)?;
        self.directory
            .tokens()
            .list_for_identity(namespace, identity, filter, self.clock.now(), skip, limit)
            .await
    }

    async fn inspect(&self, artifact: &str, use_cache: bool, require_refresh: bool) -> Result<Inspection> {
        let claims = match self.signer.decode(artifact) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "rejecting malformed token artifact");
                return Ok(Inspection::Rejected(TokenStatus::Invalid));
            }
        };

        if require_refresh && claims.kind != TokenKind::Refresh {
            return Ok(Inspection::Rejected(TokenStatus::NotRefreshToken));
        }

        if validate_namespace(&claims.ns).is_err() {
            return Ok(Inspection::Rejected(TokenStatus::Invalid));
        }

        let token = match self
            .directory
            .tokens()
            .lookup(&claims.ns, claims.jti, use_cache)
            .await?
        {
            Some(token) => token,
            None => return Ok(Inspection::Rejected(TokenStatus::NotFound)),
        };

        if token.disabled {
            return Ok(Inspection::Rejected(TokenStatus::Disabled));
        }

        if token.is_expired(self.clock.now()) {
            return Ok(Inspection::Rejected(TokenStatus::Expired));
        }

        Ok(Inspection::Valid { claims, token })
    }

    async fn mint(&self, identity: &Identity, scopes: Vec<Scope>, metadata: String) -> Result<IssuedTokens> {
        let now = self.clock.now();
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            IamError::Config(format!(
                "token lifetime of {}s overflows the clock",
                self.ttl.num_seconds()
            ))
        })?;
        let token = TokenData {
            namespace: identity.namespace.clone(),
            uuid: Uuid::new_v4(),
            identity: identity.uuid,
            disabled: false,
            expires_at,
            scopes,
            created_at: now,
            creation_metadata: metadata,
        };

        self.directory.tokens().insert(&token).await?;

        let mut claims = Claims {
            jti: token.uuid,
            sub: identity.uuid,
            ns: token.namespace.clone(),
            exp: token.expires_at.timestamp(),
            iat: now.timestamp(),
            kind: TokenKind::Access,
        };
        let access = self.signer.encode(&claims)?;
        claims.kind = TokenKind::Refresh;
        let refresh = self.signer.encode(&claims)?;

        Ok(IssuedTokens {
            access,
            refresh,
            token,
        })
    }
}
