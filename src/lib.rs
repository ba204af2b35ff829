//! # Bastion - Namespaced IAM Authorization and Token Lifecycle
//!
//! `bastion-iam` is the core of an identity and access management service:
//!
//! - **Wildcard scope authorization**: a pure function deciding whether held
//!   scopes (`resources`/`actions` patterns such as `orders*`) cover requested ones
//! - **Namespace-partitioned directory** of identities, policies and tokens,
//!   fronted by a cache-aside layer with TTL self-healing
//! - **Token lifecycle**: create, validate, refresh (with re-authorization
//!   against the identity's current policies), disable, delete, list
//!
//! Storage, namespaces, caching and credential checks are external
//! collaborators behind async traits; in-memory implementations are included.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bastion_iam::{
//!     Config, CreateTokenRequest, Engine, MemoryBackend, MemoryCredentials, NewIdentity,
//!     NewPolicy, Scope, TokenStatus,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> bastion_iam::Result<()> {
//! let backend = Arc::new(MemoryBackend::new());
//! let credentials = Arc::new(MemoryCredentials::new());
//! backend.create_namespace("shop");
//!
//! let engine = Engine::builder(Config::with_secret("0123456789abcdef0123456789abcdef"))
//!     .with_backend(backend)
//!     .with_credentials(credentials.clone())
//!     .build()?;
//!
//! let policy = engine
//!     .directory()
//!     .policies()
//!     .create(
//!         "shop",
//!         NewPolicy {
//!             name: "order-readers".into(),
//!             resources: vec!["orders*".into()],
//!             actions: vec!["read".into()],
//!         },
//!     )
//!     .await?;
//!
//! let alice = engine
//!     .directory()
//!     .identities()
//!     .create(
//!         "shop",
//!         NewIdentity {
//!             name: "alice".into(),
//!             active: true,
//!             policies: vec![policy.reference()],
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//! credentials.set_secret("shop", alice.uuid, "hunter2");
//!
//! let response = engine
//!     .tokens()
//!     .create(CreateTokenRequest::new("shop", alice.uuid.to_string(), "hunter2"))
//!     .await?;
//! let issued = response.issued.expect("token issued");
//!
//! let wanted = [Scope::new("shop", vec!["orders/42".into()], vec!["read".into()])];
//! let status = engine.tokens().check_access(&issued.access, &wanted).await?;
//! assert_eq!(status, TokenStatus::Ok);
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    clock::{Clock, ManualClock, SystemClock},
    config::Config,
    directory::{
        ActiveFilter, Directory, Identity, IdentityPatch, IdentityRepository, NewIdentity,
        NewPolicy, Policy, PolicyPatch, PolicyRef, PolicyRepository, TokenData, TokenRepository,
    },
    error::{ErrorCode, IamError, Result},
    iam::{Decision, PatternMatcher, Scope, ScopeAuthorizer},
    storage::{
        Cache, CredentialVerifier, DocumentStore, MemoryBackend, MemoryCache, MemoryCredentials,
        NamespaceRegistry, StoreError,
    },
    token::{
        ArtifactError, ArtifactSigner, Claims, CreateTokenRequest, IssuedTokens, TokenKind,
        TokenManager, TokenResponse, TokenStatus, TokenValidation,
    },
};

use std::sync::Arc;
use tracing::info;

/// A fully wired engine: directory plus token lifecycle manager
pub struct Engine {
    directory: Directory,
    tokens: TokenManager,
    namespaces: Arc<dyn NamespaceRegistry>,
    credentials: Arc<dyn CredentialVerifier>,
    config: Config,
}

impl Engine {
    /// Start building an engine; collaborators default to in-memory ones
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn namespaces(&self) -> &Arc<dyn NamespaceRegistry> {
        &self.namespaces
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialVerifier> {
        &self.credentials
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: Config,
    store: Option<Arc<dyn DocumentStore>>,
    namespaces: Option<Arc<dyn NamespaceRegistry>>,
    cache: Option<Arc<dyn Cache>>,
    credentials: Option<Arc<dyn CredentialVerifier>>,
    clock: Option<Arc<dyn Clock>>,
}

impl EngineBuilder {
    pub fn new(config: Config) -> Self {
        EngineBuilder {
            config,
            store: None,
            namespaces: None,
            cache: None,
            credentials: None,
            clock: None,
        }
    }

    /// Use one backend as both document store and namespace registry
    pub fn with_backend<B>(mut self, backend: Arc<B>) -> Self
    where
        B: DocumentStore + NamespaceRegistry + 'static,
    {
        let store: Arc<dyn DocumentStore> = backend.clone();
        let namespaces: Arc<dyn NamespaceRegistry> = backend;
        self.store = Some(store);
        self.namespaces = Some(namespaces);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_namespaces(mut self, namespaces: Arc<dyn NamespaceRegistry>) -> Self {
        self.namespaces = Some(namespaces);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialVerifier>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and wire everything together
    ///
    /// # Errors
    ///
    /// `Config` if the configuration is invalid, or if only one of the
    /// document store and namespace registry was supplied.
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;

        let (store, namespaces): (Arc<dyn DocumentStore>, Arc<dyn NamespaceRegistry>) =
            match (self.store, self.namespaces) {
                (Some(store), Some(namespaces)) => (store, namespaces),
                (None, None) => {
                    let backend = Arc::new(MemoryBackend::new());
                    let store: Arc<dyn DocumentStore> = backend.clone();
                    let namespaces: Arc<dyn NamespaceRegistry> = backend;
                    (store, namespaces)
                }
                _ => {
                    return Err(IamError::Config(
                        "document store and namespace registry must be supplied together"
                            .to_string(),
                    ))
                }
            };

        let cache: Arc<dyn Cache> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(MemoryCache::new(self.config.cache.capacity)),
        };
        let credentials: Arc<dyn CredentialVerifier> = match self.credentials {
            Some(credentials) => credentials,
            None => Arc::new(MemoryCredentials::new()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let directory = Directory::new(store, namespaces.clone(), cache, self.config.cache.ttl());
        let tokens = TokenManager::new(
            directory.clone(),
            credentials.clone(),
            ArtifactSigner::new(self.config.signing.secret.as_bytes()),
            clock,
            self.config.tokens.ttl(),
        );

        info!(
            token_ttl_secs = self.config.tokens.ttl_secs,
            cache_ttl_secs = self.config.cache.ttl_secs,
            "engine initialized"
        );

        Ok(Engine {
            directory,
            tokens,
            namespaces,
            credentials,
            config: self.config,
        })
    }
}
