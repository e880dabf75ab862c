//! Session store: login, logout, token refresh and permission queries
//!
//! The session is the one piece of process-wide mutable state in the client.
//! Only [`SessionStore::login`], [`SessionStore::refresh_tokens`] and
//! [`SessionStore::logout`] write it; everything else reads.

use crate::claims::{self, Claims, PermissionRequirement};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::token_store::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
use crate::types::{self, Envelope, LoginRequest, RefreshRequest, TokenPair};
use async_singleflight::Group;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";

/// Read-only view of a session, as consumed by the route guard
pub trait SessionView {
    /// Advisory only: a non-empty access token is present
    fn is_authenticated(&self) -> bool;

    /// Every required permission code is held. An empty requirement always passes.
    fn has_permission(&self, required: &PermissionRequirement) -> bool;
}

/// Point-in-time copy of the session state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    pub claims: Claims,
}

impl SessionView for SessionSnapshot {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn has_permission(&self, required: &PermissionRequirement) -> bool {
        self.claims.satisfies(required)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    access_token: String,
    refresh_token: String,
    claims: Claims,
    /// Bumped on logout so a refresh that was in flight cannot revive the session
    generation: u64,
}

/// Owner of the token pair and the claims derived from it
pub struct SessionStore {
    config: ClientConfig,
    storage: Arc<dyn TokenStorage>,
    state: RwLock<SessionState>,
    /// Authentication calls bypass the main request pipeline
    auth_client: Client,
    /// Singleflight group so requests racing on the same refresh token share one exchange
    refresh_singleflight: Group<TokenPair, ClientError>,
}

impl SessionStore {
    /// Create a session store, restoring any tokens already in `storage`
    pub fn new(config: ClientConfig, storage: Arc<dyn TokenStorage>) -> Result<Arc<Self>> {
        let auth_client = Client::builder().timeout(config.request_timeout).build()?;

        let stored = storage.load()?;
        let claims = derive_claims(&stored.access_token);
        if !stored.access_token.is_empty() {
            info!(username = %claims.username, "Restored persisted session");
        }

        Ok(Arc::new(Self {
            config,
            storage,
            state: RwLock::new(SessionState {
                access_token: stored.access_token,
                refresh_token: stored.refresh_token,
                claims,
                generation: 0,
            }),
            auth_client,
            refresh_singleflight: Group::new(),
        }))
    }

    /// Create a session store whose storage is chosen by `config.token_file`
    pub fn from_config(config: ClientConfig) -> Result<Arc<Self>> {
        let storage: Arc<dyn TokenStorage> = match &config.token_file {
            Some(path) => Arc::new(FileTokenStorage::new(path)),
            None => Arc::new(MemoryTokenStorage::new()),
        };
        Self::new(config, storage)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Exchange credentials for a token pair.
    ///
    /// On failure the existing session is left exactly as it was.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let pair: TokenPair = self.auth_request(LOGIN_PATH, &request).await.inspect_err(|e| {
            warn!(username = %username, error = %e, "Login failed");
        })?;

        self.set_tokens(&pair, None)?;
        info!(username = %self.username(), "Logged in");
        Ok(())
    }

    /// Exchange the stored refresh token for a new pair and install it.
    ///
    /// Fails with [`ClientError::NoSession`] when there is no refresh token.
    pub async fn refresh_tokens(&self) -> Result<TokenPair> {
        let refresh_token = self.refresh_token();
        if refresh_token.is_empty() {
            return Err(ClientError::NoSession);
        }

        if !self.config.coalesce_refresh {
            return self.exchange_refresh_token(refresh_token).await;
        }

        let key = refresh_token.clone();
        let (success_opt, error_opt, _shared) = self
            .refresh_singleflight
            .work(&key, self.exchange_refresh_token(refresh_token))
            .await;

        match (success_opt, error_opt) {
            (Some(pair), None) => Ok(pair),
            (None, Some(err)) => Err(err),
            _ => Err(ClientError::Authentication("Unknown error during token refresh".to_string())),
        }
    }

    async fn exchange_refresh_token(&self, refresh_token: String) -> Result<TokenPair> {
        let generation = self.state.read().generation;
        debug!("Exchanging refresh token");

        let request = RefreshRequest { refresh_token };
        let pair: TokenPair = self.auth_request(REFRESH_PATH, &request).await?;

        // A logout that landed while the exchange was in flight wins
        self.set_tokens(&pair, Some(generation))?;
        info!(username = %self.username(), "Tokens refreshed");
        Ok(pair)
    }

    /// Clear claims, tokens and persisted storage. Safe to call repeatedly.
    pub fn logout(&self) -> Result<()> {
        let mut state = self.state.write();
        let was_authenticated = !state.access_token.is_empty() || !state.refresh_token.is_empty();
        state.access_token.clear();
        state.refresh_token.clear();
        state.claims = Claims::default();
        state.generation += 1;

        // Cleared under the write guard so no concurrent set_tokens can re-persist in between
        self.storage.clear()?;
        drop(state);

        if was_authenticated {
            info!("Logged out");
        }
        Ok(())
    }

    /// Decode token claims without network access or signature checks
    pub fn parse_token(token: &str) -> Result<Claims> {
        claims::parse_token(token)
    }

    /// True iff every required permission code is held
    pub fn has_permission(&self, required: impl Into<PermissionRequirement>) -> bool {
        self.state.read().claims.satisfies(&required.into())
    }

    /// True iff a non-empty access token is stored. Not a validity check.
    pub fn is_authenticated(&self) -> bool {
        !self.state.read().access_token.is_empty()
    }

    /// Current access token, if any
    pub fn access_token(&self) -> Option<String> {
        let state = self.state.read();
        (!state.access_token.is_empty()).then(|| state.access_token.clone())
    }

    /// Current refresh token (empty when there is none)
    pub fn refresh_token(&self) -> String {
        self.state.read().refresh_token.clone()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.state.read().refresh_token.is_empty()
    }

    pub fn claims(&self) -> Claims {
        self.state.read().claims.clone()
    }

    pub fn username(&self) -> String {
        self.state.read().claims.username.clone()
    }

    pub fn roles(&self) -> BTreeSet<String> {
        self.state.read().claims.roles.clone()
    }

    pub fn permissions(&self) -> BTreeSet<String> {
        self.state.read().claims.permissions.clone()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.state.read().claims.has_role(role)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            authenticated: !state.access_token.is_empty(),
            claims: state.claims.clone(),
        }
    }

    /// Persist the pair and swap it, with its claims, into memory under one write guard.
    ///
    /// With `expected_generation`, nothing is written if a logout happened since
    /// that generation was read.
    fn set_tokens(&self, pair: &TokenPair, expected_generation: Option<u64>) -> Result<()> {
        let claims = derive_claims(&pair.access_token);

        let mut state = self.state.write();
        if expected_generation.is_some_and(|generation| generation != state.generation) {
            warn!("Session ended during token refresh, discarding new tokens");
            return Err(ClientError::NoSession);
        }

        self.storage.save(&pair.access_token, &pair.refresh_token)?;
        state.access_token = pair.access_token.clone();
        state.refresh_token = pair.refresh_token.clone();
        state.claims = claims;
        Ok(())
    }

    async fn auth_request<B: Serialize>(&self, path: &str, body: &B) -> Result<TokenPair> {
        let timeout = self.config.request_timeout;
        let response = self
            .auth_client
            .post(self.config.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(e, timeout))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ClientError::from_transport(e, timeout))?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized {
                message: types::failure_message(&bytes),
            });
        }
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: types::failure_message(&bytes),
            });
        }

        decode_token_reply(types::parse_body(&bytes)?)
    }
}

impl SessionView for SessionStore {
    fn is_authenticated(&self) -> bool {
        SessionStore::is_authenticated(self)
    }

    fn has_permission(&self, required: &PermissionRequirement) -> bool {
        self.state.read().claims.satisfies(required)
    }
}

/// Authentication replies must come wrapped in the envelope
fn decode_token_reply(body: Value) -> Result<TokenPair> {
    let envelope = Envelope::detect(&body).ok_or_else(|| {
        ClientError::InvalidResponse("authentication reply is not an envelope".to_string())
    })?;
    envelope.into_outcome()?.into_result()
}

/// Claims for an access token; unusable tokens give empty claims
fn derive_claims(access_token: &str) -> Claims {
    if access_token.is_empty() {
        return Claims::default();
    }
    claims::parse_token(access_token).unwrap_or_else(|e| {
        warn!(error = %e, "Access token claims could not be decoded");
        Claims::default()
    })
}
