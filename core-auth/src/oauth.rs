//! OAuth 2.0 Authorization Flow with PKCE Support
//!
//! Implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) against the four
//! supported storage providers.
//!
//! # Overview
//!
//! [`AuthorizationFlow`] owns the whole login lifecycle:
//! - Building authorization URLs with a PKCE challenge or for a
//!   confidential client
//! - Capturing the redirect on a loopback listener, or accepting an
//!   externally delivered redirect URI (`login_to_uri` / `process_redirect`)
//! - Validating the redirect (provider error, missing parameters, state)
//! - Exchanging the authorization code for a [`TokenSet`]
//! - Refreshing and revoking tokens
//!
//! # Security
//!
//! - Cryptographically random `state` and code verifier, single-use
//! - The code challenge is derived exclusively as
//!   `base64url_no_pad(SHA256(verifier))` and never recomputed elsewhere
//! - The state check is unconditional: a mismatched redirect is rejected
//!   even when it carries a syntactically valid code
//! - Token values, codes and verifiers are never logged
//!
//! # Failure semantics
//!
//! Every error is terminal for the login session it occurs in. There are no
//! internal retries; the caller restarts with a new login.

use crate::error::{AuthError, Result, TokenError};
use crate::listener::{ListenerStopper, RedirectListener};
use crate::types::{FlowState, ProviderKind, TokenSet};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::platform::BrowserLauncher;
use rand::Rng;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Lock helper that survives poisoning; flow bookkeeping must stay
/// reachable even if a task panicked while holding the guard.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How the client authenticates against the token endpoint.
///
/// Exactly one credential form accompanies a code exchange: the PKCE
/// verifier for public clients, or the client secret for confidential
/// clients — never both.
#[derive(Clone)]
pub enum ClientCredential {
    /// Public client: a PKCE verifier accompanies the code exchange.
    Pkce,
    /// Confidential client: the client secret accompanies the exchange.
    Secret(String),
}

impl ClientCredential {
    pub fn uses_pkce(&self) -> bool {
        matches!(self, ClientCredential::Pkce)
    }
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCredential::Pkce => write!(f, "Pkce"),
            ClientCredential::Secret(_) => write!(f, "Secret([REDACTED])"),
        }
    }
}

/// How the provider delivers the redirect back to this client.
#[derive(Debug, Clone)]
pub enum RedirectSpec {
    /// A loopback HTTP listener. `fixed_port: None` binds an ephemeral port
    /// before the authorize URL is built; `Some(port)` uses a
    /// pre-registered port whose availability is verified as a precondition.
    Loopback { fixed_port: Option<u16> },
    /// An OS-registered URI scheme (e.g. `cumulus://callback/`). The host
    /// captures the activation and hands the full URI to
    /// [`AuthorizationFlow::process_redirect`].
    External { uri: String },
}

/// How a provider revokes tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeStyle {
    /// POST with the token as a Bearer authorization header (Dropbox).
    Bearer,
    /// POST form with client credentials and the token in the body (Box).
    ClientForm,
}

/// A provider's token revocation endpoint.
#[derive(Debug, Clone)]
pub struct RevokeEndpoint {
    pub url: String,
    pub style: RevokeStyle,
}

/// OAuth 2.0 provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// The provider this configuration belongs to
    pub provider: ProviderKind,
    /// OAuth client ID
    pub client_id: String,
    /// The single credential form used at the token endpoint
    pub credential: ClientCredential,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Revocation endpoint, when the provider has one
    pub revoke: Option<RevokeEndpoint>,
    /// Redirect delivery mode
    pub redirect: RedirectSpec,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
    /// Provider-specific additions to the authorize URL
    /// (e.g. `token_access_type=offline` for Dropbox)
    pub extra_authorize_params: Vec<(String, String)>,
}

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// The verifier is a 64-character url-safe random string (within the
/// 43–128 range RFC 7636 requires). It stays secret until the code
/// exchange; only the derived challenge travels in the authorize URL.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
}

impl PkceVerifier {
    /// Generate a fresh verifier from 48 random bytes.
    pub fn new() -> Self {
        let mut bytes = [0u8; 48];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            verifier: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    /// The code verifier string.
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// Compute the S256 code challenge: BASE64URL-NOPAD(SHA256(verifier)).
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    #[cfg(test)]
    fn from_raw(verifier: impl Into<String>) -> Self {
        Self {
            verifier: verifier.into(),
        }
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PkceVerifier([REDACTED])")
    }
}

/// One login attempt: the single-use state, the redirect URI it was built
/// for, and the PKCE verifier when the provider is a public client.
///
/// Created at login start, consumed exactly once on a matching redirect,
/// discarded afterwards. A new login overwrites any pending session.
#[derive(Debug)]
pub struct AuthSession {
    /// Opaque random state, compared on redirect
    pub state: String,
    /// The redirect URI the authorize URL was built with
    pub redirect_uri: String,
    verifier: Option<PkceVerifier>,
}

impl AuthSession {
    pub fn new(redirect_uri: String, use_pkce: bool) -> Self {
        let mut state_bytes = [0u8; 16];
        rand::thread_rng().fill(&mut state_bytes);
        Self {
            state: URL_SAFE_NO_PAD.encode(state_bytes),
            redirect_uri,
            verifier: use_pkce.then(PkceVerifier::new),
        }
    }

    pub fn verifier(&self) -> Option<&PkceVerifier> {
        self.verifier.as_ref()
    }
}

/// Query parameters extracted from a redirect.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedirectQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Parse the relevant query parameters out of a redirect URI or a bare
/// query string.
pub fn parse_redirect_query(input: &str) -> RedirectQuery {
    let query_str = input.split_once('?').map(|(_, q)| q).unwrap_or(input);
    // Drop any fragment before parsing
    let query_str = query_str.split('#').next().unwrap_or(query_str);

    let mut out = RedirectQuery::default();
    for (key, value) in url::form_urlencoded::parse(query_str.as_bytes()) {
        match key.as_ref() {
            "code" => out.code = Some(value.into_owned()),
            "state" => out.state = Some(value.into_owned()),
            "error" => out.error = Some(value.into_owned()),
            _ => {}
        }
    }
    out
}

/// Token response from the OAuth provider's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Absent for non-expiring tokens; never guessed when missing.
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    scope: Option<String>,
}

/// Error body shape some token endpoints use for refusals.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
}

/// The authorization flow state machine.
///
/// One flow is active per client instance at a time; starting a new login
/// stops any previous loopback listener. See the module docs for the state
/// diagram.
pub struct AuthorizationFlow {
    config: OAuthConfig,
    http: Arc<dyn HttpClient>,
    browser: Arc<dyn BrowserLauncher>,
    state: Mutex<FlowState>,
    /// Pending session for the external-handoff path
    pending: Mutex<Option<AuthSession>>,
    /// Stop handle of the currently bound loopback listener
    listener_stop: Mutex<Option<ListenerStopper>>,
}

impl AuthorizationFlow {
    pub fn new(
        config: OAuthConfig,
        http: Arc<dyn HttpClient>,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            config,
            http,
            browser,
            state: Mutex::new(FlowState::Idle),
            pending: Mutex::new(None),
            listener_stop: Mutex::new(None),
        }
    }

    /// Current flow state.
    pub fn flow_state(&self) -> FlowState {
        *lock(&self.state)
    }

    /// The configuration this flow was built with.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn set_state(&self, state: FlowState) {
        *lock(&self.state) = state;
    }

    /// Stop any bound loopback listener. Idempotent: safe to call when
    /// nothing is listening. A flow waiting on the listener completes with
    /// `Cancelled`.
    pub fn stop_listen(&self) {
        if let Some(stopper) = lock(&self.listener_stop).as_ref() {
            debug!("Stopping redirect listener");
            stopper.stop();
        }
    }

    /// Run the full interactive loopback login:
    ///
    /// 1. Stop any previous listener and discard any pending session
    /// 2. Bind the loopback listener (ephemeral, or pre-checked fixed port)
    /// 3. Open the authorize URL in the system browser
    /// 4. Capture the single redirect request and validate it
    /// 5. Exchange the code for tokens
    ///
    /// # Errors
    ///
    /// Terminal for this attempt; see [`AuthError`]. A stopped listener
    /// surfaces as `AuthError::Cancelled`, never as a generic failure.
    #[instrument(skip(self), fields(provider = %self.config.provider))]
    pub async fn login(&self) -> Result<TokenSet> {
        let result = self.run_loopback_login().await;

        // The listener is gone whichever way the flow ended
        lock(&self.listener_stop).take();

        match &result {
            Ok(_) => self.set_state(FlowState::Authenticated),
            Err(AuthError::Cancelled) => self.set_state(FlowState::Cancelled),
            Err(_) => self.set_state(FlowState::Failed),
        }
        result
    }

    async fn run_loopback_login(&self) -> Result<TokenSet> {
        self.stop_listen();
        lock(&self.pending).take();

        let fixed_port = match &self.config.redirect {
            RedirectSpec::Loopback { fixed_port } => *fixed_port,
            RedirectSpec::External { .. } => {
                return Err(AuthError::RedirectMode(
                    "provider is configured for external redirect handoff; use login_to_uri"
                        .to_string(),
                ))
            }
        };

        // The port is fixed before the authorize URL exists, so an occupied
        // port must surface here and not as a bind failure mid-flow.
        let listener = RedirectListener::bind(fixed_port).await?;
        let session = AuthSession::new(
            listener.redirect_uri(),
            self.config.credential.uses_pkce(),
        );
        let authorize_url = self.build_authorize_url(&session)?;

        *lock(&self.listener_stop) = Some(listener.stopper());
        self.set_state(FlowState::Listening);

        info!("Opening browser for authorization");
        self.browser
            .open(&authorize_url)
            .map_err(|e| AuthError::Browser(e.to_string()))?;

        self.set_state(FlowState::AwaitingRedirect);
        let query = listener.capture().await?;

        let code = Self::validate_redirect(&session, &query)?;
        self.set_state(FlowState::Exchanging);
        self.exchange_code(&session, &code).await
    }

    /// Start an external-handoff login: build the authorize URL for the
    /// registered URI scheme, open the browser and return the `state`
    /// immediately. The host delivers the redirect later through
    /// [`process_redirect`](Self::process_redirect).
    #[instrument(skip(self), fields(provider = %self.config.provider))]
    pub fn login_to_uri(&self) -> Result<String> {
        self.stop_listen();

        let uri = match &self.config.redirect {
            RedirectSpec::External { uri } => uri.clone(),
            RedirectSpec::Loopback { .. } => {
                return Err(AuthError::RedirectMode(
                    "provider is configured for a loopback listener; use login".to_string(),
                ))
            }
        };

        let session = AuthSession::new(uri, self.config.credential.uses_pkce());
        let authorize_url = self.build_authorize_url(&session)?;
        let state = session.state.clone();

        // A new login overwrites any previous pending session
        *lock(&self.pending) = Some(session);
        self.set_state(FlowState::AwaitingRedirect);

        info!("Opening browser for authorization (external redirect)");
        self.browser
            .open(&authorize_url)
            .map_err(|e| AuthError::Browser(e.to_string()))?;

        Ok(state)
    }

    /// Complete an external-handoff login with the redirect URI the OS
    /// delivered. Consumes the pending session whatever the outcome.
    #[instrument(skip(self, uri), fields(provider = %self.config.provider))]
    pub async fn process_redirect(&self, state: &str, uri: &str) -> Result<TokenSet> {
        let session = lock(&self.pending)
            .take()
            .ok_or(AuthError::NoPendingLogin)?;

        let result = self.process_redirect_inner(&session, state, uri).await;
        match &result {
            Ok(_) => self.set_state(FlowState::Authenticated),
            Err(AuthError::Cancelled) => self.set_state(FlowState::Cancelled),
            Err(_) => self.set_state(FlowState::Failed),
        }
        result
    }

    async fn process_redirect_inner(
        &self,
        session: &AuthSession,
        caller_state: &str,
        uri: &str,
    ) -> Result<TokenSet> {
        let query = parse_redirect_query(uri);
        let code = Self::validate_redirect(session, &query)?;

        // The caller must address the session it was handed at login start
        if caller_state != session.state {
            warn!("Caller-provided state does not address the pending login");
            return Err(AuthError::StateMismatch);
        }

        self.set_state(FlowState::Exchanging);
        self.exchange_code(session, &code).await
    }

    /// Validate a redirect, strictly in order:
    /// 1. an `error` parameter → `ProviderDenied`
    /// 2. `code` or `state` missing → `MalformedRedirect`
    /// 3. state mismatch → `StateMismatch`, regardless of code validity
    fn validate_redirect(session: &AuthSession, query: &RedirectQuery) -> Result<String> {
        if let Some(error) = &query.error {
            warn!(error = %error, "Provider denied authorization");
            return Err(AuthError::ProviderDenied(error.clone()));
        }

        let (code, state) = match (&query.code, &query.state) {
            (Some(code), Some(state)) => (code, state),
            _ => {
                warn!("Redirect did not carry both code and state");
                return Err(AuthError::MalformedRedirect);
            }
        };

        if state != &session.state {
            warn!("OAuth state mismatch - rejecting redirect");
            return Err(AuthError::StateMismatch);
        }

        Ok(code.clone())
    }

    /// Build the authorize URL for the given session.
    fn build_authorize_url(&self, session: &AuthSession) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::InvalidUrl(format!("{}: {}", self.config.auth_url, e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &session.redirect_uri);
            query.append_pair("state", &session.state);
            if !self.config.scopes.is_empty() {
                query.append_pair("scope", &self.config.scopes.join(" "));
            }
            if let Some(verifier) = session.verifier() {
                query.append_pair("code_challenge", &verifier.challenge());
                query.append_pair("code_challenge_method", "S256");
            }
            for (key, value) in &self.config.extra_authorize_params {
                query.append_pair(key, value);
            }
        }

        debug!("Built authorization URL");
        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// Sends exactly one credential form: the PKCE verifier for public
    /// clients, the client secret for confidential ones.
    async fn exchange_code(&self, session: &AuthSession, code: &str) -> Result<TokenSet> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &session.redirect_uri),
            ("client_id", &self.config.client_id),
        ];

        match (&self.config.credential, session.verifier()) {
            (ClientCredential::Pkce, Some(verifier)) => {
                params.push(("code_verifier", verifier.verifier()));
            }
            (ClientCredential::Secret(secret), _) => {
                params.push(("client_secret", secret));
            }
            (ClientCredential::Pkce, None) => {
                return Err(AuthError::ExchangeFailed(
                    "PKCE session lost its verifier".to_string(),
                ))
            }
        }

        let body = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::ExchangeFailed(format!("Failed to encode request: {}", e)))?;

        debug!("Exchanging authorization code for tokens");
        let request =
            HttpRequest::new(HttpMethod::Post, self.config.token_url.clone()).form(body);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        if !response.is_success() {
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(status = response.status, "Token exchange failed");
            return Err(AuthError::ExchangeFailed(format!(
                "Token endpoint returned {}: {}",
                response.status, error_body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| AuthError::ExchangeFailed(format!("Malformed token response: {}", e)))?;

        info!(
            has_refresh_token = token_response.refresh_token.is_some(),
            "Authorization code exchanged for tokens"
        );

        Ok(TokenSet::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
        ))
    }

    /// Refresh an access token.
    ///
    /// A provider refusal (`invalid_grant`, as a bare 401 body or a JSON
    /// error field) is the normal "must re-login" outcome and surfaces as
    /// [`TokenError::InvalidGrant`]; anything else failing is
    /// [`TokenError::NetworkFailure`] with the body preserved. The returned
    /// token set carries the refresh token exactly as the provider returned
    /// it — keeping the old one when none came back is the lifecycle
    /// manager's decision, not this layer's.
    ///
    /// Single-shot: never retried here.
    #[instrument(skip(self, refresh_token), fields(provider = %self.config.provider))]
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenSet, TokenError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
        ];
        if let ClientCredential::Secret(secret) = &self.config.credential {
            params.push(("client_secret", secret));
        }

        let body = serde_urlencoded::to_string(&params)
            .map_err(|e| TokenError::Malformed(format!("Failed to encode request: {}", e)))?;

        debug!("Refreshing access token");
        let request =
            HttpRequest::new(HttpMethod::Post, self.config.token_url.clone()).form(body);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| TokenError::NetworkFailure(e.to_string()))?;

        if response.is_success() {
            let token_response: TokenResponse = response
                .json()
                .map_err(|e| TokenError::Malformed(e.to_string()))?;

            info!("Access token refreshed");
            return Ok(TokenSet::new(
                token_response.access_token,
                token_response.refresh_token,
                token_response.expires_in,
            ));
        }

        let error_body = response.text().unwrap_or_default();

        // A refused grant is a normal negative outcome, not a failure:
        // either the documented bare 401 body or a JSON error field.
        let refused = (response.status == 401 && error_body == "invalid_grant")
            || (response.is_client_error()
                && serde_json::from_slice::<TokenErrorBody>(&response.body)
                    .map(|b| b.error == "invalid_grant")
                    .unwrap_or(false));
        if refused {
            info!("Refresh token no longer valid; re-login required");
            return Err(TokenError::InvalidGrant);
        }

        warn!(status = response.status, "Token refresh failed");
        Err(TokenError::NetworkFailure(format!(
            "Token endpoint returned {}: {}",
            response.status, error_body
        )))
    }

    /// Revoke a token, best-effort. Success is HTTP 200; any other status
    /// reports `Ok(false)`. Never retried.
    ///
    /// Providers without a revocation endpoint report `Ok(false)`.
    #[instrument(skip(self, token), fields(provider = %self.config.provider))]
    pub async fn revoke_token(&self, token: &str) -> std::result::Result<bool, TokenError> {
        let Some(endpoint) = &self.config.revoke else {
            debug!("Provider has no revocation endpoint");
            return Ok(false);
        };

        let request = match endpoint.style {
            RevokeStyle::Bearer => {
                HttpRequest::new(HttpMethod::Post, endpoint.url.clone()).bearer_token(token)
            }
            RevokeStyle::ClientForm => {
                let mut params: Vec<(&str, &str)> =
                    vec![("client_id", &self.config.client_id), ("token", token)];
                if let ClientCredential::Secret(secret) = &self.config.credential {
                    params.push(("client_secret", secret));
                }
                let body = serde_urlencoded::to_string(&params)
                    .map_err(|e| TokenError::Malformed(e.to_string()))?;
                HttpRequest::new(HttpMethod::Post, endpoint.url.clone()).form(body)
            }
        };

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| TokenError::NetworkFailure(e.to_string()))?;

        if response.status == 200 {
            info!("Token revoked");
            Ok(true)
        } else {
            warn!(status = response.status, "Token revocation refused");
            Ok(false)
        }
    }
}

impl Drop for AuthorizationFlow {
    fn drop(&mut self) {
        // Release the loopback listener on shutdown paths too
        self.stop_listen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        Http {}

        #[async_trait::async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_streaming(
                &self,
                request: HttpRequest,
            ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        }
    }

    struct NoopBrowser;

    impl BrowserLauncher for NoopBrowser {
        fn open(&self, _url: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn test_config(credential: ClientCredential) -> OAuthConfig {
        OAuthConfig {
            provider: ProviderKind::Dropbox,
            client_id: "test-client".to_string(),
            credential,
            auth_url: "https://provider.test/authorize".to_string(),
            token_url: "https://provider.test/token".to_string(),
            revoke: Some(RevokeEndpoint {
                url: "https://provider.test/revoke".to_string(),
                style: RevokeStyle::Bearer,
            }),
            redirect: RedirectSpec::Loopback { fixed_port: None },
            scopes: vec!["files.read".to_string(), "files.write".to_string()],
            extra_authorize_params: vec![("token_access_type".to_string(), "offline".to_string())],
        }
    }

    fn flow_with(http: MockHttp, credential: ClientCredential) -> AuthorizationFlow {
        AuthorizationFlow::new(test_config(credential), Arc::new(http), Arc::new(NoopBrowser))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_pkce_verifier_length_and_charset() {
        let verifier = PkceVerifier::new();
        let len = verifier.verifier().len();
        assert!((43..=128).contains(&len), "verifier length {} out of range", len);
        assert!(verifier
            .verifier()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_pkce_challenge_rfc7636_vector() {
        // Appendix B of RFC 7636
        let verifier = PkceVerifier::from_raw("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(
            verifier.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_pkce_challenge_is_deterministic_and_unique() {
        let a = PkceVerifier::new();
        let b = PkceVerifier::new();
        assert_eq!(a.challenge(), a.challenge());
        assert_ne!(a.verifier(), b.verifier());
        assert_ne!(a.challenge(), b.challenge());
    }

    #[test]
    fn test_auth_session_generates_unique_state() {
        let a = AuthSession::new("http://127.0.0.1:1/".into(), true);
        let b = AuthSession::new("http://127.0.0.1:1/".into(), true);
        assert_ne!(a.state, b.state);
        assert!(a.verifier().is_some());

        let no_pkce = AuthSession::new("http://127.0.0.1:1/".into(), false);
        assert!(no_pkce.verifier().is_none());
    }

    #[test]
    fn test_parse_redirect_query_from_full_uri() {
        let query = parse_redirect_query("http://127.0.0.1:8400/?code=abc123&state=xyz");
        assert_eq!(query.code.as_deref(), Some("abc123"));
        assert_eq!(query.state.as_deref(), Some("xyz"));
        assert!(query.error.is_none());
    }

    #[test]
    fn test_parse_redirect_query_from_custom_scheme() {
        let query = parse_redirect_query("cumulus://callback/?error=access_denied&state=s1");
        assert_eq!(query.error.as_deref(), Some("access_denied"));
        assert_eq!(query.state.as_deref(), Some("s1"));
    }

    #[test]
    fn test_parse_redirect_query_decodes_encoding() {
        let query = parse_redirect_query("/?code=a%2Bb&state=x%20y");
        assert_eq!(query.code.as_deref(), Some("a+b"));
        assert_eq!(query.state.as_deref(), Some("x y"));
    }

    #[test]
    fn test_build_authorize_url_contains_required_params() {
        let flow = flow_with(MockHttp::new(), ClientCredential::Pkce);
        let session = AuthSession::new("http://127.0.0.1:9999/".into(), true);
        let url = flow.build_authorize_url(&session).unwrap();

        assert!(url.starts_with("https://provider.test/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains(&format!("state={}", session.state)));
        assert!(url.contains("code_challenge="));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("scope=files.read+files.write") || url.contains("scope=files.read%20files.write"));
        assert!(url.contains("token_access_type=offline"));
    }

    #[test]
    fn test_build_authorize_url_without_pkce() {
        let flow = flow_with(
            MockHttp::new(),
            ClientCredential::Secret("secret".to_string()),
        );
        let session = AuthSession::new("http://127.0.0.1:9999/".into(), false);
        let url = flow.build_authorize_url(&session).unwrap();

        assert!(!url.contains("code_challenge"));
    }

    #[test]
    fn test_validate_redirect_error_param_wins() {
        let session = AuthSession::new("http://127.0.0.1:1/".into(), true);
        // Even with a plausible code and the right state, `error` wins
        let query = RedirectQuery {
            code: Some("valid-code".into()),
            state: Some(session.state.clone()),
            error: Some("access_denied".into()),
        };
        assert!(matches!(
            AuthorizationFlow::validate_redirect(&session, &query),
            Err(AuthError::ProviderDenied(e)) if e == "access_denied"
        ));
    }

    #[test]
    fn test_validate_redirect_missing_params() {
        let session = AuthSession::new("http://127.0.0.1:1/".into(), true);

        let missing_code = RedirectQuery {
            code: None,
            state: Some(session.state.clone()),
            error: None,
        };
        assert!(matches!(
            AuthorizationFlow::validate_redirect(&session, &missing_code),
            Err(AuthError::MalformedRedirect)
        ));

        let missing_state = RedirectQuery {
            code: Some("code".into()),
            state: None,
            error: None,
        };
        assert!(matches!(
            AuthorizationFlow::validate_redirect(&session, &missing_state),
            Err(AuthError::MalformedRedirect)
        ));
    }

    #[test]
    fn test_validate_redirect_state_mismatch_rejects_valid_code() {
        let session = AuthSession::new("http://127.0.0.1:1/".into(), true);
        let query = RedirectQuery {
            code: Some("perfectly-valid-code".into()),
            state: Some("attacker-state".into()),
            error: None,
        };
        assert!(matches!(
            AuthorizationFlow::validate_redirect(&session, &query),
            Err(AuthError::StateMismatch)
        ));
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier_for_public_client() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .withf(|req| {
                let body = String::from_utf8(req.body.as_ref().unwrap().to_vec()).unwrap();
                body.contains("grant_type=authorization_code")
                    && body.contains("code_verifier=")
                    && !body.contains("client_secret")
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"access_token":"at-1","refresh_token":"rt-1","expires_in":14400}"#,
                ))
            });

        let flow = flow_with(http, ClientCredential::Pkce);
        let session = AuthSession::new("http://127.0.0.1:1/".into(), true);
        let tokens = flow.exchange_code(&session, "the-code").await.unwrap();

        assert_eq!(tokens.access_token, "at-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
        assert!(tokens.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_exchange_code_sends_secret_for_confidential_client() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .withf(|req| {
                let body = String::from_utf8(req.body.as_ref().unwrap().to_vec()).unwrap();
                body.contains("client_secret=shh") && !body.contains("code_verifier")
            })
            .returning(|_| Ok(response(200, r#"{"access_token":"at-2"}"#)));

        let flow = flow_with(http, ClientCredential::Secret("shh".to_string()));
        let session = AuthSession::new("http://127.0.0.1:1/".into(), false);
        let tokens = flow.exchange_code(&session, "the-code").await.unwrap();

        assert_eq!(tokens.access_token, "at-2");
        // Absent expires_in is never guessed
        assert!(tokens.expires_at.is_none());
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_exchange_code_surfaces_error_body() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(400, "invalid_request: bad code")));

        let flow = flow_with(http, ClientCredential::Pkce);
        let session = AuthSession::new("http://127.0.0.1:1/".into(), true);
        let err = flow.exchange_code(&session, "bad").await.unwrap_err();

        match err {
            AuthError::ExchangeFailed(msg) => {
                assert!(msg.contains("400"));
                assert!(msg.contains("invalid_request: bad code"));
            }
            other => panic!("Expected ExchangeFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_invalid_grant_bare_401_body() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(401, "invalid_grant")));

        let flow = flow_with(http, ClientCredential::Pkce);
        let result = flow.refresh_token("dead-token").await;

        assert!(matches!(result, Err(TokenError::InvalidGrant)));
    }

    #[tokio::test]
    async fn test_refresh_invalid_grant_json_body() {
        let mut http = MockHttp::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(response(
                400,
                r#"{"error":"invalid_grant","error_description":"Token revoked"}"#,
            ))
        });

        let flow = flow_with(http, ClientCredential::Secret("s".to_string()));
        let result = flow.refresh_token("dead-token").await;

        assert!(matches!(result, Err(TokenError::InvalidGrant)));
    }

    #[tokio::test]
    async fn test_refresh_server_error_preserves_body() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(503, "service melting")));

        let flow = flow_with(http, ClientCredential::Pkce);
        let err = flow.refresh_token("rt").await.unwrap_err();

        match err {
            TokenError::NetworkFailure(msg) => {
                assert!(msg.contains("503"));
                assert!(msg.contains("service melting"));
            }
            other => panic!("Expected NetworkFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_returns_provider_verbatim_refresh_token() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, r#"{"access_token":"at-new","expires_in":3600}"#)));

        let flow = flow_with(http, ClientCredential::Pkce);
        let tokens = flow.refresh_token("rt-old").await.unwrap();

        assert_eq!(tokens.access_token, "at-new");
        // The provider returned no refresh token; the flow does not invent one
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_revoke_success_is_200() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .withf(|req| req.headers.get("Authorization") == Some(&"Bearer at".to_string()))
            .returning(|_| Ok(response(200, "")));

        let flow = flow_with(http, ClientCredential::Pkce);
        assert!(flow.revoke_token("at").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_non_200_is_negative_not_error() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(400, "already revoked")));

        let flow = flow_with(http, ClientCredential::Pkce);
        assert!(!flow.revoke_token("at").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_transport_failure_is_error() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("offline".to_string())));

        let flow = flow_with(http, ClientCredential::Pkce);
        assert!(flow.revoke_token("at").await.is_err());
    }

    /// Browser double that plays the provider's part: it parses the
    /// redirect URI and state out of the authorize URL and fires the
    /// loopback callback itself.
    struct CallbackBrowser;

    impl BrowserLauncher for CallbackBrowser {
        fn open(&self, url: &str) -> BridgeResult<()> {
            let parsed = url::Url::parse(url).unwrap();
            let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
            let redirect_uri = params.get("redirect_uri").unwrap().clone();
            let state = params.get("state").unwrap().clone();
            let port = url::Url::parse(&redirect_uri).unwrap().port().unwrap();

            tokio::spawn(async move {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
                    .await
                    .unwrap();
                let request = format!(
                    "GET /?code=e2e-code&state={} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
                    state
                );
                stream.write_all(request.as_bytes()).await.unwrap();
                let mut response = Vec::new();
                let _ = stream.read_to_end(&mut response).await;
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_loopback_login_end_to_end() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .withf(|req| {
                let body = String::from_utf8(req.body.as_ref().unwrap().to_vec()).unwrap();
                body.contains("grant_type=authorization_code")
                    && body.contains("code=e2e-code")
                    && body.contains("code_verifier=")
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"access_token":"at-e2e","refresh_token":"rt-e2e","expires_in":14400}"#,
                ))
            });

        // Ephemeral-port loopback configuration
        let mut config = test_config(ClientCredential::Pkce);
        config.redirect = RedirectSpec::Loopback { fixed_port: None };
        let flow = AuthorizationFlow::new(config, Arc::new(http), Arc::new(CallbackBrowser));

        let tokens = flow.login().await.unwrap();

        assert_eq!(tokens.access_token, "at-e2e");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-e2e"));
        assert_eq!(flow.flow_state(), FlowState::Authenticated);
    }

    #[tokio::test]
    async fn test_stopping_listener_cancels_waiting_login() {
        // A browser that never delivers a redirect
        let flow = Arc::new(flow_with(MockHttp::new(), ClientCredential::Pkce));

        let login = tokio::spawn({
            let flow = flow.clone();
            async move { flow.login().await }
        });

        // Wait for the flow to park on the listener, then stop it
        for _ in 0..200 {
            if flow.flow_state() == FlowState::AwaitingRedirect {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(flow.flow_state(), FlowState::AwaitingRedirect);
        flow.stop_listen();

        let result = login.await.unwrap();
        assert!(matches!(result, Err(AuthError::Cancelled)));
        assert_eq!(flow.flow_state(), FlowState::Cancelled);

        // Stopping again with nothing listening stays safe
        flow.stop_listen();
    }

    #[tokio::test]
    async fn test_process_redirect_without_pending_login() {
        let flow = flow_with(MockHttp::new(), ClientCredential::Pkce);
        let result = flow.process_redirect("state", "app://cb/?code=c&state=state").await;
        assert!(matches!(result, Err(AuthError::NoPendingLogin)));
    }

    #[test]
    fn test_client_credential_debug_redacts_secret() {
        let secret = ClientCredential::Secret("super-secret".to_string());
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
