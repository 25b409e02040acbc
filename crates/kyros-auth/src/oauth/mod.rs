//! OAuth 2.0 authorization-code federation
//!
//! One broker instance owns the whole flow: it builds provider redirect
//! URLs, correlates callbacks through single-use state tickets, exchanges
//! authorization codes (with PKCE), and normalises provider profiles.
//!
//! State tickets live in the key-value cache so the flow survives a
//! multi-instance deployment; without a cache the broker falls back to an
//! in-process map, which is correct only when exactly one gateway instance
//! serves both the start and the callback.

pub mod providers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use url::Url;

use kyros_cache::KvCache;
use kyros_crypto::random;

use crate::error::{AuthError, AuthResult};

pub use providers::{
    GithubEmail, Profile, ProviderSettings, ProviderSnapshot, parse_github_user,
    parse_google_profile, pick_verified_email,
};

/// State tickets expire after this long
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

const STATE_PREFIX: &str = "oauth_state:";

/// oauth2 5.0 typestate: auth and token endpoints set, nothing else
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Everything stored under a state key, consumed exactly once at callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTicket {
    /// Provider the flow was started against
    pub provider: String,
    /// PKCE code verifier for the pending exchange
    pub pkce_verifier: String,
}

/// Result of starting an authorization flow
#[derive(Debug, Clone)]
pub struct BeginLogin {
    /// Provider authorization URL to redirect the client to
    pub url: String,
    /// State echoed back at callback
    pub state: String,
}

struct ProviderEntry {
    settings: ProviderSettings,
    client: ConfiguredClient,
}

enum StateStore {
    Kv(Arc<dyn KvCache>),
    Memory(Mutex<HashMap<String, (String, Instant)>>),
}

impl StateStore {
    async fn issue(&self, state: &str, payload: &str, ttl: Duration) -> AuthResult<()> {
        match self {
            Self::Kv(kv) => {
                kv.set_ex(&format!("{STATE_PREFIX}{state}"), payload, ttl)
                    .await?;
            }
            Self::Memory(map) => {
                let now = Instant::now();
                let mut map = map.lock();
                map.retain(|_, (_, deadline)| *deadline > now);
                map.insert(state.to_string(), (payload.to_string(), now + ttl));
            }
        }
        Ok(())
    }

    async fn consume(&self, state: &str) -> AuthResult<Option<String>> {
        match self {
            Self::Kv(kv) => Ok(kv.get_del(&format!("{STATE_PREFIX}{state}")).await?),
            Self::Memory(map) => {
                let now = Instant::now();
                Ok(map
                    .lock()
                    .remove(state)
                    .filter(|(_, deadline)| *deadline > now)
                    .map(|(payload, _)| payload))
            }
        }
    }
}

/// Per-provider authorization-code broker
pub struct OAuthBroker {
    providers: Vec<ProviderEntry>,
    states: StateStore,
    http: reqwest::Client,
    state_ttl: Duration,
}

impl std::fmt::Debug for OAuthBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthBroker")
            .field("providers", &self.names())
            .field("state_ttl", &self.state_ttl)
            .finish()
    }
}

impl OAuthBroker {
    /// Build a broker from the configured provider set
    ///
    /// With no cache the state store is in-process and the deployment must
    /// be single-instance.
    pub fn new(
        settings: Vec<ProviderSettings>,
        kv: Option<Arc<dyn KvCache>>,
    ) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("kyros-gateway")
            .build()
            .map_err(|e| AuthError::ProviderConfig {
                reason: format!("http client: {e}"),
            })?;

        let mut providers = Vec::with_capacity(settings.len());
        for s in settings {
            providers.push(ProviderEntry {
                client: build_client(&s)?,
                settings: s,
            });
        }

        let states = match kv {
            Some(kv) => StateStore::Kv(kv),
            None => {
                tracing::warn!(
                    "no cache configured; OAuth state is in-process and only valid single-instance"
                );
                StateStore::Memory(Mutex::new(HashMap::new()))
            }
        };

        Ok(Self {
            providers,
            states,
            http,
            state_ttl: STATE_TTL,
        })
    }

    /// Override the state TTL (tests)
    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    /// Names of the configured providers
    pub fn names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.settings.name.clone())
            .collect()
    }

    /// Whether any provider is configured
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Secret-free configuration snapshot for the admin surface
    pub fn snapshot(&self) -> Vec<ProviderSnapshot> {
        self.providers
            .iter()
            .map(|p| ProviderSnapshot {
                name: p.settings.name.clone(),
                client_id: p.settings.client_id.clone(),
                redirect_url: p.settings.redirect_url.clone(),
                scopes: p.settings.scopes.clone(),
            })
            .collect()
    }

    /// Start an authorization flow: mint a state ticket and build the
    /// provider redirect URL
    pub async fn begin(&self, provider: &str) -> AuthResult<BeginLogin> {
        let entry = self.entry(provider)?;
        let state = random::oauth_state();
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, _csrf) = entry
            .client
            .authorize_url(|| CsrfToken::new(state.clone()))
            .add_scopes(entry.settings.scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(challenge)
            .url();

        let ticket = StateTicket {
            provider: provider.to_string(),
            pkce_verifier: verifier.secret().clone(),
        };
        self.states
            .issue(&state, &serde_json::to_string(&ticket)?, self.state_ttl)
            .await?;

        Ok(BeginLogin {
            url: url.to_string(),
            state,
        })
    }

    /// Consume a state ticket, succeeding at most once per state
    pub async fn consume_state(&self, state: &str) -> AuthResult<StateTicket> {
        let payload = self
            .states
            .consume(state)
            .await?
            .ok_or(AuthError::InvalidState)?;
        Ok(serde_json::from_str(&payload)?)
    }

    /// Exchange an authorization code and fetch the normalised profile
    pub async fn exchange(
        &self,
        provider: &str,
        code: &str,
        pkce_verifier: &str,
    ) -> AuthResult<Profile> {
        let entry = self.entry(provider)?;

        let token = entry
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::Exchange {
                reason: e.to_string(),
            })?;

        let access_token = token.access_token().secret().clone();
        let refresh_token = token.refresh_token().map(|t| t.secret().clone());

        if let Some(emails_url) = entry.settings.emails_url.clone() {
            self.github_profile(entry, &emails_url, access_token, refresh_token)
                .await
        } else {
            self.google_profile(entry, access_token, refresh_token).await
        }
    }

    fn entry(&self, provider: &str) -> AuthResult<&ProviderEntry> {
        self.providers
            .iter()
            .find(|p| p.settings.name == provider)
            .ok_or_else(|| AuthError::UnknownProvider {
                name: provider.to_string(),
            })
    }

    async fn fetch_json(&self, url: &str, access_token: &str) -> AuthResult<serde_json::Value> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::Exchange {
                reason: format!("profile endpoint returned {}", response.status()),
            });
        }
        Ok(response.json().await?)
    }

    async fn google_profile(
        &self,
        entry: &ProviderEntry,
        access_token: String,
        refresh_token: Option<String>,
    ) -> AuthResult<Profile> {
        let doc = self
            .fetch_json(&entry.settings.userinfo_url, &access_token)
            .await?;
        let (provider_id, email, display_name, avatar) = parse_google_profile(&doc)?;
        Ok(Profile {
            provider_id,
            provider: entry.settings.name.clone(),
            email,
            display_name,
            avatar,
            access_token,
            refresh_token,
        })
    }

    async fn github_profile(
        &self,
        entry: &ProviderEntry,
        emails_url: &str,
        access_token: String,
        refresh_token: Option<String>,
    ) -> AuthResult<Profile> {
        let doc = self
            .fetch_json(&entry.settings.userinfo_url, &access_token)
            .await?;
        let (provider_id, display_name, avatar) = parse_github_user(&doc)?;

        // GitHub's /user email field is whatever the user made public, or
        // null; the address of record comes from /user/emails.
        let entries: Vec<GithubEmail> = serde_json::from_value(
            self.fetch_json(emails_url, &access_token).await?,
        )?;
        let email = pick_verified_email(&entries).ok_or(AuthError::NoVerifiedEmail)?;

        Ok(Profile {
            provider_id,
            provider: entry.settings.name.clone(),
            email,
            display_name,
            avatar,
            access_token,
            refresh_token,
        })
    }
}

fn build_client(settings: &ProviderSettings) -> AuthResult<ConfiguredClient> {
    let auth_url =
        AuthUrl::new(settings.auth_url.clone()).map_err(|_| AuthError::ProviderConfig {
            reason: format!("invalid authorization URL for {}", settings.name),
        })?;
    let token_url =
        TokenUrl::new(settings.token_url.clone()).map_err(|_| AuthError::ProviderConfig {
            reason: format!("invalid token URL for {}", settings.name),
        })?;
    let redirect_url = validate_redirect_url(&settings.redirect_url)?;

    Ok(
        BasicClient::new(ClientId::new(settings.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                settings.client_secret.expose_secret().clone(),
            ))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url),
    )
}

/// Redirect URL validation: https anywhere, http only on localhost, and
/// never a fragment (per OAuth 2.0)
fn validate_redirect_url(uri: &str) -> AuthResult<RedirectUrl> {
    let parsed = Url::parse(uri).map_err(|e| AuthError::ProviderConfig {
        reason: format!("invalid redirect URL: {e}"),
    })?;

    match parsed.scheme() {
        "https" => {}
        "http" => {
            let is_localhost = matches!(
                parsed.host_str(),
                Some("localhost" | "127.0.0.1" | "0.0.0.0")
            );
            if !is_localhost {
                return Err(AuthError::ProviderConfig {
                    reason: "http redirect URLs are only allowed for localhost".to_string(),
                });
            }
        }
        other => {
            return Err(AuthError::ProviderConfig {
                reason: format!("unsupported redirect scheme: {other}"),
            });
        }
    }

    if parsed.fragment().is_some() {
        return Err(AuthError::ProviderConfig {
            reason: "redirect URL must not contain a fragment".to_string(),
        });
    }

    RedirectUrl::new(uri.to_string()).map_err(|_| AuthError::ProviderConfig {
        reason: "failed to build redirect URL".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn github_settings(base: &str) -> ProviderSettings {
        let mut settings = ProviderSettings::github(
            "client-id".to_string(),
            "client-secret".to_string(),
            "http://localhost:8080/auth/oauth/github/callback".to_string(),
        );
        settings.auth_url = format!("{base}/authorize");
        settings.token_url = format!("{base}/token");
        settings.userinfo_url = format!("{base}/user");
        settings.emails_url = Some(format!("{base}/user/emails"));
        settings
    }

    fn broker_with(settings: Vec<ProviderSettings>) -> OAuthBroker {
        OAuthBroker::new(settings, None).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let broker = broker_with(vec![]);
        assert!(matches!(
            broker.begin("gitlab").await,
            Err(AuthError::UnknownProvider { .. })
        ));
    }

    #[tokio::test]
    async fn test_begin_builds_authorization_url() {
        let broker = broker_with(vec![github_settings("https://gh.example")]);
        let login = broker.begin("github").await.unwrap();

        assert!(login.url.starts_with("https://gh.example/authorize"));
        assert!(login.url.contains(&format!("state={}", login.state)));
        assert!(login.url.contains("client_id=client-id"));
        assert!(login.url.contains("code_challenge="));
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let broker = broker_with(vec![github_settings("https://gh.example")]);
        let login = broker.begin("github").await.unwrap();

        let ticket = broker.consume_state(&login.state).await.unwrap();
        assert_eq!(ticket.provider, "github");
        assert!(!ticket.pkce_verifier.is_empty());

        assert!(matches!(
            broker.consume_state(&login.state).await,
            Err(AuthError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn test_stale_state_rejected() {
        let broker = broker_with(vec![github_settings("https://gh.example")])
            .with_state_ttl(Duration::from_millis(5));
        let login = broker.begin("github").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            broker.consume_state(&login.state).await,
            Err(AuthError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn test_never_issued_state_rejected() {
        let broker = broker_with(vec![github_settings("https://gh.example")]);
        assert!(matches!(
            broker.consume_state("forged-state").await,
            Err(AuthError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn test_github_exchange_resolves_verified_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_token",
                "token_type": "bearer",
                "scope": "read:user,user:email"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42,
                "login": "octocat",
                "name": "Octo Cat",
                "avatar_url": "https://gh.example/a.png"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"email": "public@x.io", "primary": false, "verified": true},
                {"email": "main@x.io", "primary": true, "verified": true}
            ])))
            .mount(&server)
            .await;

        let broker = broker_with(vec![github_settings(&server.uri())]);
        let login = broker.begin("github").await.unwrap();
        let ticket = broker.consume_state(&login.state).await.unwrap();

        let profile = broker
            .exchange("github", "the-code", &ticket.pkce_verifier)
            .await
            .unwrap();
        assert_eq!(profile.provider, "github");
        assert_eq!(profile.provider_id, "42");
        assert_eq!(profile.email, "main@x.io");
        assert_eq!(profile.display_name, "Octo Cat");
        assert_eq!(profile.access_token, "gho_token");
    }

    #[tokio::test]
    async fn test_github_exchange_without_verified_email_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_token",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42, "login": "octocat"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"email": "main@x.io", "primary": true, "verified": false}
            ])))
            .mount(&server)
            .await;

        let broker = broker_with(vec![github_settings(&server.uri())]);
        assert!(matches!(
            broker.exchange("github", "the-code", "verifier").await,
            Err(AuthError::NoVerifiedEmail)
        ));
    }

    #[tokio::test]
    async fn test_snapshot_has_no_secret() {
        let broker = broker_with(vec![github_settings("https://gh.example")]);
        let snapshot = broker.snapshot();
        assert_eq!(snapshot.len(), 1);
        let serialized = serde_json::to_string(&snapshot).unwrap();
        assert!(!serialized.contains("client-secret"));
    }

    #[test]
    fn test_redirect_url_rules() {
        assert!(validate_redirect_url("https://app.example/cb").is_ok());
        assert!(validate_redirect_url("http://localhost:8080/cb").is_ok());
        assert!(validate_redirect_url("http://evil.example/cb").is_err());
        assert!(validate_redirect_url("https://app.example/cb#frag").is_err());
        assert!(validate_redirect_url("ftp://app.example/cb").is_err());
    }
}
