//! Environment-driven gateway configuration
//!
//! The configuration surface is a closed set of environment variables (see
//! `.env.example`). Everything has a development default except the things
//! production must not run without: a real `JWT_SECRET_KEY` and a database
//! URL. Production refuses to start when the signing secret is empty, too
//! short, or still the documented dev placeholder.

use std::time::Duration;

use kyros_auth::ProviderSettings;

/// The placeholder secret shipped in development docs; production refuses it
pub const DEV_SECRET_PLACEHOLDER: &str = "dev-secret-change-me";

/// Minimum signing-secret length accepted in production
const MIN_SECRET_LEN: usize = 32;

/// Configuration errors surfaced at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required variable is absent
    #[error("missing required environment variable {key}")]
    Missing {
        /// The absent variable
        key: &'static str,
    },

    /// Variable is present but unusable
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// The offending variable
        key: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Deployment environment, gating strict checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Relaxed defaults, http cookies allowed
    Development,
    /// Strict secret checks, Secure cookies
    Production,
}

impl Environment {
    fn from_env() -> Self {
        match std::env::var("KYROS_ENV").ok().as_deref() {
            Some("production") => Self::Production,
            _ => Self::Development,
        }
    }

    /// Label used in the health payload
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// TLS material locations (termination itself is external)
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// PEM certificate path
    pub cert_file: Option<String>,
    /// PEM key path
    pub key_file: Option<String>,
    /// ACME domain when certificates are managed automatically
    pub acme_domain: Option<String>,
}

impl TlsConfig {
    /// Whether any TLS material is configured (drives HSTS emission)
    pub fn enabled(&self) -> bool {
        (self.cert_file.is_some() && self.key_file.is_some()) || self.acme_domain.is_some()
    }
}

/// Full gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TCP listen port
    pub port: u16,
    /// Deployment environment
    pub env: Environment,
    /// Relational store URL
    pub database_url: String,
    /// HMAC signing secret for bearer tokens
    pub jwt_secret: String,
    /// Access-token lifetime
    pub access_ttl: Duration,
    /// Refresh-token lifetime
    pub refresh_ttl: Duration,
    /// Cache URL; `None` degrades cache-dependent features
    pub redis_url: Option<String>,
    /// Server-side session lifetime
    pub session_ttl: Duration,
    /// Exact origins allowed by CORS (first one is the front-end home)
    pub cors_origins: Vec<String>,
    /// General rate limit, requests per minute per client
    pub rate_limit_rpm: u32,
    /// Reverse-proxy upstream; `None` disables the proxy
    pub worker_base_url: Option<String>,
    /// OAuth providers assembled from their env var triples
    pub providers: Vec<ProviderSettings>,
    /// Issuer label in TOTP provisioning URLs
    pub mfa_issuer: String,
    /// 32-byte key for at-rest encryption; `None` disables it
    pub token_encryption_key: Option<Vec<u8>>,
    /// TLS material
    pub tls: TlsConfig,
    /// Opt-in WebSocket terminal feature
    pub enable_terminal: bool,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("could not parse {raw:?}"),
        }),
    }
}

fn provider_from_env(
    name: &'static str,
    build: fn(String, String, String) -> ProviderSettings,
) -> Option<ProviderSettings> {
    let id = var(&format!("{name}_CLIENT_ID"))?;
    let secret = var(&format!("{name}_CLIENT_SECRET"))?;
    let redirect = var(&format!("{name}_CLIENT_REDIRECT_URL"))
        .or_else(|| var(&format!("{name}_REDIRECT_URL")))?;
    Some(build(id, secret, redirect))
}

impl GatewayConfig {
    /// Load and validate configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let env = Environment::from_env();

        let jwt_secret = var("JWT_SECRET_KEY").unwrap_or_default();
        if env == Environment::Production {
            if jwt_secret.is_empty() || jwt_secret == DEV_SECRET_PLACEHOLDER {
                return Err(ConfigError::Invalid {
                    key: "JWT_SECRET_KEY",
                    reason: "production requires a real signing secret".to_string(),
                });
            }
            if jwt_secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::Invalid {
                    key: "JWT_SECRET_KEY",
                    reason: format!("production requires at least {MIN_SECRET_LEN} characters"),
                });
            }
        }

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing {
            key: "DATABASE_URL",
        })?;

        let token_encryption_key = match var("TOKEN_ENCRYPTION_KEY") {
            None => None,
            Some(raw) => {
                let bytes = raw.into_bytes();
                if bytes.len() != 32 {
                    return Err(ConfigError::Invalid {
                        key: "TOKEN_ENCRYPTION_KEY",
                        reason: "key must be exactly 32 bytes".to_string(),
                    });
                }
                Some(bytes)
            }
        };

        let providers = [
            provider_from_env("GOOGLE", ProviderSettings::google),
            provider_from_env("GITHUB", ProviderSettings::github),
        ]
        .into_iter()
        .flatten()
        .collect();

        Ok(Self {
            port: parsed("PORT", 8080)?,
            env,
            database_url,
            jwt_secret,
            access_ttl: Duration::from_secs(parsed("JWT_EXPIRE_MINUTES", 15u64)? * 60),
            refresh_ttl: Duration::from_secs(parsed("JWT_REFRESH_EXPIRE_DAYS", 7u64)? * 24 * 3600),
            redis_url: var("REDIS_URL"),
            session_ttl: Duration::from_secs(parsed("SESSION_TTL_HOURS", 24u64)? * 3600),
            cors_origins: var("CORS_ALLOW_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]),
            rate_limit_rpm: parsed("RATE_LIMIT_RPM", 100u32)?,
            worker_base_url: var("WORKER_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            providers,
            mfa_issuer: var("MFA_ISSUER").unwrap_or_else(|| "Kyros".to_string()),
            token_encryption_key,
            tls: TlsConfig {
                cert_file: var("TLS_CERT_FILE"),
                key_file: var("TLS_KEY_FILE"),
                acme_domain: var("TLS_ACME_DOMAIN"),
            },
            enable_terminal: var("ENABLE_TERMINAL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    /// Whether cookies should carry the Secure flag
    pub fn secure_cookies(&self) -> bool {
        self.env == Environment::Production
    }

    /// The front-end origin OAuth callbacks redirect to
    pub fn frontend_origin(&self) -> &str {
        self.cors_origins
            .first()
            .map(String::as_str)
            .unwrap_or("http://localhost:3000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them serialised by testing
    // the pure pieces instead.

    #[test]
    fn test_tls_enabled_requires_pair_or_acme() {
        assert!(!TlsConfig::default().enabled());
        assert!(
            TlsConfig {
                cert_file: Some("c.pem".to_string()),
                key_file: Some("k.pem".to_string()),
                acme_domain: None,
            }
            .enabled()
        );
        assert!(
            !TlsConfig {
                cert_file: Some("c.pem".to_string()),
                key_file: None,
                acme_domain: None,
            }
            .enabled()
        );
        assert!(
            TlsConfig {
                cert_file: None,
                key_file: None,
                acme_domain: Some("gw.example".to_string()),
            }
            .enabled()
        );
    }
}
