//! Credentials for cluster requests.
//!
//! Authentication is optional: the default configuration sends no
//! `Authorization` header. Basic credentials and API keys are both shared
//! secrets rendered into a single header value by the transport.

use base64::Engine;

/// Authentication configuration for requests against the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthConfig {
    /// No authentication (default)
    #[default]
    None,
    /// HTTP basic credentials
    Basic { user: String, password: String },
    /// Cluster API key
    ApiKey(String),
}

impl AuthConfig {
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        AuthConfig::Basic {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        AuthConfig::ApiKey(key.into())
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, AuthConfig::None)
    }

    /// The `Authorization` header value, if authentication is configured.
    pub fn header_value(&self) -> Option<String> {
        match self {
            AuthConfig::None => None,
            AuthConfig::Basic { user, password } => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{user}:{password}"));
                Some(format!("Basic {credentials}"))
            }
            AuthConfig::ApiKey(key) => Some(format!("ApiKey {key}")),
        }
    }
}
