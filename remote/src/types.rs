use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry wire protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiVersion {
    V1,
    V2,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::V1 => write!(f, "v1"),
            ApiVersion::V2 => write!(f, "v2"),
        }
    }
}

/// Credentials for one registry, in the shape of a `config.json` auth entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "serveraddress")]
    pub server_address: String,
    #[serde(default, rename = "identitytoken")]
    pub identity_token: String,
}

impl AuthConfig {
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    pub fn get_token(&self) -> Option<&str> {
        self.token.as_deref().or(self.access_token.as_deref())
    }
}

/// One hit of a legacy `/v1/search` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub star_count: u64,
    #[serde(default)]
    pub is_official: bool,
    #[serde(default)]
    pub is_trusted: bool,
    #[serde(default)]
    pub is_automated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub num_results: u64,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Result of a single login attempt against one endpoint.
#[derive(Debug)]
pub enum LoginOutcome {
    Success { status: String, token: String },
    /// The endpoint cannot serve this login; the next candidate may.
    RetryNext { cause: RegistryError },
    Fatal { cause: RegistryError },
}

impl LoginOutcome {
    pub fn succeeded(status: &str, token: impl Into<String>) -> Self {
        LoginOutcome::Success {
            status: status.to_string(),
            token: token.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_uses_docker_keys() {
        let config: AuthConfig = serde_json::from_str(
            r#"{"username":"me","password":"secret","serveraddress":"https://quay.io","identitytoken":"tok"}"#,
        )
        .unwrap();
        assert_eq!(config.server_address, "https://quay.io");
        assert_eq!(config.identity_token, "tok");

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["serveraddress"], "https://quay.io");
        assert_eq!(json["identitytoken"], "tok");
        assert!(json.get("server_address").is_none());
    }
}
