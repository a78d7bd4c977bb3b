use crate::config::{ServiceConfig, normalize_index_name};
use crate::endpoint::{DEFAULT_V1_REGISTRY, lookup_push_endpoints, url_host};
use crate::error::ServiceError;
use crate::index::IndexInfo;
use crate::session::SessionFactory;
use std::collections::HashMap;
use wharf_remote::{AuthConfig, LoginOutcome, Url};

/// Address logins go to when the credentials name no server.
pub const INDEX_SERVER: &str = DEFAULT_V1_REGISTRY;

/// Tries `auth_config` against every push endpoint of its server in order of
/// preference and returns the first success as `(status, token)`.
pub async fn auth(
    config: &ServiceConfig,
    sessions: &dyn SessionFactory,
    auth_config: &AuthConfig,
    user_agent: &str,
) -> Result<(String, String), ServiceError> {
    let mut server_address = auth_config.server_address.trim().to_string();
    if server_address.is_empty() {
        server_address = INDEX_SERVER.to_string();
    }
    if !server_address.starts_with("https://") && !server_address.starts_with("http://") {
        server_address = format!("https://{}", server_address);
    }

    let url = Url::parse(&server_address).map_err(|e| {
        ServiceError::InvalidReference(format!("unable to parse server address: {}", e))
    })?;
    let host = url_host(&url).ok_or_else(|| {
        ServiceError::InvalidReference(format!("no host in server address {}", server_address))
    })?;

    let endpoints = lookup_push_endpoints(config, &host)?;

    let mut last_error = None;
    for endpoint in &endpoints {
        let session = sessions.session(endpoint, auth_config, user_agent)?;
        match session.login().await {
            LoginOutcome::Success { status, token } => {
                tracing::debug!("Logged in to {} via {}", host, endpoint.url);
                return Ok((status, token));
            }
            LoginOutcome::RetryNext { cause } => {
                tracing::info!(
                    "Error logging in to {} endpoint, trying next endpoint: {}",
                    endpoint.version,
                    cause
                );
                last_error = Some(cause);
            }
            LoginOutcome::Fatal { cause } => return Err(cause.into()),
        }
    }

    Err(match last_error {
        Some(cause) => cause.into(),
        None => ServiceError::NoEndpoints(host),
    })
}

/// Picks the credentials stored for `index`. Keys may be bare hostnames or
/// full server addresses such as `https://index.docker.io/v1/`.
pub fn resolve_auth_config(configs: &HashMap<String, AuthConfig>, index: &IndexInfo) -> AuthConfig {
    if index.official {
        if let Some(config) = configs.get(INDEX_SERVER) {
            return config.clone();
        }
    }
    if let Some(config) = configs.get(&index.name) {
        return config.clone();
    }

    let mut keys: Vec<&String> = configs.keys().collect();
    keys.sort();
    keys.into_iter()
        .find(|key| normalize_index_name(convert_to_hostname(key)) == index.name)
        .and_then(|key| configs.get(key))
        .cloned()
        .unwrap_or_default()
}

fn convert_to_hostname(address: &str) -> &str {
    let stripped = address
        .strip_prefix("https://")
        .or_else(|| address.strip_prefix("http://"))
        .unwrap_or(address);
    stripped.split('/').next().unwrap_or(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceOptions;
    use crate::endpoint::ApiEndpoint;
    use crate::session::Session;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wharf_remote::{RegistryError, SearchResults};

    #[derive(Clone, Copy)]
    enum Reply {
        Success,
        RetryNext,
        Fatal,
    }

    struct ScriptedSession {
        reply: Reply,
    }

    #[async_trait]
    impl Session for ScriptedSession {
        async fn login(&self) -> LoginOutcome {
            match self.reply {
                Reply::Success => LoginOutcome::succeeded("Login Succeeded", "tok"),
                Reply::RetryNext => LoginOutcome::RetryNext {
                    cause: RegistryError::Registry("no v2 here".to_string()),
                },
                Reply::Fatal => LoginOutcome::Fatal {
                    cause: RegistryError::AuthFailed("bad password".to_string()),
                },
            }
        }

        async fn search_repositories(&self, _term: &str) -> Result<SearchResults, RegistryError> {
            Ok(SearchResults::default())
        }
    }

    /// Hands out replies in order and records which endpoints were tried.
    struct Scripted {
        replies: Mutex<Vec<Reply>>,
        tried: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies),
                tried: Mutex::new(Vec::new()),
            }
        }

        fn tried(&self) -> Vec<String> {
            self.tried.lock().unwrap().clone()
        }
    }

    impl SessionFactory for Scripted {
        fn session(
            &self,
            endpoint: &ApiEndpoint,
            _auth: &AuthConfig,
            _user_agent: &str,
        ) -> Result<Box<dyn Session>, RegistryError> {
            self.tried.lock().unwrap().push(endpoint.url.to_string());
            let reply = self.replies.lock().unwrap().remove(0);
            Ok(Box::new(ScriptedSession { reply }))
        }
    }

    fn creds(server: &str) -> AuthConfig {
        AuthConfig {
            username: "alice".to_string(),
            password: "secret".to_string(),
            server_address: server.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_next_endpoint() {
        let config = ServiceConfig::default();
        let sessions = Scripted::new(vec![Reply::RetryNext, Reply::Success]);

        let (status, token) = auth(&config, &sessions, &creds(""), "wharf-test")
            .await
            .unwrap();

        assert_eq!(status, "Login Succeeded");
        assert_eq!(token, "tok");
        assert_eq!(
            sessions.tried(),
            vec!["https://registry-1.docker.io/", "https://index.docker.io/v1/"]
        );
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let config = ServiceConfig::default();
        let sessions = Scripted::new(vec![Reply::Fatal, Reply::Success]);

        let result = auth(&config, &sessions, &creds("quay.io"), "wharf-test").await;

        assert!(matches!(
            result,
            Err(ServiceError::Registry(RegistryError::AuthFailed(_)))
        ));
        assert_eq!(sessions.tried(), vec!["https://quay.io/"]);
    }

    #[tokio::test]
    async fn test_exhausted_endpoints_surface_last_cause() {
        let config = ServiceConfig::new(ServiceOptions {
            v2_only: true,
            ..Default::default()
        })
        .unwrap();
        let sessions = Scripted::new(vec![Reply::RetryNext]);

        let result = auth(&config, &sessions, &creds("https://quay.io"), "wharf-test").await;
        assert!(matches!(
            result,
            Err(ServiceError::Registry(RegistryError::Registry(_)))
        ));
    }

    #[tokio::test]
    async fn test_login_never_targets_mirrors() {
        let config = ServiceConfig::new(ServiceOptions {
            mirrors: vec!["https://mirror.example.com".to_string()],
            ..Default::default()
        })
        .unwrap();
        let sessions = Scripted::new(vec![Reply::Success]);

        auth(&config, &sessions, &creds("docker.io"), "wharf-test")
            .await
            .unwrap();
        assert_eq!(sessions.tried(), vec!["https://registry-1.docker.io/"]);
    }

    #[tokio::test]
    async fn test_blocked_server() {
        let config = ServiceConfig::new(ServiceOptions {
            blocked_registries: vec!["quay.io".to_string()],
            ..Default::default()
        })
        .unwrap();
        let sessions = Scripted::new(vec![]);

        let result = auth(&config, &sessions, &creds("quay.io"), "wharf-test").await;
        assert!(matches!(result, Err(ServiceError::AllEndpointsBlocked(_))));
    }

    #[test]
    fn test_resolve_auth_config() {
        let mut configs = HashMap::new();
        configs.insert(INDEX_SERVER.to_string(), creds("hub"));
        configs.insert("https://quay.io/v1/".to_string(), creds("quay"));

        let hub = IndexInfo {
            name: "docker.io".to_string(),
            mirrors: vec![],
            secure: true,
            official: true,
        };
        assert_eq!(resolve_auth_config(&configs, &hub).server_address, "hub");

        let quay = IndexInfo {
            name: "quay.io".to_string(),
            mirrors: vec![],
            secure: true,
            official: false,
        };
        assert_eq!(resolve_auth_config(&configs, &quay).server_address, "quay");

        let other = IndexInfo {
            name: "ghcr.io".to_string(),
            ..quay
        };
        assert!(!resolve_auth_config(&configs, &other).has_credentials());
    }
}
