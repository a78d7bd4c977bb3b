use crate::endpoint::ApiEndpoint;
use async_trait::async_trait;
use wharf_remote::{
    ApiVersion, AuthConfig, LoginOutcome, RegistryError, SearchResults, V1Client, V2Client,
};

/// What the service needs from a protocol client.
#[async_trait]
pub trait Session: Send + Sync {
    async fn login(&self) -> LoginOutcome;

    async fn search_repositories(&self, term: &str) -> Result<SearchResults, RegistryError>;
}

/// Opens a session against one endpoint with the given credentials.
pub trait SessionFactory: Send + Sync {
    fn session(
        &self,
        endpoint: &ApiEndpoint,
        auth: &AuthConfig,
        user_agent: &str,
    ) -> Result<Box<dyn Session>, RegistryError>;
}

/// Sessions over HTTP, one `reqwest` client per session built from the
/// endpoint's TLS settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpSessionFactory;

impl SessionFactory for HttpSessionFactory {
    fn session(
        &self,
        endpoint: &ApiEndpoint,
        auth: &AuthConfig,
        user_agent: &str,
    ) -> Result<Box<dyn Session>, RegistryError> {
        let url = endpoint.url.clone();
        let session: Box<dyn Session> = match endpoint.version {
            ApiVersion::V1 => Box::new(V1Client::new(url, &endpoint.tls, user_agent, auth.clone())?),
            ApiVersion::V2 => Box::new(V2Client::new(url, &endpoint.tls, user_agent, auth.clone())?),
        };
        Ok(session)
    }
}

#[async_trait]
impl Session for V1Client {
    async fn login(&self) -> LoginOutcome {
        V1Client::login(self).await
    }

    async fn search_repositories(&self, term: &str) -> Result<SearchResults, RegistryError> {
        V1Client::search_repositories(self, term).await
    }
}

#[async_trait]
impl Session for V2Client {
    async fn login(&self) -> LoginOutcome {
        V2Client::login(self).await
    }

    async fn search_repositories(&self, _term: &str) -> Result<SearchResults, RegistryError> {
        Err(RegistryError::Registry(format!(
            "search is only supported by the v1 API, not {}",
            self.url()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wharf_remote::{TlsConfig, Url};

    fn endpoint(url: &str, version: ApiVersion) -> ApiEndpoint {
        ApiEndpoint {
            url: Url::parse(url).unwrap(),
            version,
            mirror: false,
            official: false,
            trim_hostname: true,
            tls: TlsConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_v2_session_cannot_search() {
        let session = HttpSessionFactory
            .session(
                &endpoint("https://registry.example.com/", ApiVersion::V2),
                &AuthConfig::default(),
                "wharf-test",
            )
            .unwrap();
        assert!(session.search_repositories("redis").await.is_err());
    }

    #[test]
    fn test_bad_bundle_fails_session() {
        let mut e = endpoint("https://registry.example.com/v1/", ApiVersion::V1);
        e.tls = TlsConfig::secure(vec![b"garbage".to_vec()]);
        let result = HttpSessionFactory.session(&e, &AuthConfig::default(), "wharf-test");
        assert!(matches!(result, Err(RegistryError::Tls(_))));
    }
}
