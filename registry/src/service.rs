use crate::auth;
use crate::config::{ServiceConfig, ServiceOptions};
use crate::endpoint::{self, ApiEndpoint};
use crate::error::ServiceError;
use crate::index::{IndexInfo, RepositoryInfo, new_index_info, new_repository_info};
use crate::search::{self, SearchResultExt};
use crate::session::{HttpSessionFactory, SessionFactory};
use crate::tls;
use std::collections::HashMap;
use std::sync::Arc;
use wharf_remote::{AuthConfig, ImageReference, TlsConfig};

/// Entry point for everything that needs registry policy: resolving names,
/// choosing endpoints, logging in and searching.
#[derive(Clone)]
pub struct RegistryService {
    config: Arc<ServiceConfig>,
    sessions: Arc<dyn SessionFactory>,
}

impl RegistryService {
    pub fn new(
        options: ServiceOptions,
        sessions: Arc<dyn SessionFactory>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            config: Arc::new(ServiceConfig::new(options)?),
            sessions,
        })
    }

    pub fn with_http(options: ServiceOptions) -> Result<Self, ServiceError> {
        Self::new(options, Arc::new(HttpSessionFactory))
    }

    pub fn service_config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Parses `reference` and resolves it against this service's policy.
    pub fn resolve_repository(&self, reference: &str) -> Result<RepositoryInfo, ServiceError> {
        let reference = ImageReference::parse(reference).map_err(ServiceError::invalid_reference)?;
        new_repository_info(&self.config, &reference)
    }

    pub fn resolve_index(&self, name: &str) -> Result<IndexInfo, ServiceError> {
        new_index_info(&self.config, name)
    }

    pub fn tls_config(&self, hostname: &str) -> Result<TlsConfig, ServiceError> {
        tls::tls_config(&self.config, hostname)
    }

    pub fn lookup_pull_endpoints(&self, hostname: &str) -> Result<Vec<ApiEndpoint>, ServiceError> {
        endpoint::lookup_pull_endpoints(&self.config, hostname)
    }

    pub fn lookup_push_endpoints(&self, hostname: &str) -> Result<Vec<ApiEndpoint>, ServiceError> {
        endpoint::lookup_push_endpoints(&self.config, hostname)
    }

    /// Logs in with `auth_config`, returning the registry's status message and
    /// an identity token (empty when the registry issued none).
    pub async fn auth(
        &self,
        auth_config: &AuthConfig,
        user_agent: &str,
    ) -> Result<(String, String), ServiceError> {
        tracing::debug!("Doing login: {}", auth_config.server_address);
        auth::auth(&self.config, self.sessions.as_ref(), auth_config, user_agent).await
    }

    pub async fn search(
        &self,
        term: &str,
        auth_configs: &HashMap<String, AuthConfig>,
        user_agent: &str,
        no_index: bool,
    ) -> Result<Vec<SearchResultExt>, ServiceError> {
        tracing::debug!("Doing search: {}", term);
        search::search(
            self.config.clone(),
            self.sessions.clone(),
            term,
            auth_configs,
            user_agent,
            no_index,
        )
        .await
    }
}
