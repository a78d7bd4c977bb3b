use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::tls::tls_config;
use wharf_remote::{ApiVersion, DEFAULT_INDEX, TlsConfig, Url, is_default_index};

pub const DEFAULT_V2_REGISTRY: &str = "https://registry-1.docker.io";
pub const DEFAULT_V1_REGISTRY: &str = "https://index.docker.io/v1/";

/// One place to try talking to a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    pub url: Url,
    pub version: ApiVersion,
    pub mirror: bool,
    pub official: bool,
    pub trim_hostname: bool,
    pub tls: TlsConfig,
}

impl ApiEndpoint {
    /// `host[:port]` of the endpoint URL.
    pub fn host(&self) -> String {
        url_host(&self.url).unwrap_or_default()
    }

    /// Sort key: v2 before v1, and mirrors before the registry itself.
    fn preference(&self) -> (u8, u8) {
        let version = match self.version {
            ApiVersion::V2 => 0,
            ApiVersion::V1 => 1,
        };
        (version, if self.mirror { 0 } else { 1 })
    }
}

pub fn url_host(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Endpoints to pull from, most preferred first.
pub fn lookup_pull_endpoints(
    config: &ServiceConfig,
    hostname: &str,
) -> Result<Vec<ApiEndpoint>, ServiceError> {
    lookup_endpoints(config, hostname, true)
}

/// Endpoints to push to, most preferred first. Mirrors are never pushed to.
pub fn lookup_push_endpoints(
    config: &ServiceConfig,
    hostname: &str,
) -> Result<Vec<ApiEndpoint>, ServiceError> {
    lookup_endpoints(config, hostname, false)
}

/// Legacy endpoints only, used by search.
pub fn lookup_v1_endpoints(
    config: &ServiceConfig,
    hostname: &str,
) -> Result<Vec<ApiEndpoint>, ServiceError> {
    let endpoints = v1_endpoints(config, hostname)?;
    filter_blocked(config, hostname, endpoints)
}

fn lookup_endpoints(
    config: &ServiceConfig,
    hostname: &str,
    include_mirrors: bool,
) -> Result<Vec<ApiEndpoint>, ServiceError> {
    let mut endpoints = v2_endpoints(config, hostname)?;
    if !config.v2_only() {
        endpoints.extend(v1_endpoints(config, hostname)?);
    }
    if !include_mirrors {
        endpoints.retain(|e| !e.mirror);
    }

    // Stable, so https stays ahead of its plaintext fallback.
    endpoints.sort_by_key(ApiEndpoint::preference);

    filter_blocked(config, hostname, endpoints)
}

fn v2_endpoints(config: &ServiceConfig, hostname: &str) -> Result<Vec<ApiEndpoint>, ServiceError> {
    let mut endpoints = Vec::new();

    if is_default_index(hostname) {
        for mirror in config.mirrors() {
            let tls = tls_config(config, &url_host(mirror).unwrap_or_default())?;
            endpoints.push(ApiEndpoint {
                url: mirror.clone(),
                version: ApiVersion::V2,
                mirror: true,
                official: false,
                trim_hostname: true,
                tls,
            });
        }

        endpoints.push(ApiEndpoint {
            url: official_url(DEFAULT_V2_REGISTRY)?,
            version: ApiVersion::V2,
            mirror: false,
            official: true,
            trim_hostname: true,
            tls: tls_config(config, DEFAULT_INDEX)?,
        });
        return Ok(endpoints);
    }

    registry_endpoints(config, hostname, ApiVersion::V2, "")
}

fn v1_endpoints(config: &ServiceConfig, hostname: &str) -> Result<Vec<ApiEndpoint>, ServiceError> {
    if is_default_index(hostname) {
        return Ok(vec![ApiEndpoint {
            url: official_url(DEFAULT_V1_REGISTRY)?,
            version: ApiVersion::V1,
            mirror: false,
            official: true,
            trim_hostname: true,
            tls: tls_config(config, DEFAULT_INDEX)?,
        }]);
    }

    registry_endpoints(config, hostname, ApiVersion::V1, "v1/")
}

/// `https://host/path`, followed by `http://host/path` when the host is
/// insecure. A hostname that does not form a URL has no endpoints.
fn registry_endpoints(
    config: &ServiceConfig,
    hostname: &str,
    version: ApiVersion,
    path: &str,
) -> Result<Vec<ApiEndpoint>, ServiceError> {
    let Ok(secure_url) = Url::parse(&format!("https://{}/{}", hostname, path)) else {
        tracing::debug!("No {} endpoints for unparseable host {:?}", version, hostname);
        return Ok(Vec::new());
    };
    if hostname.is_empty() || url_host(&secure_url).is_none() {
        return Ok(Vec::new());
    }

    let tls = tls_config(config, hostname)?;
    let plaintext = tls.permits_plaintext();

    let mut endpoints = vec![ApiEndpoint {
        url: secure_url,
        version,
        mirror: false,
        official: false,
        trim_hostname: true,
        tls: tls.clone(),
    }];

    if plaintext {
        let plain_url = Url::parse(&format!("http://{}/{}", hostname, path)).map_err(|e| {
            ServiceError::InvalidReference(format!("invalid registry host {}: {}", hostname, e))
        })?;
        endpoints.push(ApiEndpoint {
            url: plain_url,
            version,
            mirror: false,
            official: false,
            trim_hostname: true,
            tls,
        });
    }

    Ok(endpoints)
}

fn official_url(url: &str) -> Result<Url, ServiceError> {
    Url::parse(url).map_err(|e| ServiceError::InvalidConfig(format!("{}: {}", url, e)))
}

/// Official endpoints follow the default index's entry. Mirrors are named
/// explicitly by the operator, so `*` does not reach them. Every other endpoint
/// is blocked when either the requested hostname or its own host is.
fn is_endpoint_blocked(config: &ServiceConfig, hostname: &str, endpoint: &ApiEndpoint) -> bool {
    if endpoint.official {
        return config.is_blocked(DEFAULT_INDEX);
    }
    if endpoint.mirror {
        return config.is_blocked(hostname) || config.is_listed_blocked(&endpoint.host());
    }
    config.is_blocked(hostname) || config.is_blocked(&endpoint.host())
}

fn filter_blocked(
    config: &ServiceConfig,
    hostname: &str,
    endpoints: Vec<ApiEndpoint>,
) -> Result<Vec<ApiEndpoint>, ServiceError> {
    let candidates = endpoints.len();
    let filtered: Vec<ApiEndpoint> = endpoints
        .into_iter()
        .filter(|e| {
            let blocked = is_endpoint_blocked(config, hostname, e);
            if blocked {
                tracing::debug!("Skipping blocked endpoint {}", e.url);
            }
            !blocked
        })
        .collect();

    if filtered.is_empty() && candidates > 0 {
        return Err(ServiceError::AllEndpointsBlocked(hostname.to_string()));
    }
    Ok(filtered)
}
