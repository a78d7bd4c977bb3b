use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use wharf_remote::{DEFAULT_INDEX, LEGACY_DEFAULT_INDEX, Url, is_valid_hostname};

/// Where per-registry CA bundles live, one directory per `host[:port]`.
pub const DEFAULT_CERTS_DIR: &str = "/etc/docker/certs.d";

/// Block-list entry that blocks every registry except the default index.
pub const BLOCK_ALL: &str = "*";

/// Startup options for the registry service. Field names follow the keys of
/// `daemon.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    #[serde(rename = "registry-mirrors")]
    pub mirrors: Vec<String>,
    #[serde(rename = "insecure-registries")]
    pub insecure_registries: Vec<String>,
    #[serde(rename = "block-registries")]
    pub blocked_registries: Vec<String>,
    /// Indexes queried by unqualified searches, highest priority first.
    #[serde(rename = "add-registries")]
    pub default_registries: Vec<String>,
    #[serde(rename = "disable-legacy-registry")]
    pub v2_only: bool,
    #[serde(rename = "certs-dir")]
    pub certs_dir: Option<PathBuf>,
}

impl ServiceOptions {
    /// Reads options from a `daemon.json`-style file.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Appends `other`'s lists to ours; flags and paths set in `other` win.
    pub fn merge(mut self, other: ServiceOptions) -> Self {
        self.mirrors.extend(other.mirrors);
        self.insecure_registries.extend(other.insecure_registries);
        self.blocked_registries.extend(other.blocked_registries);
        self.default_registries.extend(other.default_registries);
        self.v2_only |= other.v2_only;
        if other.certs_dir.is_some() {
            self.certs_dir = other.certs_dir;
        }
        self
    }
}

/// An IP network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix as u32).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix as u32).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for IpNetwork {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ServiceError::InvalidConfig(format!("invalid CIDR {:?}", s));

        let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(invalid());
        }
        Ok(Self { addr, prefix })
    }
}

/// Process-wide registry policy. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    mirrors: Vec<Url>,
    insecure_networks: Vec<IpNetwork>,
    insecure_hosts: HashSet<String>,
    blocked: HashSet<String>,
    default_registries: Vec<String>,
    v2_only: bool,
    certs_dir: PathBuf,
}

impl ServiceConfig {
    pub fn new(options: ServiceOptions) -> Result<Self, ServiceError> {
        let mut config = Self::default();

        for mirror in &options.mirrors {
            config.mirrors.push(validate_mirror(mirror)?);
        }

        for entry in &options.insecure_registries {
            let entry = entry.trim().to_ascii_lowercase();
            if entry.contains("://") {
                return Err(ServiceError::InvalidConfig(format!(
                    "insecure registry {} should not contain '://'",
                    entry
                )));
            }
            if entry.contains('/') {
                config.insecure_networks.push(entry.parse()?);
            } else if normalize_index_name(&entry) == DEFAULT_INDEX {
                tracing::warn!("Ignoring insecure registry {}: the default index is always secure", entry);
            } else if !entry.is_empty() {
                config.insecure_hosts.insert(entry);
            }
        }

        config.blocked = options
            .blocked_registries
            .iter()
            .map(|b| normalize_index_name(&b.trim().to_ascii_lowercase()).to_string())
            .filter(|b| !b.is_empty())
            .collect();

        for registry in &options.default_registries {
            let registry = normalize_index_name(registry.trim());
            if !is_valid_hostname(registry) {
                return Err(ServiceError::InvalidConfig(format!(
                    "search registry {:?} is not a valid hostname",
                    registry
                )));
            }
            if !config.default_registries.iter().any(|r| r == registry) {
                config.default_registries.push(registry.to_string());
            }
        }

        config.v2_only = options.v2_only;
        if let Some(dir) = options.certs_dir {
            config.certs_dir = dir;
        }

        Ok(config)
    }

    pub fn mirrors(&self) -> &[Url] {
        &self.mirrors
    }

    pub fn default_registries(&self) -> &[String] {
        &self.default_registries
    }

    pub fn v2_only(&self) -> bool {
        self.v2_only
    }

    pub fn certs_dir(&self) -> &Path {
        &self.certs_dir
    }

    /// False iff `hostname` is listed as insecure or its address lies in an
    /// insecure network. Names are never resolved.
    pub fn is_secure_index(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        let hostname = normalize_index_name(&hostname);
        if hostname == DEFAULT_INDEX {
            return true;
        }
        if self.insecure_hosts.contains(hostname) {
            return false;
        }
        match host_ip(hostname) {
            Some(ip) => !self.insecure_networks.iter().any(|net| net.contains(ip)),
            None => true,
        }
    }

    /// True when `hostname` is on the block list, or when everything is
    /// blocked and `hostname` is not the default index.
    pub fn is_blocked(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        let hostname = normalize_index_name(&hostname);
        self.blocked.contains(hostname)
            || (self.blocked.contains(BLOCK_ALL) && hostname != DEFAULT_INDEX)
    }

    /// Exact block-list match, ignoring `*`.
    pub fn is_listed_blocked(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        self.blocked.contains(normalize_index_name(&hostname))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mirrors: Vec::new(),
            // Loopback registries are always reachable without TLS.
            insecure_networks: vec![IpNetwork {
                addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 0)),
                prefix: 8,
            }],
            insecure_hosts: HashSet::new(),
            blocked: HashSet::new(),
            default_registries: Vec::new(),
            v2_only: false,
            certs_dir: PathBuf::from(DEFAULT_CERTS_DIR),
        }
    }
}

pub fn normalize_index_name(name: &str) -> &str {
    if name == LEGACY_DEFAULT_INDEX {
        DEFAULT_INDEX
    } else {
        name
    }
}

fn validate_mirror(mirror: &str) -> Result<Url, ServiceError> {
    let invalid = |reason: &str| ServiceError::InvalidConfig(format!("invalid mirror {:?}: {}", mirror, reason));

    let url = Url::parse(mirror.trim()).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("unsupported scheme"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("path, query and fragment are not allowed"));
    }
    Ok(url)
}

/// The address part of `host[:port]`, when it is an IP literal. `localhost`
/// counts as loopback.
fn host_ip(hostname: &str) -> Option<IpAddr> {
    if let Ok(ip) = hostname.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = hostname.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    let host = hostname
        .rsplit_once(':')
        .map_or(hostname, |(host, _)| host)
        .trim_start_matches('[')
        .trim_end_matches(']');
    if host == "localhost" {
        return Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    host.parse().ok()
}
