use crate::config::ServiceConfig;
use crate::error::ServiceError;
use std::io::ErrorKind;
use std::path::{Component, Path};
use wharf_remote::TlsConfig;

/// TLS settings for talking to `hostname`. Secure hosts verify against the
/// system roots plus any `*.crt` bundle in the host's certs directory; insecure
/// hosts skip verification and may be reached over plain HTTP.
pub fn tls_config(config: &ServiceConfig, hostname: &str) -> Result<TlsConfig, ServiceError> {
    if !config.is_secure_index(hostname) {
        return Ok(TlsConfig::insecure());
    }

    if !is_single_path_component(hostname) {
        return Err(ServiceError::InvalidReference(format!(
            "invalid registry hostname {:?}",
            hostname
        )));
    }

    let roots = load_root_certificates(&config.certs_dir().join(hostname))?;
    if !roots.is_empty() {
        tracing::debug!("Loaded {} CA bundle(s) for {}", roots.len(), hostname);
    }
    Ok(TlsConfig::secure(roots))
}

/// `hostname` names exactly one directory directly under the certs dir.
fn is_single_path_component(hostname: &str) -> bool {
    if hostname.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(hostname).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn load_root_certificates(dir: &Path) -> Result<Vec<Vec<u8>>, ServiceError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "crt") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut roots = Vec::with_capacity(paths.len());
    for path in paths {
        roots.push(std::fs::read(&path)?);
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceOptions;

    fn config_with_certs(dir: &Path, insecure: &[&str]) -> ServiceConfig {
        ServiceConfig::new(ServiceOptions {
            insecure_registries: insecure.iter().map(|s| s.to_string()).collect(),
            certs_dir: Some(dir.to_path_buf()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_secure_host_loads_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let host_dir = dir.path().join("registry.example.com:5000");
        std::fs::create_dir_all(&host_dir).unwrap();
        std::fs::write(host_dir.join("b.crt"), b"second").unwrap();
        std::fs::write(host_dir.join("a.crt"), b"first").unwrap();
        std::fs::write(host_dir.join("client.key"), b"ignored").unwrap();

        let config = config_with_certs(dir.path(), &[]);
        let tls = tls_config(&config, "registry.example.com:5000").unwrap();

        assert!(!tls.insecure_skip_verify);
        assert!(!tls.permits_plaintext());
        assert_eq!(tls.root_certificates, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn test_secure_host_without_bundle_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_certs(dir.path(), &[]);
        let tls = tls_config(&config, "example.com").unwrap();
        assert_eq!(tls, TlsConfig::secure(vec![]));
    }

    #[test]
    fn test_insecure_host_skips_verification() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_certs(dir.path(), &["insecure.example.com"]);
        let tls = tls_config(&config, "insecure.example.com").unwrap();
        assert!(tls.insecure_skip_verify);
        assert!(tls.permits_plaintext());
        assert!(tls.root_certificates.is_empty());
    }

    #[test]
    fn test_hostname_cannot_escape_certs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let certs = dir.path().join("certs");
        std::fs::create_dir_all(&certs).unwrap();
        std::fs::write(dir.path().join("stolen.crt"), b"outside").unwrap();

        let config = config_with_certs(&certs, &[]);
        for hostname in ["..", ".", "../certs", "a/b", ""] {
            assert!(
                matches!(tls_config(&config, hostname), Err(ServiceError::InvalidReference(_))),
                "{}",
                hostname
            );
        }
        assert!(tls_config(&config, "registry.example.com").is_ok());
    }
}
