use crate::config::{ServiceConfig, normalize_index_name};
use crate::error::ServiceError;
use wharf_remote::{DEFAULT_INDEX, DEFAULT_REPO_PREFIX, ImageReference};

/// A registry index and the policy that applies to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub mirrors: Vec<String>,
    pub secure: bool,
    pub official: bool,
}

/// A reference paired with its index and the names it goes by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub reference: ImageReference,
    pub index: IndexInfo,
    /// Path on the registry, `library/` applied for the default index.
    pub remote_name: String,
    /// Name used for local storage; the default index is elided.
    pub local_name: String,
    pub canonical_name: String,
    /// True for images in the default index's `library/` namespace.
    pub official: bool,
}

pub fn validate_index_name(name: &str) -> Result<String, ServiceError> {
    let name = normalize_index_name(name);
    if name.starts_with('-') || name.ends_with('-') {
        return Err(ServiceError::InvalidReference(format!(
            "invalid index name ({}). Cannot begin or end with a hyphen",
            name
        )));
    }
    Ok(name.to_string())
}

pub fn new_index_info(config: &ServiceConfig, name: &str) -> Result<IndexInfo, ServiceError> {
    let name = validate_index_name(name)?;

    if name == DEFAULT_INDEX {
        return Ok(IndexInfo {
            name,
            mirrors: config.mirrors().iter().map(|m| m.to_string()).collect(),
            secure: true,
            official: true,
        });
    }

    Ok(IndexInfo {
        secure: config.is_secure_index(&name),
        name,
        mirrors: Vec::new(),
        official: false,
    })
}

pub fn new_repository_info(
    config: &ServiceConfig,
    reference: &ImageReference,
) -> Result<RepositoryInfo, ServiceError> {
    let index = new_index_info(config, reference.index.as_deref().unwrap_or(DEFAULT_INDEX))?;

    if index.official {
        let remote_name = if reference.repository.contains('/') {
            reference.repository.clone()
        } else {
            format!("{}{}", DEFAULT_REPO_PREFIX, reference.repository)
        };
        let local_name = remote_name
            .strip_prefix(DEFAULT_REPO_PREFIX)
            .unwrap_or(&remote_name)
            .to_string();

        return Ok(RepositoryInfo {
            reference: reference.clone(),
            canonical_name: format!("{}/{}", DEFAULT_INDEX, remote_name),
            official: local_name != remote_name,
            remote_name,
            local_name,
            index,
        });
    }

    let local_name = format!("{}/{}", index.name, reference.repository);
    Ok(RepositoryInfo {
        reference: reference.clone(),
        remote_name: reference.repository.clone(),
        canonical_name: local_name.clone(),
        local_name,
        official: false,
        index,
    })
}

/// Resolves `reference` against a configuration with no mirrors, insecure
/// registries or blocks, for callers that have no service at hand.
pub fn parse_repository_info(reference: &ImageReference) -> Result<RepositoryInfo, ServiceError> {
    new_repository_info(&ServiceConfig::default(), reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceOptions;

    fn parse(s: &str) -> ImageReference {
        ImageReference::parse(s).unwrap()
    }

    #[test]
    fn test_unqualified_resolves_to_default_index() {
        let info = parse_repository_info(&parse("ubuntu")).unwrap();
        assert_eq!(info.index.name, "docker.io");
        assert!(info.index.official);
        assert!(info.index.secure);
        assert_eq!(info.remote_name, "library/ubuntu");
        assert_eq!(info.local_name, "ubuntu");
        assert_eq!(info.canonical_name, "docker.io/library/ubuntu");
        assert!(info.official);
    }

    #[test]
    fn test_namespaced_default_index_is_not_official_image() {
        let info = parse_repository_info(&parse("index.docker.io/bitnami/redis")).unwrap();
        assert_eq!(info.index.name, "docker.io");
        assert_eq!(info.remote_name, "bitnami/redis");
        assert_eq!(info.local_name, "bitnami/redis");
        assert!(!info.official);
    }

    #[test]
    fn test_private_index() {
        let config = ServiceConfig::new(ServiceOptions {
            insecure_registries: vec!["myregistry.example.com:5000".to_string()],
            ..Default::default()
        })
        .unwrap();
        let info =
            new_repository_info(&config, &parse("myregistry.example.com:5000/foo/bar:latest"))
                .unwrap();
        assert_eq!(info.index.name, "myregistry.example.com:5000");
        assert!(!info.index.secure);
        assert!(!info.index.official);
        assert_eq!(info.remote_name, "foo/bar");
        assert_eq!(info.local_name, "myregistry.example.com:5000/foo/bar");
        assert_eq!(info.reference.tag.as_deref(), Some("latest"));
    }

    #[test]
    fn test_default_index_carries_mirrors() {
        let config = ServiceConfig::new(ServiceOptions {
            mirrors: vec!["https://mirror.example.com".to_string()],
            ..Default::default()
        })
        .unwrap();
        let index = new_index_info(&config, "index.docker.io").unwrap();
        assert_eq!(index.mirrors, vec!["https://mirror.example.com/".to_string()]);
    }

    #[test]
    fn test_hyphenated_index_rejected() {
        let config = ServiceConfig::default();
        assert!(matches!(
            new_index_info(&config, "bad-.example.com-"),
            Err(ServiceError::InvalidReference(_))
        ));
    }
}
