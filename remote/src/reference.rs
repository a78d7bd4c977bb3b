use crate::error::RegistryError;
use std::fmt;

/// Name of the default public index.
pub const DEFAULT_INDEX: &str = "docker.io";

/// Hostname the default index used to be addressed by.
pub const LEGACY_DEFAULT_INDEX: &str = "index.docker.io";

/// Namespace implied for single-segment names on the default index.
pub const DEFAULT_REPO_PREFIX: &str = "library/";

const NAME_TOTAL_LENGTH_MAX: usize = 255;
const TAG_LENGTH_MAX: usize = 128;
const DIGEST_HEX_LENGTH_MIN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub index: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

/// A leading path segment names an index iff it looks like a host: it has a
/// dot or a port, or is `localhost`.
pub fn is_valid_hostname(hostname: &str) -> bool {
    !hostname.is_empty()
        && !hostname.contains('/')
        && (hostname.contains('.') || hostname.contains(':') || hostname == "localhost")
}

/// Splits `name` into its explicit index and the remaining remote name. When
/// the first segment is not a hostname the whole input is the remote name.
pub fn split_index_and_remote(name: &str) -> (Option<&str>, &str) {
    match name.split_once('/') {
        Some((first, rest)) if is_valid_hostname(first) => (Some(first), rest),
        _ => (None, name),
    }
}

pub fn is_default_index(index: &str) -> bool {
    index == DEFAULT_INDEX || index == LEGACY_DEFAULT_INDEX
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self, RegistryError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(RegistryError::InvalidReference(
                "repository name must have at least one component".to_string(),
            ));
        }

        let (name, digest) = match reference.rsplit_once('@') {
            Some((name, digest)) => {
                validate_digest(digest)?;
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        let (name, tag) = match name.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => {
                validate_tag(tag)?;
                (name, Some(tag.to_string()))
            }
            _ => (name, None),
        };

        if name.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(RegistryError::InvalidReference(format!(
                "repository name must not be more than {} characters",
                NAME_TOTAL_LENGTH_MAX
            )));
        }

        let (index, repository) = split_index_and_remote(name);
        if let Some(index) = index {
            validate_hostname_chars(index)?;
        }
        validate_path(repository, reference)?;

        // A digest pins the content; the tag is only informational then.
        let tag = if digest.is_some() { None } else { tag };

        Ok(Self {
            index: index.map(str::to_string),
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    pub fn tag_or_default(&self) -> &str {
        self.tag.as_deref().unwrap_or("latest")
    }

    pub fn reference(&self) -> String {
        if let Some(digest) = &self.digest {
            digest.clone()
        } else {
            self.tag_or_default().to_string()
        }
    }

    /// Repository name including the index, without tag or digest.
    pub fn name(&self) -> String {
        match &self.index {
            Some(index) => format!("{}/{}", index, self.repository),
            None => self.repository.clone(),
        }
    }

    /// Path on the registry. Single-segment names on the default index live
    /// under the `library/` namespace.
    pub fn remote_name(&self) -> String {
        match &self.index {
            Some(index) if is_default_index(index) && !self.repository.contains('/') => {
                format!("{}{}", DEFAULT_REPO_PREFIX, self.repository)
            }
            _ => self.repository.clone(),
        }
    }

    pub fn full_name(&self) -> String {
        match &self.digest {
            Some(digest) => format!("{}@{}", self.name(), digest),
            None => format!("{}:{}", self.name(), self.tag_or_default()),
        }
    }

    pub fn is_fully_qualified(&self) -> bool {
        self.index.is_some()
    }

    /// Replaces the name part, keeping the tag or digest of `self`.
    pub fn substitute_repository_name(&self, name: &str) -> Result<Self, RegistryError> {
        let renamed = Self::parse(name)?;
        if renamed.tag.is_some() || renamed.digest.is_some() {
            return Err(RegistryError::InvalidReference(format!(
                "{} is not a bare repository name",
                name
            )));
        }

        Ok(Self {
            index: renamed.index,
            repository: renamed.repository,
            tag: self.tag.clone(),
            digest: self.digest.clone(),
        })
    }

    /// Prefixes `index` onto an unqualified reference. References that already
    /// name an index are returned as they are.
    pub fn qualify(&self, index: &str) -> Result<Self, RegistryError> {
        if !is_valid_hostname(index) {
            return Err(RegistryError::InvalidReference(format!(
                "invalid hostname {:?}",
                index
            )));
        }
        if self.index.is_some() {
            return Ok(self.clone());
        }
        self.substitute_repository_name(&format!("{}/{}", index, self.repository))
    }

    pub fn unqualify(&self) -> Self {
        if self.index.is_none() {
            return self.clone();
        }
        self.substitute_repository_name(&self.repository)
            .unwrap_or_else(|_| self.clone())
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)
        } else if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)
        } else {
            Ok(())
        }
    }
}

impl std::str::FromStr for ImageReference {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_hostname_chars(index: &str) -> Result<(), RegistryError> {
    let valid = index
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
        && !index.starts_with('-')
        && !index.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidReference(format!(
            "invalid registry hostname {:?}",
            index
        )))
    }
}

fn validate_path(path: &str, reference: &str) -> Result<(), RegistryError> {
    for component in path.split('/') {
        let chars_ok = component
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
        let ends_ok = component
            .chars()
            .next()
            .zip(component.chars().last())
            .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

        if !chars_ok || !ends_ok {
            if component.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(RegistryError::InvalidReference(format!(
                    "repository name must be lowercase: {}",
                    reference
                )));
            }
            return Err(RegistryError::InvalidReference(format!(
                "invalid reference format: {}",
                reference
            )));
        }
    }
    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), RegistryError> {
    let mut chars = tag.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if first_ok && rest_ok && tag.len() <= TAG_LENGTH_MAX {
        Ok(())
    } else {
        Err(RegistryError::InvalidReference(format!("invalid tag {:?}", tag)))
    }
}

fn validate_digest(digest: &str) -> Result<(), RegistryError> {
    let invalid = || RegistryError::InvalidReference(format!("invalid digest {:?}", digest));

    let (algorithm, hex) = digest.split_once(':').ok_or_else(invalid)?;
    let algorithm_ok = !algorithm.is_empty()
        && algorithm
            .split(|c| matches!(c, '+' | '.' | '_' | '-'))
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()));
    let hex_ok = hex.len() >= DIGEST_HEX_LENGTH_MIN && hex.chars().all(|c| c.is_ascii_hexdigit());

    if algorithm_ok && hex_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}
