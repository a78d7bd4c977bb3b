use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid registry configuration: {0}")]
    InvalidConfig(String),

    #[error("no configured repository to search")]
    NoSearchIndex,

    #[error("all endpoints for {0} are blocked")]
    AllEndpointsBlocked(String),

    #[error("no endpoints available for {0}")]
    NoEndpoints(String),

    #[error("search of {0} did not complete")]
    SearchAborted(String),

    #[error("registry error: {0}")]
    Registry(#[from] wharf_remote::RegistryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    pub(crate) fn invalid_reference(e: wharf_remote::RegistryError) -> Self {
        match e {
            wharf_remote::RegistryError::InvalidReference(msg) => ServiceError::InvalidReference(msg),
            other => ServiceError::Registry(other),
        }
    }
}
