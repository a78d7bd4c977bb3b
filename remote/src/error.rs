use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid image reference: {0}")]
    InvalidReference(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry error: {0}")]
    Registry(String),
}

impl RegistryError {
    /// True when the request never got an HTTP response back (connect, TLS
    /// handshake or timeout), which is what warrants trying another endpoint.
    pub fn is_transport(&self) -> bool {
        match self {
            RegistryError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            RegistryError::Io(_) => true,
            _ => false,
        }
    }
}
