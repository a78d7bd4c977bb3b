use crate::error::RegistryError;
use reqwest::{Certificate, ClientBuilder};

/// Client-side TLS settings for one registry host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// Accept any server certificate.
    pub insecure_skip_verify: bool,
    /// Extra PEM-encoded roots trusted on top of the system store.
    pub root_certificates: Vec<Vec<u8>>,
}

impl TlsConfig {
    pub fn secure(root_certificates: Vec<Vec<u8>>) -> Self {
        Self {
            insecure_skip_verify: false,
            root_certificates,
        }
    }

    pub fn insecure() -> Self {
        Self {
            insecure_skip_verify: true,
            root_certificates: Vec::new(),
        }
    }

    /// Hosts we do not verify may also be reached without TLS at all.
    pub fn permits_plaintext(&self) -> bool {
        self.insecure_skip_verify
    }

    pub fn apply(&self, mut builder: ClientBuilder) -> Result<ClientBuilder, RegistryError> {
        for pem in &self.root_certificates {
            let certificate =
                Certificate::from_pem(pem).map_err(|e| RegistryError::Tls(e.to_string()))?;
            builder = builder.add_root_certificate(certificate);
        }
        Ok(builder.danger_accept_invalid_certs(self.insecure_skip_verify))
    }
}
