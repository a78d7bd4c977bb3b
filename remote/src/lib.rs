mod client;
mod error;
mod reference;
mod tls;
mod types;

pub use client::{V1Client, V2Client};
pub use error::RegistryError;
pub use reference::{
    is_default_index, is_valid_hostname, split_index_and_remote, ImageReference, DEFAULT_INDEX,
    DEFAULT_REPO_PREFIX, LEGACY_DEFAULT_INDEX,
};
pub use reqwest::Url;
pub use tls::TlsConfig;
pub use types::*;
