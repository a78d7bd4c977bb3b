mod auth;
mod config;
mod endpoint;
mod error;
mod index;
mod search;
mod service;
mod session;
mod tls;

pub use auth::{INDEX_SERVER, auth, resolve_auth_config};
pub use config::{BLOCK_ALL, DEFAULT_CERTS_DIR, IpNetwork, ServiceConfig, ServiceOptions, normalize_index_name};
pub use endpoint::{
    ApiEndpoint, DEFAULT_V1_REGISTRY, DEFAULT_V2_REGISTRY, lookup_pull_endpoints,
    lookup_push_endpoints, lookup_v1_endpoints, url_host,
};
pub use error::ServiceError;
pub use index::{
    IndexInfo, RepositoryInfo, new_index_info, new_repository_info, parse_repository_info,
    validate_index_name,
};
pub use search::{
    SearchResultExt, compare_results, is_search_term_fully_qualified, remove_duplicates, search,
    sort_results,
};
pub use service::RegistryService;
pub use session::{HttpSessionFactory, Session, SessionFactory};
pub use tls::tls_config;
