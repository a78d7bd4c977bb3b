mod commands;
mod utils;

use clap::{Parser, Subcommand};
use commands::{endpoints, login, resolve, search};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wharf_registry::{RegistryService, ServiceOptions};
use wharf_remote::DEFAULT_INDEX;

const USER_AGENT: &str = concat!("wharf/", env!("CARGO_PKG_VERSION"));

#[derive(Parser)]
#[command(name = "wharf")]
#[command(about = "Wharf - resolve, log in to and search container registries")]
struct Cli {
    /// Daemon-style JSON file with registry options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preferred mirror for the default index
    #[arg(long = "registry-mirror", global = true)]
    mirrors: Vec<String>,

    /// Registry host or CIDR that may be reached without verified TLS
    #[arg(long = "insecure-registry", global = true)]
    insecure_registries: Vec<String>,

    /// Registry that must never be contacted
    #[arg(long = "block-registry", global = true)]
    blocked_registries: Vec<String>,

    /// Registry to search, in priority order
    #[arg(long = "add-registry", global = true)]
    default_registries: Vec<String>,

    /// Never fall back to the v1 protocol
    #[arg(long = "disable-legacy-registry", global = true)]
    v2_only: bool,

    /// Directory holding per-registry CA certificates
    #[arg(long, global = true)]
    certs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn options(&self) -> Result<ServiceOptions, Box<dyn std::error::Error>> {
        let base = match &self.config {
            Some(path) => {
                tracing::debug!("Loading registry options from {:?}", path);
                ServiceOptions::load(path)?
            }
            None => ServiceOptions::default(),
        };

        let mut options = base.merge(ServiceOptions {
            mirrors: self.mirrors.clone(),
            insecure_registries: self.insecure_registries.clone(),
            blocked_registries: self.blocked_registries.clone(),
            default_registries: self.default_registries.clone(),
            v2_only: self.v2_only,
            certs_dir: self.certs_dir.clone(),
        });
        if options.default_registries.is_empty() {
            options.default_registries.push(DEFAULT_INDEX.to_string());
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a reference is resolved
    Resolve {
        /// Image reference
        reference: String,
    },
    /// List the endpoints that would be tried for a registry
    Endpoints {
        /// Registry hostname
        #[arg(default_value = DEFAULT_INDEX)]
        hostname: String,

        /// Show push endpoints instead of pull endpoints
        #[arg(long)]
        push: bool,
    },
    /// Log in to a registry
    Login {
        /// Registry server (defaults to the default index)
        server: Option<String>,

        /// Username
        #[arg(long, short)]
        username: String,

        /// Password
        #[arg(long, short)]
        password: String,
    },
    /// Search the configured registries for images
    Search {
        /// Search term
        term: String,

        /// Maximum number of results
        #[arg(long, default_value_t = 25)]
        limit: usize,

        /// Filter output (stars=N, is-official=BOOL, is-automated=BOOL)
        #[arg(long, short)]
        filter: Vec<String>,

        /// Merge results from all indexes and hide the INDEX column
        #[arg(long)]
        no_index: bool,

        /// Don't truncate descriptions
        #[arg(long)]
        no_trunc: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// JSON file mapping registry servers to credentials
        #[arg(long)]
        auth_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let service = RegistryService::with_http(cli.options()?)?;

    match cli.command {
        Commands::Resolve { reference } => {
            resolve(&service, &reference)?;
        }
        Commands::Endpoints { hostname, push } => {
            endpoints(&service, &hostname, push)?;
        }
        Commands::Login {
            server,
            username,
            password,
        } => {
            login(&service, server, username, password, USER_AGENT).await?;
        }
        Commands::Search {
            term,
            limit,
            filter,
            no_index,
            no_trunc,
            json,
            auth_file,
        } => {
            let options = search::SearchOptions {
                limit,
                filters: filter,
                no_index,
                no_trunc,
                json,
                auth_file,
            };
            search::search(&service, &term, options, USER_AGENT).await?;
        }
    }

    Ok(())
}
