use wharf_registry::{INDEX_SERVER, RegistryService};
use wharf_remote::AuthConfig;

pub async fn login(
    service: &RegistryService,
    server: Option<String>,
    username: String,
    password: String,
    user_agent: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let server_address = server.unwrap_or_else(|| INDEX_SERVER.to_string());
    let auth_config = AuthConfig {
        username,
        password,
        server_address: server_address.clone(),
        ..Default::default()
    };

    let (status, token) = service
        .auth(&auth_config, user_agent)
        .await
        .map_err(|e| format!("Failed to log in to {}: {}", server_address, e))?;

    println!("{}", status);
    if !token.is_empty() {
        println!("Identity token: {}", token);
    }

    Ok(())
}
