use crate::error::RegistryError;
use crate::tls::TlsConfig;
use crate::types::*;
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::{Client, StatusCode, Url};

const API_VERSION_HEADER: &str = "docker-distribution-api-version";
const LOGIN_SUCCEEDED: &str = "Login Succeeded";

fn http_client(tls: &TlsConfig, user_agent: &str) -> Result<Client, RegistryError> {
    let builder = Client::builder().user_agent(user_agent);
    Ok(tls.apply(builder)?.build()?)
}

fn join(base: &Url, path: &str) -> Result<Url, RegistryError> {
    base.join(path)
        .map_err(|e| RegistryError::Registry(format!("invalid endpoint url {}: {}", base, e)))
}

/// Client for the legacy registry API. `url` is the `/v1/` root.
pub struct V1Client {
    client: Client,
    url: Url,
    auth: AuthConfig,
}

impl V1Client {
    pub fn new(
        url: Url,
        tls: &TlsConfig,
        user_agent: &str,
        auth: AuthConfig,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            client: http_client(tls, user_agent)?,
            url,
            auth,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn login(&self) -> LoginOutcome {
        let url = match join(&self.url, "users/") {
            Ok(url) => url,
            Err(e) => return LoginOutcome::Fatal { cause: e },
        };

        tracing::debug!("Attempting v1 login at: {}", url);

        let response = match self
            .client
            .get(url)
            .basic_auth(&self.auth.username, Some(&self.auth.password))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return LoginOutcome::RetryNext { cause: e.into() },
        };

        match response.status() {
            StatusCode::OK => LoginOutcome::succeeded(LOGIN_SUCCEEDED, ""),
            StatusCode::UNAUTHORIZED => LoginOutcome::Fatal {
                cause: RegistryError::AuthFailed(
                    "Wrong login/password, please try again".to_string(),
                ),
            },
            StatusCode::FORBIDDEN => LoginOutcome::Fatal {
                cause: RegistryError::AuthFailed(format!(
                    "Login: Account is not active. Please check your e-mail for a confirmation link at {}",
                    self.url
                )),
            },
            status => {
                let body = response.text().await.unwrap_or_default();
                LoginOutcome::Fatal {
                    cause: RegistryError::Registry(format!(
                        "login: {} (code {})",
                        body.trim(),
                        status.as_u16()
                    )),
                }
            }
        }
    }

    pub async fn search_repositories(&self, term: &str) -> Result<SearchResults, RegistryError> {
        let mut url = join(&self.url, "search")?;
        url.query_pairs_mut().append_pair("q", term);

        tracing::debug!("Searching repositories at: {}", url);

        let mut request = self.client.get(url).header("X-Docker-Token", "true");
        if self.auth.has_credentials() {
            request = request.basic_auth(&self.auth.username, Some(&self.auth.password));
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(RegistryError::Registry(format!(
                "unexpected status code {} searching {}",
                response.status().as_u16(),
                self.url
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Client for the current registry API. `url` is the registry root; requests
/// go to `/v2/` beneath it.
pub struct V2Client {
    client: Client,
    url: Url,
    auth: AuthConfig,
}

impl V2Client {
    pub fn new(
        url: Url,
        tls: &TlsConfig,
        user_agent: &str,
        auth: AuthConfig,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            client: http_client(tls, user_agent)?,
            url,
            auth,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Pings `/v2/` and completes whatever challenge it answers with. Anything
    /// that shows the endpoint does not speak v2 asks for the next endpoint.
    pub async fn login(&self) -> LoginOutcome {
        let url = match join(&self.url, "v2/") {
            Ok(url) => url,
            Err(e) => return LoginOutcome::Fatal { cause: e },
        };

        tracing::debug!("Attempting v2 login at: {}", url);

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return LoginOutcome::RetryNext { cause: e.into() },
        };

        let speaks_v2 = response
            .headers()
            .get_all(API_VERSION_HEADER)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(|c: char| c == ',' || c.is_whitespace()))
            .any(|v| v == "registry/2.0");
        if !speaks_v2 {
            return LoginOutcome::RetryNext {
                cause: RegistryError::Registry(format!("{} does not support the v2 API", url)),
            };
        }

        match response.status() {
            StatusCode::OK => LoginOutcome::succeeded(LOGIN_SUCCEEDED, ""),
            StatusCode::UNAUTHORIZED => {
                let www_auth = response
                    .headers()
                    .get(WWW_AUTHENTICATE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                let result = if www_auth.to_ascii_lowercase().starts_with("bearer") {
                    self.fetch_token(&www_auth).await
                } else if www_auth.to_ascii_lowercase().starts_with("basic") {
                    self.basic_login(url).await
                } else {
                    Err(RegistryError::AuthFailed(format!(
                        "unsupported authentication challenge {:?}",
                        www_auth
                    )))
                };

                match result {
                    Ok(token) => LoginOutcome::succeeded(LOGIN_SUCCEEDED, token),
                    Err(e) => LoginOutcome::Fatal { cause: e },
                }
            }
            status => LoginOutcome::Fatal {
                cause: RegistryError::Registry(format!(
                    "unexpected status code {} from {}",
                    status.as_u16(),
                    url
                )),
            },
        }
    }

    async fn fetch_token(&self, www_auth: &str) -> Result<String, RegistryError> {
        let realm = extract_auth_param(www_auth, "realm")
            .ok_or_else(|| RegistryError::AuthFailed("no realm in www-authenticate".to_string()))?;
        let mut url = Url::parse(&realm)
            .map_err(|e| RegistryError::AuthFailed(format!("invalid realm {}: {}", realm, e)))?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = extract_auth_param(www_auth, "service") {
                query.append_pair("service", &service);
            }
            if !self.auth.username.is_empty() {
                query.append_pair("account", &self.auth.username);
            }
            query.append_pair("client_id", "wharf");
            query.append_pair("offline_token", "true");
        }

        tracing::debug!("Requesting token from: {}", url);

        let mut request = self.client.get(url);
        if !self.auth.identity_token.is_empty() {
            request = request.bearer_auth(&self.auth.identity_token);
        } else if self.auth.has_credentials() {
            request = request.basic_auth(&self.auth.username, Some(&self.auth.password));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RegistryError::AuthFailed(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        if token_response.get_token().is_none() {
            return Err(RegistryError::AuthFailed("no token in response".to_string()));
        }

        Ok(token_response.refresh_token.unwrap_or_default())
    }

    async fn basic_login(&self, url: Url) -> Result<String, RegistryError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.auth.username, Some(&self.auth.password))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(String::new())
        } else {
            Err(RegistryError::AuthFailed(format!(
                "basic auth rejected with {}",
                response.status()
            )))
        }
    }
}

fn extract_auth_param(header: &str, param: &str) -> Option<String> {
    let search = format!("{}=\"", param);
    if let Some(start) = header.find(&search) {
        let start = start + search.len();
        if let Some(end) = header[start..].find('"') {
            return Some(header[start..start + end].to_string());
        }
    }
    None
}
