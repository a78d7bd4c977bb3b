use crate::auth::resolve_auth_config;
use crate::config::ServiceConfig;
use crate::endpoint::lookup_v1_endpoints;
use crate::error::ServiceError;
use crate::index::{IndexInfo, new_index_info};
use crate::session::SessionFactory;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use wharf_remote::{AuthConfig, DEFAULT_REPO_PREFIX, SearchResults, split_index_and_remote};

/// A search hit labeled with the index that returned it and the registry
/// that hosts it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResultExt {
    pub index_name: String,
    pub registry_name: String,
    pub name: String,
    pub star_count: u64,
    pub description: String,
    pub is_official: bool,
    pub is_trusted: bool,
    pub is_automated: bool,
}

/// Ranking of search hits. With the index shown: index, stars (descending),
/// registry. Without: registry, stars (descending). Ties are broken by name
/// and then description.
pub fn compare_results(a: &SearchResultExt, b: &SearchResultExt, with_index: bool) -> Ordering {
    let primary = if with_index {
        a.index_name
            .cmp(&b.index_name)
            .then_with(|| b.star_count.cmp(&a.star_count))
            .then_with(|| a.registry_name.cmp(&b.registry_name))
    } else {
        a.registry_name
            .cmp(&b.registry_name)
            .then_with(|| b.star_count.cmp(&a.star_count))
    };

    primary
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.description.cmp(&b.description))
}

pub fn sort_results(results: &mut [SearchResultExt], with_index: bool) {
    results.sort_by(|a, b| compare_results(a, b, with_index));
}

/// Collapses neighbouring hits for the same repository, which happens when
/// several indexes front the same registry. The hit from the index listed
/// earlier in `priorities` survives; on a tie the one with more stars does.
pub fn remove_duplicates(
    results: Vec<SearchResultExt>,
    priorities: &[String],
) -> Vec<SearchResultExt> {
    let priority = |index_name: &str| {
        priorities
            .iter()
            .position(|p| p == index_name)
            .unwrap_or(priorities.len())
    };

    let mut deduped: Vec<SearchResultExt> = Vec::with_capacity(results.len());
    for current in results {
        match deduped.last_mut() {
            Some(prev) if prev.registry_name == current.registry_name && prev.name == current.name => {
                let prio_prev = priority(&prev.index_name);
                let prio_curr = priority(&current.index_name);
                if prio_prev > prio_curr
                    || (prio_prev == prio_curr && prev.star_count < current.star_count)
                {
                    *prev = current;
                }
            }
            _ => deduped.push(current),
        }
    }
    deduped
}

pub fn is_search_term_fully_qualified(term: &str) -> bool {
    split_index_and_remote(term).0.is_some()
}

fn validate_no_scheme(term: &str) -> Result<(), ServiceError> {
    if term.contains("://") {
        return Err(ServiceError::InvalidReference(format!(
            "invalid repository name (ex: \"registry.domain.tld/myrepos\"): {}",
            term
        )));
    }
    Ok(())
}

/// Queries every configured index in parallel, or only the named one for a
/// qualified term, and returns the ranked hits. Indexes that fail are logged
/// and dropped as long as one succeeds.
pub async fn search(
    config: Arc<ServiceConfig>,
    sessions: Arc<dyn SessionFactory>,
    term: &str,
    auth_configs: &HashMap<String, AuthConfig>,
    user_agent: &str,
    no_index: bool,
) -> Result<Vec<SearchResultExt>, ServiceError> {
    validate_no_scheme(term)?;

    let mut results = if is_search_term_fully_qualified(term) {
        search_term(&config, sessions.as_ref(), term, auth_configs, user_agent, None).await?
    } else if config.default_registries().is_empty() {
        return Err(ServiceError::NoSearchIndex);
    } else {
        search_all(&config, sessions, term, auth_configs, user_agent).await?
    };

    sort_results(&mut results, !no_index);
    if no_index {
        results = remove_duplicates(results, config.default_registries());
    }
    Ok(results)
}

async fn search_all(
    config: &Arc<ServiceConfig>,
    sessions: Arc<dyn SessionFactory>,
    term: &str,
    auth_configs: &HashMap<String, AuthConfig>,
    user_agent: &str,
) -> Result<Vec<SearchResultExt>, ServiceError> {
    let registries = config.default_registries().to_vec();
    let primary = registries[0].clone();
    let auth_configs = Arc::new(auth_configs.clone());

    let (tx, mut rx) =
        mpsc::channel::<(usize, Result<Vec<SearchResultExt>, ServiceError>)>(registries.len());

    for (position, registry) in registries.iter().enumerate() {
        let term = if position == 0 {
            term.to_string()
        } else {
            format!("{}/{}", registry, term)
        };
        let config = config.clone();
        let sessions = sessions.clone();
        let auth_configs = auth_configs.clone();
        let user_agent = user_agent.to_string();
        let primary = primary.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let result = search_term(
                &config,
                sessions.as_ref(),
                &term,
                &auth_configs,
                &user_agent,
                Some(primary.as_str()),
            )
            .await;
            let _ = tx.send((position, result)).await;
        });
    }

    drop(tx);

    // One slot per index; a task that dies without reporting leaves `None`.
    let mut outcomes: Vec<Option<Result<Vec<SearchResultExt>, ServiceError>>> =
        registries.iter().map(|_| None).collect();
    while let Some((position, result)) = rx.recv().await {
        outcomes[position] = Some(result);
    }

    let mut merged = Vec::new();
    let mut first_error = None;
    let mut succeeded = false;
    for (registry, outcome) in registries.iter().zip(outcomes) {
        match outcome.unwrap_or_else(|| Err(ServiceError::SearchAborted(registry.clone()))) {
            Ok(hits) => {
                succeeded = true;
                merged.extend(hits);
            }
            Err(e) => {
                tracing::error!("Search of {} failed: {}", registry, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if !succeeded => Err(e),
        _ => Ok(merged),
    }
}

/// Searches the single index named by `term`, or `primary` when the term is
/// unqualified.
async fn search_term(
    config: &ServiceConfig,
    sessions: &dyn SessionFactory,
    term: &str,
    auth_configs: &HashMap<String, AuthConfig>,
    user_agent: &str,
    primary: Option<&str>,
) -> Result<Vec<SearchResultExt>, ServiceError> {
    validate_no_scheme(term)?;

    let (index_name, remote_name) = split_index_and_remote(term);
    let index_name = index_name
        .or(primary)
        .unwrap_or(wharf_remote::DEFAULT_INDEX);
    let index = new_index_info(config, index_name)?;

    let endpoints = lookup_v1_endpoints(config, &index.name)?;
    let auth = resolve_auth_config(auth_configs, &index);

    // "library/foo" is known locally as "foo".
    let query = if index.official {
        remote_name
            .strip_prefix(DEFAULT_REPO_PREFIX)
            .unwrap_or(remote_name)
    } else {
        remote_name
    };

    let mut last_error = None;
    for endpoint in &endpoints {
        let session = sessions.session(endpoint, &auth, user_agent)?;
        match session.search_repositories(query).await {
            Ok(results) => return Ok(label_results(&index, results)),
            Err(e) if e.is_transport() => {
                tracing::debug!("Search via {} failed, trying next endpoint: {}", endpoint.url, e);
                last_error = Some(e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(match last_error {
        Some(e) => e.into(),
        None => ServiceError::NoEndpoints(index.name),
    })
}

/// Hits are attributed to the queried index; a hit whose own name starts with
/// a registry hostname is attributed to that registry instead.
fn label_results(index: &IndexInfo, results: SearchResults) -> Vec<SearchResultExt> {
    results
        .results
        .into_iter()
        .map(|result| {
            let (registry_name, name) = match split_index_and_remote(&result.name) {
                (Some(registry), name) => (registry.to_string(), name.to_string()),
                (None, _) => (index.name.clone(), result.name.clone()),
            };
            SearchResultExt {
                index_name: index.name.clone(),
                registry_name,
                name,
                star_count: result.star_count,
                description: result.description,
                is_official: result.is_official,
                is_trusted: result.is_trusted,
                is_automated: result.is_automated,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wharf_remote::SearchResult;

    fn hit(index: &str, registry: &str, name: &str, stars: u64) -> SearchResultExt {
        SearchResultExt {
            index_name: index.to_string(),
            registry_name: registry.to_string(),
            name: name.to_string(),
            star_count: stars,
            ..Default::default()
        }
    }

    fn names(results: &[SearchResultExt]) -> Vec<(&str, &str, u64)> {
        results
            .iter()
            .map(|r| (r.index_name.as_str(), r.name.as_str(), r.star_count))
            .collect()
    }

    #[test]
    fn test_sort_with_index() {
        let mut results = vec![
            hit("quay.io", "quay.io", "a", 100),
            hit("docker.io", "docker.io", "b", 1),
            hit("docker.io", "docker.io", "c", 50),
            hit("docker.io", "docker.io", "a", 50),
        ];
        sort_results(&mut results, true);
        assert_eq!(
            names(&results),
            vec![
                ("docker.io", "a", 50),
                ("docker.io", "c", 50),
                ("docker.io", "b", 1),
                ("quay.io", "a", 100),
            ]
        );
    }

    #[test]
    fn test_sort_without_index_ignores_index_name() {
        let mut results = vec![
            hit("z.example.com", "docker.io", "redis", 10),
            hit("docker.io", "docker.io", "redis", 50),
            hit("a.example.com", "quay.io", "redis", 99),
        ];
        sort_results(&mut results, false);
        assert_eq!(
            names(&results),
            vec![
                ("docker.io", "redis", 50),
                ("z.example.com", "redis", 10),
                ("a.example.com", "redis", 99),
            ]
        );
    }

    #[test]
    fn test_sort_is_idempotent_and_total() {
        let mut results = vec![
            SearchResultExt {
                description: "b".to_string(),
                ..hit("docker.io", "docker.io", "x", 1)
            },
            SearchResultExt {
                description: "a".to_string(),
                ..hit("docker.io", "docker.io", "x", 1)
            },
            hit("docker.io", "docker.io", "y", 1),
        ];
        for with_index in [true, false] {
            sort_results(&mut results, with_index);
            let once = results.clone();
            sort_results(&mut results, with_index);
            assert_eq!(results, once);
            assert_eq!(results[0].description, "a");
            for pair in results.windows(2) {
                assert_eq!(compare_results(&pair[0], &pair[1], with_index), Ordering::Less);
                assert_eq!(compare_results(&pair[1], &pair[0], with_index), Ordering::Greater);
            }
        }
    }

    #[test]
    fn test_remove_duplicates_prefers_index_priority() {
        let priorities = vec!["docker.io".to_string(), "mirror.example.com".to_string()];
        let mut results = vec![
            hit("docker.io", "docker.io", "redis", 10),
            hit("mirror.example.com", "docker.io", "redis", 50),
        ];
        sort_results(&mut results, false);

        let deduped = remove_duplicates(results, &priorities);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].index_name, "docker.io");
        assert_eq!(deduped[0].star_count, 10);
    }

    #[test]
    fn test_remove_duplicates_tie_keeps_more_stars() {
        let priorities = vec!["docker.io".to_string()];
        let results = vec![
            hit("unlisted.example.com", "docker.io", "redis", 5),
            hit("other.example.com", "docker.io", "redis", 7),
            hit("docker.io", "docker.io", "nginx", 1),
        ];
        let deduped = remove_duplicates(results, &priorities);
        assert_eq!(names(&deduped), vec![("other.example.com", "redis", 7), ("docker.io", "nginx", 1)]);
    }

    #[test]
    fn test_remove_duplicates_never_grows() {
        let priorities = vec!["docker.io".to_string()];
        let results = vec![
            hit("docker.io", "docker.io", "a", 1),
            hit("docker.io", "docker.io", "b", 1),
            hit("docker.io", "quay.io", "a", 1),
        ];
        let deduped = remove_duplicates(results.clone(), &priorities);
        assert_eq!(deduped, results);
        assert!(remove_duplicates(Vec::new(), &priorities).is_empty());
    }

    #[test]
    fn test_label_results_prefers_embedded_registry() {
        let index = IndexInfo {
            name: "search.example.com".to_string(),
            mirrors: vec![],
            secure: true,
            official: false,
        };
        let results = SearchResults {
            num_results: 2,
            query: "redis".to_string(),
            results: vec![
                SearchResult {
                    name: "redis".to_string(),
                    star_count: 3,
                    ..Default::default()
                },
                SearchResult {
                    name: "quay.io/org/redis".to_string(),
                    star_count: 4,
                    ..Default::default()
                },
            ],
        };

        let labeled = label_results(&index, results);
        assert_eq!(labeled[0].registry_name, "search.example.com");
        assert_eq!(labeled[0].name, "redis");
        assert_eq!(labeled[1].index_name, "search.example.com");
        assert_eq!(labeled[1].registry_name, "quay.io");
        assert_eq!(labeled[1].name, "org/redis");
    }

    #[test]
    fn test_qualified_terms() {
        assert!(is_search_term_fully_qualified("quay.io/redis"));
        assert!(is_search_term_fully_qualified("localhost:5000/redis"));
        assert!(!is_search_term_fully_qualified("redis"));
        assert!(!is_search_term_fully_qualified("bitnami/redis"));
        assert!(validate_no_scheme("https://quay.io/redis").is_err());
    }
}
