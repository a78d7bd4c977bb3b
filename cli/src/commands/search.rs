use std::collections::HashMap;
use std::path::PathBuf;
use wharf_registry::RegistryService;

use crate::utils::{SearchFilter, load_auth_configs, ok_mark, truncate};

pub struct SearchOptions {
    pub limit: usize,
    pub filters: Vec<String>,
    pub no_index: bool,
    pub no_trunc: bool,
    pub json: bool,
    pub auth_file: Option<PathBuf>,
}

pub async fn search(
    service: &RegistryService,
    term: &str,
    options: SearchOptions,
    user_agent: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = SearchFilter::parse(&options.filters)?;
    let auth_configs = match &options.auth_file {
        Some(path) => load_auth_configs(path)?,
        None => HashMap::new(),
    };

    let results = service
        .search(term, &auth_configs, user_agent, options.no_index)
        .await
        .map_err(|e| format!("Failed to search images: {}", e))?;

    let results: Vec<_> = results
        .into_iter()
        .filter(|r| filter.matches(r))
        .take(options.limit)
        .collect();

    if options.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found for: {}", term);
        return Ok(());
    }

    if options.no_index {
        println!(
            "{:<40} {:<60} {:<10} {:<10} {:<10}",
            "NAME", "DESCRIPTION", "STARS", "OFFICIAL", "AUTOMATED"
        );
    } else {
        println!(
            "{:<20} {:<40} {:<60} {:<10} {:<10} {:<10}",
            "INDEX", "NAME", "DESCRIPTION", "STARS", "OFFICIAL", "AUTOMATED"
        );
    }

    for result in results {
        let description = if options.no_trunc {
            result.description.clone()
        } else {
            truncate(&result.description, 60)
        };
        let name = format!("{}/{}", result.registry_name, result.name);

        if options.no_index {
            println!(
                "{:<40} {:<60} {:<10} {:<10} {:<10}",
                name,
                description,
                result.star_count,
                ok_mark(result.is_official),
                ok_mark(result.is_automated)
            );
        } else {
            println!(
                "{:<20} {:<40} {:<60} {:<10} {:<10} {:<10}",
                result.index_name,
                name,
                description,
                result.star_count,
                ok_mark(result.is_official),
                ok_mark(result.is_automated)
            );
        }
    }

    Ok(())
}
