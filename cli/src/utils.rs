use std::collections::HashMap;
use std::path::Path;
use wharf_registry::SearchResultExt;
use wharf_remote::AuthConfig;

pub fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub fn ok_mark(value: bool) -> &'static str {
    if value { "[OK]" } else { "" }
}

/// Shortens `text` to at most `max` characters, ending in `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Reads a JSON object mapping registry servers to credentials.
pub fn load_auth_configs(path: &Path) -> Result<HashMap<String, AuthConfig>, Box<dyn std::error::Error>> {
    let data = std::fs::read(path)
        .map_err(|e| format!("Failed to read auth file {}: {}", path.display(), e))?;
    Ok(serde_json::from_slice(&data)?)
}

#[derive(Debug, Default, PartialEq)]
pub struct SearchFilter {
    min_stars: u64,
    official: Option<bool>,
    automated: Option<bool>,
}

impl SearchFilter {
    pub fn parse(filters: &[String]) -> Result<Self, String> {
        let mut filter = SearchFilter::default();
        for entry in filters {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| format!("Bad format of filter (expected name=value): {}", entry))?;
            match key {
                "stars" => {
                    filter.min_stars = value
                        .parse()
                        .map_err(|_| format!("Invalid filter 'stars={}'", value))?;
                }
                "is-official" => filter.official = Some(parse_bool(key, value)?),
                "is-automated" => filter.automated = Some(parse_bool(key, value)?),
                _ => return Err(format!("Invalid filter '{}'", key)),
            }
        }
        Ok(filter)
    }

    pub fn matches(&self, result: &SearchResultExt) -> bool {
        result.star_count >= self.min_stars
            && self.official.is_none_or(|o| o == result.is_official)
            && self.automated.is_none_or(|a| a == result.is_automated)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid filter '{}={}'", key, value))
}
