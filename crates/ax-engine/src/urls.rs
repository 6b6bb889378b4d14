//! URL keys and domain extraction.

use url::Url;

/// Canonical memory key for a URL: trimmed and lowercased.
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase()
}

/// Host (plus explicit port) of a URL.
///
/// Accepts bare domains and malformed input; never fails.
pub fn domain_of(url: &str) -> String {
    let normalized = normalize_url(url);

    if let Ok(parsed) = Url::parse(&normalized) {
        if let Some(host) = parsed.host_str() {
            return match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
        }
    }

    let without_scheme = normalized
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&normalized);

    without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_string()
}
