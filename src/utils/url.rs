//! URL utility functions

use url::Url;

/// Parse URL and extract components
pub fn parse_url(url_str: &str) -> Result<Url, url::ParseError> {
    Url::parse(url_str)
}

/// Check if URL is HTTPS
pub fn is_https(url: &Url) -> bool {
    url.scheme() == "https"
}

/// Host and path only, for log lines
pub fn display_target(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or("?"), url.path())
}
