//! Shared HTTP client for the bundled plugins
//!
//! One `ureq` agent is created lazily and reused, so plugins running on
//! different batch workers share its connection pool.
//!
//! ```rust,ignore
//! use koreografeye::http_client::{get_sync_client, post_with};
//!
//! let status = post_with(get_sync_client(), &[], "https://ntfy.sh/alerts", "text/plain", "hello")?;
//! ```

use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Configuration
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Maximum number of redirects to follow, 0 disables them
    pub max_redirects: u32,
    /// Hosts requests may go to; empty allows every host
    pub allowed_domains: Vec<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: format!("koreografeye/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 5,
            allowed_domains: Vec::new(),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

static SYNC_CLIENT: OnceLock<ureq::Agent> = OnceLock::new();

/// The shared agent, built with default settings on first use
pub fn get_sync_client() -> &'static ureq::Agent {
    SYNC_CLIENT.get_or_init(|| create_sync_client(&HttpClientConfig::default()))
}

/// Build a standalone agent with custom settings
pub fn create_sync_client(config: &HttpClientConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(&config.user_agent)
        .redirects(config.max_redirects)
        .build()
}

// ============================================================================
// Domain Validation
// ============================================================================

/// Check a URL against an allow-list; subdomains of a listed domain pass
pub fn is_domain_allowed(url: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }

    let host = extract_host(url);
    if host.is_empty() {
        return false;
    }

    allowed_domains.iter().any(|domain| {
        let domain = domain.to_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    })
}

/// Lowercased host of a URL, without userinfo or port
pub fn extract_host(url: &str) -> String {
    let url = url.trim();
    let without_scheme = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };

    let authority_end = without_scheme
        .find(|c: char| c == '/' || c == '?' || c == '#')
        .unwrap_or(without_scheme.len());
    let authority = &without_scheme[..authority_end];
    let host_port = match authority.rfind('@') {
        Some(pos) => &authority[pos + 1..],
        None => authority,
    };

    if let Some(pos) = host_port.rfind(':') {
        let port = &host_port[pos + 1..];
        if port.chars().all(|c| c.is_ascii_digit()) {
            return host_port[..pos].to_lowercase();
        }
    }
    host_port.to_lowercase()
}

// ============================================================================
// Requests
// ============================================================================

/// POST `body` through `agent` after checking `allowed_domains`
///
/// Returns the status code of a 2xx response. Any other status is a
/// [`HttpError::BadStatus`].
pub fn post_with(
    agent: &ureq::Agent,
    allowed_domains: &[String],
    url: &str,
    content_type: &str,
    body: &str,
) -> Result<u16, HttpError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(HttpError::UnsupportedScheme(url.to_string()));
    }
    if !is_domain_allowed(url, allowed_domains) {
        return Err(HttpError::DomainNotAllowed(extract_host(url)));
    }

    tracing::debug!(url, content_type, bytes = body.len(), "POST");
    match agent.post(url).set("Content-Type", content_type).send_string(body) {
        Ok(response) => {
            let status = response.status();
            if (200..300).contains(&status) {
                Ok(status)
            } else {
                Err(HttpError::BadStatus(status))
            }
        }
        Err(ureq::Error::Status(status, _)) => Err(HttpError::BadStatus(status)),
        Err(e) => Err(HttpError::RequestFailed(e.to_string())),
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP status {0}")]
    BadStatus(u16),

    #[error("domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("not an http(s) URL: {0}")]
    UnsupportedScheme(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_host() {
        assert_eq!(extract_host("https://example.org/path"), "example.org");
        assert_eq!(extract_host("http://api.example.org:8080/path"), "api.example.org");
        assert_eq!(extract_host("https://Example.ORG?q=1"), "example.org");
        assert_eq!(extract_host("http://user@localhost:3000/inbox/"), "localhost");
    }

    #[test]
    fn test_domain_allowed() {
        let allowed = vec!["example.org".to_string()];
        assert!(is_domain_allowed("https://any.host", &[]));
        assert!(is_domain_allowed("https://example.org/inbox", &allowed));
        assert!(is_domain_allowed("https://api.example.org/inbox", &allowed));
        assert!(!is_domain_allowed("https://notexample.org/inbox", &allowed));
    }

    #[test]
    fn test_rejects_before_sending() {
        let agent = create_sync_client(&HttpClientConfig::default());
        let allowed = vec!["example.org".to_string()];

        let err = post_with(&agent, &allowed, "https://evil.test/x", "text/plain", "").unwrap_err();
        assert_eq!(err, HttpError::DomainNotAllowed("evil.test".into()));

        let err = post_with(&agent, &[], "mailto:alice@example.org", "text/plain", "").unwrap_err();
        assert!(matches!(err, HttpError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_shared_client() {
        assert!(std::ptr::eq(get_sync_client(), get_sync_client()));
    }
}
