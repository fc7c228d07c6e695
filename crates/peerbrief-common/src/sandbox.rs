use reqwest::{Client, ClientBuilder, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use crate::error::PeerBriefError;

/// User agent sent with every request; the platforms ask crawlers to identify themselves.
pub const USER_AGENT: &str = "PeerBriefBot/1.0 (Research/Educational)";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Total attempts per fetch, including the first one.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay for retry backoff.
const RETRY_DELAY_MS: u64 = 1000;

/// HTTP 429 waits this many times longer than other transient failures.
const RATE_LIMIT_BACKOFF_MULTIPLIER: u32 = 3;

/// A fetched page. Non-success statuses are returned as data so callers can
/// branch on them (eLife falls back to `/articles/<id>` on 404).
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16()
    }

    /// Turn a non-success status into an error.
    pub fn error_for_status(self) -> Result<Self, PeerBriefError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PeerBriefError::Collection(format!(
                "HTTP {} for {}",
                self.status, self.url
            )))
        }
    }
}

/// A Sandbox-capped HTTP Client that only allows requests to approved domains.
/// Only the two review platforms (and loopback, for tests and local mirrors)
/// are reachable.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl SandboxClient {
    /// Creates a new SandboxClient with the default allowlist, a 30 s timeout
    /// and three attempts per fetch.
    pub fn new() -> Result<Self, PeerBriefError> {
        Self::with_settings(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_settings(timeout: Duration, max_attempts: u32) -> Result<Self, PeerBriefError> {
        let mut allowlist = HashSet::new();
        let domains = vec![
            "elifesciences.org", // eLife reviewed preprints + articles
            "f1000research.com", // F1000Research
            "localhost",
            "127.0.0.1",
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PeerBriefError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            allowlist,
            max_attempts: max_attempts.max(1),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Override the base retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Check exact match or if it's a subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Exposes the inner `reqwest::Client` builder pattern safely for GET requests.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, PeerBriefError> {
        if !self.is_allowed(url) {
            return Err(PeerBriefError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.get(url))
    }

    /// GET a page, retrying transient failures with linear backoff.
    ///
    /// Connect errors, timeouts, HTTP 429 and 5xx are retried up to the
    /// configured attempt count. Other statuses (including 404) come back as
    /// a `FetchedPage` immediately.
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage, PeerBriefError> {
        let mut last_reason = String::new();

        for attempt in 0..self.max_attempts {
            let mut backoff_multiplier = 1;

            match self.get(url)?.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        if status == StatusCode::TOO_MANY_REQUESTS {
                            backoff_multiplier = RATE_LIMIT_BACKOFF_MULTIPLIER;
                        }
                        last_reason = format!("HTTP {}", status.as_u16());
                    } else {
                        let body = resp.text().await?;
                        debug!(url, status = status.as_u16(), bytes = body.len(), "Page fetched");
                        return Ok(FetchedPage {
                            url: url.to_string(),
                            status: status.as_u16(),
                            body,
                        });
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_reason = e.to_string();
                }
                Err(e) => return Err(PeerBriefError::Http(e)),
            }

            if attempt + 1 < self.max_attempts {
                let delay = self.retry_delay * backoff_multiplier * (attempt + 1);
                warn!(
                    "Fetch failed for {} (attempt {}/{}): {}, retrying in {:?}",
                    url,
                    attempt + 1,
                    self.max_attempts,
                    last_reason,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(PeerBriefError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response per incoming connection, in order.
    async fn serve_sequence(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    429 => "Too Many Requests",
                    _ => "Service Unavailable",
                };
                let resp = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                socket.write_all(resp.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        format!("http://127.0.0.1:{}/page", port)
    }

    fn fast_client(max_attempts: u32) -> SandboxClient {
        SandboxClient::with_settings(Duration::from_secs(5), max_attempts)
            .unwrap()
            .with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_allowlist_accepts_platforms_and_subdomains() {
        let c = SandboxClient::new().unwrap();
        assert!(c.is_allowed("https://elifesciences.org/reviewed-preprints/97433"));
        assert!(c.is_allowed("https://api.elifesciences.org/articles"));
        assert!(c.is_allowed("https://f1000research.com/articles/1-1655"));
    }

    #[test]
    fn test_allowlist_rejects_other_domains() {
        let c = SandboxClient::new().unwrap();
        assert!(!c.is_allowed("https://example.com/"));
        assert!(!c.is_allowed("https://notelifesciences.org/"));
        assert!(!c.is_allowed("not a url"));
    }

    #[tokio::test]
    async fn test_fetch_disallowed_domain_is_security_error() {
        let c = fast_client(3);
        let err = c.fetch_page("https://example.com/").await.unwrap_err();
        assert!(matches!(err, PeerBriefError::Security(_)));
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors() {
        let url = serve_sequence(vec![(503, "busy"), (200, "<html>ok</html>")]).await;
        let page = fast_client(3).fetch_page(&url).await.unwrap();
        assert!(page.is_success());
        assert_eq!(page.body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_returns_not_found_without_retry() {
        let url = serve_sequence(vec![(404, "missing")]).await;
        let page = fast_client(3).fetch_page(&url).await.unwrap();
        assert!(page.is_not_found());
        assert!(page.error_for_status().is_err());
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_attempts() {
        let url = serve_sequence(vec![(503, "a"), (503, "b")]).await;
        let err = fast_client(2).fetch_page(&url).await.unwrap_err();
        match err {
            PeerBriefError::RetriesExhausted { attempts, reason, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(reason, "HTTP 503");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
