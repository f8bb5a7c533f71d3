use crate::config::FetchSettings;
use crate::error::IngestError;
use crate::models::{RawContent, Source};
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

/// Retrieves raw bytes and a content-type label for a source URL, with a
/// bounded per-request timeout and bounded retries.
pub struct SourceFetcher {
    client: Client,
    max_retries: u32,
    backoff: Duration,
}

enum Attempt {
    /// Transport errors and 5xx responses, worth another try.
    Retryable(String),
    /// 4xx responses will not heal within a run.
    Fatal(IngestError),
}

impl SourceFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: settings.max_retries,
            backoff: Duration::from_secs(settings.backoff_secs),
        })
    }

    pub async fn fetch(&self, source: &Source) -> Result<RawContent, IngestError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_fetch(source).await {
                Ok(raw) => return Ok(raw),
                Err(Attempt::Fatal(error)) => return Err(error),
                Err(Attempt::Retryable(detail)) => {
                    if attempt > self.max_retries {
                        return Err(IngestError::Transport {
                            url: source.url.to_string(),
                            detail,
                        });
                    }
                    warn!(url = %source.url, attempt, %detail, "fetch failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
            }
        }
    }

    async fn try_fetch(&self, source: &Source) -> Result<RawContent, Attempt> {
        let response = self
            .client
            .get(source.url.clone())
            .send()
            .await
            .map_err(|error| Attempt::Retryable(error.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Attempt::Retryable(format!("server returned {status}")));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(IngestError::Transport {
                url: source.url.to_string(),
                detail: format!("server returned {status}"),
            }));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| source.declared.map(|kind| kind.label().to_string()))
            .unwrap_or_default();

        let bytes = response
            .bytes()
            .await
            .map_err(|error| Attempt::Retryable(error.to_string()))?;

        Ok(RawContent {
            url: source.url.clone(),
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use httpmock::prelude::*;
    use url::Url;

    fn settings() -> FetchSettings {
        FetchSettings {
            timeout_secs: 5,
            max_retries: 1,
            backoff_secs: 0,
        }
    }

    fn source(url: &str) -> Source {
        Source {
            url: Url::parse(url).expect("test url"),
            declared: None,
        }
    }

    #[tokio::test]
    async fn fetch_returns_bytes_and_content_type() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/guide");
                then.status(200)
                    .header("content-type", "text/html; charset=utf-8")
                    .body("<html><body>hello</body></html>");
            })
            .await;

        let fetcher = SourceFetcher::new(&settings()).expect("client");
        let raw = fetcher
            .fetch(&source(&server.url("/guide")))
            .await
            .expect("fetch should succeed");

        assert_eq!(raw.content_type, "text/html; charset=utf-8");
        assert!(raw.bytes.starts_with(b"<html>"));
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let fetcher = SourceFetcher::new(&settings()).expect("client");
        let result = fetcher.fetch(&source(&server.url("/missing"))).await;

        match result {
            Err(IngestError::Transport { url, detail }) => {
                assert!(url.ends_with("/missing"));
                assert!(detail.contains("404"), "detail was {detail:?}");
            }
            other => panic!("expected Transport error, got {other:?}"),
        }
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_reported() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/flaky");
                then.status(503);
            })
            .await;

        let fetcher = SourceFetcher::new(&settings()).expect("client");
        let result = fetcher.fetch(&source(&server.url("/flaky"))).await;

        assert!(matches!(result, Err(IngestError::Transport { .. })));
        // one initial attempt plus max_retries
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn missing_header_falls_back_to_the_declared_type() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/bare");
                then.status(200).body("plain");
            })
            .await;

        let fetcher = SourceFetcher::new(&settings()).expect("client");
        let mut with_declared = source(&server.url("/bare"));
        with_declared.declared = Some(crate::models::ContentKind::Html);

        let raw = fetcher
            .fetch(&with_declared)
            .await
            .expect("fetch should succeed");
        assert_eq!(raw.content_type, "text/html");
    }
}
