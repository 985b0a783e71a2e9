/// arXiv Atom API からのページ取得クライアント。
///
/// タイムアウトと指数バックオフ付きの再試行をサポートします。
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::util::retry::{RetryConfig, is_retryable_error, is_retryable_status};

/// arXiv クライアントの設定。
#[derive(Debug, Clone)]
pub struct ArxivClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
    pub max_attempts: usize,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl ArxivClientConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.arxiv_base_url().to_string(),
            connect_timeout: config.arxiv_connect_timeout(),
            total_timeout: config.arxiv_total_timeout(),
            max_attempts: config.http_max_retries(),
            backoff_base_ms: config.http_backoff_base_ms(),
            backoff_cap_ms: config.http_backoff_cap_ms(),
        }
    }
}

/// 1回の取得で失敗した理由。再試行判定に使う。
enum Attempt {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct ArxivClient {
    client: Client,
    base_url: Url,
    retry: RetryConfig,
}

impl ArxivClient {
    /// 新しいクライアントを作成する。
    ///
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: ArxivClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build arXiv HTTP client")?;

        let base_url = Url::parse(&config.base_url).context("invalid arXiv API base URL")?;

        Ok(Self {
            client,
            base_url,
            retry: RetryConfig::new(
                config.max_attempts,
                config.backoff_base_ms,
                config.backoff_cap_ms,
            ),
        })
    }

    /// 1ページ分の Atom XML を取得し、本文をそのまま返す。
    ///
    /// `on_retry` は再試行のたびに呼ばれる。
    ///
    /// # Errors
    /// 再試行不能なエラー、または再試行回数を使い切った場合はエラーを返します。
    pub async fn fetch_page(
        &self,
        query: &str,
        start: usize,
        max_results: usize,
        mut on_retry: impl FnMut(),
    ) -> Result<String> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("search_query", query)
            .append_pair("start", &start.to_string())
            .append_pair("max_results", &max_results.to_string());

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(start, max_results, attempt, "fetching feed page");
            match self.try_fetch(url.clone()).await {
                Ok(body) => return Ok(body),
                Err(Attempt::Fatal(error)) => return Err(error),
                Err(Attempt::Retryable(error)) => {
                    if !self.retry.can_retry(attempt) {
                        return Err(error.context(format!(
                            "giving up after {attempt} attempts"
                        )));
                    }
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        start,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "retrying feed page"
                    );
                    on_retry();
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_fetch(&self, url: Url) -> Result<String, Attempt> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(error) => {
                let retryable = is_retryable_error(&error);
                let error = anyhow::Error::new(error).context("arXiv request failed");
                return Err(if retryable {
                    Attempt::Retryable(error)
                } else {
                    Attempt::Fatal(error)
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = anyhow::Error::new(PipelineError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
            return Err(if is_retryable_status(status) {
                Attempt::Retryable(error)
            } else {
                Attempt::Fatal(error)
            });
        }

        response.text().await.map_err(|error| {
            Attempt::Retryable(
                anyhow::Error::new(error).context("failed to read arXiv response body"),
            )
        })
    }
}
