//! Getting a bundle onto local disk before it is opened: either it already is
//! a local path, or it is downloaded over http(s).

use anyhow::Context;
use futures::StreamExt;
use indicatif::ProgressBar;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, USER_AGENT};
use reqwest::StatusCode;
use sanitize_filename::sanitize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_FILE_NAME: &str = "bundle.pbw";

#[derive(Debug, Clone)]
pub struct FetchContext {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for FetchContext {
    fn default() -> Self {
        Self {
            user_agent: concat!("pbw-installer/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 60,
            retries: 2,
            retry_backoff_ms: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    Local(PathBuf),
    Remote(Url),
}

impl BundleSource {
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => BundleSource::Remote(u),
            _ => BundleSource::Local(PathBuf::from(raw)),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("http status error: {0}")]
    Status(StatusCode),
}

/// Local file name for a downloaded bundle, from the URL's last segment.
pub fn bundle_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut s| s.next_back())
        .map(sanitize)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        r => r,
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Delay before retry `attempt` (0-based): doubles each time, capped at 30s.
pub fn backoff_delay(ctx: &FetchContext, attempt: u32) -> Duration {
    let base = ctx.retry_backoff_ms.max(1);
    let shift = attempt.min(16);
    let ms = base.saturating_mul(1u64 << shift).min(30_000);
    Duration::from_millis(ms)
}

pub struct BundleFetcher {
    client: reqwest::Client,
}

impl BundleFetcher {
    pub fn new(ctx: &FetchContext) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&ctx.user_agent)?);
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers(headers)
            .timeout(Duration::from_secs(ctx.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }

    /// Local paths pass through untouched; URLs are downloaded into `out_dir`.
    pub async fn resolve(
        &self,
        source: &BundleSource,
        out_dir: &Path,
        ctx: &FetchContext,
        progress: &ProgressBar,
    ) -> anyhow::Result<PathBuf> {
        match source {
            BundleSource::Local(p) => Ok(p.clone()),
            BundleSource::Remote(url) => self.download(url, out_dir, ctx, progress).await,
        }
    }

    pub async fn download(
        &self,
        url: &Url,
        out_dir: &Path,
        ctx: &FetchContext,
        progress: &ProgressBar,
    ) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(out_dir)
            .await
            .with_context(|| format!("create out_dir {}", out_dir.display()))?;
        let target = out_dir.join(bundle_file_name(url));
        let partial = target.with_extension("partial");

        match self.fetch_to(url, &partial, ctx, progress).await {
            Ok(n) => {
                debug!(%url, bytes = n, path = %target.display(), "bundle downloaded");
                remove_if_exists(&target)
                    .await
                    .with_context(|| format!("replace {}", target.display()))?;
                tokio::fs::rename(&partial, &target).await?;
                progress.finish();
                Ok(target)
            }
            Err(e) => {
                if let Err(rm) = remove_if_exists(&partial).await {
                    warn!(path = %partial.display(), error = %rm, "could not remove partial download");
                }
                progress.abandon();
                Err(e)
            }
        }
    }

    /// Retry loop streaming the body into `partial`; returns bytes written.
    async fn fetch_to(
        &self,
        url: &Url,
        partial: &Path,
        ctx: &FetchContext,
        progress: &ProgressBar,
    ) -> anyhow::Result<u64> {
        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 0..=ctx.retries {
            if attempt > 0 {
                let delay = backoff_delay(ctx, attempt - 1);
                warn!(%url, attempt, ?delay, "retrying bundle download");
                sleep(delay).await;
            }

            let resp = match self.client.get(url.clone()).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            };

            let status = resp.status();
            if !status.is_success() {
                if should_retry_status(status) {
                    last_err = Some(FetchError::Status(status).into());
                    continue;
                }
                return Err(FetchError::Status(status).into());
            }

            let total = resp
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            if let Some(t) = total {
                progress.set_length(t);
            }
            progress.set_position(0);

            match Self::write_body(resp, partial, progress).await {
                Ok(n) => return Ok(n),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| FetchError::Status(StatusCode::REQUEST_TIMEOUT).into()))
    }

    async fn write_body(resp: reqwest::Response, path: &Path, progress: &ProgressBar) -> anyhow::Result<u64> {
        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("create {}", path.display()))?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("read response body")?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await?;
        Ok(written)
    }
}
