//! Shared blocking HTTP client and the bounded retry wrapper.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Proxy;
use reqwest::blocking::Client;
use tracing::{info, warn};

/// Build the blocking client used for every outbound call.
///
/// Environment proxy variables are ignored; only `proxy` (as `host:port`) is
/// used when given.
pub fn build_client(timeout: Duration, proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder().timeout(timeout).no_proxy();
    if let Some(proxy) = proxy {
        let proxy =
            Proxy::all(format!("http://{proxy}")).with_context(|| format!("proxy {proxy}"))?;
        builder = builder.proxy(proxy);
    }
    builder.build().context("build http client")
}

/// Fixed-interval retry for transient transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRetry {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub wait: Duration,
}

/// Run `call` until it succeeds or `retry.attempts` are used up.
///
/// Each failed attempt except the last is logged and followed by a fixed
/// wait. The last error is returned with context.
pub fn with_retry<T, E, F>(retry: &HttpRetry, what: &str, mut call: F) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
    F: FnMut() -> std::result::Result<T, E>,
{
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                info!(what, attempt, error = %err, "network error, retrying");
                thread::sleep(retry.wait);
                attempt += 1;
            }
            Err(err) => {
                warn!(what, attempts, error = %err, "network retries exhausted");
                return Err(anyhow::Error::new(err))
                    .with_context(|| format!("{what} failed after {attempts} attempts"));
            }
        }
    }
}
