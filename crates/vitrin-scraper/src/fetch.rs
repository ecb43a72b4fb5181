//! Bounded-retry HTTP GET with exponential back-off and jitter.
//!
//! [`fetch_with_retry`] retries on network errors and non-success statuses,
//! then hands the *final* response back so the caller can inspect the status
//! itself — a 404 after all attempts is data, not an exception. Only a network
//! failure on the last attempt surfaces as an error.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Response};

use crate::error::ScrapeError;

const BACKOFF_BASE_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 30_000;

/// Performs a GET with up to `max_retries` additional attempts.
///
/// Back-off before the n-th retry is `500ms × 2^(n-1) ± 25% jitter`, capped at
/// 30s. A 2xx response returns immediately and is never retried.
///
/// # Errors
///
/// Returns [`ScrapeError::Http`] only when the final attempt fails at the
/// network level; non-success statuses are returned as the response.
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    max_retries: u32,
) -> Result<Response, ScrapeError> {
    let mut attempt = 0u32;
    loop {
        match client.get(url).headers(headers.clone()).send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                if attempt >= max_retries {
                    return Ok(response);
                }
                tracing::warn!(
                    status = response.status().as_u16(),
                    url,
                    attempt,
                    "non-success status — retrying after back-off"
                );
            }
            Err(err) => {
                if attempt >= max_retries {
                    return Err(ScrapeError::Http(err));
                }
                tracing::warn!(
                    error = %err,
                    url,
                    attempt,
                    "network error — retrying after back-off"
                );
            }
        }
        attempt += 1;
        tokio::time::sleep(backoff_delay(attempt)).await;
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let computed = BACKOFF_BASE_MS.saturating_mul(1u64 << (attempt - 1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    Duration::from_millis(jittered)
}
