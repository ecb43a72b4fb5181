//! Concurrent per-product processing.
//!
//! A batch fans its product ids out over a bounded number of workers; each
//! worker fetches, normalizes, and persists one product. The per-source rate
//! limiter inside the clients is what actually paces the upstream calls — the
//! worker count only bounds how much work is queued against it.

use std::time::Duration;

use futures::{stream, StreamExt};
use rand::Rng;

use vitrin_core::source::Source;
use vitrin_db::{persist_product, product_exists};

use super::ledger::FailureRecord;
use super::Pipeline;

/// Tally of one batch (or one whole pass).
#[derive(Debug, Default)]
pub(super) struct BatchOutcome {
    pub processed: i32,
    pub failures: Vec<FailureRecord>,
}

impl BatchOutcome {
    pub(super) fn merge(&mut self, other: BatchOutcome) {
        self.processed += other.processed;
        self.failures.extend(other.failures);
    }
}

/// Uniform random duration in `[min_ms, max_ms)`.
pub(super) fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    Duration::from_millis(rand::rng().random_range(min_ms..max_ms))
}

/// Processes one chunk of product ids with at most `workers` in flight.
pub(super) async fn process_batch(
    pipeline: &Pipeline,
    source: Source,
    category_id: i64,
    sub_category_id: i64,
    ids: &[i64],
    force_update: bool,
    max_attempts: u32,
    workers: usize,
) -> BatchOutcome {
    let results: Vec<Result<(), FailureRecord>> = stream::iter(ids.iter().copied())
        .map(|product_id| {
            process_product(
                pipeline,
                source,
                category_id,
                sub_category_id,
                product_id,
                force_update,
                max_attempts,
            )
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut outcome = BatchOutcome::default();
    for result in results {
        match result {
            Ok(()) => outcome.processed += 1,
            Err(record) => outcome.failures.push(record),
        }
    }
    outcome
}

/// Fetches and persists a single product.
///
/// Fetch errors are retried up to `max_attempts` times with a linearly growing
/// delay. An upstream answer with no usable payload fails immediately — the
/// product is gone or empty, and asking again straight away will not change
/// that; the failure ledger and later passes own that case. Persistence does
/// its own transaction-level retrying, so a persist error is final here.
async fn process_product(
    pipeline: &Pipeline,
    source: Source,
    category_id: i64,
    sub_category_id: i64,
    product_id: i64,
    force_update: bool,
    max_attempts: u32,
) -> Result<(), FailureRecord> {
    let fail = |error: String| FailureRecord {
        product_id,
        category_id,
        brand: source.brand_name().to_string(),
        error,
    };

    if !force_update {
        match product_exists(pipeline.pool(), product_id).await {
            Ok(true) => {
                tracing::debug!(product_id, "product already stored, skipping fetch");
                return Ok(());
            }
            Ok(false) => {}
            Err(err) => return Err(fail(err.to_string())),
        }
    }

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        // Small pre-request jitter so workers released together do not line up.
        tokio::time::sleep(jitter(200, 700)).await;

        match pipeline.fetch_product(source, product_id).await {
            Ok(Some(product)) => {
                let outcome = persist_product(
                    pipeline.pool(),
                    &product,
                    source.brand_name(),
                    sub_category_id,
                    force_update,
                )
                .await
                .map_err(|err| fail(err.to_string()))?;
                tracing::debug!(product_id, ?outcome, "product persisted");
                return Ok(());
            }
            Ok(None) => {
                return Err(fail("upstream returned no usable payload".to_string()));
            }
            Err(err) if attempt < max_attempts => {
                tracing::warn!(
                    product_id,
                    attempt,
                    error = %err,
                    "product fetch failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(u64::from(attempt) * 1000)).await;
            }
            Err(err) => return Err(fail(err.to_string())),
        }
    }
}
