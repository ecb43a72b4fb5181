//! Per-category processing: listing discovery, count sanity checks, and the
//! batch loop.

use vitrin_core::source::Source;
use vitrin_core::AppConfig;
use vitrin_db::SubCategoryRow;

use super::batch::{self, BatchOutcome};
use super::Pipeline;

/// Verdict on a listing whose size drifts from the imported category count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CountCheck {
    /// Close enough, proceed.
    Ok,
    /// Noticeable drift; log it and proceed.
    Warn,
    /// Drift large enough that the listing itself is suspect; try once more.
    Refetch,
}

/// Compares the listing size against the category's expected product count.
///
/// Drift beyond 20% of the expected count is worth a warning; beyond 50% the
/// listing is more likely truncated than the catalog shrunk, so one extra
/// discovery attempt is warranted. Categories without an expected count are
/// always `Ok`.
pub(super) fn check_count(expected: Option<i32>, found: usize) -> CountCheck {
    let Some(expected) = expected.filter(|&e| e > 0) else {
        return CountCheck::Ok;
    };
    let expected = i64::from(expected);
    let found = i64::try_from(found).unwrap_or(i64::MAX);
    let drift = (expected - found).abs();

    if drift.saturating_mul(2) > expected {
        CountCheck::Refetch
    } else if drift.saturating_mul(5) > expected {
        CountCheck::Warn
    } else {
        CountCheck::Ok
    }
}

/// Runs one category end to end: discover its product ids, sanity-check the
/// listing size, and process the ids in jitter-spaced batches.
pub(super) async fn process_category(
    pipeline: &Pipeline,
    category: &SubCategoryRow,
    source: Source,
    force_update: bool,
    config: &AppConfig,
) -> anyhow::Result<BatchOutcome> {
    let brand = source.brand_name();
    let mut ids = pipeline.listing(source, category.category_id, 3).await?;

    match check_count(category.product_count, ids.len()) {
        CountCheck::Ok => {}
        CountCheck::Warn => {
            tracing::warn!(
                brand,
                category_id = category.category_id,
                expected = category.product_count,
                found = ids.len(),
                "listing size drifts from imported count"
            );
        }
        CountCheck::Refetch => {
            tracing::warn!(
                brand,
                category_id = category.category_id,
                expected = category.product_count,
                found = ids.len(),
                "listing size far from imported count, refetching"
            );
            match pipeline.fetch_product_ids(source, category.category_id, 2).await {
                // Only a strictly larger listing replaces the first one; a
                // second short answer adds nothing.
                Ok(fresh) if fresh.len() > ids.len() => {
                    pipeline
                        .cache_listing(source, category.category_id, fresh.clone())
                        .await;
                    ids = fresh;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        brand,
                        category_id = category.category_id,
                        error = %err,
                        "refetch failed, keeping first listing"
                    );
                }
            }
        }
    }

    if ids.is_empty() {
        tracing::info!(
            brand,
            category_id = category.category_id,
            "category listing is empty, nothing to process"
        );
        return Ok(BatchOutcome::default());
    }

    tracing::info!(
        brand,
        category_id = category.category_id,
        category_name = %category.category_name,
        products = ids.len(),
        "processing category"
    );

    let mut outcome = BatchOutcome::default();
    for (index, chunk) in ids.chunks(config.batch_size.max(1)).enumerate() {
        if index > 0 {
            tokio::time::sleep(batch::jitter(1000, 2000)).await;
        }
        let part = batch::process_batch(
            pipeline,
            source,
            category.category_id,
            category.id,
            chunk,
            force_update,
            3,
            config.batch_workers,
        )
        .await;
        outcome.merge(part);
    }

    tracing::info!(
        brand,
        category_id = category.category_id,
        processed = outcome.processed,
        failed = outcome.failures.len(),
        "category finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_counts_are_ok() {
        assert_eq!(check_count(Some(130), 130), CountCheck::Ok);
        assert_eq!(check_count(Some(130), 120), CountCheck::Ok);
    }

    #[test]
    fn moderate_drift_warns() {
        // 23% short of the expected 100.
        assert_eq!(check_count(Some(100), 77), CountCheck::Warn);
        // Overshoot counts the same as undershoot.
        assert_eq!(check_count(Some(100), 130), CountCheck::Warn);
    }

    #[test]
    fn large_drift_triggers_refetch() {
        // 69% short of the expected 130.
        assert_eq!(check_count(Some(130), 40), CountCheck::Refetch);
        assert_eq!(check_count(Some(100), 0), CountCheck::Refetch);
    }

    #[test]
    fn boundaries_are_exclusive() {
        // Exactly 20% and exactly 50% do not escalate.
        assert_eq!(check_count(Some(100), 80), CountCheck::Ok);
        assert_eq!(check_count(Some(100), 50), CountCheck::Warn);
    }

    #[test]
    fn unknown_expected_count_is_ok() {
        assert_eq!(check_count(None, 500), CountCheck::Ok);
        assert_eq!(check_count(Some(0), 500), CountCheck::Ok);
    }
}
