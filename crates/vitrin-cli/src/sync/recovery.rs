//! End-of-run recovery pass.
//!
//! After the main and consolidated-retry passes, each leaf category's stored
//! product count is compared to its imported expectation. Categories that come
//! up short get one fresh listing (bypassing the cache, which may hold the
//! very listing that was short) and the ids not yet in the database are
//! reprocessed.

use std::collections::HashSet;

use vitrin_core::source::Source;
use vitrin_core::AppConfig;
use vitrin_db::{list_leaf_categories, list_stored_product_ids, stored_product_count};

use super::batch::{self, BatchOutcome};
use super::Pipeline;

pub(super) async fn run_recovery(
    pipeline: &Pipeline,
    source: Source,
    force_update: bool,
    config: &AppConfig,
) -> anyhow::Result<BatchOutcome> {
    let brand = source.brand_name();
    let categories = list_leaf_categories(pipeline.pool(), brand).await?;

    let mut outcome = BatchOutcome::default();
    for category in &categories {
        let Some(expected) = category.product_count.filter(|&c| c > 0) else {
            continue;
        };
        let stored = stored_product_count(pipeline.pool(), category.id).await?;
        if stored >= i64::from(expected) {
            continue;
        }

        pipeline.drop_listing(source, category.category_id).await;
        let listed = match pipeline.fetch_product_ids(source, category.category_id, 2).await {
            Ok(ids) => ids,
            Err(err) => {
                tracing::warn!(
                    brand,
                    category_id = category.category_id,
                    error = %err,
                    "recovery listing failed, skipping category"
                );
                continue;
            }
        };

        let stored_ids: HashSet<i64> = list_stored_product_ids(pipeline.pool(), category.id)
            .await?
            .into_iter()
            .collect();
        let missing: Vec<i64> = listed
            .into_iter()
            .filter(|id| !stored_ids.contains(id))
            .collect();
        if missing.is_empty() {
            continue;
        }

        tracing::info!(
            brand,
            category_id = category.category_id,
            expected,
            stored,
            missing = missing.len(),
            "recovering missing products"
        );
        for chunk in missing.chunks(config.batch_size.max(1)) {
            let part = batch::process_batch(
                pipeline,
                source,
                category.category_id,
                category.id,
                chunk,
                force_update,
                2,
                config.batch_workers,
            )
            .await;
            outcome.merge(part);
        }
    }

    if outcome.processed > 0 || !outcome.failures.is_empty() {
        tracing::info!(
            brand,
            recovered = outcome.processed,
            still_failing = outcome.failures.len(),
            "recovery pass finished"
        );
    }
    Ok(outcome)
}
