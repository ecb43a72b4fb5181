//! The ingestion pipeline: full runs, single-category runs, and ledger
//! retries.
//!
//! A full run works in passes. The main pass walks every leaf category of
//! both brands (brands concurrently, categories within a brand sequentially,
//! largest first). Products that fail it go into a consolidated retry pass in
//! small batches, then a recovery pass re-checks every category's stored
//! count against its imported expectation and refills the gaps. Whatever is
//! still failing at the end lands in the JSON failure ledger for a later
//! `retry` invocation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use vitrin_core::{AppConfig, NormalizedProduct, Source};
use vitrin_db::{
    complete_sync_run, create_sync_run, fail_sync_run, get_sub_category, list_leaf_categories,
    DbError,
};
use vitrin_scraper::{LimiterStats, PullBearClient, ScrapeError, TtlCache, ZaraClient};

mod batch;
mod category;
mod ledger;
mod recovery;

use batch::BatchOutcome;
use ledger::FailureRecord;

/// Batch size for the consolidated retry pass; deliberately smaller than the
/// main pass so already-struggling products put less pressure upstream.
const CONSOLIDATED_RETRY_BATCH: usize = 5;

/// Shared handles for one run: the pool, one client per source, and the
/// listing cache. Product caches live inside the clients and are shared
/// between them.
pub(crate) struct Pipeline {
    pool: PgPool,
    zara: ZaraClient,
    pullbear: PullBearClient,
    listing_cache: TtlCache<Vec<i64>>,
    cache_ttl: Duration,
}

impl Pipeline {
    fn new(pool: PgPool, config: &AppConfig) -> Result<Self, ScrapeError> {
        let product_cache: Arc<TtlCache<NormalizedProduct>> = Arc::new(TtlCache::new());
        let cache_ttl = Duration::from_secs(config.cache_ttl_secs);
        let http_timeout = Duration::from_secs(config.http_timeout_secs);

        let zara = ZaraClient::new(
            config.zara_base_url.clone(),
            http_timeout,
            config.fetch_retries,
            Arc::clone(&product_cache),
            cache_ttl,
        )?;
        let pullbear = PullBearClient::new(
            config.pullbear_base_url.clone(),
            http_timeout,
            config.fetch_retries,
            product_cache,
            cache_ttl,
        )?;

        Ok(Self {
            pool,
            zara,
            pullbear,
            listing_cache: TtlCache::new(),
            cache_ttl,
        })
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_product(
        &self,
        source: Source,
        product_id: i64,
    ) -> Result<Option<NormalizedProduct>, ScrapeError> {
        match source {
            Source::Zara => self.zara.fetch_product(product_id).await,
            Source::PullBear => self.pullbear.fetch_product(product_id).await,
        }
    }

    async fn fetch_product_ids(
        &self,
        source: Source,
        category_id: i64,
        max_attempts: u32,
    ) -> Result<Vec<i64>, ScrapeError> {
        match source {
            Source::Zara => self.zara.fetch_product_ids(category_id, max_attempts).await,
            Source::PullBear => {
                self.pullbear
                    .fetch_product_ids(category_id, max_attempts)
                    .await
            }
        }
    }

    /// Cache-fronted listing discovery.
    async fn listing(
        &self,
        source: Source,
        category_id: i64,
        max_attempts: u32,
    ) -> Result<Vec<i64>, ScrapeError> {
        let key = source.listing_cache_key(category_id);
        if let Some(ids) = self.listing_cache.get(&key).await {
            tracing::debug!(category_id, "listing served from cache");
            return Ok(ids);
        }
        let ids = self.fetch_product_ids(source, category_id, max_attempts).await?;
        self.listing_cache.set(key, ids.clone(), self.cache_ttl).await;
        Ok(ids)
    }

    async fn cache_listing(&self, source: Source, category_id: i64, ids: Vec<i64>) {
        self.listing_cache
            .set(source.listing_cache_key(category_id), ids, self.cache_ttl)
            .await;
    }

    async fn drop_listing(&self, source: Source, category_id: i64) {
        self.listing_cache
            .delete(&source.listing_cache_key(category_id))
            .await;
    }

    async fn limiter_stats(&self, source: Source) -> LimiterStats {
        match source {
            Source::Zara => self.zara.limiter().stats().await,
            Source::PullBear => self.pullbear.limiter().stats().await,
        }
    }

    async fn log_limiter_stats(&self) {
        for source in Source::ALL {
            let stats = self.limiter_stats(source).await;
            tracing::info!(
                brand = source.brand_name(),
                successes = stats.successes,
                failures = stats.failures,
                current_delay_ms = u64::try_from(stats.current_delay.as_millis()).unwrap_or(u64::MAX),
                "limiter totals"
            );
        }
    }
}

/// Full pipeline run over every leaf category of both brands.
pub async fn run_full_sync(
    pool: &PgPool,
    config: &AppConfig,
    force_update: bool,
    ledger_path: &Path,
) -> anyhow::Result<()> {
    let run = create_sync_run(pool, "full").await?;
    tracing::info!(run_id = run.id, force_update, "full sync starting");

    match full_sync_inner(pool, config, force_update, ledger_path).await {
        Ok(outcome) => {
            let failed = i32::try_from(outcome.failures.len()).unwrap_or(i32::MAX);
            complete_sync_run(pool, run.id, outcome.processed, failed).await?;
            tracing::info!(
                run_id = run.id,
                processed = outcome.processed,
                failed,
                "full sync finished"
            );
            Ok(())
        }
        Err(err) => {
            fail_run_best_effort(pool, run.id, &err).await;
            Err(err)
        }
    }
}

async fn full_sync_inner(
    pool: &PgPool,
    config: &AppConfig,
    force_update: bool,
    ledger_path: &Path,
) -> anyhow::Result<BatchOutcome> {
    let pipeline = Pipeline::new(pool.clone(), config)?;

    let (zara, pullbear) = tokio::join!(
        sync_brand(&pipeline, Source::Zara, force_update, config),
        sync_brand(&pipeline, Source::PullBear, force_update, config),
    );
    let mut outcome = zara?;
    outcome.merge(pullbear?);

    if !outcome.failures.is_empty() {
        tracing::info!(
            failed = outcome.failures.len(),
            "consolidated retry of failed products"
        );
        let failures = std::mem::take(&mut outcome.failures);
        let retried = retry_records(
            &pipeline,
            &failures,
            force_update,
            1,
            CONSOLIDATED_RETRY_BATCH,
            config,
        )
        .await?;
        outcome.merge(retried);
    }

    for source in Source::ALL {
        let recovered = recovery::run_recovery(&pipeline, source, force_update, config).await?;
        outcome.merge(recovered);
    }

    if outcome.failures.is_empty() {
        ledger::delete(ledger_path)?;
    } else {
        ledger::save(ledger_path, &outcome.failures)?;
        tracing::warn!(
            failed = outcome.failures.len(),
            path = %ledger_path.display(),
            "failure ledger written"
        );
    }

    pipeline.log_limiter_stats().await;
    Ok(outcome)
}

/// All leaf categories of one brand, largest expected count first. A category
/// whose listing cannot be discovered at all is logged and skipped; it does
/// not abort the brand.
async fn sync_brand(
    pipeline: &Pipeline,
    source: Source,
    force_update: bool,
    config: &AppConfig,
) -> anyhow::Result<BatchOutcome> {
    let brand = source.brand_name();
    let categories = list_leaf_categories(pipeline.pool(), brand).await?;
    tracing::info!(brand, categories = categories.len(), "brand sync starting");

    let mut outcome = BatchOutcome::default();
    for cat in &categories {
        match category::process_category(pipeline, cat, source, force_update, config).await {
            Ok(part) => outcome.merge(part),
            Err(err) => {
                tracing::error!(
                    brand,
                    category_id = cat.category_id,
                    error = %err,
                    "category listing failed, skipping"
                );
            }
        }
    }

    tracing::info!(
        brand,
        processed = outcome.processed,
        failed = outcome.failures.len(),
        "brand sync finished"
    );
    Ok(outcome)
}

/// Single-category run for one brand.
pub async fn run_category_sync(
    pool: &PgPool,
    config: &AppConfig,
    source: Source,
    category_id: i64,
    force_update: bool,
) -> anyhow::Result<()> {
    let run = create_sync_run(pool, "category").await?;
    tracing::info!(
        run_id = run.id,
        brand = source.brand_name(),
        category_id,
        force_update,
        "category sync starting"
    );

    match category_sync_inner(pool, config, source, category_id, force_update).await {
        Ok(outcome) => {
            let failed = i32::try_from(outcome.failures.len()).unwrap_or(i32::MAX);
            complete_sync_run(pool, run.id, outcome.processed, failed).await?;
            tracing::info!(
                run_id = run.id,
                processed = outcome.processed,
                failed,
                "category sync finished"
            );
            Ok(())
        }
        Err(err) => {
            fail_run_best_effort(pool, run.id, &err).await;
            Err(err)
        }
    }
}

async fn category_sync_inner(
    pool: &PgPool,
    config: &AppConfig,
    source: Source,
    category_id: i64,
    force_update: bool,
) -> anyhow::Result<BatchOutcome> {
    let cat = get_sub_category(pool, category_id)
        .await?
        .ok_or(DbError::UnknownCategory { category_id })?;
    if cat.brand != source.brand_name() {
        anyhow::bail!(
            "category {category_id} belongs to {}, not {}",
            cat.brand,
            source.brand_name()
        );
    }

    let pipeline = Pipeline::new(pool.clone(), config)?;
    let outcome = category::process_category(&pipeline, &cat, source, force_update, config).await?;
    pipeline.log_limiter_stats().await;
    Ok(outcome)
}

/// Reprocesses the products recorded in the failure ledger.
///
/// An unreadable ledger aborts before any run row is created; an absent or
/// empty one is a no-op.
pub async fn run_retry(pool: &PgPool, config: &AppConfig, ledger_path: &Path) -> anyhow::Result<()> {
    let records = ledger::load(ledger_path)?;
    if records.is_empty() {
        tracing::info!(path = %ledger_path.display(), "failure ledger is empty, nothing to retry");
        return Ok(());
    }

    let run = create_sync_run(pool, "retry").await?;
    tracing::info!(run_id = run.id, records = records.len(), "retry run starting");

    let pipeline = match Pipeline::new(pool.clone(), config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            let err = anyhow::Error::from(err);
            fail_run_best_effort(pool, run.id, &err).await;
            return Err(err);
        }
    };

    match retry_records(&pipeline, &records, false, 2, config.batch_size, config).await {
        Ok(outcome) => {
            if outcome.failures.is_empty() {
                ledger::delete(ledger_path)?;
            } else {
                ledger::save(ledger_path, &outcome.failures)?;
            }
            let failed = i32::try_from(outcome.failures.len()).unwrap_or(i32::MAX);
            complete_sync_run(pool, run.id, outcome.processed, failed).await?;
            tracing::info!(
                run_id = run.id,
                processed = outcome.processed,
                failed,
                "retry run finished"
            );
            Ok(())
        }
        Err(err) => {
            fail_run_best_effort(pool, run.id, &err).await;
            Err(err)
        }
    }
}

/// Groups failure records by (brand, category) and reprocesses each group.
/// Records whose brand or category can no longer be resolved stay failed.
async fn retry_records(
    pipeline: &Pipeline,
    records: &[FailureRecord],
    force_update: bool,
    max_attempts: u32,
    chunk_size: usize,
    config: &AppConfig,
) -> anyhow::Result<BatchOutcome> {
    let mut groups: HashMap<(String, i64), Vec<FailureRecord>> = HashMap::new();
    for record in records {
        groups
            .entry((record.brand.clone(), record.category_id))
            .or_default()
            .push(record.clone());
    }

    let mut outcome = BatchOutcome::default();
    for ((brand, category_id), group) in groups {
        let Some(source) = Source::from_brand_name(&brand) else {
            tracing::warn!(brand = %brand, category_id, "unknown brand in ledger, keeping records");
            outcome.failures.extend(group);
            continue;
        };
        let Some(cat) = get_sub_category(pipeline.pool(), category_id).await? else {
            tracing::warn!(
                brand = %brand,
                category_id,
                "ledger category no longer exists, keeping records"
            );
            outcome.failures.extend(group);
            continue;
        };

        let ids: Vec<i64> = group.iter().map(|r| r.product_id).collect();
        for chunk in ids.chunks(chunk_size.max(1)) {
            let part = batch::process_batch(
                pipeline,
                source,
                category_id,
                cat.id,
                chunk,
                force_update,
                max_attempts,
                config.batch_workers,
            )
            .await;
            outcome.merge(part);
        }
    }
    Ok(outcome)
}

/// Marking a run failed must never mask the error that got us here.
pub(crate) async fn fail_run_best_effort(pool: &PgPool, run_id: i64, error: &anyhow::Error) {
    if let Err(db_err) = fail_sync_run(pool, run_id, &error.to_string(), 0, 0).await {
        tracing::warn!(run_id, error = %db_err, "could not mark sync run as failed");
    }
}
