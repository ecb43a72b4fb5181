//! `import-categories`: loads a brand/category JSON export into the category
//! tables. Parents are flattened ahead of their children, so a single ordered
//! pass of upserts is enough.

use std::path::Path;

use anyhow::Context;
use sqlx::PgPool;

use vitrin_core::categories::{flatten_subtree, CategoryExport};
use vitrin_db::{
    complete_sync_run, create_sync_run, upsert_brand, upsert_main_category, upsert_sub_category,
};

pub async fn run_import_categories(pool: &PgPool, file: &Path) -> anyhow::Result<()> {
    let run = create_sync_run(pool, "import").await?;
    tracing::info!(run_id = run.id, file = %file.display(), "category import starting");

    match import_inner(pool, file).await {
        Ok(count) => {
            complete_sync_run(pool, run.id, count, 0).await?;
            tracing::info!(run_id = run.id, sub_categories = count, "category import finished");
            Ok(())
        }
        Err(err) => {
            crate::sync::fail_run_best_effort(pool, run.id, &err).await;
            Err(err)
        }
    }
}

async fn import_inner(pool: &PgPool, file: &Path) -> anyhow::Result<i32> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading category export {}", file.display()))?;
    let export: CategoryExport = serde_json::from_str(&raw)
        .with_context(|| format!("parsing category export {}", file.display()))?;

    let mut sub_count = 0i32;
    for brand in &export.brands {
        let brand_id = brand_id_string(&brand.id);
        upsert_brand(pool, &brand_id, &brand.brand).await?;

        for main in &brand.main_categories {
            upsert_main_category(
                pool,
                main.id,
                main.name.as_deref().unwrap_or("UNKNOWN"),
                main.gender.as_deref().unwrap_or("UNKNOWN"),
                &brand_id,
            )
            .await?;

            for flat in flatten_subtree(main, &brand.brand) {
                upsert_sub_category(pool, &flat).await?;
                sub_count += 1;
            }
        }
        tracing::info!(brand = %brand.brand, "brand imported");
    }

    Ok(sub_count)
}

/// The export carries brand ids as either strings or numbers; the `brands`
/// table keys on text.
fn brand_id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
