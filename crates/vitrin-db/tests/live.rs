//! Live integration tests for vitrin-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/vitrin-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use vitrin_core::categories::FlatCategory;
use vitrin_core::product::{
    Availability, NormalizedColor, NormalizedImage, NormalizedProduct, NormalizedSize,
    NormalizedStock,
};
use vitrin_db::{
    complete_sync_run, count_catalog_products, create_sync_run, fail_sync_run, get_overview_stats,
    get_stock_totals, get_sub_category, get_sync_run, list_catalog_products, list_leaf_categories,
    list_leaf_categories_with_counts, list_stored_product_ids, persist_product, product_exists,
    stored_product_count, upsert_brand, upsert_main_category, upsert_sub_category, CatalogFilters,
    PersistOutcome,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seed a brand, main category, and one leaf sub-category; returns the
/// sub-category's internal id.
async fn seed_category(pool: &sqlx::PgPool, category_id: i64, product_count: i32) -> i64 {
    upsert_brand(pool, "zara", "ZARA").await.expect("brand");
    upsert_main_category(pool, 100, "GiyIM", "WOMAN", "zara")
        .await
        .expect("main category");
    upsert_sub_category(
        pool,
        &FlatCategory {
            category_id,
            category_name: format!("Kategori {category_id}"),
            brand: "ZARA".to_string(),
            gender: "WOMAN".to_string(),
            level: 1,
            is_leaf: true,
            matching_id: None,
            product_count: Some(product_count),
            parent_category_id: 100,
            parent_sub_category_id: None,
        },
    )
    .await
    .expect("sub category");

    get_sub_category(pool, category_id)
        .await
        .expect("get sub category")
        .expect("sub category should exist")
        .id
}

fn make_product(upstream_id: i64) -> NormalizedProduct {
    let image = NormalizedImage {
        url: format!("https://static.example.net/photos/{upstream_id}.jpg"),
        media_type: "image".to_string(),
        kind: "main".to_string(),
        position: 1,
        color_id: Some("712".to_string()),
        color_name: Some("Ekru".to_string()),
    };
    let size = NormalizedSize {
        size_id: 101,
        name: "M".to_string(),
        availability: Availability::InStock,
        price: Some(179_500),
        sku: Some(900_101),
        color_id: Some("712".to_string()),
        color_name: Some("Ekru".to_string()),
    };
    let stock = NormalizedStock {
        size_id: 101,
        name: "M".to_string(),
        availability: Availability::InStock,
        price: Some(179_500),
        sku: Some(900_101),
        color_id: Some("712".to_string()),
        color_name: Some("Ekru".to_string()),
    };
    NormalizedProduct {
        id: upstream_id,
        name: "Oversize Gömlek".to_string(),
        price: 179_500,
        description: "Dik yakalı gömlek".to_string(),
        colors: vec![NormalizedColor {
            id: "712".to_string(),
            name: "Ekru".to_string(),
            hex_code: Some("#F5F0E8".to_string()),
            price: Some(179_500),
            description: String::new(),
            images: vec![image.clone()],
            sizes: vec![size.clone()],
        }],
        images: vec![image],
        sizes: vec![size],
        stock: vec![stock],
    }
}

async fn count_rows(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("count on {table} failed: {e}"))
}

// ---------------------------------------------------------------------------
// Section 1: Product persistence
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn persist_product_creates_full_tree(pool: sqlx::PgPool) {
    let sub_id = seed_category(&pool, 8010, 1).await;
    let product = make_product(441_020);

    let outcome = persist_product(&pool, &product, "ZARA", sub_id, false)
        .await
        .expect("persist failed");

    assert_eq!(outcome, PersistOutcome::Created);
    assert!(product_exists(&pool, 441_020).await.expect("exists check"));
    assert_eq!(count_rows(&pool, "products").await, 1);
    assert_eq!(count_rows(&pool, "product_colors").await, 1);
    assert_eq!(count_rows(&pool, "product_images").await, 1);
    assert_eq!(count_rows(&pool, "product_sizes").await, 1);
    assert_eq!(count_rows(&pool, "product_stock").await, 1);
    assert_eq!(stored_product_count(&pool, sub_id).await.expect("count"), 1);
    assert_eq!(
        list_stored_product_ids(&pool, sub_id).await.expect("ids"),
        vec![441_020]
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn persist_product_twice_is_idempotent(pool: sqlx::PgPool) {
    let sub_id = seed_category(&pool, 8010, 1).await;
    let product = make_product(441_020);

    persist_product(&pool, &product, "ZARA", sub_id, false)
        .await
        .expect("first persist failed");
    let second = persist_product(&pool, &product, "ZARA", sub_id, false)
        .await
        .expect("second persist failed");

    assert_eq!(second, PersistOutcome::Existing);
    assert_eq!(count_rows(&pool, "products").await, 1);
    assert_eq!(count_rows(&pool, "product_colors").await, 1);
    assert_eq!(count_rows(&pool, "product_images").await, 1);
    assert_eq!(count_rows(&pool, "product_sizes").await, 1);
    assert_eq!(count_rows(&pool, "product_stock").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn persist_existing_attaches_new_category_link(pool: sqlx::PgPool) {
    let first_sub = seed_category(&pool, 8010, 1).await;
    let second_sub = seed_category(&pool, 8020, 1).await;
    let product = make_product(441_020);

    persist_product(&pool, &product, "ZARA", first_sub, false)
        .await
        .expect("first persist failed");
    persist_product(&pool, &product, "ZARA", second_sub, false)
        .await
        .expect("second persist failed");

    assert_eq!(count_rows(&pool, "products").await, 1);
    assert_eq!(count_rows(&pool, "product_sub_categories").await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn force_update_merges_missing_color_only(pool: sqlx::PgPool) {
    let sub_id = seed_category(&pool, 8010, 1).await;
    let product = make_product(441_020);
    persist_product(&pool, &product, "ZARA", sub_id, false)
        .await
        .expect("initial persist failed");

    // A fresh snapshot with the same color plus a new one.
    let mut updated = make_product(441_020);
    let new_size = NormalizedSize {
        size_id: 201,
        name: "S".to_string(),
        availability: Availability::OutOfStock,
        price: None,
        sku: None,
        color_id: Some("800".to_string()),
        color_name: Some("Siyah".to_string()),
    };
    updated.colors.push(NormalizedColor {
        id: "800".to_string(),
        name: "Siyah".to_string(),
        hex_code: None,
        price: Some(159_500),
        description: String::new(),
        images: vec![],
        sizes: vec![new_size.clone()],
    });
    updated.sizes.push(new_size);
    updated.stock.push(NormalizedStock {
        size_id: 201,
        name: "S".to_string(),
        availability: Availability::OutOfStock,
        price: Some(159_500),
        sku: None,
        color_id: Some("800".to_string()),
        color_name: Some("Siyah".to_string()),
    });

    let outcome = persist_product(&pool, &updated, "ZARA", sub_id, true)
        .await
        .expect("force persist failed");

    assert_eq!(outcome, PersistOutcome::Merged);
    assert_eq!(count_rows(&pool, "products").await, 1);
    assert_eq!(count_rows(&pool, "product_colors").await, 2);
    assert_eq!(count_rows(&pool, "product_sizes").await, 2);
    assert_eq!(count_rows(&pool, "product_stock").await, 2);

    // The existing color was not rewritten.
    let hex: Option<String> = sqlx::query_scalar(
        "SELECT hex_code FROM product_colors WHERE color_id = '712'",
    )
    .fetch_one(&pool)
    .await
    .expect("color lookup");
    assert_eq!(hex.as_deref(), Some("#F5F0E8"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn force_update_records_price_and_stock_history(pool: sqlx::PgPool) {
    let sub_id = seed_category(&pool, 8010, 1).await;
    let product = make_product(441_020);
    persist_product(&pool, &product, "ZARA", sub_id, false)
        .await
        .expect("initial persist failed");

    let mut updated = make_product(441_020);
    updated.price = 199_500;
    updated.stock[0].availability = Availability::OutOfStock;

    persist_product(&pool, &updated, "ZARA", sub_id, true)
        .await
        .expect("force persist failed");

    assert_eq!(count_rows(&pool, "price_history").await, 1);
    assert_eq!(count_rows(&pool, "stock_history").await, 1);

    let price: i64 = sqlx::query_scalar("SELECT price FROM products WHERE product_id = 441020")
        .fetch_one(&pool)
        .await
        .expect("price lookup");
    assert_eq!(price, 199_500);
    let availability: String =
        sqlx::query_scalar("SELECT availability FROM product_stock WHERE size_id = 101")
            .fetch_one(&pool)
            .await
            .expect("availability lookup");
    assert_eq!(availability, "out_of_stock");
}

// ---------------------------------------------------------------------------
// Section 2: Categories
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn leaf_categories_order_by_expected_count(pool: sqlx::PgPool) {
    seed_category(&pool, 8010, 40).await;
    seed_category(&pool, 8020, 120).await;
    seed_category(&pool, 8030, 75).await;

    let leaves = list_leaf_categories(&pool, "ZARA").await.expect("list");
    let ids: Vec<i64> = leaves.iter().map(|c| c.category_id).collect();
    assert_eq!(ids, vec![8020, 8030, 8010]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn reimport_updates_count_and_records_history(pool: sqlx::PgPool) {
    seed_category(&pool, 8010, 40).await;
    seed_category(&pool, 8010, 55).await;

    assert_eq!(count_rows(&pool, "sub_categories").await, 1);
    assert_eq!(count_rows(&pool, "category_history").await, 1);

    let row = get_sub_category(&pool, 8010)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(row.product_count, Some(55));
}

#[sqlx::test(migrations = "../../migrations")]
async fn leaf_categories_with_counts_include_stored_totals(pool: sqlx::PgPool) {
    let sub_id = seed_category(&pool, 8010, 3).await;
    persist_product(&pool, &make_product(1), "ZARA", sub_id, false)
        .await
        .expect("persist 1");
    persist_product(&pool, &make_product(2), "ZARA", sub_id, false)
        .await
        .expect("persist 2");

    let rows = list_leaf_categories_with_counts(&pool, Some("ZARA"))
        .await
        .expect("list with counts");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].product_count, Some(3));
    assert_eq!(rows[0].stored_count, 2);
}

// ---------------------------------------------------------------------------
// Section 3: Sync runs and stats
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_lifecycle_success(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "full").await.expect("create");
    assert_eq!(run.status, "running");
    assert!(run.completed_at.is_none());

    complete_sync_run(&pool, run.id, 120, 3)
        .await
        .expect("complete");

    let fetched = get_sync_run(&pool, run.id).await.expect("get");
    assert_eq!(fetched.status, "success");
    assert_eq!(fetched.records_processed, 120);
    assert_eq!(fetched.records_failed, 3);
    assert!(fetched.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_lifecycle_failure(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "category").await.expect("create");
    fail_sync_run(&pool, run.id, "listing unavailable", 10, 10)
        .await
        .expect("fail");

    let fetched = get_sync_run(&pool, run.id).await.expect("get");
    assert_eq!(fetched.status, "failed");
    assert_eq!(fetched.error_message.as_deref(), Some("listing unavailable"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn overview_and_stock_stats_reflect_data(pool: sqlx::PgPool) {
    let sub_id = seed_category(&pool, 8010, 2).await;
    persist_product(&pool, &make_product(1), "ZARA", sub_id, false)
        .await
        .expect("persist");
    let run = create_sync_run(&pool, "full").await.expect("create run");
    complete_sync_run(&pool, run.id, 1, 0).await.expect("complete");

    let overview = get_overview_stats(&pool).await.expect("overview");
    assert_eq!(overview.total_brands, 1);
    assert_eq!(overview.total_products, 1);
    // One main category plus one sub-category.
    assert_eq!(overview.total_categories, 2);
    assert!(overview.last_sync_at.is_some());

    let stock = get_stock_totals(&pool).await.expect("stock totals");
    assert_eq!(stock.total_records, 1);
    assert_eq!(stock.in_stock, 1);
    assert_eq!(stock.out_of_stock, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn catalog_browse_filters_and_paginates(pool: sqlx::PgPool) {
    let sub_id = seed_category(&pool, 8010, 3).await;
    for upstream_id in 1..=3 {
        persist_product(&pool, &make_product(upstream_id), "ZARA", sub_id, false)
            .await
            .expect("persist");
    }

    let all = CatalogFilters {
        page: 1,
        per_page: 2,
        ..CatalogFilters::default()
    };
    let page = list_catalog_products(&pool, &all).await.expect("page 1");
    assert_eq!(page.len(), 2);
    assert_eq!(count_catalog_products(&pool, &all).await.expect("count"), 3);

    let by_search = CatalogFilters {
        search: Some("gömlek"),
        page: 1,
        per_page: 10,
        ..CatalogFilters::default()
    };
    assert_eq!(
        count_catalog_products(&pool, &by_search).await.expect("count"),
        3
    );

    let by_brand = CatalogFilters {
        brand: Some("PULL&BEAR"),
        page: 1,
        per_page: 10,
        ..CatalogFilters::default()
    };
    assert_eq!(
        count_catalog_products(&pool, &by_brand).await.expect("count"),
        0
    );

    let by_category = CatalogFilters {
        category_id: Some(8010),
        page: 1,
        per_page: 10,
        ..CatalogFilters::default()
    };
    assert_eq!(
        count_catalog_products(&pool, &by_category)
            .await
            .expect("count"),
        3
    );
}
