//! Read-model queries used by the `vitrin-server` analytics endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Entity counts for the overview card.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OverviewStats {
    pub total_brands: i64,
    pub total_products: i64,
    pub total_categories: i64,
    pub total_users: i64,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Per-brand entity counts.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandStatsRow {
    pub brand_name: String,
    pub product_count: i64,
    pub category_count: i64,
    pub color_count: i64,
}

/// Stock record totals across the catalog.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockTotals {
    pub total_records: i64,
    pub in_stock: i64,
    pub out_of_stock: i64,
}

/// Per-brand in/out-of-stock breakdown.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandStockRow {
    pub brand_name: String,
    pub in_stock: i64,
    pub out_of_stock: i64,
}

/// Sync-run counters for the system card.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SystemStats {
    pub total_syncs: i64,
    pub successful_syncs: i64,
    pub failed_syncs: i64,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// One day of sync activity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailySyncRow {
    pub day: NaiveDate,
    pub syncs: i64,
    pub success: i64,
    pub failed: i64,
}

/// Change-history counters.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryStats {
    pub total_price_changes: i64,
    pub total_stock_changes: i64,
    pub total_category_changes: i64,
    pub price_changes_30d: i64,
    pub stock_changes_30d: i64,
}

/// Catalog browse card: one product with summary counts.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogProductRow {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub price: i64,
    pub description: String,
    pub brand_name: String,
    pub color_count: i64,
    pub in_stock_count: i64,
    pub primary_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input filters for catalog browsing. Pagination is 1-based.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilters<'a> {
    pub search: Option<&'a str>,
    pub brand: Option<&'a str>,
    pub category_id: Option<i64>,
    pub page: i64,
    pub per_page: i64,
}

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub price: i64,
    pub description: String,
    pub brand_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `product_colors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ColorRow {
    pub id: i64,
    pub color_id: String,
    pub name: String,
    pub hex_code: Option<String>,
    pub price: Option<i64>,
    pub description: String,
}

/// A row from the `product_images` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImageRow {
    pub id: i64,
    pub color_id: Option<i64>,
    pub color_name: Option<String>,
    pub url: String,
    pub media_type: String,
    pub kind: String,
    pub position: i32,
}

/// A row from the `product_sizes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SizeRow {
    pub id: i64,
    pub color_id: Option<i64>,
    pub color_name: Option<String>,
    pub size_id: i64,
    pub name: String,
    pub availability: String,
    pub price: Option<i64>,
    pub sku: Option<i64>,
}

/// A row from the `product_stock` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockRow {
    pub id: i64,
    pub color_id: Option<i64>,
    pub color_name: Option<String>,
    pub size_id: i64,
    pub name: String,
    pub availability: String,
    pub price: Option<i64>,
    pub sku: Option<i64>,
}

// ---------------------------------------------------------------------------
// Dashboard aggregates
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_overview_stats(pool: &PgPool) -> Result<OverviewStats, DbError> {
    let row = sqlx::query_as::<_, OverviewStats>(
        "SELECT \
             (SELECT COUNT(*) FROM brands)          AS total_brands, \
             (SELECT COUNT(*) FROM products)        AS total_products, \
             (SELECT COUNT(*) FROM main_categories) \
                 + (SELECT COUNT(*) FROM sub_categories) AS total_categories, \
             (SELECT COUNT(*) FROM users)           AS total_users, \
             (SELECT MAX(started_at) FROM data_syncs WHERE status = 'success') \
                 AS last_sync_at",
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Per-brand product, leaf-category, and color counts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_brand_stats(pool: &PgPool) -> Result<Vec<BrandStatsRow>, DbError> {
    let rows = sqlx::query_as::<_, BrandStatsRow>(
        "SELECT b.name AS brand_name, \
                (SELECT COUNT(*) FROM products p WHERE p.brand_name = b.name) \
                    AS product_count, \
                (SELECT COUNT(*) FROM sub_categories sc WHERE sc.brand = b.name) \
                    AS category_count, \
                (SELECT COUNT(*) FROM product_colors pc \
                 JOIN products p ON p.id = pc.product_id \
                 WHERE p.brand_name = b.name) AS color_count \
         FROM brands b \
         ORDER BY b.name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_stock_totals(pool: &PgPool) -> Result<StockTotals, DbError> {
    let row = sqlx::query_as::<_, StockTotals>(
        "SELECT COUNT(*) AS total_records, \
                COUNT(*) FILTER (WHERE availability = 'in_stock')     AS in_stock, \
                COUNT(*) FILTER (WHERE availability = 'out_of_stock') AS out_of_stock \
         FROM product_stock",
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_brand_stock(pool: &PgPool) -> Result<Vec<BrandStockRow>, DbError> {
    let rows = sqlx::query_as::<_, BrandStockRow>(
        "SELECT p.brand_name, \
                COUNT(*) FILTER (WHERE ps.availability = 'in_stock')     AS in_stock, \
                COUNT(*) FILTER (WHERE ps.availability = 'out_of_stock') AS out_of_stock \
         FROM product_stock ps \
         JOIN products p ON p.id = ps.product_id \
         GROUP BY p.brand_name \
         ORDER BY p.brand_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_system_stats(pool: &PgPool) -> Result<SystemStats, DbError> {
    let row = sqlx::query_as::<_, SystemStats>(
        "SELECT COUNT(*) AS total_syncs, \
                COUNT(*) FILTER (WHERE status = 'success') AS successful_syncs, \
                COUNT(*) FILTER (WHERE status = 'failed')  AS failed_syncs, \
                MAX(started_at) AS last_sync_at \
         FROM data_syncs",
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Sync activity per day over the last 7 days (days without runs are absent).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_daily_syncs(pool: &PgPool) -> Result<Vec<DailySyncRow>, DbError> {
    let rows = sqlx::query_as::<_, DailySyncRow>(
        "SELECT started_at::date AS day, \
                COUNT(*) AS syncs, \
                COUNT(*) FILTER (WHERE status = 'success') AS success, \
                COUNT(*) FILTER (WHERE status = 'failed')  AS failed \
         FROM data_syncs \
         WHERE started_at >= NOW() - INTERVAL '7 days' \
         GROUP BY started_at::date \
         ORDER BY day",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_history_stats(pool: &PgPool) -> Result<HistoryStats, DbError> {
    let row = sqlx::query_as::<_, HistoryStats>(
        "SELECT \
             (SELECT COUNT(*) FROM price_history)    AS total_price_changes, \
             (SELECT COUNT(*) FROM stock_history)    AS total_stock_changes, \
             (SELECT COUNT(*) FROM category_history) AS total_category_changes, \
             (SELECT COUNT(*) FROM price_history \
              WHERE changed_at >= NOW() - INTERVAL '30 days') AS price_changes_30d, \
             (SELECT COUNT(*) FROM stock_history \
              WHERE changed_at >= NOW() - INTERVAL '30 days') AS stock_changes_30d",
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// Catalog browse
// ---------------------------------------------------------------------------

const CATALOG_FILTER: &str = "($1::TEXT IS NULL OR p.name ILIKE '%' || $1 || '%' \
          OR p.description ILIKE '%' || $1 || '%') \
     AND ($2::TEXT IS NULL OR p.brand_name = $2) \
     AND ($3::BIGINT IS NULL OR EXISTS ( \
              SELECT 1 FROM product_sub_categories psc \
              JOIN sub_categories sc ON sc.id = psc.sub_category_id \
              WHERE psc.product_id = p.id AND sc.category_id = $3))";

/// Returns one page of catalog products matching the filters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_catalog_products(
    pool: &PgPool,
    filters: &CatalogFilters<'_>,
) -> Result<Vec<CatalogProductRow>, DbError> {
    let per_page = filters.per_page.clamp(1, 100);
    let offset = (filters.page.max(1) - 1) * per_page;

    let rows = sqlx::query_as::<_, CatalogProductRow>(&format!(
        "SELECT p.id, p.product_id, p.name, p.price, p.description, p.brand_name, \
                (SELECT COUNT(*) FROM product_colors pc WHERE pc.product_id = p.id) \
                    AS color_count, \
                (SELECT COUNT(*) FROM product_stock ps \
                 WHERE ps.product_id = p.id AND ps.availability = 'in_stock') \
                    AS in_stock_count, \
                (SELECT pi.url FROM product_images pi \
                 WHERE pi.product_id = p.id \
                 ORDER BY pi.position, pi.id LIMIT 1) AS primary_image_url, \
                p.created_at \
         FROM products p \
         WHERE {CATALOG_FILTER} \
         ORDER BY p.created_at DESC, p.id DESC \
         LIMIT $4 OFFSET $5"
    ))
    .bind(filters.search)
    .bind(filters.brand)
    .bind(filters.category_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Total number of products matching the filters, for pagination.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_catalog_products(
    pool: &PgPool,
    filters: &CatalogFilters<'_>,
) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM products p WHERE {CATALOG_FILTER}"
    ))
    .bind(filters.search)
    .bind(filters.brand)
    .bind(filters.category_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

// ---------------------------------------------------------------------------
// Product detail
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_upstream_id(
    pool: &PgPool,
    upstream_id: i64,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, product_id, name, price, description, brand_name, created_at, updated_at \
         FROM products WHERE product_id = $1",
    )
    .bind(upstream_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_colors(pool: &PgPool, product_db_id: i64) -> Result<Vec<ColorRow>, DbError> {
    let rows = sqlx::query_as::<_, ColorRow>(
        "SELECT id, color_id, name, hex_code, price, description \
         FROM product_colors WHERE product_id = $1 ORDER BY id",
    )
    .bind(product_db_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_images(pool: &PgPool, product_db_id: i64) -> Result<Vec<ImageRow>, DbError> {
    let rows = sqlx::query_as::<_, ImageRow>(
        "SELECT id, color_id, color_name, url, media_type, kind, position \
         FROM product_images WHERE product_id = $1 ORDER BY position, id",
    )
    .bind(product_db_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_sizes(pool: &PgPool, product_db_id: i64) -> Result<Vec<SizeRow>, DbError> {
    let rows = sqlx::query_as::<_, SizeRow>(
        "SELECT id, color_id, color_name, size_id, name, availability, price, sku \
         FROM product_sizes WHERE product_id = $1 ORDER BY id",
    )
    .bind(product_db_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_stock(pool: &PgPool, product_db_id: i64) -> Result<Vec<StockRow>, DbError> {
    let rows = sqlx::query_as::<_, StockRow>(
        "SELECT id, color_id, color_name, size_id, name, availability, price, sku \
         FROM product_stock WHERE product_id = $1 ORDER BY id",
    )
    .bind(product_db_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
