//! Database operations for `brands`, `main_categories`, and `sub_categories`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vitrin_core::categories::FlatCategory;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `sub_categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubCategoryRow {
    pub id: i64,
    /// Upstream category id; the natural key the pipeline works with.
    pub category_id: i64,
    pub category_name: String,
    pub brand: String,
    pub gender: String,
    pub level: i32,
    pub is_leaf: bool,
    pub matching_id: Option<i64>,
    pub product_count: Option<i32>,
    pub parent_category_id: Option<i64>,
    pub parent_sub_category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A leaf category joined with the number of products actually stored for it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeafCategoryCountRow {
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub brand: String,
    pub gender: String,
    pub product_count: Option<i32>,
    pub stored_count: i64,
}

const SUB_CATEGORY_COLUMNS: &str = "id, category_id, category_name, brand, gender, level, \
     is_leaf, matching_id, product_count, parent_category_id, parent_sub_category_id, \
     created_at, updated_at";

// ---------------------------------------------------------------------------
// Import upserts
// ---------------------------------------------------------------------------

/// Upserts a brand row keyed by its textual id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_brand(pool: &PgPool, id: &str, name: &str) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO brands (id, name) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
    )
    .bind(id)
    .bind(name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upserts a main category row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_main_category(
    pool: &PgPool,
    id: i64,
    name: &str,
    gender: &str,
    brand_id: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO main_categories (id, name, gender, brand_id) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO UPDATE SET \
             name   = EXCLUDED.name, \
             gender = EXCLUDED.gender",
    )
    .bind(id)
    .bind(name)
    .bind(gender)
    .bind(brand_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upserts a flattened sub-category row, unique by upstream `category_id`.
///
/// Re-import updates name, leaf flag, and product count in place. When the
/// product count changes, a `category_history` row is recorded with the old
/// and new values.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn upsert_sub_category(pool: &PgPool, flat: &FlatCategory) -> Result<(), DbError> {
    let previous: Option<(i64, Option<i32>)> = sqlx::query_as(
        "SELECT id, product_count FROM sub_categories WHERE category_id = $1",
    )
    .bind(flat.category_id)
    .fetch_optional(pool)
    .await?;

    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO sub_categories \
             (category_id, category_name, brand, gender, level, is_leaf, matching_id, \
              product_count, parent_category_id, parent_sub_category_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (category_id) DO UPDATE SET \
             category_name          = EXCLUDED.category_name, \
             gender                 = EXCLUDED.gender, \
             level                  = EXCLUDED.level, \
             is_leaf                = EXCLUDED.is_leaf, \
             matching_id            = EXCLUDED.matching_id, \
             product_count          = EXCLUDED.product_count, \
             parent_category_id     = EXCLUDED.parent_category_id, \
             parent_sub_category_id = EXCLUDED.parent_sub_category_id, \
             updated_at             = NOW() \
         RETURNING id",
    )
    .bind(flat.category_id)
    .bind(&flat.category_name)
    .bind(&flat.brand)
    .bind(&flat.gender)
    .bind(flat.level)
    .bind(flat.is_leaf)
    .bind(flat.matching_id)
    .bind(flat.product_count)
    .bind(flat.parent_category_id)
    .bind(flat.parent_sub_category_id)
    .fetch_one(pool)
    .await?;

    if let Some((_, old_count)) = previous {
        if old_count != flat.product_count {
            sqlx::query(
                "INSERT INTO category_history (sub_category_id, old_product_count, new_product_count) \
                 VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(old_count)
            .bind(flat.product_count)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Pipeline reads
// ---------------------------------------------------------------------------

/// Returns the leaf categories for one brand, largest expected product count
/// first — the order categories are processed within a brand.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_leaf_categories(pool: &PgPool, brand: &str) -> Result<Vec<SubCategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, SubCategoryRow>(&format!(
        "SELECT {SUB_CATEGORY_COLUMNS} \
         FROM sub_categories \
         WHERE brand = $1 AND is_leaf = TRUE \
         ORDER BY product_count DESC NULLS LAST, category_id"
    ))
    .bind(brand)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches one sub-category by its upstream `category_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_sub_category(
    pool: &PgPool,
    category_id: i64,
) -> Result<Option<SubCategoryRow>, DbError> {
    let row = sqlx::query_as::<_, SubCategoryRow>(&format!(
        "SELECT {SUB_CATEGORY_COLUMNS} FROM sub_categories WHERE category_id = $1"
    ))
    .bind(category_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Counts the products currently linked to a sub-category (by its internal id).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn stored_product_count(pool: &PgPool, sub_category_id: i64) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM product_sub_categories WHERE sub_category_id = $1",
    )
    .bind(sub_category_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Returns the upstream product ids currently linked to a sub-category. Used
/// by the recovery pass to work out which listed ids are still missing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stored_product_ids(
    pool: &PgPool,
    sub_category_id: i64,
) -> Result<Vec<i64>, DbError> {
    let ids: Vec<i64> = sqlx::query_scalar::<_, i64>(
        "SELECT p.product_id \
         FROM products p \
         JOIN product_sub_categories psc ON psc.product_id = p.id \
         WHERE psc.sub_category_id = $1",
    )
    .bind(sub_category_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Leaf categories (optionally filtered by brand) with their stored product
/// counts, for the read-only API.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_leaf_categories_with_counts(
    pool: &PgPool,
    brand: Option<&str>,
) -> Result<Vec<LeafCategoryCountRow>, DbError> {
    let rows = sqlx::query_as::<_, LeafCategoryCountRow>(
        "SELECT sc.id, sc.category_id, sc.category_name, sc.brand, sc.gender, \
                sc.product_count, \
                COUNT(psc.product_id) AS stored_count \
         FROM sub_categories sc \
         LEFT JOIN product_sub_categories psc ON psc.sub_category_id = sc.id \
         WHERE sc.is_leaf = TRUE \
           AND ($1::TEXT IS NULL OR sc.brand = $1) \
         GROUP BY sc.id \
         ORDER BY sc.brand, sc.product_count DESC NULLS LAST, sc.category_id",
    )
    .bind(brand)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
