//! Idempotent product persistence.
//!
//! A product is written inside a single transaction: product row, category
//! link, colors matched by upstream color id, then the image/size/stock
//! batches with skip-duplicate semantics. Replaying the same product is safe;
//! the second call short-circuits on the existing row.

use std::collections::HashMap;
use std::time::Duration;

use sqlx::{PgPool, Postgres, Transaction};

use vitrin_core::product::{NormalizedImage, NormalizedProduct, NormalizedSize, NormalizedStock};

use crate::DbError;

const PERSIST_ATTEMPTS: u32 = 3;

/// What [`persist_product`] did with the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// New product row with all children.
    Created,
    /// Row already existed; only the category link was ensured.
    Existing,
    /// Force-update merge over an existing row.
    Merged,
}

/// Returns `true` when a product with this upstream id is already stored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn product_exists(pool: &PgPool, upstream_id: i64) -> Result<bool, DbError> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE product_id = $1")
        .bind(upstream_id)
        .fetch_optional(pool)
        .await?;

    Ok(id.is_some())
}

/// Persists one normalized product under a sub-category (internal id).
///
/// The whole write runs in one transaction and is retried up to 3 times with
/// linear backoff on failure; transient serialization/connection errors get
/// absorbed here rather than failing the product outright.
///
/// Without `force_update`, an existing product is a fast no-op that only
/// ensures the category link. With it, missing colors and children are merged
/// in, the top-level price is refreshed (recording `price_history`), and
/// changed stock availability is updated (recording `stock_history`). Existing
/// colors are never rewritten.
///
/// # Errors
///
/// Returns the final [`DbError`] once all attempts are exhausted.
pub async fn persist_product(
    pool: &PgPool,
    product: &NormalizedProduct,
    brand_name: &str,
    sub_category_id: i64,
    force_update: bool,
) -> Result<PersistOutcome, DbError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match persist_once(pool, product, brand_name, sub_category_id, force_update).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if attempt < PERSIST_ATTEMPTS => {
                tracing::warn!(
                    product_id = product.id,
                    attempt,
                    error = %e,
                    "persist transaction failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(u64::from(attempt) * 1000)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn persist_once(
    pool: &PgPool,
    product: &NormalizedProduct,
    brand_name: &str,
    sub_category_id: i64,
    force_update: bool,
) -> Result<PersistOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let existing: Option<(i64, i64)> =
        sqlx::query_as("SELECT id, price FROM products WHERE product_id = $1")
            .bind(product.id)
            .fetch_optional(&mut *tx)
            .await?;

    if let Some((db_id, _)) = existing {
        if !force_update {
            link_category(&mut tx, db_id, sub_category_id).await?;
            tx.commit().await?;
            return Ok(PersistOutcome::Existing);
        }
    }

    let (db_id, outcome) = match existing {
        Some((db_id, old_price)) => {
            if product.price != 0 && product.price != old_price {
                sqlx::query("UPDATE products SET price = $1, updated_at = NOW() WHERE id = $2")
                    .bind(product.price)
                    .bind(db_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "INSERT INTO price_history (product_id, old_price, new_price) \
                     VALUES ($1, $2, $3)",
                )
                .bind(db_id)
                .bind(old_price)
                .bind(product.price)
                .execute(&mut *tx)
                .await?;
            }
            (db_id, PersistOutcome::Merged)
        }
        None => {
            let db_id: i64 = sqlx::query_scalar::<_, i64>(
                "INSERT INTO products (product_id, name, price, description, brand_name) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id",
            )
            .bind(product.id)
            .bind(&product.name)
            .bind(product.price)
            .bind(&product.description)
            .bind(brand_name)
            .fetch_one(&mut *tx)
            .await?;
            (db_id, PersistOutcome::Created)
        }
    };

    link_category(&mut tx, db_id, sub_category_id).await?;

    // Colors matched by upstream id; existing ones are left untouched.
    let mut color_map: HashMap<String, i64> = sqlx::query_as::<_, (String, i64)>(
        "SELECT color_id, id FROM product_colors WHERE product_id = $1",
    )
    .bind(db_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    for color in &product.colors {
        if color_map.contains_key(&color.id) {
            continue;
        }
        let color_db_id: i64 = sqlx::query_scalar::<_, i64>(
            "INSERT INTO product_colors (product_id, color_id, name, hex_code, price, description) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(db_id)
        .bind(&color.id)
        .bind(&color.name)
        .bind(&color.hex_code)
        .bind(color.price)
        .bind(&color.description)
        .fetch_one(&mut *tx)
        .await?;
        color_map.insert(color.id.clone(), color_db_id);

        insert_images(&mut tx, db_id, &color.images, &color_map).await?;
        insert_sizes(&mut tx, db_id, &color.sizes, &color_map).await?;
    }

    // Aggregate lists; the skip-duplicate keys make the per-color inserts
    // above and these idempotent against each other.
    insert_images(&mut tx, db_id, &product.images, &color_map).await?;
    insert_sizes(&mut tx, db_id, &product.sizes, &color_map).await?;
    if force_update {
        refresh_stock_availability(&mut tx, db_id, &product.stock, &color_map).await?;
    }
    insert_stock(&mut tx, db_id, &product.stock, &color_map).await?;

    tx.commit().await?;
    Ok(outcome)
}

async fn link_category(
    tx: &mut Transaction<'_, Postgres>,
    product_db_id: i64,
    sub_category_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO product_sub_categories (product_id, sub_category_id) \
         VALUES ($1, $2) \
         ON CONFLICT (product_id, sub_category_id) DO NOTHING",
    )
    .bind(product_db_id)
    .bind(sub_category_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn resolve_color(color_map: &HashMap<String, i64>, color_id: Option<&String>) -> Option<i64> {
    color_id.and_then(|id| color_map.get(id).copied())
}

async fn insert_images(
    tx: &mut Transaction<'_, Postgres>,
    product_db_id: i64,
    images: &[NormalizedImage],
    color_map: &HashMap<String, i64>,
) -> Result<(), DbError> {
    if images.is_empty() {
        return Ok(());
    }

    let mut color_ids: Vec<Option<i64>> = Vec::with_capacity(images.len());
    let mut color_names: Vec<Option<String>> = Vec::with_capacity(images.len());
    let mut urls: Vec<String> = Vec::with_capacity(images.len());
    let mut media_types: Vec<String> = Vec::with_capacity(images.len());
    let mut kinds: Vec<String> = Vec::with_capacity(images.len());
    let mut positions: Vec<i32> = Vec::with_capacity(images.len());
    for image in images {
        color_ids.push(resolve_color(color_map, image.color_id.as_ref()));
        color_names.push(image.color_name.clone());
        urls.push(image.url.clone());
        media_types.push(image.media_type.clone());
        kinds.push(image.kind.clone());
        positions.push(image.position);
    }

    sqlx::query(
        "INSERT INTO product_images \
             (product_id, color_id, color_name, url, media_type, kind, position) \
         SELECT $1, u.color_id, u.color_name, u.url, u.media_type, u.kind, u.position \
         FROM UNNEST($2::bigint[], $3::text[], $4::text[], $5::text[], $6::text[], $7::int[]) \
              AS u(color_id, color_name, url, media_type, kind, position) \
         ON CONFLICT (product_id, color_id, url) DO NOTHING",
    )
    .bind(product_db_id)
    .bind(&color_ids)
    .bind(&color_names)
    .bind(&urls)
    .bind(&media_types)
    .bind(&kinds)
    .bind(&positions)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_sizes(
    tx: &mut Transaction<'_, Postgres>,
    product_db_id: i64,
    sizes: &[NormalizedSize],
    color_map: &HashMap<String, i64>,
) -> Result<(), DbError> {
    if sizes.is_empty() {
        return Ok(());
    }

    let mut color_ids: Vec<Option<i64>> = Vec::with_capacity(sizes.len());
    let mut color_names: Vec<Option<String>> = Vec::with_capacity(sizes.len());
    let mut size_ids: Vec<i64> = Vec::with_capacity(sizes.len());
    let mut names: Vec<String> = Vec::with_capacity(sizes.len());
    let mut availabilities: Vec<&'static str> = Vec::with_capacity(sizes.len());
    let mut prices: Vec<Option<i64>> = Vec::with_capacity(sizes.len());
    let mut skus: Vec<Option<i64>> = Vec::with_capacity(sizes.len());
    for size in sizes {
        color_ids.push(resolve_color(color_map, size.color_id.as_ref()));
        color_names.push(size.color_name.clone());
        size_ids.push(size.size_id);
        names.push(size.name.clone());
        availabilities.push(size.availability.as_str());
        prices.push(size.price);
        skus.push(size.sku);
    }

    sqlx::query(
        "INSERT INTO product_sizes \
             (product_id, color_id, color_name, size_id, name, availability, price, sku) \
         SELECT $1, u.color_id, u.color_name, u.size_id, u.name, u.availability, u.price, u.sku \
         FROM UNNEST($2::bigint[], $3::text[], $4::bigint[], $5::text[], $6::text[], \
                     $7::bigint[], $8::bigint[]) \
              AS u(color_id, color_name, size_id, name, availability, price, sku) \
         ON CONFLICT (product_id, color_id, size_id) DO NOTHING",
    )
    .bind(product_db_id)
    .bind(&color_ids)
    .bind(&color_names)
    .bind(&size_ids)
    .bind(&names)
    .bind(&availabilities)
    .bind(&prices)
    .bind(&skus)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_db_id: i64,
    stock: &[NormalizedStock],
    color_map: &HashMap<String, i64>,
) -> Result<(), DbError> {
    if stock.is_empty() {
        return Ok(());
    }

    let mut color_ids: Vec<Option<i64>> = Vec::with_capacity(stock.len());
    let mut color_names: Vec<Option<String>> = Vec::with_capacity(stock.len());
    let mut size_ids: Vec<i64> = Vec::with_capacity(stock.len());
    let mut names: Vec<String> = Vec::with_capacity(stock.len());
    let mut availabilities: Vec<&'static str> = Vec::with_capacity(stock.len());
    let mut prices: Vec<Option<i64>> = Vec::with_capacity(stock.len());
    let mut skus: Vec<Option<i64>> = Vec::with_capacity(stock.len());
    for entry in stock {
        color_ids.push(resolve_color(color_map, entry.color_id.as_ref()));
        color_names.push(entry.color_name.clone());
        size_ids.push(entry.size_id);
        names.push(entry.name.clone());
        availabilities.push(entry.availability.as_str());
        prices.push(entry.price);
        skus.push(entry.sku);
    }

    sqlx::query(
        "INSERT INTO product_stock \
             (product_id, color_id, color_name, size_id, name, availability, price, sku) \
         SELECT $1, u.color_id, u.color_name, u.size_id, u.name, u.availability, u.price, u.sku \
         FROM UNNEST($2::bigint[], $3::text[], $4::bigint[], $5::text[], $6::text[], \
                     $7::bigint[], $8::bigint[]) \
              AS u(color_id, color_name, size_id, name, availability, price, sku) \
         ON CONFLICT (product_id, color_id, size_id) DO NOTHING",
    )
    .bind(product_db_id)
    .bind(&color_ids)
    .bind(&color_names)
    .bind(&size_ids)
    .bind(&names)
    .bind(&availabilities)
    .bind(&prices)
    .bind(&skus)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Force-update path: bring availability of already-stored stock rows in line
/// with the fresh snapshot, recording each flip in `stock_history`.
async fn refresh_stock_availability(
    tx: &mut Transaction<'_, Postgres>,
    product_db_id: i64,
    stock: &[NormalizedStock],
    color_map: &HashMap<String, i64>,
) -> Result<(), DbError> {
    let existing: Vec<(i64, Option<i64>, i64, String)> = sqlx::query_as(
        "SELECT id, color_id, size_id, availability FROM product_stock WHERE product_id = $1",
    )
    .bind(product_db_id)
    .fetch_all(&mut **tx)
    .await?;

    let by_key: HashMap<(Option<i64>, i64), (i64, String)> = existing
        .into_iter()
        .map(|(id, color_id, size_id, availability)| ((color_id, size_id), (id, availability)))
        .collect();

    for entry in stock {
        let key = (
            resolve_color(color_map, entry.color_id.as_ref()),
            entry.size_id,
        );
        let Some((row_id, old_availability)) = by_key.get(&key) else {
            continue;
        };
        if old_availability == entry.availability.as_str() {
            continue;
        }
        sqlx::query("UPDATE product_stock SET availability = $1 WHERE id = $2")
            .bind(entry.availability.as_str())
            .bind(row_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            "INSERT INTO stock_history (product_id, size_id, old_availability, new_availability) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(product_db_id)
        .bind(entry.size_id)
        .bind(old_availability)
        .bind(entry.availability.as_str())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
