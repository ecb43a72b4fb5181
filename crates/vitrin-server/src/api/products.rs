use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vitrin_db::CatalogFilters;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct CatalogPage {
    items: Vec<CatalogItem>,
    total: i64,
    page: i64,
    per_page: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct CatalogItem {
    product_id: i64,
    name: String,
    price: i64,
    description: String,
    brand_name: String,
    color_count: i64,
    in_stock_count: i64,
    primary_image_url: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CatalogQuery {
    pub search: Option<String>,
    pub brand: Option<String>,
    pub category_id: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductDetail {
    product_id: i64,
    name: String,
    price: i64,
    description: String,
    brand_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    colors: Vec<ColorItem>,
    images: Vec<ImageItem>,
    sizes: Vec<SizeItem>,
    stock: Vec<StockItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct ColorItem {
    color_id: String,
    name: String,
    hex_code: Option<String>,
    price: Option<i64>,
    description: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ImageItem {
    url: String,
    media_type: String,
    kind: String,
    position: i32,
    color_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SizeItem {
    size_id: i64,
    name: String,
    availability: String,
    price: Option<i64>,
    sku: Option<i64>,
    color_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct StockItem {
    size_id: i64,
    name: String,
    availability: String,
    price: Option<i64>,
    sku: Option<i64>,
    color_name: Option<String>,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<CatalogPage>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(24).clamp(1, 100);
    let filters = CatalogFilters {
        search: query.search.as_deref(),
        brand: query.brand.as_deref(),
        category_id: query.category_id,
        page,
        per_page,
    };

    let rows = vitrin_db::list_catalog_products(&state.pool, &filters)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let total = vitrin_db::count_catalog_products(&state.pool, &filters)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let items = rows
        .into_iter()
        .map(|row| CatalogItem {
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            description: row.description,
            brand_name: row.brand_name,
            color_count: row.color_count,
            in_stock_count: row.in_stock_count,
            primary_image_url: row.primary_image_url,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data: CatalogPage {
            items,
            total,
            page,
            per_page,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<ProductDetail>>, ApiError> {
    let Some(product) = vitrin_db::get_product_by_upstream_id(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
    else {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("no product with id {product_id}"),
        ));
    };

    let colors = vitrin_db::list_product_colors(&state.pool, product.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let images = vitrin_db::list_product_images(&state.pool, product.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let sizes = vitrin_db::list_product_sizes(&state.pool, product.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let stock = vitrin_db::list_product_stock(&state.pool, product.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ProductDetail {
            product_id: product.product_id,
            name: product.name,
            price: product.price,
            description: product.description,
            brand_name: product.brand_name,
            created_at: product.created_at,
            updated_at: product.updated_at,
            colors: colors
                .into_iter()
                .map(|row| ColorItem {
                    color_id: row.color_id,
                    name: row.name,
                    hex_code: row.hex_code,
                    price: row.price,
                    description: row.description,
                })
                .collect(),
            images: images
                .into_iter()
                .map(|row| ImageItem {
                    url: row.url,
                    media_type: row.media_type,
                    kind: row.kind,
                    position: row.position,
                    color_name: row.color_name,
                })
                .collect(),
            sizes: sizes
                .into_iter()
                .map(|row| SizeItem {
                    size_id: row.size_id,
                    name: row.name,
                    availability: row.availability,
                    price: row.price,
                    sku: row.sku,
                    color_name: row.color_name,
                })
                .collect(),
            stock: stock
                .into_iter()
                .map(|row| StockItem {
                    size_id: row.size_id,
                    name: row.name,
                    availability: row.availability,
                    price: row.price,
                    sku: row.sku,
                    color_name: row.color_name,
                })
                .collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
