use axum::{extract::State, Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct OverviewData {
    total_brands: i64,
    total_products: i64,
    total_categories: i64,
    total_users: i64,
    last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct BrandStatsItem {
    brand_name: String,
    product_count: i64,
    category_count: i64,
    color_count: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct StockData {
    totals: StockTotalsItem,
    by_brand: Vec<BrandStockItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct StockTotalsItem {
    total_records: i64,
    in_stock: i64,
    out_of_stock: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct BrandStockItem {
    brand_name: String,
    in_stock: i64,
    out_of_stock: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct SystemData {
    total_syncs: i64,
    successful_syncs: i64,
    failed_syncs: i64,
    last_sync_at: Option<DateTime<Utc>>,
    daily: Vec<DailySyncItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct DailySyncItem {
    day: NaiveDate,
    syncs: i64,
    success: i64,
    failed: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct HistoryData {
    total_price_changes: i64,
    total_stock_changes: i64,
    total_category_changes: i64,
    price_changes_30d: i64,
    stock_changes_30d: i64,
}

pub(super) async fn get_overview(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<OverviewData>>, ApiError> {
    let row = vitrin_db::get_overview_stats(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: OverviewData {
            total_brands: row.total_brands,
            total_products: row.total_products,
            total_categories: row.total_categories,
            total_users: row.total_users,
            last_sync_at: row.last_sync_at,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_brands(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<BrandStatsItem>>>, ApiError> {
    let rows = vitrin_db::list_brand_stats(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| BrandStatsItem {
            brand_name: row.brand_name,
            product_count: row.product_count,
            category_count: row.category_count,
            color_count: row.color_count,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_stock(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<StockData>>, ApiError> {
    let totals = vitrin_db::get_stock_totals(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let by_brand = vitrin_db::list_brand_stock(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: StockData {
            totals: StockTotalsItem {
                total_records: totals.total_records,
                in_stock: totals.in_stock,
                out_of_stock: totals.out_of_stock,
            },
            by_brand: by_brand
                .into_iter()
                .map(|row| BrandStockItem {
                    brand_name: row.brand_name,
                    in_stock: row.in_stock,
                    out_of_stock: row.out_of_stock,
                })
                .collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_system(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SystemData>>, ApiError> {
    let row = vitrin_db::get_system_stats(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let daily = vitrin_db::list_daily_syncs(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SystemData {
            total_syncs: row.total_syncs,
            successful_syncs: row.successful_syncs,
            failed_syncs: row.failed_syncs,
            last_sync_at: row.last_sync_at,
            daily: daily
                .into_iter()
                .map(|row| DailySyncItem {
                    day: row.day,
                    syncs: row.syncs,
                    success: row.success,
                    failed: row.failed,
                })
                .collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<HistoryData>>, ApiError> {
    let row = vitrin_db::get_history_stats(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: HistoryData {
            total_price_changes: row.total_price_changes,
            total_stock_changes: row.total_stock_changes,
            total_category_changes: row.total_category_changes,
            price_changes_30d: row.price_changes_30d,
            stock_changes_30d: row.stock_changes_30d,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
