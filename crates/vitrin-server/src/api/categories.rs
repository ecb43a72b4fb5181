use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct CategoryItem {
    category_id: i64,
    category_name: String,
    brand: String,
    gender: String,
    product_count: Option<i32>,
    stored_count: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct CategoryQuery {
    pub brand: Option<String>,
}

pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<ApiResponse<Vec<CategoryItem>>>, ApiError> {
    let rows = vitrin_db::list_leaf_categories_with_counts(&state.pool, query.brand.as_deref())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| CategoryItem {
            category_id: row.category_id,
            category_name: row.category_name,
            brand: row.brand,
            gender: row.gender,
            product_count: row.product_count,
            stored_count: row.stored_count,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
