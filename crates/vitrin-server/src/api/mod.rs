mod categories;
mod products;
mod stats;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &vitrin_db::DbError) -> ApiError {
    match error {
        vitrin_db::DbError::NotFound => ApiError::new(request_id, "not_found", "record not found"),
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    // Read-only API, so only GET is exposed.
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/stats/overview", get(stats::get_overview))
        .route("/api/v1/stats/brands", get(stats::list_brands))
        .route("/api/v1/stats/stock", get(stats::get_stock))
        .route("/api/v1/stats/system", get(stats::get_system))
        .route("/api/v1/stats/history", get(stats::get_history))
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/products/{product_id}", get(products::get_product))
        .route("/api/v1/categories", get(categories::list_categories))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match vitrin_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;
    use vitrin_core::{
        Availability, NormalizedColor, NormalizedImage, NormalizedProduct, NormalizedSize,
        NormalizedStock,
    };

    #[test]
    fn api_error_not_found_maps_to_404() {
        let response = ApiError::new("req-1", "not_found", "missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn api_error_unknown_code_maps_to_500() {
        let response = ApiError::new("req-1", "internal_error", "boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn map_db_error_distinguishes_not_found() {
        let err = map_db_error("req-1".to_string(), &vitrin_db::DbError::NotFound);
        assert_eq!(err.error.code, "not_found");
        let err = map_db_error("req-1".to_string(), &vitrin_db::DbError::MissingDatabaseUrl);
        assert_eq!(err.error.code, "internal_error");
    }

    async fn seed_category(pool: &sqlx::PgPool, category_id: i64, count: Option<i32>) -> i64 {
        vitrin_db::upsert_brand(pool, "zara", "ZARA")
            .await
            .expect("brand");
        vitrin_db::upsert_main_category(pool, 100, "WOMAN", "WOMEN", "zara")
            .await
            .expect("main category");
        vitrin_db::upsert_sub_category(
            pool,
            &vitrin_core::FlatCategory {
                category_id,
                category_name: format!("cat-{category_id}"),
                brand: "ZARA".to_string(),
                gender: "WOMEN".to_string(),
                level: 1,
                is_leaf: true,
                matching_id: None,
                product_count: count,
                parent_category_id: 100,
                parent_sub_category_id: None,
            },
        )
        .await
        .expect("sub category");
        vitrin_db::get_sub_category(pool, category_id)
            .await
            .expect("lookup")
            .expect("row")
            .id
    }

    fn sample_product(upstream_id: i64, name: &str) -> NormalizedProduct {
        let color_id = Some("712".to_string());
        let color_name = Some("Ekru".to_string());
        NormalizedProduct {
            id: upstream_id,
            name: name.to_string(),
            price: 109_900,
            description: "Oversize Gömlek".to_string(),
            colors: vec![NormalizedColor {
                id: "712".to_string(),
                name: "Ekru".to_string(),
                hex_code: Some("#F5F0E1".to_string()),
                price: Some(109_900),
                description: "Oversize Gömlek".to_string(),
                images: vec![],
                sizes: vec![],
            }],
            images: vec![NormalizedImage {
                url: "https://static.example.net/p/712.jpg".to_string(),
                media_type: "image".to_string(),
                kind: "full".to_string(),
                position: 1,
                color_id: color_id.clone(),
                color_name: color_name.clone(),
            }],
            sizes: vec![NormalizedSize {
                size_id: 1,
                name: "M".to_string(),
                availability: Availability::InStock,
                price: None,
                sku: None,
                color_id: color_id.clone(),
                color_name: color_name.clone(),
            }],
            stock: vec![NormalizedStock {
                size_id: 1,
                name: "M".to_string(),
                availability: Availability::InStock,
                price: Some(109_900),
                sku: Some(7_120_001),
                color_id,
                color_name,
            }],
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        (status, json)
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_ok_with_live_database(pool: sqlx::PgPool) {
        let app = build_app(AppState { pool });
        let (status, json) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"].as_str(), Some("ok"));
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn product_list_and_detail_round_trip(pool: sqlx::PgPool) {
        let sub_id = seed_category(&pool, 8010, Some(2)).await;
        vitrin_db::persist_product(&pool, &sample_product(441_020, "Gömlek"), "ZARA", sub_id, false)
            .await
            .expect("persist");

        let app = build_app(AppState { pool });

        let (status, json) = get_json(app.clone(), "/api/v1/products?brand=ZARA").await;
        assert_eq!(status, StatusCode::OK);
        let items = json["data"]["items"].as_array().expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["product_id"].as_i64(), Some(441_020));
        assert_eq!(items[0]["color_count"].as_i64(), Some(1));
        assert_eq!(json["data"]["total"].as_i64(), Some(1));

        let (status, json) = get_json(app, "/api/v1/products/441020").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["name"].as_str(), Some("Gömlek"));
        assert_eq!(
            json["data"]["colors"][0]["color_id"].as_str(),
            Some("712")
        );
        assert_eq!(
            json["data"]["stock"][0]["availability"].as_str(),
            Some("in_stock")
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn product_detail_unknown_id_is_404(pool: sqlx::PgPool) {
        let app = build_app(AppState { pool });
        let (status, json) = get_json(app, "/api/v1/products/999999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"].as_str(), Some("not_found"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn categories_report_stored_counts(pool: sqlx::PgPool) {
        let sub_id = seed_category(&pool, 8010, Some(5)).await;
        vitrin_db::persist_product(&pool, &sample_product(441_020, "Gömlek"), "ZARA", sub_id, false)
            .await
            .expect("persist");

        let app = build_app(AppState { pool });
        let (status, json) = get_json(app, "/api/v1/categories?brand=ZARA").await;
        assert_eq!(status, StatusCode::OK);
        let rows = json["data"].as_array().expect("data array");
        let row = rows
            .iter()
            .find(|r| r["category_id"].as_i64() == Some(8010))
            .expect("category row");
        assert_eq!(row["product_count"].as_i64(), Some(5));
        assert_eq!(row["stored_count"].as_i64(), Some(1));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn stats_overview_counts_entities(pool: sqlx::PgPool) {
        let sub_id = seed_category(&pool, 8010, Some(1)).await;
        vitrin_db::persist_product(&pool, &sample_product(441_020, "Gömlek"), "ZARA", sub_id, false)
            .await
            .expect("persist");

        let (status, json) = get_json(build_app_for(&pool), "/api/v1/stats/overview").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["total_brands"].as_i64(), Some(1));
        assert_eq!(json["data"]["total_products"].as_i64(), Some(1));

        let (status, json) = get_json(build_app_for(&pool), "/api/v1/stats/brands").await;
        assert_eq!(status, StatusCode::OK);
        let brands = json["data"].as_array().expect("brand stats");
        assert_eq!(brands[0]["brand_name"].as_str(), Some("ZARA"));
        assert_eq!(brands[0]["product_count"].as_i64(), Some(1));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn stats_stock_and_history_endpoints_respond(pool: sqlx::PgPool) {
        let sub_id = seed_category(&pool, 8010, Some(1)).await;
        vitrin_db::persist_product(&pool, &sample_product(441_020, "Gömlek"), "ZARA", sub_id, false)
            .await
            .expect("persist");

        let (status, json) = get_json(build_app_for(&pool), "/api/v1/stats/stock").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["totals"]["in_stock"].as_i64(), Some(1));
        assert_eq!(
            json["data"]["by_brand"][0]["brand_name"].as_str(),
            Some("ZARA")
        );

        let (status, json) = get_json(build_app_for(&pool), "/api/v1/stats/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["total_price_changes"].as_i64(), Some(0));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn stats_system_includes_daily_activity(pool: sqlx::PgPool) {
        let run = vitrin_db::create_sync_run(&pool, "full").await.expect("run");
        vitrin_db::complete_sync_run(&pool, run.id, 10, 0)
            .await
            .expect("complete");

        let (status, json) = get_json(build_app_for(&pool), "/api/v1/stats/system").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["total_syncs"].as_i64(), Some(1));
        assert_eq!(json["data"]["successful_syncs"].as_i64(), Some(1));
        let daily = json["data"]["daily"].as_array().expect("daily");
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0]["syncs"].as_i64(), Some(1));
    }

    fn build_app_for(pool: &sqlx::PgPool) -> Router {
        build_app(AppState { pool: pool.clone() })
    }
}
