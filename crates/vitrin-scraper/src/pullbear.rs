//! PULL&BEAR client: product-detail fetch + normalization and category
//! product-id discovery.
//!
//! The itxrest detail payload nests everything under
//! `bundleProductSummaries[0].detail`. Prices arrive as strings, availability
//! as an `isBuyable` flag, and image URLs have to be synthesized from a
//! photo-path template. Detail fetches go through the per-source rate
//! limiter; listing discovery does not.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use vitrin_core::product::{
    Availability, NormalizedColor, NormalizedImage, NormalizedProduct, NormalizedSize,
    NormalizedStock,
};
use vitrin_core::source::Source;

use crate::cache::TtlCache;
use crate::error::ScrapeError;
use crate::fetch::fetch_with_retry;
use crate::headers::request_headers;
use crate::limiter::AdaptiveRateLimiter;
use crate::payload::{parse_price, UpstreamId};

const REFERER: &str = "https://www.pullandbear.com/";
/// Photo CDN prefix; image URLs are not present in the payload and must be
/// assembled from the color's photo path, frame number, and cache-buster.
const IMAGE_BASE: &str = "https://static.pullandbear.net/2/photos";

pub struct PullBearClient {
    http: Client,
    base_url: String,
    limiter: Arc<AdaptiveRateLimiter>,
    cache: Arc<TtlCache<NormalizedProduct>>,
    cache_ttl: Duration,
    max_retries: u32,
}

impl PullBearClient {
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: impl Into<String>,
        http_timeout: Duration,
        max_retries: u32,
        cache: Arc<TtlCache<NormalizedProduct>>,
        cache_ttl: Duration,
    ) -> Result<Self, ScrapeError> {
        let http = Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            limiter: Arc::new(AdaptiveRateLimiter::for_source(Source::PullBear)),
            cache,
            cache_ttl,
            max_retries,
        })
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<AdaptiveRateLimiter> {
        &self.limiter
    }

    /// Fetches and normalizes one product, serving from cache when possible.
    ///
    /// Returns `Ok(None)` when the payload is null, has no bundle detail, or
    /// carries no colors.
    ///
    /// # Errors
    ///
    /// Network exhaustion, a non-success final status, or an undecodable body.
    pub async fn fetch_product(
        &self,
        product_id: i64,
    ) -> Result<Option<NormalizedProduct>, ScrapeError> {
        let cache_key = Source::PullBear.product_cache_key(product_id);
        if let Some(cached) = self.cache.get(&cache_key).await {
            tracing::debug!(product_id, "PULL&BEAR product served from cache");
            return Ok(Some(cached));
        }

        let url = format!(
            "{}/itxrest/2/catalog/store/25009521/20309457/category/0/product/{product_id}/detail?languageId=-43&appId=1",
            self.base_url
        );
        let payload = self
            .limiter
            .execute(|| async {
                let response =
                    fetch_with_retry(&self.http, &url, request_headers(REFERER), self.max_retries)
                        .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ScrapeError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.clone(),
                    });
                }
                let body = response.text().await?;
                serde_json::from_str::<Option<ProductPayload>>(&body).map_err(|source| {
                    ScrapeError::Deserialize {
                        context: format!("PULL&BEAR product {product_id}"),
                        source,
                    }
                })
            })
            .await?;

        let Some(product) = payload.and_then(normalize) else {
            tracing::debug!(product_id, "PULL&BEAR payload had no usable detail");
            return Ok(None);
        };

        self.cache
            .set(cache_key, product.clone(), self.cache_ttl)
            .await;
        Ok(Some(product))
    }

    /// Discovers the product ids listed under a category, with the same
    /// semantic empty-listing retry as the ZARA client.
    ///
    /// # Errors
    ///
    /// Network exhaustion, a non-success final status, or an undecodable body.
    pub async fn fetch_product_ids(
        &self,
        category_id: i64,
        max_attempts: u32,
    ) -> Result<Vec<i64>, ScrapeError> {
        let url = format!(
            "{}/itxrest/3/catalog/store/25009521/20309457/category/{category_id}/product?languageId=-43&appId=1",
            self.base_url
        );
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let ids = self.fetch_listing(&url, category_id).await?;
            if !ids.is_empty() || attempt >= max_attempts {
                return Ok(ids);
            }
            tracing::warn!(category_id, attempt, "empty PULL&BEAR listing, will retry");
            tokio::time::sleep(Duration::from_secs(2) * attempt).await;
        }
    }

    async fn fetch_listing(&self, url: &str, category_id: i64) -> Result<Vec<i64>, ScrapeError> {
        let response =
            fetch_with_retry(&self.http, url, request_headers(REFERER), self.max_retries).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        let listing: ListingPayload =
            serde_json::from_str(&body).map_err(|source| ScrapeError::Deserialize {
                context: format!("PULL&BEAR listing for category {category_id}"),
                source,
            })?;
        Ok(listing.product_ids)
    }
}

#[derive(Debug, Deserialize)]
struct ProductPayload {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "bundleProductSummaries")]
    bundle_product_summaries: Vec<BundleSummary>,
}

#[derive(Debug, Deserialize)]
struct BundleSummary {
    #[serde(default)]
    detail: Option<BundleDetail>,
}

#[derive(Debug, Deserialize)]
struct BundleDetail {
    #[serde(default, rename = "longDescription")]
    long_description: Option<String>,
    #[serde(default)]
    colors: Vec<ColorPayload>,
}

#[derive(Debug, Deserialize)]
struct ColorPayload {
    #[serde(default)]
    id: Option<UpstreamId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<ImagePayload>,
    #[serde(default)]
    sizes: Vec<SizePayload>,
}

#[derive(Debug, Deserialize)]
struct ImagePayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    timestamp: Option<UpstreamId>,
    #[serde(default)]
    aux: Vec<UpstreamId>,
}

#[derive(Debug, Deserialize)]
struct SizePayload {
    #[serde(default)]
    sku: Option<i64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "isBuyable")]
    is_buyable: bool,
    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingPayload {
    #[serde(default, rename = "productIds")]
    product_ids: Vec<i64>,
}

fn photo_url(path: &str, frame: &str, timestamp: &str) -> String {
    format!("{IMAGE_BASE}{path}_{frame}_1_8.jpg?t={timestamp}")
}

/// Maps the raw payload onto the canonical product shape. Returns `None` when
/// the product id, bundle detail, or colors are missing.
fn normalize(payload: ProductPayload) -> Option<NormalizedProduct> {
    let id = payload.id?;
    let detail = payload
        .bundle_product_summaries
        .into_iter()
        .next()
        .and_then(|b| b.detail)?;
    if detail.colors.is_empty() {
        return None;
    }

    let description = detail.long_description.unwrap_or_default();
    // Top-level price mirrors the first size of the first color.
    let price = detail.colors[0]
        .sizes
        .first()
        .and_then(|s| s.price.as_deref())
        .and_then(parse_price)
        .unwrap_or(0);

    let mut product = NormalizedProduct {
        id,
        name: payload.name.unwrap_or_default(),
        price,
        description: description.clone(),
        colors: Vec::new(),
        images: Vec::new(),
        sizes: Vec::new(),
        stock: Vec::new(),
    };

    for color in detail.colors {
        let ref_id = color.id.as_ref().map(UpstreamId::to_key);
        let ref_name = color.name.clone();
        let color_price = color
            .sizes
            .first()
            .and_then(|s| s.price.as_deref())
            .and_then(parse_price);

        let mut color_data = NormalizedColor {
            id: ref_id.clone().unwrap_or_default(),
            name: color.name.unwrap_or_default(),
            // The payload carries no hex codes.
            hex_code: None,
            price: color_price,
            description: description.clone(),
            images: Vec::new(),
            sizes: Vec::new(),
        };

        if let Some(image) = color.image {
            if let Some(path) = image.url {
                let timestamp = image
                    .timestamp
                    .as_ref()
                    .map(UpstreamId::to_key)
                    .unwrap_or_default();
                let main = NormalizedImage {
                    url: photo_url(&path, "1", &timestamp),
                    media_type: "image".to_string(),
                    kind: "main".to_string(),
                    position: 1,
                    color_id: ref_id.clone(),
                    color_name: ref_name.clone(),
                };
                color_data.images.push(main.clone());
                product.images.push(main);

                for (index, frame) in image.aux.iter().enumerate() {
                    let position = i32::try_from(index + 2).unwrap_or(i32::MAX);
                    let aux = NormalizedImage {
                        url: photo_url(&path, &frame.to_key(), &timestamp),
                        media_type: "image".to_string(),
                        kind: "aux".to_string(),
                        position,
                        color_id: ref_id.clone(),
                        color_name: ref_name.clone(),
                    };
                    color_data.images.push(aux.clone());
                    product.images.push(aux);
                }
            }
        }

        for size in color.sizes {
            let size_id = size.sku.unwrap_or(0);
            let name = size.name.unwrap_or_default();
            let availability = Availability::from_buyable(size.is_buyable);
            let own_price = size.price.as_deref().and_then(parse_price);
            let sku = size.sku.filter(|&s| s != 0);

            color_data.sizes.push(NormalizedSize {
                size_id,
                name: name.clone(),
                availability,
                price: own_price.or(color_price),
                sku,
                color_id: ref_id.clone(),
                color_name: ref_name.clone(),
            });
            product.sizes.push(NormalizedSize {
                size_id,
                name: name.clone(),
                availability,
                price: None,
                sku: None,
                color_id: ref_id.clone(),
                color_name: ref_name.clone(),
            });
            // Stock entries keep only the size's own price; a size without
            // one stays None rather than inheriting.
            product.stock.push(NormalizedStock {
                size_id,
                name,
                availability,
                price: own_price,
                sku,
                color_id: ref_id.clone(),
                color_name: ref_name.clone(),
            });
        }

        product.colors.push(color_data);
    }

    Some(product)
}

#[cfg(test)]
#[path = "pullbear_test.rs"]
mod pullbear_test;
