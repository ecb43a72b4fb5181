//! ZARA client: product-detail fetch + normalization and category product-id
//! discovery.
//!
//! The detail endpoint answers with an array-wrapped payload; colors live
//! under `detail.colors`, each carrying `xmedia` entries and a size list.
//! Detail fetches go through the per-source rate limiter; listing discovery
//! does not — it is a handful of calls per run, not thousands.

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
use crate::payload::UpstreamId;

const REFERER: &str = "https://www.zara.com/";

pub struct ZaraClient {
    http: Client,
    base_url: String,
    limiter: Arc<AdaptiveRateLimiter>,
    cache: Arc<TtlCache<NormalizedProduct>>,
    cache_ttl: Duration,
    max_retries: u32,
}

impl ZaraClient {
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
            limiter: Arc::new(AdaptiveRateLimiter::for_source(Source::Zara)),
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
    /// Returns `Ok(None)` when the upstream payload is empty or carries no
    /// colors — the product does not exist in a usable form.
    ///
    /// # Errors
    ///
    /// Network exhaustion, a non-success final status, or an undecodable body.
    pub async fn fetch_product(
        &self,
        product_id: i64,
    ) -> Result<Option<NormalizedProduct>, ScrapeError> {
        let cache_key = Source::Zara.product_cache_key(product_id);
        if let Some(cached) = self.cache.get(&cache_key).await {
            tracing::debug!(product_id, "ZARA product served from cache");
            return Ok(Some(cached));
        }

        let url = format!(
            "{}/products-details?productIds={product_id}&ajax=true",
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
                serde_json::from_str::<Vec<ProductPayload>>(&body).map_err(|source| {
                    ScrapeError::Deserialize {
                        context: format!("ZARA product {product_id}"),
                        source,
                    }
                })
            })
            .await?;

        let Some(first) = payload.into_iter().next() else {
            tracing::debug!(product_id, "ZARA payload was an empty array");
            return Ok(None);
        };
        let Some(product) = normalize(first) else {
            tracing::debug!(product_id, "ZARA payload had no detail colors");
            return Ok(None);
        };

        self.cache
            .set(cache_key, product.clone(), self.cache_ttl)
            .await;
        Ok(Some(product))
    }

    /// Discovers the product ids listed under a category.
    ///
    /// An empty listing is retried up to `max_attempts` times with a growing
    /// inter-attempt delay; this is a semantic retry on top of the HTTP-level
    /// one, for the upstream's habit of answering valid-but-empty.
    ///
    /// # Errors
    ///
    /// Network exhaustion, a non-success final status, or an undecodable body.
    pub async fn fetch_product_ids(
        &self,
        category_id: i64,
        max_attempts: u32,
    ) -> Result<Vec<i64>, ScrapeError> {
        let url = format!("{}/category/{category_id}/products?ajax=true", self.base_url);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let ids = self.fetch_listing(&url, category_id).await?;
            if !ids.is_empty() || attempt >= max_attempts {
                return Ok(ids);
            }
            tracing::warn!(category_id, attempt, "empty ZARA listing, will retry");
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
                context: format!("ZARA listing for category {category_id}"),
                source,
            })?;
        Ok(listing.products.into_iter().map(|p| p.id).collect())
    }
}

#[derive(Debug, Deserialize)]
struct ProductPayload {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    detail: Option<DetailPayload>,
}

#[derive(Debug, Deserialize)]
struct DetailPayload {
    #[serde(default)]
    colors: Vec<ColorPayload>,
}

#[derive(Debug, Deserialize)]
struct ColorPayload {
    #[serde(default)]
    id: Option<UpstreamId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "hexCode")]
    hex_code: Option<String>,
    #[serde(default)]
    price: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    xmedia: Vec<MediaPayload>,
    #[serde(default)]
    sizes: Vec<SizePayload>,
}

#[derive(Debug, Deserialize)]
struct MediaPayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "type")]
    media_type: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    order: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct SizePayload {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    availability: Option<String>,
    #[serde(default)]
    price: Option<i64>,
    #[serde(default)]
    sku: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListingPayload {
    #[serde(default)]
    products: Vec<ListingEntry>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    id: i64,
}

/// Maps the raw payload onto the canonical product shape. Returns `None` when
/// there is no detail or no colors to work with.
fn normalize(payload: ProductPayload) -> Option<NormalizedProduct> {
    let detail = payload.detail?;
    if detail.colors.is_empty() {
        return None;
    }

    // Top-level price and description mirror the first color.
    let first = &detail.colors[0];
    let mut product = NormalizedProduct {
        id: payload.id,
        name: payload.name.unwrap_or_default(),
        price: first.price.unwrap_or(0),
        description: first.description.clone().unwrap_or_default(),
        colors: Vec::new(),
        images: Vec::new(),
        sizes: Vec::new(),
        stock: Vec::new(),
    };

    for color in detail.colors {
        let ref_id = color.id.as_ref().map(UpstreamId::to_key);
        let ref_name = color.name.clone();
        let color_price = color.price.filter(|&p| p != 0);

        let mut color_data = NormalizedColor {
            id: ref_id.clone().unwrap_or_default(),
            name: color.name.unwrap_or_default(),
            hex_code: color.hex_code,
            price: color_price,
            description: color.description.unwrap_or_default(),
            images: Vec::new(),
            sizes: Vec::new(),
        };

        for (index, media) in color.xmedia.into_iter().enumerate() {
            // Videos and other media kinds are skipped outright.
            if media.media_type.as_deref() != Some("image") {
                continue;
            }
            let Some(url) = media.url else { continue };
            let fallback = i32::try_from(index + 1).unwrap_or(i32::MAX);
            let image = NormalizedImage {
                url,
                media_type: "image".to_string(),
                kind: media
                    .kind
                    .filter(|k| !k.is_empty())
                    .unwrap_or_else(|| "other".to_string()),
                position: media.order.filter(|&o| o != 0).unwrap_or(fallback),
                color_id: ref_id.clone(),
                color_name: ref_name.clone(),
            };
            color_data.images.push(image.clone());
            product.images.push(image);
        }

        for size in color.sizes {
            let size_id = size.id.unwrap_or(0);
            let name = size.name.unwrap_or_default();
            let availability = size
                .availability
                .as_deref()
                .map_or(Availability::OutOfStock, Availability::from_upstream);
            let price = size.price.filter(|&p| p != 0).or(color_price);
            let sku = size.sku.filter(|&s| s != 0);

            color_data.sizes.push(NormalizedSize {
                size_id,
                name: name.clone(),
                availability,
                price,
                sku,
                color_id: ref_id.clone(),
                color_name: ref_name.clone(),
            });
            // The aggregate size list carries no price; prices live on the
            // per-color sizes and the stock entries.
            product.sizes.push(NormalizedSize {
                size_id,
                name: name.clone(),
                availability,
                price: None,
                sku: None,
                color_id: ref_id.clone(),
                color_name: ref_name.clone(),
            });
            product.stock.push(NormalizedStock {
                size_id,
                name,
                availability,
                price,
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
#[path = "zara_test.rs"]
mod zara_test;
