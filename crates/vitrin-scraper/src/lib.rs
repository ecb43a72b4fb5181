//! Upstream retailer clients and the machinery that keeps them polite:
//! bounded-retry fetch, TTL caching, and per-source adaptive rate limiting.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod headers;
pub mod limiter;
mod payload;
pub mod pullbear;
pub mod zara;

pub use cache::TtlCache;
pub use error::ScrapeError;
pub use fetch::fetch_with_retry;
pub use limiter::{AdaptiveRateLimiter, LimiterStats};
pub use pullbear::PullBearClient;
pub use zara::ZaraClient;
