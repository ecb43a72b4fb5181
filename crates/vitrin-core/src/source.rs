use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One of the two fixed upstream retailer APIs.
///
/// Sources are not fungible: each has its own endpoint shapes, its own rate
/// profile, and its own limiter instance. Nothing in the pipeline treats them
/// interchangeably beyond the shared [`crate::NormalizedProduct`] output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Zara,
    PullBear,
}

/// Rate-limiter tuning for one source, matching how aggressively that API
/// tolerates concurrent traffic.
#[derive(Debug, Clone, Copy)]
pub struct RateProfile {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_concurrency: usize,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Zara, Source::PullBear];

    /// Brand string as stored in the database (`brand_name`, `sub_categories.brand`).
    #[must_use]
    pub fn brand_name(self) -> &'static str {
        match self {
            Source::Zara => "ZARA",
            Source::PullBear => "PULL&BEAR",
        }
    }

    /// Short identifier used in cache keys and CLI arguments.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Source::Zara => "zara",
            Source::PullBear => "pullbear",
        }
    }

    /// Resolves a brand string from the database back to its source.
    #[must_use]
    pub fn from_brand_name(name: &str) -> Option<Self> {
        match name {
            "ZARA" => Some(Source::Zara),
            "PULL&BEAR" => Some(Source::PullBear),
            _ => None,
        }
    }

    /// PULL&BEAR tolerates noticeably less pressure than ZARA, hence the
    /// longer delays and lower concurrency.
    #[must_use]
    pub fn rate_profile(self) -> RateProfile {
        match self {
            Source::Zara => RateProfile {
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(10),
                backoff_multiplier: 2.0,
                max_concurrency: 8,
            },
            Source::PullBear => RateProfile {
                initial_delay: Duration::from_millis(800),
                max_delay: Duration::from_secs(15),
                backoff_multiplier: 2.5,
                max_concurrency: 6,
            },
        }
    }

    /// Cache key for a normalized product detail.
    #[must_use]
    pub fn product_cache_key(self, product_id: i64) -> String {
        format!("product:{}:{product_id}", self.slug())
    }

    /// Cache key for a category's product-id listing.
    #[must_use]
    pub fn listing_cache_key(self, category_id: i64) -> String {
        format!("listing:{}:{category_id}", self.slug())
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.brand_name())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zara" => Ok(Source::Zara),
            "pullbear" => Ok(Source::PullBear),
            other => Err(format!("unknown source '{other}' (expected zara or pullbear)")),
        }
    }
}
