use serde::{Deserialize, Serialize};

/// Whether a size can currently be bought.
///
/// Both upstream sources collapse to exactly these two states: ZARA reports an
/// availability string, PULL&BEAR a boolean `isBuyable` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
}

impl Availability {
    /// Database/API representation: `"in_stock"` or `"out_of_stock"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::InStock => "in_stock",
            Availability::OutOfStock => "out_of_stock",
        }
    }

    /// Maps an upstream availability string; anything other than `"in_stock"`
    /// is treated as out of stock.
    #[must_use]
    pub fn from_upstream(s: &str) -> Self {
        if s == "in_stock" {
            Availability::InStock
        } else {
            Availability::OutOfStock
        }
    }

    #[must_use]
    pub fn from_buyable(is_buyable: bool) -> Self {
        if is_buyable {
            Availability::InStock
        } else {
            Availability::OutOfStock
        }
    }
}

/// A product normalized into the canonical shape, regardless of which upstream
/// source it was fetched from.
///
/// The per-color lists and the product-level aggregate lists both exist:
/// persistence writes colors with their children first, then the aggregates
/// with their color references mapped to database ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedProduct {
    /// Upstream numeric product id; globally unique across the store.
    pub id: i64,
    pub name: String,
    /// Minor-unit integer price; `0` when the payload carries none.
    pub price: i64,
    pub description: String,
    pub colors: Vec<NormalizedColor>,
    /// All images across colors, each tagged with its source color.
    pub images: Vec<NormalizedImage>,
    /// All sizes across colors, without per-size prices.
    pub sizes: Vec<NormalizedSize>,
    /// Size × availability × price entries across colors.
    pub stock: Vec<NormalizedStock>,
}

impl NormalizedProduct {
    /// Returns `true` when every image/size/stock entry that names a color id
    /// resolves to a color present in `colors`.
    ///
    /// Persistence relies on this to build the upstream-id → database-id color
    /// map; both normalizers must uphold it.
    #[must_use]
    pub fn color_references_resolve(&self) -> bool {
        let known = |id: &Option<String>| match id {
            Some(id) => self.colors.iter().any(|c| &c.id == id),
            None => true,
        };
        self.images.iter().all(|i| known(&i.color_id))
            && self.sizes.iter().all(|s| known(&s.color_id))
            && self.stock.iter().all(|s| known(&s.color_id))
    }

    /// Returns `true` if at least one stock entry is purchasable.
    #[must_use]
    pub fn has_stock(&self) -> bool {
        self.stock
            .iter()
            .any(|s| s.availability == Availability::InStock)
    }
}

/// One color variant of a product. Identity within a product is the upstream
/// `id` string; persistence matches existing colors by it and never duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedColor {
    pub id: String,
    pub name: String,
    pub hex_code: Option<String>,
    /// Minor-unit price; `None` means "inherit from the product".
    pub price: Option<i64>,
    pub description: String,
    pub images: Vec<NormalizedImage>,
    pub sizes: Vec<NormalizedSize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedImage {
    pub url: String,
    pub media_type: String,
    /// Upstream media kind, e.g. `"main"`, `"aux"`, or `"other"`.
    pub kind: String,
    /// 1-based display order within the color.
    pub position: i32,
    pub color_id: Option<String>,
    pub color_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSize {
    /// Upstream size id (ZARA) or SKU (PULL&BEAR).
    pub size_id: i64,
    pub name: String,
    pub availability: Availability,
    /// Minor-unit price; `None` means "inherit from the color or product".
    pub price: Option<i64>,
    pub sku: Option<i64>,
    pub color_id: Option<String>,
    pub color_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedStock {
    pub size_id: i64,
    pub name: String,
    pub availability: Availability,
    pub price: Option<i64>,
    pub sku: Option<i64>,
    pub color_id: Option<String>,
    pub color_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_image(color_id: Option<&str>) -> NormalizedImage {
        NormalizedImage {
            url: "https://static.example.net/photos/1.jpg".to_string(),
            media_type: "image".to_string(),
            kind: "main".to_string(),
            position: 1,
            color_id: color_id.map(str::to_string),
            color_name: color_id.map(|_| "Ecru".to_string()),
        }
    }

    fn make_stock(color_id: Option<&str>, availability: Availability) -> NormalizedStock {
        NormalizedStock {
            size_id: 101,
            name: "M".to_string(),
            availability,
            price: Some(179_500),
            sku: Some(441_020_101),
            color_id: color_id.map(str::to_string),
            color_name: color_id.map(|_| "Ecru".to_string()),
        }
    }

    fn make_product(colors: Vec<NormalizedColor>) -> NormalizedProduct {
        NormalizedProduct {
            id: 441_020,
            name: "Oversize Gömlek".to_string(),
            price: 179_500,
            description: String::new(),
            colors,
            images: vec![],
            sizes: vec![],
            stock: vec![],
        }
    }

    fn make_color(id: &str) -> NormalizedColor {
        NormalizedColor {
            id: id.to_string(),
            name: "Ecru".to_string(),
            hex_code: Some("#F5F0E8".to_string()),
            price: None,
            description: String::new(),
            images: vec![],
            sizes: vec![],
        }
    }

    #[test]
    fn availability_from_upstream_string() {
        assert_eq!(Availability::from_upstream("in_stock"), Availability::InStock);
        assert_eq!(
            Availability::from_upstream("out_of_stock"),
            Availability::OutOfStock
        );
        assert_eq!(
            Availability::from_upstream("coming_soon"),
            Availability::OutOfStock
        );
    }

    #[test]
    fn availability_serializes_snake_case() {
        let json = serde_json::to_string(&Availability::InStock).unwrap();
        assert_eq!(json, "\"in_stock\"");
    }

    #[test]
    fn color_references_resolve_with_no_references() {
        let product = make_product(vec![]);
        assert!(product.color_references_resolve());
    }

    #[test]
    fn color_references_resolve_when_all_match() {
        let mut product = make_product(vec![make_color("712")]);
        product.images.push(make_image(Some("712")));
        product
            .stock
            .push(make_stock(Some("712"), Availability::InStock));
        assert!(product.color_references_resolve());
    }

    #[test]
    fn color_references_do_not_resolve_for_unknown_color() {
        let mut product = make_product(vec![make_color("712")]);
        product.images.push(make_image(Some("999")));
        assert!(!product.color_references_resolve());
    }

    #[test]
    fn color_references_allow_untagged_entries() {
        let mut product = make_product(vec![]);
        product.images.push(make_image(None));
        product.stock.push(make_stock(None, Availability::OutOfStock));
        assert!(product.color_references_resolve());
    }

    #[test]
    fn has_stock_reflects_stock_entries() {
        let mut product = make_product(vec![make_color("712")]);
        assert!(!product.has_stock());
        product
            .stock
            .push(make_stock(Some("712"), Availability::OutOfStock));
        assert!(!product.has_stock());
        product
            .stock
            .push(make_stock(Some("712"), Availability::InStock));
        assert!(product.has_stock());
    }

    #[test]
    fn serde_roundtrip_product() {
        let mut product = make_product(vec![make_color("712")]);
        product.images.push(make_image(Some("712")));
        let json = serde_json::to_string(&product).expect("serialization failed");
        let decoded: NormalizedProduct =
            serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(decoded.id, product.id);
        assert_eq!(decoded.colors.len(), 1);
        assert_eq!(decoded.images[0].color_id.as_deref(), Some("712"));
    }
}
