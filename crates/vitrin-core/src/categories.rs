//! Category-tree export parsing for the `import-categories` command.
//!
//! The export is a brand/category JSON dump with arbitrarily nested
//! subcategories. Flattening walks the tree with an explicit stack so a deep
//! tree cannot overflow the call stack; the output order guarantees a parent
//! subcategory always precedes its children, which lets the importer insert
//! rows in a single pass.

use serde::Deserialize;

/// Top level of the category export file.
#[derive(Debug, Deserialize)]
pub struct CategoryExport {
    pub brands: Vec<BrandExport>,
}

#[derive(Debug, Deserialize)]
pub struct BrandExport {
    pub id: serde_json::Value,
    pub brand: String,
    #[serde(default, rename = "mainCategories")]
    pub main_categories: Vec<MainCategoryExport>,
}

#[derive(Debug, Deserialize)]
pub struct MainCategoryExport {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<SubCategoryNode>,
}

#[derive(Debug, Deserialize)]
pub struct SubCategoryNode {
    #[serde(default, rename = "categoryId")]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, rename = "categoryName")]
    pub category_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, rename = "isLeaf")]
    pub is_leaf: bool,
    #[serde(default, rename = "matchingId")]
    pub matching_id: Option<i64>,
    #[serde(default, rename = "productCount")]
    pub product_count: Option<i32>,
    #[serde(default)]
    pub subcategories: Vec<SubCategoryNode>,
}

impl SubCategoryNode {
    fn resolved_id(&self) -> i64 {
        self.category_id.or(self.id).unwrap_or(0)
    }
}

/// One subcategory row ready to upsert, with its tree position resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatCategory {
    pub category_id: i64,
    pub category_name: String,
    pub brand: String,
    pub gender: String,
    pub level: i32,
    pub is_leaf: bool,
    pub matching_id: Option<i64>,
    pub product_count: Option<i32>,
    pub parent_category_id: i64,
    pub parent_sub_category_id: Option<i64>,
}

/// Flattens one main category's subtree, depth first, parents before children.
#[must_use]
pub fn flatten_subtree(
    main: &MainCategoryExport,
    brand_name: &str,
) -> Vec<FlatCategory> {
    let main_gender = main.gender.as_deref().unwrap_or("UNKNOWN");
    let mut out = Vec::new();

    // (node, parent subcategory id, level); siblings pushed in reverse so the
    // pop order matches the document order.
    let mut stack: Vec<(&SubCategoryNode, Option<i64>, i32)> = Vec::new();
    for node in main.subcategories.iter().rev() {
        stack.push((node, None, 1));
    }

    while let Some((node, parent_sub_id, level)) = stack.pop() {
        let category_id = node.resolved_id();
        let category_name = node
            .category_name
            .clone()
            .or_else(|| node.name.clone())
            .unwrap_or_else(|| format!("cat-{category_id}"));

        out.push(FlatCategory {
            category_id,
            category_name,
            brand: brand_name.to_string(),
            gender: node
                .gender
                .clone()
                .unwrap_or_else(|| main_gender.to_string()),
            level,
            is_leaf: node.is_leaf,
            matching_id: node.matching_id,
            product_count: node.product_count,
            parent_category_id: main.id,
            parent_sub_category_id: parent_sub_id,
        });

        for child in node.subcategories.iter().rev() {
            stack.push((child, Some(category_id), level + 1));
        }
    }

    out
}

/// Flattens the full export: every brand's every main-category subtree in
/// document order.
#[must_use]
pub fn flatten_category_export(export: &CategoryExport) -> Vec<FlatCategory> {
    let mut out = Vec::new();
    for brand in &export.brands {
        for main in &brand.main_categories {
            out.extend(flatten_subtree(main, &brand.brand));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> CategoryExport {
        serde_json::from_str(json).expect("export parse failed")
    }

    const NESTED_EXPORT: &str = r#"{
        "brands": [{
            "id": "1",
            "brand": "ZARA",
            "mainCategories": [{
                "id": 100,
                "name": "WOMAN",
                "gender": "WOMEN",
                "subcategories": [
                    {
                        "categoryId": 10,
                        "categoryName": "Giyim",
                        "isLeaf": false,
                        "subcategories": [
                            {
                                "categoryId": 11,
                                "categoryName": "Elbise",
                                "isLeaf": true,
                                "productCount": 240
                            },
                            {
                                "categoryId": 12,
                                "categoryName": "Gömlek",
                                "isLeaf": true,
                                "productCount": 130
                            }
                        ]
                    },
                    { "categoryId": 20, "categoryName": "Aksesuar", "isLeaf": true }
                ]
            }]
        }]
    }"#;

    #[test]
    fn flatten_preserves_document_order_parents_first() {
        let export = parse(NESTED_EXPORT);
        let flat = flatten_category_export(&export);

        let ids: Vec<i64> = flat.iter().map(|c| c.category_id).collect();
        assert_eq!(ids, vec![10, 11, 12, 20]);

        let child = flat.iter().find(|c| c.category_id == 11).unwrap();
        assert_eq!(child.parent_sub_category_id, Some(10));
        assert_eq!(child.level, 2);
        assert_eq!(child.parent_category_id, 100);
        assert_eq!(child.product_count, Some(240));

        let root = flat.iter().find(|c| c.category_id == 10).unwrap();
        assert_eq!(root.parent_sub_category_id, None);
        assert_eq!(root.level, 1);
        assert!(!root.is_leaf);
    }

    #[test]
    fn flatten_inherits_gender_from_main_category() {
        let export = parse(NESTED_EXPORT);
        let flat = flatten_category_export(&export);
        assert!(flat.iter().all(|c| c.gender == "WOMEN"));
        assert!(flat.iter().all(|c| c.brand == "ZARA"));
    }

    #[test]
    fn flatten_handles_deep_chains() {
        // Far deeper than serde_json's own recursion limit allows via JSON;
        // the walk itself must stay iterative.
        let mut node = SubCategoryNode {
            category_id: Some(0),
            id: None,
            category_name: Some("n0".to_string()),
            name: None,
            gender: None,
            is_leaf: true,
            matching_id: None,
            product_count: None,
            subcategories: vec![],
        };
        for i in 1..2_000 {
            node = SubCategoryNode {
                category_id: Some(i),
                id: None,
                category_name: Some(format!("n{i}")),
                name: None,
                gender: None,
                is_leaf: false,
                matching_id: None,
                product_count: None,
                subcategories: vec![node],
            };
        }
        let main = MainCategoryExport {
            id: 1,
            name: None,
            gender: Some("MEN".to_string()),
            subcategories: vec![node],
        };

        let flat = flatten_subtree(&main, "ZARA");
        assert_eq!(flat.len(), 2_000);
        assert_eq!(flat[0].level, 1);
        assert_eq!(flat[1_999].level, 2_000);
        assert_eq!(flat[1_999].category_id, 0);
    }

    #[test]
    fn flatten_falls_back_to_id_and_synthesized_name() {
        let export = parse(
            r#"{"brands":[{"id":2,"brand":"PULL&BEAR","mainCategories":[{
                "id": 0,
                "subcategories": [{"id": 77, "isLeaf": true}]
            }]}]}"#,
        );
        let flat = flatten_category_export(&export);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].category_id, 77);
        assert_eq!(flat[0].category_name, "cat-77");
        assert_eq!(flat[0].gender, "UNKNOWN");
    }
}
