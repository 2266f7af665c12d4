use serde::{Deserialize, Serialize};

/// Reference data describing a battery brand.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Brand {
    pub id: Option<u32>,
    pub name: String,
    pub category: String,
}

impl Brand {
    /// Used for references the catalog doesn't know about.
    pub fn uncategorized(reference: &str) -> Self {
        Self {
            id: None,
            name: reference.to_string(),
            category: "Uncategorized".to_string(),
        }
    }
}

/// Brand lookup. Facts store a brand reference (a catalog id or a name), which is resolved at
/// query time.
pub trait BrandCatalog: Send + Sync {
    fn brand(&self, reference: &str) -> Option<Brand>;

    fn brands(&self) -> Vec<Brand>;
}

/// A catalog held in memory, seeded with the predefined brands by default.
#[derive(Debug, Clone)]
pub struct StaticBrandCatalog {
    brands: Vec<Brand>,
}

const PREDEFINED: [(u32, &str, &str); 18] = [
    (1, "BOSCH", "International Premium"),
    (2, "Varta", "International Premium"),
    (3, "Optima", "International Premium"),
    (4, "ACDelco", "International Premium"),
    (5, "Interstate Batteries", "International Premium"),
    (6, "MAC", "Latin America"),
    (7, "Willard", "Latin America"),
    (8, "LTH", "Latin America"),
    (9, "Duncan", "Latin America"),
    (10, "Titan", "Latin America"),
    (11, "Exide", "International"),
    (12, "Yuasa", "International"),
    (13, "Amaron", "International"),
    (14, "Motorcraft", "OEM - Ford"),
    (15, "Moura", "International"),
    (16, "GS Yuasa", "Asian"),
    (17, "Panasonic", "Asian"),
    (18, "Rocket", "Asian"),
];

impl StaticBrandCatalog {
    pub fn new(brands: Vec<Brand>) -> Self {
        Self { brands }
    }
}

impl Default for StaticBrandCatalog {
    fn default() -> Self {
        Self::new(
            PREDEFINED
                .iter()
                .map(|(id, name, category)| Brand {
                    id: Some(*id),
                    name: name.to_string(),
                    category: category.to_string(),
                })
                .collect(),
        )
    }
}

impl BrandCatalog for StaticBrandCatalog {
    fn brand(&self, reference: &str) -> Option<Brand> {
        let reference = reference.trim();
        let id: Option<u32> = reference.parse().ok();

        self.brands
            .iter()
            .find(|brand| match id {
                Some(id) => brand.id == Some(id),
                None => brand.name.eq_ignore_ascii_case(reference),
            })
            .cloned()
    }

    fn brands(&self) -> Vec<Brand> {
        self.brands.clone()
    }
}
