//! Static billing catalog
//!
//! Features and products are fixed at build time and mirrored to the
//! billing provider out of band. Product ids are what the attach endpoint
//! forwards upstream.

use crate::error::{Result, StudySphereError};
use serde::Serialize;
use std::collections::HashSet;

/// How a feature is metered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Consumed per use against an allowance
    SingleUse,
    /// On or off
    Boolean,
}

/// Billing interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    /// Monthly
    Month,
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interval::Month => write!(f, "month"),
        }
    }
}

/// A metered or boolean capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    /// Stable id
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Metering kind
    #[serde(rename = "type")]
    pub kind: FeatureKind,
}

/// Line item of a product
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductItem {
    /// Recurring price in USD
    Price {
        /// Amount
        price: f64,
        /// Billing interval
        interval: Interval,
    },
    /// Feature grant, with an allowance for single-use features
    Feature {
        /// Granted feature
        feature_id: &'static str,
        /// Allowance per interval
        #[serde(skip_serializing_if = "Option::is_none")]
        included_usage: Option<u32>,
        /// Allowance reset interval
        #[serde(skip_serializing_if = "Option::is_none")]
        interval: Option<Interval>,
    },
}

/// A purchasable plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    /// Stable id, e.g. `study_pro`
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Assigned to every new customer
    pub is_default: bool,
    /// Price and feature items
    pub items: Vec<ProductItem>,
}

impl Product {
    /// Monthly price, `None` for free products
    pub fn monthly_price(&self) -> Option<f64> {
        self.items.iter().find_map(|item| match item {
            ProductItem::Price {
                price,
                interval: Interval::Month,
            } => Some(*price),
            _ => None,
        })
    }

    /// Ids of every granted feature, in item order
    pub fn feature_ids(&self) -> Vec<&'static str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ProductItem::Feature { feature_id, .. } => Some(*feature_id),
                _ => None,
            })
            .collect()
    }

    /// Whether the product grants a feature
    pub fn includes(&self, feature_id: &str) -> bool {
        self.feature_ids().iter().any(|id| *id == feature_id)
    }

    /// Allowance for a single-use feature
    pub fn included_usage(&self, feature_id: &str) -> Option<u32> {
        self.items.iter().find_map(|item| match item {
            ProductItem::Feature {
                feature_id: id,
                included_usage,
                ..
            } if *id == feature_id => *included_usage,
            _ => None,
        })
    }
}

/// Features and products offered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    /// Every feature
    pub features: Vec<Feature>,
    /// Every product
    pub products: Vec<Product>,
}

fn feature(id: &'static str, name: &'static str, kind: FeatureKind) -> Feature {
    Feature { id, name, kind }
}

fn grant(feature_id: &'static str) -> ProductItem {
    ProductItem::Feature {
        feature_id,
        included_usage: None,
        interval: None,
    }
}

fn allowance(feature_id: &'static str, included_usage: u32) -> ProductItem {
    ProductItem::Feature {
        feature_id,
        included_usage: Some(included_usage),
        interval: Some(Interval::Month),
    }
}

fn monthly(price: f64) -> ProductItem {
    ProductItem::Price {
        price,
        interval: Interval::Month,
    }
}

impl Catalog {
    /// The StudySphere catalog
    ///
    /// # Examples
    ///
    /// ```
    /// use studysphere::billing::Catalog;
    ///
    /// let catalog = Catalog::standard();
    /// assert_eq!(catalog.default_product().map(|p| p.id), Some("student_starter"));
    /// ```
    pub fn standard() -> Self {
        use FeatureKind::{Boolean, SingleUse};

        let features = vec![
            feature("messages", "AI Messages", SingleUse),
            feature("priority_response", "Priority Response", Boolean),
            feature("advanced_flashcards", "Advanced Flashcards", Boolean),
            feature("pdf_upload", "PDF Upload", Boolean),
            feature("cross_session_memory", "Cross-Session Memory", Boolean),
            feature("deep_thinking_mode", "Deep Thinking Mode", Boolean),
            feature("interview_prep", "Interview Prep", Boolean),
            feature("priority_support", "Priority Support", Boolean),
            feature("advanced_analytics", "Advanced Analytics", Boolean),
        ];

        let products = vec![
            Product {
                id: "student_starter",
                name: "Student Starter",
                is_default: true,
                items: vec![allowance("messages", 50)],
            },
            Product {
                id: "study_pro",
                name: "Study Pro",
                is_default: false,
                items: vec![
                    monthly(9.99),
                    allowance("messages", 500),
                    grant("priority_response"),
                    grant("advanced_flashcards"),
                    grant("pdf_upload"),
                    grant("cross_session_memory"),
                ],
            },
            Product {
                id: "study_elite",
                name: "Study Elite",
                is_default: false,
                items: vec![
                    monthly(19.99),
                    grant("priority_response"),
                    grant("advanced_flashcards"),
                    grant("pdf_upload"),
                    grant("cross_session_memory"),
                    grant("deep_thinking_mode"),
                    grant("interview_prep"),
                    grant("priority_support"),
                    grant("advanced_analytics"),
                ],
            },
        ];

        Self { features, products }
    }

    /// Look up a feature by id
    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    /// Look up a product by id
    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// The product every new customer starts on
    pub fn default_product(&self) -> Option<&Product> {
        self.products.iter().find(|p| p.is_default)
    }

    /// Check internal consistency
    ///
    /// # Errors
    ///
    /// Returns `StudySphereError::Config` on duplicate ids, unknown feature
    /// references, or a default product count other than one.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for f in &self.features {
            if !seen.insert(f.id) {
                return Err(StudySphereError::Config(format!("Duplicate feature id: {}", f.id)).into());
            }
        }

        let mut products = HashSet::new();
        for p in &self.products {
            if !products.insert(p.id) {
                return Err(StudySphereError::Config(format!("Duplicate product id: {}", p.id)).into());
            }
            for id in p.feature_ids() {
                if self.feature(id).is_none() {
                    return Err(StudySphereError::Config(format!(
                        "Product {} references unknown feature {}",
                        p.id, id
                    ))
                    .into());
                }
            }
        }

        let defaults = self.products.iter().filter(|p| p.is_default).count();
        if defaults != 1 {
            return Err(StudySphereError::Config(format!(
                "Expected exactly one default product, found {}",
                defaults
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_is_consistent() {
        let catalog = Catalog::standard();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.features.len(), 9);
        assert_eq!(catalog.products.len(), 3);
    }

    #[test]
    fn test_product_prices() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.product("student_starter").unwrap().monthly_price(), None);
        assert_eq!(catalog.product("study_pro").unwrap().monthly_price(), Some(9.99));
        assert_eq!(catalog.product("study_elite").unwrap().monthly_price(), Some(19.99));
    }

    #[test]
    fn test_message_allowances() {
        let catalog = Catalog::standard();
        assert_eq!(
            catalog.product("student_starter").unwrap().included_usage("messages"),
            Some(50)
        );
        assert_eq!(
            catalog.product("study_pro").unwrap().included_usage("messages"),
            Some(500)
        );
        assert!(!catalog.product("study_elite").unwrap().includes("messages"));
    }

    #[test]
    fn test_feature_counts() {
        let catalog = Catalog::standard();
        let pro = catalog.product("study_pro").unwrap();
        assert_eq!(pro.feature_ids().len(), 5);
        assert!(pro.includes("pdf_upload"));
        assert!(!pro.includes("deep_thinking_mode"));
        assert_eq!(catalog.product("study_elite").unwrap().feature_ids().len(), 8);
        assert_eq!(
            catalog.feature("messages").map(|f| f.kind),
            Some(FeatureKind::SingleUse)
        );
    }

    #[test]
    fn test_validate_rejects_unknown_feature() {
        let mut catalog = Catalog::standard();
        catalog.products[1].items.push(grant("teleportation"));
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(Catalog::standard()).unwrap();
        assert_eq!(json["features"][0]["type"], "single_use");
        assert_eq!(json["products"][1]["items"][0]["type"], "price");
        assert_eq!(json["products"][1]["items"][0]["interval"], "month");
        assert_eq!(json["products"][1]["items"][1]["included_usage"], 500);
    }
}
