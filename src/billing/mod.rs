//! Billing glue
//!
//! A static product catalog plus the routes that attach products to
//! customers through the Autumn API. Entitlement checks and metering live
//! with the billing provider.

pub mod catalog;
pub mod client;
pub mod handlers;

pub use catalog::{Catalog, Feature, FeatureKind, Interval, Product, ProductItem};
pub use client::AutumnClient;
pub use handlers::{CustomerData, CustomerIdentity};

use crate::server::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Attach endpoint path
pub const ATTACH_PATH: &str = "/api/autumn/attach";
/// Subscribe endpoint path
pub const SUBSCRIBE_PATH: &str = "/api/autumn/subscribe";
/// Customer identity endpoint path
pub const CUSTOMER_PATH: &str = "/api/autumn/customer";
/// Catalog endpoint path
pub const CATALOG_PATH: &str = "/api/billing/catalog";

/// Build the billing routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(ATTACH_PATH, post(handlers::handle_attach))
        .route(SUBSCRIBE_PATH, post(handlers::handle_subscribe))
        .route(CUSTOMER_PATH, get(handlers::handle_customer))
        .route(CATALOG_PATH, get(handlers::handle_catalog))
}
