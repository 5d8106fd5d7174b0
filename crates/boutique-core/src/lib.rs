pub mod app_config;
pub mod bag;
pub mod catalog;
pub mod config;
pub mod money;
pub mod orders;
pub mod pricing;
pub mod shipping;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use bag::{Bag, BagEntry, BagKey, BAG_MAX_QUANTITY, SIZES};
pub use catalog::{
    escape_like, load_catalog, CatalogFile, CatalogQuery, CategorySeed, ProductSeed,
    RawCatalogParams, SortDirection, SortKey, SortSpec,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use money::{from_minor_units, to_minor_units, DeliveryCharge, DeliveryPolicy};
pub use orders::{LineRequest, OrderNumber, OrderTotals};
pub use pricing::{price_bag, BagLine, BagSummary, ProductLookup};
pub use shipping::{
    blank_to_none, CustomerDetails, OrderForm, ProfileDefaults, ProfileForm, ShippingAddress,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

/// Domain-level failures raised by bag, catalog and form logic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("product {0} not found")]
    ProductNotFound(i64),
    #[error("product {product_id} is stored with a different shape (sized vs unsized)")]
    BagShapeMismatch { product_id: i64 },
    #[error("product {product_id} (size {size:?}) is not in the bag")]
    NotInBag {
        product_id: i64,
        size: Option<String>,
    },
    #[error("quantity must be between 1 and {max}, got {got}")]
    InvalidQuantity { got: i64, max: u32 },
    #[error("unknown size '{0}'")]
    InvalidSize(String),
    #[error("malformed bag: {0}")]
    MalformedBag(String),
    #[error("You didn't enter any search criteria!")]
    EmptySearch,
    #[error("invalid sort key '{0}'")]
    InvalidSortKey(String),
    #[error("{field}: {reason}")]
    Validation { field: &'static str, reason: String },
}
