//! Catalog query model and the seed file format.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, CoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    Price,
    Rating,
    Category,
}

impl SortKey {
    /// Parses a sort key from a query parameter.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSortKey`] for an unrecognized key.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "price" => Ok(Self::Price),
            "rating" => Ok(Self::Rating),
            "category" => Ok(Self::Category),
            _ => Err(CoreError::InvalidSortKey(raw.to_string())),
        }
    }

    /// Text keys sort case-insensitively.
    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(self, Self::Name | Self::Category)
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Name => write!(f, "name"),
            SortKey::Price => write!(f, "price"),
            SortKey::Rating => write!(f, "rating"),
            SortKey::Category => write!(f, "category"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Anything other than `desc` sorts ascending.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// Query-string parameters exactly as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCatalogParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

/// A validated catalog query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub categories: Vec<String>,
    pub sort: Option<SortSpec>,
    /// Direction as requested, kept separately so it can be echoed back even
    /// when no sort key was given.
    pub requested_direction: Option<SortDirection>,
}

impl CatalogQuery {
    /// Validates raw query parameters.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmptySearch`] if `q` is present but blank.
    /// - [`CoreError::InvalidSortKey`] for an unknown sort key.
    pub fn from_params(params: &RawCatalogParams) -> Result<Self, CoreError> {
        let search = match params.q.as_deref() {
            None => None,
            Some(q) if q.trim().is_empty() => return Err(CoreError::EmptySearch),
            Some(q) => Some(q.trim().to_string()),
        };

        let categories = params
            .category
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let requested_direction = params
            .direction
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(SortDirection::parse);

        let sort = params
            .sort
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(SortKey::parse)
            .transpose()?
            .map(|key| SortSpec {
                key,
                direction: requested_direction.unwrap_or_default(),
            });

        Ok(Self {
            search,
            categories,
            sort,
            requested_direction,
        })
    }

    /// `ILIKE` pattern for the search term with `%`, `_` and `\` escaped.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(|term| format!("%{}%", escape_like(term)))
    }

    /// The `{sort}_{direction}` string listing views echo back, with `None`
    /// standing in for an absent part.
    #[must_use]
    pub fn current_sorting(&self) -> String {
        let key = self
            .sort
            .map_or_else(|| "None".to_string(), |s| s.key.to_string());
        let direction = self
            .requested_direction
            .map_or_else(|| "None".to_string(), |d| d.to_string());
        format!("{key}_{direction}")
    }
}

/// Escapes `LIKE` metacharacters so user input matches literally.
#[must_use]
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    pub friendly_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSeed {
    pub sku: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub rating: Option<Decimal>,
    pub image_url: Option<String>,
    pub image: Option<String>,
    /// Programmatic category name.
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

/// Load and validate a catalog seed file. YAML is a superset of JSON, so
/// either format is accepted.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<CatalogFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let catalog: CatalogFile = serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml {
        path: path.display().to_string(),
        source: e,
    })?;

    validate_catalog(&catalog)?;

    Ok(catalog)
}

fn validate_catalog(catalog: &CatalogFile) -> Result<(), ConfigError> {
    let mut category_names = HashSet::new();
    for category in &catalog.categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name must be non-empty".to_string(),
            ));
        }
        if !category_names.insert(category.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category: '{}'",
                category.name
            )));
        }
    }

    let mut skus = HashSet::new();
    for product in &catalog.products {
        if product.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "product name must be non-empty".to_string(),
            ));
        }
        if product.price.is_sign_negative() {
            return Err(ConfigError::Validation(format!(
                "product '{}' has negative price {}",
                product.name, product.price
            )));
        }
        if let Some(sku) = product.sku.as_deref() {
            if !skus.insert(sku) {
                return Err(ConfigError::Validation(format!("duplicate sku: '{sku}'")));
            }
        }
        if let Some(category) = product.category.as_deref() {
            if !category_names.contains(category) {
                return Err(ConfigError::Validation(format!(
                    "product '{}' references unknown category '{category}'",
                    product.name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(q: Option<&str>, category: Option<&str>, sort: Option<&str>, direction: Option<&str>) -> RawCatalogParams {
        RawCatalogParams {
            q: q.map(str::to_string),
            category: category.map(str::to_string),
            sort: sort.map(str::to_string),
            direction: direction.map(str::to_string),
        }
    }

    #[test]
    fn empty_params_mean_everything() {
        let query = CatalogQuery::from_params(&RawCatalogParams::default()).unwrap();
        assert_eq!(query, CatalogQuery::default());
        assert_eq!(query.current_sorting(), "None_None");
        assert!(query.search_pattern().is_none());
    }

    #[test]
    fn blank_search_rejected() {
        let err = CatalogQuery::from_params(&params(Some("  "), None, None, None)).unwrap_err();
        assert_eq!(err, CoreError::EmptySearch);
        assert_eq!(err.to_string(), "You didn't enter any search criteria!");
    }

    #[test]
    fn search_pattern_escapes_metacharacters() {
        let query = CatalogQuery::from_params(&params(Some(" 100%_cotton\\ "), None, None, None)).unwrap();
        assert_eq!(query.search_pattern().as_deref(), Some("%100\\%\\_cotton\\\\%"));
    }

    #[test]
    fn categories_split_on_commas() {
        let query = CatalogQuery::from_params(&params(None, Some("jeans, shirts,,"), None, None)).unwrap();
        assert_eq!(query.categories, vec!["jeans".to_string(), "shirts".to_string()]);
    }

    #[test]
    fn sort_with_direction() {
        let query = CatalogQuery::from_params(&params(None, None, Some("price"), Some("desc"))).unwrap();
        assert_eq!(
            query.sort,
            Some(SortSpec {
                key: SortKey::Price,
                direction: SortDirection::Desc
            })
        );
        assert_eq!(query.current_sorting(), "price_desc");
    }

    #[test]
    fn sort_without_direction_defaults_ascending() {
        let query = CatalogQuery::from_params(&params(None, None, Some("name"), None)).unwrap();
        assert_eq!(query.sort.map(|s| s.direction), Some(SortDirection::Asc));
        assert_eq!(query.current_sorting(), "name_None");
    }

    #[test]
    fn unknown_sort_key_rejected() {
        let err = CatalogQuery::from_params(&params(None, None, Some("popularity"), None)).unwrap_err();
        assert_eq!(err, CoreError::InvalidSortKey("popularity".to_string()));
    }

    #[test]
    fn text_keys() {
        assert!(SortKey::Name.is_text());
        assert!(SortKey::Category.is_text());
        assert!(!SortKey::Price.is_text());
        assert!(!SortKey::Rating.is_text());
    }

    fn catalog(yaml: &str) -> CatalogFile {
        serde_yaml::from_str(yaml).expect("valid yaml")
    }

    #[test]
    fn validate_accepts_well_formed_catalog() {
        let file = catalog(
            r#"
categories:
  - name: jeans
    friendly_name: Jeans
products:
  - sku: pp5001340155
    name: Slim Fit Jeans
    description: Dark wash.
    price: "39.99"
    rating: "4.5"
    category: jeans
  - name: Gift Card
    price: "25.00"
"#,
        );
        validate_catalog(&file).unwrap();
        assert_eq!(file.products[0].price, Decimal::new(3999, 2));
        assert!(file.products[1].category.is_none());
    }

    #[test]
    fn validate_rejects_unknown_category() {
        let file = catalog(
            r#"
products:
  - name: Mug
    price: "9.00"
    category: kitchen_dining
"#,
        );
        let err = validate_catalog(&file).unwrap_err();
        assert!(err.to_string().contains("unknown category"));
    }

    #[test]
    fn validate_rejects_negative_price() {
        let file = catalog(
            r#"
products:
  - name: Mug
    price: "-1.00"
"#,
        );
        let err = validate_catalog(&file).unwrap_err();
        assert!(err.to_string().contains("negative price"));
    }

    #[test]
    fn validate_rejects_duplicate_sku() {
        let file = catalog(
            r#"
products:
  - sku: a1
    name: One
    price: "1.00"
  - sku: a1
    name: Two
    price: "2.00"
"#,
        );
        let err = validate_catalog(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate sku"));
    }

    #[test]
    fn shipped_catalog_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/catalog.yaml");
        let file = load_catalog(&path).expect("shipped catalog is valid");
        assert!(!file.categories.is_empty());
        assert!(file.products.iter().any(|p| p.sku.is_none()));
    }
}
