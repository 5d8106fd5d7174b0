//! Session bag: product id (plus optional size) to quantity.
//!
//! The bag is a plain value. Handlers load it from session storage, call the
//! mutation methods here, and write it back. Every mutation either applies
//! completely or returns an error with the bag untouched.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::orders::LineRequest;
use crate::CoreError;

/// Size codes a sized product can be ordered in.
pub const SIZES: [&str; 5] = ["XS", "S", "M", "L", "XL"];

/// Upper bound on the quantity a single add/set request may carry.
pub const BAG_MAX_QUANTITY: u32 = 99;

/// One product's slot in the bag.
///
/// Serialized either as a bare quantity or as `{"items_by_size": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BagEntry {
    Quantity(u32),
    Sized { items_by_size: BTreeMap<String, u32> },
}

impl BagEntry {
    fn total_quantity(&self) -> u64 {
        match self {
            BagEntry::Quantity(q) => u64::from(*q),
            BagEntry::Sized { items_by_size } => items_by_size.values().map(|q| u64::from(*q)).sum(),
        }
    }
}

/// Address of a single bag line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BagKey {
    pub product_id: i64,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<i64, BagEntry>")]
pub struct Bag {
    items: BTreeMap<i64, BagEntry>,
}

impl Serialize for Bag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl TryFrom<BTreeMap<i64, BagEntry>> for Bag {
    type Error = CoreError;

    fn try_from(items: BTreeMap<i64, BagEntry>) -> Result<Self, Self::Error> {
        for (product_id, entry) in &items {
            match entry {
                BagEntry::Quantity(0) => {
                    return Err(CoreError::MalformedBag(format!(
                        "product {product_id} has zero quantity"
                    )));
                }
                BagEntry::Quantity(_) => {}
                BagEntry::Sized { items_by_size } => {
                    if items_by_size.is_empty() {
                        return Err(CoreError::MalformedBag(format!(
                            "product {product_id} has no sizes"
                        )));
                    }
                    for (size, quantity) in items_by_size {
                        if normalize_size(size)? != *size {
                            return Err(CoreError::MalformedBag(format!(
                                "product {product_id} has non-canonical size '{size}'"
                            )));
                        }
                        if *quantity == 0 {
                            return Err(CoreError::MalformedBag(format!(
                                "product {product_id} size {size} has zero quantity"
                            )));
                        }
                    }
                }
            }
        }
        Ok(Self { items })
    }
}

/// Uppercases and validates a size code against [`SIZES`].
///
/// # Errors
///
/// Returns [`CoreError::InvalidSize`] for anything outside the size list.
pub fn normalize_size(raw: &str) -> Result<String, CoreError> {
    let upper = raw.trim().to_ascii_uppercase();
    if SIZES.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(CoreError::InvalidSize(raw.to_string()))
    }
}

/// Checks a requested quantity lies in `min..=BAG_MAX_QUANTITY`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidQuantity`] when out of range.
pub fn validate_quantity(raw: i64, min: u32) -> Result<u32, CoreError> {
    u32::try_from(raw)
        .ok()
        .filter(|q| (min..=BAG_MAX_QUANTITY).contains(q))
        .ok_or(CoreError::InvalidQuantity {
            got: raw,
            max: BAG_MAX_QUANTITY,
        })
}

impl Bag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct products in the bag.
    #[must_use]
    pub fn product_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of all quantities across products and sizes.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.values().map(BagEntry::total_quantity).sum()
    }

    #[must_use]
    pub fn entry(&self, product_id: i64) -> Option<&BagEntry> {
        self.items.get(&product_id)
    }

    /// Quantity currently stored at `key`, if present.
    #[must_use]
    pub fn quantity(&self, key: &BagKey) -> Option<u32> {
        match (self.items.get(&key.product_id)?, key.size.as_deref()) {
            (BagEntry::Quantity(q), None) => Some(*q),
            (BagEntry::Sized { items_by_size }, Some(size)) => items_by_size.get(size).copied(),
            _ => None,
        }
    }

    pub fn product_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.items.keys().copied()
    }

    /// Adds `quantity` to the line at (`product_id`, `size`), creating it if absent.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidQuantity`] if `quantity` is outside the
    ///   per-request range, or the line total would overflow.
    /// - [`CoreError::InvalidSize`] for an unknown size code.
    /// - [`CoreError::BagShapeMismatch`] if the product is stored with the
    ///   other shape (sized vs unsized).
    pub fn add(&mut self, product_id: i64, size: Option<&str>, quantity: u32) -> Result<(), CoreError> {
        let quantity = validate_quantity(i64::from(quantity), 1)?;
        let size = size.map(normalize_size).transpose()?;
        let accumulate = |current: u32| -> Result<u32, CoreError> {
            current
                .checked_add(quantity)
                .ok_or(CoreError::InvalidQuantity {
                    got: i64::from(current) + i64::from(quantity),
                    max: u32::MAX,
                })
        };

        match self.items.entry(product_id) {
            Entry::Vacant(slot) => {
                slot.insert(match size {
                    None => BagEntry::Quantity(quantity),
                    Some(size) => BagEntry::Sized {
                        items_by_size: BTreeMap::from([(size, quantity)]),
                    },
                });
            }
            Entry::Occupied(mut slot) => match (slot.get_mut(), size) {
                (BagEntry::Quantity(current), None) => {
                    *current = accumulate(*current)?;
                }
                (BagEntry::Sized { items_by_size }, Some(size)) => {
                    let current = items_by_size.get(&size).copied().unwrap_or(0);
                    let next = accumulate(current)?;
                    items_by_size.insert(size, next);
                }
                _ => return Err(CoreError::BagShapeMismatch { product_id }),
            },
        }
        Ok(())
    }

    /// Sets the line at (`product_id`, `size`) to `quantity`; zero removes it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidQuantity`] if `quantity` is above the cap.
    /// - [`CoreError::NotInBag`] if the line does not exist.
    /// - [`CoreError::BagShapeMismatch`] on a shape mismatch.
    pub fn set(&mut self, product_id: i64, size: Option<&str>, quantity: u32) -> Result<(), CoreError> {
        let quantity = validate_quantity(i64::from(quantity), 0)?;
        if quantity == 0 {
            return self.remove(product_id, size);
        }
        let size = size.map(normalize_size).transpose()?;

        match (self.items.get_mut(&product_id), size) {
            (Some(BagEntry::Quantity(current)), None) => {
                *current = quantity;
                Ok(())
            }
            (Some(BagEntry::Sized { items_by_size }), Some(size)) => {
                match items_by_size.get_mut(&size) {
                    Some(current) => {
                        *current = quantity;
                        Ok(())
                    }
                    None => Err(CoreError::NotInBag {
                        product_id,
                        size: Some(size),
                    }),
                }
            }
            (None, size) => Err(CoreError::NotInBag { product_id, size }),
            (Some(_), _) => Err(CoreError::BagShapeMismatch { product_id }),
        }
    }

    /// Removes the line at (`product_id`, `size`). Removing the last size of a
    /// sized product drops the product key entirely.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotInBag`] if the line does not exist.
    /// - [`CoreError::BagShapeMismatch`] on a shape mismatch.
    pub fn remove(&mut self, product_id: i64, size: Option<&str>) -> Result<(), CoreError> {
        let size = size.map(normalize_size).transpose()?;

        let Entry::Occupied(mut slot) = self.items.entry(product_id) else {
            return Err(CoreError::NotInBag { product_id, size });
        };

        let drop_product = match (slot.get_mut(), size) {
            (BagEntry::Quantity(_), None) => true,
            (BagEntry::Sized { items_by_size }, Some(size)) => {
                if items_by_size.remove(&size).is_none() {
                    return Err(CoreError::NotInBag {
                        product_id,
                        size: Some(size),
                    });
                }
                items_by_size.is_empty()
            }
            _ => return Err(CoreError::BagShapeMismatch { product_id }),
        };

        if drop_product {
            slot.remove();
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Flattens the bag into one line per (product, size), ordered by product
    /// id then size.
    #[must_use]
    pub fn lines(&self) -> Vec<LineRequest> {
        let mut lines = Vec::new();
        for (product_id, entry) in &self.items {
            match entry {
                BagEntry::Quantity(quantity) => lines.push(LineRequest {
                    product_id: *product_id,
                    size: None,
                    quantity: *quantity,
                }),
                BagEntry::Sized { items_by_size } => {
                    for (size, quantity) in items_by_size {
                        lines.push(LineRequest {
                            product_id: *product_id,
                            size: Some(size.clone()),
                            quantity: *quantity,
                        });
                    }
                }
            }
        }
        lines
    }

    /// Canonical JSON used as the order's `original_bag` and the payment
    /// intent's `metadata.bag`. Keys are sorted, so equal bags always produce
    /// identical strings.
    #[must_use]
    pub fn to_snapshot(&self) -> String {
        // A map of integers and strings to integers cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parses a snapshot produced by [`Bag::to_snapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedBag`] if the JSON does not describe a
    /// valid bag.
    pub fn from_snapshot(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw).map_err(|e| CoreError::MalformedBag(e.to_string()))
    }

    /// Parses a bag held as a JSON value (e.g. a JSONB session column).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedBag`] if the value does not describe a
    /// valid bag.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value).map_err(|e| CoreError::MalformedBag(e.to_string()))
    }
}

#[cfg(test)]
#[path = "bag_test.rs"]
mod tests;
