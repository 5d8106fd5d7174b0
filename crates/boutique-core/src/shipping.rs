//! Customer and shipping details: the checkout form, profile defaults, and
//! their validation.

use serde::{Deserialize, Serialize};

use crate::CoreError;

const FULL_NAME_MAX: usize = 50;
const EMAIL_MAX: usize = 254;
const PHONE_MAX: usize = 20;
const POSTCODE_MAX: usize = 20;
const TOWN_MAX: usize = 40;
const STREET_MAX: usize = 80;
const COUNTY_MAX: usize = 80;

/// Trims a value and maps an empty result to `None`.
#[must_use]
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(field: &'static str, value: Option<String>, max: usize) -> Result<String, CoreError> {
    let value = blank_to_none(value).ok_or(CoreError::Validation {
        field,
        reason: "this field is required".to_string(),
    })?;
    check_len(field, &value, max)?;
    Ok(value)
}

fn optional(field: &'static str, value: Option<String>, max: usize) -> Result<Option<String>, CoreError> {
    let value = blank_to_none(value);
    if let Some(v) = value.as_deref() {
        check_len(field, v, max)?;
    }
    Ok(value)
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), CoreError> {
    if value.chars().count() > max {
        return Err(CoreError::Validation {
            field,
            reason: format!("must be at most {max} characters"),
        });
    }
    Ok(())
}

fn country_code(field: &'static str, value: &str) -> Result<String, CoreError> {
    if value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(value.to_ascii_uppercase())
    } else {
        Err(CoreError::Validation {
            field,
            reason: "must be a two-letter country code".to_string(),
        })
    }
}

fn email(value: String) -> Result<String, CoreError> {
    let valid = value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && domain.contains('.')
            && !value.chars().any(char::is_whitespace)
    });
    if valid {
        Ok(value)
    } else {
        Err(CoreError::Validation {
            field: "email",
            reason: "enter a valid email address".to_string(),
        })
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub country: String,
    pub postcode: Option<String>,
    pub town_or_city: String,
    pub street_address1: String,
    pub street_address2: Option<String>,
    pub county: Option<String>,
}

/// Validated customer and shipping fields for an order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(flatten)]
    pub address: ShippingAddress,
}

/// The checkout form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderForm {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    pub town_or_city: Option<String>,
    pub street_address1: Option<String>,
    pub street_address2: Option<String>,
    pub county: Option<String>,
}

impl OrderForm {
    /// Validates the form into order-ready details.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first invalid field.
    pub fn validate(self) -> Result<CustomerDetails, CoreError> {
        let full_name = required("full_name", self.full_name, FULL_NAME_MAX)?;
        let email = email(required("email", self.email, EMAIL_MAX)?)?;
        let phone_number = required("phone_number", self.phone_number, PHONE_MAX)?;
        let country = country_code("country", &required("country", self.country, 2)?)?;
        let postcode = optional("postcode", self.postcode, POSTCODE_MAX)?;
        let town_or_city = required("town_or_city", self.town_or_city, TOWN_MAX)?;
        let street_address1 = required("street_address1", self.street_address1, STREET_MAX)?;
        let street_address2 = optional("street_address2", self.street_address2, STREET_MAX)?;
        let county = optional("county", self.county, COUNTY_MAX)?;

        Ok(CustomerDetails {
            full_name,
            email,
            phone_number,
            address: ShippingAddress {
                country,
                postcode,
                town_or_city,
                street_address1,
                street_address2,
                county,
            },
        })
    }
}

/// Default delivery information stored on a user profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDefaults {
    pub default_phone_number: Option<String>,
    pub default_street_address1: Option<String>,
    pub default_street_address2: Option<String>,
    pub default_town_or_city: Option<String>,
    pub default_county: Option<String>,
    pub default_postcode: Option<String>,
    pub default_country: Option<String>,
}

impl ProfileDefaults {
    /// Defaults captured from a completed checkout.
    #[must_use]
    pub fn from_checkout(phone_number: Option<String>, address: &ShippingAddress) -> Self {
        Self {
            default_phone_number: blank_to_none(phone_number),
            default_street_address1: blank_to_none(Some(address.street_address1.clone())),
            default_street_address2: blank_to_none(address.street_address2.clone()),
            default_town_or_city: blank_to_none(Some(address.town_or_city.clone())),
            default_county: blank_to_none(address.county.clone()),
            default_postcode: blank_to_none(address.postcode.clone()),
            default_country: blank_to_none(Some(address.country.clone())),
        }
    }
}

/// The profile edit form. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    pub default_phone_number: Option<String>,
    pub default_street_address1: Option<String>,
    pub default_street_address2: Option<String>,
    pub default_town_or_city: Option<String>,
    pub default_county: Option<String>,
    pub default_postcode: Option<String>,
    pub default_country: Option<String>,
}

impl ProfileForm {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first invalid field.
    pub fn validate(self) -> Result<ProfileDefaults, CoreError> {
        let default_country = optional("default_country", self.default_country, 2)?
            .map(|c| country_code("default_country", &c))
            .transpose()?;
        Ok(ProfileDefaults {
            default_phone_number: optional("default_phone_number", self.default_phone_number, PHONE_MAX)?,
            default_street_address1: optional(
                "default_street_address1",
                self.default_street_address1,
                STREET_MAX,
            )?,
            default_street_address2: optional(
                "default_street_address2",
                self.default_street_address2,
                STREET_MAX,
            )?,
            default_town_or_city: optional("default_town_or_city", self.default_town_or_city, TOWN_MAX)?,
            default_county: optional("default_county", self.default_county, COUNTY_MAX)?,
            default_postcode: optional("default_postcode", self.default_postcode, POSTCODE_MAX)?,
            default_country,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn valid_form() -> OrderForm {
        OrderForm {
            full_name: s("Ada Lovelace"),
            email: s("ada@example.com"),
            phone_number: s("0123456789"),
            country: s("gb"),
            postcode: s(""),
            town_or_city: s("London"),
            street_address1: s("1 Analytical Row"),
            street_address2: s("   "),
            county: None,
        }
    }

    #[test]
    fn blank_to_none_trims() {
        assert_eq!(blank_to_none(s("  x ")), s("x"));
        assert_eq!(blank_to_none(s("   ")), None);
        assert_eq!(blank_to_none(None), None);
    }

    #[test]
    fn valid_order_form_normalizes() {
        let details = valid_form().validate().unwrap();
        assert_eq!(details.address.country, "GB");
        assert_eq!(details.address.postcode, None);
        assert_eq!(details.address.street_address2, None);
        assert_eq!(details.full_name, "Ada Lovelace");
    }

    #[test]
    fn missing_required_field_named() {
        let form = OrderForm {
            town_or_city: s(" "),
            ..valid_form()
        };
        let err = form.validate().unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "town_or_city", .. }));
    }

    #[test]
    fn overlong_full_name_rejected() {
        let form = OrderForm {
            full_name: Some("x".repeat(51)),
            ..valid_form()
        };
        let err = form.validate().unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "full_name", .. }));
    }

    #[test]
    fn bad_email_rejected() {
        for bad in ["ada", "ada@", "@example.com", "ada@example", "a da@example.com"] {
            let form = OrderForm {
                email: s(bad),
                ..valid_form()
            };
            assert!(
                matches!(form.validate(), Err(CoreError::Validation { field: "email", .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn bad_country_rejected() {
        let form = OrderForm {
            country: s("G1"),
            ..valid_form()
        };
        assert!(matches!(
            form.validate(),
            Err(CoreError::Validation { field: "country", .. })
        ));
    }

    #[test]
    fn profile_form_all_optional() {
        let defaults = ProfileForm::default().validate().unwrap();
        assert_eq!(defaults, ProfileDefaults::default());
    }

    #[test]
    fn profile_form_uppercases_country() {
        let defaults = ProfileForm {
            default_country: s("ie"),
            default_postcode: s(" D02 "),
            ..ProfileForm::default()
        }
        .validate()
        .unwrap();
        assert_eq!(defaults.default_country, s("IE"));
        assert_eq!(defaults.default_postcode, s("D02"));
    }

    #[test]
    fn defaults_from_checkout_copy_address() {
        let details = valid_form().validate().unwrap();
        let defaults = ProfileDefaults::from_checkout(Some(details.phone_number.clone()), &details.address);
        assert_eq!(defaults.default_phone_number, s("0123456789"));
        assert_eq!(defaults.default_town_or_city, s("London"));
        assert_eq!(defaults.default_street_address1, s("1 Analytical Row"));
        assert_eq!(defaults.default_street_address2, None);
        assert_eq!(defaults.default_country, s("GB"));
    }
}
