//! Payment-provider object and webhook event types.
//!
//! Only the fields the storefront reads are modelled; everything else in the
//! provider's payloads is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StripeError;

/// Error body returned with non-2xx responses: `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Shipping {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Charge {
    #[serde(default)]
    pub billing_details: BillingDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChargeList {
    #[serde(default)]
    pub data: Vec<Charge>,
}

/// A payment intent as returned by the provider API or embedded in an event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub charges: Option<ChargeList>,
    #[serde(default)]
    pub shipping: Option<Shipping>,
}

impl PaymentIntent {
    /// Billing details of the first charge, or empty details if there is none.
    #[must_use]
    pub fn billing_details(&self) -> BillingDetails {
        self.charges
            .as_ref()
            .and_then(|c| c.data.first())
            .map(|c| c.billing_details.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Metadata the storefront attaches to a payment intent before confirmation,
/// so the webhook can rebuild the order if needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentMetadata {
    /// Canonical bag snapshot JSON.
    pub bag: String,
    pub save_info: bool,
    /// Authenticated username, or `AnonymousUser`.
    pub username: String,
}

impl IntentMetadata {
    /// Form fields in the provider's bracketed `metadata[key]` encoding.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("metadata[bag]", self.bag.clone()),
            ("metadata[save_info]", self.save_info.to_string()),
            ("metadata[username]", self.username.clone()),
        ]
    }
}

/// The raw event envelope: `{"id", "type", "data": {"object": ...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Events the storefront dispatches on. Anything else is acknowledged and
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentIntentSucceeded(PaymentIntent),
    PaymentIntentFailed(PaymentIntent),
    Unhandled { event_type: String },
}

impl WebhookEvent {
    /// Classifies an event and decodes its payload.
    ///
    /// # Errors
    ///
    /// Returns [`StripeError::Deserialize`] if a handled event's object is not
    /// a valid payment intent.
    pub fn from_event(event: Event) -> Result<Self, StripeError> {
        let decode = |object: serde_json::Value| {
            serde_json::from_value::<PaymentIntent>(object).map_err(|e| StripeError::Deserialize {
                context: format!("{} {}", event.event_type, event.id),
                source: e,
            })
        };

        match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                Ok(Self::PaymentIntentSucceeded(decode(event.data.object)?))
            }
            "payment_intent.payment_failed" => {
                Ok(Self::PaymentIntentFailed(decode(event.data.object)?))
            }
            _ => Ok(Self::Unhandled {
                event_type: event.event_type,
            }),
        }
    }

    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            WebhookEvent::PaymentIntentSucceeded(_) => "payment_intent.succeeded",
            WebhookEvent::PaymentIntentFailed(_) => "payment_intent.payment_failed",
            WebhookEvent::Unhandled { event_type } => event_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str, object: serde_json::Value) -> Event {
        serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": object }
        }))
        .expect("valid event")
    }

    fn intent_json() -> serde_json::Value {
        serde_json::json!({
            "id": "pi_123",
            "object": "payment_intent",
            "amount": 4400,
            "currency": "usd",
            "metadata": { "bag": "{\"1\":2}", "save_info": "true", "username": "ada" },
            "charges": { "data": [ { "billing_details": {
                "email": "ada@example.com", "name": "Ada Lovelace", "phone": null
            } } ] },
            "shipping": {
                "name": "Ada Lovelace",
                "phone": "0123",
                "address": { "line1": "1 Analytical Row", "line2": null, "city": "London",
                             "state": "", "postal_code": "N1", "country": "GB" }
            }
        })
    }

    #[test]
    fn succeeded_event_decodes_intent() {
        let parsed = WebhookEvent::from_event(event("payment_intent.succeeded", intent_json()))
            .expect("decodes");
        let WebhookEvent::PaymentIntentSucceeded(intent) = parsed else {
            panic!("expected PaymentIntentSucceeded");
        };
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.amount, 4400);
        assert_eq!(intent.metadata_value("username"), Some("ada"));
        assert_eq!(
            intent.billing_details().email.as_deref(),
            Some("ada@example.com")
        );
        let shipping = intent.shipping.expect("shipping present");
        assert_eq!(shipping.address.city.as_deref(), Some("London"));
        assert_eq!(shipping.address.line2, None);
    }

    #[test]
    fn failed_event_decodes_intent() {
        let parsed = WebhookEvent::from_event(event("payment_intent.payment_failed", intent_json()))
            .expect("decodes");
        assert!(matches!(parsed, WebhookEvent::PaymentIntentFailed(_)));
        assert_eq!(parsed.event_type(), "payment_intent.payment_failed");
    }

    #[test]
    fn unknown_event_is_unhandled() {
        let parsed = WebhookEvent::from_event(event("charge.refunded", serde_json::json!({})))
            .expect("decodes");
        assert_eq!(
            parsed,
            WebhookEvent::Unhandled {
                event_type: "charge.refunded".to_string()
            }
        );
    }

    #[test]
    fn handled_event_with_bad_object_is_error() {
        let err = WebhookEvent::from_event(event(
            "payment_intent.succeeded",
            serde_json::json!({"id": "pi_1"}),
        ))
        .unwrap_err();
        assert!(matches!(err, StripeError::Deserialize { .. }));
    }

    #[test]
    fn intent_without_charges_has_empty_billing() {
        let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_2", "amount": 100, "currency": "usd"
        }))
        .expect("valid intent");
        assert_eq!(intent.billing_details(), BillingDetails::default());
    }

    #[test]
    fn metadata_form_fields_use_brackets() {
        let metadata = IntentMetadata {
            bag: "{}".to_string(),
            save_info: false,
            username: "AnonymousUser".to_string(),
        };
        let fields = metadata.form_fields();
        assert_eq!(fields[0].0, "metadata[bag]");
        assert_eq!(fields[1], ("metadata[save_info]", "false".to_string()));
        assert_eq!(fields[2], ("metadata[username]", "AnonymousUser".to_string()));
    }
}
