//! Payment-confirmation reconciliation.
//!
//! When the provider reports a succeeded payment intent, the order normally
//! already exists (written by the checkout submit). The webhook can arrive
//! before that write commits, so the lookup is retried a few times before
//! the order is rebuilt from the intent's metadata.

mod store;

use std::time::Duration;

use boutique_core::{blank_to_none, from_minor_units, Bag, OrderForm, ProfileDefaults};
use boutique_db::{DbError, NewOrder, OrderMatch, OrderRow};
use boutique_stripe::{PaymentIntent, WebhookEvent};
use thiserror::Error;

pub(crate) use store::PgOrderStore;

/// Username recorded on intents created by anonymous shoppers.
pub(crate) const ANONYMOUS_USER: &str = "AnonymousUser";

/// Persistence the reconciliation needs.
pub(crate) trait OrderStore {
    async fn find_order(&self, criteria: &OrderMatch) -> Result<Option<OrderRow>, DbError>;

    /// Returns the profile id for `username`, creating the profile if needed.
    async fn ensure_profile(&self, username: &str) -> Result<i64, DbError>;

    async fn save_profile_defaults(
        &self,
        profile_id: i64,
        defaults: &ProfileDefaults,
    ) -> Result<(), DbError>;

    /// Writes the order and its line items. On failure nothing is left behind.
    async fn create_order(&self, order: &NewOrder<'_>, bag: &Bag) -> Result<OrderRow, DbError>;
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ReconcileSettings {
    pub attempts: u32,
    pub backoff: Duration,
}

impl ReconcileSettings {
    pub(crate) fn from_app_config(config: &boutique_core::AppConfig) -> Self {
        Self {
            attempts: config.reconcile_attempts.max(1),
            backoff: Duration::from_millis(config.reconcile_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reconciled {
    /// Checkout had already written the order.
    Verified { order_number: String },
    /// The order was rebuilt from the intent.
    Created { order_number: String },
}

#[derive(Debug, Error)]
pub(crate) enum ReconcileError {
    /// The intent lacks data the order needs. Nothing was written.
    #[error("malformed payment intent: {0}")]
    Malformed(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Acknowledgement text and status for a verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Acknowledgement {
    pub success: bool,
    pub body: String,
}

/// Dispatches a verified event.
pub(crate) async fn handle_event<S: OrderStore>(
    store: &S,
    event: &WebhookEvent,
    settings: ReconcileSettings,
) -> Acknowledgement {
    match event {
        WebhookEvent::PaymentIntentSucceeded(intent) => {
            let prefix = format!("Webhook received: {}", event.event_type());
            match reconcile_succeeded(store, intent, settings).await {
                Ok(Reconciled::Verified { order_number }) => {
                    tracing::info!(%order_number, pid = %intent.id, "webhook: order verified");
                    Acknowledgement {
                        success: true,
                        body: format!("{prefix} | SUCCESS: Verified order already in database"),
                    }
                }
                Ok(Reconciled::Created { order_number }) => {
                    tracing::warn!(%order_number, pid = %intent.id, "webhook: order created from intent");
                    Acknowledgement {
                        success: true,
                        body: format!("{prefix} | SUCCESS: Created order in webhook"),
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, pid = %intent.id, "webhook: reconciliation failed");
                    Acknowledgement {
                        success: false,
                        body: format!("{prefix} | ERROR: {e}"),
                    }
                }
            }
        }
        WebhookEvent::PaymentIntentFailed(intent) => {
            tracing::info!(pid = %intent.id, "webhook: payment failed");
            Acknowledgement {
                success: true,
                body: format!("Webhook received: {}", event.event_type()),
            }
        }
        WebhookEvent::Unhandled { event_type } => {
            tracing::debug!(%event_type, "webhook: ignoring unhandled event");
            Acknowledgement {
                success: true,
                body: format!("Unhandled webhook received: {event_type}"),
            }
        }
    }
}

/// `save_info` travels as a metadata string.
fn is_truthy(raw: Option<&str>) -> bool {
    raw.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes"))
}

fn known_username(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim)
        .filter(|u| !u.is_empty() && *u != ANONYMOUS_USER)
}

/// Customer and shipping fields as carried by the intent, blanks removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct IntentCustomer {
    full_name: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    country: Option<String>,
    postcode: Option<String>,
    town_or_city: Option<String>,
    street_address1: Option<String>,
    street_address2: Option<String>,
    county: Option<String>,
}

impl IntentCustomer {
    fn from_intent(intent: &PaymentIntent) -> Self {
        let billing = intent.billing_details();
        let shipping = intent.shipping.clone().unwrap_or_default();
        let address = shipping.address;

        Self {
            full_name: blank_to_none(shipping.name),
            email: blank_to_none(billing.email),
            phone_number: blank_to_none(shipping.phone),
            country: blank_to_none(address.country),
            postcode: blank_to_none(address.postal_code),
            town_or_city: blank_to_none(address.city),
            street_address1: blank_to_none(address.line1),
            street_address2: blank_to_none(address.line2),
            county: blank_to_none(address.state),
        }
    }

    fn profile_defaults(&self) -> ProfileDefaults {
        ProfileDefaults {
            default_phone_number: self.phone_number.clone(),
            default_street_address1: self.street_address1.clone(),
            default_street_address2: self.street_address2.clone(),
            default_town_or_city: self.town_or_city.clone(),
            default_county: self.county.clone(),
            default_postcode: self.postcode.clone(),
            default_country: self.country.clone(),
        }
    }

    fn order_form(&self) -> OrderForm {
        OrderForm {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            country: self.country.clone(),
            postcode: self.postcode.clone(),
            town_or_city: self.town_or_city.clone(),
            street_address1: self.street_address1.clone(),
            street_address2: self.street_address2.clone(),
            county: self.county.clone(),
        }
    }

    fn match_criteria(&self, intent: &PaymentIntent, original_bag: &str) -> OrderMatch {
        OrderMatch {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            country: self.country.clone(),
            postcode: self.postcode.clone(),
            town_or_city: self.town_or_city.clone(),
            street_address1: self.street_address1.clone(),
            street_address2: self.street_address2.clone(),
            county: self.county.clone(),
            grand_total: from_minor_units(intent.amount),
            original_bag: original_bag.to_owned(),
            stripe_pid: intent.id.clone(),
        }
    }
}

/// Makes sure a succeeded payment has an order.
///
/// # Errors
///
/// - [`ReconcileError::Malformed`] if the intent has no usable bag snapshot
///   or the customer fields cannot form a valid order.
/// - [`ReconcileError::Db`] if a store operation fails. A failed order
///   creation leaves no order behind.
pub(crate) async fn reconcile_succeeded<S: OrderStore>(
    store: &S,
    intent: &PaymentIntent,
    settings: ReconcileSettings,
) -> Result<Reconciled, ReconcileError> {
    let original_bag = intent
        .metadata_value("bag")
        .ok_or_else(|| ReconcileError::Malformed("metadata has no bag".to_owned()))?;
    let bag = Bag::from_snapshot(original_bag)
        .map_err(|e| ReconcileError::Malformed(e.to_string()))?;
    let save_info = is_truthy(intent.metadata_value("save_info"));
    let username = known_username(intent.metadata_value("username"));
    let customer = IntentCustomer::from_intent(intent);
    let details = customer
        .order_form()
        .validate()
        .map_err(|e| ReconcileError::Malformed(e.to_string()))?;

    let mut profile_id = None;
    if let Some(username) = username {
        let id = store.ensure_profile(username).await?;
        if save_info {
            store
                .save_profile_defaults(id, &customer.profile_defaults())
                .await?;
        }
        profile_id = Some(id);
    }

    let criteria = customer.match_criteria(intent, original_bag);
    for attempt in 1..=settings.attempts {
        if let Some(order) = store.find_order(&criteria).await? {
            return Ok(Reconciled::Verified {
                order_number: order.order_number,
            });
        }
        if attempt < settings.attempts {
            tracing::debug!(attempt, pid = %intent.id, "webhook: order not found yet, waiting");
            tokio::time::sleep(settings.backoff).await;
        }
    }

    let order = store
        .create_order(
            &NewOrder {
                details: &details,
                user_profile_id: profile_id,
                original_bag,
                stripe_pid: &intent.id,
            },
            &bag,
        )
        .await?;

    Ok(Reconciled::Created {
        order_number: order.order_number,
    })
}
