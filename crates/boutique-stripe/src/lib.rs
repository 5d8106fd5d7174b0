//! Payment provider integration: intent creation, metadata, and signed
//! webhook events.

pub mod client;
pub mod error;
pub(crate) mod retry;
pub mod types;
pub mod webhook;

pub use client::{pid_from_client_secret, StripeClient};
pub use error::{SignatureError, StripeError};
pub use types::{
    Address, BillingDetails, Event, IntentMetadata, PaymentIntent, Shipping, WebhookEvent,
};
pub use webhook::{construct_event, signature_header, verify_signature, DEFAULT_TOLERANCE_SECS};
