//! HTTP client for the payment provider's REST API.
//!
//! Wraps `reqwest` with bearer-key authentication, form-encoded request
//! bodies, and typed response deserialization. Non-2xx responses surface the
//! provider's error message as [`StripeError::Api`].

use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::error::StripeError;
use crate::retry::retry_with_backoff;
use crate::types::{ErrorEnvelope, IntentMetadata, PaymentIntent};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com/";
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Client for the payment provider.
///
/// Use [`StripeClient::new`] for production or [`StripeClient::with_base_url`]
/// to point at a mock server in tests.
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl StripeClient {
    /// Creates a new client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`StripeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(secret_key: &str, timeout_secs: u64) -> Result<Self, StripeError> {
        Self::with_base_url(secret_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`StripeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`StripeError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    pub fn with_base_url(
        secret_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, StripeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("boutique/0.1")
            .build()?;

        // Exactly one trailing slash so `join` appends instead of replacing
        // the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| StripeError::InvalidBaseUrl(format!("'{base_url}': {e}")))?;

        Ok(Self {
            client,
            secret_key: secret_key.to_owned(),
            base_url,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the retry policy for transient failures.
    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Creates a payment intent for `amount_minor` units of `currency`.
    ///
    /// Retries reuse one idempotency key, so a retried request never creates
    /// a second intent.
    ///
    /// # Errors
    ///
    /// - [`StripeError::Api`] if the provider rejects the request.
    /// - [`StripeError::Http`] on network failure.
    /// - [`StripeError::Deserialize`] if the response is not a payment intent.
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
    ) -> Result<PaymentIntent, StripeError> {
        let url = self.endpoint("v1/payment_intents")?;
        let idempotency_key = uuid::Uuid::new_v4().to_string();
        let form = vec![
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_owned()),
        ];

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.post_form(&url, &form, Some(&idempotency_key), "create payment intent")
        })
        .await
    }

    /// Attaches checkout metadata to an existing payment intent.
    ///
    /// # Errors
    ///
    /// - [`StripeError::Api`] if the provider rejects the request (for
    ///   example, an unknown intent id).
    /// - [`StripeError::Http`] on network failure.
    /// - [`StripeError::Deserialize`] if the response is not a payment intent.
    pub async fn modify_payment_intent_metadata(
        &self,
        intent_id: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, StripeError> {
        let url = self.endpoint(&format!("v1/payment_intents/{intent_id}"))?;
        let form = metadata.form_fields();
        let context = format!("modify payment intent {intent_id}");

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.post_form(&url, &form, None, &context)
        })
        .await
    }

    fn endpoint(&self, path: &str) -> Result<Url, StripeError> {
        self.base_url
            .join(path)
            .map_err(|e| StripeError::InvalidBaseUrl(format!("'{path}': {e}")))
    }

    /// Sends a form-encoded POST and decodes the JSON response.
    async fn post_form<T, V>(
        &self,
        url: &Url,
        form: &[(&str, V)],
        idempotency_key: Option<&str>,
        context: &str,
    ) -> Result<T, StripeError>
    where
        T: DeserializeOwned,
        V: serde::Serialize,
    {
        let mut request = self
            .client
            .post(url.clone())
            .bearer_auth(&self.secret_key)
            .form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| StripeError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

/// Extracts the payment intent id from a client secret of the form
/// `pi_xxx_secret_yyy`.
#[must_use]
pub fn pid_from_client_secret(client_secret: &str) -> Option<&str> {
    client_secret
        .split_once("_secret")
        .map(|(pid, _)| pid)
        .filter(|pid| !pid.is_empty())
}
