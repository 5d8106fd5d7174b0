use thiserror::Error;

/// Errors returned by the payment-provider client.
#[derive(Debug, Error)]
pub enum StripeError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status and an error body.
    #[error("payment provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response or webhook body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The webhook signature did not verify.
    #[error("webhook signature rejected: {0}")]
    Signature(#[from] SignatureError),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Reasons a `Stripe-Signature` header is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("signature header has no timestamp")]
    MissingTimestamp,
    #[error("signature header has no v1 signature")]
    MissingSignature,
    #[error("timestamp is {age_secs}s old, outside the {tolerance_secs}s tolerance")]
    OutsideTolerance { age_secs: i64, tolerance_secs: i64 },
    #[error("no signature matches the payload")]
    Mismatch,
}
