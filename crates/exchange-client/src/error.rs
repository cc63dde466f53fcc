use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Venue rejected the request (code {code}): {message}")]
    Venue { code: String, message: String },

    #[error("Venue rate limit hit{}", retry_after_ms.map(|ms| format!(", retry after {}ms", ms)).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Failed to deserialize venue response: {0}")]
    Deserialization(String),

    #[error("Invalid data from venue: {0}")]
    InvalidData(String),

    #[error("Venue response carried neither orderId nor orderIdString")]
    MissingOrderId,

    #[error("Order quantity {0} is below the venue minimum of {1}")]
    BelowMinimum(rust_decimal::Decimal, rust_decimal::Decimal),

    #[error("Authentication failed after clock resync retries: {0}")]
    AuthExhausted(String),
}

/// Venue codes that mean the request timestamp fell outside the recv window.
/// Both venues report drift with their own vocabulary; the retry loop treats
/// them identically.
const TIME_DRIFT_CODES: &[&str] = &["AUTH_104", "AUTH_105", "-1021", "-1022"];

impl ExchangeError {
    /// True when the error is a signing/timestamp drift the client may retry
    /// after a clock resync.
    pub fn is_time_drift(&self) -> bool {
        match self {
            ExchangeError::Venue { code, .. } => TIME_DRIFT_CODES.contains(&code.as_str()),
            _ => false,
        }
    }

    /// True for transport-level failures worth a bounded retry.
    pub fn is_network(&self) -> bool {
        matches!(self, ExchangeError::Http(e) if e.is_timeout() || e.is_connect() || e.is_request())
    }
}
