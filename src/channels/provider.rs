use std::time::Duration;

use async_trait::async_trait;

/// Provider-assigned identifier for an accepted message.
pub type DeliveryId = String;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited")]
    RateLimit { retry_after: Option<Duration> },
    #[error("transient provider error: {message}")]
    Transient { message: String },
    #[error("permanent provider error: {message}")]
    Permanent { message: String },
    #[error("invalid destination: {message}")]
    InvalidDestination { message: String },
}

impl ProviderError {
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        let message = err.to_string();
        let lower = message.to_ascii_lowercase();
        if lower.contains("rate limit") || lower.contains("429") {
            return ProviderError::RateLimit { retry_after: None };
        }
        if lower.contains("invalid number")
            || lower.contains("invalid recipient")
            || lower.contains("invalid address")
        {
            return ProviderError::InvalidDestination { message };
        }
        if lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("connection")
            || lower.contains("temporar")
            || lower.contains("unavailable")
            || lower.contains("503")
            || lower.contains("502")
            || lower.contains("504")
        {
            return ProviderError::Transient { message };
        }
        ProviderError::Permanent { message }
    }

    pub fn unavailable() -> Self {
        ProviderError::Permanent {
            message: "provider not configured".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit { .. } | ProviderError::Transient { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Outbound email gateway. Implementations wrap one concrete provider
/// connection (SMTP pool, HTTP API client); wire details stay behind this
/// seam.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<DeliveryId, anyhow::Error>;
}

/// Outbound text-message gateway shared by the SMS and WhatsApp senders.
/// Destinations are E.164 phone strings.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryId, anyhow::Error>;
}
