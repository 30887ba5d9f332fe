use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::provider::{DeliveryId, EmailProvider, ProviderError};
use crate::channels::sender::{ChannelKind, ChannelSender, Recipient};
use crate::templates::RenderedContent;

pub struct EmailSender {
    provider: Option<Arc<dyn EmailProvider>>,
}

impl EmailSender {
    pub fn new(provider: Arc<dyn EmailProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Sender with no usable provider; every send short-circuits.
    pub fn disabled() -> Self {
        Self { provider: None }
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    fn destination_for(&self, recipient: &Recipient) -> Option<String> {
        recipient
            .email
            .as_ref()
            .filter(|address| !address.trim().is_empty())
            .cloned()
    }

    async fn send(
        &self,
        destination: &str,
        content: &RenderedContent,
    ) -> Result<DeliveryId, ProviderError> {
        let provider = self.provider.as_ref().ok_or_else(ProviderError::unavailable)?;
        let RenderedContent::Email {
            subject,
            html,
            text,
        } = content
        else {
            return Err(ProviderError::Permanent {
                message: "email sender received non-email content".to_string(),
            });
        };
        match provider.send_email(destination, subject, html, text).await {
            Ok(delivery_id) => Ok(delivery_id),
            Err(err) => {
                tracing::warn!(
                    event = "email_send_failed",
                    to = %destination,
                    error = %err,
                    "email provider rejected message"
                );
                Err(ProviderError::from_anyhow(err))
            }
        }
    }
}
