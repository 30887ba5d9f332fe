use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::phone::normalize_phone;
use crate::channels::provider::{DeliveryId, MessagingProvider, ProviderError};
use crate::channels::sender::{ChannelKind, ChannelSender, Recipient};
use crate::templates::RenderedContent;

pub struct WhatsAppSender {
    provider: Option<Arc<dyn MessagingProvider>>,
    country_code: String,
}

impl WhatsAppSender {
    pub fn new(provider: Arc<dyn MessagingProvider>, country_code: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            country_code: country_code.into(),
        }
    }

    pub fn disabled(country_code: impl Into<String>) -> Self {
        Self {
            provider: None,
            country_code: country_code.into(),
        }
    }
}

#[async_trait]
impl ChannelSender for WhatsAppSender {
    fn channel(&self) -> ChannelKind {
        ChannelKind::WhatsApp
    }

    fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    fn destination_for(&self, recipient: &Recipient) -> Option<String> {
        recipient
            .phone
            .as_ref()
            .filter(|phone| !phone.trim().is_empty())
            .cloned()
    }

    async fn send(
        &self,
        destination: &str,
        content: &RenderedContent,
    ) -> Result<DeliveryId, ProviderError> {
        let provider = self.provider.as_ref().ok_or_else(ProviderError::unavailable)?;
        let to = normalize_phone(destination, &self.country_code).ok_or_else(|| {
            ProviderError::InvalidDestination {
                message: format!("cannot normalize phone number '{destination}'"),
            }
        })?;
        let RenderedContent::Text { body, .. } = content else {
            return Err(ProviderError::Permanent {
                message: "whatsapp sender received non-text content".to_string(),
            });
        };
        match provider.send_text(&to, body).await {
            Ok(delivery_id) => Ok(delivery_id),
            Err(err) => {
                tracing::warn!(
                    event = "whatsapp_send_failed",
                    to = %to,
                    error = %err,
                    "whatsapp provider rejected message"
                );
                Err(ProviderError::from_anyhow(err))
            }
        }
    }
}
