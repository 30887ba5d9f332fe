use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::channels::provider::{DeliveryId, ProviderError};
use crate::templates::RenderedContent;

/// Delivery mechanisms, in the fixed order dispatch evaluates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    WhatsApp,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Email, ChannelKind::Sms, ChannelKind::WhatsApp];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::WhatsApp => "whatsapp",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Empty means no restriction.
    #[serde(default)]
    pub preferred_channels: Vec<ChannelKind>,
}

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            phone: None,
            preferred_channels: Vec::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_preferred_channels(mut self, channels: Vec<ChannelKind>) -> Self {
        self.preferred_channels = channels;
        self
    }

    pub fn accepts(&self, channel: ChannelKind) -> bool {
        self.preferred_channels.is_empty() || self.preferred_channels.contains(&channel)
    }
}

/// Uniform contract every concrete channel implements.
///
/// A sender owns exactly one provider client. Senders constructed without a
/// provider are permanently disabled and report `is_available() == false`;
/// dispatch short-circuits those to a skip instead of attempting.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> ChannelKind;

    fn is_available(&self) -> bool;

    /// Contact info this channel needs, if the recipient carries it.
    fn destination_for(&self, recipient: &Recipient) -> Option<String>;

    async fn send(
        &self,
        destination: &str,
        content: &RenderedContent,
    ) -> Result<DeliveryId, ProviderError>;
}
