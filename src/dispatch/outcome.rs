use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::channels::provider::DeliveryId;
use crate::channels::sender::{ChannelKind, Recipient};

/// One business event for one recipient. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub recipient: Recipient,
    pub event_type: String,
    pub data: Map<String, Value>,
}

impl NotificationRequest {
    /// `data` should be a JSON object; anything else becomes an empty bag.
    pub fn new(recipient: Recipient, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            recipient,
            event_type: event_type.into(),
            data: data.as_object().cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    NoContactInfo,
    OptedOut,
    QuietHours,
    ProviderUnavailable,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::NoContactInfo => "no_contact_info",
            SkipReason::OptedOut => "opted_out",
            SkipReason::QuietHours => "quiet_hours",
            SkipReason::ProviderUnavailable => "provider_unavailable",
        }
    }
}

/// Terminal state of one channel's delivery attempt within one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelStatus {
    Sent {
        provider_id: DeliveryId,
    },
    Skipped {
        reason: SkipReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        scheduled_for: Option<chrono::DateTime<chrono::Utc>>,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    pub channel: ChannelKind,
    #[serde(flatten)]
    pub status: ChannelStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ChannelOutcome {
    pub fn sent(channel: ChannelKind, provider_id: DeliveryId) -> Self {
        Self {
            channel,
            status: ChannelStatus::Sent { provider_id },
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn skipped(channel: ChannelKind, reason: SkipReason) -> Self {
        Self {
            channel,
            status: ChannelStatus::Skipped {
                reason,
                scheduled_for: None,
            },
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn skipped_until(
        channel: ChannelKind,
        reason: SkipReason,
        scheduled_for: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            channel,
            status: ChannelStatus::Skipped {
                reason,
                scheduled_for: Some(scheduled_for),
            },
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn failed(channel: ChannelKind, error: impl Into<String>) -> Self {
        Self {
            channel,
            status: ChannelStatus::Failed {
                error: error.into(),
            },
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self.status, ChannelStatus::Sent { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.status {
            ChannelStatus::Skipped { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Aggregated per-channel outcomes for one dispatch call. Owned by the
/// caller; the dispatcher keeps no copy.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationResult {
    pub id: String,
    pub event_type: String,
    pub recipient_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub channels: BTreeMap<ChannelKind, ChannelOutcome>,
}

impl NotificationResult {
    /// At least one channel accepted the message.
    pub fn delivered(&self) -> bool {
        self.channels.values().any(ChannelOutcome::is_sent)
    }

    pub fn outcome(&self, channel: ChannelKind) -> Option<&ChannelOutcome> {
        self.channels.get(&channel)
    }
}
