use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channels::sender::ChannelKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// Per-(event, channel) delivery settings, read-only at request time.
#[derive(Debug, Clone)]
pub struct ChannelRoute {
    pub enabled: bool,
    pub template: String,
    pub priority: Priority,
    pub delay: Duration,
}

impl ChannelRoute {
    pub fn new(template: impl Into<String>, priority: Priority) -> Self {
        Self {
            enabled: true,
            template: template.into(),
            priority,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Static `(event type, channel) -> route` mapping, built once at startup.
/// An event's channel set is the set of channels with a route entry;
/// disabled routes still belong to the set and dispatch records them as
/// skipped.
#[derive(Debug, Default)]
pub struct EventCatalog {
    routes: BTreeMap<String, BTreeMap<ChannelKind, ChannelRoute>>,
}

impl EventCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-loaded with the case-management event set.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.insert("welcome", ChannelKind::Email, ChannelRoute::new("welcome", Priority::High));
        catalog.insert("welcome", ChannelKind::Sms, ChannelRoute::new("welcome", Priority::Medium));

        catalog.insert(
            "caseUpdate",
            ChannelKind::Email,
            ChannelRoute::new("case_update", Priority::High),
        );
        catalog.insert(
            "caseUpdate",
            ChannelKind::Sms,
            ChannelRoute::new("case_update", Priority::High),
        );
        catalog.insert(
            "caseUpdate",
            ChannelKind::WhatsApp,
            ChannelRoute::new("case_update", Priority::Medium),
        );

        catalog.insert(
            "appointmentReminder",
            ChannelKind::Email,
            ChannelRoute::new("appointment_reminder", Priority::High),
        );
        catalog.insert(
            "appointmentReminder",
            ChannelKind::Sms,
            ChannelRoute::new("appointment_reminder", Priority::High),
        );

        catalog.insert(
            "hearingReminder",
            ChannelKind::Email,
            ChannelRoute::new("hearing_reminder", Priority::Critical),
        );
        catalog.insert(
            "hearingReminder",
            ChannelKind::Sms,
            ChannelRoute::new("hearing_reminder", Priority::Critical),
        );
        catalog.insert(
            "hearingReminder",
            ChannelKind::WhatsApp,
            ChannelRoute::new("hearing_reminder", Priority::High),
        );

        catalog.insert(
            "paymentConfirmation",
            ChannelKind::Email,
            ChannelRoute::new("payment_confirmation", Priority::Medium),
        );
        catalog.insert(
            "paymentConfirmation",
            ChannelKind::Sms,
            ChannelRoute::new("payment_confirmation", Priority::Medium),
        );

        catalog.insert(
            "paymentReceived",
            ChannelKind::Email,
            ChannelRoute::new("payment_received", Priority::Medium),
        );

        // Portal messages batch up; the delay keeps rapid chat exchanges
        // from producing an email per line.
        catalog.insert(
            "newMessage",
            ChannelKind::Email,
            ChannelRoute::new("new_message", Priority::Low)
                .with_delay(Duration::from_secs(120)),
        );
        catalog.insert(
            "newMessage",
            ChannelKind::WhatsApp,
            ChannelRoute::new("new_message", Priority::Medium),
        );

        catalog.insert(
            "documentUploaded",
            ChannelKind::Email,
            ChannelRoute::new("document_uploaded", Priority::Low),
        );
        catalog
    }

    pub fn insert(&mut self, event_type: &str, channel: ChannelKind, route: ChannelRoute) {
        self.routes
            .entry(event_type.to_string())
            .or_default()
            .insert(channel, route);
    }

    pub fn knows(&self, event_type: &str) -> bool {
        self.routes
            .get(event_type)
            .is_some_and(|channels| !channels.is_empty())
    }

    pub fn route(&self, event_type: &str, channel: ChannelKind) -> Option<&ChannelRoute> {
        self.routes.get(event_type)?.get(&channel)
    }

    pub fn is_enabled(&self, event_type: &str, channel: ChannelKind) -> bool {
        self.route(event_type, channel)
            .is_some_and(|route| route.enabled)
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}
