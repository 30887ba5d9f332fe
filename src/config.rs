use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::channels::sender::ChannelKind;
use crate::dispatch::quiet_hours::QuietHours;
use crate::events::{ChannelRoute, EventCatalog, Priority};
use crate::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid quiet-hours time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// Engine configuration. Deserialized once at startup and never mutated
/// afterwards; the dispatcher receives the derived values by ownership.
#[derive(Debug, Deserialize, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub dispatch: Option<DispatchConfig>,
    #[serde(default)]
    pub quiet_hours: Option<QuietHoursConfig>,
    #[serde(default)]
    pub email: Option<ChannelSettings>,
    #[serde(default)]
    pub sms: Option<ChannelSettings>,
    #[serde(default)]
    pub whatsapp: Option<ChannelSettings>,
    #[serde(default)]
    pub events: BTreeMap<String, EventChannels>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DispatchConfig {
    pub timeout_ms: Option<u64>,
    pub country_code: Option<String>,
    pub sms_max_length: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ChannelSettings {
    pub enabled: Option<bool>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct QuietHoursConfig {
    pub start: Option<String>,
    pub end: Option<String>,
    pub timezone: Option<String>,
    /// Priorities allowed to send during quiet hours. Absent means
    /// critical-only; an explicit empty list means nothing bypasses.
    pub bypass: Option<Vec<Priority>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct EventChannels {
    pub email: Option<RouteConfig>,
    pub sms: Option<RouteConfig>,
    pub whatsapp: Option<RouteConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RouteConfig {
    pub enabled: Option<bool>,
    pub template: Option<String>,
    pub priority: Option<Priority>,
    pub delay_ms: Option<u64>,
}

impl NotifyConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: NotifyConfig = toml::from_str(raw)?;
        // Surface timezone/time mistakes at load, not at dispatch time.
        config.quiet_hours()?;
        Ok(config)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        let ms = self
            .dispatch
            .as_ref()
            .and_then(|dispatch| dispatch.timeout_ms)
            .unwrap_or(30_000);
        Duration::from_millis(ms)
    }

    pub fn country_code(&self) -> &str {
        self.dispatch
            .as_ref()
            .and_then(|dispatch| dispatch.country_code.as_deref())
            .unwrap_or("254")
    }

    pub fn sms_max_length(&self) -> usize {
        self.dispatch
            .as_ref()
            .and_then(|dispatch| dispatch.sms_max_length)
            .unwrap_or(crate::templates::SMS_SINGLE_SEGMENT)
    }

    pub fn channel_enabled(&self, channel: ChannelKind) -> bool {
        self.channel_settings(channel)
            .and_then(|settings| settings.enabled)
            .unwrap_or(true)
    }

    /// Effective retry policy for a channel: per-channel defaults overlaid
    /// with whatever the config specifies.
    pub fn retry_policy(&self, channel: ChannelKind) -> RetryPolicy {
        let defaults = default_retry(channel);
        let Some(retry) = self
            .channel_settings(channel)
            .and_then(|settings| settings.retry.as_ref())
        else {
            return defaults;
        };
        RetryPolicy {
            max_retries: retry.max_retries.unwrap_or(defaults.max_retries),
            base_delay: retry
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: retry
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
        }
    }

    pub fn quiet_hours(&self) -> Result<Option<QuietHours>, ConfigError> {
        let Some(window) = self.quiet_hours.as_ref() else {
            return Ok(None);
        };
        let (Some(start), Some(end)) = (window.start.as_deref(), window.end.as_deref()) else {
            return Ok(None);
        };
        let start = parse_local_time(start)?;
        let end = parse_local_time(end)?;
        let tz: chrono_tz::Tz = window
            .timezone
            .as_deref()
            .unwrap_or("UTC")
            .parse()
            .map_err(|_| {
                ConfigError::UnknownTimezone(
                    window.timezone.clone().unwrap_or_else(|| "UTC".to_string()),
                )
            })?;
        let bypass = window
            .bypass
            .clone()
            .unwrap_or_else(|| vec![Priority::Critical]);
        Ok(Some(QuietHours::new(start, end, tz, bypass)))
    }

    /// Event catalog: the built-in case-management set overlaid with the
    /// configured routes.
    pub fn catalog(&self) -> EventCatalog {
        let mut catalog = EventCatalog::with_defaults();
        for (event_type, channels) in &self.events {
            let entries = [
                (ChannelKind::Email, channels.email.as_ref()),
                (ChannelKind::Sms, channels.sms.as_ref()),
                (ChannelKind::WhatsApp, channels.whatsapp.as_ref()),
            ];
            for (kind, route_config) in entries {
                let Some(route_config) = route_config else {
                    continue;
                };
                let existing = catalog.route(event_type, kind).cloned();
                let template = route_config
                    .template
                    .clone()
                    .or_else(|| existing.as_ref().map(|route| route.template.clone()))
                    .unwrap_or_else(|| event_type.clone());
                let priority = route_config
                    .priority
                    .or(existing.as_ref().map(|route| route.priority))
                    .unwrap_or(Priority::Medium);
                let delay = route_config
                    .delay_ms
                    .map(Duration::from_millis)
                    .or(existing.as_ref().map(|route| route.delay))
                    .unwrap_or(Duration::ZERO);
                let mut route = ChannelRoute::new(template, priority).with_delay(delay);
                if !route_config.enabled.unwrap_or(true) {
                    route = route.disabled();
                }
                catalog.insert(event_type, kind, route);
            }
        }
        catalog
    }

    fn channel_settings(&self, channel: ChannelKind) -> Option<&ChannelSettings> {
        match channel {
            ChannelKind::Email => self.email.as_ref(),
            ChannelKind::Sms => self.sms.as_ref(),
            ChannelKind::WhatsApp => self.whatsapp.as_ref(),
        }
    }
}

pub fn default_retry(channel: ChannelKind) -> RetryPolicy {
    match channel {
        ChannelKind::Email => RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        },
        ChannelKind::Sms | ChannelKind::WhatsApp => RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        },
    }
}

fn parse_local_time(raw: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| ConfigError::InvalidTime(raw.to_string()))
}
