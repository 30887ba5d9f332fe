use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::channels::sender::{ChannelKind, ChannelSender};
use crate::config::{ConfigError, NotifyConfig};
use crate::dispatch::error::{DispatchError, DispatchResult};
use crate::dispatch::outcome::{ChannelOutcome, NotificationRequest, NotificationResult, SkipReason};
use crate::dispatch::quiet_hours::QuietHours;
use crate::events::{ChannelRoute, EventCatalog};
use crate::retry::{RetryPolicy, retry_send};
use crate::templates::TemplateStore;

/// Fans one notification request out to every channel its event routes to,
/// concurrently, and aggregates the per-channel outcomes.
pub struct Dispatcher {
    catalog: Arc<EventCatalog>,
    templates: Arc<TemplateStore>,
    senders: BTreeMap<ChannelKind, Arc<dyn ChannelSender>>,
    retry: BTreeMap<ChannelKind, RetryPolicy>,
    quiet_hours: Option<QuietHours>,
    timeout: Duration,
}

impl Dispatcher {
    /// Build from configuration. Senders for globally disabled channels are
    /// dropped here; their events skip as provider-unavailable.
    pub fn new(
        config: &NotifyConfig,
        templates: TemplateStore,
        senders: Vec<Arc<dyn ChannelSender>>,
    ) -> Result<Self, ConfigError> {
        let mut by_channel: BTreeMap<ChannelKind, Arc<dyn ChannelSender>> = BTreeMap::new();
        for sender in senders {
            let kind = sender.channel();
            if !config.channel_enabled(kind) {
                tracing::info!(
                    event = "channel_disabled_by_config",
                    channel = %kind,
                    "channel disabled, sends will be skipped"
                );
                continue;
            }
            by_channel.insert(kind, sender);
        }
        let retry = ChannelKind::ALL
            .into_iter()
            .map(|kind| (kind, config.retry_policy(kind)))
            .collect();
        Ok(Self {
            catalog: Arc::new(config.catalog()),
            templates: Arc::new(templates),
            senders: by_channel,
            retry,
            quiet_hours: config.quiet_hours()?,
            timeout: config.dispatch_timeout(),
        })
    }

    /// Assemble a dispatcher from already-built parts (used by tests and by
    /// callers managing their own catalog).
    pub fn with_parts(
        catalog: EventCatalog,
        templates: TemplateStore,
        senders: Vec<Arc<dyn ChannelSender>>,
        retry: BTreeMap<ChannelKind, RetryPolicy>,
        quiet_hours: Option<QuietHours>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            templates: Arc::new(templates),
            senders: senders
                .into_iter()
                .map(|sender| (sender.channel(), sender))
                .collect(),
            retry,
            quiet_hours,
            timeout,
        }
    }

    /// Dispatch one request. Fails only for an event type with no routes;
    /// every requested channel otherwise ends with exactly one outcome.
    pub async fn dispatch(&self, request: NotificationRequest) -> DispatchResult<NotificationResult> {
        let now = chrono::Utc::now();
        if !self.catalog.knows(&request.event_type) {
            tracing::warn!(
                event = "dispatch_unknown_event",
                event_type = %request.event_type,
                recipient_id = %request.recipient.id,
                "no channel routes configured for event"
            );
            return Err(DispatchError::UnknownEvent(request.event_type));
        }

        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            event = "dispatch_started",
            notification_id = %id,
            event_type = %request.event_type,
            recipient_id = %request.recipient.id,
            "dispatching notification"
        );

        let mut settled: Vec<ChannelOutcome> = Vec::new();
        let mut tasks = Vec::new();

        for kind in ChannelKind::ALL {
            let Some(route) = self.catalog.route(&request.event_type, kind) else {
                continue;
            };
            match self.plan_channel(kind, route, &request, now) {
                ChannelPlan::Settled(outcome) => {
                    tracing::debug!(
                        event = "channel_skipped",
                        notification_id = %id,
                        channel = %kind,
                        reason = outcome.skip_reason().map(|reason| reason.as_str()).unwrap_or("-"),
                        "channel resolved without sending"
                    );
                    settled.push(outcome);
                }
                ChannelPlan::Send { destination } => {
                    let sender = Arc::clone(&self.senders[&kind]);
                    let templates = Arc::clone(&self.templates);
                    let policy = self.retry.get(&kind).copied().unwrap_or_default();
                    let route = route.clone();
                    let data = request.data.clone();
                    let notification_id = id.clone();
                    tasks.push((
                        kind,
                        tokio::spawn(async move {
                            send_channel(
                                kind,
                                sender,
                                templates,
                                route,
                                destination,
                                data,
                                policy,
                                notification_id,
                            )
                            .await
                        }),
                    ));
                }
            }
        }

        // Bounded typed join. A channel that misses the deadline is failed
        // here while its spawned task keeps running detached.
        let deadline = tokio::time::Instant::now() + self.timeout;
        let joined = join_all(tasks.into_iter().map(|(kind, handle)| async move {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_err)) => {
                    ChannelOutcome::failed(kind, format!("channel task failed: {join_err}"))
                }
                Err(_) => ChannelOutcome::failed(kind, "timeout"),
            }
        }))
        .await;

        let mut channels = BTreeMap::new();
        for outcome in settled.into_iter().chain(joined) {
            channels.insert(outcome.channel, outcome);
        }

        let sent = channels.values().filter(|outcome| outcome.is_sent()).count();
        tracing::info!(
            event = "dispatch_finished",
            notification_id = %id,
            event_type = %request.event_type,
            recipient_id = %request.recipient.id,
            channels = channels.len(),
            sent,
            "dispatch complete"
        );

        Ok(NotificationResult {
            id,
            event_type: request.event_type,
            recipient_id: request.recipient.id,
            timestamp: now,
            channels,
        })
    }

    fn plan_channel(
        &self,
        kind: ChannelKind,
        route: &ChannelRoute,
        request: &NotificationRequest,
        now: chrono::DateTime<chrono::Utc>,
    ) -> ChannelPlan {
        if !route.enabled {
            return ChannelPlan::Settled(ChannelOutcome::skipped(kind, SkipReason::Disabled));
        }
        if !request.recipient.accepts(kind) {
            return ChannelPlan::Settled(ChannelOutcome::skipped(kind, SkipReason::OptedOut));
        }
        let Some(sender) = self.senders.get(&kind) else {
            return ChannelPlan::Settled(ChannelOutcome::skipped(
                kind,
                SkipReason::ProviderUnavailable,
            ));
        };
        let Some(destination) = sender.destination_for(&request.recipient) else {
            return ChannelPlan::Settled(ChannelOutcome::skipped(kind, SkipReason::NoContactInfo));
        };
        if let Some(quiet) = &self.quiet_hours
            && quiet.contains(now)
            && !quiet.bypasses(route.priority)
        {
            return ChannelPlan::Settled(ChannelOutcome::skipped_until(
                kind,
                SkipReason::QuietHours,
                quiet.next_window_end(now),
            ));
        }
        if !sender.is_available() {
            return ChannelPlan::Settled(ChannelOutcome::skipped(
                kind,
                SkipReason::ProviderUnavailable,
            ));
        }
        ChannelPlan::Send { destination }
    }
}

enum ChannelPlan {
    Settled(ChannelOutcome),
    Send { destination: String },
}

#[allow(clippy::too_many_arguments)]
async fn send_channel(
    kind: ChannelKind,
    sender: Arc<dyn ChannelSender>,
    templates: Arc<TemplateStore>,
    route: ChannelRoute,
    destination: String,
    data: Map<String, Value>,
    policy: RetryPolicy,
    notification_id: String,
) -> ChannelOutcome {
    if route.delay > Duration::ZERO {
        tokio::time::sleep(route.delay).await;
    }
    let content = match templates.render(&route.template, kind, &data) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(
                event = "channel_render_failed",
                notification_id = %notification_id,
                channel = %kind,
                template = %route.template,
                error = %err,
                "template rendering failed"
            );
            return ChannelOutcome::failed(kind, err.to_string());
        }
    };

    let sender_ref = sender.as_ref();
    let content_ref = &content;
    let destination_ref = destination.as_str();
    let notification_ref = notification_id.as_str();
    let result = retry_send(&policy, |attempt| async move {
        tracing::debug!(
            event = "channel_send_attempt",
            notification_id = %notification_ref,
            channel = %kind,
            attempt,
            "attempting provider send"
        );
        sender_ref.send(destination_ref, content_ref).await
    })
    .await;

    match result {
        Ok(provider_id) => {
            tracing::info!(
                event = "channel_sent",
                notification_id = %notification_id,
                channel = %kind,
                provider_id = %provider_id,
                "provider accepted message"
            );
            ChannelOutcome::sent(kind, provider_id)
        }
        Err(err) => {
            tracing::warn!(
                event = "channel_failed",
                notification_id = %notification_id,
                channel = %kind,
                error = %err,
                "channel delivery failed"
            );
            ChannelOutcome::failed(kind, err.to_string())
        }
    }
}
