use std::sync::{Arc, Mutex};

use serde_json::json;

use docket_notify::channels::provider::{DeliveryId, MessagingProvider};
use docket_notify::channels::sender::{ChannelKind, ChannelSender, Recipient};
use docket_notify::channels::sms::SmsSender;
use docket_notify::config::NotifyConfig;
use docket_notify::dispatch::dispatcher::Dispatcher;
use docket_notify::dispatch::outcome::{ChannelStatus, NotificationRequest};
use docket_notify::templates::TemplateStore;

struct CountingMessaging {
    attempts: Arc<Mutex<u32>>,
    succeed_on: Option<u32>,
    error: &'static str,
}

impl CountingMessaging {
    fn new(succeed_on: Option<u32>, error: &'static str) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(0)),
            succeed_on,
            error,
        }
    }
}

#[async_trait::async_trait]
impl MessagingProvider for CountingMessaging {
    async fn send_text(&self, _to: &str, _body: &str) -> Result<DeliveryId, anyhow::Error> {
        let mut attempts = self.attempts.lock().unwrap();
        *attempts += 1;
        match self.succeed_on {
            Some(goal) if *attempts >= goal => Ok(format!("msg-{}", *attempts)),
            _ => Err(anyhow::anyhow!("{}", self.error)),
        }
    }
}

fn sms_only_dispatcher(config: &NotifyConfig, provider: Arc<dyn MessagingProvider>) -> Dispatcher {
    let senders: Vec<Arc<dyn ChannelSender>> = vec![Arc::new(SmsSender::new(
        provider,
        config.country_code().to_string(),
    ))];
    Dispatcher::new(
        config,
        TemplateStore::with_defaults(config.sms_max_length()),
        senders,
    )
    .expect("dispatcher builds")
}

fn fast_retry_config() -> NotifyConfig {
    NotifyConfig::from_toml_str(
        r#"
        [sms.retry]
        max_retries = 2
        base_delay_ms = 1
        max_delay_ms = 5
        "#,
    )
    .expect("parses")
}

fn sms_request(phone: &str) -> NotificationRequest {
    NotificationRequest::new(
        Recipient::new("client-3").with_phone(phone),
        "caseUpdate",
        json!({"case_number": "HC/42/2026", "update": "Mention adjourned to Friday"}),
    )
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let provider = Arc::new(CountingMessaging::new(Some(3), "connection reset by peer"));
    let dispatcher = sms_only_dispatcher(&fast_retry_config(), provider.clone());

    let result = dispatcher
        .dispatch(sms_request("0712345678"))
        .await
        .expect("known event");

    assert!(result.outcome(ChannelKind::Sms).unwrap().is_sent());
    assert_eq!(*provider.attempts.lock().unwrap(), 3);
}

#[tokio::test]
async fn retry_budget_is_never_exceeded() {
    let provider = Arc::new(CountingMessaging::new(None, "gateway unavailable"));
    let dispatcher = sms_only_dispatcher(&fast_retry_config(), provider.clone());

    let result = dispatcher
        .dispatch(sms_request("0712345678"))
        .await
        .expect("known event");

    let outcome = result.outcome(ChannelKind::Sms).unwrap();
    let ChannelStatus::Failed { error } = &outcome.status else {
        panic!("expected exhausted retries, got {:?}", outcome.status);
    };
    assert!(error.contains("gateway unavailable"));
    // max_retries = 2 means one initial attempt plus two retries.
    assert_eq!(*provider.attempts.lock().unwrap(), 3);
}

#[tokio::test]
async fn terminal_errors_are_not_retried() {
    let provider = Arc::new(CountingMessaging::new(None, "account suspended"));
    let dispatcher = sms_only_dispatcher(&fast_retry_config(), provider.clone());

    let result = dispatcher
        .dispatch(sms_request("0712345678"))
        .await
        .expect("known event");

    let outcome = result.outcome(ChannelKind::Sms).unwrap();
    assert!(matches!(outcome.status, ChannelStatus::Failed { .. }));
    assert_eq!(*provider.attempts.lock().unwrap(), 1);
}

#[tokio::test]
async fn unmappable_phone_fails_without_touching_the_provider() {
    let provider = Arc::new(CountingMessaging::new(Some(1), "unused"));
    let dispatcher = sms_only_dispatcher(&fast_retry_config(), provider.clone());

    let result = dispatcher
        .dispatch(sms_request("12345"))
        .await
        .expect("known event");

    let outcome = result.outcome(ChannelKind::Sms).unwrap();
    let ChannelStatus::Failed { error } = &outcome.status else {
        panic!("expected invalid destination, got {:?}", outcome.status);
    };
    assert!(error.contains("invalid destination"));
    assert_eq!(*provider.attempts.lock().unwrap(), 0);
}
