use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::channels::sender::ChannelKind;

/// Single-segment GSM limit; longer bodies are sent as concatenated parts.
pub const SMS_SINGLE_SEGMENT: usize = 160;
const SMS_CONCAT_SEGMENT: usize = 153;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    NotFound(String),
    #[error("template '{template}' missing required fields: {fields:?}")]
    MissingFields {
        template: String,
        fields: Vec<String>,
    },
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Channel-specific payload produced per send and discarded after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedContent {
    Email {
        subject: String,
        html: String,
        text: String,
    },
    Text {
        body: String,
        length: usize,
        max_length: usize,
        over_limit: bool,
    },
}

#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    pub id: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    /// Short body used by SMS and chat-style channels.
    pub short: String,
    pub required: Vec<String>,
}

pub struct TemplateStore {
    templates: BTreeMap<String, NotificationTemplate>,
    sms_max_length: usize,
}

impl TemplateStore {
    pub fn new(sms_max_length: usize) -> Self {
        Self {
            templates: BTreeMap::new(),
            sms_max_length,
        }
    }

    /// Store pre-loaded with the case-management template set.
    pub fn with_defaults(sms_max_length: usize) -> Self {
        let mut store = Self::new(sms_max_length);
        for template in default_templates() {
            store.register(template);
        }
        store
    }

    pub fn register(&mut self, template: NotificationTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn contains(&self, template_id: &str) -> bool {
        self.templates.contains_key(template_id)
    }

    /// Render `template_id` for `channel`, validating required fields first.
    /// Over-long SMS-class bodies are a warning, not a failure.
    pub fn render(
        &self,
        template_id: &str,
        channel: ChannelKind,
        data: &Map<String, Value>,
    ) -> RenderResult<RenderedContent> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| RenderError::NotFound(template_id.to_string()))?;

        let missing: Vec<String> = template
            .required
            .iter()
            .filter(|field| !data.get(field.as_str()).is_some_and(|value| !value.is_null()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(RenderError::MissingFields {
                template: template.id.clone(),
                fields: missing,
            });
        }

        match channel {
            ChannelKind::Email => Ok(RenderedContent::Email {
                subject: substitute(&template.subject, data),
                html: substitute(&template.html, data),
                text: substitute(&template.text, data),
            }),
            ChannelKind::Sms | ChannelKind::WhatsApp => {
                let body = substitute(&template.short, data);
                let length = body.chars().count();
                let over_limit = length > self.sms_max_length;
                if over_limit {
                    tracing::warn!(
                        event = "template_over_limit",
                        template = %template.id,
                        length,
                        max_length = self.sms_max_length,
                        segments = sms_segments(length),
                        "short body exceeds single message length"
                    );
                }
                Ok(RenderedContent::Text {
                    body,
                    length,
                    max_length: self.sms_max_length,
                    over_limit,
                })
            }
        }
    }
}

/// Number of SMS parts a body of `length` characters occupies.
pub fn sms_segments(length: usize) -> usize {
    if length <= SMS_SINGLE_SEGMENT {
        1
    } else {
        length.div_ceil(SMS_CONCAT_SEGMENT)
    }
}

fn substitute(template: &str, data: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = data.get(key) {
                    out.push_str(&value_text(value));
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn template(
    id: &str,
    subject: &str,
    html: &str,
    text: &str,
    short: &str,
    required: &[&str],
) -> NotificationTemplate {
    NotificationTemplate {
        id: id.to_string(),
        subject: subject.to_string(),
        html: html.to_string(),
        text: text.to_string(),
        short: short.to_string(),
        required: required.iter().map(|field| field.to_string()).collect(),
    }
}

fn default_templates() -> Vec<NotificationTemplate> {
    vec![
        template(
            "welcome",
            "Welcome to {{firm_name}}",
            "<p>Dear {{client_name}},</p><p>Welcome to {{firm_name}}. Your client portal is ready; you can follow your matters, documents and invoices there.</p>",
            "Dear {{client_name}},\n\nWelcome to {{firm_name}}. Your client portal is ready; you can follow your matters, documents and invoices there.",
            "Welcome to {{firm_name}}, {{client_name}}. Your client portal is now active.",
            &["client_name", "firm_name"],
        ),
        template(
            "case_update",
            "Update on case {{case_number}}",
            "<p>There is a new update on your case <strong>{{case_number}}</strong>:</p><p>{{update}}</p>",
            "There is a new update on your case {{case_number}}:\n\n{{update}}",
            "Case {{case_number}}: {{update}}",
            &["case_number", "update"],
        ),
        template(
            "appointment_reminder",
            "Appointment reminder: {{appointment_date}}",
            "<p>Dear {{client_name}},</p><p>This is a reminder of your appointment on <strong>{{appointment_date}}</strong>{{location_line}}.</p>",
            "Dear {{client_name}},\n\nThis is a reminder of your appointment on {{appointment_date}}{{location_line}}.",
            "Reminder: appointment on {{appointment_date}}. Reply to reschedule.",
            &["client_name", "appointment_date"],
        ),
        template(
            "hearing_reminder",
            "Hearing for case {{case_number}} on {{hearing_date}}",
            "<p>Your case <strong>{{case_number}}</strong> is scheduled for hearing on <strong>{{hearing_date}}</strong> at {{court}}.</p>",
            "Your case {{case_number}} is scheduled for hearing on {{hearing_date}} at {{court}}.",
            "Hearing: case {{case_number}} on {{hearing_date}} at {{court}}.",
            &["case_number", "hearing_date", "court"],
        ),
        template(
            "payment_confirmation",
            "Payment received: {{reference}}",
            "<p>We have received your payment of <strong>{{amount}}</strong> (reference {{reference}}). Thank you.</p>",
            "We have received your payment of {{amount}} (reference {{reference}}). Thank you.",
            "Payment of {{amount}} received, ref {{reference}}. Thank you.",
            &["amount", "reference"],
        ),
        template(
            "payment_received",
            "Payment applied to case {{case_number}}",
            "<p>A payment of <strong>{{amount}}</strong> has been applied to case {{case_number}}.</p>",
            "A payment of {{amount}} has been applied to case {{case_number}}.",
            "Payment of {{amount}} applied to case {{case_number}}.",
            &["amount", "case_number"],
        ),
        template(
            "new_message",
            "New message from {{sender_name}}",
            "<p>You have a new message from <strong>{{sender_name}}</strong>. Sign in to your portal to read and reply.</p>",
            "You have a new message from {{sender_name}}. Sign in to your portal to read and reply.",
            "New message from {{sender_name}}. Check your portal.",
            &["sender_name"],
        ),
        template(
            "document_uploaded",
            "New document on case {{case_number}}",
            "<p>The document <strong>{{document_name}}</strong> was added to case {{case_number}}.</p>",
            "The document {{document_name}} was added to case {{case_number}}.",
            "Document {{document_name}} added to case {{case_number}}.",
            &["document_name", "case_number"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::{
        RenderError, RenderedContent, SMS_SINGLE_SEGMENT, TemplateStore, sms_segments, substitute,
        template,
    };
    use crate::channels::sender::ChannelKind;
    use serde_json::{Map, Value, json};

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn renders_email_with_substituted_fields() {
        let store = TemplateStore::with_defaults(SMS_SINGLE_SEGMENT);
        let rendered = store
            .render(
                "welcome",
                ChannelKind::Email,
                &data(json!({"client_name": "Achieng", "firm_name": "Mwangi & Otieno Advocates"})),
            )
            .expect("renders");
        let RenderedContent::Email { subject, html, text } = rendered else {
            panic!("expected email content");
        };
        assert_eq!(subject, "Welcome to Mwangi & Otieno Advocates");
        assert!(html.contains("Dear Achieng,"));
        assert!(text.contains("Mwangi & Otieno Advocates"));
    }

    #[test]
    fn unknown_template_is_not_found() {
        let store = TemplateStore::with_defaults(SMS_SINGLE_SEGMENT);
        let err = store
            .render("doesNotExist", ChannelKind::Email, &Map::new())
            .expect_err("unregistered id");
        assert!(matches!(err, RenderError::NotFound(_)));
    }

    #[test]
    fn missing_fields_are_listed() {
        let store = TemplateStore::with_defaults(SMS_SINGLE_SEGMENT);
        let err = store
            .render("case_update", ChannelKind::Sms, &data(json!({"update": "ruling issued"})))
            .expect_err("case_number absent");
        let RenderError::MissingFields { fields, .. } = err else {
            panic!("expected missing fields");
        };
        assert_eq!(fields, vec!["case_number".to_string()]);
    }

    #[test]
    fn null_counts_as_missing() {
        let store = TemplateStore::with_defaults(SMS_SINGLE_SEGMENT);
        let err = store
            .render(
                "case_update",
                ChannelKind::Sms,
                &data(json!({"case_number": null, "update": "x"})),
            )
            .expect_err("null required field");
        assert!(matches!(err, RenderError::MissingFields { .. }));
    }

    #[test]
    fn over_long_short_body_is_flagged_not_failed() {
        let mut store = TemplateStore::new(SMS_SINGLE_SEGMENT);
        store.register(template("long", "s", "h", "t", "{{body}}", &["body"]));
        let body = "x".repeat(180);
        let rendered = store
            .render("long", ChannelKind::Sms, &data(json!({"body": body})))
            .expect("still renders");
        let RenderedContent::Text {
            length,
            max_length,
            over_limit,
            ..
        } = rendered
        else {
            panic!("expected text content");
        };
        assert_eq!(length, 180);
        assert_eq!(max_length, SMS_SINGLE_SEGMENT);
        assert!(over_limit);
    }

    #[test]
    fn segment_count_follows_concatenation_rules() {
        assert_eq!(sms_segments(0), 1);
        assert_eq!(sms_segments(160), 1);
        assert_eq!(sms_segments(161), 2);
        assert_eq!(sms_segments(306), 2);
        assert_eq!(sms_segments(307), 3);
    }

    #[test]
    fn substitution_handles_numbers_and_unknown_keys() {
        let out = substitute(
            "case {{case_number}} fee {{amount}} {{unknown}}",
            &data(json!({"case_number": "HC/123/2026", "amount": 2500})),
        );
        assert_eq!(out, "case HC/123/2026 fee 2500 ");
    }
}
