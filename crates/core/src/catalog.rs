//! Option catalogs — the trigger/action/condition vocabularies supplied by
//! the options service. Validators check membership only; the meaning of an
//! entry is opaque to the core.

use std::collections::{HashMap, HashSet};

use crate::types::Channel;

/// Trigger types derived from a classifier (sentiment/intent/semantic
/// analysis) require a confidence threshold before they may fire.
pub fn is_confidence_bearing(trigger_type: &str) -> bool {
    trigger_type.starts_with("sentiment_")
        || trigger_type.starts_with("intent_")
        || trigger_type.starts_with("semantic_")
}

/// Read-only view of the option vocabularies. Injected into the validators
/// so the catalog can be served from anywhere without touching the core.
pub trait Catalog: Send + Sync {
    fn trigger_types(&self, channel: Channel) -> HashSet<String>;
    fn action_types(&self) -> HashSet<String>;
    /// Condition keys that may appear in `trigger_conditions` for the given
    /// trigger type.
    fn condition_keys(&self, trigger_type: &str) -> HashSet<String>;
}

/// In-memory catalog preloaded with the console's stock vocabularies.
/// Deployments that manage options dynamically supply their own `Catalog`.
pub struct StaticCatalog {
    triggers: HashMap<Channel, HashSet<String>>,
    actions: HashSet<String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        let mut triggers: HashMap<Channel, HashSet<String>> = HashMap::new();

        let analyzed = [
            "sentiment_positive",
            "sentiment_negative",
            "sentiment_neutral",
        ];

        let mut email: HashSet<String> = [
            "email_opened",
            "email_clicked",
            "email_replied",
            "email_replied_positive",
            "email_replied_negative",
            "email_replied_neutral",
            "email_bounced",
            "email_unsubscribed",
            "intent_purchase",
            "intent_complaint",
            "intent_question",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        email.extend(analyzed.iter().map(|s| s.to_string()));
        triggers.insert(Channel::Email, email);

        let mut sms: HashSet<String> = [
            "sms_delivered",
            "sms_replied",
            "sms_replied_positive",
            "sms_replied_negative",
            "sms_replied_keyword",
            "sms_clicked",
            "sms_failed",
            "sms_opted_out",
            "intent_purchase",
            "intent_opt_out",
            "intent_callback",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        sms.extend(analyzed.iter().map(|s| s.to_string()));
        triggers.insert(Channel::Sms, sms);

        let mut call: HashSet<String> = [
            "call_answered",
            "call_voicemail",
            "call_no_answer",
            "call_busy",
            "call_failed",
            "disposition_interested",
            "disposition_not_interested",
            "disposition_callback",
            "disposition_voicemail",
            "disposition_no_answer",
            "disposition_busy",
            "disposition_wrong_number",
            "disposition_dnc",
            "disposition_appointment",
            "disposition_sale",
            "disposition_custom",
            "disposition_set",
            "outcome_positive",
            "outcome_negative",
            "outcome_neutral",
            "notes_contain",
            "intent_purchase",
            "intent_callback",
            "intent_complaint",
            "intent_objection",
            "semantic_positive_outcome",
            "semantic_negative_outcome",
            "semantic_needs_followup",
            "semantic_qualified_lead",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        call.extend(analyzed.iter().map(|s| s.to_string()));
        triggers.insert(Channel::Call, call);

        triggers.insert(
            Channel::Form,
            ["form_submitted", "form_field_value"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );

        triggers.insert(
            Channel::Whatsapp,
            [
                "message_received",
                "message_sent",
                "message_delivered",
                "message_read",
                "message_failed",
                "opted_out",
                "template_sent",
                "sentiment_positive",
                "sentiment_negative",
                "intent_purchase",
                "intent_support",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        triggers.insert(
            Channel::Messenger,
            [
                "message_received",
                "message_sent",
                "message_delivered",
                "message_read",
                "postback",
                "sentiment_positive",
                "sentiment_negative",
                "intent_purchase",
                "intent_support",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        triggers.insert(
            Channel::Linkedin,
            [
                "task_created",
                "task_completed",
                "task_overdue",
                "lead_synced",
                "connection_accepted",
                "message_replied",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        let actions: HashSet<String> = [
            "send_email",
            "send_sms",
            "schedule_call",
            "schedule_appointment",
            "send_booking_link",
            "add_tag",
            "remove_tag",
            "move_to_campaign",
            "update_status",
            "notify_user",
            "webhook",
            "add_to_sequence",
            "remove_from_sequence",
            "send_whatsapp_template",
            "send_whatsapp_message",
            "send_messenger_message",
            "create_linkedin_task",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self { triggers, actions }
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for StaticCatalog {
    fn trigger_types(&self, channel: Channel) -> HashSet<String> {
        self.triggers.get(&channel).cloned().unwrap_or_default()
    }

    fn action_types(&self) -> HashSet<String> {
        self.actions.clone()
    }

    fn condition_keys(&self, trigger_type: &str) -> HashSet<String> {
        // Common filters available to every trigger, plus per-family keys.
        let mut keys: HashSet<String> = ["sentiment", "notes_keyword"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        if trigger_type.starts_with("call_")
            || trigger_type.starts_with("disposition_")
            || trigger_type.starts_with("outcome_")
            || trigger_type.starts_with("semantic_")
            || trigger_type == "notes_contain"
        {
            keys.extend(
                [
                    "disposition_id",
                    "disposition_category",
                    "call_duration_min",
                    "call_duration_max",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
        }

        if trigger_type.starts_with("email_")
            || trigger_type.starts_with("sms_")
            || trigger_type.starts_with("message_")
            || trigger_type.starts_with("intent_")
            || trigger_type.starts_with("sentiment_")
        {
            keys.extend(
                ["reply_keyword", "response_time_hours"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }

        if trigger_type.ends_with("_clicked") {
            keys.insert("link_url_contains".to_string());
        }

        if trigger_type.starts_with("form_") {
            keys.insert("form_field".to_string());
        }

        if is_confidence_bearing(trigger_type) {
            keys.insert("confidence_threshold".to_string());
        }

        keys
    }
}
