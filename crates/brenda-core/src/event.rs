//! Inbound messenger event, as delivered by the transport adapter.

use serde::{Deserialize, Serialize};

/// One inbound update. Exactly one of `text` / `callback_payload` is
/// normally set; events carrying neither are ignored upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub user_id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub callback_payload: Option<String>,
    pub update_id: i64,
}

impl InboundEvent {
    pub fn text_message(user_id: i64, first_name: &str, text: &str, update_id: i64) -> Self {
        Self {
            user_id,
            first_name: first_name.to_string(),
            username: None,
            text: Some(text.to_string()),
            callback_payload: None,
            update_id,
        }
    }

    pub fn callback(user_id: i64, first_name: &str, payload: &str, update_id: i64) -> Self {
        Self {
            user_id,
            first_name: first_name.to_string(),
            username: None,
            text: None,
            callback_payload: Some(payload.to_string()),
            update_id,
        }
    }

    /// The textual content of the event, whichever field carries it.
    pub fn content(&self) -> &str {
        self.text
            .as_deref()
            .or(self.callback_payload.as_deref())
            .unwrap_or_default()
    }
}
