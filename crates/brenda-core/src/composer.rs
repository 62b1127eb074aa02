//! Response composer: merges validated LLM text with tool outputs into an
//! ordered multi-part reply for the messenger transport.

use crate::tool::{ResourceKind, ToolId, ToolResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Attachments per reply (in addition to text parts).
pub const MAX_ATTACHMENTS: usize = 4;

/// Inline-keyboard button descriptor. Callback payloads are stable strings
/// of the form `domain_action[_arg]*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub callback_payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { label: label.into(), callback_payload: payload.into() }
    }
}

/// One outbound part, in send order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyPart {
    Text { content: String },
    Document { url: String, caption: Option<String> },
    Image { url: String, caption: Option<String> },
    Video { url: String, caption: Option<String> },
    Link { url: String, caption: Option<String> },
    Keyboard { buttons: Vec<Button> },
}

impl ReplyPart {
    pub fn is_attachment(&self) -> bool {
        matches!(
            self,
            ReplyPart::Document { .. }
                | ReplyPart::Image { .. }
                | ReplyPart::Video { .. }
                | ReplyPart::Link { .. }
        )
    }
}

/// Composed outbound reply plus the transport pacing hint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reply {
    pub parts: Vec<ReplyPart>,
    /// Suggested typing delay in milliseconds; set when media is attached.
    #[serde(default)]
    pub typing_delay_ms: Option<u64>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self { parts: vec![ReplyPart::Text { content: content.into() }], typing_delay_ms: None }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, part: ReplyPart) {
        self.parts.push(part);
    }

    pub fn with_keyboard(mut self, buttons: Vec<Button>) -> Self {
        self.parts.push(ReplyPart::Keyboard { buttons });
        self
    }

    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            ReplyPart::Text { content } => Some(content.as_str()),
            _ => None,
        })
    }

    pub fn attachment_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_attachment()).count()
    }
}

static MESSAGE_DELIMITER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[MENSAJE_\d+\]").expect("message delimiter regex"));

/// Splits LLM output on the optional `[MENSAJE_k]` delimiters the model may
/// emit; each chunk becomes its own text part.
pub fn split_delimited(text: &str) -> Vec<String> {
    MESSAGE_DELIMITER_RE
        .split(text)
        .map(|chunk| chunk.trim())
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| chunk.to_string())
        .collect()
}

fn resource_part(kind: ResourceKind, url: String, caption: Option<String>) -> ReplyPart {
    match kind {
        ResourceKind::Document => ReplyPart::Document { url, caption },
        ResourceKind::Video => ReplyPart::Video { url, caption },
        ResourceKind::Link => ReplyPart::Link { url, caption },
    }
}

/// Typing-delay hint: 1–5 s bounded by the amount of text going out.
fn typing_delay_for(total_text_len: usize) -> u64 {
    (1000 + (total_text_len as u64) * 10).clamp(1000, 5000)
}

/// Merges validated LLM text and ordered tool results into a reply.
///
/// A `contact_flow` result discards the LLM narrative: only tool outputs are
/// emitted, in selection order, so closing turns read as bank details
/// followed by the advisor opening. Otherwise the LLM text leads, tool texts
/// follow in selection order, then every tool's resources preserving
/// attachment order, capped at [`MAX_ATTACHMENTS`].
pub fn compose(llm_text: Option<&str>, tool_results: &[(ToolId, ToolResult)]) -> Reply {
    let contact_flow = tool_results.iter().any(|(_, r)| r.is_contact_flow());
    let llm_text = if contact_flow { None } else { llm_text };

    let mut reply = Reply::empty();
    let mut total_text_len = 0usize;

    if let Some(text) = llm_text {
        for chunk in split_delimited(text) {
            total_text_len += chunk.len();
            reply.push(ReplyPart::Text { content: chunk });
        }
    }

    for (_, result) in tool_results {
        let content = result.content().trim();
        if !content.is_empty() {
            total_text_len += content.len();
            reply.push(ReplyPart::Text { content: content.to_string() });
        }
    }

    for (_, result) in tool_results {
        for resource in result.resources() {
            if reply.attachment_count() >= MAX_ATTACHMENTS {
                break;
            }
            reply.push(resource_part(resource.kind, resource.url.clone(), resource.caption.clone()));
        }
    }

    if reply.attachment_count() > 0 {
        reply.typing_delay_ms = Some(typing_delay_for(total_text_len));
    }
    reply
}
