/// Wire types for the relay.
///
/// The inbound types are what the browser page sends and receives on `/api/chat`. The outbound
/// types are the OpenAI-style chat completion payloads exchanged with the Guardrail Gateway.
use serde::{Deserialize, Serialize};

/// Upper bound on generated tokens requested from the gateway.
pub const MAX_TOKENS: u32 = 256;

/// The body posted by the landing page. Anything that fails to decode into this is treated the
/// same as a missing message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl InboundChatRequest {
    /// The message with surrounding whitespace removed, or `None` if nothing is left.
    pub fn trimmed_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// The chat completion request sent upstream. Always a single user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRequest {
    pub provider: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl GatewayRequest {
    pub fn single_turn(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            messages: vec![ChatMessage::user(message)],
            max_tokens: MAX_TOKENS,
        }
    }
}

/// The subset of the gateway's chat completion response that the relay reads. Every level is
/// optional so that a missing field is an explicit `None` rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayResponse {
    /// Left undecoded: only the first choice is read, whatever the others look like.
    #[serde(default)]
    pub choices: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayChoice {
    #[serde(default)]
    pub message: Option<GatewayMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayMessage {
    /// Kept as a raw value: a non-string content is a format error, not a decode error.
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

impl GatewayResponse {
    /// Reads `choices[0].message.content` out of a decoded gateway body.
    ///
    /// Returns `None` when the body does not have the chat completion shape, when there are no
    /// choices, or when the content is missing or not a string.
    pub fn reply_text(body: &serde_json::Value) -> Option<String> {
        let response = match GatewayResponse::deserialize(body) {
            Ok(response) => response,
            Err(_) => return None,
        };

        let first = match response.choices.and_then(|choices| choices.into_iter().next()) {
            Some(choice) => match GatewayChoice::deserialize(choice) {
                Ok(choice) => choice,
                Err(_) => return None,
            },
            // No choices at all is handled like a single empty choice
            None => GatewayChoice::default(),
        };

        match first.message.and_then(|message| message.content) {
            Some(serde_json::Value::String(content)) => Some(content),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Rejected,
}

/// Which side of the exchange the gateway refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionType {
    Prompt,
    Response,
}

const PROMPT_REJECTED_PREFIX: &str = "Prompt Rejected";
const RESPONSE_REJECTED_PREFIX: &str = "Response Rejected";

/// Classifies a gateway reply by its leading text. Matching is case-sensitive and not anchored
/// to any delimiter, so "Prompt Rejected" and "Prompt Rejectedness" both count.
pub fn classify_reply(reply: &str) -> (ReplyStatus, Option<RejectionType>) {
    if reply.starts_with(PROMPT_REJECTED_PREFIX) {
        (ReplyStatus::Rejected, Some(RejectionType::Prompt))
    } else if reply.starts_with(RESPONSE_REJECTED_PREFIX) {
        (ReplyStatus::Rejected, Some(RejectionType::Response))
    } else {
        (ReplyStatus::Ok, None)
    }
}

/// The body returned to the landing page on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub status: ReplyStatus,
    pub rejection_type: Option<RejectionType>,
}

impl ChatReply {
    pub fn from_gateway_text(reply: String) -> Self {
        let (status, rejection_type) = classify_reply(&reply);
        Self {
            reply,
            status,
            rejection_type,
        }
    }
}
