//! Wire types for the chat completion service

use serde::{Deserialize, Serialize};

use crate::core::types::{Message, Role};

/// One `{role, content}` record of the outbound transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Body of a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<WireMessage>,
    /// Named model instance on the server side; the server picks its default when absent
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instance: Option<String>,
}

impl ChatRequest {
    pub fn new(transcript: &[Message], instance: Option<String>) -> Self {
        Self {
            messages: transcript.iter().map(WireMessage::from).collect(),
            instance,
        }
    }
}

/// A structured record carried by one `data:` line
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Upstream failure reported in-band by the chat service
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Option<ContentField>,
    #[serde(default)]
    pub message: Option<ContentField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentField {
    #[serde(default)]
    pub content: Option<String>,
}

/// Where the text of a delta came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaSource {
    /// `choices[0].delta.content` (streaming payload)
    Delta,
    /// `choices[0].message.content` (non-streaming payload)
    Message,
}

/// An incremental unit of assistant text extracted from one stream record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub text: String,
    pub source: DeltaSource,
}

impl StreamRecord {
    /// Extract the delta text, preferring the streaming field
    pub fn delta(&self) -> Option<Delta> {
        let choice = self.choices.first()?;
        let non_empty = |field: &Option<ContentField>| {
            field
                .as_ref()
                .and_then(|f| f.content.as_deref())
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };

        if let Some(text) = non_empty(&choice.delta) {
            return Some(Delta {
                text,
                source: DeltaSource::Delta,
            });
        }
        non_empty(&choice.message).map(|text| Delta {
            text,
            source: DeltaSource::Message,
        })
    }

    /// Text of an in-band error record, if this is one
    pub fn upstream_error(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}
