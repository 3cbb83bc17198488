use serde::{Deserialize, Serialize};

use super::usage::Usage;

/// Stream response chunk in the OpenAI streaming chat-completions format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamResponse {
    /// Array of choices in the response; empty on the trailing usage chunk
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Usage metadata, typically present in the final chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamResponse {
    /// Content of the first choice's delta, if it carries any text.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

/// Individual choice in a streaming response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Delta containing the incremental content
    #[serde(default)]
    pub delta: StreamDelta,
}

/// Delta content in a streaming response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    /// The incremental content, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
