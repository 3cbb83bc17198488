use std::fmt;

/// Role of a participant in a chat exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// Instructions framing the task
    System,
    /// The user/human participant in the conversation
    User,
}

impl ChatRole {
    /// Wire name used by chat templates and the chat-completions protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single text message in a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// The role of who sent this message
    pub role: ChatRole,
    /// The text content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new builder for a system message
    pub fn system() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::System)
    }

    /// Create a new builder for a user message
    pub fn user() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::User)
    }
}

/// Builder for ChatMessage
#[derive(Debug)]
pub struct ChatMessageBuilder {
    role: ChatRole,
    content: String,
}

impl ChatMessageBuilder {
    /// Create a new ChatMessageBuilder with specified role
    pub fn new(role: ChatRole) -> Self {
        Self {
            role,
            content: String::new(),
        }
    }

    /// Set the message content
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Build the ChatMessage
    pub fn build(self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_role_and_content() {
        let msg = ChatMessage::system().content("be brief").build();
        assert_eq!(msg.role, ChatRole::System);
        assert_eq!(msg.content, "be brief");
    }

    #[test]
    fn roles_render_wire_names() {
        assert_eq!(ChatRole::System.to_string(), "system");
        assert_eq!(ChatRole::User.as_str(), "user");
    }
}
