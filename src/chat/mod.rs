mod message;
mod sse;
mod stream;
mod usage;

pub use message::{ChatMessage, ChatMessageBuilder, ChatRole};
pub use stream::{StreamChoice, StreamDelta, StreamResponse};
pub use usage::Usage;

pub(crate) use sse::{create_sse_stream, parse_chat_chunk};
