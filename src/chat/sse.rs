use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::error::BenchError;

use super::stream::StreamResponse;

const SSE_DELIMITER: &str = "\n\n";
const DONE_MARKER: &str = "[DONE]";

pub(crate) type SseStream<T> = Pin<Box<dyn Stream<Item = Result<T, BenchError>> + Send>>;

/// Turns a streamed HTTP body into parsed server-sent events.
///
/// Network chunks may split both events and multi-byte characters; both are
/// buffered until complete before `parser` sees them. A final event left
/// without its blank line is still parsed when the body ends.
pub(crate) fn create_sse_stream<T, F>(response: reqwest::Response, parser: F) -> SseStream<T>
where
    T: Send + 'static,
    F: Fn(&str) -> Result<Option<T>, BenchError> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .map(Some)
        .chain(futures::stream::once(async { None }))
        .scan(SseState::default(), move |state, chunk| {
            let results = match chunk {
                Some(chunk) => handle_chunk(state, chunk, &parser),
                None => state.flush(&parser),
            };
            async move { Some(results) }
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

/// Parses one chat-completions SSE event into a [`StreamResponse`].
///
/// Comment lines, empty events and the `[DONE]` terminator yield `None`.
pub(crate) fn parse_chat_chunk(event: &str) -> Result<Option<StreamResponse>, BenchError> {
    for line in event.lines() {
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == DONE_MARKER {
            return Ok(None);
        }
        let value: serde_json::Value =
            serde_json::from_str(data).map_err(|e| BenchError::ResponseFormatError {
                message: format!("Failed to parse stream chunk: {e}"),
                raw_response: data.to_string(),
            })?;
        if let Some(err) = value.get("error") {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_owned)
                .unwrap_or_else(|| err.to_string());
            return Err(BenchError::ProviderError(message));
        }
        let chunk = serde_json::from_value(value).map_err(|e| BenchError::ResponseFormatError {
            message: format!("Unexpected stream chunk shape: {e}"),
            raw_response: data.to_string(),
        })?;
        return Ok(Some(chunk));
    }
    Ok(None)
}

#[derive(Default)]
struct SseState {
    buffer: String,
    utf8_buffer: Vec<u8>,
}

fn handle_chunk<T, F>(
    state: &mut SseState,
    chunk: Result<Bytes, reqwest::Error>,
    parser: &F,
) -> Vec<Result<T, BenchError>>
where
    F: Fn(&str) -> Result<Option<T>, BenchError>,
{
    let bytes = match chunk {
        Ok(bytes) => bytes,
        Err(err) => return vec![Err(BenchError::HttpError(err.to_string()))],
    };

    state.push_bytes(&bytes);
    state.drain_events(parser)
}

impl SseState {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.utf8_buffer.extend_from_slice(bytes);
        match std::str::from_utf8(&self.utf8_buffer) {
            Ok(text) => {
                self.buffer.push_str(&text.replace("\r\n", "\n"));
                self.utf8_buffer.clear();
            }
            Err(err) => self.consume_valid_prefix(err.valid_up_to()),
        }
    }

    fn consume_valid_prefix(&mut self, valid_up_to: usize) {
        if valid_up_to == 0 {
            return;
        }

        let valid = String::from_utf8_lossy(&self.utf8_buffer[..valid_up_to]);
        self.buffer.push_str(&valid.replace("\r\n", "\n"));
        self.utf8_buffer.drain(..valid_up_to);
    }

    fn drain_events<T, F>(&mut self, parser: &F) -> Vec<Result<T, BenchError>>
    where
        F: Fn(&str) -> Result<Option<T>, BenchError>,
    {
        let mut results = Vec::new();
        while let Some(event) = self.next_event() {
            match parser(&event) {
                Ok(Some(content)) => results.push(Ok(content)),
                Ok(None) => {}
                Err(err) => results.push(Err(err)),
            }
        }
        results
    }

    /// Parses whatever is left once the body has ended.
    fn flush<T, F>(&mut self, parser: &F) -> Vec<Result<T, BenchError>>
    where
        F: Fn(&str) -> Result<Option<T>, BenchError>,
    {
        if !self.utf8_buffer.is_empty() {
            let rest = String::from_utf8_lossy(&self.utf8_buffer).replace("\r\n", "\n");
            self.buffer.push_str(&rest);
            self.utf8_buffer.clear();
        }
        let mut results = self.drain_events(parser);
        let rest = std::mem::take(&mut self.buffer);
        if !rest.trim().is_empty() {
            match parser(&rest) {
                Ok(Some(content)) => results.push(Ok(content)),
                Ok(None) => {}
                Err(err) => results.push(Err(err)),
            }
        }
        results
    }

    fn next_event(&mut self) -> Option<String> {
        let pos = self.buffer.find(SSE_DELIMITER)?;
        let end = pos + SSE_DELIMITER.len();
        let event = self.buffer[..end].to_string();
        self.buffer.drain(..end);
        Some(event)
    }
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
