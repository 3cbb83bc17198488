//! Recovers a JSON payload from markdown-wrapped model output.

use std::sync::OnceLock;

use regex::Regex;

const FENCE: &str = "```";

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The pattern is a literal; compilation cannot fail.
    RE.get_or_init(|| Regex::new(r"(?s)```json(.*?)```").unwrap())
}

/// Strips markdown code fencing from raw model text.
///
/// The first block opened with ```` ```json ```` wins and its trimmed body is
/// returned. Without one, every stray fence marker is dropped and the whole
/// text trimmed. The result is not validated as JSON.
pub fn clean_json_markdown(text: &str) -> String {
    if let Some(captures) = json_fence().captures(text) {
        if let Some(body) = captures.get(1) {
            return body.as_str().trim().to_string();
        }
    }
    text.replace(FENCE, "").trim().to_string()
}
