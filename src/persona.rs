//! The persona JSON a model is asked to produce.

use serde_json::{Map, Value};

/// Keys a persona object must carry to count as schema compliant.
pub const REQUIRED_KEYS: [&str; 4] = ["persona_prompt", "must_avoid", "preferred", "reasoning"];

/// A persona parsed from model output.
///
/// List entries are kept as raw JSON values: models occasionally emit
/// numbers or objects where strings belong, and the rubric must still
/// grade them rather than reject the whole answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPersona {
    pub persona_prompt: String,
    pub must_avoid: Vec<Value>,
    pub preferred: Vec<Value>,
    pub reasoning: String,
}

/// How far model text got through schema validation.
#[derive(Debug, Clone, PartialEq)]
pub enum PersonaParse {
    /// Not valid JSON at all.
    Invalid,
    /// Valid JSON, but keys are missing or the lists are not arrays.
    Incomplete,
    /// Every required key present with array-typed lists.
    Complete(GeneratedPersona),
}

impl GeneratedPersona {
    /// Parses and validates `text` against the persona schema.
    pub fn parse(text: &str) -> PersonaParse {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return PersonaParse::Invalid;
        };
        let Some(object) = value.as_object() else {
            return PersonaParse::Incomplete;
        };
        if !REQUIRED_KEYS.iter().all(|key| object.contains_key(*key)) {
            return PersonaParse::Incomplete;
        }
        match (object.get("must_avoid"), object.get("preferred")) {
            (Some(Value::Array(must_avoid)), Some(Value::Array(preferred))) => {
                PersonaParse::Complete(GeneratedPersona {
                    persona_prompt: text_field(object, "persona_prompt"),
                    must_avoid: must_avoid.clone(),
                    preferred: preferred.clone(),
                    reasoning: text_field(object, "reasoning"),
                })
            }
            _ => PersonaParse::Incomplete,
        }
    }

    /// `must_avoid` rendered the way the rubric searches it.
    pub fn must_avoid_text(&self) -> String {
        list_repr(&self.must_avoid)
    }

    /// `preferred` rendered the way the rubric searches it.
    pub fn preferred_text(&self) -> String {
        list_repr(&self.preferred)
    }

    /// True if `needle` is contained in any string entry of `must_avoid`.
    pub fn avoids(&self, needle: &str) -> bool {
        any_entry_contains(&self.must_avoid, needle)
    }

    /// True if `needle` is contained in any string entry of `preferred`.
    pub fn prefers(&self, needle: &str) -> bool {
        any_entry_contains(&self.preferred, needle)
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn any_entry_contains(entries: &[Value], needle: &str) -> bool {
    entries
        .iter()
        .filter_map(Value::as_str)
        .any(|entry| entry.contains(needle))
}

/// Renders a list in the bracketed, single-quoted form (`['a', 'b']`).
pub fn list_repr(entries: &[Value]) -> String {
    let mut out = String::from("[");
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        push_repr(&mut out, entry);
    }
    out.push(']');
    out
}

fn push_repr(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => push_str_repr(out, s),
        Value::Array(items) => out.push_str(&list_repr(items)),
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                push_str_repr(out, key);
                out.push_str(": ");
                push_repr(out, item);
            }
            out.push('}');
        }
    }
}

fn push_str_repr(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rejects_non_json() {
        assert_eq!(GeneratedPersona::parse("not json"), PersonaParse::Invalid);
        assert_eq!(GeneratedPersona::parse(""), PersonaParse::Invalid);
    }

    #[test]
    fn parse_flags_missing_keys_and_wrong_types() {
        assert_eq!(
            GeneratedPersona::parse(r#"{"error": "boom"}"#),
            PersonaParse::Incomplete
        );
        assert_eq!(
            GeneratedPersona::parse(
                r#"{"persona_prompt":"p","must_avoid":"peanut","preferred":[],"reasoning":"r"}"#
            ),
            PersonaParse::Incomplete
        );
        assert_eq!(GeneratedPersona::parse("[1, 2]"), PersonaParse::Incomplete);
    }

    #[test]
    fn parse_accepts_complete_persona() {
        let parsed = GeneratedPersona::parse(
            r#"{"persona_prompt":"You are 민수","must_avoid":["땅콩"],"preferred":["한식"],"reasoning":"because"}"#,
        );
        let PersonaParse::Complete(persona) = parsed else {
            panic!("expected complete persona");
        };
        assert_eq!(persona.persona_prompt, "You are 민수");
        assert!(persona.avoids("땅콩"));
        assert!(persona.prefers("한"));
        assert!(!persona.prefers("땅콩"));
    }

    #[test]
    fn list_repr_matches_bracketed_quoting() {
        let entries = vec![json!("peanut"), json!("it's"), json!(3), json!(null)];
        assert_eq!(list_repr(&entries), r#"['peanut', "it's", 3, None]"#);
        assert_eq!(list_repr(&[]), "[]");
    }

    #[test]
    fn non_string_entries_are_never_contained() {
        let persona = GeneratedPersona {
            persona_prompt: String::new(),
            must_avoid: vec![json!(42)],
            preferred: vec![],
            reasoning: String::new(),
        };
        assert!(!persona.avoids("4"));
        assert!(persona.must_avoid_text().contains("42"));
    }
}
