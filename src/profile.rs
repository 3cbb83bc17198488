//! Diner profiles and the test cases that wrap them.

use serde::{Deserialize, Serialize};

/// A diner's profile as supplied by the test-case source.
///
/// Field names follow the JSON the model receives; missing lists
/// deserialize as empty and empty fields are left out when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gender: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub age_group: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allergies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preferred_food_categories: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preferred_ingredients: Vec<String>,
    /// Free-form sentences of mixed polarity.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_text: Vec<String>,
}

impl Profile {
    /// Serializes the profile as the user turn sent to the model.
    ///
    /// Non-ASCII text is kept verbatim so token counts reflect what the
    /// model actually reads.
    pub fn to_user_content(&self) -> String {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
        // Serializing a struct of strings cannot fail.
        if self.serialize(&mut ser).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }

    /// Allergies, then categories, then ingredients.
    pub fn keywords(&self) -> impl Iterator<Item = &String> {
        self.allergies
            .iter()
            .chain(&self.preferred_food_categories)
            .chain(&self.preferred_ingredients)
    }

    /// Categories followed by ingredients.
    pub fn preferences(&self) -> impl Iterator<Item = &String> {
        self.preferred_food_categories
            .iter()
            .chain(&self.preferred_ingredients)
    }
}

/// One row of the benchmark matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default = "default_case_type")]
    pub case_type: String,
    pub input: Profile,
}

fn default_case_type() -> String {
    "Normal".to_string()
}

/// Compact JSON with a space after every `,` and `:`.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        writer.write_all(b": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_default_to_empty() {
        let profile: Profile = serde_json::from_str(r#"{"name":"김철수"}"#).unwrap();
        assert_eq!(profile.name, "김철수");
        assert!(profile.allergies.is_empty());
        assert!(profile.extra_text.is_empty());
    }

    #[test]
    fn user_content_keeps_hangul() {
        let profile = Profile {
            name: "김철수".into(),
            allergies: vec!["땅콩".into()],
            ..Profile::default()
        };
        let content = profile.to_user_content();
        assert!(content.contains(r#""name": "김철수""#));
        assert!(content.contains(r#""allergies": ["땅콩"]"#));
    }

    #[test]
    fn user_content_spaces_separators() {
        let profile = Profile {
            name: "민수".into(),
            allergies: vec!["새우".into(), "게".into()],
            ..Profile::default()
        };
        assert_eq!(
            profile.to_user_content(),
            r#"{"name": "민수", "allergies": ["새우", "게"]}"#
        );
        let back: Profile = serde_json::from_str(&profile.to_user_content()).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn keywords_preserve_field_order() {
        let profile = Profile {
            allergies: vec!["peanut".into()],
            preferred_food_categories: vec!["Korean".into()],
            preferred_ingredients: vec!["pork".into()],
            ..Profile::default()
        };
        let keywords: Vec<_> = profile.keywords().cloned().collect();
        assert_eq!(keywords, vec!["peanut", "Korean", "pork"]);
    }

    #[test]
    fn case_type_defaults_to_normal() {
        let case: TestCase = serde_json::from_str(r#"{"id":"TC-01","input":{}}"#).unwrap();
        assert_eq!(case.case_type, "Normal");
    }
}
