use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generation::GenerationResult;
use crate::profile::{Profile, TestCase};
use crate::scoring::ScoreCard;

/// One graded generation: the row handed to the report writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub test_id: String,
    pub case_type: String,
    pub model_name: String,
    pub input: Profile,
    /// Parsed JSON when the text holds a non-empty value, else the raw text.
    pub output: Value,
    pub metrics: ScoreCard,
    /// Wall-clock seconds for the whole call.
    #[serde(rename = "execution_time", alias = "latency")]
    pub latency: f64,
    pub ttft: f64,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl EvalRecord {
    pub(crate) fn new(
        case: &TestCase,
        model_name: &str,
        result: &GenerationResult,
        metrics: ScoreCard,
    ) -> Self {
        Self {
            test_id: case.id.clone(),
            case_type: case.case_type.clone(),
            model_name: model_name.to_string(),
            input: case.input.clone(),
            output: report_output(result.text()),
            metrics,
            latency: result.latency(),
            ttft: result.ttft(),
            input_tokens: result.input_tokens(),
            output_tokens: result.output_tokens(),
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

fn report_output(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(value) if is_truthy(&value) => value,
        _ => Value::String(text.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parsed_object_is_kept_structured() {
        assert_eq!(report_output(r#"{"a": [1]}"#), json!({"a": [1]}));
    }

    #[test]
    fn unparsable_or_empty_values_fall_back_to_text() {
        assert_eq!(report_output("not json"), json!("not json"));
        assert_eq!(report_output("{}"), json!("{}"));
        assert_eq!(report_output("[]"), json!("[]"));
        assert_eq!(report_output("0"), json!("0"));
        assert_eq!(report_output(""), json!(""));
    }

    #[test]
    fn latency_serializes_as_execution_time() {
        let case = TestCase {
            id: "TC-01".into(),
            case_type: "Normal".into(),
            input: Profile::default(),
        };
        let record = EvalRecord::new(
            &case,
            "GPT-4o",
            &GenerationResult::error("boom"),
            ScoreCard::seeded(),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["execution_time"], json!(0.0));
        assert!(value.get("latency").is_none());
        assert_eq!(value["output"], json!({"error": "boom"}));

        let back: EvalRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
