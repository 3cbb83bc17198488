//! Deterministic rubric grading one model answer against its profile.
//!
//! Grading short-circuits: unless the answer is a schema-compliant persona,
//! only `json_schema_compliance` is graded and the remaining fields keep
//! their seeded defaults.

mod rubric;

use serde::{Deserialize, Serialize};

use crate::persona::{GeneratedPersona, PersonaParse};
use crate::profile::Profile;

/// How `overall_score` is averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallScoreMode {
    /// Mean over all nine fields, taken while `overall_score` is still 0.0:
    /// the eight sub-scores summed and divided by nine. Matches historical
    /// benchmark numbers.
    #[default]
    Literal,
    /// Mean of the eight sub-scores.
    Corrected,
}

/// Nine-field quality assessment of one model answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub json_schema_compliance: f64,
    pub field_coverage: f64,
    pub classification_accuracy: f64,
    pub reasoning_depth: f64,
    pub discussion_readiness: f64,
    pub specificity: f64,
    pub consistency: f64,
    pub extra_text_parsing: f64,
    pub overall_score: f64,
}

impl ScoreCard {
    /// Field names in report order.
    pub const FIELDS: [&'static str; 9] = [
        "json_schema_compliance",
        "field_coverage",
        "classification_accuracy",
        "reasoning_depth",
        "discussion_readiness",
        "specificity",
        "consistency",
        "extra_text_parsing",
        "overall_score",
    ];

    /// Card every grading pass starts from.
    ///
    /// The two penalty-style checks start at full marks.
    pub fn seeded() -> Self {
        Self {
            json_schema_compliance: 0.0,
            field_coverage: 0.0,
            classification_accuracy: 0.0,
            reasoning_depth: 0.0,
            discussion_readiness: 0.0,
            specificity: 0.0,
            consistency: 1.0,
            extra_text_parsing: 1.0,
            overall_score: 0.0,
        }
    }

    /// All nine values in [`ScoreCard::FIELDS`] order.
    pub fn values(&self) -> [f64; 9] {
        [
            self.json_schema_compliance,
            self.field_coverage,
            self.classification_accuracy,
            self.reasoning_depth,
            self.discussion_readiness,
            self.specificity,
            self.consistency,
            self.extra_text_parsing,
            self.overall_score,
        ]
    }

    fn overall(&self, mode: OverallScoreMode) -> f64 {
        let values = self.values();
        match mode {
            OverallScoreMode::Literal => values.iter().sum::<f64>() / values.len() as f64,
            OverallScoreMode::Corrected => {
                let base = &values[..8];
                base.iter().sum::<f64>() / base.len() as f64
            }
        }
    }
}

/// Grades `output` against `profile` with the literal nine-way overall mean.
pub fn score(profile: &Profile, output: &str) -> ScoreCard {
    score_with_mode(profile, output, OverallScoreMode::Literal)
}

/// Grades `output` against `profile`. Never fails; malformed output yields a
/// low-scoring card.
pub fn score_with_mode(profile: &Profile, output: &str, mode: OverallScoreMode) -> ScoreCard {
    let mut card = ScoreCard::seeded();

    let persona = match GeneratedPersona::parse(output) {
        PersonaParse::Invalid => return card,
        PersonaParse::Incomplete => {
            card.json_schema_compliance = 0.5;
            return card;
        }
        PersonaParse::Complete(persona) => persona,
    };

    card.json_schema_compliance = 1.0;
    card.field_coverage = rubric::field_coverage(profile, &persona);
    card.classification_accuracy = rubric::classification_accuracy(profile, &persona);
    card.reasoning_depth = rubric::reasoning_depth(&persona);
    card.discussion_readiness = rubric::discussion_readiness(&persona);
    card.specificity = rubric::specificity(profile, &persona);
    card.consistency = rubric::consistency(profile, &persona);
    card.extra_text_parsing = rubric::extra_text_parsing(profile, &persona);
    card.overall_score = card.overall(mode);
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn peanut_profile() -> Profile {
        Profile {
            name: "Mina".into(),
            allergies: vec!["peanut".into()],
            preferred_food_categories: vec!["Korean".into()],
            ..Profile::default()
        }
    }

    const GOOD_OUTPUT: &str = r#"{
        "persona_prompt": "You are Mina in a dinner discussion. You can never eat peanut. You prefer Korean food but it is negotiable.",
        "must_avoid": ["peanut"],
        "preferred": ["Korean"],
        "reasoning": "classified peanut as must_avoid because of allergy"
    }"#;

    #[test]
    fn malformed_json_keeps_seeded_defaults() {
        let card = score(&peanut_profile(), "Sure! Here is the persona: {");
        assert_eq!(card, ScoreCard::seeded());
        assert_eq!(card.json_schema_compliance, 0.0);
        assert_eq!(card.consistency, 1.0);
        assert_eq!(card.extra_text_parsing, 1.0);
        assert_eq!(card.overall_score, 0.0);
    }

    #[test]
    fn missing_key_gets_partial_compliance_only() {
        let card = score(
            &peanut_profile(),
            r#"{"persona_prompt":"You are Mina","must_avoid":["peanut"],"preferred":["Korean"]}"#,
        );
        assert_eq!(card.json_schema_compliance, 0.5);
        assert_eq!(card.field_coverage, 0.0);
        assert_eq!(card.classification_accuracy, 0.0);
        assert_eq!(card.reasoning_depth, 0.0);
        assert_eq!(card.discussion_readiness, 0.0);
        assert_eq!(card.specificity, 0.0);
        assert_eq!(card.consistency, 1.0);
        assert_eq!(card.extra_text_parsing, 1.0);
        assert_eq!(card.overall_score, 0.0);
    }

    #[test]
    fn error_envelope_counts_as_incomplete_json() {
        let card = score(&peanut_profile(), r#"{"error": "connection refused"}"#);
        assert_eq!(card.json_schema_compliance, 0.5);
    }

    #[test]
    fn complete_persona_is_fully_graded() {
        let card = score(&peanut_profile(), GOOD_OUTPUT);
        assert_eq!(card.json_schema_compliance, 1.0);
        assert_eq!(card.field_coverage, 1.0);
        assert_eq!(card.classification_accuracy, 1.0);
        assert_eq!(card.consistency, 1.0);
        assert_eq!(card.specificity, 1.0);
        assert_eq!(card.discussion_readiness, 1.0);
        // 50+ chars, "because", "must_avoid"
        assert_eq!(card.reasoning_depth, 1.0);
    }

    #[test]
    fn literal_overall_divides_by_nine() {
        let card = score(&peanut_profile(), GOOD_OUTPUT);
        let eight: f64 = card.values()[..8].iter().sum();
        assert_eq!(card.overall_score, eight / 9.0);
        assert!(card.overall_score <= 8.0 / 9.0 + 1e-12);
    }

    #[test]
    fn corrected_overall_divides_by_eight() {
        let card = score_with_mode(&peanut_profile(), GOOD_OUTPUT, OverallScoreMode::Corrected);
        let eight: f64 = card.values()[..8].iter().sum();
        assert_eq!(card.overall_score, eight / 8.0);
        assert!((card.overall_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn scorecard_serializes_with_report_field_names() {
        let value = serde_json::to_value(ScoreCard::seeded()).unwrap();
        let object = value.as_object().unwrap();
        for field in ScoreCard::FIELDS {
            assert!(object.contains_key(field), "missing {field}");
        }
    }

    fn profile_strategy() -> impl Strategy<Value = Profile> {
        let words = prop::collection::vec("[a-z가-힣 ]{0,8}", 0..4);
        (
            "[A-Za-z]{0,6}",
            words.clone(),
            words.clone(),
            words.clone(),
            prop::collection::vec("(never |절대 )?[a-z가-힣 ]{0,12}", 0..4),
        )
            .prop_map(|(name, allergies, categories, ingredients, extra_text)| Profile {
                name,
                allergies,
                preferred_food_categories: categories,
                preferred_ingredients: ingredients,
                extra_text,
                ..Profile::default()
            })
    }

    fn output_strategy() -> impl Strategy<Value = String> {
        let list = prop::collection::vec("[a-z가-힣 ]{0,8}", 0..4);
        prop_oneof![
            ".{0,40}",
            ("[A-Za-z가-힣 ]{0,60}", list.clone(), list, ".{0,80}").prop_map(
                |(prompt, must_avoid, preferred, reasoning)| {
                    serde_json::json!({
                        "persona_prompt": prompt,
                        "must_avoid": must_avoid,
                        "preferred": preferred,
                        "reasoning": reasoning,
                    })
                    .to_string()
                }
            ),
        ]
    }

    proptest! {
        #[test]
        fn sub_scores_stay_in_unit_interval(
            profile in profile_strategy(),
            output in output_strategy(),
        ) {
            let card = score(&profile, &output);
            for value in &card.values()[..8] {
                prop_assert!((0.0..=1.0).contains(value));
            }
            prop_assert!(card.overall_score >= 0.0);
            prop_assert!(card.overall_score <= 8.0 / 9.0 + 1e-12);
        }

        #[test]
        fn scoring_is_deterministic(
            profile in profile_strategy(),
            output in output_strategy(),
        ) {
            let first = score(&profile, &output);
            let second = score(&profile, &output);
            for (a, b) in first.values().iter().zip(second.values()) {
                prop_assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }
}
