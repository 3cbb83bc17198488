use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::config::ModelSpec;
use crate::error::BenchError;
use crate::generation::{GenerationAdapter, GenerationOptions, GenerationResult};
use crate::profile::{Profile, TestCase};
use crate::scoring::{score_with_mode, OverallScoreMode};

use super::types::EvalRecord;

/// Anything that can turn a profile into a persona answer.
#[async_trait]
pub trait PersonaGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, profile: &Profile) -> GenerationResult;
}

#[async_trait]
impl PersonaGenerator for GenerationAdapter {
    async fn generate(&self, system_prompt: &str, profile: &Profile) -> GenerationResult {
        GenerationAdapter::generate(self, system_prompt, profile).await
    }
}

/// Runs every test case against one model at a time.
///
/// Models are built, evaluated and dropped strictly in order, so at most one
/// set of weights or one HTTP client is alive at any moment.
pub struct BenchmarkRunner {
    cases: Vec<TestCase>,
    system_prompt: String,
    overall_mode: OverallScoreMode,
}

impl BenchmarkRunner {
    pub fn new(cases: Vec<TestCase>, system_prompt: impl Into<String>) -> Self {
        Self {
            cases,
            system_prompt: system_prompt.into(),
            overall_mode: OverallScoreMode::default(),
        }
    }

    pub fn overall_mode(mut self, mode: OverallScoreMode) -> Self {
        self.overall_mode = mode;
        self
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Builds a [`GenerationAdapter`] for each model and evaluates it.
    pub async fn run(&self, models: &[ModelSpec], options: &GenerationOptions) -> Vec<EvalRecord> {
        self.run_with(models, |spec| {
            let credential = spec.credential().map(|key| key.expose_secret().clone());
            GenerationAdapter::new(
                spec.model.clone(),
                credential,
                spec.base_url.clone(),
                spec.backend,
                options,
            )
            .map(|adapter| Box::new(adapter) as Box<dyn PersonaGenerator>)
        })
        .await
    }

    /// Like [`BenchmarkRunner::run`] with a caller-supplied constructor.
    /// Models whose constructor fails are logged and skipped.
    pub async fn run_with<F>(&self, models: &[ModelSpec], mut build: F) -> Vec<EvalRecord>
    where
        F: FnMut(&ModelSpec) -> Result<Box<dyn PersonaGenerator>, BenchError>,
    {
        let mut records = Vec::with_capacity(models.len() * self.cases.len());
        for spec in models {
            log::info!(
                "Initializing {} (ID: {}, backend: {:?})",
                spec.name,
                spec.model,
                spec.backend
            );
            let generator = match build(spec) {
                Ok(generator) => generator,
                Err(err) => {
                    log::error!("Failed to load {}: {err}", spec.name);
                    continue;
                }
            };

            records.extend(self.evaluate_model(&spec.name, generator.as_ref()).await);

            log::info!("Unloading {}", spec.name);
            drop(generator);
        }
        records
    }

    /// Generates and grades every case with one model, in case order.
    pub async fn evaluate_model(
        &self,
        model_name: &str,
        generator: &dyn PersonaGenerator,
    ) -> Vec<EvalRecord> {
        log::info!("Evaluating {model_name} on {} cases", self.cases.len());
        let mut records = Vec::with_capacity(self.cases.len());
        for case in &self.cases {
            let result = generator.generate(&self.system_prompt, &case.input).await;
            let metrics = score_with_mode(&case.input, result.text(), self.overall_mode);
            log::debug!(
                "{model_name} {}: overall {:.3}",
                case.id,
                metrics.overall_score
            );
            records.push(EvalRecord::new(case, model_name, &result, metrics));
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const PERSONA: &str = r#"{"persona_prompt":"You never eat shrimp","must_avoid":["shrimp"],"preferred":[],"reasoning":"allergy"}"#;

    struct FixedGenerator {
        text: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PersonaGenerator for FixedGenerator {
        async fn generate(&self, system_prompt: &str, profile: &Profile) -> GenerationResult {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{system_prompt}:{}", profile.name));
            GenerationResult::new(self.text.to_string(), 0.1, 0.5, 100, 40)
        }
    }

    fn cases() -> Vec<TestCase> {
        ["A", "B"]
            .iter()
            .enumerate()
            .map(|(i, name)| TestCase {
                id: format!("TC-{:02}", i + 1),
                case_type: "Allergy".into(),
                input: Profile {
                    name: name.to_string(),
                    allergies: vec!["shrimp".into()],
                    ..Profile::default()
                },
            })
            .collect()
    }

    #[tokio::test]
    async fn failed_models_are_skipped_and_order_is_kept() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let runner = BenchmarkRunner::new(cases(), "SYS");
        let models = vec![
            ModelSpec::local("HF-broken", "/nowhere.gguf"),
            ModelSpec::remote("Ollama-a", "a", None, None),
            ModelSpec::remote("Ollama-b", "b", None, None),
        ];

        let records = runner
            .run_with(&models, |spec| {
                if spec.name == "HF-broken" {
                    return Err(BenchError::Initialization("no weights".into()));
                }
                Ok(Box::new(FixedGenerator {
                    text: PERSONA,
                    seen: seen.clone(),
                }) as Box<dyn PersonaGenerator>)
            })
            .await;

        let order: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.model_name.as_str(), r.test_id.as_str()))
            .collect();
        assert_eq!(
            order,
            [
                ("Ollama-a", "TC-01"),
                ("Ollama-a", "TC-02"),
                ("Ollama-b", "TC-01"),
                ("Ollama-b", "TC-02"),
            ]
        );
        assert_eq!(seen.lock().unwrap().as_slice(), ["SYS:A", "SYS:B", "SYS:A", "SYS:B"]);
    }

    #[tokio::test]
    async fn records_carry_metrics_and_timings() {
        let runner = BenchmarkRunner::new(cases(), "SYS");
        let generator = FixedGenerator {
            text: PERSONA,
            seen: Arc::default(),
        };
        let records = runner.evaluate_model("m", &generator).await;

        let first = &records[0];
        assert_eq!(first.case_type, "Allergy");
        assert_eq!(first.metrics.json_schema_compliance, 1.0);
        assert_eq!(first.output["must_avoid"][0], "shrimp");
        assert_eq!(first.latency, 0.5);
        assert_eq!(first.ttft, 0.1);
        assert_eq!(first.total_tokens(), 140);
    }

    #[tokio::test]
    async fn overall_mode_is_applied() {
        let generator = FixedGenerator {
            text: PERSONA,
            seen: Arc::default(),
        };
        let literal = BenchmarkRunner::new(cases(), "SYS")
            .evaluate_model("m", &generator)
            .await;
        let corrected = BenchmarkRunner::new(cases(), "SYS")
            .overall_mode(OverallScoreMode::Corrected)
            .evaluate_model("m", &generator)
            .await;

        let eight: f64 = literal[0].metrics.values()[..8].iter().sum();
        assert_eq!(literal[0].metrics.overall_score, eight / 9.0);
        assert_eq!(corrected[0].metrics.overall_score, eight / 8.0);
    }
}
