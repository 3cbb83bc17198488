//! Generation adapter normalizing in-process and remote streaming inference
//! into one timed, token-accounted [`GenerationResult`].

#[cfg(feature = "local")]
mod candle;
mod local;
mod remote;

use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::profile::Profile;

#[cfg(feature = "local")]
pub use candle::CandleModel;
pub use local::{LocalModel, SamplingParams};

use local::LocalBackend;
use remote::RemoteBackend;

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_NEW_TOKENS: u32 = 1024;

/// Inference strategy, fixed when the adapter is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Model weights loaded and executed in this process
    Local,
    /// OpenAI-compatible chat-completions server, consumed as a stream
    Remote,
}

impl std::str::FromStr for BackendMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(BackendMode::Local),
            "remote" => Ok(BackendMode::Remote),
            _ => Err(BenchError::Config(format!("Unknown backend mode: {s}"))),
        }
    }
}

/// Sampling and transport knobs shared by both backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Cap on newly generated tokens (in-process backend only).
    pub max_new_tokens: u32,
    /// Ask the server for in-band usage statistics on the stream.
    pub stream_usage: bool,
    /// Whole-request timeout for remote calls. None waits indefinitely.
    pub timeout_seconds: Option<u64>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            stream_usage: true,
            timeout_seconds: None,
        }
    }
}

/// Outcome of one `generate` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    text: String,
    ttft: f64,
    latency: f64,
    input_tokens: u32,
    output_tokens: u32,
}

impl GenerationResult {
    pub(crate) fn new(
        text: String,
        ttft: f64,
        latency: f64,
        input_tokens: u32,
        output_tokens: u32,
    ) -> Self {
        Self {
            text,
            ttft,
            latency,
            input_tokens,
            output_tokens,
        }
    }

    /// Envelope standing in for a failed call: `{"error": "<message>"}`
    /// with zeroed timings and token counts.
    pub fn error(message: impl Into<String>) -> Self {
        let message = serde_json::Value::String(message.into());
        Self::new(format!("{{\"error\": {message}}}"), 0.0, 0.0, 0, 0)
    }

    /// Sanitized model output.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Seconds until the first visible output fragment.
    pub fn ttft(&self) -> f64 {
        self.ttft
    }

    /// Seconds for the whole call.
    pub fn latency(&self) -> f64 {
        self.latency
    }

    pub fn input_tokens(&self) -> u32 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u32 {
        self.output_tokens
    }
}

enum Backend {
    Local(LocalBackend),
    Remote(RemoteBackend),
}

/// One model's generation entry point.
///
/// Built once per model; `generate` never fails, backend errors come back
/// as [`GenerationResult::error`] envelopes. Dropping the adapter releases
/// the backend and, for in-process models, the weights.
pub struct GenerationAdapter {
    model_id: String,
    backend: Backend,
}

impl GenerationAdapter {
    /// Builds the backend for `mode`.
    ///
    /// # Errors
    ///
    /// [`BenchError::Initialization`] when the in-process runtime is not
    /// compiled in or cannot load the model, or when the remote client
    /// cannot be built.
    pub fn new(
        model_id: impl Into<String>,
        credential: Option<String>,
        endpoint: Option<String>,
        mode: BackendMode,
        options: &GenerationOptions,
    ) -> Result<Self, BenchError> {
        let model_id = model_id.into();
        let backend = match mode {
            BackendMode::Local => {
                let model = load_local_model(&model_id)?;
                Backend::Local(LocalBackend::new(model, options))
            }
            BackendMode::Remote => Backend::Remote(
                RemoteBackend::new(&model_id, credential, endpoint, options)
                    .map_err(|e| BenchError::Initialization(e.to_string()))?,
            ),
        };
        log::info!("Initialized {mode:?} backend for {model_id}");
        Ok(Self { model_id, backend })
    }

    /// Wraps an already-loaded in-process model.
    pub fn with_local_model(
        model_id: impl Into<String>,
        model: Box<dyn LocalModel>,
        options: &GenerationOptions,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            backend: Backend::Local(LocalBackend::new(model, options)),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn mode(&self) -> BackendMode {
        match self.backend {
            Backend::Local(_) => BackendMode::Local,
            Backend::Remote(_) => BackendMode::Remote,
        }
    }

    /// Generates a persona for `profile` under `system_prompt`.
    pub async fn generate(&self, system_prompt: &str, profile: &Profile) -> GenerationResult {
        let outcome = match &self.backend {
            Backend::Local(backend) => backend.generate(system_prompt, profile),
            Backend::Remote(backend) => backend.generate(system_prompt, profile).await,
        };
        match outcome {
            Ok(result) => {
                log::debug!(
                    "{}: latency {:.3}s, ttft {:.3}s, tokens {}/{}",
                    self.model_id,
                    result.latency,
                    result.ttft,
                    result.input_tokens,
                    result.output_tokens
                );
                result
            }
            Err(err) => {
                log::warn!("Generation failed for {}: {err}", self.model_id);
                GenerationResult::error(err.to_string())
            }
        }
    }
}

#[cfg(feature = "local")]
fn load_local_model(model_id: &str) -> Result<Box<dyn LocalModel>, BenchError> {
    CandleModel::load(model_id)
        .map(|model| Box::new(model) as Box<dyn LocalModel>)
        .map_err(|e| BenchError::Initialization(format!("failed to load {model_id}: {e}")))
}

#[cfg(not(feature = "local"))]
fn load_local_model(model_id: &str) -> Result<Box<dyn LocalModel>, BenchError> {
    Err(BenchError::Initialization(format!(
        "cannot load {model_id}: in-process inference requires the `local` feature"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use crate::scoring::score;

    struct FailingModel;

    impl LocalModel for FailingModel {
        fn generate(&mut self, _prompt: &str, _params: &SamplingParams) -> Result<String, BenchError> {
            Err(BenchError::LocalRuntime("CUDA out of memory".into()))
        }

        fn count_tokens(&self, _text: &str) -> Result<u32, BenchError> {
            Ok(0)
        }
    }

    struct EchoModel;

    impl LocalModel for EchoModel {
        fn apply_chat_template(
            &self,
            _messages: &[ChatMessage],
        ) -> Option<Result<String, BenchError>> {
            Some(Ok("<s>templated".into()))
        }

        fn generate(&mut self, _prompt: &str, _params: &SamplingParams) -> Result<String, BenchError> {
            Ok("```json\n{\"ok\": true}\n```".into())
        }

        fn count_tokens(&self, text: &str) -> Result<u32, BenchError> {
            Ok(text.split_whitespace().count() as u32)
        }
    }

    #[test]
    fn error_envelope_is_json_object() {
        let result = GenerationResult::error("timed out \"here\"");
        assert_eq!(result.text(), r#"{"error": "timed out \"here\""}"#);
        let value: serde_json::Value = serde_json::from_str(result.text()).unwrap();
        assert_eq!(value["error"], "timed out \"here\"");
        assert_eq!(result.ttft(), 0.0);
        assert_eq!(result.latency(), 0.0);
        assert_eq!(result.input_tokens(), 0);
        assert_eq!(result.output_tokens(), 0);
    }

    #[tokio::test]
    async fn backend_failure_becomes_error_envelope() {
        let adapter = GenerationAdapter::with_local_model(
            "broken",
            Box::new(FailingModel),
            &GenerationOptions::default(),
        );
        let result = adapter.generate("system", &Profile::default()).await;

        let value: serde_json::Value = serde_json::from_str(result.text()).unwrap();
        assert!(value["error"].as_str().unwrap().contains("CUDA out of memory"));
        assert_eq!(result.latency(), 0.0);
        assert_eq!(result.output_tokens(), 0);

        let card = score(&Profile::default(), result.text());
        assert_eq!(card.json_schema_compliance, 0.5);
    }

    #[tokio::test]
    async fn local_results_are_sanitized() {
        let adapter = GenerationAdapter::with_local_model(
            "echo",
            Box::new(EchoModel),
            &GenerationOptions::default(),
        );
        assert_eq!(adapter.mode(), BackendMode::Local);
        let result = adapter.generate("system", &Profile::default()).await;
        assert_eq!(result.text(), "{\"ok\": true}");
        assert_eq!(result.ttft(), 0.0);
        assert_eq!(result.input_tokens(), 1);
        assert_eq!(result.output_tokens(), 4);
    }

    #[cfg(not(feature = "local"))]
    #[test]
    fn local_mode_without_runtime_fails_initialization() {
        let err = GenerationAdapter::new(
            "google/gemma-2-9b-it",
            None,
            None,
            BackendMode::Local,
            &GenerationOptions::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, BenchError::Initialization(_)));
    }

    #[test]
    fn backend_mode_parses_case_insensitively() {
        assert_eq!("Remote".parse::<BackendMode>().unwrap(), BackendMode::Remote);
        assert_eq!("local".parse::<BackendMode>().unwrap(), BackendMode::Local);
        assert!("hf".parse::<BackendMode>().is_err());
    }
}
