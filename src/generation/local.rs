use std::sync::Mutex;
use std::time::Instant;

use crate::chat::ChatMessage;
use crate::error::BenchError;
use crate::profile::Profile;
use crate::sanitize::clean_json_markdown;

use super::{GenerationOptions, GenerationResult};

/// Sampling settings for one in-process generation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_new_tokens: u32,
}

/// An in-process model together with its own tokenizer.
pub trait LocalModel: Send {
    /// Renders `messages` with the model's native chat template, ending with
    /// the assistant generation cue. `None` when the model ships no template.
    fn apply_chat_template(&self, _messages: &[ChatMessage]) -> Option<Result<String, BenchError>> {
        None
    }

    /// Samples a continuation of `prompt`; the prompt itself is not echoed.
    fn generate(&mut self, prompt: &str, params: &SamplingParams) -> Result<String, BenchError>;

    /// Number of tokens the model's tokenizer produces for `text`.
    fn count_tokens(&self, text: &str) -> Result<u32, BenchError>;
}

pub(crate) struct LocalBackend {
    model: Mutex<Box<dyn LocalModel>>,
    params: SamplingParams,
}

impl LocalBackend {
    pub(crate) fn new(model: Box<dyn LocalModel>, options: &GenerationOptions) -> Self {
        Self {
            model: Mutex::new(model),
            params: SamplingParams {
                temperature: options.temperature,
                max_new_tokens: options.max_new_tokens,
            },
        }
    }

    pub(crate) fn generate(
        &self,
        system_prompt: &str,
        profile: &Profile,
    ) -> Result<GenerationResult, BenchError> {
        let user_content = profile.to_user_content();
        let messages = [
            ChatMessage::system().content(system_prompt).build(),
            ChatMessage::user().content(user_content.as_str()).build(),
        ];

        let mut model = self
            .model
            .lock()
            .map_err(|_| BenchError::LocalRuntime("model lock poisoned".into()))?;

        let prompt = render_prompt(&**model, &messages, system_prompt, &user_content);
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Local prompt: {prompt}");
        }

        let start = Instant::now();
        let raw = model.generate(&prompt, &self.params)?;
        let latency = start.elapsed().as_secs_f64();

        let input_tokens = model.count_tokens(&prompt)?;
        let output_tokens = model.count_tokens(&raw)?;

        Ok(GenerationResult::new(
            clean_json_markdown(&raw),
            0.0,
            latency,
            input_tokens,
            output_tokens,
        ))
    }
}

fn render_prompt(
    model: &dyn LocalModel,
    messages: &[ChatMessage],
    system_prompt: &str,
    user_content: &str,
) -> String {
    match model.apply_chat_template(messages) {
        Some(Ok(prompt)) => prompt,
        Some(Err(err)) => {
            log::debug!("Chat template failed, using linear prompt: {err}");
            fallback_prompt(system_prompt, user_content)
        }
        None => fallback_prompt(system_prompt, user_content),
    }
}

/// Linear prompt used when a model has no usable chat template.
fn fallback_prompt(system_prompt: &str, user_content: &str) -> String {
    format!("System: {system_prompt}\nUser: {user_content}\nAssistant:")
}
