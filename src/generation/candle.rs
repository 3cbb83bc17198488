//! In-process GGUF inference on candle.
//!
//! The model id is either a path to a quantized llama-family `.gguf` file
//! with its `tokenizer.json` in the same directory, or a Hugging Face repo id
//! (`owner/name`, optionally `owner/name:file.gguf`) fetched through the hub
//! cache.

use std::fmt::Display;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_llama::ModelWeights;
use hf_hub::api::sync::Api;
use minijinja::{context, Environment, Error as TemplateError, ErrorKind};
use serde::Serialize;
use tokenizers::Tokenizer;

use crate::chat::ChatMessage;
use crate::error::BenchError;

use super::local::{LocalModel, SamplingParams};

const CHAT_TEMPLATE_KEY: &str = "tokenizer.chat_template";
const EOS_CANDIDATES: [&str; 5] = ["<|endoftext|>", "<|end|>", "</s>", "<|im_end|>", "<end_of_turn>"];
const BOS_CANDIDATES: [&str; 3] = ["<s>", "<bos>", "<|begin_of_text|>"];

pub struct CandleModel {
    weights: ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    chat_template: Option<String>,
    bos_token: String,
    eos_token: String,
    eos_token_id: u32,
}

fn runtime(err: impl Display) -> BenchError {
    BenchError::LocalRuntime(err.to_string())
}

/// Where a local model's weights come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ModelSource {
    Path(PathBuf),
    Hub { repo: String, file: Option<String> },
}

impl ModelSource {
    /// Existing paths and bare `.gguf` names are files; anything else is a
    /// hub repo id with an optional `:file.gguf` suffix.
    pub(crate) fn parse(model_id: &str) -> Self {
        let path = Path::new(model_id);
        if path.exists() || (model_id.ends_with(".gguf") && !model_id.contains(':')) {
            return Self::Path(path.to_path_buf());
        }
        match model_id.split_once(':') {
            Some((repo, file)) if !file.is_empty() => Self::Hub {
                repo: repo.to_string(),
                file: Some(file.to_string()),
            },
            _ => Self::Hub {
                repo: model_id.trim_end_matches(':').to_string(),
                file: None,
            },
        }
    }

    /// Returns the GGUF weights and `tokenizer.json` paths, downloading
    /// hub files into the local cache when needed.
    fn resolve(&self) -> Result<(PathBuf, PathBuf), BenchError> {
        match self {
            Self::Path(path) => {
                let tokenizer = path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join("tokenizer.json");
                Ok((path.clone(), tokenizer))
            }
            Self::Hub { repo, file } => {
                log::info!("Fetching {repo} from the Hugging Face hub");
                let api = Api::new().map_err(|e| runtime(format!("hub client: {e}")))?;
                let hub = api.model(repo.clone());
                let file = match file {
                    Some(file) => file.clone(),
                    None => {
                        let info = hub
                            .info()
                            .map_err(|e| runtime(format!("cannot list {repo}: {e}")))?;
                        pick_gguf(info.siblings.iter().map(|s| s.rfilename.as_str()))
                            .ok_or_else(|| runtime(format!("{repo} has no .gguf weights")))?
                    }
                };
                let weights = hub
                    .get(&file)
                    .map_err(|e| runtime(format!("cannot download {repo}/{file}: {e}")))?;
                let tokenizer = hub
                    .get("tokenizer.json")
                    .map_err(|e| runtime(format!("cannot download {repo}/tokenizer.json: {e}")))?;
                Ok((weights, tokenizer))
            }
        }
    }
}

/// First `.gguf` file in name order.
fn pick_gguf<'a>(files: impl Iterator<Item = &'a str>) -> Option<String> {
    files
        .filter(|name| name.ends_with(".gguf"))
        .min()
        .map(str::to_string)
}

impl CandleModel {
    /// Loads weights, tokenizer and chat template, preferring the first CUDA
    /// device when one is available.
    pub fn load(model_id: &str) -> Result<Self, BenchError> {
        let (model_path, tokenizer_path) = ModelSource::parse(model_id).resolve()?;
        let model_path = model_path.as_path();
        let device = Device::cuda_if_available(0).map_err(runtime)?;

        let mut file = File::open(model_path)?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| runtime(format!("invalid GGUF {}: {e}", model_path.display())))?;
        let chat_template = content
            .metadata
            .get(CHAT_TEMPLATE_KEY)
            .and_then(|value| value.to_string().ok())
            .cloned();
        let weights = ModelWeights::from_gguf(content, &mut file, &device).map_err(runtime)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| runtime(format!("cannot load {}: {e}", tokenizer_path.display())))?;

        let (eos_token, eos_token_id) = EOS_CANDIDATES
            .iter()
            .find_map(|token| tokenizer.token_to_id(token).map(|id| (token.to_string(), id)))
            .unwrap_or_else(|| ("</s>".to_string(), 2));
        let bos_token = BOS_CANDIDATES
            .iter()
            .find(|token| tokenizer.token_to_id(token).is_some())
            .map(|token| token.to_string())
            .unwrap_or_default();

        log::info!(
            "Loaded {} on {device:?} (eos {eos_token_id}, chat template: {})",
            model_path.display(),
            chat_template.is_some()
        );

        Ok(Self {
            weights,
            tokenizer,
            device,
            chat_template,
            bos_token,
            eos_token,
            eos_token_id,
        })
    }

    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>, BenchError> {
        self.tokenizer
            .encode(text, add_special_tokens)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(runtime)
    }

    fn next_token(
        &mut self,
        processor: &mut LogitsProcessor,
        tokens: &[u32],
        index_pos: usize,
    ) -> Result<u32, BenchError> {
        let input = Tensor::new(tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(runtime)?;
        let logits = self
            .weights
            .forward(&input, index_pos)
            .and_then(|l| l.squeeze(0))
            .map_err(runtime)?;
        processor.sample(&logits).map_err(runtime)
    }
}

impl LocalModel for CandleModel {
    fn apply_chat_template(&self, messages: &[ChatMessage]) -> Option<Result<String, BenchError>> {
        let source = self.chat_template.as_deref()?;
        Some(render_chat_template(
            source,
            messages,
            &self.bos_token,
            &self.eos_token,
        ))
    }

    fn generate(&mut self, prompt: &str, params: &SamplingParams) -> Result<String, BenchError> {
        let prompt_tokens = self.encode(prompt, false)?;
        if prompt_tokens.is_empty() {
            return Ok(String::new());
        }

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let sampling = if params.temperature <= 0.0 {
            Sampling::ArgMax
        } else {
            Sampling::All {
                temperature: f64::from(params.temperature),
            }
        };
        let mut processor = LogitsProcessor::from_sampling(seed, sampling);

        let mut generated = Vec::new();
        let mut next = self.next_token(&mut processor, &prompt_tokens, 0)?;
        while next != self.eos_token_id && generated.len() < params.max_new_tokens as usize {
            generated.push(next);
            let index_pos = prompt_tokens.len() + generated.len() - 1;
            next = self.next_token(&mut processor, &[next], index_pos)?;
        }

        self.tokenizer.decode(&generated, true).map_err(runtime)
    }

    fn count_tokens(&self, text: &str) -> Result<u32, BenchError> {
        token_count(&self.tokenizer, text)
    }
}

/// Counts with the tokenizer's special tokens added, as a plain `encode`
/// call on the model's tokenizer would.
fn token_count(tokenizer: &Tokenizer, text: &str) -> Result<u32, BenchError> {
    tokenizer
        .encode(text, true)
        .map(|encoding| encoding.len() as u32)
        .map_err(runtime)
}

#[derive(Serialize)]
struct TemplateMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Renders a Hugging Face style Jinja chat template with the generation cue.
pub(crate) fn render_chat_template(
    source: &str,
    messages: &[ChatMessage],
    bos_token: &str,
    eos_token: &str,
) -> Result<String, BenchError> {
    let mut env = Environment::new();
    env.add_function("raise_exception", |message: String| -> Result<String, TemplateError> {
        Err(TemplateError::new(ErrorKind::InvalidOperation, message))
    });
    let messages: Vec<TemplateMessage<'_>> = messages
        .iter()
        .map(|m| TemplateMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect();

    env.template_from_str(source)
        .and_then(|template| {
            template.render(context! {
                messages => messages,
                add_generation_prompt => true,
                bos_token => bos_token,
                eos_token => eos_token,
            })
        })
        .map_err(|e| runtime(format!("chat template: {e}")))
}
