use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::chat::{create_sse_stream, parse_chat_chunk, ChatRole, Usage};
use crate::error::BenchError;
use crate::profile::Profile;
use crate::sanitize::clean_json_markdown;

use super::{GenerationOptions, GenerationResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
const CREDENTIAL_ENV: &str = "OPENAI_API_KEY";
/// Rough characters-per-token ratio used when the server reports no usage.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

/// Streaming client for an OpenAI-compatible chat-completions server.
pub(crate) struct RemoteBackend {
    client: Client,
    base_url: Url,
    api_key: SecretString,
    model: String,
    temperature: f32,
    stream_usage: bool,
}

impl RemoteBackend {
    pub(crate) fn new(
        model: &str,
        credential: Option<String>,
        endpoint: Option<String>,
        options: &GenerationOptions,
    ) -> Result<Self, BenchError> {
        let api_key = credential
            .or_else(|| std::env::var(CREDENTIAL_ENV).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                BenchError::Initialization(format!(
                    "no credential given for {model} and {CREDENTIAL_ENV} is not set"
                ))
            })?;

        let base_url = parse_base_url(endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

        let mut builder = Client::builder();
        if let Some(secs) = options.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| BenchError::Initialization(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: SecretString::new(api_key),
            model: model.to_string(),
            temperature: options.temperature,
            stream_usage: options.stream_usage,
        })
    }

    fn completions_url(&self) -> Result<Url, BenchError> {
        self.base_url
            .join("chat/completions")
            .map_err(|e| BenchError::HttpError(e.to_string()))
    }

    pub(crate) async fn generate(
        &self,
        system_prompt: &str,
        profile: &Profile,
    ) -> Result<GenerationResult, BenchError> {
        let user_content = profile.to_user_content();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatCompletionMessage {
                    role: ChatRole::System.as_str(),
                    content: system_prompt,
                },
                ChatCompletionMessage {
                    role: ChatRole::User.as_str(),
                    content: &user_content,
                },
            ],
            temperature: self.temperature,
            stream: true,
            stream_options: self.stream_usage.then_some(StreamOptions {
                include_usage: true,
            }),
        };
        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("Chat completions payload: {json}");
            }
        }

        let start = Instant::now();
        let response = self
            .client
            .post(self.completions_url()?)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        log::debug!("Chat completions HTTP status: {}", response.status());
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            if matches!(status.as_u16(), 401 | 403) {
                return Err(BenchError::AuthError(format!(
                    "Chat completions rejected credentials ({status}): {error_text}"
                )));
            }
            return Err(BenchError::ResponseFormatError {
                message: format!("Chat completions returned error status: {status}"),
                raw_response: error_text,
            });
        }

        let mut stream = create_sse_stream(response, parse_chat_chunk);
        let mut text = String::new();
        let mut ttft = None;
        let mut usage: Option<Usage> = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(content) = chunk.content() {
                if ttft.is_none() {
                    ttft = Some(start.elapsed().as_secs_f64());
                }
                text.push_str(content);
            }
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
        }

        let latency = start.elapsed().as_secs_f64();
        let (input_tokens, output_tokens) = match usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (
                estimate_tokens(system_prompt.chars().count() + user_content.chars().count()),
                estimate_tokens(text.chars().count()),
            ),
        };

        Ok(GenerationResult::new(
            clean_json_markdown(&text),
            ttft.unwrap_or(latency),
            latency,
            input_tokens,
            output_tokens,
        ))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, BenchError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|e| BenchError::Initialization(format!("invalid endpoint {raw}: {e}")))
}

fn estimate_tokens(chars: usize) -> u32 {
    u32::try_from(chars / CHARS_PER_TOKEN).unwrap_or(u32::MAX)
}
