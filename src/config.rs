//! Benchmark configuration: models under test, generation settings, paths.
//!
//! Loaded from TOML; a missing file yields [`BenchConfig::default`]. The
//! environment can add models on top of the file (see
//! [`BenchConfig::apply_env`]).

use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::BenchError;
use crate::generation::{BackendMode, GenerationOptions};
use crate::prompt::SYSTEM_PROMPT;

const CONFIG_DIR_NAME: &str = "persona-bench";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_OUTPUT_DIR: &str = "./reports";
const DEFAULT_LOCAL_SERVER_URL: &str = "http://localhost:11434/v1";
const LOCAL_SERVER_CREDENTIAL: &str = "ollama";
const DEFAULT_LOG_ROTATE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_LOG_ROTATE_KEEP: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Replaces the built-in persona-generation prompt.
    pub system_prompt: Option<String>,
    /// JSON or YAML file with the ordered test cases.
    pub test_cases: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub generation: GenerationOptions,
    pub models: Vec<ModelSpec>,
    pub logging: LoggingConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            test_cases: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            generation: GenerationOptions::default(),
            models: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// One model under test.
#[derive(Debug, Deserialize)]
pub struct ModelSpec {
    /// Display name used in records and summaries.
    pub name: String,
    /// Identifier sent to the server, or the weights path for local models.
    pub model: String,
    #[serde(default = "default_backend")]
    pub backend: BackendMode,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Environment variable holding the credential.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_backend() -> BackendMode {
    BackendMode::Remote
}

impl ModelSpec {
    pub fn remote(
        name: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            backend: BackendMode::Remote,
            base_url,
            api_key: api_key.map(SecretString::new),
            api_key_env: None,
        }
    }

    pub fn local(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            backend: BackendMode::Local,
            base_url: None,
            api_key: None,
            api_key_env: None,
        }
    }

    /// Parses the `NAME=MODEL@URL` shorthand for an ad-hoc remote model.
    /// Both the name and the endpoint are optional.
    pub fn parse_shorthand(raw: &str) -> Result<Self, BenchError> {
        let (name, rest) = match raw.split_once('=') {
            Some((name, rest)) => (Some(name.trim()), rest),
            None => (None, raw),
        };
        let (model, base_url) = match rest.rsplit_once('@') {
            Some((model, url)) => (model.trim(), Some(url.trim().to_string())),
            None => (rest.trim(), None),
        };
        if model.is_empty() {
            return Err(BenchError::Config(format!("no model id in '{raw}'")));
        }
        let name = name.filter(|n| !n.is_empty()).unwrap_or(model);
        Ok(Self::remote(name, model, base_url, None))
    }

    /// Inline key first, then the named environment variable.
    pub fn credential(&self) -> Option<SecretString> {
        if let Some(key) = &self.api_key {
            return Some(SecretString::new(key.expose_secret().clone()));
        }
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .map(SecretString::new)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file; stderr when unset.
    pub path: Option<PathBuf>,
    pub rotate_size: u64,
    pub rotate_keep: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
            rotate_size: DEFAULT_LOG_ROTATE_SIZE,
            rotate_keep: DEFAULT_LOG_ROTATE_KEEP,
        }
    }
}

impl BenchConfig {
    /// The configured prompt, or the built-in one.
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT)
    }

    /// Appends models declared through the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Appends models declared through `lookup`:
    ///
    /// * `OPENAI_API_KEY` containing `sk-` adds the hosted `gpt-4o`.
    /// * `TARGET_LOCAL_MODELS` (comma list) adds remote models served at
    ///   `LOCAL_LLM_URL`.
    /// * `TARGET_HF_MODELS` (comma list of hub repo ids) adds in-process models.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| k.contains("sk-")) {
            self.models
                .push(ModelSpec::remote("GPT-4o", "gpt-4o", None, Some(key)));
        }

        let local_url =
            lookup("LOCAL_LLM_URL").unwrap_or_else(|| DEFAULT_LOCAL_SERVER_URL.to_string());
        for model in split_list(lookup("TARGET_LOCAL_MODELS")) {
            self.models.push(ModelSpec::remote(
                format!("Ollama-{model}"),
                model,
                Some(local_url.clone()),
                Some(LOCAL_SERVER_CREDENTIAL.to_string()),
            ));
        }

        for model in split_list(lookup("TARGET_HF_MODELS")) {
            let repo = model.split(':').next().unwrap_or(&model);
            let short = repo.rsplit('/').next().unwrap_or(repo).to_string();
            self.models.push(ModelSpec::local(format!("HF-{short}"), model));
        }
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `<config dir>/persona-bench/config.toml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Reads the config at `path_override`, else at [`default_config_path`].
pub fn load_config(path_override: Option<PathBuf>) -> Result<BenchConfig, BenchError> {
    match path_override.or_else(default_config_path) {
        Some(path) => read_config(&path),
        None => Ok(BenchConfig::default()),
    }
}

fn read_config(path: &Path) -> Result<BenchConfig, BenchError> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            log::debug!("Loaded config from {}", path.display());
            Ok(toml::from_str(&contents)?)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(BenchConfig::default())
        }
        Err(err) => Err(BenchError::Io(err)),
    }
}
