//! Benchmark harness for dining-persona generation.
//!
//! The crate turns a diner [`Profile`] into a prompt, runs it through a
//! [`GenerationAdapter`] (an in-process model or an OpenAI-compatible
//! streaming server) and grades the returned JSON persona with the
//! deterministic rubric in [`scoring`].
//!
//! ```no_run
//! use persona_bench::{score, BackendMode, GenerationAdapter, GenerationOptions, Profile};
//!
//! # async fn run() -> Result<(), persona_bench::error::BenchError> {
//! let adapter = GenerationAdapter::new(
//!     "llama3",
//!     Some("ollama".to_string()),
//!     Some("http://localhost:11434/v1".to_string()),
//!     BackendMode::Remote,
//!     &GenerationOptions::default(),
//! )?;
//! let profile = Profile::default();
//! let result = adapter
//!     .generate(persona_bench::prompt::SYSTEM_PROMPT, &profile)
//!     .await;
//! let card = score(&profile, result.text());
//! println!("overall: {:.3}", card.overall_score);
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod generation;
pub mod persona;
pub mod profile;
pub mod prompt;
pub mod report;
pub mod sanitize;
pub mod scoring;

pub use generation::{BackendMode, GenerationAdapter, GenerationOptions, GenerationResult};
pub use persona::GeneratedPersona;
pub use profile::{Profile, TestCase};
pub use scoring::{score, score_with_mode, OverallScoreMode, ScoreCard};
