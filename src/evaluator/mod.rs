//! Sequential benchmark execution over models and test cases.

pub mod runner;

pub use runner::{load_test_cases, BenchmarkRunner, EvalRecord, PersonaGenerator};
