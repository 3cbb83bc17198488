#[path = "runner/types.rs"]
mod types;

#[path = "runner/cases.rs"]
mod cases;

#[path = "runner/benchmark.rs"]
mod benchmark;

pub use benchmark::{BenchmarkRunner, PersonaGenerator};
pub use cases::load_test_cases;
pub use types::EvalRecord;
