use std::fs;
use std::path::Path;

use crate::error::BenchError;
use crate::profile::TestCase;

/// Reads an ordered list of test cases; `.yaml`/`.yml` files are parsed as
/// YAML, anything else as JSON.
pub fn load_test_cases(path: impl AsRef<Path>) -> Result<Vec<TestCase>, BenchError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let cases: Vec<TestCase> = if is_yaml {
        serde_yaml::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)?
    };
    log::info!("Loaded {} test cases from {}", cases.len(), path.display());
    Ok(cases)
}
