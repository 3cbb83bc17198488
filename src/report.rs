//! Aggregation and persistence of benchmark records.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::evaluator::EvalRecord;
use crate::scoring::ScoreCard;

/// `overall_score` at or above this counts as a pass.
pub const PASS_THRESHOLD: f64 = 0.7;

/// Per-model means over all of that model's records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_name: String,
    pub cases: usize,
    /// Field-wise mean of every ScoreCard.
    pub metrics: ScoreCard,
    pub execution_time: f64,
    pub ttft: f64,
    pub input_tokens: f64,
    pub output_tokens: f64,
    pub total_tokens: f64,
    /// Percentage of cases at or above [`PASS_THRESHOLD`].
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchSummary {
    pub total_cases: usize,
    pub global_pass_rate: f64,
    pub mean_execution_time: f64,
    /// In the order models first appear in the records.
    pub models: Vec<ModelSummary>,
}

/// Files produced by [`write_records`].
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub records: PathBuf,
    pub summary: PathBuf,
}

#[derive(Default)]
struct Accumulator {
    cases: usize,
    metrics: [f64; 9],
    execution_time: f64,
    ttft: f64,
    input_tokens: f64,
    output_tokens: f64,
    passed: usize,
}

impl Accumulator {
    fn add(&mut self, record: &EvalRecord) {
        self.cases += 1;
        for (sum, value) in self.metrics.iter_mut().zip(record.metrics.values()) {
            *sum += value;
        }
        self.execution_time += record.latency;
        self.ttft += record.ttft;
        self.input_tokens += f64::from(record.input_tokens);
        self.output_tokens += f64::from(record.output_tokens);
        if record.metrics.overall_score >= PASS_THRESHOLD {
            self.passed += 1;
        }
    }

    fn finish(self, model_name: String) -> ModelSummary {
        let n = self.cases as f64;
        let m = self.metrics.map(|sum| sum / n);
        ModelSummary {
            model_name,
            cases: self.cases,
            metrics: ScoreCard {
                json_schema_compliance: m[0],
                field_coverage: m[1],
                classification_accuracy: m[2],
                reasoning_depth: m[3],
                discussion_readiness: m[4],
                specificity: m[5],
                consistency: m[6],
                extra_text_parsing: m[7],
                overall_score: m[8],
            },
            execution_time: self.execution_time / n,
            ttft: self.ttft / n,
            input_tokens: self.input_tokens / n,
            output_tokens: self.output_tokens / n,
            total_tokens: (self.input_tokens + self.output_tokens) / n,
            pass_rate: self.passed as f64 / n * 100.0,
        }
    }
}

/// Groups records by model and averages them. `None` for no records.
pub fn summarize(records: &[EvalRecord]) -> Option<BenchSummary> {
    if records.is_empty() {
        return None;
    }

    let mut groups: Vec<(String, Accumulator)> = Vec::new();
    for record in records {
        let index = match groups.iter().position(|(name, _)| *name == record.model_name) {
            Some(index) => index,
            None => {
                groups.push((record.model_name.clone(), Accumulator::default()));
                groups.len() - 1
            }
        };
        groups[index].1.add(record);
    }

    let total = records.len() as f64;
    let passed = records
        .iter()
        .filter(|r| r.metrics.overall_score >= PASS_THRESHOLD)
        .count();
    let time: f64 = records.iter().map(|r| r.latency).sum();

    Some(BenchSummary {
        total_cases: records.len(),
        global_pass_rate: passed as f64 / total * 100.0,
        mean_execution_time: time / total,
        models: groups
            .into_iter()
            .map(|(name, acc)| acc.finish(name))
            .collect(),
    })
}

/// Writes `evaluation_results_<ts>.json` and `summary_<ts>.json` into
/// `output_dir`, creating it if needed. Nothing is written for an empty run.
pub fn write_records(
    records: &[EvalRecord],
    output_dir: impl AsRef<Path>,
) -> Result<Option<ReportPaths>, BenchError> {
    let Some(summary) = summarize(records) else {
        log::warn!("No test results provided, skipping report generation");
        return Ok(None);
    };

    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    let paths = ReportPaths {
        records: output_dir.join(format!("evaluation_results_{timestamp}.json")),
        summary: output_dir.join(format!("summary_{timestamp}.json")),
    };
    fs::write(&paths.records, serde_json::to_string_pretty(records)?)?;
    fs::write(&paths.summary, serde_json::to_string_pretty(&summary)?)?;

    log::info!(
        "Wrote {} records to {}",
        records.len(),
        paths.records.display()
    );
    Ok(Some(paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use serde_json::Value;

    fn record(model: &str, overall: f64, latency: f64, tokens: (u32, u32)) -> EvalRecord {
        EvalRecord {
            test_id: "TC-01".into(),
            case_type: "Normal".into(),
            model_name: model.into(),
            input: Profile::default(),
            output: Value::String("{}".into()),
            metrics: ScoreCard {
                overall_score: overall,
                ..ScoreCard::seeded()
            },
            latency,
            ttft: latency / 2.0,
            input_tokens: tokens.0,
            output_tokens: tokens.1,
        }
    }

    #[test]
    fn empty_run_has_no_summary() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn groups_in_first_seen_order() {
        let records = [
            record("b", 0.8, 2.0, (10, 20)),
            record("a", 0.2, 4.0, (30, 40)),
            record("b", 0.6, 4.0, (30, 40)),
        ];
        let summary = summarize(&records).unwrap();
        let names: Vec<&str> = summary.models.iter().map(|m| m.model_name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);

        let b = &summary.models[0];
        assert_eq!(b.cases, 2);
        assert!((b.metrics.overall_score - 0.7).abs() < 1e-12);
        assert_eq!(b.metrics.consistency, 1.0);
        assert_eq!(b.execution_time, 3.0);
        assert_eq!(b.ttft, 1.5);
        assert_eq!(b.total_tokens, 50.0);
        assert_eq!(b.pass_rate, 50.0);

        assert!((summary.global_pass_rate - 100.0 / 3.0).abs() < 1e-9);
        assert!((summary.mean_execution_time - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn writes_records_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        let records = [record("GPT-4o", 0.9, 1.0, (5, 5))];

        let paths = write_records(&records, &out).unwrap().unwrap();
        let name = paths.records.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("evaluation_results_") && name.ends_with(".json"));

        let written: Vec<EvalRecord> =
            serde_json::from_str(&fs::read_to_string(&paths.records).unwrap()).unwrap();
        assert_eq!(written, records);

        let summary: BenchSummary =
            serde_json::from_str(&fs::read_to_string(&paths.summary).unwrap()).unwrap();
        assert_eq!(summary.models[0].pass_rate, 100.0);
    }

    #[test]
    fn empty_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        assert!(write_records(&[], &out).unwrap().is_none());
        assert!(!out.exists());
    }
}
