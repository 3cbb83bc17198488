use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;

use persona_bench::config::{load_config, BenchConfig, ModelSpec};
use persona_bench::evaluator::{load_test_cases, BenchmarkRunner};
use persona_bench::report::{summarize, write_records, BenchSummary};
use persona_bench::sanitize::clean_json_markdown;
use persona_bench::{score_with_mode, OverallScoreMode, Profile};

use crate::args::{CliArgs, Command};
use crate::logging::init_logging;

pub async fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = load_config(args.config.clone())?;
    let _logger = init_logging(&config.logging, args.log_level.as_deref())?;

    let mode = if args.corrected_overall {
        OverallScoreMode::Corrected
    } else {
        OverallScoreMode::Literal
    };

    match &args.command {
        Some(Command::Score { profile, output }) => score_files(profile, output, mode),
        None => run_benchmark(&args, config, mode).await,
    }
}

async fn run_benchmark(
    args: &CliArgs,
    mut config: BenchConfig,
    mode: OverallScoreMode,
) -> anyhow::Result<()> {
    log::info!("Starting persona benchmark");
    config.apply_env();
    for raw in &args.models {
        config.models.push(ModelSpec::parse_shorthand(raw)?);
    }
    if config.models.is_empty() {
        bail!(
            "No models configured. Add [[models]] to the config, pass --model, \
             or set OPENAI_API_KEY, TARGET_LOCAL_MODELS or TARGET_HF_MODELS."
        );
    }

    let cases_path = args
        .cases
        .as_ref()
        .or(config.test_cases.as_ref())
        .context("No test cases given; pass --cases or set test_cases in the config")?;
    let cases = load_test_cases(cases_path)
        .with_context(|| format!("loading test cases from {}", cases_path.display()))?;

    let runner = BenchmarkRunner::new(cases, config.system_prompt()).overall_mode(mode);
    let records = runner.run(&config.models, &config.generation).await;

    let output_dir = args.output_dir.as_ref().unwrap_or(&config.output_dir);
    match write_records(&records, output_dir)? {
        Some(paths) => {
            if let Some(summary) = summarize(&records) {
                print_summary(&summary);
            }
            println!("Records: {}", paths.records.display());
            println!("Summary: {}", paths.summary.display());
        }
        None => println!("No results were produced."),
    }
    Ok(())
}

fn score_files(profile: &Path, output: &Path, mode: OverallScoreMode) -> anyhow::Result<()> {
    let profile: Profile = serde_json::from_str(
        &fs::read_to_string(profile)
            .with_context(|| format!("reading profile {}", profile.display()))?,
    )
    .context("profile is not valid JSON")?;
    let answer = fs::read_to_string(output)
        .with_context(|| format!("reading model output {}", output.display()))?;

    let card = score_with_mode(&profile, &clean_json_markdown(&answer), mode);
    println!("{}", serde_json::to_string_pretty(&card)?);
    Ok(())
}

fn print_summary(summary: &BenchSummary) {
    println!(
        "{:<28} {:>6} {:>8} {:>7} {:>9} {:>9}",
        "model", "cases", "overall", "pass%", "latency", "tokens"
    );
    for model in &summary.models {
        println!(
            "{:<28} {:>6} {:>8.3} {:>7.1} {:>8.2}s {:>9.0}",
            model.model_name,
            model.cases,
            model.metrics.overall_score,
            model.pass_rate,
            model.execution_time,
            model.total_tokens
        );
    }
    println!(
        "{} cases, global pass rate {:.1}%, mean latency {:.2}s",
        summary.total_cases, summary.global_pass_rate, summary.mean_execution_time
    );
}
