use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "persona-bench",
    about = "Benchmark LLMs on dining-persona generation and grade the results"
)]
pub struct CliArgs {
    /// Config file (defaults to the platform config dir)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
    /// JSON or YAML test-case file
    #[arg(long)]
    pub cases: Option<PathBuf>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Extra remote model, repeatable
    #[arg(long = "model", value_name = "NAME=MODEL@URL")]
    pub models: Vec<String>,
    /// Average overall_score over the eight sub-scores instead of nine
    #[arg(long, global = true)]
    pub corrected_overall: bool,
    /// Overrides the configured log level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Grade one saved model answer against a profile
    Score {
        /// Profile JSON file
        profile: PathBuf,
        /// Raw model answer; markdown fences are stripped first
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_flags() {
        let args = CliArgs::parse_from([
            "persona-bench",
            "--cases",
            "cases.yaml",
            "--model",
            "Qwen=qwen2@http://localhost:8000/v1",
            "--model",
            "gpt-4o-mini",
            "--corrected-overall",
        ]);
        assert_eq!(args.cases, Some(PathBuf::from("cases.yaml")));
        assert_eq!(args.models.len(), 2);
        assert!(args.corrected_overall);
        assert!(args.command.is_none());
    }

    #[test]
    fn parses_score_subcommand() {
        let args = CliArgs::parse_from(["persona-bench", "score", "p.json", "out.txt"]);
        match args.command {
            Some(Command::Score { profile, output }) => {
                assert_eq!(profile, PathBuf::from("p.json"));
                assert_eq!(output, PathBuf::from("out.txt"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
