use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};

use persona_bench::config::LoggingConfig;

/// Starts the global logger. `RUST_LOG` wins over `level_override`, which
/// wins over the configured level. The handle must outlive the run.
pub fn init_logging(
    config: &LoggingConfig,
    level_override: Option<&str>,
) -> anyhow::Result<LoggerHandle> {
    let level = level_override.unwrap_or(&config.level);
    let logger = Logger::try_with_env_or_str(level)?;

    let Some(path) = &config.path else {
        return Ok(logger.start()?);
    };
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.to_path_buf())
        .unwrap_or_else(|| ".".into());
    let basename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("persona-bench")
        .to_string();

    Ok(logger
        .log_to_file(FileSpec::default().directory(directory).basename(basename))
        .rotate(
            Criterion::Size(config.rotate_size),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.rotate_keep),
        )
        .start()?)
}
