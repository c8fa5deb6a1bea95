use super::CliError;
use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

/// `--log-level` wins over `RUST_LOG`; events go to stderr.
pub(super) fn init_tracing(log_level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(log_level))
        .with_writer(std::io::stderr)
        .try_init();
}

/// An unparsable directive falls back to `info` instead of failing the run.
fn log_filter(log_level: Option<&str>) -> EnvFilter {
    match log_level {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

pub(super) fn format_triple(values: [f64; 3]) -> String {
    format!("{} {} {}", values[0], values[1], values[2])
}

pub(super) fn emit_report<T: Serialize>(report: &T, path: Option<&Path>) -> Result<(), CliError> {
    let report_json =
        serde_json::to_string_pretty(report).context("failed to serialize sweep report")?;

    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create report directory '{}'", parent.display())
                })?;
            }
            fs::write(path, report_json)
                .with_context(|| format!("failed to write report '{}'", path.display()))?;
        }
        None => println!("{}", report_json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{emit_report, format_triple, log_filter};
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn triples_are_space_separated() {
        assert_eq!(format_triple([0.5, -1.0, 90.0]), "0.5 -1 90");
    }

    #[test]
    fn log_level_directive_overrides_default_filter() {
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
        assert_eq!(
            log_filter(Some("fieldalign_core=trace")).to_string(),
            "fieldalign_core=trace"
        );
    }

    #[test]
    fn unparsable_log_level_falls_back_to_info() {
        assert_eq!(log_filter(Some("=debug")).to_string(), "info");
    }

    #[test]
    fn report_is_written_into_missing_directories() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("nested/report.json");

        emit_report(&serde_json::json!({"finalObjective": 1.0}), Some(&path))
            .expect("report should be written");

        let parsed: Value = serde_json::from_str(
            &std::fs::read_to_string(&path).expect("report should be readable"),
        )
        .expect("report should be JSON");
        assert_eq!(parsed["finalObjective"], 1.0);
    }
}
