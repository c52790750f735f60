use crate::corpus::RunSummary;
use crate::error::{LoadError, SyntaxError};
use chrono::Local;
use serde_json::json;
use std::error::Error as _;
use std::io::{self, Write};
use std::path::Path;

type Timestamp<'a> = chrono::format::DelayedFormat<chrono::format::StrftimeItems<'a>>;

fn timestamp() -> Timestamp<'static> {
    Local::now().format("%Y-%m-%d %H:%M:%S")
}

/// Formats a line in the `timestamp [LEVEL] (snipcheck): message` style.
fn format_line(timestamp: &Timestamp<'_>, level: &str, message: &str) -> String {
    format!("{} [{}] (snipcheck): {}", timestamp, level, message)
}

fn error_line(timestamp: &Timestamp<'_>, message: &str) {
    eprintln!("{}", format_line(timestamp, "ERROR", message));
}

/// Reports that a configuration with external commands is not approved.
pub fn report_approval_error(config_path: &Path) {
    let ts = timestamp();
    error_line(&ts, "configuration not approved for running external checkers");
    error_line(&ts, "");
    error_line(
        &ts,
        "For security, snipcheck requires explicit approval before",
    );
    error_line(&ts, "running commands specified in its configuration.");
    error_line(&ts, "");
    error_line(&ts, "To approve this configuration after reviewing it:");
    error_line(
        &ts,
        &format!("  snipcheck allow --config {}", config_path.display()),
    );
    error_line(&ts, "");
    error_line(
        &ts,
        &format!("Current configuration: {}", config_path.display()),
    );
}

/// Reports a document that could not be loaded, with its error chain.
pub fn report_load_error(err: &LoadError) {
    let ts = timestamp();
    error_line(&ts, &err.to_string());
    let mut source = err.source();
    while let Some(cause) = source {
        error_line(&ts, &format!("  caused by: {}", cause));
        source = cause.source();
    }
}

/// Reports one rejected code block and the source that was checked.
pub fn report_syntax_error(err: &SyntaxError) {
    let ts = timestamp();
    error_line(&ts, "Syntax check failed");
    error_line(&ts, &format!("File: {}:{}", err.path.display(), err.line));
    error_line(&ts, &format!("Block: #{} ({})", err.block_index, err.language));
    error_line(&ts, "");
    for line in err.message.lines() {
        error_line(&ts, line);
    }

    error_line(&ts, "");
    error_line(&ts, "Code block:");
    error_line(&ts, &format!("```{}", err.language));
    for line in err.code.lines() {
        error_line(&ts, line);
    }
    error_line(&ts, "```");
    error_line(&ts, "");
}

/// Prints the run summary to stderr.
///
/// Shows:
/// - Failed documents, if any
/// - Total blocks validated with per-language counts
/// - Skipped blocks
/// - Total time and per-document timings (RUST_LOG=debug)
pub fn print_summary(summary: &RunSummary) {
    let ts = timestamp();

    let failed_files: Vec<&Path> = summary
        .documents
        .iter()
        .filter(|doc| match &doc.outcome {
            Ok(report) => !report.is_ok(),
            Err(_) => true,
        })
        .map(|doc| doc.path.as_path())
        .collect();

    if !failed_files.is_empty() {
        error_line(&ts, "Code check failed in the following files:");
        for file in &failed_files {
            error_line(&ts, &format!("  {}", file.display()));
        }
    }

    let passed = summary.passed_by_language();
    let total_passed: usize = passed.values().sum();
    if summary.checked_blocks() == 0 {
        eprintln!(
            "{}",
            format_line(&ts, "INFO", "No code blocks found to validate")
        );
    } else {
        let stats_str = passed
            .iter()
            .map(|(lang, count)| format!("{}: {}", lang, count))
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!(
            "{}",
            format_line(
                &ts,
                "INFO",
                &format!(
                    "Successfully validated {} code block(s) ({})",
                    total_passed, stats_str
                )
            )
        );
    }

    if summary.skipped_blocks() > 0 {
        eprintln!(
            "{}",
            format_line(
                &ts,
                "INFO",
                &format!(
                    "Skipped {} code block(s) without a checker",
                    summary.skipped_blocks()
                )
            )
        );
    }

    eprintln!(
        "{}",
        format_line(
            &ts,
            "INFO",
            &format!(
                "Checked {} document(s) in {}ms",
                summary.documents.len(),
                summary.elapsed.as_millis()
            )
        )
    );

    log::debug!("Individual document timings:");
    for doc in &summary.documents {
        log::debug!(
            "[DOCUMENT_CHECK_TIME] {}: {}ms",
            doc.path.display(),
            doc.duration.as_millis()
        );
    }
}

/// Writes the run as a JSON document: one entry per input file.
pub fn write_json(summary: &RunSummary, mut writer: impl Write) -> io::Result<()> {
    let documents: Vec<_> = summary
        .documents
        .iter()
        .map(|doc| match &doc.outcome {
            Ok(report) => {
                let status = if report.is_ok() { "ok" } else { "failed" };
                json!({
                    "path": doc.path,
                    "status": status,
                    "skipped": report.skipped,
                    "blocks": report.entries,
                })
            }
            Err(err) => {
                let cause = err.source().map(|s| s.to_string()).unwrap_or_default();
                json!({
                    "path": doc.path,
                    "status": "load_error",
                    "error": format!("{}: {}", err, cause),
                })
            }
        })
        .collect();

    let value = json!({
        "success": summary.is_success(),
        "checked": summary.checked_blocks(),
        "skipped": summary.skipped_blocks(),
        "failed": summary.syntax_failures(),
        "documents": documents,
    });
    serde_json::to_writer_pretty(&mut writer, &value)?;
    writeln!(writer)
}
