//! Console output: task progress lines and lint reports.
//!
//! The log file gets everything; the console gets the short, styled lines a
//! person watching a build wants to see.

use std::path::Path;

use crossterm::style::Stylize;
use tokio::sync::mpsc;

use crate::core::task::{TaskKind, TaskOutput};
use crate::orchestration::SchedulerEvent;
use crate::tools::{LintViolation, Severity};

fn stamp() -> String {
    format!("[{}]", chrono::Local::now().format("%H:%M:%S"))
}

pub fn task_started(kind: TaskKind) {
    println!("{} Starting '{}'...", stamp().dark_grey(), kind.as_str().cyan());
}

pub fn task_finished(kind: TaskKind, output: &TaskOutput, elapsed_ms: i64) {
    let mut detail = format!("{} written", output.written);
    if output.skipped > 0 {
        detail.push_str(&format!(", {} unchanged", output.skipped));
    }
    if output.violations > 0 {
        detail.push_str(&format!(", {} lint finding(s)", output.violations));
    }
    println!(
        "{} Finished '{}' after {} ms ({})",
        stamp().dark_grey(),
        kind.as_str().cyan(),
        elapsed_ms.to_string().magenta(),
        detail
    );
}

pub fn task_failed(kind: TaskKind, error: &str) {
    eprintln!(
        "{} '{}' {}: {}",
        stamp().dark_grey(),
        kind.as_str().cyan(),
        "errored".red().bold(),
        error
    );
}

pub fn task_blocked(kind: TaskKind, reason: &str) {
    eprintln!(
        "{} '{}' {} ({})",
        stamp().dark_grey(),
        kind.as_str().cyan(),
        "skipped".yellow(),
        reason
    );
}

pub fn info(msg: &str) {
    println!("{} {}", stamp().dark_grey(), msg);
}

/// Print scheduler events until the sender goes away.
pub async fn print_events(mut rx: mpsc::Receiver<SchedulerEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SchedulerEvent::TaskStarted { kind, .. } => task_started(kind),
            SchedulerEvent::TaskCompleted {
                kind,
                output,
                elapsed_ms,
                ..
            } => task_finished(kind, &output, elapsed_ms),
            SchedulerEvent::TaskFailed { kind, error, .. } => task_failed(kind, &error),
            SchedulerEvent::TaskBlocked { kind, reason, .. } => task_blocked(kind, &reason),
            SchedulerEvent::AllTasksComplete => {}
        }
    }
}

/// Print a linter's findings in the string-formatter layout.
pub fn violations(tool: &str, violations: &[LintViolation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("{}", tool.bold());
    for line in format_violations(violations).lines() {
        if line.contains("✖") {
            eprintln!("{}", line.red());
        } else if line.contains("⚠") {
            eprintln!("{}", line.yellow());
        } else {
            eprintln!("{}", line);
        }
    }
}

/// Group findings by file: a header line per file, then one indented line
/// per finding with position, marker, message and rule.
pub fn format_violations(violations: &[LintViolation]) -> String {
    let mut out = String::new();
    let mut current: Option<&Path> = None;
    for v in violations {
        if current != Some(v.file.as_path()) {
            if current.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("{}\n", v.file.display()));
            current = Some(v.file.as_path());
        }
        let position = match (v.line, v.column) {
            (Some(line), Some(column)) => format!("{}:{}", line, column),
            (Some(line), None) => line.to_string(),
            _ => "-".to_string(),
        };
        let marker = match v.severity {
            Severity::Error => "✖",
            Severity::Warning => "⚠",
        };
        out.push_str(&format!(" {:>7}  {}  {}", position, marker, v.message));
        if let Some(rule) = &v.rule {
            out.push_str(&format!("  {}", rule));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn violation(file: &str, line: u32, severity: Severity) -> LintViolation {
        LintViolation {
            file: PathBuf::from(file),
            line: Some(line),
            column: Some(1),
            rule: Some("block-no-empty".to_string()),
            severity,
            message: "Unexpected empty block".to_string(),
        }
    }

    #[test]
    fn test_format_groups_by_file() {
        let text = format_violations(&[
            violation("a.scss", 1, Severity::Error),
            violation("a.scss", 7, Severity::Warning),
            violation("b.scss", 2, Severity::Error),
        ]);
        assert_eq!(text.matches("a.scss\n").count(), 1);
        assert_eq!(text.matches("b.scss\n").count(), 1);
        assert!(text.contains("7:1  ⚠  Unexpected empty block  block-no-empty"));
    }

    #[test]
    fn test_format_empty() {
        assert!(format_violations(&[]).is_empty());
    }
}
