//! Console output for runs

use colored::Colorize;
use std::sync::atomic::{AtomicUsize, Ordering};

use kobold_core::{CaseFailure, CaseReport, CaseStatus, RunSummary, TestCase, TestHarness};

/// Harness printing an indented tree of groups and cases to stdout
#[derive(Debug, Default)]
pub struct ConsoleHarness {
    depth: AtomicUsize,
}

impl ConsoleHarness {
    pub fn new() -> Self {
        Self::default()
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth.load(Ordering::SeqCst))
    }
}

impl TestHarness for ConsoleHarness {
    fn planned(&self, plan: &[TestCase]) {
        print_info(&format!("Running {} case(s)", plan.len()));
    }

    fn enter_group(&self, title: &str) {
        println!("{}{}", self.indent(), title.bold());
        self.depth.fetch_add(1, Ordering::SeqCst);
    }

    fn leave_group(&self, _title: &str) {
        let _ = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
    }

    fn report(&self, report: &CaseReport) {
        for line in format_report(report) {
            println!("{}{}", self.indent(), line);
        }
    }

    fn abort(&self, failure: &CaseFailure) {
        print_error(&format!("initialize tests: {}", failure.message));
    }
}

/// Lines printed for one case: the status line, then the failure if any
pub fn format_report(report: &CaseReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(2);
    if !report.status.is_terminal() {
        lines.push(format!("? {}", report.title));
        return lines;
    }

    let line = match report.status {
        CaseStatus::Passed => format!(
            "{} {} ({} ms)",
            "✓".green(),
            report.title,
            report.duration_ms
        ),
        CaseStatus::Failed => format!("{} {}", "✗".red(), report.title.red()),
        _ => format!("{} {}", "-".cyan(), report.title.cyan()),
    };
    lines.push(line);

    if let Some(failure) = &report.failure {
        lines.push(format!("  {}", failure.to_string().red()));
    }
    lines
}

/// Print the closing summary line
pub fn print_summary(summary: &RunSummary) {
    let line = format!(
        "{} passed, {} failed, {} skipped ({} ms)",
        summary.passed, summary.failed, summary.skipped, summary.duration_ms
    );
    println!();
    if summary.success() {
        print_success(&line);
    } else {
        print_error(&line);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
