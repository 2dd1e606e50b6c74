pub mod types;

pub use types::{MigrationReport, MigrationState, PrOutcome};

use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(report), fields(repo = %report.source_repo, failures = report.failure_count()))]
pub fn output(report: &MigrationReport, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

fn headline(report: &MigrationReport) -> String {
    match (&report.fork_full_name, report.dry_run) {
        (_, true) => format!("Dry run for {}", report.source_repo),
        (Some(fork), false) => format!("Migration {} → {}", report.source_repo, fork),
        (None, false) => format!("Migration for {}", report.source_repo),
    }
}

/// `N migrated, M failed` or `N collected, M failed` for dry runs, plus
/// unverified PRs when there are any.
fn summary_text(report: &MigrationReport) -> String {
    let failed = report.failure_count();
    let unverified = report.count_in(MigrationState::LabelUnverified);
    let mut summary = if report.dry_run {
        format!(
            "{} collected, {} failed",
            report.count_in(MigrationState::Collected),
            failed
        )
    } else {
        format!(
            "{} migrated, {} failed",
            report.outcomes.len() - failed - unverified,
            failed
        )
    };
    if unverified > 0 {
        summary.push_str(&format!(", {} unverified", unverified));
    }
    summary
}

fn new_pr_text(outcome: &PrOutcome) -> String {
    match (outcome.new_number, &outcome.new_url) {
        (Some(number), Some(url)) => format!("#{} ({})", number, url),
        (Some(number), None) => format!("#{}", number),
        _ => "-".to_string(),
    }
}

fn thread_text(outcome: &PrOutcome) -> String {
    let t = &outcome.threads;
    format!(
        "{}/{} threads, {} replies, {} orphaned, {} conversation comments",
        t.roots_replicated, t.roots_total, t.replies_created, t.replies_orphaned, outcome.conversation_comments
    )
}

/// Format and print the report to the terminal with colors.
///
/// Migration org/repo → acme/repo
///
/// ═══ PR #7: "Add export" ═══
/// State: ORIGINAL CLOSED
/// Branch: feature-x | New PR: #501 (...)
/// Threads: 1/1 threads, 1 replies, 0 orphaned, 0 conversation comments
///
/// ═══ 1 migrated, 0 failed ═══
fn print_terminal_report(report: &MigrationReport) {
    println!();
    println!("{}", headline(report).bold());
    println!();

    if report.outcomes.is_empty() {
        println!("  No labelled pull requests found.");
        println!();
    }

    for outcome in &report.outcomes {
        println!("═══ PR #{}: \"{}\" ═══", outcome.source_number, outcome.title);
        println!("State: {}", colorize_state(outcome.state));
        println!(
            "Branch: {} | New PR: {}",
            outcome.head_ref.as_deref().unwrap_or("-"),
            new_pr_text(outcome)
        );
        println!("Threads: {}", thread_text(outcome));
        for error in &outcome.errors {
            println!("  • {}", error);
        }
        println!();
    }

    let summary = format!("═══ {} ═══", summary_text(report));
    if report.has_failures() {
        println!("{}", summary.red().bold());
    } else {
        println!("{}", summary.green().bold());
    }
    println!();
}

/// Write the report as a markdown file.
///
/// # Migration org/repo → acme/repo
///
/// ## PR #7: "Add export"
/// **State: ORIGINAL CLOSED**
/// - Branch: `feature-x`
/// ...
fn write_markdown_report(report: &MigrationReport, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", headline(report)));

    if report.outcomes.is_empty() {
        md.push_str("No labelled pull requests found.\n\n");
    }

    for outcome in &report.outcomes {
        md.push_str(&format!(
            "## PR #{}: \"{}\"\n\n",
            outcome.source_number, outcome.title
        ));
        md.push_str(&format!("**State: {}**\n\n", outcome.state));
        md.push_str(&format!(
            "- Branch: `{}`\n",
            outcome.head_ref.as_deref().unwrap_or("-")
        ));
        md.push_str(&format!("- New PR: {}\n", new_pr_text(outcome)));
        md.push_str(&format!("- Threads: {}\n", thread_text(outcome)));
        md.push_str(&format!(
            "- Original closed: {}\n",
            if outcome.original_closed { "yes" } else { "no" }
        ));
        for error in &outcome.errors {
            md.push_str(&format!("- **Error:** {}\n", error));
        }
        md.push('\n');
    }

    md.push_str(&format!("## Summary: {}\n", summary_text(report)));

    std::fs::write(path, md)?;
    Ok(())
}

/// Helper to colorize a migration state for terminal output.
fn colorize_state(state: MigrationState) -> colored::ColoredString {
    let label = state.to_string();
    match state {
        s if s.is_failure() => label.red().bold(),
        MigrationState::OriginalClosed | MigrationState::ReviewsReplicated => label.green().bold(),
        _ => label.yellow().bold(),
    }
}
