//! CLI command implementations

pub mod clone;
pub mod pull;

pub use clone::CloneArgs;
pub use pull::PullArgs;

use superpull_core::{BatchReport, LinkOutcome};

/// Print what a batch did, one section per kind of outcome
pub(crate) fn print_report(report: &BatchReport) {
    let summary = &report.summary;

    println!();
    println!(
        "{} repositories: {} finished, {} killed, {} failed to start, {} not started, {} skipped ({:.1?})",
        report.found,
        summary.exited(),
        summary.killed(),
        summary.failed_to_launch(),
        summary.cancelled(),
        report.skipped.len(),
        summary.elapsed
    );

    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.name, skipped.reason);
    }

    for outcome in &summary.outcomes {
        if !outcome.state.is_success() {
            println!("  {}: {}", outcome.name, outcome.state);
        }
    }

    let linked = report
        .links
        .iter()
        .filter(|l| matches!(l.outcome, LinkOutcome::Created | LinkOutcome::Replaced))
        .count();
    if !report.links.is_empty() {
        println!("{} submodule links created", linked);
    }
    for link in &report.links {
        if let LinkOutcome::Failed(reason) = &link.outcome {
            println!(
                "  link {} in {} failed: {}",
                link.path,
                link.repo_dir.display(),
                reason
            );
        }
    }
}
