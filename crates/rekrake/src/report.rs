//! Human-readable run report.

use rekrake_core::{RunOptions, RunStatistics};

/// Render the final statistics as a plain-text summary.
pub fn render(stats: &RunStatistics, options: &RunOptions) -> String {
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    line(format!(
        "Checked {} file(s) across {} record(s) (mode {})",
        stats.files_checked, stats.records_checked, options.mode
    ));
    line(format!(
        "  new: {}  compared: {}  changed: {}",
        stats.unknown, stats.compared, stats.changed
    ));

    if options.dry_run {
        line(format!("  would optimize: {} file(s)", stats.would_process));
    } else {
        line(format!(
            "  uploaded: {}  replaced: {}  already optimal: {}  failed: {}",
            stats.uploaded, stats.replaced, stats.already_optimal, stats.failed
        ));
        if stats.replaced > 0 {
            line(format!(
                "  saved {} of {} bytes ({:.1}%)",
                stats.saved_bytes,
                stats.original_bytes,
                100.0 * stats.saved_bytes as f64 / stats.original_bytes.max(1) as f64
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_mentions_savings() {
        let stats = RunStatistics {
            records_checked: 1,
            files_checked: 2,
            unknown: 1,
            uploaded: 1,
            replaced: 1,
            original_bytes: 10_000,
            saved_bytes: 500,
            ..Default::default()
        };
        let report = render(&stats, &RunOptions::default());
        assert!(report.contains("saved 500 of 10000 bytes"));
        assert!(report.contains("5.0%"));
    }

    #[test]
    fn test_dry_run_report_shows_would_optimize() {
        let stats = RunStatistics {
            files_checked: 3,
            unknown: 2,
            changed: 1,
            would_process: 3,
            ..Default::default()
        };
        let options = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = render(&stats, &options);
        assert!(report.contains("would optimize: 3 file(s)"));
        assert!(!report.contains("uploaded"));
    }
}
