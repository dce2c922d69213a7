//! End-of-session summary table.

use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use crate::pipeline::PipelineReport;

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl SummaryRow {
    fn new(metric: &str, value: String) -> Self {
        Self {
            metric: metric.to_string(),
            value,
        }
    }
}

/// Renders the report as a rounded table.
pub fn render(report: &PipelineReport) -> String {
    let rows = vec![
        SummaryRow::new("Frames captured", report.frames_captured.to_string()),
        SummaryRow::new("Frames scored", report.frames_scored.to_string()),
        SummaryRow::new("Frames dropped", report.frames_dropped.to_string()),
        SummaryRow::new("Falls detected", report.falls_detected.to_string()),
        SummaryRow::new("Alert episodes", report.alert_episodes.to_string()),
        SummaryRow::new("Degraded intervals", report.degraded_intervals.to_string()),
        SummaryRow::new(
            "Session length",
            format!("{:.1} s", report.elapsed.as_secs_f64()),
        ),
        SummaryRow::new("Capture rate", format!("{:.1} fps", report.capture_fps())),
    ];

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Prints the summary under a session header.
pub fn print(report: &PipelineReport) {
    println!();
    println!("{} Session summary", "[FALLWATCH]".bright_cyan().bold());
    println!("{}", render(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_render_lists_all_counters() {
        let report = PipelineReport {
            frames_captured: 300,
            frames_scored: 290,
            frames_dropped: 10,
            falls_detected: 4,
            alert_episodes: 2,
            degraded_intervals: 1,
            elapsed: Duration::from_secs(10),
        };

        let table = render(&report);
        assert!(table.contains("Frames captured"));
        assert!(table.contains("300"));
        assert!(table.contains("Alert episodes"));
        assert!(table.contains("Degraded intervals"));
        assert!(table.contains("30.0 fps"));
    }
}
