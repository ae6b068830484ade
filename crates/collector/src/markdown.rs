// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown rendering of ingestion reports.
//!
//! The output is meant to be posted as a commit comment or pull request
//! comment by whatever delivers alerts; this module only builds the text.

use crate::report::{Disposition, IngestionReport, RecordReport};
use std::fmt::Write;

/// Render a summary of every record in the report.
pub fn render_summary(report: &IngestionReport) -> String {
    let mut output = String::new();

    writeln!(output, "# Benchmark Results").unwrap();
    writeln!(output).unwrap();
    writeln!(
        output,
        "Group `{}`, tool `{}`, commit `{}` ({})",
        report.group,
        report.tool,
        report.commit_id,
        report.status.as_str()
    )
    .unwrap();
    writeln!(output).unwrap();
    writeln!(output, "| Benchmark | Value | Unit | Verdict | Ratio |").unwrap();
    writeln!(output, "|-----------|-------|------|---------|-------|").unwrap();

    for record in &report.records {
        let verdict = match (&record.evaluation, record.disposition) {
            (Some(evaluation), _) => evaluation.verdict.to_string(),
            (None, Disposition::Rejected) => "REJECTED".to_string(),
            (None, _) => "-".to_string(),
        };
        writeln!(
            output,
            "| `{}` | {} | `{}` | {} | {} |",
            record.name,
            format_value(record.value),
            base_unit(&record.unit),
            verdict,
            format_ratio(record)
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "---").unwrap();
    writeln!(
        output,
        "Total benchmarks: {}, regressions: {}, rejected: {}",
        report.records.len(),
        report.regressions().count(),
        report.rejected().count()
    )
    .unwrap();

    output
}

/// Render an alert body listing regressed benchmarks.
///
/// Returns `None` when nothing regressed.
pub fn render_alert(report: &IngestionReport, threshold: f64) -> Option<String> {
    if !report.has_regressions() {
        return None;
    }

    let mut output = String::new();
    writeln!(output, "# :warning: **Performance Alert** :warning:").unwrap();
    writeln!(output).unwrap();
    writeln!(
        output,
        "Possible performance regression was detected for benchmark **'{}'**.",
        report.group
    )
    .unwrap();
    writeln!(
        output,
        "Benchmark result of this commit is worse than the previous benchmark result exceeding threshold `{}`.",
        format_threshold(threshold)
    )
    .unwrap();
    writeln!(output).unwrap();
    writeln!(output, "Commit: `{}` ({})", report.commit_id, report.tool).unwrap();
    writeln!(output).unwrap();
    writeln!(output, "| Benchmark suite | Current | Previous | Ratio |").unwrap();
    writeln!(output, "|-|-|-|-|").unwrap();

    for record in report.regressions() {
        let previous = record
            .evaluation
            .as_ref()
            .and_then(|e| e.baseline)
            .map(|baseline| format!("{} {}", format_value(baseline), base_unit(&record.unit)))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            output,
            "| `{}` | {} {} | {} | {} |",
            record.name,
            format_value(record.value),
            base_unit(&record.unit),
            previous,
            format_ratio(record)
        )
        .unwrap();
    }

    Some(output)
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn format_ratio(record: &RecordReport) -> String {
    match &record.evaluation {
        Some(evaluation) => match evaluation.ratio {
            Some(ratio) => format!("{:.2}", ratio),
            None if evaluation.baseline.is_some() => "inf".to_string(),
            None => "-".to_string(),
        },
        None => "-".to_string(),
    }
}

// Alert threshold is relative; show it as the ratio percentage that trips it.
fn format_threshold(threshold: f64) -> String {
    format!("{}%", format_value((1.0 + threshold) * 100.0))
}

fn base_unit(unit: &str) -> &str {
    unit.split_whitespace().next().unwrap_or(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::EntryStatus;
    use bench_history_core::{Direction, Evaluation, Verdict};
    use uuid::Uuid;

    fn record(name: &str, value: f64, baseline: Option<f64>, verdict: Verdict) -> RecordReport {
        RecordReport {
            name: name.to_string(),
            value,
            unit: "ns/op\t       0 B/op\t       0 allocs/op".to_string(),
            disposition: Disposition::Appended,
            evaluation: Some(Evaluation {
                name: name.to_string(),
                verdict,
                ratio: baseline.map(|b| value / b),
                threshold_used: 0.5,
                direction: Direction::SmallerIsBetter,
                current: value,
                baseline,
                baseline_commit: baseline.map(|_| "c0".to_string()),
                window: usize::from(baseline.is_some()),
            }),
            error: None,
        }
    }

    fn report(records: Vec<RecordReport>) -> IngestionReport {
        IngestionReport {
            id: Uuid::new_v4(),
            group: "Benchmark".to_string(),
            tool: "go".to_string(),
            commit_id: "e53b4318f700059faf73151ff0b77467f5983534".to_string(),
            date: 1_767_565_058_698,
            position: Some(3),
            status: EntryStatus::Appended,
            records,
        }
    }

    #[test]
    fn test_no_alert_without_regressions() {
        let report = report(vec![record("BenchmarkThroughput", 528.2, Some(520.0), Verdict::Ok)]);
        assert!(render_alert(&report, 0.5).is_none());
    }

    #[test]
    fn test_alert_lists_only_regressions() {
        let report = report(vec![
            record("BenchmarkThroughput", 528.2, Some(520.0), Verdict::Ok),
            record("BenchmarkIOBound", 1200.0, Some(600.0), Verdict::Regressed),
        ]);
        let alert = render_alert(&report, 0.5).unwrap();

        assert!(alert.contains("| Benchmark suite | Current | Previous | Ratio |"));
        assert!(alert.contains("| `BenchmarkIOBound` | 1200 ns/op | 600 ns/op | 2.00 |"));
        assert!(!alert.contains("BenchmarkThroughput"));
        assert!(alert.contains("`150%`"));
    }

    #[test]
    fn test_summary_includes_every_record() {
        let mut rejected = record("BenchmarkCPUBound", 10.0, None, Verdict::Ok);
        rejected.evaluation = None;
        rejected.disposition = Disposition::Rejected;
        let report = report(vec![
            record("BenchmarkThroughput", 528.2, None, Verdict::Ok),
            rejected,
        ]);
        let summary = render_summary(&report);

        assert!(summary.contains("| `BenchmarkThroughput` | 528.20 | `ns/op` | OK | - |"));
        assert!(summary.contains("| `BenchmarkCPUBound` | 10 | `ns/op` | REJECTED | - |"));
        assert!(summary.contains("Total benchmarks: 2, regressions: 0, rejected: 1"));
    }
}
