// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command-line interface for benchmark history.
//!
//! The CI job that ran the benchmarks calls `bench-history ingest` with the
//! commit metadata and the harness results; `query`, `latest` and `status`
//! read the stored history.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod logging;
pub mod settings;

use anyhow::{bail, Context};
use bench_history_collector::{input, markdown, IngestRequest, Ingestor};
use bench_history_core::DEFAULT_GROUP;
use bench_history_storage::{FileBackend, HistoryStore};
use chrono::TimeZone;
use clap::{Parser, Subcommand, ValueEnum};
use settings::Settings;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Benchmark history CLI.
#[derive(Parser, Debug)]
#[command(name = "bench-history")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (TOML).
    #[arg(short, long, global = true, env = "BENCH_HISTORY_CONFIG")]
    pub config: Option<PathBuf>,

    /// History file, overriding `store.path`.
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format of `ingest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The ingestion report as JSON.
    Json,
    /// A markdown summary, followed by the alert body when something regressed.
    Markdown,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest one benchmark run.
    Ingest {
        /// Group the run belongs to.
        #[arg(short, long, default_value = DEFAULT_GROUP)]
        group: String,

        /// Harness that produced the results (go, cargo, pytest, ...).
        #[arg(short, long)]
        tool: String,

        /// Commit metadata JSON file.
        #[arg(long)]
        commit: PathBuf,

        /// Raw results JSON file.
        #[arg(long)]
        results: PathBuf,

        /// Exit with status 2 when a regression is detected.
        #[arg(long)]
        fail_on_alert: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },

    /// Print the series of one benchmark as JSON, oldest first.
    Query {
        /// Group to read.
        #[arg(short, long, default_value = DEFAULT_GROUP)]
        group: String,

        /// Harness identifier.
        #[arg(short, long)]
        tool: String,

        /// Benchmark name.
        #[arg(short, long)]
        name: String,

        /// Keep only the newest points.
        #[arg(short, long)]
        max_points: Option<usize>,
    },

    /// Print the most recent record of one benchmark as JSON.
    Latest {
        /// Group to read.
        #[arg(short, long, default_value = DEFAULT_GROUP)]
        group: String,

        /// Harness identifier.
        #[arg(short, long)]
        tool: String,

        /// Benchmark name.
        #[arg(short, long)]
        name: String,
    },

    /// Show the stored history and active settings.
    Status {
        /// List every series.
        #[arg(short, long)]
        detailed: bool,
    },
}

/// How a successful command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to report.
    Success,
    /// A regression was detected and `--fail-on-alert` was set.
    RegressionDetected,
}

impl Outcome {
    /// Process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::RegressionDetected => 2,
        }
    }
}

/// Text to print and how the command ended.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Text for stdout.
    pub text: String,
    /// Command outcome.
    pub outcome: Outcome,
}

impl CommandOutput {
    fn success(text: String) -> Self {
        Self {
            text,
            outcome: Outcome::Success,
        }
    }
}

/// Run the CLI with parsed arguments.
pub async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(data) = cli.data {
        settings.store.path = data;
    }
    logging::init(&settings.logging);

    let output = execute(cli.command, &settings).await?;
    print!("{}", output.text);
    Ok(output.outcome)
}

/// Execute one command against the configured store.
pub async fn execute(command: Commands, settings: &Settings) -> anyhow::Result<CommandOutput> {
    let store = Arc::new(open_store(settings).await?);

    match command {
        Commands::Ingest {
            group,
            tool,
            commit,
            results,
            fail_on_alert,
            format,
        } => {
            let commit = input::read_commit(&commit).await?;
            let results = input::read_results(&results).await?;
            let ingestor = Ingestor::new(store, settings.regression.clone());
            let report = ingestor
                .ingest(IngestRequest {
                    group,
                    commit,
                    tool,
                    results,
                })
                .await
                .context("ingestion failed")?;

            info!(
                report = %report.id,
                status = report.status.as_str(),
                records = report.records.len(),
                regressions = report.regressions().count(),
                "Ingestion complete"
            );

            let mut text = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&report)? + "\n",
                OutputFormat::Markdown => markdown::render_summary(&report),
            };
            if format == OutputFormat::Markdown {
                if let Some(alert) =
                    markdown::render_alert(&report, settings.regression.alert_threshold)
                {
                    text.push('\n');
                    text.push_str(&alert);
                }
            }

            let outcome = if fail_on_alert && report.has_regressions() {
                Outcome::RegressionDetected
            } else {
                Outcome::Success
            };
            Ok(CommandOutput { text, outcome })
        }
        Commands::Query {
            group,
            tool,
            name,
            max_points,
        } => {
            let series = store.query(&group, &tool, &name, max_points);
            Ok(CommandOutput::success(
                serde_json::to_string_pretty(&series.points())? + "\n",
            ))
        }
        Commands::Latest { group, tool, name } => match store.latest(&group, &tool, &name) {
            Some(record) => Ok(CommandOutput::success(
                serde_json::to_string_pretty(&record)? + "\n",
            )),
            None => bail!("no results for '{}' ({}) in group '{}'", name, tool, group),
        },
        Commands::Status { detailed } => Ok(CommandOutput::success(render_status(
            &store, settings, detailed,
        ))),
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<HistoryStore> {
    let backend = Arc::new(FileBackend::new(&settings.store.path));
    HistoryStore::open(backend, settings.store.options())
        .await
        .with_context(|| format!("failed to open {}", settings.store.path.display()))
}

fn render_status(store: &HistoryStore, settings: &Settings, detailed: bool) -> String {
    let mut output = String::new();

    writeln!(output, "Benchmark History").unwrap();
    writeln!(output, "Version: {}", env!("CARGO_PKG_VERSION")).unwrap();
    writeln!(output, "History file: {}", settings.store.path.display()).unwrap();
    if !store.repo_url().is_empty() {
        writeln!(output, "Repository: {}", store.repo_url()).unwrap();
    }
    let last_update = match chrono::Utc.timestamp_millis_opt(store.last_update()).single() {
        Some(at) if store.last_update() > 0 => at.to_rfc3339(),
        _ => "never".to_string(),
    };
    writeln!(output, "Last update: {}", last_update).unwrap();
    writeln!(
        output,
        "Alert threshold: {}%",
        (1.0 + settings.regression.alert_threshold) * 100.0
    )
    .unwrap();

    let groups = store.groups();
    writeln!(output, "\nGroups: {}", groups.len()).unwrap();
    for group in &groups {
        let entries = store.entries(group);
        writeln!(output, "  - {}: {} entries", group, entries.len()).unwrap();

        if detailed {
            let mut series: BTreeMap<(&str, &str), usize> = BTreeMap::new();
            for entry in entries.iter() {
                for bench in &entry.benches {
                    *series
                        .entry((entry.tool.as_str(), bench.name.as_str()))
                        .or_default() += 1;
                }
            }
            for ((tool, name), points) in series {
                writeln!(output, "      {} [{}]: {} points", name, tool, points).unwrap();
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;

    const COMMIT: &str = r#"{
        "author": {"email": "dev@example.com", "name": "Dev", "username": "dev"},
        "committer": {"email": "dev@example.com", "name": "Dev", "username": "dev"},
        "id": "COMMIT_ID",
        "message": "tune pool",
        "timestamp": "2026-01-04T17:15:21-05:00",
        "url": "https://github.com/example/workerpool/commit/COMMIT_ID"
    }"#;

    fn write_run(dir: &std::path::Path, id: &str, value: f64) -> (PathBuf, PathBuf) {
        let commit = dir.join(format!("{}-commit.json", id));
        let results = dir.join(format!("{}-results.json", id));
        fs::write(&commit, COMMIT.replace("COMMIT_ID", id)).unwrap();
        fs::write(
            &results,
            format!(r#"[{{"name": "BenchmarkIOBound", "value": {}, "unit": "ns/op"}}]"#, value),
        )
        .unwrap();
        (commit, results)
    }

    fn ingest(commit: PathBuf, results: PathBuf, format: OutputFormat) -> Commands {
        Commands::Ingest {
            group: DEFAULT_GROUP.to_string(),
            tool: "go".to_string(),
            commit,
            results,
            fail_on_alert: true,
            format,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest_arguments() {
        let cli = Cli::try_parse_from([
            "bench-history",
            "--data",
            "out/data.js",
            "ingest",
            "--tool",
            "go",
            "--commit",
            "commit.json",
            "--results",
            "results.json",
            "--fail-on-alert",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.data, Some(PathBuf::from("out/data.js")));
        match cli.command {
            Commands::Ingest {
                group,
                fail_on_alert,
                format,
                ..
            } => {
                assert_eq!(group, DEFAULT_GROUP);
                assert!(fail_on_alert);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ingest_then_alert_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.store.path = dir.path().join("data.js");

        let (commit, results) = write_run(dir.path(), "c1", 100.0);
        let first = execute(ingest(commit, results, OutputFormat::Markdown), &settings)
            .await
            .unwrap();
        assert_eq!(first.outcome, Outcome::Success);
        assert!(first.text.contains("| `BenchmarkIOBound` | 100 | `ns/op` | OK | - |"));

        let (commit, results) = write_run(dir.path(), "c2", 300.0);
        let second = execute(ingest(commit, results, OutputFormat::Markdown), &settings)
            .await
            .unwrap();
        assert_eq!(second.outcome, Outcome::RegressionDetected);
        assert_eq!(second.outcome.exit_code(), 2);
        assert!(second.text.contains("Performance Alert"));

        let query = Commands::Query {
            group: DEFAULT_GROUP.to_string(),
            tool: "go".to_string(),
            name: "BenchmarkIOBound".to_string(),
            max_points: Some(1),
        };
        let output = execute(query, &settings).await.unwrap();
        let points: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(points.as_array().map(Vec::len), Some(1));
        assert_eq!(points[0]["commit_id"], "c2");

        let status = execute(Commands::Status { detailed: true }, &settings)
            .await
            .unwrap();
        assert!(status.text.contains("Benchmark: 2 entries"));
        assert!(status.text.contains("BenchmarkIOBound [go]: 2 points"));
    }

    #[tokio::test]
    async fn test_json_report_and_missing_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.store.path = dir.path().join("history.json");

        let (commit, results) = write_run(dir.path(), "c1", 42.0);
        let output = execute(ingest(commit, results, OutputFormat::Json), &settings)
            .await
            .unwrap();
        let report: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(report["status"], "appended");
        assert_eq!(report["records"][0]["evaluation"]["verdict"], "OK");

        let missing = Commands::Latest {
            group: DEFAULT_GROUP.to_string(),
            tool: "go".to_string(),
            name: "BenchmarkNope".to_string(),
        };
        assert!(execute(missing, &settings).await.is_err());
    }
}
