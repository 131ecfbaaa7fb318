// crates/correlator-cli/src/main.rs
// ============================================================================
// Binary: correlator
// Description: Command-line host process for the temporal event correlator.
// Purpose: Load a rule document and a configuration, stream events through
// `correlator_core::Correlator`, and surface alerts, stats, and decision
// graphs for operator inspection.
// Dependencies: clap, correlator-core, correlator-config, serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! `correlator` is a foreground, single-process host: `start` reads a
//! newline-delimited JSON event stream to completion (or until interrupted)
//! and writes alerts and, optionally, a decision-graph log. There is no
//! background daemon and no inter-process control channel in this scope —
//! `stop` is a documented no-op placeholder for a future IPC layer, and
//! `stats`/`export-graph` operate on logs a prior `start` run produced
//! rather than on a live process.

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        missing_docs,
        clippy::missing_docs_in_private_items
    )
)]

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::io::stdin;
use std::io::stdout;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clap::Parser;
use clap::Subcommand;
use correlator_config::CorrelatorConfig;
use correlator_core::Correlator;
use correlator_core::EventTime;
use correlator_core::alert::LogSink;
use correlator_core::graph::DecisionGraph;
use correlator_core::rule::RuleDocument;
use correlator_core::rule::RuleLoadDefaults;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Surface
// ============================================================================

/// Temporal event correlation core: evaluates a rule set against a stream
/// of security events and emits alerts.
#[derive(Debug, Parser)]
#[command(name = "correlator", version, about)]
struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Load rules and stream events, emitting alerts as they fire.
    Start {
        /// Path to the rule document (YAML or JSON).
        #[arg(long)]
        rules: PathBuf,
        /// Path to the TOML configuration file; defaults are used if absent.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Path to a newline-delimited JSON event file, or `-` for stdin.
        #[arg(long, default_value = "-")]
        input: String,
        /// Path to write one JSON line per decision graph produced.
        #[arg(long)]
        decision_log: Option<PathBuf>,
    },
    /// Documented no-op: there is no running daemon for this command to
    /// signal in the current scope.
    Stop,
    /// Validate a rule document without starting a correlator.
    ReloadRules {
        /// Path to the rule document (YAML or JSON).
        #[arg(long)]
        rules: PathBuf,
    },
    /// Summarize a previously written alert log.
    Stats {
        /// Path to a JSON-lines alert log; reads stdin if omitted.
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Render one decision graph from a decision-graph log as Graphviz DOT.
    ExportGraph {
        /// 0-based index of the decision graph to render, in the order it
        /// was written.
        #[arg(long)]
        index: usize,
        /// Path to a JSON-lines decision-graph log.
        #[arg(long)]
        from: PathBuf,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A fatal CLI-level failure.
#[derive(Debug, Error)]
enum CliError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A rule document failed to parse as YAML or JSON.
    #[error("failed to parse rule document {path}: {detail}")]
    RuleDocumentParse {
        /// The path that failed to parse.
        path: PathBuf,
        /// Human-readable parse failure detail.
        detail: String,
    },
    /// A configuration file failed to load or validate.
    #[error("configuration error: {0}")]
    Config(#[from] correlator_config::ConfigError),
    /// A requested decision graph index was out of range.
    #[error("decision graph index {index} out of range ({available} available)")]
    GraphIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of graphs found in the log.
        available: usize,
    },
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout, in place of the banned `println!` macro.
fn write_stdout_line(line: &str) {
    let mut handle = stdout().lock();
    let _ = writeln!(handle, "{line}");
}

/// Writes one line to stderr, in place of the banned `eprintln!` macro.
fn write_stderr_line(line: &str) {
    let mut handle = std::io::stderr().lock();
    let _ = writeln!(handle, "{line}");
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            write_stderr_line(&format!("correlator: {err}"));
            ExitCode::from(1)
        }
    }
}

/// Dispatches a parsed subcommand, returning the process exit code: `0` for
/// a clean run, `2` for a rule validation failure, `1` is reserved for the
/// `Err` path in [`main`] (any other fatal failure).
///
/// # Errors
///
/// Returns [`CliError`] for any fatal failure (file I/O, parse failure,
/// configuration error). Rule validation failures are handled inline and
/// surfaced as exit code 2 rather than as a `CliError`.
fn run(command: Command) -> Result<u8, CliError> {
    match command {
        Command::Start {
            rules,
            config,
            input,
            decision_log,
        } => run_start(&rules, config.as_deref(), &input, decision_log.as_deref()),
        Command::Stop => {
            write_stdout_line("correlator: stop is a no-op; no daemon is running in this mode");
            Ok(0)
        }
        Command::ReloadRules { rules } => run_reload_rules(&rules),
        Command::Stats { from } => run_stats(from.as_deref()),
        Command::ExportGraph { index, from } => run_export_graph(index, &from),
    }
}

// ============================================================================
// SECTION: Rule Loading
// ============================================================================

/// Reads and parses a rule document from `path`. Accepts both YAML and JSON
/// since JSON is a subset of YAML; `serde_yaml` reads either directly.
fn read_rule_document(path: &Path) -> Result<RuleDocument, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|e| CliError::RuleDocumentParse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

// ============================================================================
// SECTION: Start
// ============================================================================

fn run_start(
    rules_path: &Path,
    config_path: Option<&Path>,
    input: &str,
    decision_log_path: Option<&Path>,
) -> Result<u8, CliError> {
    let config = match config_path {
        Some(path) => CorrelatorConfig::from_file(path)?,
        None => CorrelatorConfig::default(),
    };

    let document = read_rule_document(rules_path)?;
    let defaults = RuleLoadDefaults {
        default_window_secs: config.default_window_secs,
        default_count: correlator_core::rule::CountPredicate::parse(&config.default_count)
            .unwrap_or_else(|_| correlator_core::rule::CountPredicate::default_at_least_one()),
    };

    let rules = match correlator_core::load_rules(&document, defaults) {
        Ok(rules) => rules,
        Err(errors) => {
            for error in &errors {
                write_stderr_line(&format!("rule validation error: {error}"));
            }
            return Ok(2);
        }
    };

    let mut correlator = Correlator::new(
        rules,
        config.max_decision_graphs,
        config.max_alerts_in_memory,
        config.retention_window_secs,
        config.default_confidence,
    );
    correlator.register_sink(Box::new(LogSink::new("stdout", stdout())));

    let mut decision_log = decision_log_path
        .map(|path| File::create(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source }))
        .transpose()?;

    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(stdin()))
    } else {
        let file = File::open(input).map_err(|source| CliError::Io {
            path: PathBuf::from(input),
            source,
        })?;
        Box::new(BufReader::new(file))
    };

    for line in reader.lines() {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }
        let Ok(raw_event) = serde_json::from_str::<serde_json::Value>(&line) else {
            continue;
        };
        let ingest_time = current_ingest_time();
        let outcome = correlator.admit(&raw_event, ingest_time);

        if let (correlator_core::AdmitOutcome::Admitted { graphs, .. }, Some(log)) =
            (&outcome, decision_log.as_mut())
        {
            write_decision_graphs(log, graphs);
        }
    }

    Ok(0)
}

/// Approximates "now" for event ingest; the engine treats this only as a
/// fallback for events with a missing or non-finite wire timestamp.
fn current_ingest_time() -> EventTime {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    EventTime::from_unix_seconds(seconds)
}

/// Appends one JSON line per decision graph to the decision log file.
fn write_decision_graphs(log: &mut File, graphs: &[DecisionGraph]) {
    for graph in graphs {
        if let Ok(line) = serde_json::to_string(graph) {
            let _ = writeln!(log, "{line}");
        }
    }
}

// ============================================================================
// SECTION: Reload Rules
// ============================================================================

fn run_reload_rules(rules_path: &Path) -> Result<u8, CliError> {
    let document = read_rule_document(rules_path)?;
    match correlator_core::load_rules(&document, RuleLoadDefaults::default()) {
        Ok(rules) => {
            write_stdout_line(&format!("ok: {} rule(s) validated", rules.len()));
            Ok(0)
        }
        Err(errors) => {
            for error in &errors {
                write_stderr_line(&format!("rule validation error: {error}"));
            }
            Ok(2)
        }
    }
}

// ============================================================================
// SECTION: Stats
// ============================================================================

fn run_stats(from: Option<&Path>) -> Result<u8, CliError> {
    let reader: Box<dyn BufRead> = match from {
        Some(path) => {
            let file = File::open(path).map_err(|source| CliError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(stdin())),
    };

    let mut total = 0_u64;
    let mut by_rule: std::collections::BTreeMap<String, u64> = std::collections::BTreeMap::new();

    for line in reader.lines() {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }
        let Ok(alert) = serde_json::from_str::<correlator_core::Alert>(&line) else {
            continue;
        };
        total += 1;
        *by_rule.entry(alert.rule_id).or_insert(0) += 1;
    }

    write_stdout_line(&format!("total_alerts={total}"));
    for (rule_id, count) in &by_rule {
        write_stdout_line(&format!("  {rule_id}={count}"));
    }
    Ok(0)
}

// ============================================================================
// SECTION: Export Graph
// ============================================================================

fn run_export_graph(index: usize, from: &Path) -> Result<u8, CliError> {
    let file = File::open(from).map_err(|source| CliError::Io {
        path: from.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut graphs = Vec::new();
    for line in reader.lines() {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(graph) = serde_json::from_str::<DecisionGraph>(&line) {
            graphs.push(graph);
        }
    }

    let Some(graph) = graphs.get(index) else {
        return Err(CliError::GraphIndexOutOfRange {
            index,
            available: graphs.len(),
        });
    };

    write_stdout_line(&graph.to_dot());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_rules_accepts_a_minimal_valid_document() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            "rules:\n  - id: r1\n    name: Test Rule\n    severity: HIGH\n    conditions:\n      - type: auth_fail\n    actions:\n      - message: test\n"
        )
        .expect("write rule document");

        let exit_code = run_reload_rules(file.path()).expect("reload must not error fatally");
        assert_eq!(exit_code, 0);
    }

    #[test]
    fn reload_rules_rejects_a_document_with_no_actions() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            "rules:\n  - id: r1\n    name: Test Rule\n    severity: HIGH\n    conditions:\n      - type: auth_fail\n"
        )
        .expect("write rule document");

        let exit_code = run_reload_rules(file.path()).expect("reload must not error fatally");
        assert_eq!(exit_code, 2);
    }

    #[test]
    fn start_streams_ndjson_events_and_writes_a_decision_log() {
        let mut rules_file = tempfile::NamedTempFile::new().expect("create rules file");
        writeln!(
            rules_file,
            "rules:\n  - id: credential_stuffing\n    name: Credential Stuffing\n    severity: HIGH\n    conditions:\n      - type: auth_fail\n        window: 60\n        count: \">= 3\"\n        group_by: [user]\n    actions:\n      - message: credential stuffing detected\n"
        )
        .expect("write rule document");

        let mut input_file = tempfile::NamedTempFile::new().expect("create input file");
        for t in 0..3 {
            writeln!(input_file, r#"{{"type": "auth_fail", "timestamp": {t}, "user": "alice"}}"#)
                .expect("write ndjson line");
        }

        let decision_log = tempfile::NamedTempFile::new().expect("create decision log file");

        let exit_code = run_start(
            rules_file.path(),
            None,
            input_file.path().to_str().expect("path is valid utf-8"),
            Some(decision_log.path()),
        )
        .expect("start must not error fatally");

        assert_eq!(exit_code, 0);

        let written = std::fs::read_to_string(decision_log.path()).expect("read decision log");
        let graph_count = written.lines().filter(|l| !l.trim().is_empty()).count();
        assert_eq!(graph_count, 3, "one decision graph per admitted event, one rule loaded");
    }
}
