//! Cluster review client (clab-review) - Main entry point
//!
//! Terminal front end for the review session: uploads the dataset, prints
//! each reference/exemplar comparison and reads the reviewer's answers from
//! stdin until the cluster set is exhausted.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clab_common::config::{resolve_backend_url, ConfigResolver, TomlConfig, BACKEND_URL_ENV_VAR};
use clab_common::events::{Decision, EventBus, ReviewEvent};
use clab_review::dataset::DatasetStore;
use clab_review::gateway::HttpGateway;
use clab_review::view::{ReviewView, SeriesSummary};
use clab_review::Reviewer;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for clab-review
#[derive(Parser, Debug)]
#[command(name = "clab-review")]
#[command(about = "Interactive review of a time-series clustering")]
#[command(version)]
struct Args {
    /// CSV dataset to upload (one series per row, no header)
    dataset: PathBuf,

    /// Base URL of the clustering backend
    #[arg(short, long, env = BACKEND_URL_ENV_VAR)]
    backend_url: Option<String>,

    /// Configuration file (overrides CLAB_CONFIG and the default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the label table once review completes
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// One line of reviewer input
#[derive(Debug, PartialEq)]
enum Input {
    Answer(Decision),
    Retry,
    Reset,
    Export(Option<PathBuf>),
    Status,
    Quit,
    Help,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Option<Input> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let input = match word.to_ascii_lowercase().as_str() {
            "y" | "yes" => Input::Answer(Decision::Yes),
            "n" | "no" => Input::Answer(Decision::No),
            "r" | "retry" | "refresh" => Input::Retry,
            "reset" => Input::Reset,
            "export" if rest.is_empty() => Input::Export(None),
            "export" => Input::Export(Some(PathBuf::from(rest))),
            "status" => Input::Status,
            "q" | "quit" | "exit" => Input::Quit,
            "h" | "help" | "?" => Input::Help,
            _ => Input::Unknown(line.to_string()),
        };
        Some(input)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let config = resolver.load().context("Failed to load configuration")?;

    init_tracing(&config)?;

    info!("Starting {}", build_id());
    if let Some((path, source)) = resolver.config_path() {
        info!("Config file: {} ({:?})", path.display(), source);
    }

    let backend_url = resolve_backend_url(args.backend_url.as_deref(), BACKEND_URL_ENV_VAR, &config);
    let timeout = args
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.backend.timeout());
    info!("Backend: {} (timeout {:?})", backend_url, timeout);

    let dataset = DatasetStore::from_path(&args.dataset)
        .with_context(|| format!("Failed to load dataset {}", args.dataset.display()))?;
    info!("Loaded {} rows from {}", dataset.len(), args.dataset.display());

    let export_path = args
        .export
        .or_else(|| config.export.path.clone())
        .unwrap_or_else(|| default_export_path(&args.dataset));

    let gateway = HttpGateway::new(&backend_url, timeout).context("Failed to create HTTP client")?;
    let event_bus = EventBus::new(100);
    let printer = tokio::spawn(print_events(event_bus.subscribe()));

    let mut reviewer = Reviewer::new(dataset, Arc::new(gateway), event_bus)
        .with_export_path(export_path);

    println!("Uploading {} to {} ...", args.dataset.display(), backend_url);
    if let Err(e) = reviewer.start().await {
        println!("Upload failed: {}. Type 'r' to retry.", e);
    }
    show(&reviewer);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = &mut shutdown => break,
        };
        let Some(line) = line else {
            break;
        };
        let Some(input) = Input::parse(&line) else {
            continue;
        };

        match input {
            Input::Answer(decision) => report(reviewer.decide(decision).await),
            Input::Retry => report(reviewer.refresh().await),
            Input::Reset => {
                report(reviewer.reset());
                println!("Session discarded. Type 'r' to upload again.");
            }
            Input::Export(path) => {
                let path = path
                    .or_else(|| reviewer.export_path().map(Path::to_path_buf))
                    .unwrap_or_else(|| default_export_path(&args.dataset));
                match reviewer.write_export(&path) {
                    Ok(rows) => println!("Wrote {} rows to {}", rows, path.display()),
                    Err(e) => println!("Export failed: {}", e),
                }
            }
            Input::Status => {
                let status = serde_json::to_string_pretty(reviewer.state())
                    .context("Failed to serialize session state")?;
                println!("{}", status);
                continue;
            }
            Input::Help => {
                print_help();
                continue;
            }
            Input::Quit => break,
            Input::Unknown(line) => {
                println!("Unrecognized input '{}'. Type 'help' for commands.", line);
                continue;
            }
        }
        show(&reviewer);
    }

    reviewer.settle().await;
    drop(reviewer);
    if let Err(e) = printer.await {
        warn!("Event printer task failed: {}", e);
    }

    info!("clab-review shutdown complete");
    Ok(())
}

/// Log to the configured file, or stderr so stdout stays for the reviewer
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let default_filter = format!(
        "clab_review={level},clab_common={level}",
        level = config.logging.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let (stderr_layer, file_layer) = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// `<dataset stem>_labels.csv` next to the dataset
/// `clab-review v<version> (<rev>, <profile>, built <time>)`
fn build_id() -> String {
    format!(
        "clab-review v{} ({}, {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("CLAB_GIT_REV"),
        env!("CLAB_PROFILE"),
        env!("CLAB_BUILT_AT")
    )
}

fn default_export_path(dataset: &Path) -> PathBuf {
    let stem = dataset
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    dataset.with_file_name(format!("{}_labels.csv", stem))
}

fn report(result: clab_review::Result<()>) {
    if let Err(e) = result {
        println!("{}", e);
    }
}

/// Print the current question, or where the session stands
fn show(reviewer: &Reviewer) {
    let state = reviewer.state();

    let view = reviewer.view();
    if let Some(view) = &view {
        print_view(view);
    }

    if let Some(err) = &state.last_error {
        println!("Last request failed ({}). Type 'r' to retry.", err);
    } else if view.is_some() {
        return;
    } else if state.is_terminal() && !state.export_ready() {
        println!("Review complete, waiting for final labels.");
    } else if state.export_ready() {
        println!(
            "Review complete: {} questions, {} clusters. Type 'export [PATH]' to write labels, 'q' to quit.",
            state.questions_answered, state.num_clusters
        );
    }
}

fn print_view(view: &ReviewView<'_>) {
    println!();
    println!("{}  [{}]", view.caption(), view.phase);
    print_series("reference", view.reference.row, view.reference.samples);
    print_series(&view.kind.to_string(), view.exemplar.row, view.exemplar.samples);
    println!(
        "answered: {}  clusters: {}",
        view.questions_answered, view.num_clusters
    );
    println!("{} [y/n]", view.prompt());
}

fn print_series(name: &str, row: usize, samples: &[f64]) {
    const PREVIEW: usize = 8;

    let preview: Vec<String> = samples.iter().take(PREVIEW).map(|v| format!("{:.3}", v)).collect();
    let ellipsis = if samples.len() > PREVIEW { ", ..." } else { "" };
    match SeriesSummary::of(samples) {
        Some(s) => println!(
            "  {:<9} row {:>5}: [{}{}]  n={} min={:.3} max={:.3} mean={:.3}",
            name,
            row,
            preview.join(", "),
            ellipsis,
            s.len,
            s.min,
            s.max,
            s.mean
        ),
        None => println!("  {:<9} row {:>5}: (empty)", name, row),
    }
}

fn print_help() {
    println!("  y, yes         answer yes");
    println!("  n, no          answer no");
    println!("  r, retry       re-send the request that failed");
    println!("  reset          discard the session");
    println!("  export [PATH]  write the label table");
    println!("  status         print the session state");
    println!("  q, quit        exit");
}

/// Report events the main loop does not print itself
async fn print_events(mut rx: tokio::sync::broadcast::Receiver<ReviewEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match rx.recv().await {
            Ok(ReviewEvent::SubclusterRequested { cluster_id, num_clusters, .. }) => {
                println!("Cluster {} sent for further clustering ({} clusters)", cluster_id, num_clusters);
            }
            Ok(ReviewEvent::RequestFailed { command, message, .. }) => {
                error!("{} failed: {}", command, message);
            }
            Ok(ReviewEvent::ExportGenerated { path, row_count, .. }) => {
                println!("Labels for {} rows written to {}", row_count, path.display());
            }
            Ok(event) => {
                tracing::debug!(event = event.event_type(), "Review event");
            }
            Err(RecvError::Lagged(n)) => {
                warn!("Event printer missed {} events", n);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(Input::parse(" Y "), Some(Input::Answer(Decision::Yes)));
        assert_eq!(Input::parse("no"), Some(Input::Answer(Decision::No)));
        assert_eq!(Input::parse("r"), Some(Input::Retry));
        assert_eq!(Input::parse("export"), Some(Input::Export(None)));
        assert_eq!(
            Input::parse("export out/labels.csv"),
            Some(Input::Export(Some(PathBuf::from("out/labels.csv"))))
        );
        assert_eq!(Input::parse(""), None);
        assert_eq!(Input::parse("maybe"), Some(Input::Unknown("maybe".to_string())));
    }

    #[test]
    fn test_build_id_names_version_and_revision() {
        let id = build_id();
        assert!(id.starts_with(&format!("clab-review v{} (", env!("CARGO_PKG_VERSION"))));
        assert!(id.contains(env!("CLAB_GIT_REV")));
        assert!(!env!("CLAB_GIT_REV").is_empty());
        assert!(id.ends_with(&format!("built {})", env!("CLAB_BUILT_AT"))));
    }

    #[test]
    fn test_default_export_path() {
        assert_eq!(
            default_export_path(Path::new("/data/wells.csv")),
            PathBuf::from("/data/wells_labels.csv")
        );
    }
}
