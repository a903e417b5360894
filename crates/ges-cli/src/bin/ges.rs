//! GES CLI - learn a CPDAG from a CSV file
//!
//! Usage:
//!   ges <file.csv>                          # Summary of the learned CPDAG
//!   ges <file.csv> --categorical colour     # Treat a column as categorical
//!   ges <file.csv> -o json                  # CPDAG, score and settings as JSON

use std::process;

use clap::Parser;
use ges_core::metrics::GraphSummary;
use ges_core::{Dataset, Edge, GesSearch, ScorerConfig, SearchConfig, SearchOutcome};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ges")]
#[command(version)]
#[command(about = "Greedy Equivalence Search over mixed continuous/categorical data")]
#[command(
    long_about = "Reads a comma-separated file with a header row, runs the forward and backward \
                  GES phases and prints the learned CPDAG"
)]
struct Cli {
    /// Input CSV file with a header row
    #[arg(value_name = "FILE")]
    file: String,

    /// Column to treat as categorical (repeatable)
    #[arg(short, long, value_name = "NAME")]
    categorical: Vec<String>,

    /// Output format: summary or json
    #[arg(short, long, default_value = "summary", value_name = "FORMAT")]
    output: String,

    /// Refuse inputs with more columns than this
    #[arg(long, value_name = "N")]
    max_nodes: Option<usize>,

    /// Skip the backward (edge deletion) phase
    #[arg(long)]
    forward_only: bool,

    /// Log search progress at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    variables: &'a [String],
    score: f64,
    macro_steps: usize,
    micro_steps: usize,
    dropped_rows: usize,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<u8>>,
    search: SearchConfig,
    scorer: ScorerConfig,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let source = match std::fs::read_to_string(&cli.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", cli.file, e);
            process::exit(1);
        }
    };

    let data = match parse_csv(&source, &cli.categorical) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error loading '{}': {}", cli.file, e);
            process::exit(1);
        }
    };

    let search_config = SearchConfig {
        max_nodes: cli.max_nodes,
        backward: !cli.forward_only,
        ..SearchConfig::default()
    };
    let scorer_config = ScorerConfig::default();

    let outcome = match GesSearch::new(&data, search_config, scorer_config)
        .and_then(|mut search| search.run_to_completion())
    {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Search failed: {}", e);
            process::exit(1);
        }
    };

    match cli.output.as_str() {
        "json" => {
            let report = JsonReport {
                variables: data.names(),
                score: outcome.score,
                macro_steps: outcome.macro_steps,
                micro_steps: outcome.micro_steps,
                dropped_rows: data.dropped_rows(),
                edges: outcome.graph.edges(),
                adjacency: outcome.graph.to_matrix(),
                search: search_config,
                scorer: scorer_config,
            };
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error serializing to JSON: {}", e);
                    process::exit(1);
                }
            }
        }
        "summary" => print_summary(&data, &outcome),
        other => {
            eprintln!("Unknown output format '{}'; expected summary or json", other);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Header row plus comma-separated cells; surrounding quotes are stripped.
fn parse_csv(source: &str, categorical: &[String]) -> Result<Dataset, String> {
    let mut lines = source.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or("file is empty")?;
    let names: Vec<String> = split_row(header);

    if let Some(unknown) = categorical.iter().find(|c| !names.contains(c)) {
        return Err(format!("no column named '{}'", unknown));
    }
    let flags: Vec<bool> = names.iter().map(|n| categorical.contains(n)).collect();
    let rows: Vec<Vec<String>> = lines.map(split_row).collect();

    Dataset::from_text_columns(names, &rows, &flags).map_err(|e| e.to_string())
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',')
        .map(|cell| cell.trim().trim_matches('"').to_string())
        .collect()
}

fn print_summary(data: &Dataset, outcome: &SearchOutcome) {
    let names = data.names();
    let summary = GraphSummary::of(&outcome.graph);

    println!(
        "✓ GES finished over {} variables and {} samples\n",
        data.n_vars(),
        data.n_samples()
    );
    if data.dropped_rows() > 0 {
        println!("Dropped rows: {}", data.dropped_rows());
    }
    println!("Score: {:.6}", outcome.score);
    println!(
        "Steps: {} applied, {} evaluated",
        outcome.macro_steps, outcome.micro_steps
    );

    println!(
        "\nEdges ({} directed, {} undirected):",
        summary.directed, summary.undirected
    );
    for edge in outcome.graph.edges() {
        match edge {
            Edge::Directed { from, to } => println!("  {} -> {}", names[from], names[to]),
            Edge::Undirected { a, b } => println!("  {} -- {}", names[a], names[b]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_csv_reads_header_and_categorical_columns() {
        let source = "x, colour\n1.0,red\n2.5,\"blue\"\n\n,red\n";
        let data = parse_csv(source, &["colour".to_string()]).expect("parse");
        assert_eq!(data.names(), &["x".to_string(), "colour".to_string()]);
        assert_eq!(data.n_samples(), 2);
        assert_eq!(data.dropped_rows(), 1);
        assert!(data.is_categorical(1));
        assert_eq!(data.category_labels(1), &["blue".to_string(), "red".to_string()]);
    }

    #[test]
    fn parse_csv_rejects_unknown_categorical_column() {
        let err = parse_csv("a,b\n1,2\n", &["c".to_string()]).expect_err("unknown");
        assert!(err.contains("no column named 'c'"));
    }
}
