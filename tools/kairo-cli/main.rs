use clap::{Parser, Subcommand};
use kairo::prelude::*;
use std::time::Instant;
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::EnvFilter;

/// Load, inspect and run node graph documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log engine activity (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trigger a node and print the resulting node states
    Run {
        /// Path to the graph document JSON file
        path: String,
        /// Id of the node to trigger
        #[arg(short, long)]
        start: String,
        /// Exec input to enter the node through
        #[arg(short, long)]
        input: Option<String>,
        /// How many times to trigger the node
        #[arg(short, long, default_value_t = 1)]
        times: usize,
        /// Write the document back to this path after running
        #[arg(long)]
        save: Option<String>,
    },
    /// Print nodes, ports and connections of a document
    Inspect {
        /// Path to the graph document JSON file
        path: String,
    },
    /// List the node types known to the registry
    Types,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run {
            path,
            start,
            input,
            times,
            save,
        } => run(&path, &start, input.as_deref(), times, save.as_deref()).await,
        Command::Inspect { path } => inspect(&path),
        Command::Types => {
            for name in NodeRegistry::with_builtins().type_names() {
                println!("{}", name);
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "kairo=debug" } else { "kairo=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(path: &str, start: &str, input: Option<&str>, times: usize, save: Option<&str>) {
    let document = load(path);
    let start: NodeId = start
        .parse()
        .unwrap_or_else(|e| exit_with_error(&format!("Invalid node id '{}': {}", start, e)));
    if document.node(&start).is_none() {
        exit_with_error(&format!("Node '{}' does not exist in '{}'", start, path));
    }

    let mut events = document.subscribe();
    let run_start = Instant::now();
    for round in 1..=times {
        let result = match input {
            Some(key) => document.execute_input(&start, key).await,
            None => document.execute(&start).await,
        };
        if let Err(e) = result {
            exit_with_error(&format!("Run {} failed: {}", round, e));
        }
    }
    let run_duration = run_start.elapsed();

    let mut forwards = 0;
    let mut failures = Vec::new();
    loop {
        match events.try_recv() {
            Ok(DocumentEvent::Forwarded { .. }) => forwards += 1,
            Ok(DocumentEvent::Failed { node_id, message }) => failures.push((node_id, message)),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }

    println!("\n--- Node States ---");
    for node in document.graph().nodes() {
        let core = node.core();
        let outputs = if core.data_output_keys().is_empty() {
            String::new()
        } else {
            match document.fetch(core.id()) {
                Ok(data) => {
                    let mut pairs: Vec<_> = data.into_iter().collect();
                    pairs.sort_by(|a, b| a.0.cmp(&b.0));
                    pairs
                        .into_iter()
                        .map(|(key, value)| format!("{}={}", key, value))
                        .collect::<Vec<_>>()
                        .join(", ")
                }
                Err(e) => format!("<{}>", e),
            }
        };
        println!(
            "{:<12} {:<10} {} {}",
            core.label(),
            core.status(),
            core.id(),
            outputs
        );
    }
    for (node_id, message) in &failures {
        println!("Failure in {}: {}", node_id, message);
    }

    println!("\n--- Summary ---");
    println!("Runs:      {}", times);
    println!("Forwards:  {}", forwards);
    println!("Failures:  {}", failures.len());
    println!("Duration:  {:?}", run_duration);

    if let Some(out) = save {
        document
            .save_to_file(out)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to save document: {}", e)));
        println!("Saved document to '{}'", out);
    }
}

fn inspect(path: &str) {
    let document = load(path);
    let graph = document.graph();

    println!("--- Nodes ({}) ---", graph.node_count());
    for node in graph.nodes() {
        let core = node.core();
        println!("{} [{}] {}", core.label(), core.type_name(), core.id());
        for port in core.inputs() {
            println!("    in  {:<16} {}", port.key, port.socket.type_name());
        }
        for port in core.outputs() {
            println!("    out {:<16} {}", port.key, port.socket.type_name());
        }
        for (key, control) in core.all_controls() {
            println!("    ctl {:<16} {}", key, control.value());
        }
    }

    println!("\n--- Connections ({}) ---", graph.connection_count());
    for connection in graph.connections() {
        println!(
            "{}.{} -> {}.{}",
            connection.source, connection.source_output, connection.target, connection.target_input
        );
    }
}

fn load(path: &str) -> Document {
    Document::from_file(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load '{}': {}", path, e)))
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
