//! Rowcast CLI - validate schemas and stream datasets

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;

use rowcast::{
    BindOptions, BindingDefault, EngineError, FixSuggestion, Handler, NodeKind, SchemaNode,
};

#[derive(Parser)]
#[command(name = "rowcast")]
#[command(about = "Rowcast - schema-driven dataset streaming engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a data file through a schema, one JSON event per line
    Stream {
        /// Path to the schema config (YAML)
        schema: String,

        /// Path to the data file (JSON)
        #[arg(short, long)]
        data: String,

        /// Feed sequences the whole parent context instead of a
        /// by-name lookup
        #[arg(long)]
        pass_through: bool,
    },

    /// Validate a schema config (parse and check only)
    Validate {
        /// Path to the schema config (YAML)
        schema: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Stream { schema, data, pass_through } => {
            stream_dataset(&schema, &data, pass_through)
        }
        Commands::Validate { schema } => validate_schema(&schema),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn stream_dataset(schema_file: &str, data_file: &str, pass_through: bool) -> Result<(), EngineError> {
    let container_binding = if pass_through {
        BindingDefault::PassThrough
    } else {
        BindingDefault::ByName
    };
    let handler = Handler::from_path(schema_file)?
        .with_bind_options(BindOptions { container_binding });

    let data: serde_json::Value = serde_json::from_str(&fs::read_to_string(data_file)?)
        .map_err(|e| EngineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    let schema = handler.snapshot();
    let mut handle = ();
    for item in handler.stream(&schema, data.into(), &mut handle) {
        match item {
            Ok((path, event)) => {
                let mut line = match serde_json::to_value(&event) {
                    Ok(serde_json::Value::Object(map)) => map,
                    _ => serde_json::Map::new(),
                };
                line.insert("path".to_string(), serde_json::Value::String(path));
                println!("{}", serde_json::Value::Object(line));
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                // Row-scoped or producer failure: report and keep streaming.
                eprintln!("{} {}", "Warning:".yellow().bold(), e);
            }
        }
    }

    Ok(())
}

fn validate_schema(schema_file: &str) -> Result<(), EngineError> {
    let handler = Handler::from_path(schema_file)?;
    let root = handler.snapshot();

    let mut scalars = 0usize;
    let mut containers = 0usize;
    for node in root.walk() {
        match node.kind {
            NodeKind::Scalar { .. } => scalars += 1,
            NodeKind::Container { .. } => containers += 1,
            NodeKind::Group { .. } => {}
        }
    }

    println!("{} Schema '{}' is valid", "✓".green(), schema_file);
    println!("  Dataset: {}", root.name);
    println!("  Sequences: {}", containers);
    println!("  Fields: {}", scalars);
    print_tree(&root, 1);

    Ok(())
}

fn print_tree(node: &SchemaNode, depth: usize) {
    for child in node.children() {
        let label = match &child.kind {
            NodeKind::Group { .. } => "group".to_string(),
            NodeKind::Container { .. } => "sequence".to_string(),
            NodeKind::Scalar { ty, .. } => ty.to_string(),
        };
        println!("{}{} ({})", "  ".repeat(depth + 1), child.name, label.dimmed());
        print_tree(child, depth + 1);
    }
}
