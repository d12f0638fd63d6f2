//! Index Schema CLI
//!
//! Inspects get-mapping responses and previews analysis payloads without a
//! cluster.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use elastic_schema::connection::resolve_index_name;
use elastic_schema::{
    mapping, AnalyzerDefinition, Call, MemoryConnection, SchemaBuilder, SchemaConfig,
};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "index-schema")]
#[command(about = "Inspect index mappings and preview analysis settings")]
struct Cli {
    /// Configuration file (defaults to index-schema.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the logical field names of a get-mapping response
    Fields {
        /// JSON file holding the response
        mapping: PathBuf,
        /// Index to read (defaults to the only entry)
        #[arg(short, long)]
        index: Option<String>,
    },

    /// Check that every field exists; exits 1 otherwise
    Check {
        mapping: PathBuf,
        #[arg(required = true)]
        fields: Vec<String>,
        #[arg(short, long)]
        index: Option<String>,
    },

    /// Apply a JSON list of analysis components to an in-memory index
    Analysis {
        /// JSON file with `[{"config": "analyzer", "name": ..., ...}]`
        definitions: PathBuf,
        #[arg(short, long, default_value = "analysis_preview")]
        index: String,
    },

    /// Print the resolved configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let config_path = cli.config.as_deref().map(|p| p.to_string_lossy().into_owned());
    let config = SchemaConfig::load_from(config_path.as_deref()).context("loading configuration")?;
    debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Fields { mapping: file, index } => {
            let response = read_json(&file)?;
            let index = pick_index(&response, index)?;
            let mut seen = Vec::new();
            for name in mapping::field_names(&response, &index)? {
                if !seen.contains(&name) {
                    println!("{}", name);
                    seen.push(name);
                }
            }
            Ok(true)
        }

        Commands::Check { mapping: file, fields, index } => {
            let response = read_json(&file)?;
            let index = pick_index(&response, index)?;
            let names = mapping::field_names(&response, &index)?;

            let mut all_found = true;
            for field in &fields {
                if names.contains(field) {
                    println!("  ✅ {}", field);
                } else {
                    println!("  ❌ {} - missing", field);
                    all_found = false;
                }
            }
            Ok(all_found)
        }

        Commands::Analysis { definitions, index } => {
            let definitions: Vec<AnalyzerDefinition> = serde_json::from_value(read_json(&definitions)?)
                .context("analysis file must be a list of definitions")?;

            let resolved = resolve_index_name(config.connection.index_prefix.as_deref(), &index);
            let connection = MemoryConnection::new().with_index(&resolved, Value::Object(Default::default()));
            let schema = SchemaBuilder::with_config(connection, &config.connection);
            schema.set_analyzer(&index, |analysis| {
                for definition in definitions {
                    analysis.push(definition);
                }
            })?;

            let payload = schema.connection().calls().into_iter().find_map(|call| match call {
                Call::IndexAnalyzerSettings { payload, .. } => Some(payload),
                _ => None,
            });
            match payload {
                Some(payload) => {
                    println!("{}", config.output.format.render(&payload)?);
                    let settings = schema.get_settings(&index)?;
                    println!("{}", config.output.format.render(&settings)?);
                    Ok(true)
                }
                None => {
                    println!("No analysis components declared");
                    Ok(true)
                }
            }
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(true)
        }
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn pick_index(response: &Value, index: Option<String>) -> anyhow::Result<String> {
    if let Some(index) = index {
        return Ok(index);
    }
    match response.as_object().map(|entries| entries.keys().collect::<Vec<_>>()) {
        Some(keys) if keys.len() == 1 => Ok(keys[0].clone()),
        Some(keys) => bail!("response holds {} indexes, pick one with --index", keys.len()),
        None => bail!("response is not a JSON object"),
    }
}
