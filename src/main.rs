use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::process;

use semantic_charts::{
    chart::{self, chart_row_limit, ChartAssignment, ResultSet, ShapeDescriptor},
    config::{ChartConfig, Config},
    selection::ResultOperation,
    semantic_model::{
        index::ColumnRef, local_store::LocalSemanticModelStore, ColumnKind, SemanticModelStore,
    },
    SharedSession,
};

const SAMPLE_VALUES_SHOWN: usize = 3;

#[derive(Parser)]
#[command(name = "semantic-charts")]
#[command(about = "Browse semantic models, build questions and pick charts for results")]
struct Cli {
    /// Directory holding semantic model YAML files (overrides SEMANTIC_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Semantic model to use (overrides SEMANTIC_MODEL)
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available semantic models
    List,
    /// Show the columns of a model, grouped by table
    Browse {
        /// Only show columns of this kind (dimension, time_dimension, fact)
        #[arg(long)]
        kind: Option<ColumnKind>,
        /// Only show columns whose name or description contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Build a natural-language question from selected columns
    Prompt {
        /// Column to select, as TABLE.COLUMN
        #[arg(long = "select", required = true)]
        columns: Vec<ColumnRef>,
        /// Operation for a selected column, as TABLE.COLUMN=operation
        #[arg(long = "op", value_parser = parse_assignment)]
        operations: Vec<(ColumnRef, String)>,
        /// Filter for a selected column, as TABLE.COLUMN=text
        #[arg(long = "filter", value_parser = parse_assignment)]
        filters: Vec<(ColumnRef, String)>,
    },
    /// Pick a chart for a JSON result file ({"columns": [...], "rows": [[...]]})
    Chart { results: PathBuf },
}

#[derive(Serialize)]
struct ChartReport {
    shape: ShapeDescriptor,
    assignment: ChartAssignment,
    row_limit: usize,
}

fn parse_assignment(s: &str) -> Result<(ColumnRef, String), String> {
    let (column, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE.COLUMN=value, got '{}'", s))?;
    let column_ref = column.parse::<ColumnRef>().map_err(|e| e.to_string())?;
    Ok((column_ref, value.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let config = Config::new().map_err(|e| {
        error!("Failed to initialize config: {}", e);
        e
    })?;

    let model_dir = cli
        .model_dir
        .unwrap_or_else(|| PathBuf::from(&config.model_dir));
    let store = LocalSemanticModelStore::new(model_dir);
    let model_name = cli.model.or(config.default_model);

    match cli.command {
        Commands::List => {
            let models = store.list_models().await.map_err(|e| {
                error!("Failed to list semantic models: {}", e);
                e
            })?;
            for name in models {
                println!("{}", name);
            }
        }
        Commands::Browse { kind, search } => {
            let session = open_session(&store, model_name).await?;
            let session = session.lock().await;
            let index = session.index()?;
            let kinds = match kind {
                Some(kind) => vec![kind],
                None => vec![ColumnKind::Dimension, ColumnKind::TimeDimension, ColumnKind::Fact],
            };
            let mut current_table = None;
            for entry in index.search(search.as_deref().unwrap_or(""), &kinds) {
                if current_table != Some(entry.table.name.as_str()) {
                    current_table = Some(entry.table.name.as_str());
                    println!("{} ({})", entry.table.name, entry.table.label());
                }
                let operations: Vec<&str> = ResultOperation::menu_for(entry.column.kind)
                    .iter()
                    .map(|op| op.id())
                    .collect();
                println!(
                    "  {:<32} {:<15} {:<40} [{}]",
                    entry.column.name,
                    entry.column.kind.to_string(),
                    entry.column.label(),
                    operations.join(", ")
                );
                let samples = entry.column.sample_preview(SAMPLE_VALUES_SHOWN);
                if !samples.is_empty() {
                    println!("      e.g. {}", samples.join(", "));
                }
            }
        }
        Commands::Prompt {
            columns,
            operations,
            filters,
        } => {
            let session = open_session(&store, model_name).await?;
            let mut session = session.lock().await;
            for column in &columns {
                session.select(column)?;
            }
            for (column, op) in &operations {
                session.set_operation_str(column, op).map_err(|e| {
                    error!("Cannot set operation for {}: {}", column, e);
                    e
                })?;
            }
            for (column, text) in &filters {
                session.set_filter(column, text).map_err(|e| {
                    error!("Cannot set filter for {}: {}", column, e);
                    e
                })?;
            }
            println!("{}", session.prompt()?);
        }
        Commands::Chart { results } => {
            let chart_config = ChartConfig::new().map_err(|e| {
                error!("Failed to initialize chart config: {}", e);
                e
            })?;
            let json = tokio::fs::read_to_string(&results).await.map_err(|e| {
                error!("Failed to read {}: {}", results.display(), e);
                e
            })?;
            let result_set = ResultSet::from_json(&json).map_err(|e| {
                error!("Failed to parse {}: {}", results.display(), e);
                e
            })?;

            let (shape, assignment) = chart::recommend(&result_set);
            let row_limit = chart_row_limit(
                result_set.estimated_bytes(),
                result_set.row_count(),
                &chart_config,
            );
            info!(
                "Chart for {}: {:?} ({})",
                results.display(),
                assignment.archetype_id(),
                assignment.reason
            );
            let report = ChartReport {
                shape,
                assignment,
                row_limit,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn open_session(
    store: &LocalSemanticModelStore,
    model_name: Option<String>,
) -> Result<SharedSession, Box<dyn std::error::Error>> {
    let Some(name) = model_name else {
        error!("No semantic model given; pass --model or set SEMANTIC_MODEL");
        process::exit(2);
    };

    let session = SharedSession::default();
    session.load_from_store(store, &name).await.map_err(|e| {
        error!("Failed to load semantic model {}: {}", name, e);
        e
    })?;
    Ok(session)
}
