//! RossVis CLI - analyze ROSS simulation statistics
//!
//! # Dataset Commands
//!
//! ```bash
//! rossvis summary --data-dir run1              # Load a run and report sizes
//! rossvis brush-rt 0.5 2.0 --data-dir run1     # RT window -> GVT samples
//! rossvis detail 0 5000 --select 3,1           # GVT window -> detail views
//! rossvis dashboard script.json                # Replay interactions
//! ```
//!
//! # Building Blocks
//!
//! ```bash
//! rossvis table lp-mapping.txt --header PE_ID,KP_ID,LP_ID,LP_type --types int,int,int,string
//! rossvis pipeline records.json spec.json      # Apply a JSON pipeline
//! rossvis matrix ross-stats-evrb-pes.json      # Sum PE snapshots
//! rossvis operations                           # Show pipeline stages
//! ```

use clap::{Args, Parser, Subcommand};
use rossvis::{
    brush_rt, build_pe_matrix, detect_delimiter, detail, load_dataset, load_delimited, operations_description,
    read_text_file, records_from_json, within_window, AnalysisConfig, ColumnType, Dashboard, Interaction, PeSnapshot,
    PipelineSpec, RecordingRenderer, TableSchema, TimeAxis, TimeWindow,
};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rossvis")]
#[command(about = "Aggregate ROSS simulation statistics into dashboard views", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the dataset comes from.
#[derive(Args)]
struct DatasetArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the run's statistics files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// KPs per PE
    #[arg(long)]
    num_kp: Option<usize>,
}

impl DatasetArgs {
    fn resolve(&self) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
        let mut config = AnalysisConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        if let Some(n) = self.num_kp {
            config = config.with_num_kp(n);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load a delimited file with typed columns and output JSON
    Table {
        /// Input text file
        input: PathBuf,

        /// Comma-separated field names
        #[arg(long, value_delimiter = ',', required = true)]
        header: Vec<String>,

        /// Comma-separated column types (int, float, string)
        #[arg(long, value_delimiter = ',', required = true)]
        types: Vec<String>,

        /// Leading rows to skip
        #[arg(long, default_value = "1")]
        skip: usize,

        /// Field delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply a JSON pipeline spec to a JSON array of records
    Pipeline {
        /// Input JSON file (array of records)
        input: PathBuf,

        /// Pipeline spec JSON file
        spec: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sum PE communication snapshots into a PE x PE matrix
    Matrix {
        /// Snapshot JSON file
        input: PathBuf,

        /// Lower GVT bound
        #[arg(long)]
        from: Option<f64>,

        /// Upper GVT bound
        #[arg(long)]
        to: Option<f64>,

        /// PE ids to keep, in order
        #[arg(long, value_delimiter = ',')]
        select: Vec<usize>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a dataset and report what it contains
    Summary {
        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// Map an RT window to the matching GVT samples
    BrushRt {
        low: f64,
        high: f64,

        #[command(flatten)]
        dataset: DatasetArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the detail views for a GVT window
    Detail {
        low: f64,
        high: f64,

        /// PE ids to narrow to, in order
        #[arg(long, value_delimiter = ',')]
        select: Vec<usize>,

        #[command(flatten)]
        dataset: DatasetArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay a JSON list of interactions and print the resulting charts
    Dashboard {
        /// Interaction script (JSON array)
        script: PathBuf,

        #[command(flatten)]
        dataset: DatasetArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show available pipeline stages
    Operations,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Table {
            input,
            header,
            types,
            skip,
            delimiter,
            output,
        } => cmd_table(&input, header, &types, skip, delimiter, output.as_deref()),

        Commands::Pipeline { input, spec, output } => cmd_pipeline(&input, &spec, output.as_deref()),

        Commands::Matrix {
            input,
            from,
            to,
            select,
            output,
        } => cmd_matrix(&input, from, to, &select, output.as_deref()),

        Commands::Summary { dataset } => cmd_summary(&dataset).await,

        Commands::BrushRt {
            low,
            high,
            dataset,
            output,
        } => cmd_brush_rt(low, high, &dataset, output.as_deref()).await,

        Commands::Detail {
            low,
            high,
            select,
            dataset,
            output,
        } => cmd_detail(low, high, &select, &dataset, output.as_deref()).await,

        Commands::Dashboard {
            script,
            dataset,
            output,
        } => cmd_dashboard(&script, &dataset, output.as_deref()).await,

        Commands::Operations => cmd_operations(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_table(
    input: &Path,
    header: Vec<String>,
    types: &[String],
    skip: usize,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Loading table: {}", input.display());

    let text = read_text_file(input)?;
    let used_delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&text));
    let types = types
        .iter()
        .map(|t| t.parse::<ColumnType>())
        .collect::<Result<Vec<_>, _>>()?;
    let schema = TableSchema::new(header, types)?.skip(skip).delimiter(used_delimiter);

    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(used_delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", schema.header.join(", "));

    let records = load_delimited(&text, &schema)?;
    eprintln!("✅ Loaded {} records", records.len());

    write_output(&serde_json::to_string_pretty(&records)?, output)
}

fn cmd_pipeline(input: &Path, spec_path: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("⚙️  Pipeline: {} on {}", spec_path.display(), input.display());

    let spec = PipelineSpec::from_json(&fs::read_to_string(spec_path)?)?;
    let rows: Vec<Value> = serde_json::from_str(&fs::read_to_string(input)?)?;
    let records = records_from_json(&rows)?;
    eprintln!("   {} records, {} stages", records.len(), spec.stages.len());

    let result = spec.compile().run(records)?;
    eprintln!("✅ {} records out", result.len());

    write_output(&serde_json::to_string_pretty(&result)?, output)
}

fn cmd_matrix(
    input: &Path,
    from: Option<f64>,
    to: Option<f64>,
    select: &[usize],
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔗 Communication matrix: {}", input.display());

    let snapshots: Vec<PeSnapshot> = serde_json::from_str(&fs::read_to_string(input)?)?;
    let window = TimeWindow::closed(
        TimeAxis::Gvt,
        from.unwrap_or(f64::NEG_INFINITY),
        to.unwrap_or(f64::INFINITY),
    );
    let inside = within_window(&snapshots, &window);
    eprintln!("   {} of {} snapshots in window", inside.len(), snapshots.len());

    let Some(mut matrix) = build_pe_matrix(inside)? else {
        eprintln!("⚠️  No snapshots in window");
        return Ok(());
    };
    if !select.is_empty() {
        matrix = matrix.select(select)?;
    }
    eprintln!("✅ {}x{} matrix", matrix.size(), matrix.size());

    write_output(&serde_json::to_string_pretty(&matrix)?, output)
}

async fn cmd_summary(dataset: &DatasetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = dataset.resolve()?;
    let data = load_dataset(&config).await?;

    println!("📊 Dataset: {}", config.data_dir.display());
    println!("   KPs per PE: {}", config.num_kp);
    println!("   RT samples: {}", data.rt_lps.len());
    println!("   GVT samples: {}", data.gvt_lps.len());
    println!("   KP samples: {}", data.kp_samples.len());
    println!("   PE samples: {}", data.pe_samples.len());
    println!("   Router table: {} KPs", data.routers.len());
    println!("   LP mapping: {} LPs", data.lp_mapping.len());
    println!("   PE snapshots: {}", data.pe_comm.len());
    println!("   LP-type snapshots: {}", data.lp_type_comm.len());
    if let Some(first) = data.pe_comm.first() {
        println!("   PEs: {}", first.flows.len());
    }
    Ok(())
}

async fn cmd_brush_rt(
    low: f64,
    high: f64,
    dataset: &DatasetArgs,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = dataset.resolve()?;
    let data = load_dataset(&config).await?;

    match brush_rt(&data, low, high) {
        Some(gvt) => write_output(&serde_json::to_string_pretty(&gvt)?, output),
        None => {
            eprintln!("⚠️  No GVT samples for RT [{}, {}]", low, high);
            Ok(())
        }
    }
}

async fn cmd_detail(
    low: f64,
    high: f64,
    select: &[usize],
    dataset: &DatasetArgs,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = dataset.resolve()?;
    let data = load_dataset(&config).await?;

    let window = TimeWindow::closed(TimeAxis::Gvt, low, high);
    let Some(view) = detail(&data, &config, window)? else {
        eprintln!("⚠️  No samples in {}", window);
        return Ok(());
    };

    let report = if select.is_empty() {
        json!({
            "window": view.window,
            "pes": view.pes,
            "kps": view.kps,
            "lps": view.lps,
            "kp_by_pe": view.kp_by_pe,
            "lp_by_pe": view.lp_by_pe,
            "chord": view.chord(),
            "lp_graph": view.lp_type_matrix.as_ref().map(|m| m.graph()),
        })
    } else {
        let selection = view.select(select)?;
        json!({
            "window": view.window,
            "selection": selection.pes,
            "kps": selection.kps,
            "lps": selection.lps,
            "chord": selection.chord,
            "lp_graph": selection.lp_type_matrix.as_ref().map(|m| m.graph()),
        })
    };

    write_output(&serde_json::to_string_pretty(&report)?, output)
}

async fn cmd_dashboard(
    script_path: &Path,
    dataset: &DatasetArgs,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let script: Vec<Interaction> = serde_json::from_str(&fs::read_to_string(script_path)?)?;
    let config = dataset.resolve()?;
    let data = load_dataset(&config).await?;

    let mut dashboard = Dashboard::new(data, config, RecordingRenderer::new());
    for (i, step) in script.iter().enumerate() {
        let changed = dashboard.apply(step)?;
        eprintln!("   {} step {}: {}", if changed { "✓" } else { "·" }, i, if changed { "updated" } else { "no change" });
    }

    let renderer = dashboard.into_renderer();
    let charts: Vec<Value> = renderer
        .visible()
        .into_iter()
        .map(|(view, spec)| json!({"view": view, "spec": spec}))
        .collect();
    eprintln!("✅ {} charts visible", charts.len());

    write_output(&serde_json::to_string_pretty(&charts)?, output)
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", operations_description());
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
