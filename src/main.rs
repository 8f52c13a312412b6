//! Meshport CLI
//!
//! Thin presentation layer over the conversion pipeline: load a mesh,
//! inspect it, convert it. Everything interesting happens in the
//! workspace crates; this binary only wires arguments to pipeline calls
//! and prints what comes back.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use meshport_core::TargetFormat;
use meshport_pipeline::{ConversionPipeline, PipelineConfig};

/// Meshport - 3D mesh loading and format conversion
#[derive(Parser)]
#[command(name = "meshport")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a mesh file
    Info(InfoArgs),

    /// Convert a mesh file to another format
    Convert(ConvertArgs),

    /// List supported input and output formats
    Formats,
}

#[derive(Args)]
struct InfoArgs {
    /// Path to the mesh file
    file: PathBuf,
}

#[derive(Args)]
struct ConvertArgs {
    /// Path to the mesh file
    file: PathBuf,

    /// Target format (obj, stl, ply)
    #[arg(short, long)]
    to: String,

    /// Output directory (defaults to the platform data dir)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Info(args) => run_info(args, cli.format),
        Commands::Convert(args) => run_convert(args, cli.format),
        Commands::Formats => run_formats(cli.format),
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},meshport=info", default_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_info(args: InfoArgs, format: OutputFormat) -> Result<()> {
    if !args.file.exists() {
        bail!("file not found: {}", args.file.display());
    }

    let pipeline = ConversionPipeline::new();
    let summary = pipeline
        .load(args.file.clone())
        .wait()
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!("File:      {}", args.file.display());
            println!("Format:    {}", summary.source_format.name());
            println!("Vertices:  {}", summary.vertex_count);
            println!("Triangles: {}", summary.triangle_count);
            println!("Submeshes: {}", summary.submesh_count);
            println!("Textures:  {}", summary.texture_count);
            let bbox = summary.bounding_box;
            println!(
                "Bounds:    [{:.3}, {:.3}, {:.3}] .. [{:.3}, {:.3}, {:.3}]",
                bbox.min[0], bbox.min[1], bbox.min[2], bbox.max[0], bbox.max[1], bbox.max[2]
            );
        }
    }
    Ok(())
}

fn run_convert(args: ConvertArgs, format: OutputFormat) -> Result<()> {
    if !args.file.exists() {
        bail!("file not found: {}", args.file.display());
    }
    let target = TargetFormat::from_tag(&args.to)
        .with_context(|| format!("'{}' is not a recognized target format", args.to))?;

    let config = match args.output {
        Some(output_dir) => PipelineConfig {
            output_dir,
            ..PipelineConfig::default()
        },
        None => PipelineConfig::default(),
    };
    let pipeline = ConversionPipeline::with_config(config);

    let summary = pipeline
        .load(args.file.clone())
        .wait()
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    let artifact = pipeline
        .convert(target)
        .wait()
        .with_context(|| format!("failed to convert to {}", target))?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "input": args.file,
                    "artifact": artifact,
                    "target": target.extension(),
                    "vertices": summary.vertex_count,
                    "triangles": summary.triangle_count,
                })
            );
        }
        OutputFormat::Text => {
            println!(
                "Converted {} ({} vertices, {} triangles)",
                args.file.display(),
                summary.vertex_count,
                summary.triangle_count
            );
            println!("Wrote {}", artifact.display());
        }
    }
    Ok(())
}

fn run_formats(format: OutputFormat) -> Result<()> {
    let inputs: Vec<&str> = meshport_parsers::GLOBAL_REGISTRY
        .formats()
        .iter()
        .map(|f| f.extension())
        .collect();
    let outputs: Vec<&str> = [
        TargetFormat::Obj,
        TargetFormat::Stl,
        TargetFormat::Ply,
        TargetFormat::Fbx,
        TargetFormat::Usdz,
    ]
    .iter()
    .filter(|t| t.is_encodable())
    .map(|t| t.extension())
    .collect();

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "input": inputs, "output": outputs })
            );
        }
        OutputFormat::Text => {
            println!("Input formats:  {}", inputs.join(", "));
            println!("Output formats: {}", outputs.join(", "));
        }
    }
    Ok(())
}
