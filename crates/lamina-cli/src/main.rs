//! lamina CLI - slice a triangle mesh into planar outlines
//!
//! Reads a mesh as JSON (`{"vertices": [...], "indices": [...]}`), slices
//! it and writes the slices as JSON.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lamina_slicer::{mesh_bounds, slice_mesh, IndexedMesh, TracingObserver, Triangle};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "lamina")]
#[command(about = "Slice triangle meshes into closed planar polygons", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Slice a mesh and write the slices as JSON
    Slice {
        /// Input mesh (.json)
        mesh: PathBuf,
        /// Configuration file (.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker threads (overrides the configuration)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },
    /// Display information about a mesh
    Info {
        /// Input mesh (.json)
        mesh: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Slice {
            mesh,
            config,
            output,
            threads,
        } => slice(&mesh, config.as_deref(), output.as_deref(), threads),
        Commands::Info { mesh } => show_info(&mesh),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_triangles(path: &Path) -> Result<Vec<Triangle>> {
    let json =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mesh: IndexedMesh = serde_json::from_str(&json)
        .with_context(|| format!("{} is not a JSON mesh", path.display()))?;
    let triangles = mesh.triangles()?;
    info!(
        path = %path.display(),
        vertices = mesh.num_vertices(),
        triangles = triangles.len(),
        "loaded mesh"
    );
    Ok(triangles)
}

fn slice(
    mesh: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    threads: Option<usize>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if threads.is_some() {
        config.settings.threads = threads;
    }

    let triangles = load_triangles(mesh)?;
    let z_range = mesh_bounds(&triangles).map(|(min, max)| (min[2], max[2]));
    let altitudes = config.planes.altitudes(z_range)?;

    let run = slice_mesh(&triangles, &altitudes, &config.settings, &TracingObserver::new())?;

    match output {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &run)?;
            writer.flush()?;
            eprintln!(
                "Wrote {} slices ({} flagged) to {}",
                run.slices.len(),
                run.flagged,
                path.display()
            );
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &run)?;
            writeln!(writer)?;
        }
    }

    Ok(())
}

fn show_info(path: &Path) -> Result<()> {
    let triangles = load_triangles(path)?;

    println!("mesh: {}", path.display());
    println!("  Triangles: {}", triangles.len());
    match mesh_bounds(&triangles) {
        Some((min, max)) => {
            println!("  Min: [{:.4}, {:.4}, {:.4}]", min[0], min[1], min[2]);
            println!("  Max: [{:.4}, {:.4}, {:.4}]", max[0], max[1], max[2]);
            println!(
                "  Size: {:.4} x {:.4} x {:.4}",
                max[0] - min[0],
                max[1] - min[1],
                max[2] - min[2]
            );
        }
        None => println!("  (empty)"),
    }

    Ok(())
}
