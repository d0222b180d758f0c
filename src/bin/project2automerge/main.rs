//! CLI tool to convert a project JSON document to the Automerge replica format.
//!
//! Usage:
//!   project2automerge --input project.json [--output project.automerge] [--validate] [--stats]

mod stats;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use creativeblock::{Project, ProjectManager};
use stats::ProjectStats;

#[derive(Parser, Debug)]
#[command(
    name = "project2automerge",
    about = "Convert a project JSON document to Automerge binary format",
    version
)]
struct Args {
    /// Input JSON file path (one project document)
    #[arg(short, long, env = "PROJECT2AUTOMERGE_INPUT")]
    input: PathBuf,

    /// Output file path (defaults to input path with .automerge extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Validate output by hydrating back and comparing
    #[arg(long, default_value = "false")]
    validate: bool,

    /// Print statistics about the conversion
    #[arg(long, default_value = "false")]
    stats: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let input_path = &args.input;
    if !input_path.exists() {
        anyhow::bail!("Input file does not exist: {}", input_path.display());
    }

    let json_content =
        std::fs::read_to_string(input_path).context("Failed to read input file")?;
    let document: serde_json::Value =
        serde_json::from_str(&json_content).context("Failed to parse JSON")?;

    // Legacy shapes are accepted here; unknown fields are logged and dropped.
    let project = Project::from_document(&document).context("Failed to decode project")?;
    let expected = ProjectStats::of(&project);
    tracing::info!(
        title = project.title(),
        ideas = expected.ideas,
        modules = expected.modules,
        "decoded project"
    );

    let mut manager =
        ProjectManager::new(project.clone()).context("Failed to build Automerge document")?;
    let binary = manager.save();

    let output_path = args.output.unwrap_or_else(|| {
        let mut path = input_path.clone();
        path.set_extension("automerge");
        path
    });
    std::fs::write(&output_path, &binary).context("Failed to write output file")?;

    if args.validate {
        let mut loaded =
            ProjectManager::from_bytes(&binary).context("Failed to load binary for validation")?;
        let hydrated = loaded
            .get_state()
            .context("Failed to hydrate for validation")?;

        if let Some(mismatch) = ProjectStats::of(&hydrated).mismatch(&expected) {
            anyhow::bail!("Validation failed: {}", mismatch);
        }
        if hydrated != project {
            anyhow::bail!("Validation failed: hydrated project differs from input");
        }
        println!("✓ Validation passed!");
    }

    if args.stats {
        println!();
        println!("Conversion statistics:");
        println!("  Title:    {}", project.title());
        println!("  Category: {}", project.category());
        println!();
        println!("  Input JSON:    {:>10} bytes", json_content.len());
        println!("  Output binary: {:>10} bytes", binary.len());
        println!(
            "  Compression:   {:>10.2}x",
            json_content.len() as f64 / binary.len() as f64
        );
        println!();
        println!("  Ideas:   {}", expected.ideas);
        println!("  Modules: {}", expected.modules);
        for (kind, count) in &expected.by_kind {
            println!("    {:<10} {}", kind, count);
        }
    }

    println!();
    println!(
        "Successfully converted {} → {}",
        input_path.display(),
        output_path.display()
    );

    Ok(())
}
