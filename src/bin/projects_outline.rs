use anyhow::Context;
use campaign_etl::tools::outline::{generate, OutlineOptions};
use campaign_etl::utils::logger;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "projects-outline")]
#[command(about = "Write a Markdown outline with a mermaid dependency map of mod projects")]
struct Args {
    /// Repository root; mod paths in the outline are relative to it
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Mods directory (defaults to <root>/Mods)
    #[arg(long)]
    mods_dir: Option<PathBuf>,

    /// Output file (defaults to <root>/docs/Projects_Outline.md)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let mut opts = OutlineOptions::for_root(&args.root);
    if let Some(mods_dir) = args.mods_dir {
        opts.mods_dir = mods_dir;
    }
    if let Some(output) = args.output {
        opts.output = output;
    }

    generate(&opts).with_context(|| format!("generating outline from {}", opts.mods_dir.display()))?;
    println!("Wrote {}", opts.output.display());
    Ok(())
}
