use campaign_etl::tools::archive::{process_once, summary_line, CleanupOptions};
use campaign_etl::utils::{logger, validation::Validate};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cleanup-saves")]
#[command(about = "Cleanup Terra Invicta savefiles: keep the newest per type, archive the rest")]
struct Args {
    /// Path to Saves directory
    #[arg(long, default_value = "terra-invicta-save/Saves")]
    save_dir: PathBuf,

    /// Where to move archived saves
    #[arg(long, default_value = "archive/savegames")]
    archive_dir: PathBuf,

    /// How many latest saves to keep in place per type
    #[arg(long, default_value_t = 5)]
    keep: usize,

    /// Max saves to keep in archive per type
    #[arg(long, default_value_t = 50)]
    max_archive: usize,

    /// Don't move or delete, just print actions
    #[arg(long)]
    dry_run: bool,

    /// Loop interval in seconds when running continuously
    #[arg(long, default_value_t = 300)]
    interval: u64,

    /// Run once and exit
    #[arg(long)]
    once: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Directory for the timestamped log file
    #[arg(long, default_value = "scripts/logs")]
    log_dir: PathBuf,
}

fn run_cycle(opts: &CleanupOptions) {
    match process_once(opts) {
        Ok(summary) => {
            if let Some(line) = summary_line(&summary, opts.dry_run, chrono::Local::now().naive_local()) {
                println!("{}", line);
            }
        }
        Err(e) => {
            tracing::error!("❌ Cleanup failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 日誌寫入檔案，終端只印摘要
    let log_file = logger::init_file_logger(&args.log_dir, "cleanup", args.verbose)?;
    tracing::info!("🚀 Starting cleanup-saves (log: {})", log_file.display());

    let opts = CleanupOptions {
        save_dir: args.save_dir,
        archive_dir: args.archive_dir,
        keep: args.keep,
        max_archive: args.max_archive,
        dry_run: args.dry_run,
    };

    if let Err(e) = opts.validate() {
        tracing::error!("❌ Invalid options: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    if opts.dry_run {
        println!("DRY RUN: no files will be moved or deleted");
    }

    if args.once {
        run_cycle(&opts);
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => run_cycle(&opts),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, exiting");
                println!("Interrupted, exiting");
                break;
            }
        }
    }

    Ok(())
}
