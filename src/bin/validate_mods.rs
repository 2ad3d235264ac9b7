use campaign_etl::tools::mods::{
    default_game_templates, find_overrides, render_concise, render_overrides, render_report_table, validate,
    GameTemplates, ModsOptions, OverrideOutput,
};
use campaign_etl::utils::logger;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "validate-mods")]
#[command(about = "Validate Mods TI JSON files (read-only)")]
struct Args {
    /// Path to Mods directory
    #[arg(long, default_value = "Mods")]
    mods_dir: PathBuf,

    /// Path to TIProjectTemplate.json (defaults to the one in the Mods directory)
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Built-in game TIProjectTemplate.json, or the game's templates directory
    #[arg(long)]
    game_templates: Option<PathBuf>,

    /// Show table-like summary
    #[arg(long)]
    table: bool,

    /// Show all files instead of only those with issues
    #[arg(long)]
    all: bool,

    /// Comma-separated filenames to omit from validation
    #[arg(long, value_delimiter = ',')]
    omit: Vec<String>,

    /// List dataNames that override game templates
    #[arg(long)]
    list_overrides: bool,

    /// Compact diff for overridden dataNames
    #[arg(long)]
    dump_overrides: bool,

    /// Full local and game JSON for overridden dataNames
    #[arg(long)]
    dump_overrides_full: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let opts = ModsOptions {
        mods_dir: args.mods_dir,
        templates: args.templates,
        game_templates: args.game_templates.or_else(default_game_templates),
        omit: args.omit,
    };
    let game = GameTemplates::resolve(opts.game_templates.as_deref());
    tracing::debug!(
        "Game templates: {:?} ({} projects)",
        game.dir,
        game.project_names.len()
    );

    // 設定錯誤（找不到目錄或模板）以 2 結束
    let report = match validate(&opts, &game) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("❌ {}", e);
            eprintln!("{}", e.user_friendly_message());
            std::process::exit(2);
        }
    };

    let shown = report.displayed(args.all);
    if args.table {
        print!("{}", render_report_table(&shown));
    } else {
        print!("{}", render_concise(&shown));
    }
    println!("{}", report.totals_line());

    let mode = OverrideOutput {
        list: args.list_overrides,
        dump: args.dump_overrides,
        full: args.dump_overrides_full,
    };
    if mode.any() {
        match find_overrides(&opts, &game).and_then(|sets| render_overrides(&sets, mode)) {
            Ok(text) => print!("{}", text),
            Err(e) => tracing::warn!("Could not compare overrides: {}", e),
        }
    }

    std::process::exit(report.exit_code());
}
