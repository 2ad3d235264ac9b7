use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Library 與各執行檔的 target（bin 的事件 target 是 bin crate 名稱）
const CRATE_TARGETS: &[&str] = &[
    "campaign_etl",
    "cleanup_saves",
    "generate_weapon",
    "validate_mods",
    "projects_outline",
];

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        let directives: Vec<String> = std::iter::once("info".to_string())
            .chain(CRATE_TARGETS.iter().map(|t| format!("{}={}", t, level)))
            .collect();
        EnvFilter::new(directives.join(","))
    })
}

pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

fn file_subscriber(file: File, verbose: bool) -> impl Subscriber + Send + Sync {
    tracing_subscriber::registry().with(default_filter(verbose)).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file)),
    )
}

/// 將日誌寫入 `<dir>/<prefix>_<時間戳>.log`，回傳檔案路徑
pub fn init_file_logger(dir: &Path, prefix: &str, verbose: bool) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_path = dir.join(format!("{}_{}.log", prefix, stamp));
    let file = File::create(&log_path)?;

    file_subscriber(file, verbose).init();

    Ok(log_path)
}
