use campaign_etl::config::toml_config::TomlConfig;
use campaign_etl::core::history::{latest_snapshot, load_history, summary_table};
use campaign_etl::core::metrics::mc_calibration;
use campaign_etl::core::pipeline::SaveSource;
use campaign_etl::core::save::{fetch_latest_save, load_save};
use campaign_etl::core::watcher::SaveWatcher;
use campaign_etl::core::ConfigProvider;
use campaign_etl::utils::error::ErrorSeverity;
use campaign_etl::utils::{logger, validation::Validate};
use campaign_etl::{CampaignPipeline, CliConfig, EtlEngine, EtlError, LoadOutcome, LocalStorage};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    tracing::info!("🚀 Starting campaign-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 載入 TOML 配置（不存在時使用預設值）
    let mut config = match TomlConfig::from_file_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    cli.apply_to(&mut config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if cli.summary {
        let records = load_history(Path::new(config.output_path()))?;
        if records.is_empty() {
            println!("No history yet in {}", config.output_path());
        } else {
            println!("{}", summary_table(&latest_snapshot(&records)));
        }
        return Ok(());
    }

    let source = match &cli.file {
        Some(file) => SaveSource::File(PathBuf::from(file)),
        None => SaveSource::Latest,
    };

    if cli.calibrate {
        if let Err(e) = print_calibration(&config, &source) {
            exit_with(e);
        }
        return Ok(());
    }

    display_config_summary(&config, &cli);
    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        return Ok(());
    }

    let monitor_enabled = cli.monitor || config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 啟動時先處理一次
    tracing::info!("Running initial scan...");
    let initial = run_once(&config, source, monitor_enabled).await;

    if !config.watch.enabled {
        if let Err(e) = initial {
            exit_with(e);
        }
        return Ok(());
    }

    let watcher = SaveWatcher::new(
        config.watch_directory(),
        Duration::from_secs_f64(config.watch.debounce_seconds),
        config.watch.extensions.clone(),
    );
    println!("👀 Watching {} (Ctrl-C to stop)", config.watch_directory());

    let result = watcher
        .run(|path| {
            let config = config.clone();
            async move {
                // 錯誤只記錄，繼續監看下一個存檔
                let _ = run_once(&config, SaveSource::File(path), monitor_enabled).await;
            }
        })
        .await;

    if let Err(e) = result {
        exit_with(e);
    }
    Ok(())
}

async fn run_once(config: &TomlConfig, source: SaveSource, monitor_enabled: bool) -> Result<(), EtlError> {
    let storage = LocalStorage::new(".".to_string());
    let pipeline = CampaignPipeline::with_source(storage, config.clone(), source);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(LoadOutcome::Appended { path, rows }) => {
            tracing::info!("✅ Appended {} rows", rows);
            println!("✅ Appended {} rows to {}", rows, path);
            Ok(())
        }
        Ok(LoadOutcome::Skipped { reason }) => {
            println!("⚠️  Nothing written: {}", reason);
            Ok(())
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Extraction failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            Err(e)
        }
    }
}

fn print_calibration(config: &TomlConfig, source: &SaveSource) -> Result<(), EtlError> {
    let path = match source {
        SaveSource::File(path) => path.clone(),
        SaveSource::Latest => fetch_latest_save(Path::new(config.save_directory()))?,
    };
    tracing::info!("Calibrating Mission Control caps from {}", path.display());

    let save = load_save(&path)?;
    println!("Nation,Predicted_MC_Cap");
    for (nation, cap) in mc_calibration(&save, &config.metrics) {
        println!("{},{}", nation, cap);
    }
    Ok(())
}

fn display_config_summary(config: &TomlConfig, cli: &CliConfig) {
    tracing::info!("📋 Configuration Summary:");
    tracing::info!("  Config file: {}", cli.config);
    tracing::info!("  Save directory: {}", config.save.directory);
    tracing::info!("  Output CSV: {}", config.output.csv_path);
    tracing::info!("  Tracking: {}", config.filter.my_nations.join(", "));
    if config.watch.enabled {
        tracing::info!(
            "  Watching: {} ({:?}, debounce {}s)",
            config.watch_directory(),
            config.watch.extensions,
            config.watch.debounce_seconds
        );
    } else {
        tracing::info!("  Watching: disabled (single run)");
    }
    tracing::info!(
        "  MC constants: {} per region, GDP divisor {}",
        config.metrics.mc_base_per_region,
        config.metrics.mc_gdp_divisor
    );
}

fn exit_with(e: EtlError) -> ! {
    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 重試錯誤
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    };
    std::process::exit(exit_code);
}
