pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "campaign-etl")]
#[command(about = "Extract per-nation history from Terra Invicta saves into a CSV")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "campaign.toml")]
    pub config: String,

    /// Directory holding the game's saves
    #[arg(long)]
    pub save_dir: Option<String>,

    /// Directory to watch (defaults to the save directory)
    #[arg(long)]
    pub watch_dir: Option<String>,

    /// Campaign history CSV to append to
    #[arg(short, long)]
    pub output: Option<String>,

    /// Nations to track (repeat or comma-separate)
    #[arg(long = "nation", value_delimiter = ',')]
    pub nations: Vec<String>,

    /// Process this save instead of the newest one
    #[arg(long)]
    pub file: Option<String>,

    #[arg(long)]
    pub debounce: Option<f64>,

    /// Run the initial scan and exit without watching
    #[arg(long)]
    pub once: bool,

    /// Print the predicted Mission Control cap per nation and exit
    #[arg(long)]
    pub calibrate: bool,

    /// Print the latest row per nation from the history CSV and exit
    #[arg(long)]
    pub summary: bool,

    /// Show the resolved configuration without processing anything
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 命令列參數覆蓋設定檔
    pub fn apply_to(&self, config: &mut TomlConfig) {
        if let Some(dir) = &self.save_dir {
            config.save.directory = dir.clone();
        }
        if let Some(dir) = &self.watch_dir {
            config.watch.directory = Some(dir.clone());
        }
        if let Some(output) = &self.output {
            config.output.csv_path = output.clone();
        }
        if !self.nations.is_empty() {
            config.filter.my_nations = self
                .nations
                .iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        }
        if let Some(debounce) = self.debounce {
            config.watch.debounce_seconds = debounce;
        }
        if self.once {
            config.watch.enabled = false;
        }
    }
}
