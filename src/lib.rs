pub mod config;
pub mod core;
pub mod domain;
pub mod tools;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{cli::LocalStorage, toml_config::TomlConfig};
pub use core::{etl::EtlEngine, pipeline::CampaignPipeline};
pub use domain::model::{LoadOutcome, NationRow};
pub use utils::error::{EtlError, Result};
