use crate::core::ConfigProvider;
use crate::domain::model::MetricsConfig;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub save: SaveConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveConfig {
    #[serde(default = "SaveConfig::default_directory")]
    pub directory: String,
}

impl SaveConfig {
    fn default_directory() -> String {
        "terra-invicta-save/Saves".to_string()
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "WatchConfig::default_enabled")]
    pub enabled: bool,
    /// 預設與 `save.directory` 相同
    pub directory: Option<String>,
    #[serde(default = "WatchConfig::default_debounce")]
    pub debounce_seconds: f64,
    #[serde(default = "WatchConfig::default_extensions")]
    pub extensions: Vec<String>,
}

impl WatchConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_debounce() -> f64 {
        2.0
    }

    fn default_extensions() -> Vec<String> {
        vec!["gz".to_string(), "json".to_string()]
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            directory: None,
            debounce_seconds: Self::default_debounce(),
            extensions: Self::default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_csv_path")]
    pub csv_path: String,
}

impl OutputConfig {
    fn default_csv_path() -> String {
        "campaign_history.csv".to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: Self::default_csv_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub my_nations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案不存在時使用預設值
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().is_file() {
            tracing::info!("📁 Loading configuration from: {}", path.as_ref().display());
            Self::from_file(path)
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TI_SAVE_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn watch_directory(&self) -> &str {
        self.watch
            .directory
            .as_deref()
            .unwrap_or(&self.save.directory)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("save.directory", &self.save.directory)?;
        validation::validate_path("watch.directory", self.watch_directory())?;
        validation::validate_path("output.csv_path", &self.output.csv_path)?;
        validation::validate_range("watch.debounce_seconds", self.watch.debounce_seconds, 0.1, 300.0)?;
        validation::validate_extensions("watch.extensions", &self.watch.extensions)?;

        if !(self.metrics.mc_gdp_divisor > 0.0) {
            return Err(EtlError::InvalidConfigValueError {
                field: "metrics.mc_gdp_divisor".to_string(),
                value: self.metrics.mc_gdp_divisor.to_string(),
                reason: "Divisor must be greater than zero".to_string(),
            });
        }

        // 沒有追蹤國家就沒有東西可寫
        validation::validate_non_empty_list("filter.my_nations", &self.filter.my_nations)?;

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn save_directory(&self) -> &str {
        &self.save.directory
    }

    fn output_path(&self) -> &str {
        &self.output.csv_path
    }

    fn tracked_nations(&self) -> &[String] {
        &self.filter.my_nations
    }

    fn metrics(&self) -> MetricsConfig {
        self.metrics
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[save]
directory = "/games/ti/Saves"

[watch]
debounce_seconds = 3.5
extensions = ["gz"]

[output]
csv_path = "history.csv"

[filter]
my_nations = ["Belarus", "Sweden"]

[metrics]
mc_gdp_divisor = 300.0

[monitoring]
enabled = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.save_directory(), "/games/ti/Saves");
        assert_eq!(config.watch_directory(), "/games/ti/Saves");
        assert_eq!(config.watch.debounce_seconds, 3.5);
        assert_eq!(config.output_path(), "history.csv");
        assert_eq!(config.tracked_nations(), ["Belarus", "Sweden"]);
        assert_eq!(config.metrics.mc_gdp_divisor, 300.0);
        assert_eq!(config.metrics.mc_base_per_region, 1.0);
        assert!(config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_from_empty_config() {
        let config = TomlConfig::from_toml_str("").unwrap();

        assert_eq!(config.save.directory, "terra-invicta-save/Saves");
        assert_eq!(config.output.csv_path, "campaign_history.csv");
        assert_eq!(config.watch.extensions, vec!["gz", "json"]);
        assert!(config.watch.enabled);
        assert!(!config.monitoring_enabled());
    }

    #[test]
    fn test_missing_nations_fails_validation() {
        let config = TomlConfig::from_toml_str("[filter]\nmy_nations = []\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(EtlError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CAMPAIGN_ETL_TEST_SAVES", "/tmp/ti-saves");

        let toml_content = r#"
[save]
directory = "${CAMPAIGN_ETL_TEST_SAVES}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.save.directory, "/tmp/ti-saves");

        std::env::remove_var("CAMPAIGN_ETL_TEST_SAVES");
    }

    #[test]
    fn test_invalid_debounce_rejected() {
        let toml_content = r#"
[watch]
debounce_seconds = 0.0

[filter]
my_nations = ["Sweden"]
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[filter]\nmy_nations = [\"Denmark\"]\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.filter.my_nations, vec!["Denmark"]);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = TomlConfig::from_file_or_default("/definitely/not/here.toml").unwrap();
        assert!(config.filter.my_nations.is_empty());
    }
}
