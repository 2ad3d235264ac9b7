use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CSV 欄位順序，與 `NationRow` 的欄位順序一致
pub const CSV_COLUMNS: [&str; 17] = [
    "date",
    "nation_name",
    "gdp_capita",
    "population_millions",
    "inequality",
    "democracy",
    "unrest",
    "cohesion",
    "monthly_research",
    "monthly_ip",
    "cp_maintenance_cost",
    "ui_cost_per_point",
    "efficiency_research",
    "efficiency_ip",
    "mc_built",
    "mc_cap",
    "mc_utilization",
];

/// One row of the campaign history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationRow {
    pub date: NaiveDate,
    pub nation_name: String,
    pub gdp_capita: f64,
    pub population_millions: f64,
    pub inequality: f64,
    pub democracy: f64,
    pub unrest: f64,
    pub cohesion: f64,
    pub monthly_research: f64,
    pub monthly_ip: f64,
    pub cp_maintenance_cost: f64,
    pub ui_cost_per_point: f64,
    pub efficiency_research: f64,
    pub efficiency_ip: f64,
    pub mc_built: f64,
    pub mc_cap: i64,
    pub mc_utilization: f64,
}

/// A loaded save, still as raw JSON.
#[derive(Debug, Clone)]
pub struct SaveDocument {
    pub path: PathBuf,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub source: PathBuf,
    /// 全部國家（未過濾）
    pub all_rows: Vec<NationRow>,
    /// 只保留追蹤中的國家
    pub tracked_rows: Vec<NationRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Appended { path: String, rows: usize },
    Skipped { reason: String },
}

impl LoadOutcome {
    pub fn rows_written(&self) -> usize {
        match self {
            LoadOutcome::Appended { rows, .. } => *rows,
            LoadOutcome::Skipped { .. } => 0,
        }
    }
}

/// Mission Control 公式的常數
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "MetricsConfig::default_base_per_region")]
    pub mc_base_per_region: f64,
    #[serde(default = "MetricsConfig::default_gdp_divisor")]
    pub mc_gdp_divisor: f64,
}

impl MetricsConfig {
    fn default_base_per_region() -> f64 {
        1.0
    }

    // 1 MC per ~290B GDP
    fn default_gdp_divisor() -> f64 {
        290.0
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            mc_base_per_region: Self::default_base_per_region(),
            mc_gdp_divisor: Self::default_gdp_divisor(),
        }
    }
}
