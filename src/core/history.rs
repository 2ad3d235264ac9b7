use crate::domain::model::CSV_COLUMNS;
use crate::utils::error::Result;
use crate::utils::format::{fmt2, render_table};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;

/// A history row as read back from disk. Numeric cells that fail to
/// parse become `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub date: Option<NaiveDate>,
    pub nation_name: String,
    pub values: HashMap<&'static str, Option<f64>>,
}

impl HistoryRecord {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }
}

/// 讀取歷史 CSV；檔案不存在時回傳空集合。
/// 舊版本曾重複寫入表頭，讀取時略過這些列。
pub fn load_history(path: &Path) -> Result<Vec<HistoryRecord>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read(path)?;
    let body = raw.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let cell = |idx: usize| row.get(idx).unwrap_or("").trim();

        if cell(1) == "nation_name" {
            continue;
        }

        let values = CSV_COLUMNS
            .iter()
            .enumerate()
            .skip(2)
            .map(|(idx, column)| (*column, cell(idx).parse::<f64>().ok()))
            .collect();

        records.push(HistoryRecord {
            date: NaiveDate::parse_from_str(cell(0), "%Y-%m-%d").ok(),
            nation_name: cell(1).to_string(),
            values,
        });
    }

    Ok(records)
}

/// Latest-dated row per nation, sorted by nation name.
pub fn latest_snapshot(records: &[HistoryRecord]) -> Vec<HistoryRecord> {
    let mut latest: HashMap<&str, &HistoryRecord> = HashMap::new();
    for record in records {
        let newer = match latest.get(record.nation_name.as_str()) {
            // 同一天的後寫入者優先
            Some(current) => record.date >= current.date,
            None => true,
        };
        if newer {
            latest.insert(record.nation_name.as_str(), record);
        }
    }

    let mut snapshot: Vec<HistoryRecord> = latest.into_values().cloned().collect();
    snapshot.sort_by(|a, b| a.nation_name.cmp(&b.nation_name));
    snapshot
}

/// Columns shown by `--summary`.
pub const SUMMARY_COLUMNS: [&str; 8] = [
    "gdp_capita",
    "population_millions",
    "monthly_research",
    "monthly_ip",
    "cp_maintenance_cost",
    "mc_built",
    "mc_cap",
    "mc_utilization",
];

pub fn summary_table(snapshot: &[HistoryRecord]) -> String {
    let header: Vec<String> = ["date", "nation_name"]
        .into_iter()
        .chain(SUMMARY_COLUMNS)
        .map(String::from)
        .collect();

    let rows: Vec<Vec<String>> = snapshot
        .iter()
        .map(|record| {
            let date = record.date.map(|d| d.to_string()).unwrap_or_default();
            [date, record.nation_name.clone()]
                .into_iter()
                .chain(SUMMARY_COLUMNS.iter().map(|c| fmt2(record.value(c))))
                .collect()
        })
        .collect();

    render_table(&header, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "date,nation_name,gdp_capita,population_millions,inequality,democracy,unrest,cohesion,monthly_research,monthly_ip,cp_maintenance_cost,ui_cost_per_point,efficiency_research,efficiency_ip,mc_built,mc_cap,mc_utilization";

    #[test]
    fn test_load_history_skips_repeated_headers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("campaign_history.csv");
        let content = format!(
            "{h}\n2025-03-01,Sweden,55000.0,10.5,2.5,8.5,0.5,5.0,12.3,3.46,26.49,6.62,0.47,0.13,3.0,4,75.0\n{h}\n2025-04-01,Sweden,56000.0,10.6,2.5,8.5,n/a,5.0,12.3,3.46,26.49,6.62,0.47,0.13,3.0,4,75.0\n",
            h = HEADER
        );
        std::fs::write(&path, content).unwrap();

        let records = load_history(&path).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value("gdp_capita"), Some(55000.0));
        assert_eq!(records[1].value("unrest"), None);
        assert_eq!(records[1].value("mc_cap"), Some(4.0));
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2025, 4, 1));
    }

    #[test]
    fn test_missing_history_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_history(&dir.path().join("none.csv")).unwrap().is_empty());
    }

    #[test]
    fn test_latest_snapshot_per_nation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("h.csv");
        let content = format!(
            "{}\n2025-04-01,Sweden,2,,,,,,,,,,,,,,\n2025-03-01,Sweden,1,,,,,,,,,,,,,,\n2025-03-01,Belarus,7,,,,,,,,,,,,,,\n",
            HEADER
        );
        std::fs::write(&path, content).unwrap();

        let snapshot = latest_snapshot(&load_history(&path).unwrap());

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].nation_name, "Belarus");
        assert_eq!(snapshot[1].nation_name, "Sweden");
        assert_eq!(snapshot[1].value("gdp_capita"), Some(2.0));

        let table = summary_table(&snapshot);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("date       | nation_name | gdp_capita"));
        assert!(lines[2].starts_with("2025-03-01 | Belarus     | 7.00"));
    }
}
