use crate::domain::model::{MetricsConfig, NationRow};
use crate::utils::error::{EtlError, Result};
use crate::utils::format::round_to;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;

const ROOT_KEY: &str = "gamestates";
const CLASS_PREFIX: &str = "PavonisInteractive.TerraInvicta";
const ALIEN_NATION: &str = "Alien Administration";

pub type NationId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeoStats {
    pub region_count: u32,
    pub pop_millions: f64,
    pub mc_built: f64,
}

/// 存檔可能包一層 `gamestates`，也可能直接就是狀態表
pub fn game_states(save: &Value) -> &Value {
    save.get(ROOT_KEY).unwrap_or(save)
}

fn collection<'a>(states: &'a Value, class: &str) -> &'a [Value] {
    states
        .get(format!("{}.{}", CLASS_PREFIX, class))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

// Entries are either `{"Key": .., "Value": {..}}` or the object itself.
fn entry_value(entry: &Value) -> &Value {
    entry.get("Value").unwrap_or(entry)
}

fn number(obj: &Value, key: &str) -> f64 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn reference_id(obj: &Value, key: &str) -> Option<NationId> {
    obj.get(key)?.get("value")?.as_i64()
}

pub fn aggregate_regions(states: &Value) -> HashMap<NationId, GeoStats> {
    let mut stats: HashMap<NationId, GeoStats> = HashMap::new();

    for entry in collection(states, "TIRegionState") {
        let region = entry_value(entry);
        let Some(nid) = reference_id(region, "nation") else {
            continue;
        };

        let geo = stats.entry(nid).or_default();
        geo.region_count += 1;
        geo.pop_millions += number(region, "populationInMillions");
        geo.mc_built += number(region, "missionControl");
    }

    stats
}

/// 遊戲內日期；沒有時間狀態時使用 `today`
pub fn campaign_date(states: &Value, today: NaiveDate) -> Result<NaiveDate> {
    let Some(first) = collection(states, "TITimeState").first() else {
        return Ok(today);
    };

    let date_info = first
        .get("Value")
        .and_then(|v| v.get("currentDateTime"))
        .cloned()
        .unwrap_or(Value::Null);
    let part = |key: &str, default: i64| date_info.get(key).and_then(Value::as_i64).unwrap_or(default);

    let (year, month, day) = (part("year", 2022), part("month", 1), part("day", 1));
    i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
        .ok_or_else(|| EtlError::InvalidSave {
            message: format!("invalid campaign date {}-{}-{}", year, month, day),
        })
}

struct NationView<'a> {
    name: &'a str,
    raw: &'a Value,
    geo: GeoStats,
}

// Nations with no regions are dormant (Wales, Scotland, ...).
fn living_nations<'a>(
    states: &'a Value,
    geo: &'a HashMap<NationId, GeoStats>,
) -> impl Iterator<Item = NationView<'a>> + 'a {
    collection(states, "TINationState").iter().filter_map(move |entry| {
        let nation = entry_value(entry);
        let name = nation
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        let stats = reference_id(nation, "ID")
            .and_then(|nid| geo.get(&nid).copied())
            .unwrap_or_default();

        if stats.region_count == 0 || name == ALIEN_NATION {
            return None;
        }
        Some(NationView {
            name,
            raw: nation,
            geo: stats,
        })
    })
}

// Newer saves use "GDP", older ones "grossDomesticProduct".
fn raw_gdp(nation: &Value) -> f64 {
    nation
        .get("GDP")
        .or_else(|| nation.get("grossDomesticProduct"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn nation_row(view: &NationView<'_>, date: NaiveDate, cfg: &MetricsConfig) -> NationRow {
    let nation = view.raw;
    let geo = view.geo;

    let gdp = raw_gdp(nation);
    let gdp_billions = gdp / 1_000_000_000.0;

    let gdp_capita = if geo.pop_millions > 0.0 {
        gdp / (geo.pop_millions * 1_000_000.0)
    } else {
        0.0
    };

    // 遊戲會對 GDP 部分取整，所以整體截斷成整數
    let mc_cap = (f64::from(geo.region_count) * cfg.mc_base_per_region
        + gdp_billions / cfg.mc_gdp_divisor)
        .trunc() as i64;
    let mc_utilization = if mc_cap > 0 {
        geo.mc_built / mc_cap as f64 * 100.0
    } else {
        100.0
    };

    // 1.1 * sqrt(GDP in billions) fits the observed control point upkeep
    let cp_maintenance_cost = 1.1 * gdp_billions.max(0.0).sqrt();

    let monthly_research = nation
        .get("historyResearch")
        .and_then(Value::as_array)
        .and_then(|history| history.first())
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let base_ip = number(nation, "economyScore");

    let per_cp = |value: f64| {
        if cp_maintenance_cost > 0.0 {
            value / cp_maintenance_cost
        } else {
            0.0
        }
    };

    let control_points = nation
        .get("numControlPoints")
        .and_then(Value::as_f64)
        .unwrap_or(1.0)
        .max(1.0);

    NationRow {
        date,
        nation_name: view.name.to_string(),
        gdp_capita: round_to(gdp_capita, 0),
        population_millions: round_to(geo.pop_millions, 3),
        inequality: number(nation, "inequality"),
        democracy: number(nation, "democracy"),
        unrest: number(nation, "unrest"),
        cohesion: number(nation, "cohesion"),
        monthly_research: round_to(monthly_research, 1),
        monthly_ip: round_to(base_ip, 2),
        cp_maintenance_cost: round_to(cp_maintenance_cost, 2),
        ui_cost_per_point: round_to(cp_maintenance_cost / control_points, 2),
        efficiency_research: round_to(per_cp(monthly_research), 2),
        efficiency_ip: round_to(per_cp(base_ip), 2),
        mc_built: round_to(geo.mc_built, 1),
        mc_cap,
        mc_utilization: round_to(mc_utilization, 1),
    }
}

/// 計算每個國家的指標列（未依追蹤清單過濾）
pub fn extract_nation_data(
    save: &Value,
    cfg: &MetricsConfig,
    today: NaiveDate,
) -> Result<Vec<NationRow>> {
    let states = game_states(save);
    let geo = aggregate_regions(states);
    let date = campaign_date(states, today)?;

    Ok(living_nations(states, &geo)
        .map(|view| nation_row(&view, date, cfg))
        .collect())
}

/// Predicted MC cap per living nation, sorted by name.
pub fn mc_calibration(save: &Value, cfg: &MetricsConfig) -> Vec<(String, i64)> {
    let states = game_states(save);
    let geo = aggregate_regions(states);

    let mut rows: Vec<(String, i64)> = living_nations(states, &geo)
        .map(|view| {
            let mc_base = f64::from(view.geo.region_count) * cfg.mc_base_per_region;
            let mc_gdp = (raw_gdp(view.raw) / 1_000_000_000.0 / cfg.mc_gdp_divisor).trunc();
            (view.name.to_string(), (mc_base + mc_gdp).trunc() as i64)
        })
        .collect();

    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_save;
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    #[test]
    fn test_aggregate_regions_skips_unowned() {
        let save = sample_save();
        let geo = aggregate_regions(game_states(&save));

        assert_eq!(geo.len(), 3);
        let sweden = geo[&1];
        assert_eq!(sweden.region_count, 2);
        assert_eq!(sweden.pop_millions, 10.5);
        assert_eq!(sweden.mc_built, 3.0);
    }

    #[test]
    fn test_extract_filters_aliens_and_dormant_nations() {
        let rows = extract_nation_data(&sample_save(), &MetricsConfig::default(), today()).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.nation_name.as_str()).collect();
        assert_eq!(names, vec!["Sweden", "Belarus"]);
    }

    #[test]
    fn test_sweden_metrics_exact() {
        let rows = extract_nation_data(&sample_save(), &MetricsConfig::default(), today()).unwrap();
        let sweden = &rows[0];

        assert_eq!(sweden.date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(sweden.gdp_capita, 55238.0);
        assert_eq!(sweden.population_millions, 10.5);
        assert_eq!(sweden.mc_built, 3.0);
        assert_eq!(sweden.mc_cap, 4);
        assert_eq!(sweden.mc_utilization, 75.0);
        assert_eq!(sweden.cp_maintenance_cost, 26.49);
        assert_eq!(sweden.monthly_research, 12.3);
        assert_eq!(sweden.efficiency_research, 0.47);
        assert_eq!(sweden.monthly_ip, 3.46);
        assert_eq!(sweden.efficiency_ip, 0.13);
        assert_eq!(sweden.ui_cost_per_point, 6.62);
        assert_eq!(sweden.inequality, 2.5);
        assert_eq!(sweden.democracy, 8.5);
        assert_eq!(sweden.unrest, 0.5);
        assert_eq!(sweden.cohesion, 5.0);
    }

    #[test]
    fn test_belarus_uses_legacy_gdp_and_defaults() {
        let rows = extract_nation_data(&sample_save(), &MetricsConfig::default(), today()).unwrap();
        let belarus = &rows[1];

        assert_eq!(belarus.gdp_capita, 6522.0);
        assert_eq!(belarus.mc_cap, 1);
        assert_eq!(belarus.mc_utilization, 0.0);
        assert_eq!(belarus.cp_maintenance_cost, 8.52);
        assert_eq!(belarus.ui_cost_per_point, 8.52);
        assert_eq!(belarus.monthly_research, 0.0);
        assert_eq!(belarus.efficiency_research, 0.0);
        assert_eq!(belarus.monthly_ip, 0.0);
    }

    #[test]
    fn test_zero_gdp_nation_has_full_utilization_when_cap_is_zero() {
        let save = json!({
            "PavonisInteractive.TerraInvicta.TIRegionState": [
                {"nation": {"value": 7}, "populationInMillions": 0.0}
            ],
            "PavonisInteractive.TerraInvicta.TINationState": [
                {"ID": {"value": 7}, "displayName": "Atlantis"}
            ]
        });
        let cfg = MetricsConfig {
            mc_base_per_region: 0.0,
            mc_gdp_divisor: 290.0,
        };
        let rows = extract_nation_data(&save, &cfg, today()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, today());
        assert_eq!(rows[0].mc_cap, 0);
        assert_eq!(rows[0].mc_utilization, 100.0);
        assert_eq!(rows[0].gdp_capita, 0.0);
        assert_eq!(rows[0].cp_maintenance_cost, 0.0);
    }

    #[test]
    fn test_exact_halves_round_to_even() {
        let regions: Vec<Value> = (0..16)
            .map(|i| {
                let mc = u32::from(i == 0);
                json!({"nation": {"value": 9}, "populationInMillions": 1.0, "missionControl": mc})
            })
            .collect();
        let save = json!({
            "PavonisInteractive.TerraInvicta.TIRegionState": regions,
            "PavonisInteractive.TerraInvicta.TINationState": [
                {"ID": {"value": 9}, "displayName": "Estonia", "GDP": 4.0e7, "economyScore": 0.125}
            ]
        });
        let rows = extract_nation_data(&save, &MetricsConfig::default(), today()).unwrap();
        let row = &rows[0];

        assert_eq!(row.mc_cap, 16);
        // 1 / 16 = 6.25%
        assert_eq!(row.mc_utilization, 6.2);
        // 4e7 / 16e6 = 2.5
        assert_eq!(row.gdp_capita, 2.0);
        assert_eq!(row.monthly_ip, 0.12);
    }

    #[test]
    fn test_campaign_date_defaults_and_invalid() {
        let partial = json!({
            "PavonisInteractive.TerraInvicta.TITimeState": [
                {"Value": {"currentDateTime": {"year": 2031}}}
            ]
        });
        assert_eq!(
            campaign_date(&partial, today()).unwrap(),
            NaiveDate::from_ymd_opt(2031, 1, 1).unwrap()
        );

        let invalid = json!({
            "PavonisInteractive.TerraInvicta.TITimeState": [
                {"Value": {"currentDateTime": {"year": 2031, "month": 2, "day": 30}}}
            ]
        });
        assert!(matches!(
            campaign_date(&invalid, today()),
            Err(EtlError::InvalidSave { .. })
        ));
    }

    #[test]
    fn test_mc_calibration_sorted_by_name() {
        let rows = mc_calibration(&sample_save(), &MetricsConfig::default());
        assert_eq!(
            rows,
            vec![("Belarus".to_string(), 1), ("Sweden".to_string(), 4)]
        );
    }
}
