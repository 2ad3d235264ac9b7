use campaign_etl::config::toml_config::TomlConfig;
use campaign_etl::core::history::{latest_snapshot, load_history};
use campaign_etl::core::pipeline::SaveSource;
use campaign_etl::utils::validation::Validate;
use campaign_etl::{CampaignPipeline, EtlEngine, EtlError, LoadOutcome, LocalStorage};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn save_json(year: i64, month: i64, day: i64, gdp: f64) -> serde_json::Value {
    serde_json::json!({
        "gamestates": {
            "PavonisInteractive.TerraInvicta.TITimeState": [
                {"Key": {"value": 1}, "Value": {"currentDateTime": {"year": year, "month": month, "day": day}}}
            ],
            "PavonisInteractive.TerraInvicta.TIRegionState": [
                {"Key": {"value": 10}, "Value": {"nation": {"value": 1}, "populationInMillions": 5.0, "missionControl": 1}},
                {"Key": {"value": 11}, "Value": {"nation": {"value": 1}, "populationInMillions": 5.5, "missionControl": 2}},
                {"Key": {"value": 12}, "Value": {"nation": {"value": 2}, "populationInMillions": 9.2}}
            ],
            "PavonisInteractive.TerraInvicta.TINationState": [
                {"Key": {"value": 1}, "Value": {"ID": {"value": 1}, "displayName": "Sweden", "GDP": gdp}},
                {"Key": {"value": 2}, "Value": {"ID": {"value": 2}, "displayName": "Belarus", "GDP": 6.0e10}}
            ]
        }
    })
}

fn write_gz(path: &Path, value: &serde_json::Value, age_secs: u64) -> anyhow::Result<()> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(value.to_string().as_bytes())?;
    std::fs::write(path, encoder.finish()?)?;

    let file = File::options().write(true).open(path)?;
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))?;
    Ok(())
}

fn config_for(root: &Path, nations: &str) -> anyhow::Result<TomlConfig> {
    let content = format!(
        r#"
[save]
directory = '{saves}'

[output]
csv_path = '{csv}'

[filter]
my_nations = [{nations}]
"#,
        saves = root.join("Saves").display(),
        csv = root.join("campaign_history.csv").display(),
        nations = nations
    );
    Ok(TomlConfig::from_toml_str(&content)?)
}

async fn run(config: &TomlConfig, source: SaveSource) -> campaign_etl::Result<LoadOutcome> {
    let pipeline = CampaignPipeline::with_source(LocalStorage::new(".".to_string()), config.clone(), source);
    EtlEngine::new(pipeline).run().await
}

#[tokio::test]
async fn test_latest_save_appended_to_history() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    let saves = root.path().join("Saves");
    std::fs::create_dir_all(&saves)?;
    write_gz(&saves.join("Autosave1_2025-3-1.gz"), &save_json(2025, 3, 1, 5.0e11), 600)?;
    write_gz(&saves.join("Autosave2_2025-3-14.gz"), &save_json(2025, 3, 14, 5.8e11), 10)?;
    std::fs::write(saves.join("notes.txt"), "ignore me")?;

    let config = config_for(root.path(), r#""Sweden""#)?;
    config.validate()?;

    let outcome = run(&config, SaveSource::Latest).await?;
    assert_eq!(outcome.rows_written(), 1);

    // 較舊的存檔以指定檔案方式處理
    let outcome = run(&config, SaveSource::File(saves.join("Autosave1_2025-3-1.gz"))).await?;
    assert_eq!(outcome.rows_written(), 1);

    let csv = std::fs::read_to_string(root.path().join("campaign_history.csv"))?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("date,nation_name,gdp_capita"));
    assert!(lines[1].starts_with("2025-03-14,Sweden,55238.0,10.5,"));
    assert!(lines[2].starts_with("2025-03-01,Sweden,"));

    let history = load_history(&root.path().join("campaign_history.csv"))?;
    let snapshot = latest_snapshot(&history);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].value("gdp_capita"), Some(55238.0));
    assert_eq!(snapshot[0].value("mc_cap"), Some(4.0));
    Ok(())
}

#[tokio::test]
async fn test_untracked_nations_write_nothing() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    let saves = root.path().join("Saves");
    std::fs::create_dir_all(&saves)?;
    write_gz(&saves.join("Quicksave1_2025-3-14.gz"), &save_json(2025, 3, 14, 5.8e11), 0)?;

    let config = config_for(root.path(), r#""Narnia""#)?;
    let outcome = run(&config, SaveSource::Latest).await?;

    assert!(matches!(outcome, LoadOutcome::Skipped { .. }));
    assert!(!root.path().join("campaign_history.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_plain_json_save_with_bom() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    let path = root.path().join("debug.json");
    std::fs::write(&path, format!("\u{feff}{}", save_json(2026, 1, 2, 5.8e11)))?;

    let config = config_for(root.path(), r#""Sweden", "Belarus""#)?;
    let outcome = run(&config, SaveSource::File(path)).await?;

    assert_eq!(outcome.rows_written(), 2);
    Ok(())
}

#[tokio::test]
async fn test_missing_or_empty_save_dir() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    let config = config_for(root.path(), r#""Sweden""#)?;

    assert!(matches!(
        run(&config, SaveSource::Latest).await,
        Err(EtlError::SaveDirectoryMissing { .. })
    ));

    std::fs::create_dir_all(root.path().join("Saves"))?;
    assert!(matches!(
        run(&config, SaveSource::Latest).await,
        Err(EtlError::NoSaveFound { .. })
    ));
    Ok(())
}

#[test]
fn test_config_without_nations_is_rejected() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    let config = config_for(root.path(), "")?;
    assert!(config.validate().is_err());
    Ok(())
}
