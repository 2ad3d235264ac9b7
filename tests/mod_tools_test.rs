use campaign_etl::tools::archive::{find_save_files, process_once, CleanupOptions};
use campaign_etl::tools::mods::{validate, GameTemplates, ModsOptions};
use campaign_etl::tools::outline::{generate, OutlineOptions};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// A small mod: two projects, a hab module that needs one of them and a
/// ship part that points at a project nobody defines.
fn mod_repo(root: &Path) -> anyhow::Result<()> {
    let mods = root.join("Mods");
    write(
        &mods.join("TIProjectTemplate.json"),
        &json!([
            {"dataName": "Project_Core", "friendlyName": "Core", "AI_techRole": "Economy",
             "AI_criticalTech": false, "techCategory": "Energy", "researchCost": 500},
            {"dataName": "Project_Next", "friendlyName": "Next", "AI_techRole": "Economy",
             "AI_criticalTech": true, "prereqs": ["Project_Core"], "techCategory": "Materials"}
        ])
        .to_string(),
    )?;
    write(
        &mods.join("Localization/en/TIProjectTemplate.en"),
        "TIProjectTemplate.displayName.Project_Core=Core\nTIProjectTemplate.summary.Project_Core=...\n\
         TIProjectTemplate.displayName.Project_Next=Next\nTIProjectTemplate.summary.Project_Next=...\n",
    )?;
    write(
        &mods.join("TIHabModuleTemplate.json"),
        &json!([{"dataName": "Reactor", "friendlyName": "Reactor", "requiredProjectName": "Project_Next"}]).to_string(),
    )?;
    write(
        &mods.join("Localization/en/TIHabModuleTemplate.en"),
        "TIHabModuleTemplate.displayName.Reactor=Reactor\n",
    )?;
    Ok(())
}

#[test]
fn test_validator_passes_then_flags_broken_reference() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    mod_repo(root.path())?;
    let opts = ModsOptions {
        mods_dir: root.path().join("Mods"),
        templates: None,
        game_templates: None,
        omit: Vec::new(),
    };

    let report = validate(&opts, &GameTemplates::default())?;
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.totals.matched_local, 1);
    assert!(report.totals_line().starts_with("TIProjectTemplate.json entries: 2; scanned_files: 1;"));

    write(
        &root.path().join("Mods/TIShipPartTemplate.json"),
        &json!([{"dataName": "Plate", "friendlyName": "Plate", "requiredProjectName": "Project_Lost"}]).to_string(),
    )?;
    let report = validate(&opts, &GameTemplates::default())?;
    assert_eq!(report.exit_code(), 1);
    let failing: Vec<&str> = report.displayed(false).iter().map(|r| r.name.as_str()).collect();
    assert_eq!(failing, vec!["TIShipPartTemplate.json"]);
    Ok(())
}

#[test]
fn test_outline_for_mod_repo() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    mod_repo(root.path())?;

    let opts = OutlineOptions::for_root(root.path());
    let index = generate(&opts)?;
    let md = std::fs::read_to_string(root.path().join("docs/Projects_Outline.md"))?;

    assert_eq!(index.len(), 2);
    assert!(md.contains("Project_Next --> Project_Core"));
    assert!(md.contains("Mod_TIHabModuleTemplate --> Project_Next"));
    assert!(md.contains("LEG_Energy[\"Energy\"]"));
    assert!(md.contains("LEG_Materials[\"Materials\"]"));
    Ok(())
}

#[test]
fn test_archiver_dry_run_then_real_run() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    let saves = root.path().join("Saves");
    for i in 0..3 {
        write(&saves.join(format!("Autosave{}_2025-1-{}.gz", i, i + 1)), "save")?;
    }

    let mut opts = CleanupOptions {
        save_dir: saves.clone(),
        archive_dir: root.path().join("archive"),
        keep: 1,
        max_archive: 50,
        dry_run: true,
    };
    assert_eq!(process_once(&opts)?.moved, 2);
    assert_eq!(find_save_files(&saves)?.len(), 3);

    opts.dry_run = false;
    assert_eq!(process_once(&opts)?.moved, 2);
    assert_eq!(find_save_files(&saves)?.len(), 1);
    assert_eq!(find_save_files(&root.path().join("archive/Auto"))?.len(), 2);
    Ok(())
}
