//! Read-only validator for `Mods/TI*.json`.
//!
//! Checks structure, that every `requiredProjectName` resolves to a local or
//! built-in project, and that locally defined items carry English
//! localization.

use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

pub const DEFAULT_OMIT: [&str; 2] = ["TIEffectTemplate.json", "TIRegionTemplate.json"];
const MAX_MISSING_EXAMPLES: usize = 8;
const PREVIEW_LIMIT: usize = 140;

/// `~/Games/TerraInvicta/templates/TIProjectTemplate.json`
pub fn default_game_templates() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join("Games")
            .join("TerraInvicta")
            .join("templates")
            .join("TIProjectTemplate.json")
    })
}

#[derive(Debug, Clone)]
pub struct ModsOptions {
    pub mods_dir: PathBuf,
    /// Defaults to `<mods_dir>/TIProjectTemplate.json`.
    pub templates: Option<PathBuf>,
    /// A template file or the directory holding the game's templates.
    pub game_templates: Option<PathBuf>,
    pub omit: Vec<String>,
}

impl ModsOptions {
    pub fn template_file(&self) -> PathBuf {
        self.templates
            .clone()
            .unwrap_or_else(|| self.mods_dir.join("TIProjectTemplate.json"))
    }

    fn omit_set(&self) -> HashSet<String> {
        DEFAULT_OMIT
            .iter()
            .map(|s| s.to_string())
            .chain(self.omit.iter().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Built-in game data: the templates directory (if any) and the project
/// dataNames from the game's `TIProjectTemplate.json`.
#[derive(Debug, Clone, Default)]
pub struct GameTemplates {
    pub dir: Option<PathBuf>,
    pub project_names: HashSet<String>,
}

impl GameTemplates {
    pub fn resolve(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if path.is_dir() {
            return Self {
                dir: Some(path.to_path_buf()),
                project_names: HashSet::new(),
            };
        }
        if !path.is_file() {
            tracing::debug!("Game templates not found at {}", path.display());
            return Self::default();
        }

        let project_names = load_json(path)
            .ok()
            .map(|v| data_names(&v).into_iter().collect())
            .unwrap_or_default();

        Self {
            dir: path.parent().map(Path::to_path_buf),
            project_names,
        }
    }

    /// dataNames in the game's file of the same name, used to decide which
    /// items the game already localizes.
    fn names_in(&self, file_name: &str) -> HashSet<String> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(file_name))
            .filter(|p| p.exists())
            .and_then(|p| load_json(&p).ok())
            .filter(Value::is_array)
            .map(|v| data_names(&v).into_iter().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCounts {
    pub matched_local: usize,
    pub matched_game: usize,
    pub unmatched: usize,
    pub loc_ok_local: usize,
    pub loc_ok_game: usize,
    pub loc_missing: usize,
}

impl AddAssign for FileCounts {
    fn add_assign(&mut self, other: Self) {
        self.matched_local += other.matched_local;
        self.matched_game += other.matched_game;
        self.unmatched += other.unmatched;
        self.loc_ok_local += other.loc_ok_local;
        self.loc_ok_game += other.loc_ok_game;
        self.loc_missing += other.loc_missing;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub name: String,
    pub ok: bool,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub template_entries: usize,
    pub scanned_files: usize,
    pub totals: FileCounts,
    pub results: Vec<FileReport>,
}

impl ValidationReport {
    pub fn has_issues(&self) -> bool {
        self.results.iter().any(|r| !r.ok)
    }

    pub fn exit_code(&self) -> i32 {
        if self.has_issues() {
            1
        } else {
            0
        }
    }

    pub fn displayed(&self, show_all: bool) -> Vec<&FileReport> {
        self.results.iter().filter(|r| show_all || !r.ok).collect()
    }

    pub fn totals_line(&self) -> String {
        let t = &self.totals;
        format!(
            "TIProjectTemplate.json entries: {}; scanned_files: {}; matched_local: {}; matched_game: {}; unmatched: {}; loc_ok_local: {}; loc_ok_game: {}; loc_missing: {}",
            self.template_entries,
            self.scanned_files,
            t.matched_local,
            t.matched_game,
            t.unmatched,
            t.loc_ok_local,
            t.loc_ok_game,
            t.loc_missing
        )
    }
}

fn load_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(content.trim_start_matches('\u{feff}'))?)
}

fn truthy_str<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn data_names(value: &Value) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| truthy_str(item, "dataName"))
        .map(str::to_string)
        .collect()
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Project template entries need `dataName`, `friendlyName` and both AI keys.
pub fn template_issues(templates: &[Value]) -> (HashSet<String>, Vec<String>) {
    let mut names = HashSet::new();
    let mut issues = Vec::new();

    for (idx, entry) in templates.iter().enumerate() {
        let ctx = format!("[{}]", idx);
        if !entry.is_object() {
            issues.push(format!("{} entry is not an object", ctx));
            continue;
        }

        match truthy_str(entry, "dataName") {
            Some(dn) => {
                names.insert(dn.to_string());
            }
            None if !is_truthy(entry.get("dataName")) => issues.push(format!("{} missing dataName", ctx)),
            None => {}
        }
        if !is_truthy(entry.get("friendlyName")) {
            issues.push(format!("{} missing friendlyName", ctx));
        }
        for key in ["AI_techRole", "AI_criticalTech"] {
            if entry.get(key).is_none() {
                issues.push(format!("{} missing {}", ctx, key));
            }
        }
    }

    (names, issues)
}

/// `Mods/Localization/en/<stem>.en` keys; `#` lines are comments.
pub fn load_localization_keys(path: &Path) -> HashSet<String> {
    let Ok(content) = fs::read_to_string(path) else {
        return HashSet::new();
    };
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, _)| key.trim().to_string())
        .collect()
}

/// Whether `data_name` has the localization fields its template kind needs.
pub fn localization_complete(stem: &str, data_name: &str, keys: &HashSet<String>) -> bool {
    let has = |field: &str| keys.contains(&format!("{}.{}.{}", stem, field, data_name));
    match stem {
        "TIProjectTemplate" => has("displayName") && has("summary"),
        "TIShipHullTemplate" => has("displayName") && has("abbr"),
        "TITechTemplate" => has("displayName") && has("summary") && has("quote") && has("description"),
        _ => has("displayName") || has("description"),
    }
}

struct FileContext<'a> {
    mods_dir: &'a Path,
    local_projects: &'a HashSet<String>,
    game: &'a GameTemplates,
}

fn check_item(item: &Value, ctx: &str, cx: &FileContext, counts: &mut FileCounts, msgs: &mut Vec<String>) {
    if !item.is_object() {
        msgs.push(format!("{}item is not an object", ctx));
        return;
    }
    for key in ["dataName", "friendlyName"] {
        if item.get(key).is_none() {
            msgs.push(format!("{}missing {}", ctx, key));
        }
    }

    let Some(required) = truthy_str(item, "requiredProjectName") else {
        return;
    };
    if cx.local_projects.contains(required) {
        counts.matched_local += 1;
    } else if cx.game.project_names.contains(required) {
        counts.matched_game += 1;
    } else {
        counts.unmatched += 1;
        msgs.push(format!(
            "{}requiredProjectName '{}' not found in TIProjectTemplate.json or game templates",
            ctx, required
        ));
    }
}

fn check_file(path: &Path, cx: &FileContext) -> (FileReport, FileCounts) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut counts = FileCounts::default();
    let mut msgs = Vec::new();

    let obj = match load_json(path) {
        Ok(obj) => obj,
        Err(e) => {
            return (
                FileReport {
                    name,
                    ok: false,
                    messages: vec![format!("invalid json: {}", e)],
                },
                counts,
            )
        }
    };

    match &obj {
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                check_item(item, &format!("[{}] ", idx), cx, &mut counts, &mut msgs);
            }
        }
        Value::Object(_) => check_item(&obj, "", cx, &mut counts, &mut msgs),
        _ => msgs.push("top-level JSON is neither object nor array".to_string()),
    }
    let structural_errors = !msgs.is_empty();

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let loc_keys = load_localization_keys(
        &cx.mods_dir
            .join("Localization")
            .join("en")
            .join(format!("{}.en", stem)),
    );
    let game_owned = cx.game.names_in(&name);

    let mut missing_examples = Vec::new();
    for dn in data_names(&obj) {
        // 遊戲本身已有的項目沿用遊戲的翻譯
        if game_owned.contains(&dn) || cx.game.project_names.contains(&dn) {
            counts.loc_ok_game += 1;
        } else if localization_complete(&stem, &dn, &loc_keys) {
            counts.loc_ok_local += 1;
        } else {
            counts.loc_missing += 1;
            if missing_examples.len() < MAX_MISSING_EXAMPLES {
                missing_examples.push(dn);
            }
        }
    }

    msgs.push(format!(
        "matched_local={}; matched_game={}; unmatched={}",
        counts.matched_local, counts.matched_game, counts.unmatched
    ));
    msgs.push(format!(
        "loc_ok_local={}; loc_ok_game={}; loc_missing={}",
        counts.loc_ok_local, counts.loc_ok_game, counts.loc_missing
    ));
    if !missing_examples.is_empty() {
        msgs.push(format!("loc_missing_examples={}", missing_examples.join(",")));
    }

    let ok = !structural_errors && counts.loc_missing == 0 && counts.unmatched == 0;
    (
        FileReport {
            name,
            ok,
            messages: msgs,
        },
        counts,
    )
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// `TI*.json` in `mods_dir`, sorted by name, without the project template.
fn mod_files(mods_dir: &Path, template_file: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(mods_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("TI") && n.ends_with(".json"))
        })
        .filter(|p| !same_file(p, template_file))
        .collect();
    files.sort();
    Ok(files)
}

fn load_templates(template_file: &Path) -> Result<Vec<Value>> {
    let value = load_json(template_file).map_err(|e| EtlError::ConfigError {
        message: format!("Failed to load template file {}: {}", template_file.display(), e),
    })?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(EtlError::ConfigError {
            message: format!("Template file {} top-level is not an array/list", template_file.display()),
        }),
    }
}

/// Runs every check. Errors are setup problems (missing directory or an
/// unusable project template); per-file findings live in the report.
pub fn validate(opts: &ModsOptions, game: &GameTemplates) -> Result<ValidationReport> {
    if !opts.mods_dir.is_dir() {
        return Err(EtlError::ConfigError {
            message: format!("Mods directory not found: {}", opts.mods_dir.display()),
        });
    }
    let template_file = opts.template_file();
    if !template_file.is_file() {
        return Err(EtlError::ConfigError {
            message: format!("Template file not found: {}", template_file.display()),
        });
    }

    let templates = load_templates(&template_file)?;
    let (local_projects, issues) = template_issues(&templates);

    let mut results = vec![FileReport {
        name: template_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        ok: issues.is_empty(),
        messages: std::iter::once(format!("entries={}", templates.len()))
            .chain(issues)
            .collect(),
    }];

    let omit = opts.omit_set();
    let cx = FileContext {
        mods_dir: &opts.mods_dir,
        local_projects: &local_projects,
        game,
    };

    let mut totals = FileCounts::default();
    let mut scanned_files = 0;
    for path in mod_files(&opts.mods_dir, &template_file)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if omit.contains(&name) {
            results.push(FileReport {
                name,
                ok: true,
                messages: vec!["SKIPPED".to_string()],
            });
            continue;
        }

        let (report, counts) = check_file(&path, &cx);
        tracing::debug!("Checked {}: ok={}", report.name, report.ok);
        scanned_files += 1;
        totals += counts;
        results.push(report);
    }

    Ok(ValidationReport {
        template_entries: templates.len(),
        scanned_files,
        totals,
        results,
    })
}

pub fn render_concise(results: &[&FileReport]) -> String {
    let mut out = String::new();
    for report in results {
        if report.ok {
            out.push_str(&format!("OK: {}\n", report.name));
        } else {
            out.push_str(&format!("ERROR: {}\n", report.name));
            for msg in &report.messages {
                out.push_str(&format!("  - {}\n", msg));
            }
        }
    }
    out
}

pub fn render_report_table(results: &[&FileReport]) -> String {
    let col1 = results.iter().map(|r| r.name.len()).max().unwrap_or(10);
    let col2 = 7;

    let mut out = format!("{:<col1$}  {:<col2$}  Messages\n", "File", "Status");
    out.push_str(&"-".repeat(col1 + col2 + 12));
    out.push('\n');
    for report in results {
        let status = if report.ok { "OK" } else { "ERROR" };
        out.push_str(&format!(
            "{:<col1$}  {:<col2$}  {}\n",
            report.name,
            status,
            report.messages.join("; ")
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Local items sharing a dataName with the game's file of the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideSet {
    pub file: String,
    /// `(dataName, local, game)` sorted by dataName.
    pub items: Vec<(String, Value, Value)>,
}

fn by_data_name(items: Vec<Value>) -> BTreeMap<String, Value> {
    items
        .into_iter()
        .filter_map(|item| {
            let dn = truthy_str(&item, "dataName")?.to_string();
            Some((dn, item))
        })
        .collect()
}

pub fn find_overrides(opts: &ModsOptions, game: &GameTemplates) -> Result<Vec<OverrideSet>> {
    let Some(game_dir) = &game.dir else {
        return Ok(Vec::new());
    };

    let mut sets = Vec::new();
    for path in mod_files(&opts.mods_dir, &opts.template_file())? {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let game_path = game_dir.join(&name);
        if !game_path.exists() {
            continue;
        }
        let (Ok(Value::Array(local)), Ok(Value::Array(game_items))) = (load_json(&path), load_json(&game_path)) else {
            continue;
        };

        let mut game_map = by_data_name(game_items);
        let items: Vec<(String, Value, Value)> = by_data_name(local)
            .into_iter()
            .filter_map(|(dn, local)| game_map.remove(&dn).map(|g| (dn, local, g)))
            .collect();
        if !items.is_empty() {
            sets.push(OverrideSet { file: name, items });
        }
    }
    Ok(sets)
}

fn preview(value: Option<&Value>) -> String {
    let text = value
        .map(|v| serde_json::to_string(v).unwrap_or_default())
        .unwrap_or_else(|| "null".to_string())
        .replace('\n', " ");
    if text.chars().count() <= PREVIEW_LIMIT {
        text
    } else {
        let head: String = text.chars().take(PREVIEW_LIMIT - 3).collect();
        format!("{}...", head)
    }
}

fn sorted_keys<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<&'a str> {
    let mut keys: Vec<&str> = keys.map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

/// Added, removed and changed keys between a local override and the game's
/// template entry.
pub fn compact_diff(local: &Value, game: &Value) -> Vec<String> {
    let empty = serde_json::Map::new();
    let lobj = local.as_object().unwrap_or(&empty);
    let gobj = game.as_object().unwrap_or(&empty);

    let added = sorted_keys(lobj.keys().filter(|k| !gobj.contains_key(*k)));
    let removed = sorted_keys(gobj.keys().filter(|k| !lobj.contains_key(*k)));
    let changed = sorted_keys(
        lobj.keys()
            .filter(|k| gobj.get(*k).is_some_and(|g| Some(g) != lobj.get(*k))),
    );

    let mut lines = Vec::new();
    if !added.is_empty() {
        lines.push(format!("+ keys in local: {}", added.join(", ")));
    }
    if !removed.is_empty() {
        lines.push(format!("- keys in game: {}", removed.join(", ")));
    }
    if !changed.is_empty() {
        lines.push("~ changed keys:".to_string());
        for key in changed {
            lines.push(format!(
                "  {}: local={} | game={}",
                key,
                preview(lobj.get(key)),
                preview(gobj.get(key))
            ));
        }
    }
    lines
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideOutput {
    pub list: bool,
    pub dump: bool,
    pub full: bool,
}

impl OverrideOutput {
    pub fn any(&self) -> bool {
        self.list || self.dump || self.full
    }
}

pub fn render_overrides(sets: &[OverrideSet], mode: OverrideOutput) -> Result<String> {
    let mut out = String::new();
    for set in sets {
        if mode.list {
            let names: Vec<&str> = set.items.iter().map(|(dn, _, _)| dn.as_str()).collect();
            out.push_str(&format!("Overrides in {}: {}\n", set.file, names.join(", ")));
        }
        if !(mode.dump || mode.full) {
            continue;
        }
        for (dn, local, game) in &set.items {
            out.push_str(&format!("--- {} :: {} ---\n", set.file, dn));
            if mode.full {
                out.push_str("-- LOCAL --\n");
                out.push_str(&serde_json::to_string_pretty(local)?);
                out.push_str("\n-- GAME  --\n");
                out.push_str(&serde_json::to_string_pretty(game)?);
                out.push('\n');
            } else {
                for line in compact_diff(local, game) {
                    out.push_str(&line);
                    out.push('\n');
                }
            }
        }
    }
    Ok(out)
}
