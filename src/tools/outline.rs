//! Markdown outline of mod projects: a mermaid dependency map plus one
//! section per project.

use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];
const UNCATEGORIZED: &str = "Uncategorized";
const MAX_EFFECT_LABELS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInfo {
    pub data_name: String,
    pub friendly_name: String,
    pub research_cost: Option<Value>,
    pub prereqs: Vec<String>,
    pub effects: Vec<Value>,
    pub tech_category: String,
    /// Referencing files, relative to the repository root.
    pub mods: Vec<String>,
}

impl ProjectInfo {
    fn placeholder(data_name: &str) -> Self {
        Self {
            data_name: data_name.to_string(),
            friendly_name: data_name.to_string(),
            research_cost: None,
            prereqs: Vec::new(),
            effects: Vec::new(),
            tech_category: UNCATEGORIZED.to_string(),
            mods: Vec::new(),
        }
    }

    fn cost(&self) -> String {
        match &self.research_cost {
            None | Some(Value::Null) => "None".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
        }
    }
}

/// Projects in file order; lookups go through `position`.
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    projects: Vec<ProjectInfo>,
    position: HashMap<String, usize>,
}

impl ProjectIndex {
    pub fn insert(&mut self, info: ProjectInfo) {
        match self.position.get(&info.data_name) {
            Some(&idx) => self.projects[idx] = info,
            None => {
                self.position.insert(info.data_name.clone(), self.projects.len());
                self.projects.push(info);
            }
        }
    }

    pub fn get(&self, data_name: &str) -> Option<&ProjectInfo> {
        self.position.get(data_name).map(|&idx| &self.projects[idx])
    }

    fn get_or_placeholder(&mut self, data_name: &str) -> &mut ProjectInfo {
        let idx = match self.position.get(data_name) {
            Some(&idx) => idx,
            None => {
                self.insert(ProjectInfo::placeholder(data_name));
                self.projects.len() - 1
            }
        };
        &mut self.projects[idx]
    }

    pub fn contains(&self, data_name: &str) -> bool {
        self.position.contains_key(data_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectInfo> {
        self.projects.iter()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn list(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn load_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(content.trim_start_matches('\u{feff}'))?)
}

pub fn collect_projects(projects: &Value) -> Result<ProjectIndex> {
    let Value::Array(items) = projects else {
        return Err(EtlError::ValidationError {
            message: "project template is not a JSON array".to_string(),
        });
    };

    let mut index = ProjectIndex::default();
    for item in items.iter().filter(|i| i.is_object()) {
        let Some(data_name) = text(item.get("dataName")) else {
            tracing::warn!("Skipping project without dataName");
            continue;
        };
        index.insert(ProjectInfo {
            friendly_name: text(item.get("friendlyName")).unwrap_or_else(|| data_name.clone()),
            research_cost: item.get("researchCost").cloned(),
            prereqs: list(item.get("prereqs"))
                .iter()
                .filter_map(|p| p.as_str().map(str::to_string))
                .collect(),
            effects: list(item.get("effects")),
            tech_category: text(item.get("techCategory")).unwrap_or_else(|| UNCATEGORIZED.to_string()),
            mods: Vec::new(),
            data_name,
        });
    }
    Ok(index)
}

/// Every `requiredProjectName` anywhere in the document, string or list.
pub fn find_required(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_required(value, &mut found);
    found
}

fn collect_required(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if key == "requiredProjectName" {
                    match v {
                        Value::Array(items) => found.extend(items.iter().filter_map(|i| i.as_str().map(str::to_string))),
                        Value::String(s) => found.push(s.clone()),
                        _ => {}
                    }
                } else {
                    collect_required(v, found);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|i| collect_required(i, found)),
        _ => {}
    }
}

/// Records which mod files reference each project. Unknown names become
/// placeholder projects; unreadable files are skipped.
pub fn scan_mods(index: &mut ProjectIndex, mods_dir: &Path, root: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = fs::read_dir(mods_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
        .filter(|p| p.file_name().is_some_and(|n| n != "TIProjectTemplate.json"))
        .collect();
    files.sort();

    for path in files {
        let data = match load_json(&path) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        for name in find_required(&data) {
            index.get_or_placeholder(&name).mods.push(rel.clone());
        }
    }
    Ok(())
}

/// Category -> colour, in first-seen order.
pub fn build_category_map(index: &ProjectIndex) -> Vec<(String, &'static str)> {
    let mut cats: Vec<String> = Vec::new();
    for project in index.iter() {
        if !cats.contains(&project.tech_category) {
            cats.push(project.tech_category.clone());
        }
    }
    cats.into_iter()
        .enumerate()
        .map(|(i, cat)| (cat, PALETTE[i % PALETTE.len()]))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectMeta {
    pub operation: Option<String>,
    pub value: Value,
    pub contexts: Vec<String>,
}

pub fn collect_effects(effects: &Value) -> HashMap<String, EffectMeta> {
    let Value::Array(items) = effects else {
        return HashMap::new();
    };
    items
        .iter()
        .filter_map(|e| {
            let dn = text(e.get("dataName"))?;
            Some((
                dn,
                EffectMeta {
                    operation: text(e.get("operation")),
                    value: e.get("value").cloned().unwrap_or(Value::Null),
                    contexts: list(e.get("contexts"))
                        .iter()
                        .filter_map(|c| c.as_str().map(str::to_string))
                        .collect(),
                },
            ))
        })
        .collect()
}

pub fn safe_id(s: &str) -> String {
    s.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect()
}

// 整數照原樣顯示，小數視為比例轉成百分比
fn number_or_percent(value: &Value) -> Option<String> {
    if value.is_i64() || value.is_u64() {
        return Some(value.to_string());
    }
    value.as_f64().map(|f| format!("{:.0}%", f * 100.0))
}

pub fn describe_effect(data_name: &str, meta: &EffectMeta) -> String {
    let name = meta.contexts.first().map(String::as_str).unwrap_or(data_name);
    let raw = || format!("{}: {}", name, meta.value);

    match meta.operation.as_deref() {
        Some("Multiplicative") => match meta.value.as_f64() {
            Some(v) => {
                let change = (v - 1.0) * 100.0;
                let sign = if change > 0.0 { "+" } else { "" };
                format!("{}: {}{:.1}%", name, sign, change)
            }
            None => format!("{}: ×{}", name, meta.value),
        },
        Some("IncreaseToValue") | Some("IncreaseTo") => number_or_percent(&meta.value)
            .map(|d| format!("{}: set to {}", name, d))
            .unwrap_or_else(raw),
        _ => number_or_percent(&meta.value)
            .map(|d| format!("{}: {}", name, d))
            .unwrap_or_else(raw),
    }
}

fn node_label(info: &ProjectInfo, effects: &HashMap<String, EffectMeta>) -> String {
    let mut lines = vec![info.friendly_name.clone(), format!("cost: {}", info.cost())];
    lines.extend(
        info.effects
            .iter()
            .filter_map(|e| e.as_str())
            .filter_map(|e| effects.get(e).map(|meta| describe_effect(e, meta)))
            .take(MAX_EFFECT_LABELS),
    );
    lines.join("<br>")
}

fn class_def(cat: &str, color: &str) -> String {
    format!("classDef cat_{} fill:{},stroke:#333,color:#fff;", safe_id(cat), color)
}

fn file_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

pub fn generate_mermaid(
    index: &ProjectIndex,
    cats: &[(String, &'static str)],
    effects: &HashMap<String, EffectMeta>,
) -> String {
    let mut lines = vec!["```mermaid".to_string(), "graph LR".to_string()];

    for info in index.iter() {
        lines.push(format!("{}[\"{}\"]", safe_id(&info.data_name), node_label(info, effects)));
    }

    // project --> prereq
    for info in index.iter() {
        for prereq in &info.prereqs {
            let pid = safe_id(prereq);
            if !index.contains(prereq) {
                lines.push(format!("{}[\"{}\"]", pid, prereq));
            }
            lines.push(format!("{} --> {}", safe_id(&info.data_name), pid));
        }
    }

    for info in index.iter() {
        for rel in &info.mods {
            let name = file_name(rel);
            let stem = name.strip_suffix(".json").unwrap_or(name);
            let node = format!("Mod_{}", safe_id(stem));
            lines.push(format!("{}[\"{}\"]", node, name));
            lines.push(format!("{} --> {}", node, safe_id(&info.data_name)));
        }
    }

    lines.extend(cats.iter().map(|(cat, color)| class_def(cat, color)));
    lines.extend(
        index
            .iter()
            .map(|info| format!("class {} cat_{};", safe_id(&info.data_name), safe_id(&info.tech_category))),
    );
    lines.push("```".to_string());
    lines.join("\n")
}

fn legend(cats: &[(String, &'static str)]) -> Vec<String> {
    let mut out = vec!["```mermaid".to_string(), "graph LR".to_string()];
    out.extend(cats.iter().map(|(cat, _)| format!("LEG_{}[\"{}\"]", safe_id(cat), cat)));
    out.extend(cats.iter().map(|(cat, color)| class_def(cat, color)));
    out.extend(
        cats.iter()
            .map(|(cat, _)| format!("class LEG_{} cat_{};", safe_id(cat), safe_id(cat))),
    );
    out.push("```".to_string());
    out
}

pub fn render_markdown(index: &ProjectIndex, cats: &[(String, &'static str)], mermaid: &str) -> Result<String> {
    let mut out = vec![
        "# Projects Outline".to_string(),
        String::new(),
        "This document is generated by `projects-outline`.".to_string(),
        String::new(),
        "## Categories & Colors".to_string(),
        String::new(),
    ];
    out.extend(legend(cats));
    out.extend([
        String::new(),
        "## Dependency Map".to_string(),
        String::new(),
        mermaid.to_string(),
        "\n---\n".to_string(),
    ]);

    for info in index.iter() {
        out.push(format!("## {} — {}", info.friendly_name, info.data_name));
        out.push(String::new());
        out.push(format!("- **researchCost**: {}", info.cost()));
        out.push(format!("- **techCategory**: {}", info.tech_category));
        out.push(format!("- **prereqs**: {}", serde_json::to_string(&info.prereqs)?));
        out.push(format!("- **effects**: {}", serde_json::to_string(&info.effects)?));
        if info.mods.is_empty() {
            out.push("- **referenced by mods**: []".to_string());
        } else {
            out.push("- **referenced by mods**:".to_string());
            out.extend(info.mods.iter().map(|m| format!("  - {}", m)));
        }
        out.push(String::new());
    }

    Ok(out.join("\n"))
}

#[derive(Debug, Clone)]
pub struct OutlineOptions {
    /// Mod file paths in the output are relative to this directory.
    pub root: PathBuf,
    pub mods_dir: PathBuf,
    pub output: PathBuf,
}

impl OutlineOptions {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            mods_dir: root.join("Mods"),
            output: root.join("docs").join("Projects_Outline.md"),
            root,
        }
    }
}

/// Builds the outline and writes it to `opts.output`.
pub fn generate(opts: &OutlineOptions) -> Result<ProjectIndex> {
    let projects_file = opts.mods_dir.join("TIProjectTemplate.json");
    let mut index = collect_projects(&load_json(&projects_file)?)?;
    scan_mods(&mut index, &opts.mods_dir, &opts.root)?;

    let cats = build_category_map(&index);
    // 效果檔缺少時只是標籤少一些資訊
    let effects = load_json(&opts.mods_dir.join("TIEffectTemplate.json"))
        .map(|v| collect_effects(&v))
        .unwrap_or_default();

    let mermaid = generate_mermaid(&index, &cats, &effects);
    let markdown = render_markdown(&index, &cats, &mermaid)?;

    if let Some(parent) = opts.output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&opts.output, markdown)?;
    tracing::info!("Wrote outline for {} projects to {}", index.len(), opts.output.display());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_projects() -> Value {
        json!([
            {"dataName": "Project_Alpha", "friendlyName": "Alpha Drive", "researchCost": 1200,
             "prereqs": ["Project_Beta", "Project_Outside"], "effects": ["Effect_Boost", "Effect_Unknown"],
             "techCategory": "SpaceScience"},
            {"dataName": "Project_Beta", "researchCost": 800.5},
            {"friendlyName": "no data name"}
        ])
    }

    #[test]
    fn test_collect_projects_defaults() {
        let index = collect_projects(&sample_projects()).unwrap();

        assert_eq!(index.len(), 2);
        let beta = index.get("Project_Beta").unwrap();
        assert_eq!(beta.friendly_name, "Project_Beta");
        assert_eq!(beta.tech_category, "Uncategorized");
        assert_eq!(beta.cost(), "800.5");
        assert!(collect_projects(&json!({})).is_err());
    }

    #[test]
    fn test_find_required_nested() {
        let data = json!([
            {"requiredProjectName": "A", "inner": {"requiredProjectName": ["B", "C"]}},
            {"list": [{"requiredProjectName": "D"}]},
            {"requiredProjectName": null}
        ]);
        assert_eq!(find_required(&data), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_describe_effect_operations() {
        let meta = |op: &str, value: Value| EffectMeta {
            operation: Some(op.to_string()),
            value,
            contexts: vec!["Research".to_string()],
        };

        assert_eq!(describe_effect("E", &meta("Multiplicative", json!(1.03))), "Research: +3.0%");
        assert_eq!(describe_effect("E", &meta("Multiplicative", json!(0.9))), "Research: -10.0%");
        assert_eq!(describe_effect("E", &meta("Additive", json!(2))), "Research: 2");
        assert_eq!(describe_effect("E", &meta("Additive", json!(0.25))), "Research: 25%");
        assert_eq!(describe_effect("E", &meta("IncreaseTo", json!(0.5))), "Research: set to 50%");
        assert_eq!(describe_effect("E", &meta("Other", json!("x"))), "Research: \"x\"");

        let no_context = EffectMeta {
            operation: None,
            value: json!(3),
            contexts: Vec::new(),
        };
        assert_eq!(describe_effect("Effect_Raw", &no_context), "Effect_Raw: 3");
    }

    #[test]
    fn test_category_palette_in_first_seen_order() {
        let mut index = ProjectIndex::default();
        for (i, cat) in ["B", "A", "B", "C"].iter().enumerate() {
            index.insert(ProjectInfo {
                tech_category: cat.to_string(),
                ..ProjectInfo::placeholder(&format!("P{}", i))
            });
        }

        let cats = build_category_map(&index);
        assert_eq!(
            cats,
            vec![
                ("B".to_string(), PALETTE[0]),
                ("A".to_string(), PALETTE[1]),
                ("C".to_string(), PALETTE[2])
            ]
        );
    }

    #[test]
    fn test_generate_writes_outline() {
        let root = TempDir::new().unwrap();
        let mods = root.path().join("Mods");
        fs::create_dir_all(&mods).unwrap();
        fs::write(mods.join("TIProjectTemplate.json"), sample_projects().to_string()).unwrap();
        fs::write(
            mods.join("TIEffectTemplate.json"),
            json!([{"dataName": "Effect_Boost", "operation": "Multiplicative", "value": 1.1,
                    "contexts": ["MiningBonus"]}])
            .to_string(),
        )
        .unwrap();
        fs::write(
            mods.join("TIHabModuleTemplate.json"),
            json!([{"dataName": "Mine", "requiredProjectName": "Project_Alpha"},
                   {"dataName": "Lab", "requiredProjectName": "Project_Ghost"}])
            .to_string(),
        )
        .unwrap();
        fs::write(mods.join("broken.json"), "{").unwrap();

        let opts = OutlineOptions::for_root(root.path());
        let index = generate(&opts).unwrap();
        let md = fs::read_to_string(&opts.output).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.get("Project_Ghost").unwrap().mods, vec!["Mods/TIHabModuleTemplate.json"]);

        assert!(md.starts_with("# Projects Outline\n"));
        assert!(md.contains("LEG_SpaceScience[\"SpaceScience\"]"));
        assert!(md.contains("Project_Alpha[\"Alpha Drive<br>cost: 1200<br>MiningBonus: +10.0%\"]"));
        assert!(md.contains("Project_Alpha --> Project_Beta"));
        assert!(md.contains("Project_Outside[\"Project_Outside\"]"));
        assert!(md.contains("Mod_TIHabModuleTemplate[\"TIHabModuleTemplate.json\"]"));
        assert!(md.contains("Mod_TIHabModuleTemplate --> Project_Ghost"));
        assert!(md.contains("class Project_Beta cat_Uncategorized;"));
        assert!(md.contains("classDef cat_SpaceScience fill:#1f77b4,stroke:#333,color:#fff;"));
        assert!(md.contains("## Alpha Drive — Project_Alpha"));
        assert!(md.contains("- **prereqs**: [\"Project_Beta\",\"Project_Outside\"]"));
        assert!(md.contains("  - Mods/TIHabModuleTemplate.json"));
        assert!(md.contains("- **researchCost**: None"));
        assert!(md.contains("Project_Ghost[\"Project_Ghost<br>cost: None\"]"));
    }
}
