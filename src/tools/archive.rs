//! Keeps the save directory small: the newest saves of each type stay in
//! place, older ones move to an archive which is itself capped per type.

use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

fn save_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z]+)save(\d+?)_(\d{4}-\d{1,2}-\d{1,2})\.gz$")
            .unwrap_or_else(|e| panic!("invalid save pattern: {}", e))
    })
}

#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub save_dir: PathBuf,
    pub archive_dir: PathBuf,
    /// 每種存檔保留在原處的數量
    pub keep: usize,
    /// 封存區每種存檔的上限
    pub max_archive: usize,
    pub dry_run: bool,
}

impl Validate for CleanupOptions {
    fn validate(&self) -> Result<()> {
        validation::validate_path("save_dir", &self.save_dir.to_string_lossy())?;
        validation::validate_path("archive_dir", &self.archive_dir.to_string_lossy())?;
        // 封存區至少保留一份，否則搬過去的檔案會立刻被刪除
        validation::validate_positive_number("max_archive", self.max_archive, 1)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub moved: usize,
    pub deleted: usize,
}

impl CleanupSummary {
    pub fn is_empty(&self) -> bool {
        self.moved == 0 && self.deleted == 0
    }
}

/// `Autosave12_2025-3-14.gz` -> `Auto`
pub fn save_type(file_name: &str) -> Option<&str> {
    save_pattern()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn find_save_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(kind) = save_type(name) {
            files.push((kind.to_string(), path.clone()));
        }
    }

    Ok(files)
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn move_file(src: &Path, dst: &Path, dry_run: bool) -> bool {
    if dry_run {
        return true;
    }

    let result = dst
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        // rename 跨檔案系統會失敗，改用複製後刪除
        .and_then(|_| fs::rename(src, dst).or_else(|_| fs::copy(src, dst).and_then(|_| fs::remove_file(src))));

    match result {
        Ok(()) => {
            tracing::info!("Moved {} -> {}", src.display(), dst.display());
            true
        }
        Err(e) => {
            tracing::error!("ERROR moving {} -> {}: {}", src.display(), dst.display(), e);
            false
        }
    }
}

/// Deletes the oldest archived saves of `save_type` beyond `max_keep`.
pub fn prune_archive(archive_dir: &Path, save_type: &str, max_keep: usize, dry_run: bool) -> Result<usize> {
    let target = archive_dir.join(save_type);
    if !target.exists() {
        return Ok(0);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(&target)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort_by_key(|p| modified(p));

    let excess = files.len().saturating_sub(max_keep);
    let mut deleted = 0;
    for oldest in files.into_iter().take(excess) {
        if dry_run {
            deleted += 1;
            continue;
        }
        match fs::remove_file(&oldest) {
            Ok(()) => {
                tracing::info!("Deleted archived: {}", oldest.display());
                deleted += 1;
            }
            Err(e) => tracing::error!("ERROR deleting {}: {}", oldest.display(), e),
        }
    }

    Ok(deleted)
}

pub fn process_once(opts: &CleanupOptions) -> Result<CleanupSummary> {
    let mut by_type: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for (kind, path) in find_save_files(&opts.save_dir)? {
        by_type.entry(kind).or_default().push(path);
    }

    let mut summary = CleanupSummary::default();
    for (kind, mut paths) in by_type {
        // newest first
        paths.sort_by_key(|p| std::cmp::Reverse(modified(p)));
        let to_archive = paths.split_off(opts.keep.min(paths.len()));

        if !to_archive.is_empty() && !opts.dry_run {
            tracing::info!(
                "Type {}: keeping {} newest, archiving {} files",
                kind,
                paths.len(),
                to_archive.len()
            );
        }

        for path in to_archive {
            let Some(name) = path.file_name() else {
                continue;
            };
            let dest = opts.archive_dir.join(&kind).join(name);
            if move_file(&path, &dest, opts.dry_run) {
                summary.moved += 1;
            }
        }

        summary.deleted += prune_archive(&opts.archive_dir, &kind, opts.max_archive, opts.dry_run)?;
    }

    if !opts.dry_run && !summary.is_empty() {
        tracing::info!("Summary: moved={} deleted={}", summary.moved, summary.deleted);
    }
    Ok(summary)
}

/// 摘要行，前面加上時間戳；沒有任何動作時回傳 `None`
pub fn summary_line(summary: &CleanupSummary, dry_run: bool, now: chrono::NaiveDateTime) -> Option<String> {
    let stamp = now.format("%Y-%m-%d %H:%M:%S");
    if dry_run {
        Some(format!(
            "{} DRY: Would move {} files into archive, delete {} files from archive",
            stamp, summary.moved, summary.deleted
        ))
    } else if !summary.is_empty() {
        Some(format!(
            "{} Moved {} files into archive, deleted {} files from archive",
            stamp, summary.moved, summary.deleted
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, age_rank: u64) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, b"save").unwrap();
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 + age_rank))
            .unwrap();
        path
    }

    fn options(root: &Path, keep: usize, max_archive: usize, dry_run: bool) -> CleanupOptions {
        CleanupOptions {
            save_dir: root.join("Saves"),
            archive_dir: root.join("archive"),
            keep,
            max_archive,
            dry_run,
        }
    }

    #[test]
    fn test_save_type_pattern() {
        assert_eq!(save_type("Autosave12_2025-3-14.gz"), Some("Auto"));
        assert_eq!(save_type("Quicksave1_2025-12-01.gz"), Some("Quick"));
        assert_eq!(save_type("Autosave12_2025-3-14.json"), None);
        assert_eq!(save_type("save1_2025-3-14.gz"), None);
        assert_eq!(save_type("Autosave_2025-3-14.gz"), None);
    }

    #[test]
    fn test_keeps_newest_per_type_and_archives_rest() {
        let root = TempDir::new().unwrap();
        let saves = root.path().join("Saves");
        for i in 0..7 {
            touch(&saves, &format!("Autosave{}_2025-1-{}.gz", i, i + 1), i);
        }
        for i in 0..2 {
            touch(&saves, &format!("Quicksave{}_2025-2-{}.gz", i, i + 1), i);
        }
        touch(&saves, "notes.txt", 0);

        let summary = process_once(&options(root.path(), 5, 50, false)).unwrap();

        assert_eq!(summary, CleanupSummary { moved: 2, deleted: 0 });
        assert!(root.path().join("archive/Auto/Autosave0_2025-1-1.gz").exists());
        assert!(root.path().join("archive/Auto/Autosave1_2025-1-2.gz").exists());
        assert!(saves.join("Autosave6_2025-1-7.gz").exists());
        assert!(saves.join("Quicksave0_2025-2-1.gz").exists());
        assert!(saves.join("notes.txt").exists());
        assert_eq!(find_save_files(&saves).unwrap().len(), 7);
    }

    #[test]
    fn test_archive_pruned_to_max() {
        let root = TempDir::new().unwrap();
        let archived = root.path().join("archive/Auto");
        for i in 0..4 {
            touch(&archived, &format!("Autosave{}_2024-1-1.gz", i), i);
        }
        let saves = root.path().join("Saves");
        touch(&saves, "Autosave10_2025-1-1.gz", 100);
        touch(&saves, "Autosave11_2025-1-2.gz", 101);

        let summary = process_once(&options(root.path(), 1, 3, false)).unwrap();

        assert_eq!(summary, CleanupSummary { moved: 1, deleted: 2 });
        let mut left: Vec<String> = fs::read_dir(&archived)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "Autosave10_2025-1-1.gz",
                "Autosave2_2024-1-1.gz",
                "Autosave3_2024-1-1.gz"
            ]
        );
    }

    #[test]
    fn test_dry_run_counts_without_touching() {
        let root = TempDir::new().unwrap();
        let saves = root.path().join("Saves");
        for i in 0..4 {
            touch(&saves, &format!("Autosave{}_2025-1-1.gz", i), i);
        }
        let archived = root.path().join("archive/Auto");
        for i in 0..3 {
            touch(&archived, &format!("Autosave{}_2024-1-1.gz", i + 20), i);
        }

        let summary = process_once(&options(root.path(), 2, 1, true)).unwrap();

        assert_eq!(summary, CleanupSummary { moved: 2, deleted: 2 });
        assert_eq!(find_save_files(&saves).unwrap().len(), 4);
        assert_eq!(fs::read_dir(&archived).unwrap().count(), 3);
    }

    #[test]
    fn test_missing_save_dir_is_noop() {
        let root = TempDir::new().unwrap();
        let summary = process_once(&options(root.path(), 5, 50, false)).unwrap();
        assert!(summary.is_empty());
    }

    #[test]
    fn test_options_validation() {
        let root = TempDir::new().unwrap();
        assert!(options(root.path(), 0, 1, false).validate().is_ok());
        assert!(options(root.path(), 5, 0, false).validate().is_err());
    }

    #[test]
    fn test_summary_line() {
        let now = chrono::NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let summary = CleanupSummary { moved: 3, deleted: 1 };

        assert_eq!(
            summary_line(&summary, true, now).unwrap(),
            "2025-01-02 03:04:05 DRY: Would move 3 files into archive, delete 1 files from archive"
        );
        assert_eq!(
            summary_line(&summary, false, now).unwrap(),
            "2025-01-02 03:04:05 Moved 3 files into archive, deleted 1 files from archive"
        );
        assert!(summary_line(&CleanupSummary::default(), false, now).is_none());
    }
}
