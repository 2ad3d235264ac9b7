use crate::utils::error::{EtlError, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 找出存檔目錄中最新（修改時間最大）的 `.gz` 存檔
pub fn fetch_latest_save(dir: &Path) -> Result<PathBuf> {
    tracing::info!("Looking for saves in {}", dir.display());

    if !dir.is_dir() {
        tracing::error!("Save directory does not exist: {}", dir.display());
        return Err(EtlError::SaveDirectoryMissing {
            path: dir.display().to_string(),
        });
    }

    let entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    tracing::info!("Found {} files in save directory.", entries.len());

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let path = entry.path();
        let is_gz = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".gz"));
        if !is_gz || !path.is_file() {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let newer = match &latest {
            Some((best, _)) => modified > *best,
            None => true,
        };
        if newer {
            latest = Some((modified, path));
        }
    }

    latest.map(|(_, path)| path).ok_or_else(|| EtlError::NoSaveFound {
        dir: dir.display().to_string(),
    })
}

/// 讀取存檔：`.gz` 先解壓，其餘視為純 JSON。會去除開頭的 UTF-8 BOM。
pub fn load_save(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read(path)?;

    let bytes = if is_gzip_path(path) {
        let mut decoder = GzDecoder::new(raw.as_slice());
        let mut output = Vec::with_capacity(raw.len() * 8);
        decoder.read_to_end(&mut output)?;
        tracing::info!("Uncompressed file size: {} bytes", output.len());
        output
    } else {
        raw
    };

    parse_save_bytes(&bytes)
}

pub fn parse_save_bytes(bytes: &[u8]) -> Result<serde_json::Value> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    Ok(serde_json::from_slice(body)?)
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}
