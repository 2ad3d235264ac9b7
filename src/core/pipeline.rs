use crate::core::metrics::extract_nation_data;
use crate::core::save::{fetch_latest_save, load_save};
use crate::core::{ConfigProvider, LoadOutcome, Pipeline, SaveDocument, Storage, TransformResult};
use crate::domain::model::NationRow;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// 要處理哪一個存檔
#[derive(Debug, Clone, PartialEq)]
pub enum SaveSource {
    /// Newest `.gz` in the configured save directory.
    Latest,
    File(PathBuf),
}

pub struct CampaignPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    source: SaveSource,
}

impl<S: Storage, C: ConfigProvider> CampaignPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self::with_source(storage, config, SaveSource::Latest)
    }

    pub fn with_source(storage: S, config: C, source: SaveSource) -> Self {
        Self {
            storage,
            config,
            source,
        }
    }

    fn resolve_save_path(&self) -> Result<PathBuf> {
        match &self.source {
            SaveSource::Latest => fetch_latest_save(Path::new(self.config.save_directory())),
            SaveSource::File(path) => Ok(path.clone()),
        }
    }
}

/// 將資料列序列化為 CSV；只有新檔案才寫表頭
pub fn rows_to_csv(rows: &[NationRow], with_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| crate::utils::error::EtlError::IoError(e.into_error()))
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for CampaignPipeline<S, C> {
    async fn extract(&self) -> Result<SaveDocument> {
        let path = self.resolve_save_path()?;
        tracing::info!("Loading Save: {}", path.display());

        // 遊戲可能還在寫入檔案，這一輪直接放棄
        let data = match load_save(&path) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Read failed (file might be locked): {}", e);
                return Err(e);
            }
        };

        Ok(SaveDocument { path, data })
    }

    async fn transform(&self, save: SaveDocument) -> Result<TransformResult> {
        let today = chrono::Local::now().date_naive();
        let all_rows = extract_nation_data(&save.data, &self.config.metrics(), today)?;
        tracing::debug!("Computed metrics for {} nations", all_rows.len());

        let tracked = self.config.tracked_nations();
        let tracked_rows = all_rows
            .iter()
            .filter(|row| tracked.iter().any(|name| name == &row.nation_name))
            .cloned()
            .collect();

        Ok(TransformResult {
            source: save.path,
            all_rows,
            tracked_rows,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<LoadOutcome> {
        // Saves sometimes contain only metadata.
        if result.tracked_rows.is_empty() {
            tracing::warn!("No nation data found. Skipping write.");
            return Ok(LoadOutcome::Skipped {
                reason: format!("no tracked nations in {}", result.source.display()),
            });
        }

        let output = self.config.output_path();
        let file_exists = self.storage.exists(output).await;
        let data = rows_to_csv(&result.tracked_rows, !file_exists)?;

        tracing::debug!(
            "Appending {} rows ({} bytes) to {}",
            result.tracked_rows.len(),
            data.len(),
            output
        );
        self.storage.append_file(output, &data).await?;
        tracing::info!("Successfully updated {}", output);

        Ok(LoadOutcome::Appended {
            path: output.to_string(),
            rows: result.tracked_rows.len(),
        })
    }
}
