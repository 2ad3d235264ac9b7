use crate::core::{LoadOutcome, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<LoadOutcome> {
        tracing::debug!("Starting extraction run");

        // Extract
        let save = self.pipeline.extract().await?;
        self.monitor.log_stage("Save loaded");

        // Transform
        let result = self.pipeline.transform(save).await?;
        tracing::info!(
            "Computed {} nations, {} tracked",
            result.all_rows.len(),
            result.tracked_rows.len()
        );
        self.monitor.log_stage("Metrics computed");

        // Load
        let outcome = self.pipeline.load(result).await?;
        self.monitor.log_stage("History updated");
        self.monitor.log_final_stats();

        Ok(outcome)
    }
}
