use crate::domain::model::{LoadOutcome, MetricsConfig, SaveDocument, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn append_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn save_directory(&self) -> &str;
    fn output_path(&self) -> &str;
    fn tracked_nations(&self) -> &[String];
    fn metrics(&self) -> MetricsConfig;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<SaveDocument>;
    async fn transform(&self, save: SaveDocument) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<LoadOutcome>;
}
