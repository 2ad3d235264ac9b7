pub mod etl;
pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod save;
pub mod watcher;

pub use crate::domain::model::{LoadOutcome, NationRow, SaveDocument, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
