use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("File watcher error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Save directory does not exist: {path}")]
    SaveDirectoryMissing { path: String },

    #[error("No .gz save files found in {dir}")]
    NoSaveFound { dir: String },

    #[error("Invalid save file: {message}")]
    InvalidSave { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::SaveDirectoryMissing { .. }
            | EtlError::NoSaveFound { .. }
            | EtlError::InvalidSave { .. }
            | EtlError::SerializationError(_) => ErrorCategory::Input,
            EtlError::CsvError(_)
            | EtlError::PatternError(_)
            | EtlError::ValidationError { .. } => ErrorCategory::Processing,
            EtlError::IoError(_) | EtlError::WatchError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 存檔還沒寫完或暫時找不到，下次再試即可
            EtlError::NoSaveFound { .. } | EtlError::SerializationError(_) => ErrorSeverity::Medium,
            EtlError::IoError(_) | EtlError::WatchError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check campaign.toml and the command line flags (e.g. add a `my_nations` list under [filter])"
            }
            ErrorCategory::Input => {
                "Make sure the save directory is correct and the game finished writing the save"
            }
            ErrorCategory::Processing => "Re-run with --verbose to see which record failed",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::MissingConfigError { field } => {
                format!("Missing setting '{}'. Please add it to the config file.", field)
            }
            EtlError::SaveDirectoryMissing { path } => {
                format!("Cannot find the save directory '{}'.", path)
            }
            EtlError::NoSaveFound { dir } => format!("No saves found in '{}' yet.", dir),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
