use crate::utils::error::{EtlError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_extensions(field_name: &str, extensions: &[String]) -> Result<()> {
    if extensions.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: String::new(),
            reason: "At least one file extension is required".to_string(),
        });
    }

    for ext in extensions {
        if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
            return Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: ext.clone(),
                reason: "Extensions are bare names like \"gz\" or \"json\"".to_string(),
            });
        }
    }

    Ok(())
}

pub fn validate_non_empty_list(field_name: &str, values: &[String]) -> Result<()> {
    if values.iter().all(|v| v.trim().is_empty()) {
        return Err(EtlError::MissingConfigError {
            field: field_name.to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("output.csv_path", "campaign_history.csv").is_ok());
        assert!(validate_path("output.csv_path", "").is_err());
        assert!(validate_path("output.csv_path", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("keep", 5, 1).is_ok());
        assert!(validate_positive_number("keep", 0, 1).is_err());
    }

    #[test]
    fn test_validate_extensions() {
        let ok = vec!["gz".to_string(), "json".to_string()];
        assert!(validate_extensions("watch.extensions", &ok).is_ok());

        let dotted = vec![".gz".to_string()];
        assert!(validate_extensions("watch.extensions", &dotted).is_err());
        assert!(validate_extensions("watch.extensions", &[]).is_err());
    }

    #[test]
    fn test_validate_non_empty_list() {
        assert!(validate_non_empty_list("filter.my_nations", &["Sweden".to_string()]).is_ok());
        assert!(matches!(
            validate_non_empty_list("filter.my_nations", &[]),
            Err(EtlError::MissingConfigError { .. })
        ));
        assert!(validate_non_empty_list("filter.my_nations", &["  ".to_string()]).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("watch.debounce_seconds", 2.0, 0.1, 60.0).is_ok());
        assert!(validate_range("watch.debounce_seconds", 0.0, 0.1, 60.0).is_err());
    }
}
