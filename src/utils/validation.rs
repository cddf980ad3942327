use crate::utils::error::{RelayError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(RelayError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    let extension = std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if allowed_extensions.contains(&ext.as_str()) => Ok(()),
        Some(ext) => Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                ext,
                allowed_extensions.join(", ")
            ),
        }),
        None => Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: "File has no extension or invalid filename".to_string(),
        }),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| RelayError::MissingConfigError {
        field: field_name.to_string(),
    })
}

/// Rejects empty values and `${VAR}` placeholders whose variable was not exported.
pub fn validate_secret(field_name: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() || (trimmed.starts_with("${") && trimmed.ends_with('}')) {
        return Err(RelayError::MissingConfigError {
            field: field_name.to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    if value.contains("${") {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value references an environment variable that is not set".to_string(),
        });
    }
    Ok(())
}

pub fn validate_unique<'a, I>(field_name: &str, values: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(RelayError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: value.to_string(),
                reason: "Value must be unique".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("trengo.base_url", "https://app.trengo.com/api/v2").is_ok());
        assert!(validate_url("trengo.base_url", "http://127.0.0.1:8080").is_ok());
        assert!(validate_url("trengo.base_url", "").is_err());
        assert!(validate_url("trengo.base_url", "invalid-url").is_err());
        assert!(validate_url("trengo.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_secret_rejects_unresolved_placeholder() {
        assert!(validate_secret("trengo.api_key", "abc123").is_ok());
        assert!(validate_secret("trengo.api_key", "   ").is_err());
        let err = validate_secret("trengo.api_key", "${TRENGO_API_KEY}").unwrap_err();
        assert!(matches!(err, RelayError::MissingConfigError { field } if field == "trengo.api_key"));
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("source.path", "planning.xlsx", &["xlsx", "csv"]).is_ok());
        assert!(validate_file_extension("source.path", "PLANNING.XLSX", &["xlsx", "csv"]).is_ok());
        assert!(validate_file_extension("source.path", "planning.txt", &["xlsx", "csv"]).is_err());
        assert!(validate_file_extension("source.path", "planning", &["xlsx", "csv"]).is_err());
    }

    #[test]
    fn test_validate_unique() {
        assert!(validate_unique("campaigns.name", ["a", "b"]).is_ok());
        assert!(validate_unique("campaigns.name", ["a", "b", "a"]).is_err());
    }
}
