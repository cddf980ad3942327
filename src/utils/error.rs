use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::XlsxError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Base64 decoding error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("{endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Authentication,
    Provider,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code used by the CLIs.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl RelayError {
    pub fn config(message: impl Into<String>) -> Self {
        RelayError::ConfigError {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        RelayError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::ValidationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::ConfigError { .. }
            | RelayError::ConfigValidationError { .. }
            | RelayError::MissingConfigError { .. }
            | RelayError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            RelayError::HttpError(_) => ErrorCategory::Network,
            RelayError::AuthError { .. } => ErrorCategory::Authentication,
            RelayError::ApiError { status, .. } if *status == 401 || *status == 403 => {
                ErrorCategory::Authentication
            }
            RelayError::ApiError { .. } => ErrorCategory::Provider,
            RelayError::CsvError(_)
            | RelayError::SpreadsheetError(_)
            | RelayError::SerializationError(_)
            | RelayError::DecodeError(_)
            | RelayError::ProcessingError { .. }
            | RelayError::ValidationError { .. } => ErrorCategory::Data,
            RelayError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Provider => match self {
                RelayError::ApiError { status, .. } if *status == 429 || *status >= 500 => {
                    ErrorSeverity::Medium
                }
                _ => ErrorSeverity::High,
            },
            ErrorCategory::Data | ErrorCategory::Authentication => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check relay.toml and make sure every ${VAR} it references is exported"
            }
            ErrorCategory::Network => "Check network connectivity; the next scheduled run will try again",
            ErrorCategory::Authentication => {
                "Verify the API key or the Azure credentials and mailbox permissions"
            }
            ErrorCategory::Provider => "Inspect the provider response body in the log output",
            ErrorCategory::Data => {
                "Verify the spreadsheet headers and cell formats against the campaign columns"
            }
            ErrorCategory::System => "Check file permissions and free disk space for the output path",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not reach a remote service: {}", self),
            ErrorCategory::Authentication => format!("Access was denied: {}", self),
            ErrorCategory::Provider => format!("The remote service rejected a request: {}", self),
            ErrorCategory::Data => format!("The input data could not be processed: {}", self),
            ErrorCategory::System => format!("Local system error: {}", self),
        }
    }
}
