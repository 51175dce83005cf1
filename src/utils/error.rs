use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApexError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("No session loaded")]
    SessionNotLoaded,

    #[error("Session data missing: {message}")]
    MissingDataError { message: String },

    #[error("Unknown compound: {0}")]
    UnknownCompound(String),

    #[error("Not enough data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Container engine is not reachable: {message}")]
    EngineUnavailable { message: String },

    #[error("Container command '{command}' failed with status {status}")]
    ContainerCommandFailed { command: String, status: i32 },

    #[error("Health check against {url} failed after {attempts} attempts")]
    HealthCheckFailed { url: String, attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Data,
    Analysis,
    Container,
    Network,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ApexError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApexError::ConfigValidationError { .. }
            | ApexError::InvalidConfigValueError { .. }
            | ApexError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ApexError::CsvError(_)
            | ApexError::SerializationError(_)
            | ApexError::SessionNotLoaded
            | ApexError::MissingDataError { .. } => ErrorCategory::Data,
            ApexError::UnknownCompound(_)
            | ApexError::InsufficientData { .. }
            | ApexError::ProcessingError { .. } => ErrorCategory::Analysis,
            ApexError::EngineUnavailable { .. } | ApexError::ContainerCommandFailed { .. } => {
                ErrorCategory::Container
            }
            ApexError::HttpError(_) | ApexError::HealthCheckFailed { .. } => {
                ErrorCategory::Network
            }
            ApexError::ZipError(_) | ApexError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ApexError::InsufficientData { .. } => ErrorSeverity::Low,
            ApexError::HttpError(_) | ApexError::HealthCheckFailed { .. } => {
                ErrorSeverity::Medium
            }
            ApexError::IoError(_) | ApexError::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Process exit status for the CLI.
    pub fn exit_code(&self) -> i32 {
        if let ApexError::EngineUnavailable { .. } = self {
            return 1;
        }
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ApexError::EngineUnavailable { .. } => {
                "Start Docker Desktop (or the docker daemon) and run the launcher again".to_string()
            }
            ApexError::ContainerCommandFailed { command, .. } => {
                format!("Run '{}' manually to inspect the container engine output", command)
            }
            ApexError::HealthCheckFailed { .. } => {
                "Check the container logs; the dashboard may still be warming up".to_string()
            }
            ApexError::SessionNotLoaded => {
                "Load a session first (see --year, --gp and --session)".to_string()
            }
            ApexError::MissingDataError { .. } | ApexError::CsvError(_) => {
                "Verify the session cache directory contains laps.csv, results.csv, weather.csv and telemetry.csv".to_string()
            }
            ApexError::UnknownCompound(_) => {
                "Use one of SOFT, MEDIUM or HARD".to_string()
            }
            ApexError::InsufficientData { .. } => {
                "Pick a session or driver with more clean laps".to_string()
            }
            ApexError::ConfigValidationError { field, .. }
            | ApexError::InvalidConfigValueError { field, .. }
            | ApexError::MissingConfigError { field } => {
                format!("Fix '{}' in the configuration file", field)
            }
            ApexError::HttpError(_) => "Check network connectivity and the target URL".to_string(),
            ApexError::IoError(_) | ApexError::ZipError(_) => {
                "Check file permissions and free disk space".to_string()
            }
            ApexError::SerializationError(_) | ApexError::ProcessingError { .. } => {
                "Re-run with --verbose for details".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Data => format!("Session data problem: {}", self),
            ErrorCategory::Analysis => format!("Analysis could not complete: {}", self),
            ErrorCategory::Container => format!("Container problem: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::System => format!("System problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApexError>;
