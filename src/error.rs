//! Error types for the toolflow library.
//!
//! A single enum, [`ToolflowError`], covers every failure the workflow can
//! produce. Each variant belongs to exactly one [`ErrorKind`]:
//!
//! * **Validation** — bad file type or size, too few files, a missing or
//!   malformed option. Caught before any network call.
//! * **Transport** — network failure, timeout, non-2xx status, unreadable body.
//! * **Application** — the backend answered `success: false`.
//! * **Internal** — configuration and local I/O problems.
//!
//! None of these is fatal to a [`crate::controller::ToolController`]: after any
//! error the controller is back in a retryable phase and the view has been
//! handed a user-visible notice built from [`ToolflowError::user_message`].

use std::path::PathBuf;
use thiserror::Error;

/// Message shown when the backend rejects a job without saying why.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Processing failed";

/// Coarse error category used by views to pick wording and styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Application,
    Internal,
}

/// All errors returned by the toolflow library.
#[derive(Debug, Error)]
pub enum ToolflowError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The file's type is not on the tool's allow-list.
    #[error("'{name}' is not a supported file type ({detected})")]
    UnsupportedFileType { name: String, detected: String },

    /// The file exceeds the tool's size ceiling.
    #[error("'{name}' is too large ({size} bytes). Maximum size is {max} bytes")]
    FileTooLarge { name: String, size: u64, max: u64 },

    /// Fewer files selected than the tool needs.
    #[error("Please select at least {required} file(s) ({selected} selected)")]
    NotEnoughFiles { required: usize, selected: usize },

    /// More files selected than the tool accepts.
    #[error("At most {max} file(s) can be processed at once ({selected} selected)")]
    TooManyFiles { max: usize, selected: usize },

    /// A required option has no value.
    #[error("Option '{name}' is required")]
    MissingOption { name: String },

    /// An option value could not be parsed or is not one of the allowed values.
    #[error("Invalid value '{value}' for option '{name}': {reason}")]
    InvalidOptionValue {
        name: String,
        value: String,
        reason: String,
    },

    /// No tool with this identifier exists in the catalog.
    #[error("Unknown tool '{id}'")]
    UnknownTool { id: String },

    /// A local file could not be read during intake.
    #[error("Cannot read '{path}': {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The request never produced an HTTP response.
    #[error("Request to '{endpoint}' failed: {reason}")]
    Network { endpoint: String, reason: String },

    /// The request did not finish within the configured timeout.
    #[error("Request to '{endpoint}' timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The backend answered HTTP 429.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// A 2xx response whose body is not the expected JSON object.
    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },

    // ── Application errors ────────────────────────────────────────────────
    /// The backend answered `success: false`.
    #[error("{message}")]
    Rejected { message: String },

    // ── Internal errors ───────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fetching a result file failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Could not create or write a downloaded file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ToolflowError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolflowError::UnsupportedFileType { .. }
            | ToolflowError::FileTooLarge { .. }
            | ToolflowError::NotEnoughFiles { .. }
            | ToolflowError::TooManyFiles { .. }
            | ToolflowError::MissingOption { .. }
            | ToolflowError::InvalidOptionValue { .. }
            | ToolflowError::UnknownTool { .. }
            | ToolflowError::FileUnreadable { .. } => ErrorKind::Validation,
            ToolflowError::Network { .. }
            | ToolflowError::Timeout { .. }
            | ToolflowError::HttpStatus { .. }
            | ToolflowError::RateLimited { .. }
            | ToolflowError::MalformedResponse { .. } => ErrorKind::Transport,
            ToolflowError::Rejected { .. } => ErrorKind::Application,
            ToolflowError::InvalidConfig(_)
            | ToolflowError::DownloadFailed { .. }
            | ToolflowError::OutputWriteFailed { .. } => ErrorKind::Internal,
        }
    }

    /// Whether a resubmission with the same inputs could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Application)
    }

    /// Text for the user-visible notification.
    ///
    /// Validation messages are specific to the rule that failed; server
    /// rejections are passed through verbatim; transport failures get a
    /// generic lead-in followed by the detail.
    pub fn user_message(&self) -> String {
        match self {
            ToolflowError::FileTooLarge { name, max, .. } => format!(
                "File {} is too large. Maximum size is {}",
                name,
                crate::intake::format_file_size(*max)
            ),
            ToolflowError::UnsupportedFileType { name, .. } => {
                format!("File {} is not a supported file type", name)
            }
            ToolflowError::Rejected { message } => message.clone(),
            ToolflowError::RateLimited {
                retry_after_secs: Some(secs),
            } => format!("Rate limit exceeded. Please try again in {} seconds.", secs),
            ToolflowError::RateLimited { .. } => {
                "Rate limit exceeded. Please try again in a minute.".to_string()
            }
            e if e.kind() == ErrorKind::Transport => {
                format!("Processing failed. Please try again. ({})", e)
            }
            e => e.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ToolflowError>;
