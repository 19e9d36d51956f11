/*!
 * Error types for the pipeline link
 */

use dp2_core_interface::ApiError;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, LinkError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum LinkError {
    /// The service is not reachable
    Connectivity(String),

    /// Malformed credential pair, or credentials rejected by the service
    Authentication(String),

    /// Request references something the script or queue does not know
    Validation(String),

    /// Well-formed call refused by the service; carried unchanged
    Remote(ApiError),

    /// A local service could not be brought up
    Startup(String),

    /// Configuration error
    Config(String),

    /// I/O error
    Io(io::Error),
}

impl LinkError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            LinkError::Connectivity(_)
            | LinkError::Authentication(_)
            | LinkError::Startup(_)
            | LinkError::Config(_) => EXIT_FATAL,
            _ => EXIT_FAILURE,
        }
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            LinkError::Connectivity(_) => ErrorCategory::Network,
            LinkError::Authentication(_) => ErrorCategory::Security,
            LinkError::Validation(_) => ErrorCategory::Validation,
            LinkError::Remote(_) => ErrorCategory::Service,
            LinkError::Startup(_) => ErrorCategory::Lifecycle,
            LinkError::Config(_) => ErrorCategory::Configuration,
            LinkError::Io(_) => ErrorCategory::IoError,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Security,
    Validation,
    /// Errors reported by the remote service
    Service,
    /// Local service startup
    Lifecycle,
    Configuration,
    IoError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Security => write!(f, "security"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Service => write!(f, "service"),
            ErrorCategory::Lifecycle => write!(f, "lifecycle"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::IoError => write!(f, "io"),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Connectivity(msg) => {
                write!(f, "Pipeline service unreachable: {}", msg)
            }
            LinkError::Authentication(msg) => {
                write!(f, "Authentication error: {}", msg)
            }
            LinkError::Validation(msg) => {
                write!(f, "Invalid request: {}", msg)
            }
            LinkError::Remote(err) => {
                write!(f, "{}", err)
            }
            LinkError::Startup(msg) => {
                write!(f, "Could not start the pipeline service: {}", msg)
            }
            LinkError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            LinkError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::Io(err) => Some(err),
            LinkError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for LinkError {
    fn from(err: io::Error) -> Self {
        LinkError::Io(err)
    }
}

impl From<ApiError> for LinkError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport(msg) => LinkError::Connectivity(msg),
            ApiError::Unauthorized(msg) => LinkError::Authentication(msg),
            other => LinkError::Remote(other),
        }
    }
}
