//! Error types for background composition operations

use std::fmt;
use thiserror::Error;

/// Result type alias for composition operations
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Which source image a fetch or decode failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSide {
    /// The cut-out foreground image
    Subject,
    /// The image the subject is placed on
    Background,
}

impl fmt::Display for ImageSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject => write!(f, "subject"),
            Self::Background => write!(f, "background"),
        }
    }
}

/// Pipeline stage an error surfaced from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    Lookup,
    Credits,
    Search,
    Fetch,
    Decode,
    Persist,
    Internal,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Lookup => "lookup",
            Self::Credits => "credits",
            Self::Search => "search",
            Self::Fetch => "fetch",
            Self::Decode => "decode",
            Self::Persist => "persist",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Error taxonomy for background composition
#[derive(Error, Debug)]
pub enum ComposeError {
    /// Malformed identifiers or parameters
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Image record or preset background does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Image belongs to another user
    #[error("Unauthorized user: {0}")]
    Authorization(String),

    /// A prerequisite step has not been performed yet
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Balance cannot cover a generated background
    #[error("Insufficient credits for user {user_id}")]
    InsufficientCredits { user_id: String },

    /// Source image unreachable or answered with a non-success status
    #[error("Failed to fetch {side} image: {message}")]
    Fetch { side: ImageSide, message: String },

    /// Search index or asset host answered with a failure
    #[error("Upstream error from {service}: {message}")]
    Upstream { service: String, message: String },

    /// Search returned zero candidates for the prompt
    #[error("No backgrounds found for query '{query}'")]
    NoResults { query: String },

    /// Bytes are not a supported raster image, or pixel processing failed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Upload of the composite or record update failed
    #[error("Failed to persist composite: {0}")]
    Persist(String),

    /// Unexpected conditions (task join failures and similar)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ComposeError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new not-found error for the named entity
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a new authorization error
    pub fn authorization<S: Into<String>>(msg: S) -> Self {
        Self::Authorization(msg.into())
    }

    /// Create a new precondition error
    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn insufficient_credits<S: Into<String>>(user_id: S) -> Self {
        Self::InsufficientCredits {
            user_id: user_id.into(),
        }
    }

    /// Create a fetch error naming the failing side
    pub fn fetch<S: Into<String>>(side: ImageSide, msg: S) -> Self {
        Self::Fetch {
            side,
            message: msg.into(),
        }
    }

    /// Create an upstream error naming the failing service
    pub fn upstream<S: Into<String>, M: Into<String>>(service: S, msg: M) -> Self {
        Self::Upstream {
            service: service.into(),
            message: msg.into(),
        }
    }

    pub fn no_results<S: Into<String>>(query: S) -> Self {
        Self::NoResults {
            query: query.into(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    pub fn persist<S: Into<String>>(msg: S) -> Self {
        Self::Persist(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    // Enhanced contextual error creators

    /// Create decode error with processing step context
    pub fn decode_stage_error(step: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Decode(format!(
            "Processing failed at step '{}'{}: {}",
            step, input_context, details
        ))
    }

    /// Create parameter error with valid ranges
    pub fn parameter_value_error<T: fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::Validation(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Pipeline stage this error belongs to
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Validation(_) => Stage::Validation,
            Self::NotFound(_) | Self::Authorization(_) | Self::Precondition(_) => Stage::Lookup,
            Self::InsufficientCredits { .. } => Stage::Credits,
            Self::Upstream { .. } | Self::NoResults { .. } => Stage::Search,
            Self::Fetch { .. } => Stage::Fetch,
            Self::Decode(_) => Stage::Decode,
            Self::Persist(_) => Stage::Persist,
            Self::Internal(_) => Stage::Internal,
        }
    }

    /// Whether repeating the whole call unchanged may succeed
    ///
    /// Only transient network/provider failures qualify. No credit has been
    /// charged when any of these surface.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Upstream { .. } | Self::Persist(_)
        )
    }

    /// Stable HTTP status for handlers in front of the orchestrator
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Precondition(_) => 400,
            Self::InsufficientCredits { .. } => 402,
            Self::Authorization(_) => 403,
            Self::NotFound(_) => 404,
            Self::NoResults { .. } => 422,
            Self::Fetch { .. } | Self::Upstream { .. } => 502,
            Self::Decode(_) | Self::Persist(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<image::ImageError> for ComposeError {
    fn from(error: image::ImageError) -> Self {
        Self::Decode(error.to_string())
    }
}

impl From<tokio::task::JoinError> for ComposeError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Internal(format!("compose task failed: {}", error))
    }
}
