//! Error types
//!
//! Two families matter to callers:
//! - Not-Found: absence is a valid outcome and is turned into `None` or an
//!   empty list at the boundary that observes it.
//! - Transport/Fault: unreachable source, bad status, malformed body,
//!   authorization failure.

use thiserror::Error;

/// Gateway code for "query returned no rows".
pub const NO_ROWS: &str = "PGRST116";
/// Gateway code for constraint violations (duplicate key and the like).
pub const CONSTRAINT: &str = "23505";
/// Gateway code for anything the store did not classify.
pub const INTERNAL: &str = "XX000";

/// Failure reported by the article source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("article not found")]
    NotFound,
    #[error("article source returned status {0}")]
    Status(u16),
    #[error("article source unreachable: {0}")]
    Transport(String),
    #[error("malformed article payload: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Structured failure from the content gateway, carrying a machine-readable code.
#[derive(Debug, Error)]
#[error("gateway error {code}: {message}")]
pub struct GatewayError {
    pub code: String,
    pub message: String,
}

impl GatewayError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_no_rows(&self) -> bool {
        self.code == NO_ROWS
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::new(NO_ROWS, "no rows returned"),
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::new(CONSTRAINT, msg.unwrap_or_else(|| code.to_string()))
            }
            other => Self::new(INTERNAL, other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(INTERNAL, format!("column decode failed: {}", err))
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Turns a "no rows" failure into `Ok(None)`, leaving every other failure intact.
pub trait OptionalRow<T> {
    fn optional_row(self) -> GatewayResult<Option<T>>;
}

impl<T> OptionalRow<T> for GatewayResult<T> {
    fn optional_row(self) -> GatewayResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_no_rows() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Sign-in, sign-up and gating failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("your account has been banned")]
    Banned,
    #[error("admin access required")]
    AdminRequired,
    #[error("username already exists")]
    UsernameTaken,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
