//! Error handling for cookieferry

use thiserror::Error;

/// Main error type for cookieferry operations.
///
/// Every kind is fatal to the current invocation: each one reflects either a
/// programming/configuration error or an external state (abandoned login,
/// store not yet populated) that a retry without user action cannot fix.
#[derive(Error, Debug)]
pub enum CookieFerryError {
    #[error("Bad input framing: {0}")]
    InputFraming(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Failed to launch browser: {0}")]
    ProcessLaunch(String),

    #[error("DevTools connection error: {0}")]
    DebuggingConnect(String),

    #[error("Authentication did not complete within {0} seconds")]
    AuthenticationTimeout(u64),

    #[error("No live cookies for host: {0}")]
    StoreEmpty(String),

    #[error("Cookie decryption failed: {0}")]
    Decryption(String),

    #[error("Cookie store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for cookieferry operations
pub type Result<T> = std::result::Result<T, CookieFerryError>;
