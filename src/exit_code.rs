use crate::error::CookieFerryError;

/// Stable process exit codes per error kind. The wire protocol carries no
/// structured error payload, so the exit code is the only machine-readable
/// failure signal the invoking extension host sees.
pub fn exit_code_for_error(err: &CookieFerryError) -> i32 {
    match err {
        CookieFerryError::Validation(_) => 2,
        CookieFerryError::DebuggingConnect(_) => 7,
        CookieFerryError::Io(_) => 23,
        CookieFerryError::AuthenticationTimeout(_) => 28,
        CookieFerryError::StoreEmpty(_) => 43,
        CookieFerryError::Store(_) => 44,
        CookieFerryError::InputFraming(_) => 65,
        CookieFerryError::Decryption(_) => 66,
        CookieFerryError::ProcessLaunch(_) => 71,
    }
}
