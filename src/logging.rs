//! Logging initialization utilities.

use env_logger::Env;

/// Initialize logging with a default filter level.
///
/// Output goes to stderr only; stdout belongs to the native messaging
/// channel and must carry nothing but framed responses.
pub fn init() {
    let env = Env::default().default_filter_or("info");
    env_logger::Builder::from_env(env).init();
}
