//! Utility functions and helpers

use crate::error::{CookieFerryError, Result};
use std::path::PathBuf;
use url::Url;

/// URL helpers shared by the monitor and pipeline
pub struct UrlUtils;

impl UrlUtils {
    /// Substring host match, the way the completion heuristic and the
    /// cookie query both scope themselves: `login.example.com` contains
    /// `example.com`, and a URL without a host matches nothing.
    pub fn host_contains(url: &Url, needle: &str) -> bool {
        url.host_str()
            .map(|host| host.contains(needle))
            .unwrap_or(false)
    }
}

/// File system utilities
pub struct FileUtils;

impl FileUtils {
    /// Expand tilde (~) in file paths
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if path.starts_with('~') {
            if let Some(home_dir) = dirs::home_dir() {
                Ok(home_dir.join(path.trim_start_matches('~').trim_start_matches('/')))
            } else {
                Err(CookieFerryError::Validation(
                    "Cannot determine home directory".to_string(),
                ))
            }
        } else {
            Ok(PathBuf::from(path))
        }
    }
}
