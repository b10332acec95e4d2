//! Configuration management for cookieferry
//!
//! Turns a parsed request into the effective per-run configuration:
//! explicit overrides win, otherwise platform defaults derived from
//! well-known directories apply.

use std::path::PathBuf;

use url::Url;

use crate::error::{CookieFerryError, Result};
use crate::messaging::Request;
use crate::utils::FileUtils;

/// Location of the cookie database inside a profile directory.
pub const COOKIE_STORE_RELATIVE_PATH: &str = "Default/Cookies";

/// Effective configuration for one run. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub url: Url,
    pub auth_domain: String,
    pub chrome_exec_path: PathBuf,
    pub profile_seed_dir: PathBuf,
    pub work_profile_dir: PathBuf,
}

impl RunConfig {
    pub fn from_request(request: &Request) -> Result<Self> {
        if request.auth_domain.trim().is_empty() {
            return Err(CookieFerryError::Validation(
                "authDomain must not be blank".to_string(),
            ));
        }

        let url = Url::parse(&request.url).map_err(|e| {
            CookieFerryError::Validation(format!("invalid url '{}': {}", request.url, e))
        })?;
        if url.host_str().is_none() {
            return Err(CookieFerryError::Validation(format!(
                "url '{}' has no host",
                request.url
            )));
        }

        Ok(Self {
            url,
            auth_domain: request.auth_domain.clone(),
            chrome_exec_path: override_or(&request.chrome_exec_path, default_chrome_exec_path)?,
            profile_seed_dir: override_or(&request.chrome_data_dir_path, default_profile_seed_dir)?,
            work_profile_dir: override_or(&request.app_data_dir_path, default_work_profile_dir)?,
        })
    }

    /// The cookie database the run's browser wrote into.
    pub fn cookie_store_path(&self) -> PathBuf {
        self.work_profile_dir.join(COOKIE_STORE_RELATIVE_PATH)
    }
}

fn override_or(value: &str, default: fn() -> Result<PathBuf>) -> Result<PathBuf> {
    if value.is_empty() {
        default()
    } else {
        FileUtils::expand_path(value)
    }
}

#[cfg(target_os = "macos")]
fn default_profile_seed_dir() -> Result<PathBuf> {
    Ok(app_support_dir()?.join("Google/Chrome"))
}

#[cfg(target_os = "macos")]
fn default_work_profile_dir() -> Result<PathBuf> {
    Ok(app_support_dir()?.join("Cookieferry"))
}

#[cfg(target_os = "macos")]
fn default_chrome_exec_path() -> Result<PathBuf> {
    Ok(PathBuf::from(
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ))
}

#[cfg(target_os = "macos")]
fn app_support_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join("Library/Application Support"))
        .ok_or_else(|| {
            CookieFerryError::Validation("Cannot determine home directory".to_string())
        })
}

#[cfg(not(target_os = "macos"))]
fn default_profile_seed_dir() -> Result<PathBuf> {
    Ok(config_home()?.join("google-chrome"))
}

#[cfg(not(target_os = "macos"))]
fn default_work_profile_dir() -> Result<PathBuf> {
    Ok(config_home()?.join("cookieferry"))
}

#[cfg(not(target_os = "macos"))]
fn default_chrome_exec_path() -> Result<PathBuf> {
    Ok(PathBuf::from("/usr/bin/google-chrome"))
}

#[cfg(not(target_os = "macos"))]
fn config_home() -> Result<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .ok_or_else(|| {
            CookieFerryError::Validation("Cannot determine config directory".to_string())
        })
}
