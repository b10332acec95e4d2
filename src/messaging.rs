//! Native messaging codec for the extension IPC boundary
//!
//! Both directions carry `[4-byte length prefix][UTF-8 JSON payload]` over
//! the host process's stdin/stdout. The prefix is least-significant-byte
//! first, as sent by the extension host.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::cookie::Cookie;
use crate::error::{CookieFerryError, Result};

/// Authentication domain assumed when the extension predates the field.
pub const DEFAULT_AUTH_DOMAIN: &str = "okta.com";

/// One invocation's request. Immutable once parsed; unknown JSON fields are
/// ignored and missing optional fields default to empty, tolerating version
/// skew between host and extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub url: String,
    #[serde(default = "default_auth_domain")]
    pub auth_domain: String,
    /// Cookies already present in the destination jar. Sent by some
    /// extension versions; accepted and ignored here.
    #[serde(default)]
    pub existing_cookies: Vec<Cookie>,
    #[serde(default)]
    pub chrome_data_dir_path: String,
    #[serde(default)]
    pub app_data_dir_path: String,
    #[serde(default)]
    pub chrome_exec_path: String,
}

fn default_auth_domain() -> String {
    DEFAULT_AUTH_DOMAIN.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub target_url: String,
    pub cookies: Vec<Cookie>,
}

/// Read one framed request.
///
/// The length prefix is an unsigned 32-bit count; it is widened to u64
/// before conversion so a value with the high bit set is rejected
/// deterministically instead of wrapping negative.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let mut prefix = [0u8; 4];
    reader
        .read_exact(&mut prefix)
        .map_err(|e| CookieFerryError::InputFraming(format!("bad length prefix: {}", e)))?;

    let declared = u64::from(u32::from_le_bytes(prefix));
    if declared > i32::MAX as u64 {
        return Err(CookieFerryError::InputFraming(format!(
            "message length {} exceeds signed 32-bit capacity",
            declared
        )));
    }

    let mut payload = vec![0u8; declared as usize];
    reader
        .read_exact(&mut payload)
        .map_err(|e| CookieFerryError::InputFraming(format!("truncated payload: {}", e)))?;

    serde_json::from_slice(&payload)
        .map_err(|e| CookieFerryError::InputFraming(format!("invalid request JSON: {}", e)))
}

/// Write one framed response and flush.
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let payload = serde_json::to_vec(response).map_err(|e| {
        CookieFerryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    if payload.len() > i32::MAX as usize {
        return Err(CookieFerryError::InputFraming(format!(
            "response length {} exceeds signed 32-bit capacity",
            payload.len()
        )));
    }

    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}
