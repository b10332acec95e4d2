//! The end-to-end pipeline: one framed request in, one framed response out
//!
//! A strict sequence with no branching. Any stage failure aborts the
//! remaining stages; no partial response is ever written.

use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chrome::monitor::{self, MonitorOutcome};
use crate::chrome::ChromeSupervisor;
use crate::config::RunConfig;
use crate::error::{CookieFerryError, Result};
use crate::messaging::{self, Response};
use crate::store::decrypt::CookieDecryptor;
use crate::store::{CookieStoreReader, SqliteCookieRepository};

/// Run one invocation against the given streams.
pub async fn run<R: Read, W: Write>(input: &mut R, output: &mut W) -> Result<()> {
    let request = messaging::read_request(input)?;
    let config = RunConfig::from_request(&request)?;
    log::info!(
        "Starting login capture for {} (auth domain '{}')",
        config.url,
        config.auth_domain
    );

    let mut supervisor = ChromeSupervisor::new(
        config.chrome_exec_path.clone(),
        config.profile_seed_dir.clone(),
        config.work_profile_dir.clone(),
    )?;
    supervisor.start(&config.url)?;

    let outcome =
        monitor::wait_for_authentication(&mut supervisor, &config.url, &config.auth_domain).await;

    // Converge on a stopped browser before touching its cookie store, even
    // when the monitor failed.
    supervisor.stop();
    supervisor.wait().await?;
    let outcome = outcome?;
    supervisor.cleanup()?;

    let target_url = match outcome {
        MonitorOutcome::Settled { target_url } => target_url,
        MonitorOutcome::WindowClosed { last_url } => last_url.unwrap_or_else(|| config.url.clone()),
    };
    let host = target_url
        .host_str()
        .ok_or_else(|| {
            CookieFerryError::Validation(format!("final URL '{}' has no host", target_url))
        })?
        .to_string();

    let repository = SqliteCookieRepository::open(&config.cookie_store_path())?;
    let decryptor = CookieDecryptor::from_credential_store()?;
    let reader = CookieStoreReader::new(repository, decryptor);
    let cookies = reader.read_cookies(&host, unix_now()?)?;
    log::info!("Read {} cookies for {}", cookies.len(), host);

    let response = Response {
        target_url: target_url.to_string(),
        cookies,
    };
    messaging::write_response(output, &response)
}

fn unix_now() -> Result<i64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .map_err(|e| {
            CookieFerryError::Validation(format!("system clock is before the Unix epoch: {}", e))
        })
}
