//! Chrome process supervision
//!
//! Launches the browser against an isolated work profile, stops it, and
//! clears the transient session state between runs.

pub mod cdp;
pub mod monitor;

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use tokio::process::{Child, Command};
use url::Url;

use crate::error::{CookieFerryError, Result};

/// Entries whose names carry live IPC sockets from a previous run; copying
/// them into the work profile breaks the next launch.
const SOCKET_MARKER: &str = "Socket";

/// Tab-restore state the browser writes under the work profile.
const SESSIONS_SUBDIR: &str = "Default/Sessions";

/// Owns the browser subprocess for one run. The work profile directory is
/// exclusively this supervisor's for the duration.
pub struct ChromeSupervisor {
    exec_path: PathBuf,
    profile_seed_dir: PathBuf,
    work_dir: PathBuf,
    debug_port: u16,
    child: Option<Child>,
}

impl ChromeSupervisor {
    /// Reserves the remote-debugging port up front so the launch arguments
    /// are fixed before the process exists.
    pub fn new(exec_path: PathBuf, profile_seed_dir: PathBuf, work_dir: PathBuf) -> Result<Self> {
        let debug_port = reserve_ephemeral_port()?;
        Ok(Self {
            exec_path,
            profile_seed_dir,
            work_dir,
            debug_port,
            child: None,
        })
    }

    pub fn debug_port(&self) -> u16 {
        self.debug_port
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Seed the work profile if it does not exist yet, then launch the
    /// browser in kiosk mode with remote debugging on the reserved port.
    pub fn start(&mut self, url: &Url) -> Result<()> {
        if !self.work_dir.exists() {
            copy_profile_seed(&self.profile_seed_dir, &self.work_dir)?;
        }

        log::info!(
            "Launching {:?} with profile {:?} on debug port {}",
            self.exec_path,
            self.work_dir,
            self.debug_port
        );
        let child = Command::new(&self.exec_path)
            .arg(format!("--user-data-dir={}", self.work_dir.display()))
            .arg("--disable-features=InfiniteSessionRestore")
            .arg("--hide-crash-restore-bubble")
            .arg("--kiosk")
            .arg(format!("--remote-debugging-port={}", self.debug_port))
            .arg(url.as_str())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CookieFerryError::ProcessLaunch(format!(
                    "failed to launch {:?}: {}",
                    self.exec_path, e
                ))
            })?;
        self.child = Some(child);
        Ok(())
    }

    /// Terminate the subprocess if it is still running. Safe to call when
    /// the process has already exited, and safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.start_kill() {
                log::debug!("Browser already stopped: {}", e);
            }
        }
    }

    /// Block until the subprocess has exited.
    pub async fn wait(&mut self) -> Result<()> {
        if let Some(child) = self.child.as_mut() {
            child.wait().await.map_err(|e| {
                CookieFerryError::ProcessLaunch(format!("failed to await browser exit: {}", e))
            })?;
        }
        Ok(())
    }

    /// Delete and recreate the session-restore state so neither the next
    /// run nor a plain launch of this profile offers to restore the tabs
    /// captured during this run. Must only run after `stop` has returned.
    pub fn cleanup(&self) -> Result<()> {
        let sessions = self.work_dir.join(SESSIONS_SUBDIR);
        if sessions.exists() {
            fs::remove_dir_all(&sessions)?;
        }
        fs::create_dir_all(&sessions)?;
        Ok(())
    }
}

fn reserve_ephemeral_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Recursive profile copy, skipping socket entries. Symlinks and other
/// special files are skipped too.
fn copy_profile_seed(seed: &Path, work: &Path) -> Result<()> {
    fs::create_dir_all(work)?;
    for entry in fs::read_dir(seed)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().contains(SOCKET_MARKER) {
            continue;
        }
        let source = entry.path();
        let dest = work.join(&name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_profile_seed(&source, &dest)?;
        } else if file_type.is_file() {
            fs::copy(&source, &dest)?;
        }
    }
    Ok(())
}
