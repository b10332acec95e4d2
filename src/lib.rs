//! cookieferry - a native messaging host for moving Chrome session cookies
//!
//! This crate implements the host side of a browser-extension pipeline:
//! it receives a framed request over stdin, drives an isolated Chrome
//! instance through an interactive single-sign-on login, detects completion
//! through the DevTools protocol, decrypts the resulting cookie store, and
//! writes the portable cookie set back over stdout.

pub mod chrome;
pub mod cli;
pub mod config;
pub mod cookie;
pub mod error;
pub mod exit_code;
pub mod logging;
pub mod messaging;
pub mod pipeline;
pub mod store;
pub mod utils;

pub use error::{CookieFerryError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
