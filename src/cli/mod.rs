//! Process entry point
//!
//! A native messaging host is launched by the browser with the extension
//! origin as its first argument (and, on some platforms, a window handle).
//! Those arguments identify the caller; all real input arrives framed on
//! stdin.

use clap::{Arg, Command};

use crate::error::{CookieFerryError, Result};
use crate::exit_code::exit_code_for_error;
use crate::logging;
use crate::pipeline;

/// Main entry point for the host process.
pub fn run() {
    logging::init();

    let matches = create_app().get_matches();
    if let Some(origin) = matches.get_one::<String>("origin") {
        log::debug!("Invoked by extension origin {}", origin);
    }

    match execute() {
        Ok(()) => {}
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(exit_code_for_error(&e));
        }
    }
}

fn execute() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().map_err(CookieFerryError::Io)?;
    runtime.block_on(async {
        let mut stdin = std::io::stdin().lock();
        let mut stdout = std::io::stdout().lock();
        pipeline::run(&mut stdin, &mut stdout).await
    })
}

/// Create the CLI application structure
fn create_app() -> Command {
    Command::new("cookieferry")
        .version(crate::VERSION)
        .about("Native messaging host that moves Chrome SSO session cookies into another browser")
        .arg(
            Arg::new("origin")
                .help("Extension origin the browser passes when launching the host")
                .required(false)
                .index(1),
        )
        .arg(
            Arg::new("parent-window")
                .long("parent-window")
                .value_name("HANDLE")
                .help("Window handle some browsers pass; accepted and unused")
                .required(false),
        )
}
