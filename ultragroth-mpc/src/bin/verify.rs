use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use ultragroth_mpc::{init_tracing, verdict, verify};

/// Verify an UltraGroth key against the initial key of its ceremony.
#[derive(Parser)]
#[command(name = "verify", version, about)]
struct Args {
    /// Initial key, before any contribution
    init: PathBuf,

    /// Powers of tau file the initial key was built from
    reference: PathBuf,

    /// Key to verify
    key: PathBuf,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match verify(&args.init, &args.reference, &args.key) {
        Ok(verification) => {
            println!("{}", verdict(&verification));
            if verification.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("verification aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
