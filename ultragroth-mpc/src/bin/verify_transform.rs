use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use ultragroth_mpc::{init_tracing, verify_transform};
use ultragroth_phase2::{format_hash, Verification};

/// Check that a key is its predecessor plus exactly one valid contribution.
#[derive(Parser)]
#[command(name = "verify_transform", version, about)]
struct Args {
    #[arg(default_value = "params")]
    old: PathBuf,

    #[arg(default_value = "new_params")]
    new: PathBuf,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match verify_transform(&args.old, &args.new) {
        Ok(Verification::Valid(trail)) => {
            if let Some(latest) = trail.contributions.first() {
                println!("{}", format_hash(&latest.hash, "Valid contribution, bound to hash:"));
            }
            ExitCode::SUCCESS
        }
        Ok(Verification::Invalid(failure)) => {
            println!("invalid transformation: {}", failure);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("verification aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
