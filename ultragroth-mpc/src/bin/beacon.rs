use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use ultragroth_mpc::{beacon, init_tracing};
use ultragroth_phase2::format_hash;

/// Finalize an UltraGroth phase 2 ceremony with a public random beacon.
#[derive(Parser)]
#[command(name = "beacon", version, about)]
struct Args {
    /// Key written by the last participant
    #[arg(default_value = "params")]
    input: PathBuf,

    /// Where to write the finalized key
    #[arg(default_value = "new_params")]
    output: PathBuf,

    /// Beacon value, hex encoded
    #[arg(long)]
    beacon_hash: String,

    /// The beacon value is hashed 2^exp times
    #[arg(long, default_value_t = 10)]
    iterations_exp: u32,

    /// Name recorded next to the beacon contribution
    #[arg(long)]
    name: Option<String>,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match beacon(
        &args.input,
        &args.output,
        args.name.as_deref(),
        &args.beacon_hash,
        args.iterations_exp,
    ) {
        Ok(hash) => {
            println!(
                "Done!\n\nThe beacon contribution has been written to `{}`\n\n\
                 It is bound to the following hash:{}",
                args.output.display(),
                format_hash(&hash, "")
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("beacon failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
