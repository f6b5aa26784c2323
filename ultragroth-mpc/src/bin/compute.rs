use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use ultragroth_mpc::{compute, init_tracing};
use ultragroth_phase2::format_hash;

/// Add your contribution to an UltraGroth phase 2 ceremony.
#[derive(Parser)]
#[command(name = "compute", version, about)]
struct Args {
    /// Key written by the previous participant
    #[arg(default_value = "params")]
    input: PathBuf,

    /// Where to write the key with your contribution
    #[arg(default_value = "new_params")]
    output: PathBuf,

    /// Name recorded next to your contribution
    #[arg(long)]
    name: Option<String>,

    /// Extra entropy mixed into the randomness; prompted for when omitted
    #[arg(long)]
    entropy: Option<String>,
}

fn prompt_entropy() -> io::Result<String> {
    print!("Type some random text and press [ENTER] to provide additional entropy: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let entropy = match args.entropy {
        Some(entropy) => entropy,
        None => match prompt_entropy() {
            Ok(entropy) => entropy,
            Err(e) => {
                error!("couldn't read entropy: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    match compute(&args.input, &args.output, &entropy, args.name.as_deref()) {
        Ok(hash) => {
            println!(
                "Done!\n\nYour contribution has been written to `{}`\n\n\
                 The contribution you made is bound to the following hash:{}",
                args.output.display(),
                format_hash(&hash, "")
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("contribution failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
