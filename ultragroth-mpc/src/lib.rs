//! Operator entry points for an UltraGroth phase 2 ceremony. Each step reads
//! its inputs from disk and writes its output next to the final path,
//! renaming it into place only once the step has succeeded.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;
use ultragroth_phase2::Result;

mod compute;
mod verify;

pub use compute::{beacon, compute};
pub use verify::{verdict, verify, verify_transform};

const BUFFER_SIZE: usize = 1024 * 1024;

/// Log to stderr, filtered by `RUST_LOG` and defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::with_capacity(BUFFER_SIZE, File::open(path)?))
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

/// Run `write` against `<output>.partial`, then move it to `output`. On
/// failure the partial file is removed and `output` is left untouched.
fn write_output<T, F>(output: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T>,
{
    let partial = partial_path(output);

    let result = File::create(&partial)
        .map_err(Into::into)
        .and_then(|file| {
            let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);
            let value = write(&mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(value)
        });

    match result {
        Ok(value) => {
            fs::rename(&partial, output)?;
            Ok(value)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}
