//! Prints digests for filling in integrity allow-lists.

use std::path::PathBuf;

use anyhow::{Context, Result};
use util::hashing::sha256_hex;

/// Prints `<sha256>  <path>` for each file, in the format of `sha256sum`.
pub fn run(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        println!("{}  {}", sha256_hex(&bytes), path.display());
    }
    Ok(())
}
