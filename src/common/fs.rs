use std::{fs::{self, File}, io::Read, path::Path};

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() { bail!("[common::fs] path exists but is not a directory: {}", path.display()); }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("[common::fs] failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Create the parent directory of a file about to be written.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Hex sha256 of a file's contents.
pub(crate) fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("[common::fs] open for hash {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1 << 16];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 { break }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
