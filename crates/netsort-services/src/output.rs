//! Sorted output sink.
//!
//! Writes are atomic: temp file, fsync, rename. A reader never sees a
//! half-written output file.

use std::fs;
use std::io::Write;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Persist `data` verbatim at `path`.
pub fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output dir: {}", parent.display()))?;
    }

    let tmp_path = temp_path(path);
    {
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
        file.write_all(data).context("failed to write output")?;
        file.sync_all().context("failed to sync output to disk")?;
    }

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    tracing::debug!(path = %path.display(), bytes = data.len(), "output written");
    Ok(())
}

/// `<path>.tmp`, keeping any existing extension so sibling outputs that
/// differ only by extension never share a temp file.
fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
