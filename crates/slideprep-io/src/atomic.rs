//! Whole-file replacement for artifacts whose mere existence is
//! meaningful (cached scripts, the provenance sentinel).
//!
//! Contents go to a temporary file in the destination directory, which
//! is then renamed over the destination. A crash or write error leaves
//! either the previous file or no file, never a truncated one.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Atomically replace `path` with `contents`.
///
/// The parent directory must exist. On failure the temporary file is
/// removed and `path` is untouched.
pub fn write(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_ref())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
