use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::NamedTempFile;

/// `rw-------`, used for files that carry tokens or launch claims.
pub const OWNER_ONLY: u32 = 0o600;

const DEFAULT_MODE: u32 = 0o644;

/// Replaces `path` with `bytes` via a temp file in the same directory.
///
/// Readers see either the previous content or the new content, never a
/// partial write. With `mode` unset the previous file's permissions carry
/// over (new files get `0644`).
pub fn write_atomic(path: &Path, bytes: &[u8], mode: Option<u32>) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mode = match mode {
        Some(mode) => mode,
        None => match fs::metadata(path) {
            Ok(meta) => meta.permissions().mode() & 0o7777,
            Err(err) if err.kind() == io::ErrorKind::NotFound => DEFAULT_MODE,
            Err(err) => return Err(err),
        },
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), Permissions::from_mode(mode))?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
