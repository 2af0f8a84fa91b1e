//! Atomic file replacement so readers never observe a half-written snapshot

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use taskmill_core::{Error, Result};
use uuid::Uuid;

/// Temporary sibling file that is removed unless it was renamed into place
struct PendingFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Replace `path` with `content` by writing a sibling temp file and renaming it
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(Error::configuration(format!(
                "invalid file path '{}': no parent directory",
                path.display()
            )))
        }
    };

    fs::create_dir_all(parent)
        .map_err(|e| Error::file_system(parent, "create parent directory", e))?;

    let mut pending = PendingFile {
        path: parent.join(format!(".{}.tmp", Uuid::new_v4())),
        committed: false,
    };

    let mut file = File::create(&pending.path)
        .map_err(|e| Error::file_system(&pending.path, "create temporary file", e))?;
    file.write_all(content)
        .map_err(|e| Error::file_system(&pending.path, "write temporary file", e))?;
    file.sync_all()
        .map_err(|e| Error::file_system(&pending.path, "sync temporary file", e))?;
    drop(file);

    fs::rename(&pending.path, path).map_err(|e| Error::file_system(path, "atomic rename", e))?;
    pending.committed = true;
    Ok(())
}
