// Process-scoped profile directory for the persistent browser context.

use std::io;
use std::path::Path;

use tempfile::TempDir;

/// Persistent-profile directory owned by the running process.
///
/// The browser's user-data directory is a process-wide filesystem resource:
/// created once at startup, writable only by the owning process, and removed
/// when this value drops on normal process exit. Exactly one live browser
/// context may use a given profile directory; pointing a second process at the
/// same directory is undefined behavior.
#[derive(Debug)]
pub struct ProfileDir {
    dir: TempDir,
}

impl ProfileDir {
    /// Create a fresh profile directory under the system temp root.
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("restock-profile-")
            .tempdir()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(dir.path())?.permissions();
            perms.set_mode(0o750);
            std::fs::set_permissions(dir.path(), perms)?;
        }

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
