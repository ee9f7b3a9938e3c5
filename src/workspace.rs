//! Temporary filesystem layout for a run.
//!
//! ```text
//! <root>/
//!   acceptance.yml            exporter config
//!   external/<day>/           task output, read by the exporter
//!   work/                     exporter work dir
//!     course-data/            must exist before the exporter starts
//!     validation/             downloaded + unpacked package
//!     gnupg/                  throwaway keyring (0700)
//! ```
//!
//! The root is removed when the `Workspace` drops unless `keep` was called.
//! Until then it is also registered with the process guard, so an interrupt
//! removes it too.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::Result;
use crate::process_guard::{ChildRegistry, lock_registry};

const CONFIG_FILE: &str = "acceptance.yml";

enum Root {
    Temporary(TempDir),
    Kept(PathBuf),
}

/// Owned scratch directories for one run.
pub struct Workspace {
    root: Root,
}

impl Workspace {
    /// Create a fresh temporary root with `external/` and `work/`.
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("export-acceptance-")
            .tempdir()?;
        lock_registry(&ChildRegistry::global()).register_cleanup_path(dir.path().to_path_buf());
        let workspace = Self {
            root: Root::Temporary(dir),
        };
        fs::create_dir_all(workspace.external_files_dir())?;
        fs::create_dir_all(workspace.working_dir())?;
        debug!("Created workspace at {}", workspace.root().display());
        Ok(workspace)
    }

    /// Disable cleanup; the directory survives the run.
    pub fn keep(&mut self) -> PathBuf {
        let path = self.root().to_path_buf();
        if let Root::Temporary(_) = self.root {
            let old = std::mem::replace(&mut self.root, Root::Kept(path.clone()));
            if let Root::Temporary(dir) = old {
                lock_registry(&ChildRegistry::global()).unregister_cleanup_path(dir.path());
                let _ = dir.keep();
            }
            info!("Workspace will be kept at {}", path.display());
        }
        path
    }

    pub fn root(&self) -> &Path {
        match &self.root {
            Root::Temporary(dir) => dir.path(),
            Root::Kept(path) => path,
        }
    }

    pub fn external_files_dir(&self) -> PathBuf {
        self.root().join("external")
    }

    pub fn working_dir(&self) -> PathBuf {
        self.root().join("work")
    }

    pub fn exporter_config_path(&self) -> PathBuf {
        self.root().join(CONFIG_FILE)
    }

    pub fn external_prefix_dir(&self, prefix: &str) -> PathBuf {
        self.external_files_dir().join(prefix)
    }

    pub fn course_data_dir(&self) -> PathBuf {
        self.working_dir().join("course-data")
    }

    pub fn validation_dir(&self) -> PathBuf {
        self.working_dir().join("validation")
    }

    pub fn gnupg_dir(&self) -> PathBuf {
        self.working_dir().join("gnupg")
    }

    /// Create `path` (and parents) and return it.
    pub fn ensure_dir(&self, path: PathBuf) -> Result<PathBuf> {
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Create the keyring directory; gpg refuses homedirs others can read.
    pub fn ensure_gnupg_dir(&self) -> Result<PathBuf> {
        let dir = self.ensure_dir(self.gnupg_dir())?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        Ok(dir)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Root::Temporary(dir) = &self.root {
            lock_registry(&ChildRegistry::global()).unregister_cleanup_path(dir.path());
        }
    }
}
