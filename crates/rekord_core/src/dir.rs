//! Database directory management.
//!
//! ```text
//! <db_path>/
//! ├─ MANIFEST        # Revision, table fingerprints and id counters
//! ├─ LOCK            # Advisory lock for single-process access
//! └─ tables/
//!    └─ <name>.seg   # Append-only segment per table
//! ```

use crate::error::{CoreError, CoreResult};
use crate::manifest::Manifest;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the manifest file.
pub const MANIFEST_FILE: &str = "MANIFEST";
/// Name of the lock file.
pub const LOCK_FILE: &str = "LOCK";
/// Directory holding table segments.
pub const TABLES_DIR: &str = "tables";
/// Extension of segment files.
pub const SEGMENT_EXT: &str = "seg";

const MANIFEST_TEMP: &str = "MANIFEST.tmp";

/// An open database directory holding the exclusive lock.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory and locks it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the directory is missing and
    /// `create_if_missing` is false, `DatabaseLocked` if another process
    /// holds the lock, or an I/O error.
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        fs::create_dir_all(path.join(TABLES_DIR))?;

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the manifest path.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Returns the segment path for a table.
    #[must_use]
    pub fn segment_path(&self, table: &str) -> PathBuf {
        self.path
            .join(TABLES_DIR)
            .join(format!("{table}.{SEGMENT_EXT}"))
    }

    /// Loads the manifest, or `None` for a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn load_manifest(&self) -> CoreResult<Option<Manifest>> {
        let manifest_path = self.manifest_path();
        if !manifest_path.exists() {
            return Ok(None);
        }

        let data = fs::read(&manifest_path)?;
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(Manifest::decode(&data)?))
    }

    /// Saves the manifest by writing a temporary file and renaming it over
    /// the old one, then syncing the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails; the previous manifest stays valid.
    pub fn save_manifest(&self, manifest: &Manifest) -> CoreResult<()> {
        let temp_path = self.path.join(MANIFEST_TEMP);
        let data = manifest.encode()?;

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.manifest_path())?;
        sync_dir(&self.path)
    }

    /// Lists the table names that have a segment file.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables directory cannot be read.
    pub fn segment_names(&self) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.path.join(TABLES_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Deletes a table's segment file. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove_segment(&self, table: &str) -> CoreResult<bool> {
        let path = self.segment_path(table);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        sync_dir(&self.path.join(TABLES_DIR))?;
        Ok(true)
    }
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> CoreResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> CoreResult<()> {
    Ok(())
}
