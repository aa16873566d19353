//! An in-memory filesystem that persists to FrayFS images.
//!
//! Files are kept in a map keyed by normalized path. [`MemoryFs::save_to`]
//! and [`MemoryFs::load_from`] go through a temporary staging directory,
//! which is removed before they return.
use std::collections::{btree_map, BTreeMap, HashMap};
use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::ops::Bound;
use std::path::Path;
use std::time::SystemTime;

use frayfs_core::FileFlags;
use log::debug;
use tempfile::TempDir;

use crate::builder::source_files;
use crate::{epoch_millis, extract, from_epoch_millis, wrap_io_err, BuildSummary, Error, ImageBuilder};

/// A file held by [`MemoryFs`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VFile {
    /// Normalized path, see [`normalize_path`]
    pub path: String,
    pub content: Vec<u8>,
    /// Epoch milliseconds
    pub created: i64,
    /// Epoch milliseconds
    pub modified: i64,
    /// Carried along but not interpreted
    pub flags: FileFlags,
}

impl VFile {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Canonical form of a store path: `\` becomes `/`, empty components are
/// dropped, so there is no leading, trailing or repeated slash.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Path-keyed in-memory store, listed in sorted path order
#[derive(Clone, Debug, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, VFile>,
}

impl MemoryFs {
    pub fn new() -> MemoryFs {
        MemoryFs::default()
    }

    /// Create or replace the file at `path`. Replacing keeps the creation
    /// time and flags of the old file.
    pub fn write(&mut self, path: &str, content: impl Into<Vec<u8>>) -> Result<(), Error> {
        let path = checked_path(path)?;
        let content = content.into();
        let now = epoch_millis(SystemTime::now());

        match self.files.entry(path) {
            btree_map::Entry::Occupied(mut occupied) => {
                let file = occupied.get_mut();
                file.content = content;
                file.modified = now;
            }
            btree_map::Entry::Vacant(vacant) => {
                let path = vacant.key().clone();
                vacant.insert(VFile {
                    path,
                    content,
                    created: now,
                    modified: now,
                    flags: FileFlags::empty(),
                });
            }
        }
        Ok(())
    }

    pub fn read(&self, path: &str) -> Option<&[u8]> {
        self.get(path).map(|file| file.content.as_slice())
    }

    pub fn get(&self, path: &str) -> Option<&VFile> {
        self.files.get(&normalize_path(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    /// Remove the file at `path`, returning whether it existed
    pub fn delete(&mut self, path: &str) -> bool {
        self.files.remove(&normalize_path(path)).is_some()
    }

    /// Move the file at `old` to `new`. Fails, returning `false`, if `old`
    /// does not exist or `new` is invalid or already taken.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        let old = normalize_path(old);
        let new = match checked_path(new) {
            Ok(new) => new,
            Err(_) => return false,
        };
        if old == new {
            return self.files.contains_key(&old);
        }
        if self.files.contains_key(&new) {
            return false;
        }

        match self.files.remove(&old) {
            Some(mut file) => {
                file.path = new.clone();
                self.files.insert(new, file);
                true
            }
            None => false,
        }
    }

    /// Every path in the store, sorted
    pub fn list(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    /// Every path below the directory `prefix`, at any depth. An empty
    /// prefix lists the whole store.
    pub fn list_prefix(&self, prefix: &str) -> Vec<&str> {
        let prefix = normalize_path(prefix);
        if prefix.is_empty() {
            return self.list();
        }
        let dir = format!("{}/", prefix);
        self.files
            .range::<str, _>((Bound::Included(dir.as_str()), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(&dir))
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Files directly inside the directory `dir`, without descending
    pub fn list_dir(&self, dir: &str) -> Vec<&str> {
        let dir = normalize_path(dir);
        let skip = if dir.is_empty() { 0 } else { dir.len() + 1 };
        self.list_prefix(&dir)
            .into_iter()
            .filter(|path| !path[skip..].contains('/'))
            .collect()
    }

    /// Size in bytes of the file at `path`
    pub fn size(&self, path: &str) -> Option<usize> {
        self.get(path).map(VFile::size)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Sum of the sizes of all files
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|file| file.size() as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VFile> {
        self.files.values()
    }

    /// Write the store to a new image at `image`.
    ///
    /// A store that holds both `a` and `a/b` cannot be staged and fails with
    /// an I/O error.
    pub fn save_to(&self, image: impl AsRef<Path>) -> Result<BuildSummary, Error> {
        self.save_via(&env::temp_dir(), image.as_ref())
    }

    /// [`MemoryFs::save_to`], staging under `staging_root`
    fn save_via(&self, staging_root: &Path, image: &Path) -> Result<BuildSummary, Error> {
        let staging = TempDir::new_in(staging_root)
            .map_err(wrap_io_err!(staging_root, "Create staging directory"))?;

        for file in self.files.values() {
            let target = staging.path().join(&file.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(wrap_io_err!(parent, "Create directory"))?;
            }
            let mut staged = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .map_err(wrap_io_err!(target, "Create staged file"))?;
            staged
                .write_all(&file.content)
                .map_err(wrap_io_err!(target, "Write staged file"))?;
            staged
                .set_modified(from_epoch_millis(file.modified))
                .map_err(wrap_io_err!(target, "Set modification time"))?;
        }
        debug!("Staged {} files in {}", self.files.len(), staging.path().display());

        let mut builder = ImageBuilder::new();
        builder.dir(staging.path())?;
        let summary = builder.create(image)?;

        staging
            .close()
            .map_err(wrap_io_err!("Remove staging directory"))?;
        Ok(summary)
    }

    /// Read every file of the image at `image` into a new store. `created`
    /// and `modified` both come from the record timestamps.
    pub fn load_from(image: impl AsRef<Path>) -> Result<MemoryFs, Error> {
        MemoryFs::load_via(&env::temp_dir(), image.as_ref())
    }

    /// [`MemoryFs::load_from`], staging under `staging_root`
    fn load_via(staging_root: &Path, image: &Path) -> Result<MemoryFs, Error> {
        let staging = TempDir::new_in(staging_root)
            .map_err(wrap_io_err!(staging_root, "Create staging directory"))?;
        let report = extract(image, staging.path())?;

        let flags: HashMap<&str, FileFlags> = report
            .files
            .iter()
            .map(|file| (file.name.as_str(), file.flags))
            .collect();

        let mut memory = MemoryFs::new();
        for source in source_files(staging.path())? {
            let content = fs::read(&source.path).map_err(wrap_io_err!(source.path, "Read staged file"))?;
            let modified = source.metadata.modified().map(epoch_millis).unwrap_or(0);
            let path = normalize_path(&source.name);
            memory.files.insert(
                path.clone(),
                VFile {
                    flags: flags.get(source.name.as_str()).copied().unwrap_or_default(),
                    path,
                    content,
                    created: modified,
                    modified,
                },
            );
        }
        debug!("Loaded {} files from {}", memory.file_count(), staging.path().display());

        staging
            .close()
            .map_err(wrap_io_err!("Remove staging directory"))?;
        Ok(memory)
    }
}

/// Normalize `path` and reject it if nothing is left or it has `.` or `..`
/// components
fn checked_path(path: &str) -> Result<String, Error> {
    let normalized = normalize_path(path);
    let bad_component = if normalized.is_empty() {
        Some("")
    } else {
        normalized.split('/').find(|part| *part == "." || *part == "..")
    };

    match bad_component {
        Some(component) => Err(Error::InvalidPath {
            entry: path.into(),
            component: component.into(),
        }),
        None => Ok(normalized),
    }
}
