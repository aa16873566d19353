use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, Metadata, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use frayfs_core::{
    additive_checksum, FileFlags, FileHeader, Superblock, DEFAULT_VOLUME_NAME, HEADER_SIZE, NAME_LEN,
    SUPERBLOCK_SIZE,
};
use log::{debug, info, warn};

use crate::{epoch_millis, format_size, wrap_io_err, Error};

#[derive(Debug)]
struct BuilderEntry {
    /// Position of the file on the build system
    source: PathBuf,
    /// Slash-joined path relative to the root being archived
    name: String,
    flags: FileFlags,
    timestamp: i64,
}

/// Totals for one image, returned by the builder
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub files: usize,
    /// Sum of the data sizes of all files
    pub total_bytes: u64,
    /// Length of the image, superblock and end marker included
    pub image_len: u64,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} of data, {} image",
            self.files,
            format_size(self.total_bytes),
            format_size(self.image_len),
        )
    }
}

/// Builder for FrayFS images. Collects the files of one or more directory
/// trees, then writes them out as a single image.
///
/// # Example
/// ```no_run
/// use frayfs::ImageBuilder;
///
/// let mut builder = ImageBuilder::new();
/// builder.volume_name("BACKUP").created(0);
/// builder.dir("fray_memories").unwrap();
/// let summary = builder.create("system.img").unwrap();
/// println!("{}", summary);
/// ```
#[derive(Debug)]
pub struct ImageBuilder {
    volume_name: String,
    created: Option<i64>,
    entries: Vec<BuilderEntry>,
}

impl ImageBuilder {
    pub fn new() -> ImageBuilder {
        ImageBuilder {
            volume_name: DEFAULT_VOLUME_NAME.to_string(),
            created: None,
            entries: Vec::new(),
        }
    }

    /// Volume name stored in the superblock, truncated to 32 bytes
    pub fn volume_name(&mut self, name: impl Into<String>) -> &mut ImageBuilder {
        self.volume_name = name.into();
        self
    }

    /// Pin the creation timestamp (epoch milliseconds) of the superblock.
    /// Without this the time of writing is used, and two builds of the same
    /// tree differ in those 8 bytes.
    pub fn created(&mut self, millis: i64) -> &mut ImageBuilder {
        self.created = Some(millis);
        self
    }

    /// Iterate a directory and add every regular file below it. Names are
    /// relative to `dir`; each directory level is visited in file name order.
    pub fn dir(&mut self, dir: impl AsRef<Path>) -> Result<&mut ImageBuilder, Error> {
        for file in source_files(dir.as_ref())? {
            let file_name = file.path.file_name().unwrap_or_default();
            self.entries.push(BuilderEntry {
                flags: host_flags(file_name, &file.metadata) | FileFlags::from_file_name(&file.name),
                timestamp: file.metadata.modified().map(epoch_millis).unwrap_or(0),
                source: file.path,
                name: file.name,
            });
        }
        Ok(self)
    }

    /// Write the superblock, every collected file and the end marker to
    /// `writer`.
    pub fn write_image<W: Write>(&self, mut writer: W) -> Result<BuildSummary, Error> {
        let created = self
            .created
            .unwrap_or_else(|| epoch_millis(SystemTime::now()));
        let superblock = Superblock::new(&self.volume_name, created);
        writer
            .write_all(superblock.as_bytes())
            .map_err(wrap_io_err!("Write superblock"))?;
        debug!("Superblock written ({} bytes)", SUPERBLOCK_SIZE);

        let mut summary = BuildSummary {
            image_len: SUPERBLOCK_SIZE as u64,
            ..BuildSummary::default()
        };

        for entry in self.entries.iter() {
            // Reject oversized files before loading them
            let len = fs::metadata(&entry.source)
                .map_err(wrap_io_err!(entry.source, "Stat source file"))?
                .len();
            data_size(&entry.source, len)?;
            let data = fs::read(&entry.source).map_err(wrap_io_err!(entry.source, "Read source file"))?;
            let size = data_size(&entry.source, data.len() as u64)?;

            if entry.name.len() > NAME_LEN {
                warn!(
                    "Name {:?} is longer than {} bytes and will be truncated",
                    entry.name, NAME_LEN
                );
            }

            let header = FileHeader::new(
                entry.name.as_bytes(),
                size,
                additive_checksum(&data),
                entry.flags,
                entry.timestamp,
            );
            writer
                .write_all(header.as_bytes())
                .map_err(wrap_io_err!("Write file header"))?;
            writer
                .write_all(&data)
                .map_err(wrap_io_err!("Write file data"))?;
            debug!("{} [{}] {}", entry.name, format_size(u64::from(size)), entry.flags);

            summary.files += 1;
            summary.total_bytes += u64::from(size);
            summary.image_len += header.record_len();
        }

        writer
            .write_all(FileHeader::end_marker().as_bytes())
            .map_err(wrap_io_err!("Write end marker"))?;
        writer.flush().map_err(wrap_io_err!("Flush image"))?;
        summary.image_len += HEADER_SIZE as u64;

        Ok(summary)
    }

    /// Create (or truncate) the file at `image` and write the image to it.
    /// A failure part way leaves a truncated image behind.
    pub fn create(&self, image: impl AsRef<Path>) -> Result<BuildSummary, Error> {
        let image = image.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(image)
            .map_err(wrap_io_err!(image, "Create image"))?;

        self.write_image(BufWriter::new(file))
            .map_err(|err| err.path(image))
    }

    /// Archive the tree at `source` into `image`.
    ///
    /// If `source` does not exist it is created and nothing is built: the
    /// result is `Ok(None)` and no image is written.
    pub fn build(
        mut self,
        source: impl AsRef<Path>,
        image: impl AsRef<Path>,
    ) -> Result<Option<BuildSummary>, Error> {
        let source = source.as_ref();
        let image = image.as_ref();

        if !source.exists() {
            fs::create_dir_all(source).map_err(wrap_io_err!(source, "Create source directory"))?;
            info!(
                "Created source directory {}; place files there and build again",
                source.display()
            );
            return Ok(None);
        }

        info!("Building {} from {}", image.display(), source.display());
        self.dir(source)?;
        let summary = self.create(image)?;
        info!("Built {}: {}", image.display(), summary);
        Ok(Some(summary))
    }
}

impl Default for ImageBuilder {
    fn default() -> ImageBuilder {
        ImageBuilder::new()
    }
}

/// Archive the tree at `source` into `image` with default settings; see
/// [`ImageBuilder::build`].
pub fn build(source: impl AsRef<Path>, image: impl AsRef<Path>) -> Result<Option<BuildSummary>, Error> {
    ImageBuilder::new().build(source, image)
}

/// A regular file found below a directory by [`source_files`]
#[derive(Debug)]
pub(crate) struct SourceFile {
    pub path: PathBuf,
    /// Slash-joined path relative to the walked directory
    pub name: String,
    pub metadata: Metadata,
}

/// Every regular file below `base`, visiting each directory in file name
/// order. Symlinks to files are followed, symlinks to directories and
/// special files are skipped.
pub(crate) fn source_files(base: &Path) -> Result<Vec<SourceFile>, Error> {
    let mut files = Vec::new();
    folder_entries(base, base, &mut files)?;
    Ok(files)
}

fn folder_entries(base: &Path, current: &Path, files: &mut Vec<SourceFile>) -> Result<(), Error> {
    // Sort each folder's entries by the file name
    let mut read_dir = Vec::new();
    for entry_res in fs::read_dir(current).map_err(wrap_io_err!(current, "Read directory"))? {
        read_dir.push(entry_res.map_err(wrap_io_err!(current, "Read directory entry"))?);
    }
    read_dir.sort_by_key(|entry| entry.file_name());

    for entry in read_dir {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(wrap_io_err!(path, "Read file type"))?;

        if file_type.is_dir() {
            folder_entries(base, &path, files)?;
            continue;
        }

        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                debug!("Skipping {}: not a regular file", path.display());
                continue;
            }
        };

        let relative = path.strip_prefix(base).map_err(|_| Error::InvalidPath {
            entry: path.clone(),
            component: base.to_path_buf(),
        })?;

        files.push(SourceFile {
            name: archive_name(relative),
            path,
            metadata,
        });
    }
    Ok(())
}

/// Size of a file as stored in its header, which holds at most `u32::MAX`
fn data_size(path: &Path, len: u64) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| Error::FileTooLarge {
        path: path.to_path_buf(),
        size: len,
    })
}

/// Join the components of a relative path with `/`, whatever the host
/// separator is
fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn host_flags(file_name: &OsStr, metadata: &Metadata) -> FileFlags {
    let mut flags = FileFlags::empty();
    if metadata.permissions().readonly() {
        flags |= FileFlags::READ_ONLY;
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;

        const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
        const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

        let _ = file_name;
        let attributes = metadata.file_attributes();
        if attributes & FILE_ATTRIBUTE_HIDDEN != 0 {
            flags |= FileFlags::HIDDEN;
        }
        if attributes & FILE_ATTRIBUTE_SYSTEM != 0 {
            flags |= FileFlags::SYSTEM;
        }
    }

    #[cfg(not(windows))]
    {
        if file_name.to_string_lossy().starts_with('.') {
            flags |= FileFlags::HIDDEN;
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{archive_name, data_size};
    use crate::Error;

    #[test]
    fn names_are_slash_joined() {
        assert_eq!(archive_name(Path::new("a.txt")), "a.txt");
        assert_eq!(archive_name(&Path::new("boot").join("init.txt")), "boot/init.txt");
        assert_eq!(
            archive_name(&Path::new("a").join("b").join("c.bin")),
            "a/b/c.bin"
        );
    }

    #[test]
    fn oversized_files_are_rejected() {
        let path = Path::new("huge.bin");
        assert_eq!(data_size(path, 0).unwrap(), 0);
        assert_eq!(data_size(path, u64::from(u32::MAX)).unwrap(), u32::MAX);
        assert!(matches!(
            data_size(path, u64::from(u32::MAX) + 1),
            Err(Error::FileTooLarge { size, .. }) if size == u64::from(u32::MAX) + 1
        ));
    }
}
