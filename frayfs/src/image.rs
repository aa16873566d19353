use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use frayfs_core::ImageSrc;

use crate::{wrap_io_err, Error};

/// A FrayFS image on disk
#[derive(Debug)]
pub struct ImageFile {
    path: PathBuf,
    src: BufReader<File>,
    len: u64,
}

impl ImageFile {
    pub fn open(path: impl AsRef<Path>) -> Result<ImageFile, Error> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(wrap_io_err!(path, "Open image"))?;
        let len = file
            .metadata()
            .map_err(wrap_io_err!(path, "Stat image"))?
            .len();

        Ok(ImageFile {
            path,
            src: BufReader::new(file),
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the image in bytes when it was opened
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl ImageSrc for ImageFile {
    type Err = Error;

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        self.src
            .seek(SeekFrom::Start(offset))
            .map_err(wrap_io_err!(self.path, "Seek at read_at"))?;

        let mut total = 0;
        while total < buf.len() {
            match self.src.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(count) => total += count,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(Error::Io {
                        source,
                        path: Some(self.path.clone()),
                        context: "Read at read_at",
                    })
                }
            }
        }
        Ok(total)
    }
}
