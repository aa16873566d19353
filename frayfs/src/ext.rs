//! Extension traits and I/O helpers over the types of `frayfs-core`.
use std::io::{self, Read, Write};
use std::path::{Component, Path};

use frayfs_core::{Checksum, FileHeader, ImageSrc, Record};

use crate::Error;

pub trait FileHeaderExt {
    fn check_path(&self) -> Result<&Path, Error>;
}

impl FileHeaderExt for FileHeader {
    /// Ensure the archived name is a relative path made only of normal
    /// components, so it cannot escape the extraction directory. An empty
    /// name is rejected as well.
    fn check_path(&self) -> Result<&Path, Error> {
        let bytes = self.name_bytes();
        let name = match std::str::from_utf8(bytes) {
            Ok(name) => name,
            // Truncation to the name field can cut a character in half; drop
            // the incomplete tail and keep the rest of the name
            Err(err) if err.error_len().is_none() => {
                std::str::from_utf8(&bytes[..err.valid_up_to()]).map_err(|_| invalid_utf8(self))?
            }
            Err(_) => return Err(invalid_utf8(self)),
        };
        let path = Path::new(name);
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidPath {
                entry: path.to_path_buf(),
                component: path.to_path_buf(),
            });
        }
        // `components` drops inner `.` parts, so check the raw name too
        if let Some(dot) = name.split('/').find(|part| *part == "." || *part == "..") {
            return Err(Error::InvalidPath {
                entry: path.to_path_buf(),
                component: dot.into(),
            });
        }
        for component in path.components() {
            match component {
                Component::Normal(_) => {}
                invalid => {
                    let bad_component: &Path = invalid.as_ref();
                    return Err(Error::InvalidPath {
                        entry: path.to_path_buf(),
                        component: bad_component.to_path_buf(),
                    });
                }
            }
        }
        Ok(path)
    }
}

fn invalid_utf8(header: &FileHeader) -> Error {
    Error::InvalidPath {
        entry: header.name().into_owned().into(),
        component: header.name().into_owned().into(),
    }
}

/// Copy everything from `read` to `write`, returning the number of bytes and
/// their additive checksum.
pub fn copy_and_checksum<R, W>(mut read: R, mut write: W, buf: &mut [u8]) -> io::Result<(u64, u32)>
where
    R: Read,
    W: Write,
{
    let mut checksum = Checksum::new();
    let mut total = 0;
    loop {
        let count = match read.read(buf) {
            Ok(0) => break,
            Ok(count) => count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        total += count as u64;
        write.write_all(&buf[..count])?;
        checksum.update(&buf[..count]);
    }
    Ok((total, checksum.finalize()))
}

/// [`Read`] adapter over the data of a single record
pub struct EntryReader<'a, Src: ImageSrc> {
    src: &'a mut Src,
    record: Record,
    pos: u64,
}

impl<'a, Src: ImageSrc> EntryReader<'a, Src> {
    pub fn new(src: &'a mut Src, record: Record) -> EntryReader<'a, Src> {
        EntryReader {
            src,
            record,
            pos: 0,
        }
    }
}

impl<Src> Read for EntryReader<'_, Src>
where
    Src: ImageSrc,
    Src::Err: std::error::Error + Send + Sync + 'static,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self
            .src
            .read_entry(&self.record, self.pos, buf)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        self.pos += count as u64;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use frayfs_core::{FileFlags, FileHeader};

    use super::{copy_and_checksum, FileHeaderExt};

    fn header(name: &str) -> FileHeader {
        FileHeader::new(name.as_bytes(), 0, 0, FileFlags::empty(), 0)
    }

    #[test]
    fn normal_paths() {
        assert_eq!(header("boot/init.txt").check_path().unwrap().to_str(), Some("boot/init.txt"));
        assert!(header("kernel.bin").check_path().is_ok());
    }

    #[test]
    fn split_character_is_dropped() {
        // 31 bytes of ASCII then a two-byte character cut after its first byte
        let name = format!("{}é.txt", "a".repeat(31));
        let header = FileHeader::new(name.as_bytes(), 0, 0, FileFlags::empty(), 0);
        let expected = "a".repeat(31);
        assert_eq!(header.check_path().unwrap().to_str(), Some(expected.as_str()));
    }

    #[test]
    fn invalid_utf8_inside_name() {
        let header = FileHeader::new(b"bad\xffname", 0, 0, FileFlags::empty(), 0);
        assert!(header.check_path().is_err());
    }

    #[test]
    fn escaping_paths() {
        for name in ["", "/abs", "../up", "a/../../b", "a/./b", "./a"] {
            assert!(header(name).check_path().is_err(), "{:?}", name);
        }
    }

    #[test]
    fn copy_sums_bytes() {
        let mut out = Vec::new();
        let mut buf = [0; 3];
        let (total, checksum) = copy_and_checksum(&b"FRAYMUS"[..], &mut out, &mut buf).unwrap();
        assert_eq!(total, 7);
        assert_eq!(checksum, b"FRAYMUS".iter().map(|&b| u32::from(b)).sum::<u32>());
        assert_eq!(out, b"FRAYMUS");
    }
}
