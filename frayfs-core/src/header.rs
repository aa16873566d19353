//! The packed structs represent the on-disk format of FrayFS
use alloc::borrow::Cow;
use alloc::string::String;
use core::fmt::{self, Display};

use bytemuck::{Pod, PodCastError, Zeroable};

use crate::{pack_str, unpack_str, Error, FileFlags, FILE_MAGIC, HEADER_SIZE};

/// Record preceding the data of every archived file. All integers are
/// big-endian.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C, packed)]
pub struct FileHeader {
    /// `FRAY` for a live record, anything else marks the end of the archive
    pub magic: [u8; 4],
    /// NUL-padded relative path, truncated to the field width
    pub name: [u8; 32],
    /// Size in bytes of the data following this header
    pub size: [u8; 4],
    /// Additive checksum of the data
    pub checksum: [u8; 4],
    pub flags: [u8; 4],
    /// Last modification time of the source file, epoch milliseconds
    pub timestamp: [u8; 8],
    pub reserved: [u8; 8],
}

impl FileHeader {
    pub fn new(name: &[u8], size: u32, checksum: u32, flags: FileFlags, timestamp: i64) -> FileHeader {
        let mut header = FileHeader::zeroed();
        header.magic = *FILE_MAGIC;
        pack_str(&mut header.name, name);
        header.size = size.to_be_bytes();
        header.checksum = checksum.to_be_bytes();
        header.flags = flags.bits().to_be_bytes();
        header.timestamp = timestamp.to_be_bytes();
        header
    }

    /// The all-zero record written after the last file
    pub fn end_marker() -> FileHeader {
        FileHeader::zeroed()
    }

    /// Parse a header from exactly [`HEADER_SIZE`] bytes. The magic is not
    /// checked; use [`FileHeader::is_live`].
    pub fn from_bytes(data: &[u8]) -> Result<&FileHeader, Error> {
        let data = data
            .get(..HEADER_SIZE)
            .ok_or(Error::Cast(PodCastError::SizeMismatch))?;
        Ok(bytemuck::try_from_bytes(data)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Whether this is a file record rather than the end of the archive
    pub fn is_live(&self) -> bool {
        &self.magic == FILE_MAGIC
    }

    /// Retrieve the name, ending at the first NUL
    pub fn name_bytes(&self) -> &[u8] {
        unpack_str(&self.name)
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    pub fn size(&self) -> u32 {
        u32::from_be_bytes(self.size)
    }

    pub fn checksum(&self) -> u32 {
        u32::from_be_bytes(self.checksum)
    }

    pub fn flags(&self) -> FileFlags {
        FileFlags::from_bits_retain(u32::from_be_bytes(self.flags))
    }

    pub fn timestamp(&self) -> i64 {
        i64::from_be_bytes(self.timestamp)
    }

    /// Bytes occupied by this record in the image, header included
    pub fn record_len(&self) -> u64 {
        HEADER_SIZE as u64 + u64::from(self.size())
    }
}

impl Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={:?} size={} checksum={:#010x} flags={:#x} timestamp={}",
            self.name(),
            self.size(),
            self.checksum(),
            self.flags().bits(),
            self.timestamp(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::FileHeader;
    use crate::{FileFlags, HEADER_SIZE};

    #[test]
    fn field_offsets() {
        let header = FileHeader::new(
            b"boot/init.txt",
            0x0102_0304,
            0x0a0b_0c0d,
            FileFlags::EXECUTABLE | FileFlags::READ_ONLY,
            0x1122_3344_5566_7788,
        );
        let bytes = header.as_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"FRAY");
        assert_eq!(&bytes[4..17], b"boot/init.txt");
        assert!(bytes[17..36].iter().all(|&b| b == 0));
        assert_eq!(&bytes[36..40], &[1, 2, 3, 4]);
        assert_eq!(&bytes[40..44], &[0x0a, 0x0b, 0x0c, 0x0d]);
        assert_eq!(&bytes[44..48], &[0, 0, 0, 0x09]);
        assert_eq!(&bytes[48..56], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);
        assert_eq!(&bytes[56..64], &[0; 8]);
    }

    #[test]
    fn decode() {
        let header = FileHeader::new(b"a/b", 27, 2000, FileFlags::HIDDEN, -5);
        let parsed = FileHeader::from_bytes(header.as_bytes()).unwrap();
        assert!(parsed.is_live());
        assert_eq!(parsed.name(), "a/b");
        assert_eq!(parsed.size(), 27);
        assert_eq!(parsed.checksum(), 2000);
        assert_eq!(parsed.flags(), FileFlags::HIDDEN);
        assert_eq!(parsed.timestamp(), -5);
        assert_eq!(parsed.record_len(), 64 + 27);
    }

    #[test]
    fn long_names_truncate() {
        let name = b"very/long/directory/name/that/overflows.txt";
        let header = FileHeader::new(name, 0, 0, FileFlags::empty(), 0);
        assert_eq!(header.name_bytes(), &name[..32]);
    }

    #[test]
    fn end_marker_is_not_live() {
        let marker = FileHeader::end_marker();
        assert!(!marker.is_live());
        assert!(marker.as_bytes().iter().all(|&b| b == 0));

        let mut garbage = [0xaa; HEADER_SIZE];
        garbage[..4].copy_from_slice(b"FRAX");
        assert!(!FileHeader::from_bytes(&garbage).unwrap().is_live());
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(FileHeader::from_bytes(&[0; 63]).is_err());
    }
}
