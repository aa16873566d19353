//! The packed structs represent the on-disk format of FrayFS
use alloc::borrow::Cow;
use alloc::string::String;

use bytemuck::{Pod, PodCastError, Zeroable};

use crate::{
    pack_str, unpack_str, Error, FORMAT_SIGNATURE, HEADER_SIZE, SUPERBLOCK_MAGIC, SUPERBLOCK_SIZE,
    VERSION_MAJOR, VERSION_MINOR,
};

/// Fixed region at offset 0 of an image. All integers are big-endian.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Superblock {
    /// `FRAYFS01`
    pub magic: [u8; 8],
    /// Major, minor
    pub version: [u8; 2],
    /// Size of a file header
    pub block_size: [u8; 4],
    /// Size of this struct
    pub superblock_size: [u8; 4],
    /// Creation time of the image, epoch milliseconds
    pub created: [u8; 8],
    /// NUL-padded ASCII
    pub volume_name: [u8; 32],
    /// Raw bits of [`FORMAT_SIGNATURE`]
    pub signature: [u8; 8],
    pub reserved: [u8; 446],
}

impl Superblock {
    pub fn new(volume_name: &str, created: i64) -> Superblock {
        let mut superblock = Superblock::zeroed();
        superblock.magic = *SUPERBLOCK_MAGIC;
        superblock.version = [VERSION_MAJOR, VERSION_MINOR];
        superblock.block_size = (HEADER_SIZE as u32).to_be_bytes();
        superblock.superblock_size = (SUPERBLOCK_SIZE as u32).to_be_bytes();
        superblock.created = created.to_be_bytes();
        pack_str(&mut superblock.volume_name, volume_name.as_bytes());
        superblock.signature = FORMAT_SIGNATURE.to_bits().to_be_bytes();
        superblock
    }

    /// Parse a superblock and check its magic
    pub fn from_bytes(data: &[u8]) -> Result<&Superblock, Error> {
        let superblock = Superblock::from_bytes_unchecked(data)?;
        superblock.check()?;
        Ok(superblock)
    }

    /// Parse a superblock without looking at any of its fields
    pub fn from_bytes_unchecked(data: &[u8]) -> Result<&Superblock, Error> {
        let data = data
            .get(..SUPERBLOCK_SIZE)
            .ok_or(Error::Cast(PodCastError::SizeMismatch))?;
        Ok(bytemuck::try_from_bytes(data)?)
    }

    /// Only the magic is significant; the remaining constants are informative
    pub fn check(&self) -> Result<(), Error> {
        if &self.magic == SUPERBLOCK_MAGIC {
            Ok(())
        } else {
            Err(Error::InvalidSuperblock(self.magic))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn version(&self) -> (u8, u8) {
        (self.version[0], self.version[1])
    }

    pub fn block_size(&self) -> u32 {
        u32::from_be_bytes(self.block_size)
    }

    pub fn superblock_size(&self) -> u32 {
        u32::from_be_bytes(self.superblock_size)
    }

    pub fn created(&self) -> i64 {
        i64::from_be_bytes(self.created)
    }

    pub fn volume_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(unpack_str(&self.volume_name))
    }

    pub fn signature(&self) -> f64 {
        f64::from_bits(u64::from_be_bytes(self.signature))
    }
}

#[cfg(test)]
mod tests {
    use super::Superblock;
    use crate::{Error, FORMAT_SIGNATURE, SUPERBLOCK_SIZE};

    #[test]
    fn field_offsets() {
        let superblock = Superblock::new("FRAYNIX", 0x0102_0304_0506_0708);
        let bytes = superblock.as_bytes();
        assert_eq!(bytes.len(), SUPERBLOCK_SIZE);
        assert_eq!(&bytes[0..8], b"FRAYFS01");
        assert_eq!(&bytes[8..10], &[1, 0]);
        assert_eq!(&bytes[10..14], &[0, 0, 0, 64]);
        assert_eq!(&bytes[14..18], &[0, 0, 2, 0]);
        assert_eq!(&bytes[18..26], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[26..33], b"FRAYNIX");
        assert!(bytes[33..58].iter().all(|&b| b == 0));
        assert_eq!(&bytes[58..66], &FORMAT_SIGNATURE.to_bits().to_be_bytes());
        assert!(bytes[66..].iter().all(|&b| b == 0));
    }

    #[test]
    fn decode() {
        let superblock = Superblock::new("VOLUME", -1);
        let parsed = Superblock::from_bytes(superblock.as_bytes()).unwrap();
        assert_eq!(parsed.version(), (1, 0));
        assert_eq!(parsed.block_size(), 64);
        assert_eq!(parsed.superblock_size(), 512);
        assert_eq!(parsed.created(), -1);
        assert_eq!(parsed.volume_name(), "VOLUME");
        assert_eq!(parsed.signature(), FORMAT_SIGNATURE);
    }

    #[test]
    fn bad_magic() {
        let mut superblock = Superblock::new("FRAYNIX", 0);
        superblock.magic[7] = b'2';
        match Superblock::from_bytes(superblock.as_bytes()) {
            Err(Error::InvalidSuperblock(magic)) => assert_eq!(&magic, b"FRAYFS02"),
            other => panic!("unexpected {:?}", other.map(|s| s.created())),
        }
        assert!(Superblock::from_bytes_unchecked(superblock.as_bytes()).is_ok());
    }
}
