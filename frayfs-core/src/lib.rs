#![no_std]
extern crate alloc;

use core::mem;

pub use crate::checksum::{additive_checksum, Checksum};
pub use crate::error::Error;
pub use crate::field::{pack_str, unpack_str};
pub use crate::flags::FileFlags;
pub use crate::header::FileHeader;
pub use crate::src::{ImageSrc, Record, RecordCursor};
pub use crate::superblock::Superblock;

mod checksum;
mod error;
mod field;
mod flags;
mod header;
mod src;
mod superblock;


pub const SUPERBLOCK_SIZE: usize = mem::size_of::<Superblock>();
pub const HEADER_SIZE: usize = mem::size_of::<FileHeader>();

/// Magic at offset 0 of every image, also carries the format version
pub const SUPERBLOCK_MAGIC: &[u8; 8] = b"FRAYFS01";
/// Magic of a live file header; anything else ends the archive
pub const FILE_MAGIC: &[u8; 4] = b"FRAY";

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

/// Width of the volume name field in the superblock
pub const VOLUME_NAME_LEN: usize = 32;
/// Width of the path field in a file header
pub const NAME_LEN: usize = 32;

pub const DEFAULT_VOLUME_NAME: &str = "FRAYNIX";

/// Fingerprint stored in the superblock as raw `f64` bits. Never checked.
pub const FORMAT_SIGNATURE: f64 = 1.6180339887;
