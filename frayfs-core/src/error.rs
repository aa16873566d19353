use alloc::format;
use alloc::string::ToString;
use core::error;
use core::fmt::{Display, Formatter, Result};

use bytemuck::PodCastError;

#[derive(Debug)]
pub enum Error {
    Cast(PodCastError),
    InvalidSuperblock([u8; 8]),
    TruncatedSuperblock(usize),
    TruncatedHeader { offset: u64, len: usize },
    Overflow,
    TryFromInt(core::num::TryFromIntError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result {
        use Error::*;

        let msg = match self {
            Cast(err) => format!("Cast: {:?}", err),
            InvalidSuperblock(magic) => format!("Invalid FrayFS superblock (magic {:02x?})", magic),
            TruncatedSuperblock(len) => format!("Superblock truncated: {} of 512 bytes", len),
            TruncatedHeader { offset, len } => {
                format!("File header at offset {:#06x} truncated: {} of 64 bytes", offset, len)
            }
            Overflow => "Overflow".to_string(),
            TryFromInt(err) => format!("TryFromInt: {}", err),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::TryFromInt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PodCastError> for Error {
    fn from(err: PodCastError) -> Error {
        Error::Cast(err)
    }
}

impl From<core::num::TryFromIntError> for Error {
    fn from(err: core::num::TryFromIntError) -> Error {
        Error::TryFromInt(err)
    }
}
