//! The integrity field of a file header.
//!
//! Older documentation of the format calls this a CRC32. It is not: it is the
//! sum of the unsigned byte values modulo 2^32, which misses reordered bytes
//! and many multi-byte errors. Changing the algorithm requires a new format
//! version.

/// Running additive checksum, for data that arrives in chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checksum(u32);

impl Checksum {
    pub fn new() -> Checksum {
        Checksum(0)
    }

    pub fn update(&mut self, data: &[u8]) {
        for &b in data {
            self.0 = self.0.wrapping_add(u32::from(b));
        }
    }

    pub fn finalize(self) -> u32 {
        self.0
    }
}

pub fn additive_checksum(data: &[u8]) -> u32 {
    let mut checksum = Checksum::new();
    checksum.update(data);
    checksum.finalize()
}
