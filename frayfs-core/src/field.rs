//! Fixed-width, NUL-padded string fields

/// Copy `src` into `field`, truncating to the field width and zeroing the
/// remainder. Truncation is byte-wise, so a multi-byte UTF-8 sequence may be
/// cut. Returns the number of bytes of `src` that were kept.
pub fn pack_str(field: &mut [u8], src: &[u8]) -> usize {
    let len = src.len().min(field.len());
    field[..len].copy_from_slice(&src[..len]);
    field[len..].fill(0);
    len
}

/// Retrieve the contents of a field, ending at the first NUL
pub fn unpack_str(field: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < field.len() {
        if field[i] == 0 {
            break;
        }
        i += 1;
    }
    &field[..i]
}

#[cfg(test)]
mod tests {
    use super::{pack_str, unpack_str};

    #[test]
    fn pads_short_values() {
        let mut field = [0xff; 8];
        assert_eq!(pack_str(&mut field, b"abc"), 3);
        assert_eq!(&field, b"abc\0\0\0\0\0");
        assert_eq!(unpack_str(&field), b"abc");
    }

    #[test]
    fn truncates_long_values() {
        let mut field = [0; 4];
        assert_eq!(pack_str(&mut field, b"abcdef"), 4);
        assert_eq!(&field, b"abcd");
        // A full field has no terminator
        assert_eq!(unpack_str(&field), b"abcd");
    }

    #[test]
    fn truncation_may_split_utf8() {
        let mut field = [0; 4];
        pack_str(&mut field, "abcé".as_bytes());
        assert_eq!(&field, &[b'a', b'b', b'c', 0xc3]);
    }
}
