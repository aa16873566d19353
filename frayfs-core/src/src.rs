use crate::{Error, FileHeader, Superblock, HEADER_SIZE, SUPERBLOCK_SIZE};

/// A file record located in an image
#[derive(Clone, Copy, Debug)]
pub struct Record {
    /// Position of the record in the archive, starting at 0
    pub index: usize,
    /// Offset of the header in the image
    pub offset: u64,
    pub header: FileHeader,
}

impl Record {
    /// Offset of the first data byte in the image
    pub fn data_offset(&self) -> u64 {
        self.offset + HEADER_SIZE as u64
    }

    /// Offset of the header that follows this record
    pub fn next_offset(&self) -> u64 {
        self.offset + self.header.record_len()
    }
}

/// Positioned-read access to an image
pub trait ImageSrc {
    type Err: From<Error>;

    /// Read into `buf` starting at `offset`. Implementations fill `buf`
    /// completely unless the end of the image is reached first, and return
    /// the number of bytes read.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Err>;

    /// Read the superblock without checking its magic
    fn read_superblock_unchecked(&mut self) -> Result<Superblock, Self::Err> {
        let mut data = [0; SUPERBLOCK_SIZE];
        let count = self.read_at(0, &mut data)?;
        if count != SUPERBLOCK_SIZE {
            return Err(Error::TruncatedSuperblock(count).into());
        }
        Ok(*Superblock::from_bytes_unchecked(&data)?)
    }

    fn read_superblock(&mut self) -> Result<Superblock, Self::Err> {
        let superblock = self.read_superblock_unchecked()?;
        superblock.check()?;
        Ok(superblock)
    }

    /// Read the header at `offset`. Returns `None` if the image ends exactly
    /// at `offset`; a partial header is an error.
    fn read_header(&mut self, offset: u64) -> Result<Option<FileHeader>, Self::Err> {
        let mut data = [0; HEADER_SIZE];
        match self.read_at(offset, &mut data)? {
            0 => Ok(None),
            HEADER_SIZE => Ok(Some(*FileHeader::from_bytes(&data)?)),
            len => Err(Error::TruncatedHeader { offset, len }.into()),
        }
    }

    /// Read from the data of `record`, starting `offset` bytes into it
    fn read_entry(&mut self, record: &Record, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Err> {
        let size = u64::from(record.header.size());
        if offset >= size {
            return Ok(0);
        }

        let end = usize::try_from(size - offset)
            .map_err(Error::TryFromInt)?
            .min(buf.len());

        let start = record
            .data_offset()
            .checked_add(offset)
            .ok_or(Error::Overflow)?;
        self.read_at(start, &mut buf[..end])
    }

    /// Iterate the records of this image without reading their data
    fn records(&mut self) -> Records<'_, Self>
    where
        Self: Sized,
    {
        Records {
            src: self,
            cursor: RecordCursor::new(),
        }
    }
}

impl<T: AsRef<[u8]>> ImageSrc for T {
    type Err = Error;

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        let data = self.as_ref();
        let start = usize::try_from(offset).map_err(Error::TryFromInt)?;
        if start >= data.len() {
            return Ok(0);
        }
        let end = start
            .checked_add(buf.len())
            .ok_or(Error::Overflow)?
            .min(data.len());
        let count = end - start;
        buf[..count].copy_from_slice(&data[start..end]);
        Ok(count)
    }
}

/// Sequential scan over the records of an image, starting right after the
/// superblock. The scan ends at the first header whose magic is not `FRAY`,
/// or when the image ends on a record boundary.
#[derive(Clone, Debug)]
pub struct RecordCursor {
    offset: u64,
    index: usize,
    done: bool,
    end_marker: bool,
}

impl RecordCursor {
    pub fn new() -> RecordCursor {
        RecordCursor {
            offset: SUPERBLOCK_SIZE as u64,
            index: 0,
            done: false,
            end_marker: false,
        }
    }

    pub fn next_record<S: ImageSrc + ?Sized>(&mut self, src: &mut S) -> Result<Option<Record>, S::Err> {
        if self.done {
            return Ok(None);
        }

        let header = match src.read_header(self.offset) {
            Ok(Some(header)) => header,
            Ok(None) => {
                self.done = true;
                return Ok(None);
            }
            Err(err) => {
                self.done = true;
                return Err(err);
            }
        };

        if !header.is_live() {
            self.done = true;
            self.end_marker = true;
            return Ok(None);
        }

        let record = Record {
            index: self.index,
            offset: self.offset,
            header,
        };
        self.offset = self
            .offset
            .checked_add(header.record_len())
            .ok_or(Error::Overflow)?;
        self.index += 1;
        Ok(Some(record))
    }

    /// Offset of the next header to be read; after the scan has ended, the
    /// offset of the end marker or of the end of the image
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of records yielded so far
    pub fn count(&self) -> usize {
        self.index
    }

    /// Whether the scan stopped on a non-`FRAY` header rather than at the end
    /// of the image
    pub fn found_end_marker(&self) -> bool {
        self.end_marker
    }
}

impl Default for RecordCursor {
    fn default() -> RecordCursor {
        RecordCursor::new()
    }
}

/// Iterator form of [`RecordCursor`]; see [`ImageSrc::records`]
pub struct Records<'a, S: ImageSrc> {
    src: &'a mut S,
    cursor: RecordCursor,
}

impl<S: ImageSrc> Records<'_, S> {
    pub fn cursor(&self) -> &RecordCursor {
        &self.cursor
    }
}

impl<S: ImageSrc> Iterator for Records<'_, S> {
    type Item = Result<Record, S::Err>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_record(&mut *self.src).transpose()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::{ImageSrc, RecordCursor};
    use crate::test::{image, ENTRY1, ENTRY1_NAME, ENTRY2, ENTRY2_NAME};
    use crate::{Error, FileHeader, HEADER_SIZE, SUPERBLOCK_SIZE};

    #[test]
    fn scan_records() {
        let mut data = image();
        let records = data.records().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].index, 0);
        assert_eq!(records[0].offset, SUPERBLOCK_SIZE as u64);
        assert_eq!(records[0].header.name_bytes(), ENTRY1_NAME);
        assert_eq!(records[1].index, 1);
        assert_eq!(
            records[1].offset,
            (SUPERBLOCK_SIZE + HEADER_SIZE + ENTRY1.len()) as u64
        );
        assert_eq!(records[1].header.name_bytes(), ENTRY2_NAME);
    }

    #[test]
    fn read_entry_data() {
        let mut data = image();
        let mut cursor = RecordCursor::new();
        let first = cursor.next_record(&mut data).unwrap().unwrap();
        let second = cursor.next_record(&mut data).unwrap().unwrap();

        let mut buf = [0; 64];
        let count = data.read_entry(&first, 0, &mut buf).unwrap();
        assert_eq!(&buf[..count], ENTRY1);

        let count = data.read_entry(&second, 4, &mut buf[..3]).unwrap();
        assert_eq!(&buf[..count], &ENTRY2[4..7]);

        assert_eq!(data.read_entry(&second, ENTRY2.len() as u64, &mut buf).unwrap(), 0);
    }

    #[test]
    fn stops_at_end_marker() {
        let mut data = image();
        let mut cursor = RecordCursor::new();
        while cursor.next_record(&mut data).unwrap().is_some() {}
        assert!(cursor.found_end_marker());
        assert_eq!(cursor.count(), 2);
        assert_eq!(cursor.offset() as usize, data.len() - HEADER_SIZE);
        // Exhausted cursors stay exhausted
        assert!(cursor.next_record(&mut data).unwrap().is_none());
    }

    #[test]
    fn stops_at_boundary_without_marker() {
        let mut data = image();
        data.truncate(data.len() - HEADER_SIZE);
        let mut cursor = RecordCursor::new();
        while cursor.next_record(&mut data).unwrap().is_some() {}
        assert!(!cursor.found_end_marker());
        assert_eq!(cursor.count(), 2);
    }

    #[test]
    fn garbage_header_ends_archive() {
        let mut data = image();
        let marker = data.len() - HEADER_SIZE;
        data[marker..].copy_from_slice(&[0x5a; HEADER_SIZE]);
        assert_eq!(data.records().count(), 2);
    }

    #[test]
    fn partial_header_is_an_error() {
        let mut data = image();
        data.truncate(data.len() - HEADER_SIZE + 10);
        let mut records = data.records();
        assert!(records.next().unwrap().is_ok());
        assert!(records.next().unwrap().is_ok());
        match records.next() {
            Some(Err(Error::TruncatedHeader { len, .. })) => assert_eq!(len, 10),
            other => panic!("expected truncated header, got {:?}", other.map(|r| r.map(|r| r.index))),
        }
        assert!(records.next().is_none());
    }

    #[test]
    fn superblock_checks() {
        let mut data = image();
        assert_eq!(data.read_superblock().unwrap().volume_name(), "FRAYNIX");

        data[0] = b'X';
        assert!(matches!(data.read_superblock(), Err(Error::InvalidSuperblock(_))));
        assert!(data.read_superblock_unchecked().is_ok());

        let mut short = &data[..100];
        assert!(matches!(
            short.read_superblock_unchecked(),
            Err(Error::TruncatedSuperblock(100))
        ));
    }

    #[test]
    fn empty_archive() {
        let mut data = Vec::new();
        data.extend_from_slice(crate::Superblock::new("EMPTY", 0).as_bytes());
        data.extend_from_slice(FileHeader::end_marker().as_bytes());
        assert_eq!(data.records().count(), 0);
    }
}
