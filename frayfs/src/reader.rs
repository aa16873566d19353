use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use frayfs_core::{FileFlags, ImageSrc, Record, RecordCursor, Superblock};
use log::{debug, info, warn};

use crate::ext::{copy_and_checksum, EntryReader, FileHeaderExt};
use crate::{format_size, from_epoch_millis, wrap_io_err, Error, ImageFile, READ_WRITE_BUF_SIZE};

/// Bytes of the superblock shown by [`dump`]; the rest is reserved
const SUPERBLOCK_DUMP_LEN: usize = 64;

/// Largest timestamp shown as a calendar date, 9999-12-31T23:59:59Z
const MAX_DISPLAY_MILLIS: i64 = 253_402_300_799_999;

/// The parsed contents of an image, as printed by [`list`]
#[derive(Clone, Debug)]
pub struct Listing {
    pub superblock: Superblock,
    pub records: Vec<Record>,
}

impl Listing {
    pub fn total_bytes(&self) -> u64 {
        self.records
            .iter()
            .map(|record| u64::from(record.header.size()))
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedFile {
    pub name: String,
    pub size: u32,
    pub flags: FileFlags,
    /// Whether the data matched the checksum stored in its header
    pub checksum_ok: bool,
}

/// What [`extract`] wrote, in archive order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: Vec<ExtractedFile>,
}

impl ExtractReport {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|file| u64::from(file.size)).sum()
    }

    /// Files whose data did not match their checksum
    pub fn mismatches(&self) -> impl Iterator<Item = &ExtractedFile> {
        self.files.iter().filter(|file| !file.checksum_ok)
    }
}

/// Print the volume and every record of `image` to `out`. Fails if the
/// superblock magic is wrong; record data is never read.
pub fn list(image: impl AsRef<Path>, mut out: impl Write) -> Result<Listing, Error> {
    let mut image = ImageFile::open(image)?;
    let superblock = image.read_superblock()?;

    let rule = "-".repeat(65);
    writeln!(out, "Volume:  {}", superblock.volume_name())
        .and_then(|()| writeln!(out, "Created: {}", format_millis(superblock.created())))
        .and_then(|()| writeln!(out))
        .and_then(|()| writeln!(out, "Files:"))
        .and_then(|()| writeln!(out, "{}", rule))
        .map_err(wrap_io_err!("Write listing"))?;

    let mut records = Vec::new();
    for record_res in image.records() {
        let record = record_res?;
        let header = &record.header;
        let line = format!(
            "  {:>3}. {:<32} {:>10}  {}",
            record.index + 1,
            header.name(),
            format_size(u64::from(header.size())),
            header.flags(),
        );
        writeln!(out, "{}", line.trim_end()).map_err(wrap_io_err!("Write listing"))?;
        records.push(record);
    }

    writeln!(out, "{}", rule)
        .and_then(|()| writeln!(out, "Total: {} files", records.len()))
        .map_err(wrap_io_err!("Write listing"))?;

    Ok(Listing {
        superblock,
        records,
    })
}

/// Write every record of `image` below `output`, creating directories as
/// needed.
///
/// The superblock is not checked, so files can be recovered from an image
/// whose superblock is damaged. A checksum mismatch is logged and reported,
/// and the file is written anyway.
pub fn extract(image: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<ExtractReport, Error> {
    let output = output.as_ref();
    let mut image = ImageFile::open(image)?;
    info!("Extracting {} to {}", image.path().display(), output.display());

    let mut report = ExtractReport::default();
    let mut buf = vec![0; READ_WRITE_BUF_SIZE];
    let mut cursor = RecordCursor::new();
    while let Some(record) = cursor.next_record(&mut image)? {
        let header = record.header;
        let relative = header.check_path()?;
        let target = output.join(relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(wrap_io_err!(parent, "Create directory"))?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target)
            .map_err(wrap_io_err!(target, "Create file"))?;

        let (total, checksum) =
            copy_and_checksum(EntryReader::new(&mut image, record), &mut file, &mut buf)
                .map_err(wrap_io_err!(target, "Copy entry"))?;
        let expected = u64::from(header.size());
        if total != expected {
            return Err(Error::LengthMismatch {
                entry: relative.to_path_buf(),
                actual: total,
                expected,
            });
        }

        file.set_modified(from_epoch_millis(header.timestamp()))
            .map_err(wrap_io_err!(target, "Set modification time"))?;

        let checksum_ok = checksum == header.checksum();
        if checksum_ok {
            debug!("{} ({})", relative.display(), format_size(total));
        } else {
            warn!(
                "{}: checksum mismatch (stored {:#010x}, computed {:#010x})",
                relative.display(),
                header.checksum(),
                checksum
            );
        }

        report.files.push(ExtractedFile {
            name: relative.to_string_lossy().into_owned(),
            size: header.size(),
            flags: header.flags(),
            checksum_ok,
        });
    }

    info!(
        "Extracted {} files ({}) to {}",
        report.files.len(),
        format_size(report.total_bytes()),
        output.display()
    );
    Ok(report)
}

/// Hex dump the structure of `image` to `out`: the start of the superblock,
/// every file header, and the offset of the end marker.
pub fn dump(image: impl AsRef<Path>, mut out: impl Write) -> Result<(), Error> {
    let mut image = ImageFile::open(image)?;
    let superblock = image.read_superblock()?;

    writeln!(out, "=== SUPERBLOCK (offset 0x0000) ===")
        .and_then(|()| hex_dump(&mut out, &superblock.as_bytes()[..SUPERBLOCK_DUMP_LEN]))
        .map_err(wrap_io_err!("Write dump"))?;

    let mut cursor = RecordCursor::new();
    while let Some(record) = cursor.next_record(&mut image)? {
        writeln!(out)
            .and_then(|()| {
                writeln!(
                    out,
                    "=== FILE {}: {} (offset 0x{:04X}) ===",
                    record.index + 1,
                    record.header.name(),
                    record.offset
                )
            })
            .and_then(|()| hex_dump(&mut out, record.header.as_bytes()))
            .map_err(wrap_io_err!("Write dump"))?;
    }

    if cursor.found_end_marker() {
        writeln!(out)
            .and_then(|()| writeln!(out, "=== END MARKER (offset 0x{:04X}) ===", cursor.offset()))
            .map_err(wrap_io_err!("Write dump"))?;
    }

    Ok(())
}

/// 16 bytes per line: offset, hex bytes, then printable ASCII
fn hex_dump(out: &mut impl Write, data: &[u8]) -> std::io::Result<()> {
    for (line, chunk) in data.chunks(16).enumerate() {
        write!(out, "{:04X}: ", line * 16)?;
        for i in 0..16 {
            match chunk.get(i) {
                Some(byte) => write!(out, "{:02X} ", byte)?,
                None => write!(out, "   ")?,
            }
        }
        let ascii: String = chunk
            .iter()
            .map(|&byte| if (32..127).contains(&byte) { byte as char } else { '.' })
            .collect();
        writeln!(out, " |{}|", ascii)?;
    }
    Ok(())
}

fn format_millis(millis: i64) -> String {
    if (0..=MAX_DISPLAY_MILLIS).contains(&millis) {
        humantime::format_rfc3339_millis(from_epoch_millis(millis)).to_string()
    } else {
        format!("{} ms from epoch", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::{format_millis, hex_dump};

    #[test]
    fn hex_dump_pads_short_lines() {
        let mut out = Vec::new();
        hex_dump(&mut out, b"FRAY\x00\x01").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("0000: 46 52 41 59 00 01 {} |FRAY..|\n", "   ".repeat(10)),
        );
    }

    #[test]
    fn hex_dump_full_lines() {
        let mut out = Vec::new();
        hex_dump(&mut out, &[b'A'; 32]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("0010: 41 41 "));
        assert!(lines[1].ends_with(&format!("|{}|", "A".repeat(16))));
    }

    #[test]
    fn millis_formatting() {
        assert_eq!(format_millis(1_700_000_000_000), "2023-11-14T22:13:20.000Z");
        assert_eq!(format_millis(-5), "-5 ms from epoch");
    }
}
