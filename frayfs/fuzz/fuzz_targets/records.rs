#![no_main]
use frayfs_core::{ImageSrc, RecordCursor};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut image = data;
    let _superblock = image.read_superblock();

    let mut cursor = RecordCursor::new();
    let mut buf = [0; 256];
    while let Ok(Some(record)) = cursor.next_record(&mut image) {
        let _count = image.read_entry(&record, 0, &mut buf);
    }
});
