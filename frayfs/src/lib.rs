mod builder;
mod error;
pub mod ext;
mod image;
mod memory;
mod reader;

pub use builder::*;
pub use error::*;
pub use image::*;
pub use memory::*;
pub use reader::*;

pub use frayfs_core;

use std::time::{SystemTime, UNIX_EPOCH};

const READ_WRITE_BUF_SIZE: usize = 4 * 1024 * 1024;

/// Milliseconds since the Unix epoch, negative for earlier times
pub fn epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis())
            .map(|millis| -millis)
            .unwrap_or(i64::MIN),
    }
}

/// Inverse of [`epoch_millis`]
pub fn from_epoch_millis(millis: i64) -> SystemTime {
    let offset = std::time::Duration::from_millis(millis.unsigned_abs());
    if millis >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

/// Format a byte count with a binary unit, e.g. `1.5 KB`
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}
