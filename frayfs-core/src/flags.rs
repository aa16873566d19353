use core::fmt;

bitflags::bitflags! {
    /// File attributes stored in a file header
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileFlags: u32 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const EXECUTABLE = 0x08;
    }
}

impl FileFlags {
    /// Executables are recognized by name only
    pub fn from_file_name(name: &str) -> FileFlags {
        if name.ends_with(".bin") || name.ends_with(".exe") {
            FileFlags::EXECUTABLE
        } else {
            FileFlags::empty()
        }
    }
}

/// Formats as `[RHSX]`, listing only the set flags; empty when none are set.
/// Unknown bits are ignored.
impl fmt::Display for FileFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        f.write_str("[")?;
        for (flag, c) in [
            (FileFlags::READ_ONLY, "R"),
            (FileFlags::HIDDEN, "H"),
            (FileFlags::SYSTEM, "S"),
            (FileFlags::EXECUTABLE, "X"),
        ] {
            if self.contains(flag) {
                f.write_str(c)?;
            }
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::FileFlags;

    #[test]
    fn executable_suffixes() {
        assert_eq!(FileFlags::from_file_name("bin/kernel.bin"), FileFlags::EXECUTABLE);
        assert_eq!(FileFlags::from_file_name("setup.exe"), FileFlags::EXECUTABLE);
        assert_eq!(FileFlags::from_file_name("boot/init.txt"), FileFlags::empty());
        assert_eq!(FileFlags::from_file_name("bin"), FileFlags::empty());
    }

    #[test]
    fn display() {
        assert_eq!(FileFlags::empty().to_string(), "");
        assert_eq!(FileFlags::EXECUTABLE.to_string(), "[X]");
        assert_eq!((FileFlags::READ_ONLY | FileFlags::HIDDEN).to_string(), "[RH]");
        assert_eq!(FileFlags::all().to_string(), "[RHSX]");
    }
}
