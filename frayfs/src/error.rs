use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Core(#[from] frayfs_core::Error),

    #[error("{context}{}", fmt_path(.path))]
    Io {
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
        context: &'static str,
    },

    #[error("Invalid path component {component:?} in archived name {entry:?}")]
    InvalidPath { entry: PathBuf, component: PathBuf },

    #[error("Entry {entry:?} size mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        entry: PathBuf,
        actual: u64,
        expected: u64,
    },

    #[error("{path:?} is too large to archive ({size} bytes, limit is 4 GiB)")]
    FileTooLarge { path: PathBuf, size: u64 },
}

fn fmt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(": {}", path.display()),
        None => String::new(),
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}")?;

        let mut source = self.source();
        while let Some(err) = source {
            writeln!(f, "\tCaused by: {err}")?;
            source = err.source();
        }

        Ok(())
    }
}

impl Error {
    /// Attach a path to an I/O error that was created without one
    pub fn path(self, path: impl AsRef<Path>) -> Error {
        match self {
            Error::Io {
                source,
                path: None,
                context,
            } => Error::Io {
                source,
                path: Some(path.as_ref().to_path_buf()),
                context,
            },
            other => other,
        }
    }
}

/// Build a closure for `map_err` that wraps an [`io::Error`] into
/// [`Error::Io`], optionally with the path that was being accessed.
#[macro_export]
macro_rules! wrap_io_err {
    ($path:expr, $context:expr) => {
        |source| $crate::Error::Io {
            source,
            path: Some(::std::path::Path::to_path_buf(::std::convert::AsRef::as_ref(&$path))),
            context: $context,
        }
    };
    ($context:expr) => {
        |source| $crate::Error::Io {
            source,
            path: None,
            context: $context,
        }
    };
}
