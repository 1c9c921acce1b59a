use std::collections::TryReserveError;
use std::{error, fmt, io, result};

/// The specific type of an error.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Wrap a [std::io::Error] raised by the input while reading.
    Io(io::Error),

    /// Indicate that growing a buffer or a record failed, either because the
    /// allocator refused or because the requested capacity overflowed.
    ResourceExhausted {
        /// Capacity, in elements, that could not be obtained
        requested: usize,
    },

    /// Indicate that a record could not be parsed. Never raised by the
    /// default permissive dialect.
    MalformedRecord {
        /// Index of the offending record, header included
        record: u64,
    },
}

/// An error occurring when parsing CSV data.
#[derive(Debug)]
pub struct Error(ErrorKind);

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub(crate) fn exhausted(requested: usize) -> Self {
        Self::new(ErrorKind::ResourceExhausted { requested })
    }

    /// Return whether the wrapped error is a [`std::io::Error`].
    pub fn is_io_error(&self) -> bool {
        matches!(self.0, ErrorKind::Io(_))
    }

    /// Return whether the error was caused by a failed allocation.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self.0, ErrorKind::ResourceExhausted { .. })
    }

    /// Return a reference to the underlying [`ErrorKind`].
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwraps the error into its underlying [`ErrorKind`].
    pub fn into_kind(self) -> ErrorKind {
        self.0
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self(ErrorKind::Io(err))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err.0 {
            ErrorKind::Io(inner) => return inner,
            ErrorKind::ResourceExhausted { .. } => io::ErrorKind::OutOfMemory,
            _ => io::ErrorKind::InvalidData,
        };

        Self::new(kind, err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.0 {
            ErrorKind::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::ResourceExhausted { requested } => write!(
                f,
                "CSV error: could not allocate room for {} elements",
                requested
            ),
            ErrorKind::MalformedRecord { record } => {
                write!(f, "CSV error: record {} is malformed", record)
            }
        }
    }
}

/// Map a failed reservation to [`ErrorKind::ResourceExhausted`].
pub(crate) fn exhausted_by(requested: usize) -> impl FnOnce(TryReserveError) -> Error {
    move |_| Error::exhausted(requested)
}

/// A type alias for `Result<T, push_csv::Error>`.
pub type Result<T> = result::Result<T, Error>;
