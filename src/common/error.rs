use std::io;

use crate::{IfName, RouteEntry};

/// Errors reported by the route table operations.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The kernel routing interface could not be opened.
    #[error("kernel routing interface unavailable: {source}")]
    ResourceUnavailable {
        #[source]
        source: io::Error,
    },
    #[error("failed to install route {entry}: {source}")]
    Install {
        entry: RouteEntry,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove route {entry}: {source}")]
    Remove {
        entry: RouteEntry,
        #[source]
        source: io::Error,
    },
    #[error("invalid interface name {name:?}: {reason}")]
    InvalidInterfaceName { name: String, reason: &'static str },
    #[error("interface {name} not found: {source}")]
    UnknownInterface {
        name: IfName,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RouteError>;

impl RouteError {
    fn io_source(&self) -> Option<&io::Error> {
        match self {
            RouteError::ResourceUnavailable { source }
            | RouteError::Install { source, .. }
            | RouteError::Remove { source, .. }
            | RouteError::UnknownInterface { source, .. } => Some(source),
            RouteError::InvalidInterfaceName { .. } => None,
        }
    }
    /// The platform error code carried by the failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_source().and_then(io::Error::raw_os_error)
    }
    /// The kernel refused an install because the route is already present.
    pub fn is_already_exists(&self) -> bool {
        self.raw_os_error() == Some(libc::EEXIST)
    }
    /// The kernel refused a removal because no such route exists.
    pub fn is_not_found(&self) -> bool {
        self.raw_os_error() == Some(libc::ESRCH)
    }
}

impl From<RouteError> for io::Error {
    fn from(e: RouteError) -> Self {
        match e {
            RouteError::ResourceUnavailable { source } => source,
            RouteError::InvalidInterfaceName { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
            e => {
                let kind = e.io_source().map_or(io::ErrorKind::Other, io::Error::kind);
                io::Error::new(kind, e)
            }
        }
    }
}

/// Why a line of the route table text could not be read as a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("missing {0} field")]
    MissingField(&'static str),
    #[error("{field} field {value:?} is not hexadecimal")]
    InvalidHex { field: &'static str, value: String },
    #[error("{field} field {value:?} is not a decimal number")]
    InvalidDecimal { field: &'static str, value: String },
    #[error("interface field {0:?} is not a valid interface name")]
    InvalidInterface(String),
    #[error("line is not valid UTF-8")]
    NotUtf8,
    /// Reading the line itself failed.
    #[error("read failed: {message}")]
    Io { kind: io::ErrorKind, message: String },
}

/// Enumeration met a record it could not parse, or a line it could not read.
///
/// Not fatal: the entries collected so far are still returned, but the
/// listing may be shorter than the kernel table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparseable route record at line {line}: {cause}")]
pub struct ParseTruncation {
    /// 1-based line number, counting the header.
    pub line: usize,
    pub cause: RecordError,
}
