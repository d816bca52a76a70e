//! Error handling for the psrsearch library
//!
//! Every fallible operation returns [`Result`]. Request validation failures
//! are reported as [`Error::Mode`], [`Error::Config`] or [`Error::Format`]
//! before any row is read. Failures of the underlying table store (missing
//! file, malformed header card, truncated row) surface as [`Error::Io`],
//! including cfitsio errors.

use std::io;

use thiserror::Error;

/// A specialized Result type for psrsearch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for psrsearch operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error, including malformed or truncated table data
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not hold search-mode data
    #[error("Mode error: {0}")]
    Mode(String),

    /// A request parameter does not fit the observation layout
    #[error("Config error: {0}")]
    Config(String),

    /// Unsupported sample encoding or inconsistent column layout
    #[error("Format error: {0}")]
    Format(String),

    /// The request was cancelled between rows
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a mode error with a custom message
    pub fn mode<S: Into<String>>(msg: S) -> Self {
        Error::Mode(msg.into())
    }

    /// Create a config error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a format error with a custom message
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    /// Malformed container content, reported through the I/O channel
    pub(crate) fn invalid_data<S: Into<String>>(msg: S) -> Self {
        Error::Io(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
    }

    /// Container content ended before the declared size
    pub(crate) fn truncated<S: Into<String>>(msg: S) -> Self {
        Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, msg.into()))
    }
}

// cfitsio status codes
const FILE_NOT_OPENED: i32 = 104;
const END_OF_FILE: i32 = 107;
const READ_ERROR: i32 = 108;

impl From<fitsio::errors::Error> for Error {
    fn from(err: fitsio::errors::Error) -> Self {
        let kind = match &err {
            fitsio::errors::Error::Fits(e) => match e.status {
                FILE_NOT_OPENED => io::ErrorKind::NotFound,
                END_OF_FILE | READ_ERROR => io::ErrorKind::UnexpectedEof,
                _ => io::ErrorKind::InvalidData,
            },
            _ => io::ErrorKind::InvalidData,
        };
        Error::Io(io::Error::new(kind, err.to_string()))
    }
}
