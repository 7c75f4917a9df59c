use std::error;
use std::fmt;

/// An error produced by this crate.
///
/// Mirrors the three-field shape used throughout this crate's teacher: a
/// code intended to be programmatically actionable, a broad class for
/// grouping, and a human-readable message.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Error {
    code: ErrorCode,
    class: ErrorClass,
    message: Box<str>,
}

/// Programmatically actionable error codes, per the error-handling design.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    GenericError,
    InvalidSpec,
    Exists,
    NotFound,
    WouldBlock,
    Busy,
    Transport,
    Invalid,
    Abort,
}

/// Broad grouping of where an error originated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    None,
    Refspec,
    Config,
    Remote,
    Reference,
    Net,
    Callback,
    Invalid,
}

impl Error {
    pub fn new<S: AsRef<str>>(code: ErrorCode, class: ErrorClass, message: S) -> Error {
        Error {
            code,
            class,
            message: message.as_ref().into(),
        }
    }

    pub fn from_str(s: &str) -> Error {
        Error {
            code: ErrorCode::GenericError,
            class: ErrorClass::None,
            message: s.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_code(&mut self, code: ErrorCode) {
        self.code = code;
    }

    pub fn set_class(&mut self, class: ErrorClass) {
        self.class = class;
    }

    pub fn invalid_spec<S: AsRef<str>>(message: S) -> Error {
        Error::new(ErrorCode::InvalidSpec, ErrorClass::Refspec, message)
    }

    pub fn not_found<S: AsRef<str>>(message: S) -> Error {
        Error::new(ErrorCode::NotFound, ErrorClass::Remote, message)
    }

    pub fn exists<S: AsRef<str>>(message: S) -> Error {
        Error::new(ErrorCode::Exists, ErrorClass::Remote, message)
    }

    pub fn would_block() -> Error {
        Error::new(
            ErrorCode::WouldBlock,
            ErrorClass::Net,
            "operation would block",
        )
    }

    pub fn busy() -> Error {
        Error::new(
            ErrorCode::Busy,
            ErrorClass::Remote,
            "an operation is already in flight on this remote",
        )
    }

    pub fn invalid<S: AsRef<str>>(message: S) -> Error {
        Error::new(ErrorCode::Invalid, ErrorClass::Invalid, message)
    }

    pub fn abort<S: AsRef<str>>(callback: S) -> Error {
        Error::new(
            ErrorCode::Abort,
            ErrorClass::Callback,
            format!("callback `{}` aborted the operation", callback.as_ref()),
        )
    }

    pub fn transport<S: AsRef<str>>(message: S) -> Error {
        Error::new(ErrorCode::Transport, ErrorClass::Net, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
