//! Error types for YAML parsing with source locations.

use crate::SourceInfo;
use std::fmt;

/// Result type alias for unicfg-yaml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during YAML parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// YAML syntax error
    ParseError {
        message: String,
        location: Option<SourceInfo>,
    },

    /// Invalid YAML structure (aliases, unbalanced events)
    InvalidStructure {
        message: String,
        location: Option<SourceInfo>,
    },
}

impl Error {
    /// The message without the location suffix.
    pub fn message(&self) -> &str {
        match self {
            Error::ParseError { message, .. } | Error::InvalidStructure { message, .. } => message,
        }
    }

    /// Where the error was detected, if the scanner reported it.
    pub fn location(&self) -> Option<&SourceInfo> {
        match self {
            Error::ParseError { location, .. } | Error::InvalidStructure { location, .. } => {
                location.as_ref()
            }
        }
    }

    pub(crate) fn with_file(self, file: Option<&str>) -> Self {
        let Some(file) = file else {
            return self;
        };
        match self {
            Error::ParseError { message, location } => Error::ParseError {
                message,
                location: location.map(|l| l.with_file(file)),
            },
            Error::InvalidStructure { message, location } => Error::InvalidStructure {
                message,
                location: location.map(|l| l.with_file(file)),
            },
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ParseError { message, .. } => write!(f, "parse error: {}", message)?,
            Error::InvalidStructure { message, .. } => {
                write!(f, "invalid YAML structure: {}", message)?
            }
        }
        if let Some(location) = self.location() {
            write!(f, " at {}", location)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<yaml_rust2::ScanError> for Error {
    fn from(err: yaml_rust2::ScanError) -> Self {
        Error::ParseError {
            message: err.info().to_string(),
            location: Some(SourceInfo::from_marker(err.marker(), 0)),
        }
    }
}
