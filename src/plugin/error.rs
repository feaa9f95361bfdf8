use std::path::PathBuf;

use crate::escape_ascii;

/// Represents an error that occurred while parsing a plugin file's contents.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub(crate) enum PluginParseError {
    /// The file does not start with the header record that the game expects.
    NotAPlugin,
    /// The file ended part-way through a record. The facts parsed up to that
    /// point are carried so that the caller can choose to use them.
    Truncated(Box<super::parse::ParsedPlugin>),
}

impl std::fmt::Display for PluginParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAPlugin => write!(f, "the file is not a plugin"),
            Self::Truncated(_) => write!(f, "the plugin file ended unexpectedly mid-record"),
        }
    }
}

impl std::error::Error for PluginParseError {}

/// Represents an error that occurred while loading a plugin file.
#[derive(Debug)]
#[non_exhaustive]
pub(crate) enum LoadPluginError {
    InvalidFilename(InvalidFilenameReason),
    IoError(std::io::Error),
    ParsingError(PluginParseError),
}

impl std::fmt::Display for LoadPluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFilename(i) => i.fmt(f),
            Self::IoError(_) => write!(f, "an I/O error occurred"),
            Self::ParsingError(_) => write!(f, "failed to parse plugin data"),
        }
    }
}

impl std::error::Error for LoadPluginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidFilename(_) => None,
            Self::IoError(e) => Some(e),
            Self::ParsingError(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for LoadPluginError {
    fn from(value: std::io::Error) -> Self {
        LoadPluginError::IoError(value)
    }
}

impl From<PluginParseError> for LoadPluginError {
    fn from(value: PluginParseError) -> Self {
        LoadPluginError::ParsingError(value)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub(crate) enum InvalidFilenameReason {
    Empty,
    NonUnicode,
    NonUnique,
    UnsupportedFileExtension,
}

impl std::fmt::Display for InvalidFilenameReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "is empty"),
            Self::NonUnicode => write!(f, "cannot be represented in UTF-8"),
            Self::NonUnique => write!(f, "is not unique"),
            Self::UnsupportedFileExtension => {
                write!(f, "does not have a supported plugin file extension")
            }
        }
    }
}

/// Represents an error that occurred when validating plugins before loading
/// them.
#[derive(Debug)]
pub(crate) struct PluginValidationError {
    path: PathBuf,
    reason: PluginValidationErrorReason,
}

impl PluginValidationError {
    pub(crate) fn new(path: PathBuf, reason: PluginValidationErrorReason) -> Self {
        Self { path, reason }
    }

    pub(crate) fn invalid(path: PathBuf, reason: InvalidFilenameReason) -> Self {
        Self {
            path,
            reason: PluginValidationErrorReason::InvalidFilename(reason),
        }
    }
}

impl std::fmt::Display for PluginValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            PluginValidationErrorReason::InvalidFilename(i) => write!(
                f,
                "the path \"{}\" has a filename that {}",
                escape_ascii(&self.path),
                i
            ),
            PluginValidationErrorReason::InvalidPluginHeader => write!(
                f,
                "the file at \"{}\" does not have a valid plugin header",
                escape_ascii(&self.path)
            ),
        }
    }
}

impl std::error::Error for PluginValidationError {}

#[derive(Clone, Copy, Debug)]
pub(crate) enum PluginValidationErrorReason {
    InvalidFilename(InvalidFilenameReason),
    InvalidPluginHeader,
}
