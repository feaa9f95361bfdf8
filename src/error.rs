//! Holds the crate's error types, aside from those related to metadata.
use std::path::PathBuf;

pub use crate::conditions::error::{ConditionError, ConditionEvalError, ConditionParseError};
use crate::escape_ascii;
pub use crate::metadata::error::{
    LoadMetadataError, MultilingualMessageContentsError, ParseMetadataError, RegexError,
    WriteMetadataError,
};
pub use crate::sorting::error::GroupsPathError;

use crate::Vertex;
use crate::load_order::error::{LoadOrderReadError, LoadOrderWriteError};
use crate::sorting::error::{CyclicInteractionError, SortingError, display_cycle};

/// Represents an error that occurred while trying to create a
/// [GameSession][crate::GameSession].
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SessionCreationError {
    /// The given game path does not resolve to a directory.
    NotADirectory(PathBuf),
}

impl std::fmt::Display for SessionCreationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotADirectory(p) => write!(
                f,
                "the path \"{}\" does not resolve to a directory",
                escape_ascii(p)
            ),
        }
    }
}

impl std::error::Error for SessionCreationError {}

/// Represents an error that occurred while trying to interact with the load
/// order.
#[derive(Debug)]
#[non_exhaustive]
pub enum LoadOrderError {
    ReadFailure(Box<dyn std::error::Error + Send + Sync + 'static>),
    WriteFailure(Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The given load order is invalid, e.g. it does not start with the
    /// game's main master file or contains a plugin that is not installed.
    InvalidLoadOrder(String),
}

impl std::fmt::Display for LoadOrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailure(_) => write!(f, "failed to read the load order"),
            Self::WriteFailure(_) => write!(f, "failed to write the load order"),
            Self::InvalidLoadOrder(detail) => write!(f, "the given load order is invalid: {detail}"),
        }
    }
}

impl std::error::Error for LoadOrderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailure(e) | Self::WriteFailure(e) => Some(e.as_ref()),
            Self::InvalidLoadOrder(_) => None,
        }
    }
}

impl From<LoadOrderReadError> for LoadOrderError {
    fn from(value: LoadOrderReadError) -> Self {
        LoadOrderError::ReadFailure(Box::new(value))
    }
}

impl From<LoadOrderWriteError> for LoadOrderError {
    fn from(value: LoadOrderWriteError) -> Self {
        match value {
            LoadOrderWriteError::GameMasterMustLoadFirst(_)
            | LoadOrderWriteError::PluginNotFound(_) => {
                LoadOrderError::InvalidLoadOrder(value.to_string())
            }
            LoadOrderWriteError::IoError(_) => LoadOrderError::WriteFailure(Box::new(value)),
        }
    }
}

/// Represents an error that occurred while loading plugins.
#[derive(Debug)]
#[non_exhaustive]
pub enum LoadPluginsError {
    IoError(Box<std::io::Error>),
    LoadOrderError(LoadOrderError),
    /// The operation was cancelled before it completed; no state was
    /// changed.
    Cancelled,
}

impl std::fmt::Display for LoadPluginsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(_) => write!(f, "an I/O error occurred"),
            Self::LoadOrderError(_) => write!(f, "failed to load the current load order state"),
            Self::Cancelled => write!(f, "the operation was cancelled"),
        }
    }
}

impl std::error::Error for LoadPluginsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            Self::LoadOrderError(e) => Some(e),
            Self::Cancelled => None,
        }
    }
}

impl From<std::io::Error> for LoadPluginsError {
    fn from(value: std::io::Error) -> Self {
        LoadPluginsError::IoError(Box::new(value))
    }
}

impl From<LoadOrderReadError> for LoadPluginsError {
    fn from(value: LoadOrderReadError) -> Self {
        LoadPluginsError::LoadOrderError(value.into())
    }
}

/// Represents an error that occurred while retrieving merged metadata.
#[derive(Debug)]
#[non_exhaustive]
pub enum MetadataRetrievalError {
    RegexError(RegexError),
    ConditionError(Box<ConditionError>),
}

impl std::fmt::Display for MetadataRetrievalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegexError(_) => write!(f, "failed to match a regex plugin entry"),
            Self::ConditionError(_) => write!(f, "failed to evaluate a metadata condition"),
        }
    }
}

impl std::error::Error for MetadataRetrievalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RegexError(e) => Some(e),
            Self::ConditionError(e) => Some(e.as_ref()),
        }
    }
}

impl From<RegexError> for MetadataRetrievalError {
    fn from(value: RegexError) -> Self {
        MetadataRetrievalError::RegexError(value)
    }
}

impl From<ConditionError> for MetadataRetrievalError {
    fn from(value: ConditionError) -> Self {
        MetadataRetrievalError::ConditionError(Box::new(value))
    }
}

/// Represents an error that occurred during sorting.
#[derive(Debug)]
#[non_exhaustive]
pub enum SortPluginsError {
    PluginNotLoaded(String),
    MetadataRetrievalError(MetadataRetrievalError),
    UndefinedGroup(String),
    CycleFound(Vec<Vertex>),
    CycleFoundInvolving(String),
    PathfindingError(Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The operation was cancelled before it completed.
    Cancelled,
}

impl std::fmt::Display for SortPluginsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PluginNotLoaded(n) => write!(f, "the plugin \"{n}\" has not been loaded"),
            Self::UndefinedGroup(g) => write!(f, "the group \"{g}\" does not exist"),
            Self::CycleFound(c) => write!(f, "found a cycle: {}", display_cycle(c)),
            Self::CycleFoundInvolving(n) => write!(f, "found a cycle involving \"{n}\""),
            Self::MetadataRetrievalError(_) => write!(f, "failed to retrieve plugin metadata"),
            Self::PathfindingError(_) => write!(f, "failed to find a path in the plugins graph"),
            Self::Cancelled => write!(f, "the operation was cancelled"),
        }
    }
}

impl std::error::Error for SortPluginsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MetadataRetrievalError(e) => Some(e),
            Self::PathfindingError(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<SortingError> for SortPluginsError {
    fn from(value: SortingError) -> Self {
        match value {
            SortingError::UndefinedGroup(g) => Self::UndefinedGroup(g.into_group_name()),
            SortingError::CycleFound(c) => Self::CycleFound(c.into_cycle()),
            SortingError::CycleInvolving(n) => Self::CycleFoundInvolving(n),
            SortingError::PathfindingError(e) => Self::PathfindingError(Box::new(e)),
        }
    }
}

impl From<crate::sorting::error::BuildGroupsGraphError> for SortPluginsError {
    fn from(value: crate::sorting::error::BuildGroupsGraphError) -> Self {
        match value {
            crate::sorting::error::BuildGroupsGraphError::UndefinedGroup(g) => {
                Self::UndefinedGroup(g.into_group_name())
            }
            crate::sorting::error::BuildGroupsGraphError::CycleFound(c) => {
                Self::CycleFound(c.into_cycle())
            }
        }
    }
}

impl From<CyclicInteractionError> for SortPluginsError {
    fn from(value: CyclicInteractionError) -> Self {
        SortPluginsError::CycleFound(value.into_cycle())
    }
}

impl From<MetadataRetrievalError> for SortPluginsError {
    fn from(value: MetadataRetrievalError) -> Self {
        SortPluginsError::MetadataRetrievalError(value)
    }
}
