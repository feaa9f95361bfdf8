/// Represents an error that occurred while reading the load order state from
/// its on-disk sources.
#[derive(Debug)]
#[non_exhaustive]
pub(crate) enum LoadOrderReadError {
    IoError(std::io::Error),
}

impl std::fmt::Display for LoadOrderReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(_) => write!(f, "failed to read the load order state"),
        }
    }
}

impl std::error::Error for LoadOrderReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for LoadOrderReadError {
    fn from(value: std::io::Error) -> Self {
        LoadOrderReadError::IoError(value)
    }
}

/// Represents an error that occurred while writing a new load order.
#[derive(Debug)]
#[non_exhaustive]
pub(crate) enum LoadOrderWriteError {
    /// The given load order does not start with the game's main master file.
    GameMasterMustLoadFirst(String),
    /// The given load order names a plugin that is not installed.
    PluginNotFound(String),
    IoError(std::io::Error),
}

impl std::fmt::Display for LoadOrderWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GameMasterMustLoadFirst(name) => {
                write!(f, "the game's master file \"{name}\" must load first")
            }
            Self::PluginNotFound(name) => {
                write!(f, "the plugin \"{name}\" is not installed")
            }
            Self::IoError(_) => write!(f, "failed to write the load order"),
        }
    }
}

impl std::error::Error for LoadOrderWriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LoadOrderWriteError {
    fn from(value: std::io::Error) -> Self {
        LoadOrderWriteError::IoError(value)
    }
}
