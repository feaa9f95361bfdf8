// Allow some lints that are denied at the workspace level.
#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::wildcard_enum_match_arm
)]
#![cfg_attr(
    test,
    allow(
        clippy::assertions_on_result_states,
        clippy::indexing_slicing,
        clippy::panic,
        clippy::unwrap_used,
    )
)]

mod conditions;
mod database;
pub mod error;
mod game;
mod load_order;
mod logging;
pub mod metadata;
mod plugin;
mod sorting;
mod validity;
mod version;

use std::{path::Path, slice::EscapeAscii};

use regress::{Error as RegexImplError, Regex};

pub use conditions::ConditionState;
pub use database::{Database, WriteMode};
pub use game::{GameId, GameSession, LoadOrderMethod};
pub use load_order::{LoadOrderFs, SystemLoadOrderFs};
pub use logging::{LogLevel, set_logging_callback};
pub use plugin::Plugin;
pub use sorting::vertex::{EdgeType, Vertex};
pub use validity::{MessageSource, SourcedMessage};
pub use version::{
    LOADSMITH_VERSION_MAJOR, LOADSMITH_VERSION_MINOR, LOADSMITH_VERSION_PATCH, is_compatible,
    loadsmith_revision, loadsmith_version,
};

fn case_insensitive_regex(value: &str) -> Result<Regex, Box<RegexImplError>> {
    Regex::with_flags(value, "iu").map_err(Into::into)
}

fn escape_ascii(path: &Path) -> EscapeAscii<'_> {
    path.as_os_str().as_encoded_bytes().escape_ascii()
}
