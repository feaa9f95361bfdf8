pub(crate) mod archives;
pub(crate) mod error;
pub(crate) mod parse;

use std::{
    fs::File,
    hash::Hasher,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regress::Regex;

use crate::{GameId, case_insensitive_regex, escape_ascii, logging};
use error::{InvalidFilenameReason, LoadPluginError, PluginParseError};
use parse::{ParsedPlugin, ResolvedId};

pub(crate) const GHOST_FILE_EXTENSION: &str = ".ghost";

static VERSION_REGEXES: LazyLock<Box<[Regex]>> = LazyLock::new(|| {
    /* The string below matches the range of version strings supported by
    Pseudosem v1.0.1, excluding space separators, as they make version
    extraction from inside sentences very tricky and have not been
    seen "in the wild". */
    let pseudosem_regex_str = r"(\d+(?:\.\d+)+(?:[-._:]?[A-Za-z0-9]+)*)(?!,)";

    let regexes = [
        /* The string below matches timestamps that use forwardslashes for date
        separators. However, Pseudosem v1.0.1 will only compare the first
        two digits as it does not recognise forwardslashes as separators. */
        r"(\d{1,2}/\d{1,2}/\d{1,4} \d{1,2}:\d{1,2}:\d{1,2})".to_owned(),
        String::from(r"version:?\s") + pseudosem_regex_str,
        String::from(r"(?:^|v|\s)") + pseudosem_regex_str,
        /* The string below matches a number containing one or more digits
        found at the start of the search string or preceded by 'v' or
        'version:'. */
        r"(?:^|v|version:\s*)(\d+)".to_owned(),
    ];

    regexes
        .iter()
        .filter_map(|r| case_insensitive_regex(r).ok())
        .collect()
});

/// The extent to which a plugin file's contents are read.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum LoadScope {
    HeaderOnly,
    WholePlugin,
}

impl std::fmt::Display for LoadScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadScope::HeaderOnly => write!(f, "plugin header"),
            LoadScope::WholePlugin => write!(f, "whole plugin"),
        }
    }
}

/// Represents a plugin file that has been loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct Plugin {
    name: String,
    data: ParsedPlugin,
    crc: Option<u32>,
    version: Option<String>,
    bash_tags: Vec<String>,
    archive_paths: Vec<PathBuf>,
}

impl Plugin {
    pub(crate) fn load(
        game_id: GameId,
        archive_paths: &[PathBuf],
        plugin_path: &Path,
        load_scope: LoadScope,
    ) -> Result<Self, LoadPluginError> {
        let name = name_string(game_id, plugin_path)?;

        let bytes = read_file(plugin_path)?;

        let header_only = load_scope == LoadScope::HeaderOnly;
        let data = match parse::parse_plugin(&bytes, game_id, &name, header_only) {
            Ok(data) => data,
            Err(PluginParseError::Truncated(partial)) => {
                logging::warning!(
                    "The plugin file \"{}\" ended unexpectedly, using the data read before the truncation point",
                    escape_ascii(plugin_path)
                );
                *partial
            }
            Err(e) => return Err(e.into()),
        };

        let crc = if header_only {
            None
        } else {
            Some(crc32(&bytes))
        };

        let mut plugin = Self {
            name,
            data,
            crc,
            version: None,
            bash_tags: Vec::new(),
            archive_paths: archives::find_associated_archives(
                game_id,
                archive_paths,
                plugin_path,
            ),
        };

        // Morrowind has no master flag bit; masters are .esm files.
        if game_id.header_magic() == b"TES3" {
            plugin.data.is_master = has_masters_extension(plugin_path);
        }

        if let Some(description) = &plugin.data.description {
            plugin.bash_tags = extract_bash_tags(description);
            plugin.version = extract_version(description);
        }

        Ok(plugin)
    }

    /// Get the plugin's filename.
    ///
    /// If the plugin was ghosted when it was loaded, this filename is without
    /// the .ghost suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the value of the version field in the `HEDR` subrecord of the
    /// plugin's header record.
    pub fn header_version(&self) -> Option<f32> {
        self.data.header_version
    }

    /// Get the plugin's version number from its description field.
    ///
    /// The description field may not contain a version number, or loadsmith
    /// may be unable to detect it. The description field parsing may fail to
    /// extract the version number correctly, though it functions correctly in
    /// all known cases.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Get the plugin's masters, in the order its header lists them.
    pub fn masters(&self) -> &[String] {
        &self.data.masters
    }

    /// Get any Bash Tags found in the plugin's description field.
    pub fn bash_tags(&self) -> &[String] {
        &self.bash_tags
    }

    /// Get the plugin's CRC-32 checksum.
    ///
    /// This will be `None` if the plugin is not fully loaded.
    pub fn crc(&self) -> Option<u32> {
        self.crc
    }

    /// Check if the plugin is a master plugin.
    ///
    /// What causes a plugin to be a master plugin varies by game, but it is
    /// usually indicated by the plugin having its master flag set and/or by
    /// its file extension.
    pub fn is_master(&self) -> bool {
        self.data.is_master
    }

    /// Check if the plugin is a light plugin.
    pub fn is_light_plugin(&self) -> bool {
        self.data.is_light
    }

    /// Check if the plugin's light flag bit is set, whether or not the game
    /// supports light plugins.
    pub fn has_light_flag(&self) -> bool {
        self.data.has_light_flag
    }

    /// Check if the plugin is a medium plugin.
    pub fn is_medium_plugin(&self) -> bool {
        self.data.is_medium
    }

    /// Check if the plugin is an update plugin.
    pub fn is_update_plugin(&self) -> bool {
        self.data.is_update
    }

    /// Check if the plugin is a blueprint plugin.
    pub fn is_blueprint_plugin(&self) -> bool {
        self.data.is_blueprint
    }

    /// Check if the plugin contains any records other than its header record.
    pub fn is_empty(&self) -> bool {
        self.data.record_count == 0
    }

    /// Check if the plugin loads an archive (BSA/BA2 depending on the game).
    pub fn loads_archive(&self) -> bool {
        !self.archive_paths.is_empty()
    }

    /// Check if all the FormIDs that the plugin introduces lie within the
    /// valid range for a light plugin.
    pub fn is_valid_as_light_plugin(&self) -> bool {
        self.data.is_valid_as_light_plugin()
    }

    /// Check if all the FormIDs that the plugin introduces lie within the
    /// valid range for a medium plugin.
    pub fn is_valid_as_medium_plugin(&self) -> bool {
        self.data.is_valid_as_medium_plugin()
    }

    /// Check if the plugin would be valid as an update plugin, i.e. it
    /// introduces no records of its own.
    pub fn is_valid_as_update_plugin(&self) -> bool {
        self.data.is_valid_as_update_plugin()
    }

    /// Check if the facts for this plugin were read from a truncated file.
    pub fn is_partially_loaded(&self) -> bool {
        self.data.is_partial
    }

    /// Check if two plugins contain a record with the same resolved ID.
    pub fn do_records_overlap(&self, other: &Plugin) -> bool {
        self.data
            .form_ids
            .intersection(&other.data.form_ids)
            .next()
            .is_some()
    }

    pub(crate) fn override_record_count(&self) -> usize {
        self.data.override_record_count
    }

    pub(crate) fn asset_count(&self) -> usize {
        self.archive_paths.len()
    }

    pub(crate) fn form_ids(&self) -> impl Iterator<Item = &ResolvedId> {
        self.data.form_ids.iter()
    }
}

pub(crate) fn validate_plugin_path_and_header(
    game_id: GameId,
    plugin_path: &Path,
) -> Result<(), error::PluginValidationError> {
    use error::{PluginValidationError, PluginValidationErrorReason};

    if !has_plugin_file_extension(game_id, plugin_path) {
        logging::debug!(
            "The file \"{}\" is not a valid plugin",
            escape_ascii(plugin_path)
        );
        return Err(PluginValidationError::invalid(
            plugin_path.into(),
            InvalidFilenameReason::UnsupportedFileExtension,
        ));
    }

    let mut magic = [0_u8; 4];
    let is_valid = File::open(plugin_path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .is_ok()
        && &magic == game_id.header_magic();

    if is_valid {
        Ok(())
    } else {
        logging::debug!(
            "The file \"{}\" is not a valid plugin",
            escape_ascii(plugin_path)
        );
        Err(PluginValidationError::new(
            plugin_path.into(),
            PluginValidationErrorReason::InvalidPluginHeader,
        ))
    }
}

pub(crate) fn has_plugin_file_extension(game_id: GameId, plugin_path: &Path) -> bool {
    let extension = if game_id != GameId::OpenMW && has_ascii_extension(plugin_path, "ghost") {
        plugin_path
            .file_stem()
            .and_then(|s| Path::new(s).extension())
    } else {
        plugin_path.extension()
    };

    if let Some(extension) = extension {
        extension.eq_ignore_ascii_case("esp")
            || extension.eq_ignore_ascii_case("esm")
            || (game_id.supports_esl_extension() && extension.eq_ignore_ascii_case("esl"))
    } else {
        false
    }
}

pub(crate) fn has_ascii_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn has_masters_extension(plugin_path: &Path) -> bool {
    let stem_extension = plugin_path
        .file_stem()
        .and_then(|s| Path::new(s).extension());

    has_ascii_extension(plugin_path, "esm")
        || (has_ascii_extension(plugin_path, "ghost")
            && stem_extension.is_some_and(|e| e.eq_ignore_ascii_case("esm")))
}

pub(crate) fn trim_dot_ghost(string: &str) -> &str {
    if iends_with_ascii(string, GHOST_FILE_EXTENSION) {
        string.get(..string.len() - GHOST_FILE_EXTENSION.len()).unwrap_or(string)
    } else {
        string
    }
}

pub(crate) fn iends_with_ascii(string: &str, suffix: &str) -> bool {
    string.len() >= suffix.len()
        && string
            .as_bytes()
            .iter()
            .rev()
            .zip(suffix.as_bytes().iter().rev())
            .all(|(string_byte, suffix_byte)| string_byte.eq_ignore_ascii_case(suffix_byte))
}

fn name_string(game_id: GameId, path: &Path) -> Result<String, LoadPluginError> {
    match path.file_name() {
        Some(f) => match f.to_str() {
            Some(f) if game_id == GameId::OpenMW => Ok(f.to_owned()),
            Some(f) => Ok(trim_dot_ghost(f).to_owned()),
            None => Err(LoadPluginError::InvalidFilename(
                InvalidFilenameReason::NonUnicode,
            )),
        },
        None => Err(LoadPluginError::InvalidFilename(
            InvalidFilenameReason::Empty,
        )),
    }
}

fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    Ok(bytes)
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.write(bytes);
    hasher.finalize()
}

/// Calculate the CRC-32 of the file at the given path without reading it all
/// into memory at once.
pub(crate) fn calculate_crc(path: &Path) -> std::io::Result<u32> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = crc32fast::Hasher::new();

    let mut buffer = reader.fill_buf()?;
    while !buffer.is_empty() {
        hasher.write(buffer);
        let length = buffer.len();
        reader.consume(length);

        buffer = reader.fill_buf()?;
    }

    Ok(hasher.finalize())
}

fn extract_bash_tags(description: &str) -> Vec<String> {
    let bash_tags_opener = "{{BASH:";

    if let Some(mut start_pos) = description.find(bash_tags_opener) {
        start_pos += bash_tags_opener.len();

        if let Some(end_pos) = description.get(start_pos..).and_then(|s| s.find("}}")) {
            return description
                .get(start_pos..start_pos + end_pos)
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_owned())
                .collect();
        }
    }
    Vec::new()
}

pub(crate) fn extract_version(text: &str) -> Option<String> {
    for regex in &*VERSION_REGEXES {
        let version = regex
            .find(text)
            .iter()
            .flat_map(|m| m.captures.iter())
            .flatten()
            .filter_map(|range| text.get(range.clone()))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_owned);

        if version.is_some() {
            return version;
        }
    }

    None
}
