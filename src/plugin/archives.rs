use std::path::{Path, PathBuf};

use crate::{GameId, logging};

use super::has_ascii_extension;

/// Find the archive files in the data directory that the given plugin causes
/// the game to load.
///
/// Which archives a plugin loads is a filename convention that varies by
/// game: Oblivion loads any archive whose name starts with the plugin's
/// basename, while the later games load exact-name archives plus a set of
/// suffixed variants. Morrowind and OpenMW don't load archives per-plugin.
pub(crate) fn find_associated_archives(
    game_id: GameId,
    archive_paths: &[PathBuf],
    plugin_path: &Path,
) -> Vec<PathBuf> {
    let Some(stem) = plugin_path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };

    match game_id {
        GameId::Morrowind | GameId::OpenMW => Vec::new(),
        GameId::Oblivion | GameId::Nehrim => archive_paths
            .iter()
            .filter(|path| archive_stem(path).is_some_and(|a| istarts_with_ascii(a, stem)))
            .cloned()
            .collect(),
        _ => archive_paths
            .iter()
            .filter(|path| {
                archive_stem(path).is_some_and(|a| {
                    unicase::eq(a, stem)
                        || istarts_with_ascii(a, &format!("{stem} - "))
                })
            })
            .cloned()
            .collect(),
    }
}

/// List the paths of all archive files in the given directory.
pub(crate) fn find_archives(game_id: GameId, data_path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let extension = game_id.archive_file_extension();

    if !data_path.exists() {
        return Ok(Vec::new());
    }

    let paths: Vec<_> = std::fs::read_dir(data_path)?
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_type().map(|f| f.is_file()).unwrap_or(false)
                && has_ascii_extension(&e.path(), extension.trim_start_matches('.'))
        })
        .map(|e| e.path())
        .collect();

    logging::trace!(
        "Found {} {} archive(s) in \"{}\"",
        paths.len(),
        extension,
        crate::escape_ascii(data_path)
    );

    Ok(paths)
}

fn archive_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

fn istarts_with_ascii(string: &str, prefix: &str) -> bool {
    string.len() >= prefix.len()
        && string
            .as_bytes()
            .iter()
            .zip(prefix.as_bytes().iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}
