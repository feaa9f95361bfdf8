pub(crate) mod error;

use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use crate::{
    GameId, LoadOrderMethod, logging,
    plugin::{has_plugin_file_extension, trim_dot_ghost},
};
use error::{LoadOrderReadError, LoadOrderWriteError};

/// The capability through which load order files are read and written.
///
/// The game's load order is stored across up to three sources: a plugins
/// list (which may mark active plugins), plugin file timestamps, and a
/// loadorder.txt. Which sources a game uses depends on its
/// [LoadOrderMethod]; the others are ignored for that game.
pub trait LoadOrderFs: std::fmt::Debug {
    /// Read the lines of the plugins list file, or `None` if it does not
    /// exist.
    fn read_plugins_list(&self) -> std::io::Result<Option<Vec<String>>>;

    fn write_plugins_list(&self, lines: &[String]) -> std::io::Result<()>;

    /// Read the modification timestamps of the plugin files in the data
    /// directory, as seconds.
    fn read_timestamps(&self) -> std::io::Result<Vec<(String, i64)>>;

    fn write_timestamps(&self, timestamps: &[(String, i64)]) -> std::io::Result<()>;

    /// Read the lines of loadorder.txt, or `None` if it does not exist.
    fn read_loadorder_txt(&self) -> std::io::Result<Option<Vec<String>>>;

    fn write_loadorder_txt(&self, lines: &[String]) -> std::io::Result<()>;
}

/// A [LoadOrderFs] implementation over the real filesystem.
///
/// The plugins list is a `plugins.txt` in the game's local data directory,
/// except for OpenMW, where the content lines of `openmw.cfg` in the game
/// directory are presented as the plugins list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SystemLoadOrderFs {
    game_id: GameId,
    data_path: PathBuf,
    plugins_file_path: PathBuf,
    loadorder_file_path: PathBuf,
}

impl SystemLoadOrderFs {
    pub fn new(game_id: GameId, game_path: &Path, local_path: &Path) -> Self {
        let plugins_file_path = if game_id == GameId::OpenMW {
            game_path.join("openmw.cfg")
        } else {
            local_path.join("plugins.txt")
        };

        Self {
            game_id,
            data_path: game_id.data_path(game_path),
            plugins_file_path,
            loadorder_file_path: local_path.join("loadorder.txt"),
        }
    }

    /// Gets the path of the file that holds the list of active plugins.
    pub fn plugins_file_path(&self) -> &Path {
        &self.plugins_file_path
    }
}

fn read_lines(path: &Path) -> std::io::Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }

    let reader = BufReader::new(File::open(path)?);

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        lines.push(line.to_owned());
    }

    Ok(Some(lines))
}

fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

impl LoadOrderFs for SystemLoadOrderFs {
    fn read_plugins_list(&self) -> std::io::Result<Option<Vec<String>>> {
        let lines = read_lines(&self.plugins_file_path)?;

        if self.game_id == GameId::OpenMW {
            Ok(lines.map(|lines| {
                lines
                    .iter()
                    .filter_map(|l| l.strip_prefix("content="))
                    .map(str::to_owned)
                    .collect()
            }))
        } else {
            Ok(lines)
        }
    }

    fn write_plugins_list(&self, lines: &[String]) -> std::io::Result<()> {
        if self.game_id == GameId::OpenMW {
            // Preserve the non-content lines of openmw.cfg.
            let mut all_lines: Vec<String> = read_lines(&self.plugins_file_path)?
                .unwrap_or_default()
                .into_iter()
                .filter(|l| !l.starts_with("content="))
                .collect();

            all_lines.extend(lines.iter().map(|l| format!("content={l}")));

            write_lines(&self.plugins_file_path, &all_lines)
        } else {
            write_lines(&self.plugins_file_path, lines)
        }
    }

    fn read_timestamps(&self) -> std::io::Result<Vec<(String, i64)>> {
        if !self.data_path.exists() {
            return Ok(Vec::new());
        }

        let mut timestamps = Vec::new();
        for entry in std::fs::read_dir(&self.data_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let filename = entry.file_name();
            let Some(filename) = filename.to_str() else {
                continue;
            };

            if !has_plugin_file_extension(self.game_id, Path::new(filename)) {
                continue;
            }

            let timestamp = entry
                .metadata()?
                .modified()?
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
                .unwrap_or(0);

            timestamps.push((trim_dot_ghost(filename).to_owned(), timestamp));
        }

        Ok(timestamps)
    }

    fn write_timestamps(&self, timestamps: &[(String, i64)]) -> std::io::Result<()> {
        for (filename, timestamp) in timestamps {
            let mut path = self.data_path.join(filename);
            if !path.exists() {
                path = self.data_path.join(format!("{filename}.ghost"));
                if !path.exists() {
                    continue;
                }
            }

            let timestamp = u64::try_from(*timestamp).unwrap_or(0);
            let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(timestamp);
            File::options().write(true).open(path)?.set_modified(modified)?;
        }

        Ok(())
    }

    fn read_loadorder_txt(&self) -> std::io::Result<Option<Vec<String>>> {
        read_lines(&self.loadorder_file_path)
    }

    fn write_loadorder_txt(&self, lines: &[String]) -> std::io::Result<()> {
        write_lines(&self.loadorder_file_path, lines)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct LoadOrderEntry {
    name: String,
    is_active: bool,
}

/// The load order and active state of a game's installed plugins, abstracted
/// over how the game stores them.
#[derive(Debug)]
pub(crate) struct LoadOrderState {
    game_id: GameId,
    fs: Box<dyn LoadOrderFs>,
    entries: Vec<LoadOrderEntry>,
}

impl LoadOrderState {
    pub(crate) fn new(game_id: GameId, fs: Box<dyn LoadOrderFs>) -> Self {
        Self {
            game_id,
            fs,
            entries: Vec::new(),
        }
    }

    /// Load the current load order state from its on-disk sources and
    /// reconcile it against the given installed plugins.
    ///
    /// `installed` holds each installed plugin's filename and whether it is a
    /// master. Installed plugins missing from the sources are appended, with
    /// masters placed before the first non-master; listed plugins that are
    /// not installed are dropped.
    pub(crate) fn load(
        &mut self,
        installed: &[(String, bool)],
    ) -> Result<(), LoadOrderReadError> {
        let mut entries = match self.game_id.load_order_method() {
            LoadOrderMethod::Timestamp => self.load_timestamp_based()?,
            LoadOrderMethod::Textfile => self.load_textfile_based()?,
            LoadOrderMethod::Asterisk => self.load_asterisk_based()?,
            LoadOrderMethod::OpenMW => self.load_openmw()?,
        };

        entries.retain(|e| installed.iter().any(|(name, _)| unicase::eq(name.as_str(), e.name.as_str())));

        for (name, is_master) in installed {
            if entries.iter().any(|e| unicase::eq(e.name.as_str(), name.as_str())) {
                continue;
            }

            let entry = LoadOrderEntry {
                name: name.clone(),
                is_active: false,
            };

            let position = if *is_master {
                entries
                    .iter()
                    .position(|e| {
                        !installed
                            .iter()
                            .any(|(n, m)| *m && unicase::eq(n.as_str(), e.name.as_str()))
                    })
                    .unwrap_or(entries.len())
            } else {
                entries.len()
            };

            entries.insert(position, entry);
        }

        self.apply_implicitly_active_plugins(&mut entries);

        self.entries = entries;

        Ok(())
    }

    fn load_timestamp_based(&self) -> Result<Vec<LoadOrderEntry>, LoadOrderReadError> {
        let mut timestamps = self.fs.read_timestamps()?;
        // Tied timestamps are ordered by filename so that loading is
        // deterministic; the tie also makes the load order ambiguous.
        timestamps.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let active = self.read_active_plugins_list()?;

        Ok(timestamps
            .into_iter()
            .map(|(name, _)| {
                let is_active = is_listed(&active, &name);
                LoadOrderEntry { name, is_active }
            })
            .collect())
    }

    fn load_textfile_based(&self) -> Result<Vec<LoadOrderEntry>, LoadOrderReadError> {
        let order = self.fs.read_loadorder_txt()?.unwrap_or_default();
        let active = self.read_active_plugins_list()?;

        let mut entries: Vec<LoadOrderEntry> = order
            .into_iter()
            .map(|name| {
                let is_active = is_listed(&active, &name);
                LoadOrderEntry { name, is_active }
            })
            .collect();

        // Active plugins that loadorder.txt doesn't list still have load
        // order positions.
        for name in active {
            if !entries.iter().any(|e| unicase::eq(e.name.as_str(), name.as_str())) {
                entries.push(LoadOrderEntry {
                    name,
                    is_active: true,
                });
            }
        }

        Ok(entries)
    }

    fn load_asterisk_based(&self) -> Result<Vec<LoadOrderEntry>, LoadOrderReadError> {
        let lines = self.fs.read_plugins_list()?.unwrap_or_default();

        Ok(lines
            .into_iter()
            .map(|line| match line.strip_prefix('*') {
                Some(name) => LoadOrderEntry {
                    name: name.to_owned(),
                    is_active: true,
                },
                None => LoadOrderEntry {
                    name: line,
                    is_active: false,
                },
            })
            .collect())
    }

    fn load_openmw(&self) -> Result<Vec<LoadOrderEntry>, LoadOrderReadError> {
        let lines = self.fs.read_plugins_list()?.unwrap_or_default();

        Ok(lines
            .into_iter()
            .map(|name| LoadOrderEntry {
                name,
                is_active: true,
            })
            .collect())
    }

    fn read_active_plugins_list(&self) -> Result<Vec<String>, LoadOrderReadError> {
        Ok(self.fs.read_plugins_list()?.unwrap_or_default())
    }

    /// Implicitly active plugins are active whether or not they're listed,
    /// and load in their hardcoded order before everything else.
    fn apply_implicitly_active_plugins(&self, entries: &mut Vec<LoadOrderEntry>) {
        let implicit = self.game_id.implicitly_active_plugins();
        if implicit.is_empty() {
            return;
        }

        let mut head = Vec::new();
        for name in implicit {
            if let Some(position) = entries
                .iter()
                .position(|e| unicase::eq(e.name.as_str(), *name))
            {
                let mut entry = entries.remove(position);
                entry.is_active = true;
                head.push(entry);
            }
        }

        head.append(entries);
        *entries = head;
    }

    pub(crate) fn plugin_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub(crate) fn active_plugin_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.is_active)
            .map(|e| e.name.as_str())
            .collect()
    }

    pub(crate) fn is_active(&self, plugin_name: &str) -> bool {
        self.entries
            .iter()
            .find(|e| unicase::eq(e.name.as_str(), plugin_name))
            .map(|e| e.is_active)
            .unwrap_or(false)
    }

    pub(crate) fn index_of(&self, plugin_name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| unicase::eq(e.name.as_str(), plugin_name))
    }

    /// Check whether the on-disk sources agree about the load order.
    ///
    /// A timestamp-based load order is ambiguous when two plugins share a
    /// timestamp; a textfile-based one is ambiguous when the plugins list and
    /// loadorder.txt put the active plugins in different relative orders.
    pub(crate) fn is_ambiguous(&self) -> Result<bool, LoadOrderReadError> {
        match self.game_id.load_order_method() {
            LoadOrderMethod::Timestamp => {
                let mut timestamps: Vec<_> = self
                    .fs
                    .read_timestamps()?
                    .into_iter()
                    .map(|(_, t)| t)
                    .collect();
                timestamps.sort_unstable();

                Ok(timestamps
                    .windows(2)
                    .any(|w| w.first().zip(w.last()).is_some_and(|(a, b)| a == b)))
            }
            LoadOrderMethod::Textfile => {
                let order = self.fs.read_loadorder_txt()?.unwrap_or_default();
                let active = self.read_active_plugins_list()?;

                let positions: Vec<_> = active
                    .iter()
                    .filter_map(|name| {
                        order.iter().position(|o| unicase::eq(o.as_str(), name.as_str()))
                    })
                    .collect();

                Ok(positions
                    .windows(2)
                    .any(|w| w.first().zip(w.last()).is_some_and(|(a, b)| a >= b)))
            }
            LoadOrderMethod::Asterisk | LoadOrderMethod::OpenMW => Ok(false),
        }
    }

    /// Set and persist a new load order, writing every source the game uses
    /// so that no ambiguity remains.
    ///
    /// Plugins' active states are preserved.
    pub(crate) fn set_load_order(
        &mut self,
        plugin_names: &[&str],
    ) -> Result<(), LoadOrderWriteError> {
        let master_file = self.game_id.master_file();
        let master_installed = self
            .entries
            .iter()
            .any(|e| unicase::eq(e.name.as_str(), master_file));

        if master_installed
            && !plugin_names
                .first()
                .is_some_and(|n| unicase::eq(*n, master_file))
        {
            return Err(LoadOrderWriteError::GameMasterMustLoadFirst(
                master_file.to_owned(),
            ));
        }

        let mut new_entries = Vec::with_capacity(plugin_names.len());
        for name in plugin_names {
            match self
                .entries
                .iter()
                .find(|e| unicase::eq(e.name.as_str(), *name))
            {
                Some(entry) => new_entries.push(entry.clone()),
                None => return Err(LoadOrderWriteError::PluginNotFound((*name).to_owned())),
            }
        }

        // Installed plugins that the new order doesn't mention keep their
        // relative order at the end.
        for entry in &self.entries {
            if !new_entries
                .iter()
                .any(|e| unicase::eq(e.name.as_str(), entry.name.as_str()))
            {
                logging::debug!(
                    "The new load order does not position \"{}\", appending it",
                    entry.name
                );
                new_entries.push(entry.clone());
            }
        }

        self.save(&new_entries)?;
        self.entries = new_entries;

        Ok(())
    }

    fn save(&self, entries: &[LoadOrderEntry]) -> Result<(), LoadOrderWriteError> {
        match self.game_id.load_order_method() {
            LoadOrderMethod::Timestamp => {
                // Minute-spaced timestamps leave room to insert plugins
                // between two others without rewriting every file.
                const BASE_TIMESTAMP: i64 = 1_167_609_600;

                let timestamps: Vec<_> = entries
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        let offset = i64::try_from(i).unwrap_or(i64::MAX).saturating_mul(60);
                        (e.name.clone(), BASE_TIMESTAMP + offset)
                    })
                    .collect();
                self.fs.write_timestamps(&timestamps)?;

                self.fs.write_plugins_list(&active_names(entries))?;
            }
            LoadOrderMethod::Textfile => {
                let order: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
                self.fs.write_loadorder_txt(&order)?;

                self.fs.write_plugins_list(&active_names(entries))?;
            }
            LoadOrderMethod::Asterisk => {
                let implicit = self.game_id.implicitly_active_plugins();
                let lines: Vec<_> = entries
                    .iter()
                    .filter(|e| {
                        !implicit.iter().any(|i| unicase::eq(*i, e.name.as_str()))
                    })
                    .map(|e| {
                        if e.is_active {
                            format!("*{}", e.name)
                        } else {
                            e.name.clone()
                        }
                    })
                    .collect();
                self.fs.write_plugins_list(&lines)?;
            }
            LoadOrderMethod::OpenMW => {
                self.fs.write_plugins_list(&active_names(entries))?;
            }
        }

        Ok(())
    }
}

fn active_names(entries: &[LoadOrderEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.is_active)
        .map(|e| e.name.clone())
        .collect()
}

fn is_listed(names: &[String], name: &str) -> bool {
    names.iter().any(|n| unicase::eq(n.as_str(), name))
}
