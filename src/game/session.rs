use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    Database, GameId, LoadOrderFs, SystemLoadOrderFs,
    conditions::ConditionState,
    error::{
        LoadOrderError, LoadPluginsError, MetadataRetrievalError, SessionCreationError,
        SortPluginsError,
    },
    escape_ascii,
    load_order::LoadOrderState,
    logging::{self, format_details},
    metadata::{Filename, error::LoadMetadataError},
    plugin::{
        LoadScope, Plugin, archives::find_archives, has_plugin_file_extension,
    },
    sorting::{
        groups::build_groups_graph,
        plugins::{PluginSortingData, sort_plugins},
    },
    validity::{
        MessageSource, SourcedMessage, ValidityContext, check_active_plugin_counts,
        check_install_validity,
    },
};

/// A session for one installed game: the façade through which plugins are
/// loaded, metadata is evaluated and load orders are calculated and applied.
#[derive(Debug)]
pub struct GameSession {
    game_id: GameId,
    data_path: PathBuf,
    database: Database,
    load_order: LoadOrderState,
    plugins: HashMap<Filename, Plugin>,
    evaluated_metadata: HashMap<Filename, crate::metadata::PluginMetadata>,
    language: String,
    cancel_flag: Arc<AtomicBool>,
}

impl GameSession {
    /// Create a session for the game installed at `game_path`, using the
    /// real filesystem to read and write load order files.
    ///
    /// `local_path` is the directory holding the game's load order files,
    /// usually under the user's local application data.
    pub fn new(
        game_id: GameId,
        game_path: &Path,
        local_path: &Path,
    ) -> Result<Self, SessionCreationError> {
        let fs = SystemLoadOrderFs::new(game_id, game_path, local_path);

        Self::with_load_order_fs(game_id, game_path, Box::new(fs))
    }

    /// Create a session that reads and writes load order state through the
    /// given capability.
    pub fn with_load_order_fs(
        game_id: GameId,
        game_path: &Path,
        fs: Box<dyn LoadOrderFs>,
    ) -> Result<Self, SessionCreationError> {
        logging::info!(
            "Creating a game session for \"{}\" at \"{}\"",
            game_id,
            escape_ascii(game_path)
        );

        let resolved_game_path = resolve_path(game_path);
        if !resolved_game_path.is_dir() {
            return Err(SessionCreationError::NotADirectory(game_path.into()));
        }

        let data_path = game_id.data_path(&resolved_game_path);

        let condition_state = ConditionState::new(game_id, data_path.clone());

        Ok(Self {
            game_id,
            data_path,
            database: Database::new(condition_state),
            load_order: LoadOrderState::new(game_id, fs),
            plugins: HashMap::new(),
            evaluated_metadata: HashMap::new(),
            language: "en".to_owned(),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get the session's game.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Get the path of the game's data directory.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Set the language used when selecting localised message content.
    pub fn set_language(&mut self, language: String) {
        self.language = language;
    }

    /// Check if a file is a valid plugin.
    ///
    /// The check is not exhaustive: it checks that the file has a plugin
    /// file extension for the game and starts with the game's header record
    /// magic. Relative paths are resolved against the game's data directory.
    pub fn is_valid_plugin(&self, plugin_path: &Path) -> bool {
        let resolved_path = self.data_path.join(plugin_path);
        crate::plugin::validate_plugin_path_and_header(self.game_id, &resolved_path).is_ok()
    }

    /// Get the object used for accessing metadata-related functionality.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get a mutable reference to the object used for accessing
    /// metadata-related functionality.
    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    /// Get a flag that can be set from another thread to cooperatively
    /// cancel a running [GameSession::load_data] or [GameSession::sort]
    /// call.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    fn is_cancelled(&self) -> bool {
        if self.cancel_flag.load(Ordering::Relaxed) {
            self.cancel_flag.store(false, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Scan the data directory, parse every plugin in it, and refresh the
    /// load order state.
    ///
    /// Previously loaded plugin data is discarded, the condition cache is
    /// cleared, and the condition evaluator state is re-seeded from the
    /// loaded plugins. If the session's cancellation flag is set while
    /// loading, partial state is discarded.
    pub fn load_data(&mut self) -> Result<(), LoadPluginsError> {
        logging::trace!(
            "Scanning for plugins in \"{}\"",
            escape_ascii(&self.data_path)
        );

        let plugin_paths = find_plugin_files(self.game_id, &self.data_path)?;

        let archive_paths = find_archives(self.game_id, &self.data_path)?;

        let cancel_flag = Arc::clone(&self.cancel_flag);
        let game_id = self.game_id;

        let plugins: Vec<Plugin> = plugin_paths
            .into_par_iter()
            .filter_map(|path| {
                if cancel_flag.load(Ordering::Relaxed) {
                    return None;
                }

                try_load_plugin(game_id, &archive_paths, &path)
            })
            .collect();

        if self.is_cancelled() {
            return Err(LoadPluginsError::Cancelled);
        }

        self.plugins.clear();
        for plugin in plugins {
            let filename = Filename::new(plugin.name().to_owned());
            if let Some(old) = self.plugins.insert(filename, plugin) {
                // A plugin and its ghosted copy can coexist on disk; only
                // one of them can be loaded.
                logging::warning!(
                    "The plugin \"{}\" has a filename that {}, discarding the copy loaded first",
                    old.name(),
                    crate::plugin::error::InvalidFilenameReason::NonUnique
                );
            }
        }
        self.evaluated_metadata.clear();

        let mut installed: Vec<(String, bool)> = self
            .plugins
            .values()
            .map(|p| (p.name().to_owned(), p.is_master()))
            .collect();
        // Plugins that no load order source positions are appended in name
        // order, so that loading is deterministic.
        installed.sort_by(|a, b| a.0.cmp(&b.0));

        self.load_order.load(&installed)?;

        self.refresh_condition_state();

        Ok(())
    }

    /// Re-seed the condition evaluator state from the loaded plugins and
    /// current load order, clearing the condition cache.
    fn refresh_condition_state(&mut self) {
        let active: Vec<&str> = self.load_order.active_plugin_names();
        let plugins: Vec<&Plugin> = self.plugins.values().collect();

        let state = self.database.condition_state_mut();
        state.set_active_plugins(&active);
        state.set_loaded_plugins(&plugins);
        state.clear_condition_cache();
    }

    /// Get data for all loaded plugins.
    pub fn plugins(&self) -> Vec<&Plugin> {
        self.plugins.values().collect()
    }

    /// Get data for a loaded plugin.
    pub fn plugin(&self, plugin_name: &str) -> Option<&Plugin> {
        self.plugins.get(&Filename::new(plugin_name.to_owned()))
    }

    /// Get the current load order.
    pub fn current_load_order(&self) -> Vec<&str> {
        self.load_order.plugin_names()
    }

    /// Check if the given plugin is active.
    pub fn is_active(&self, plugin_name: &str) -> bool {
        self.load_order.is_active(plugin_name)
    }

    /// Check if the load order's on-disk sources are ambiguous.
    pub fn is_load_order_ambiguous(&self) -> Result<bool, LoadOrderError> {
        Ok(self.load_order.is_ambiguous()?)
    }

    /// Load the masterlist and optionally a userlist and prelude from the
    /// given paths.
    pub fn load_metadata(
        &mut self,
        masterlist_path: &Path,
        userlist_path: Option<&Path>,
        prelude_path: Option<&Path>,
    ) -> Result<(), LoadMetadataError> {
        match prelude_path {
            Some(prelude_path) => self
                .database
                .load_masterlist_with_prelude(masterlist_path, prelude_path)?,
            None => self.database.load_masterlist(masterlist_path)?,
        }

        if let Some(userlist_path) = userlist_path {
            self.database.load_userlist(userlist_path)?;
        }

        self.evaluated_metadata.clear();
        self.database.clear_condition_cache();

        Ok(())
    }

    /// Evaluate the conditions in every loaded plugin's merged metadata,
    /// caching the results for use by [GameSession::messages_for] and
    /// [GameSession::sort].
    ///
    /// The condition cache is cleared first, so changes to the filesystem
    /// since the last evaluation are picked up.
    pub fn evaluate_metadata(&mut self) -> Result<(), MetadataRetrievalError> {
        self.database.clear_condition_cache();
        self.evaluated_metadata.clear();

        for (filename, plugin) in &self.plugins {
            if let Some(metadata) = self.database.plugin_metadata(plugin.name(), true, true)? {
                self.evaluated_metadata
                    .insert(filename.clone(), metadata);
            }
        }

        Ok(())
    }

    fn evaluated_metadata_for(
        &mut self,
        plugin_name: &str,
    ) -> Result<Option<&crate::metadata::PluginMetadata>, MetadataRetrievalError> {
        let filename = Filename::new(plugin_name.to_owned());

        if !self.evaluated_metadata.contains_key(&filename) {
            if let Some(metadata) = self.database.plugin_metadata(plugin_name, true, true)? {
                self.evaluated_metadata.insert(filename.clone(), metadata);
            }
        }

        Ok(self.evaluated_metadata.get(&filename))
    }

    /// Run the per-plugin diagnostics for the given loaded plugin, using its
    /// evaluated metadata.
    pub fn messages_for(
        &mut self,
        plugin_name: &str,
    ) -> Result<Vec<SourcedMessage>, MetadataRetrievalError> {
        // Make sure the metadata evaluation happens before self is borrowed.
        self.evaluated_metadata_for(plugin_name)?;

        let filename = Filename::new(plugin_name.to_owned());
        let Some(plugin) = self.plugins.get(&filename) else {
            return Ok(Vec::new());
        };

        let metadata = self.evaluated_metadata.get(&filename);

        let loaded_plugins: Vec<&Plugin> = self.plugins.values().collect();
        let active_plugin_names = self.load_order.active_plugin_names();
        let known_group_names: Vec<String> = self
            .database
            .groups(true)
            .iter()
            .map(|g| g.name().to_owned())
            .collect();

        let context = ValidityContext {
            game_id: self.game_id,
            data_path: &self.data_path,
            condition_state: self.database.condition_state(),
            loaded_plugins: &loaded_plugins,
            active_plugin_names: &active_plugin_names,
            known_group_names: &known_group_names,
            language: &self.language,
        };

        Ok(check_install_validity(plugin, metadata, &context))
    }

    /// Get the general messages from the loaded metadata, with their
    /// conditions evaluated, plus any global diagnostics such as exceeded
    /// active plugin limits.
    pub fn general_messages(&self) -> Result<Vec<SourcedMessage>, MetadataRetrievalError> {
        let mut messages: Vec<SourcedMessage> = self
            .database
            .general_messages(true)
            .map_err(MetadataRetrievalError::from)?
            .iter()
            .filter_map(|m| {
                crate::metadata::select_message_content(m.content(), &self.language).map(
                    |content| {
                        SourcedMessage::new(
                            MessageSource::MetadataMessage,
                            m.message_type(),
                            content.text().to_owned(),
                        )
                    },
                )
            })
            .collect();

        let loaded_plugins: Vec<&Plugin> = self.plugins.values().collect();
        let active_plugin_names = self.load_order.active_plugin_names();

        messages.extend(check_active_plugin_counts(
            self.game_id,
            &loaded_plugins,
            &active_plugin_names,
        ));

        Ok(messages)
    }

    /// Calculate a new load order for the loaded plugins.
    ///
    /// This pulls metadata from the masterlist and userlist if they are
    /// loaded, and uses the loaded data of each plugin. No changes are
    /// applied to the load order used by the game.
    pub fn sort(&self) -> Result<Vec<String>, SortPluginsError> {
        if self.is_cancelled() {
            return Err(SortPluginsError::Cancelled);
        }

        let mut plugins: Vec<&Plugin> = Vec::with_capacity(self.plugins.len());
        for name in self.load_order.plugin_names() {
            match self.plugins.get(&Filename::new(name.to_owned())) {
                Some(plugin) => plugins.push(plugin),
                None => return Err(SortPluginsError::PluginNotLoaded(name.to_owned())),
            }
        }

        let plugins_sorting_data = plugins
            .into_iter()
            .enumerate()
            .map(|(i, p)| self.to_plugin_sorting_data(p, i))
            .collect::<Result<Vec<_>, _>>()?;

        if is_log_enabled_debug() {
            logging::debug!("Current load order:");
            for plugin_name in self.load_order.plugin_names() {
                logging::debug!("\t{plugin_name}");
            }
        }

        let groups_graph =
            build_groups_graph(&self.database.groups(false), self.database.user_groups())?;

        let early_loading_plugins: Vec<String> = self
            .game_id
            .implicitly_active_plugins()
            .iter()
            .map(|n| (*n).to_owned())
            .collect();

        let new_load_order = sort_plugins(
            plugins_sorting_data,
            &groups_graph,
            &early_loading_plugins,
        )?;

        if self.is_cancelled() {
            return Err(SortPluginsError::Cancelled);
        }

        if is_log_enabled_debug() {
            logging::debug!("Sorted load order:");
            for plugin_name in &new_load_order {
                logging::debug!("\t{plugin_name}");
            }
        }

        Ok(new_load_order)
    }

    fn to_plugin_sorting_data<'a>(
        &self,
        plugin: &'a Plugin,
        load_order_index: usize,
    ) -> Result<PluginSortingData<'a, Plugin>, SortPluginsError> {
        let masterlist_metadata = self
            .database
            .plugin_metadata(plugin.name(), false, true)?;

        let user_metadata = self.database.plugin_user_metadata(plugin.name(), true)?;

        Ok(PluginSortingData::new(
            plugin,
            masterlist_metadata.as_ref(),
            user_metadata.as_ref(),
            load_order_index,
        ))
    }

    /// Set and persist the given load order, then reload the load order
    /// state so later queries observe it.
    ///
    /// Every load order source that the game uses is written, so applying a
    /// sort result also removes any ambiguity.
    pub fn apply_load_order(&mut self, load_order: &[&str]) -> Result<(), LoadOrderError> {
        self.load_order.set_load_order(load_order)?;

        self.refresh_condition_state();

        Ok(())
    }

    /// Clear the condition cache, and optionally the CRC cache too.
    ///
    /// Plugin file contents are assumed to be stable while a session is
    /// open, so the CRC cache only needs dropping if files have been
    /// modified on disk.
    pub fn clear_caches(&mut self, clear_crcs: bool) {
        self.database.clear_condition_cache();

        if clear_crcs {
            self.database.condition_state().clear_crc_cache();
        }

        self.evaluated_metadata.clear();
    }
}

fn is_log_enabled_debug() -> bool {
    crate::logging::is_log_enabled(crate::LogLevel::Debug)
}

fn resolve_path(path: &Path) -> PathBuf {
    if path.is_symlink() {
        path.read_link().unwrap_or_else(|_| path.to_path_buf())
    } else {
        path.to_path_buf()
    }
}

/// List the plugin files in the data directory, ghosted plugins included.
fn find_plugin_files(game_id: GameId, data_path: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !data_path.exists() {
        return Ok(Vec::new());
    }

    let paths = std::fs::read_dir(data_path)?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| has_plugin_file_extension(game_id, p))
        .collect();

    Ok(paths)
}

fn try_load_plugin(
    game_id: GameId,
    archive_paths: &[PathBuf],
    plugin_path: &Path,
) -> Option<Plugin> {
    match Plugin::load(game_id, archive_paths, plugin_path, LoadScope::WholePlugin) {
        Ok(p) => Some(p),
        Err(e) => {
            logging::error!(
                "Caught an error while trying to load \"{}\": {}",
                escape_ascii(plugin_path),
                format_details(&e)
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tests::{Fixture, PluginBuilder, raw_form_id};

    fn session(fixture: &Fixture) -> GameSession {
        GameSession::new(fixture.game_id, fixture.game_path(), fixture.local_path()).unwrap()
    }

    mod new {
        use super::*;

        #[test]
        fn should_succeed_for_a_valid_game_directory() {
            let fixture = Fixture::new(GameId::SkyrimSE);

            assert!(
                GameSession::new(
                    fixture.game_id,
                    fixture.game_path(),
                    fixture.local_path()
                )
                .is_ok()
            );
        }

        #[test]
        fn should_error_if_the_game_path_does_not_exist() {
            let fixture = Fixture::new(GameId::SkyrimSE);

            match GameSession::new(
                fixture.game_id,
                Path::new("missing"),
                fixture.local_path(),
            ) {
                Err(SessionCreationError::NotADirectory(p)) => {
                    assert_eq!(Path::new("missing"), p);
                }
                _ => panic!("Expected a not-a-directory error"),
            }
        }
    }

    mod load_data {
        use super::*;

        #[test]
        fn should_load_every_plugin_in_the_data_directory() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

            let mut session = session(&fixture);
            session.load_data().unwrap();

            assert_eq!(2, session.plugins().len());
            assert!(session.plugin("Blank.esp").is_some());
        }

        #[test]
        fn should_skip_files_that_are_not_valid_plugins() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));
            std::fs::write(
                fixture.data_path().join("NotAPlugin.esp"),
                "This isn't a valid plugin file.",
            )
            .unwrap();

            let mut session = session(&fixture);
            session.load_data().unwrap();

            assert_eq!(1, session.plugins().len());
        }

        #[test]
        fn should_load_ghosted_plugins_under_their_unghosted_names() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Blank.esp.ghost",
                PluginBuilder::new(GameId::SkyrimSE),
            );

            let mut session = session(&fixture);
            session.load_data().unwrap();

            assert!(session.plugin("Blank.esp").is_some());
        }

        #[test]
        fn should_refresh_the_load_order_state() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));
            fixture.write_plugins_txt(&["*Blank.esp"]);

            let mut session = session(&fixture);
            session.load_data().unwrap();

            assert!(session.is_active("Blank.esp"));
            // The game's master is implicitly active and loads first.
            assert!(session.is_active("Skyrim.esm"));
            assert_eq!(
                vec!["Skyrim.esm", "Blank.esp"],
                session.current_load_order()
            );
        }

        #[test]
        fn should_be_cancellable() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

            let mut session = session(&fixture);
            session.cancellation_flag().store(true, Ordering::Relaxed);

            assert!(matches!(
                session.load_data(),
                Err(LoadPluginsError::Cancelled)
            ));
            assert!(session.plugins().is_empty());
        }
    }

    mod sort {
        use super::*;

        #[test]
        fn should_return_only_the_game_master_for_an_otherwise_empty_data_directory() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );

            let mut session = session(&fixture);
            session.load_data().unwrap();

            assert_eq!(vec!["Skyrim.esm".to_owned()], session.sort().unwrap());
        }

        #[test]
        fn should_order_plugins_after_their_masters() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin(
                "Update.esm",
                PluginBuilder::new(GameId::SkyrimSE)
                    .master_flagged()
                    .with_master("Skyrim.esm"),
            );
            fixture.write_plugin(
                "ModA.esp",
                PluginBuilder::new(GameId::SkyrimSE)
                    .with_master("Skyrim.esm")
                    .with_master("Update.esm"),
            );

            let mut session = session(&fixture);
            session.load_data().unwrap();

            assert_eq!(
                vec![
                    "Skyrim.esm".to_owned(),
                    "Update.esm".to_owned(),
                    "ModA.esp".to_owned()
                ],
                session.sort().unwrap()
            );
        }

        #[test]
        fn should_succeed_when_a_master_is_missing() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin(
                "ModA.esp",
                PluginBuilder::new(GameId::SkyrimSE).with_master("Missing.esm"),
            );

            let mut session = session(&fixture);
            session.load_data().unwrap();

            let sorted = session.sort().unwrap();
            assert_eq!(2, sorted.len());

            let messages = session.messages_for("ModA.esp").unwrap();
            assert_eq!(1, messages.len());
            assert_eq!(MessageSource::MissingMaster, messages[0].source());
        }

        #[test]
        fn should_be_stable_and_idempotent() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin("B.esp", PluginBuilder::new(GameId::SkyrimSE));
            fixture.write_plugin("A.esp", PluginBuilder::new(GameId::SkyrimSE));
            fixture.write_plugins_txt(&["*B.esp", "*A.esp"]);

            let mut session = session(&fixture);
            session.load_data().unwrap();

            let first = session.sort().unwrap();
            assert_eq!(
                vec![
                    "Skyrim.esm".to_owned(),
                    "B.esp".to_owned(),
                    "A.esp".to_owned()
                ],
                first
            );

            let applied: Vec<&str> = first.iter().map(String::as_str).collect();
            session.apply_load_order(&applied).unwrap();

            assert_eq!(first, session.sort().unwrap());
        }

        #[test]
        fn should_respect_record_overlaps() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE)
                    .master_flagged()
                    .with_record(raw_form_id(0, 0xC51))
                    .with_record(raw_form_id(0, 0xC52)),
            );
            fixture.write_plugin(
                "Small.esp",
                PluginBuilder::new(GameId::SkyrimSE)
                    .with_master("Skyrim.esm")
                    .with_record(raw_form_id(0, 0xC51)),
            );
            fixture.write_plugin(
                "Big.esp",
                PluginBuilder::new(GameId::SkyrimSE)
                    .with_master("Skyrim.esm")
                    .with_record(raw_form_id(0, 0xC51))
                    .with_record(raw_form_id(0, 0xC52)),
            );

            let mut session = session(&fixture);
            session.load_data().unwrap();

            // Big.esp overrides more of the overlap, so it loads later.
            assert_eq!(
                vec![
                    "Skyrim.esm".to_owned(),
                    "Small.esp".to_owned(),
                    "Big.esp".to_owned()
                ],
                session.sort().unwrap()
            );
        }
    }

    mod apply_load_order {
        use super::*;

        #[test]
        fn should_persist_the_order_for_later_queries() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin("A.esp", PluginBuilder::new(GameId::SkyrimSE));
            fixture.write_plugin("B.esp", PluginBuilder::new(GameId::SkyrimSE));

            let mut session = session(&fixture);
            session.load_data().unwrap();

            session
                .apply_load_order(&["Skyrim.esm", "B.esp", "A.esp"])
                .unwrap();

            assert_eq!(
                vec!["Skyrim.esm", "B.esp", "A.esp"],
                session.current_load_order()
            );

            // The new state survives a reload from disk.
            session.load_data().unwrap();
            assert_eq!(
                vec!["Skyrim.esm", "B.esp", "A.esp"],
                session.current_load_order()
            );
        }

        #[test]
        fn should_error_if_the_game_master_is_not_first() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin("A.esp", PluginBuilder::new(GameId::SkyrimSE));

            let mut session = session(&fixture);
            session.load_data().unwrap();

            assert!(matches!(
                session.apply_load_order(&["A.esp", "Skyrim.esm"]),
                Err(LoadOrderError::InvalidLoadOrder(_))
            ));
        }
    }

    mod metadata {
        use super::*;

        #[test]
        fn should_surface_evaluated_metadata_in_messages() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

            let masterlist_path = fixture.local_path().join("masterlist.yaml");
            std::fs::write(
                &masterlist_path,
                "plugins:
  - name: Blank.esp
    msg:
      - type: warn
        content: 'Shown'
      - type: say
        content: 'Hidden'
        condition: 'file(\"Missing.esp\")'
",
            )
            .unwrap();

            let mut session = session(&fixture);
            session.load_data().unwrap();
            session
                .load_metadata(&masterlist_path, None, None)
                .unwrap();
            session.evaluate_metadata().unwrap();

            let messages = session.messages_for("Blank.esp").unwrap();

            assert_eq!(1, messages.len());
            assert_eq!("Shown", messages[0].text());
        }

        #[test]
        fn should_report_general_messages() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );

            let masterlist_path = fixture.local_path().join("masterlist.yaml");
            std::fs::write(
                &masterlist_path,
                "globals:
  - type: say
    content: 'A general message'
",
            )
            .unwrap();

            let mut session = session(&fixture);
            session.load_data().unwrap();
            session
                .load_metadata(&masterlist_path, None, None)
                .unwrap();

            let messages = session.general_messages().unwrap();

            assert_eq!(1, messages.len());
            assert_eq!("A general message", messages[0].text());
        }

        #[test]
        fn condition_cache_should_hold_until_caches_are_cleared() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );

            let mut session = session(&fixture);
            session.load_data().unwrap();

            assert!(!session.database().evaluate("file(\"X.esp\")").unwrap());

            fixture.write_plugin("X.esp", PluginBuilder::new(GameId::SkyrimSE));

            assert!(!session.database().evaluate("file(\"X.esp\")").unwrap());

            session.clear_caches(false);

            assert!(session.database().evaluate("file(\"X.esp\")").unwrap());
        }
    }

    mod sort_with_user_metadata {
        use super::*;

        #[test]
        fn user_load_after_should_reorder_plugins() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin("A.esp", PluginBuilder::new(GameId::SkyrimSE));
            fixture.write_plugin("B.esp", PluginBuilder::new(GameId::SkyrimSE));
            fixture.write_plugins_txt(&["*B.esp", "*A.esp"]);

            let masterlist_path = fixture.local_path().join("masterlist.yaml");
            std::fs::write(&masterlist_path, "{}").unwrap();
            let userlist_path = fixture.local_path().join("userlist.yaml");
            std::fs::write(
                &userlist_path,
                "plugins: [{name: B.esp, after: [A.esp]}]",
            )
            .unwrap();

            let mut session = session(&fixture);
            session.load_data().unwrap();
            session
                .load_metadata(&masterlist_path, Some(&userlist_path), None)
                .unwrap();

            assert_eq!(
                vec![
                    "Skyrim.esm".to_owned(),
                    "A.esp".to_owned(),
                    "B.esp".to_owned()
                ],
                session.sort().unwrap()
            );
        }

        #[test]
        fn cyclic_user_metadata_should_error_with_both_edges() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Skyrim.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            fixture.write_plugin("A.esp", PluginBuilder::new(GameId::SkyrimSE));
            fixture.write_plugin("B.esp", PluginBuilder::new(GameId::SkyrimSE));

            let masterlist_path = fixture.local_path().join("masterlist.yaml");
            std::fs::write(&masterlist_path, "{}").unwrap();
            let userlist_path = fixture.local_path().join("userlist.yaml");
            std::fs::write(
                &userlist_path,
                "plugins: [{name: A.esp, after: [B.esp]}, {name: B.esp, after: [A.esp]}]",
            )
            .unwrap();

            let mut session = session(&fixture);
            session.load_data().unwrap();
            session
                .load_metadata(&masterlist_path, Some(&userlist_path), None)
                .unwrap();

            match session.sort() {
                Err(SortPluginsError::CycleFound(cycle)) => {
                    assert_eq!(2, cycle.len());
                    assert!(
                        cycle
                            .iter()
                            .all(|v| v.out_edge_type() == Some(crate::EdgeType::UserLoadAfter))
                    );
                }
                _ => panic!("Expected a cycle error"),
            }
        }
    }
}
