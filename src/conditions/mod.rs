pub(crate) mod error;
mod parse;
mod version;

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::RwLock,
};

use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::{
    GameId, logging,
    plugin::{self, calculate_crc, has_plugin_file_extension},
};
use error::{ConditionError, ConditionEvalError, ConditionParseError};
use parse::{ComparisonOperator, Expression, Function, PathRegex, parse_expression};
use version::Version;

/// Check that the given condition string is syntactically valid without
/// evaluating it.
pub(crate) fn parse_only(condition: &str) -> Result<(), ConditionParseError> {
    parse_expression(condition).map(|_| ())
}

/// The state that condition expressions are evaluated against: the game's
/// data directory, the active plugin set and the loaded plugins' versions,
/// plus the CRC and condition-result caches.
///
/// Cached condition results are keyed by the exact expression text, and once
/// a condition has been evaluated its result is stable until the cache is
/// explicitly cleared.
#[derive(Debug)]
pub struct ConditionState {
    game_id: GameId,
    data_path: PathBuf,
    active_plugins: HashSet<String>,
    plugin_versions: HashMap<String, String>,
    master_plugins: HashSet<String>,
    crc_cache: RwLock<HashMap<String, u32>>,
    condition_cache: RwLock<HashMap<String, bool>>,
}

impl ConditionState {
    pub fn new(game_id: GameId, data_path: PathBuf) -> Self {
        Self {
            game_id,
            data_path,
            active_plugins: HashSet::default(),
            plugin_versions: HashMap::default(),
            master_plugins: HashSet::default(),
            crc_cache: RwLock::default(),
            condition_cache: RwLock::default(),
        }
    }

    /// Parse and evaluate the given condition expression, consulting and
    /// populating the condition cache.
    pub fn evaluate(&self, condition: &str) -> Result<bool, ConditionError> {
        if let Ok(cache) = self.condition_cache.read()
            && let Some(result) = cache.get(condition)
        {
            return Ok(*result);
        }

        let expression = parse_expression(condition)
            .map_err(|e| ConditionError::ParseError(condition.to_owned(), e))?;

        let result = self
            .evaluate_expression(&expression)
            .map_err(|e| ConditionError::EvalError(condition.to_owned(), e))?;

        logging::trace!("The condition \"{condition}\" evaluated to {result}");

        match self.condition_cache.write() {
            Ok(mut cache) => {
                cache.insert(condition.to_owned(), result);
            }
            Err(e) => {
                logging::error!("The condition cache's lock is poisoned, assigning a new cache");
                *e.into_inner() = HashMap::default();
            }
        }

        Ok(result)
    }

    pub(crate) fn clear_condition_cache(&self) {
        match self.condition_cache.write() {
            Ok(mut cache) => cache.clear(),
            Err(e) => {
                logging::error!("The condition cache's lock is poisoned, assigning a new cache");
                *e.into_inner() = HashMap::default();
            }
        }
    }

    pub(crate) fn set_active_plugins(&mut self, plugin_names: &[&str]) {
        self.active_plugins = plugin_names.iter().map(|n| n.to_lowercase()).collect();
    }

    /// Record the loaded plugins' versions, master flags and CRCs so that
    /// conditions evaluate against loaded state instead of re-reading files.
    pub(crate) fn set_loaded_plugins(&mut self, plugins: &[&plugin::Plugin]) {
        self.plugin_versions = plugins
            .iter()
            .filter_map(|p| {
                p.version()
                    .map(|v| (p.name().to_lowercase(), v.to_owned()))
            })
            .collect();

        self.master_plugins = plugins
            .iter()
            .filter(|p| p.is_master())
            .map(|p| p.name().to_lowercase())
            .collect();

        let crcs: HashMap<_, _> = plugins
            .iter()
            .filter_map(|p| p.crc().map(|c| (p.name().to_lowercase(), c)))
            .collect();

        match self.crc_cache.write() {
            Ok(mut cache) => {
                cache.extend(crcs);
            }
            Err(e) => {
                logging::error!("The CRC cache's lock is poisoned, assigning a new cache");
                *e.into_inner() = crcs;
            }
        }
    }

    pub(crate) fn clear_crc_cache(&self) {
        match self.crc_cache.write() {
            Ok(mut cache) => cache.clear(),
            Err(e) => {
                logging::error!("The CRC cache's lock is poisoned, assigning a new cache");
                *e.into_inner() = HashMap::default();
            }
        }
    }

    fn evaluate_expression(&self, expression: &Expression) -> Result<bool, ConditionEvalError> {
        match expression {
            // The operators short-circuit so that a guard like
            // file(x) and checksum(x, ...) never reads a missing file.
            Expression::Or(left, right) => {
                Ok(self.evaluate_expression(left)? || self.evaluate_expression(right)?)
            }
            Expression::And(left, right) => {
                Ok(self.evaluate_expression(left)? && self.evaluate_expression(right)?)
            }
            Expression::Not(inner) => Ok(!self.evaluate_expression(inner)?),
            Expression::Function(function) => self.evaluate_function(function),
        }
    }

    fn evaluate_function(&self, function: &Function) -> Result<bool, ConditionEvalError> {
        match function {
            Function::FilePath(path) => Ok(self.resolve_path(path).is_some()),
            Function::Readable(path) => Ok(self
                .resolve_path(path)
                .is_some_and(|p| is_readable(&p))),
            Function::Active(name) => Ok(self.is_plugin_active(name)),
            Function::FileRegex(path_regex) => {
                Ok(!self.files_matching(path_regex)?.is_empty())
            }
            Function::Many(path_regex) => Ok(self.files_matching(path_regex)?.len() > 1),
            Function::ManyActive(path_regex) => {
                let count = self
                    .active_plugins
                    .iter()
                    .filter(|name| path_regex.regex.find(name).is_some())
                    .count();
                Ok(count > 1)
            }
            Function::IsMaster(name) => {
                Ok(self.master_plugins.contains(&name.to_lowercase()))
            }
            Function::Checksum(path, expected) => self.evaluate_checksum(path, *expected),
            Function::Version(path, version, comparator)
            | Function::ProductVersion(path, version, comparator) => {
                self.evaluate_version(path, version, *comparator)
            }
            Function::FilenameVersion(path_regex, version, comparator) => {
                self.evaluate_filename_version(path_regex, version, *comparator)
            }
        }
    }

    fn is_plugin_active(&self, name: &str) -> bool {
        self.active_plugins.contains(&name.to_lowercase())
    }

    /// Resolve a relative path against the data directory, also matching a
    /// ghosted sibling of a plugin file.
    fn resolve_path(&self, relative: &Path) -> Option<PathBuf> {
        let path = self.data_path.join(relative);
        if path.exists() {
            return Some(path);
        }

        if has_plugin_file_extension(self.game_id, relative) {
            let ghosted = append_ghost_extension(&path);
            if ghosted.exists() {
                return Some(ghosted);
            }
        }

        None
    }

    fn files_matching(&self, path_regex: &PathRegex) -> Result<Vec<String>, ConditionEvalError> {
        let directory = self.data_path.join(&path_regex.parent);
        if !directory.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&directory)
            .map_err(|e| ConditionEvalError::IoError(directory.clone(), e))?;

        let mut matches = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConditionEvalError::IoError(directory.clone(), e))?;

            let filename = entry.file_name();
            let Some(filename) = filename.to_str() else {
                continue;
            };

            // A ghosted plugin is still present as far as conditions are
            // concerned.
            let filename = plugin::trim_dot_ghost(filename);

            if path_regex.regex.find(filename).is_some() {
                matches.push(filename.to_owned());
            }
        }

        Ok(matches)
    }

    fn evaluate_checksum(&self, path: &Path, expected: u32) -> Result<bool, ConditionEvalError> {
        let key = path.to_string_lossy().to_lowercase();

        if let Ok(cache) = self.crc_cache.read()
            && let Some(crc) = cache.get(&key)
        {
            return Ok(*crc == expected);
        }

        let Some(resolved) = self.resolve_path(path) else {
            return Ok(false);
        };

        let crc =
            calculate_crc(&resolved).map_err(|e| ConditionEvalError::IoError(resolved, e))?;

        match self.crc_cache.write() {
            Ok(mut cache) => {
                cache.insert(key, crc);
            }
            Err(e) => {
                logging::error!("The CRC cache's lock is poisoned, assigning a new cache");
                *e.into_inner() = HashMap::default();
            }
        }

        Ok(crc == expected)
    }

    fn evaluate_version(
        &self,
        path: &Path,
        version: &str,
        comparator: ComparisonOperator,
    ) -> Result<bool, ConditionEvalError> {
        let actual = self.read_file_version(path)?.unwrap_or_default();

        let ordering = Version::parse(&actual).cmp(&Version::parse(version));

        Ok(comparator.accepts(ordering))
    }

    /// Get the version of the file at the given path.
    ///
    /// A loaded plugin's version comes from the loaded state; an unloaded
    /// plugin file's header is read. A missing file or a file with no
    /// detectable version yields `None`, which compares as the empty
    /// version.
    fn read_file_version(&self, path: &Path) -> Result<Option<String>, ConditionEvalError> {
        if let Some(name) = path.to_str()
            && path.parent() == Some(Path::new(""))
            && let Some(version) = self.plugin_versions.get(&name.to_lowercase())
        {
            return Ok(Some(version.clone()));
        }

        let Some(resolved) = self.resolve_path(path) else {
            return Ok(None);
        };

        if !has_plugin_file_extension(self.game_id, path) {
            return Ok(None);
        }

        let bytes = std::fs::read(&resolved)
            .map_err(|e| ConditionEvalError::IoError(resolved.clone(), e))?;

        let Ok(parsed) = plugin::parse::parse_plugin(&bytes, self.game_id, "", true) else {
            return Ok(None);
        };

        Ok(parsed
            .description
            .as_deref()
            .and_then(plugin::extract_version))
    }

    fn evaluate_filename_version(
        &self,
        path_regex: &PathRegex,
        version: &str,
        comparator: ComparisonOperator,
    ) -> Result<bool, ConditionEvalError> {
        let mut actual = None;

        for filename in self.files_matching(path_regex)? {
            let captured = path_regex
                .regex
                .find(&filename)
                .iter()
                .flat_map(|m| m.captures.iter())
                .flatten()
                .filter_map(|range| filename.get(range.clone()))
                .find(|v| !v.is_empty())
                .map(str::to_owned);

            if captured.is_some() {
                actual = captured;
                break;
            }
        }

        let actual = actual.unwrap_or_default();
        let ordering = Version::parse(&actual).cmp(&Version::parse(version));

        Ok(comparator.accepts(ordering))
    }
}

fn append_ghost_extension(path: &Path) -> PathBuf {
    let mut filename = path.file_name().unwrap_or_default().to_os_string();
    filename.push(plugin::GHOST_FILE_EXTENSION);
    path.with_file_name(filename)
}

fn is_readable(path: &Path) -> bool {
    if path.is_dir() {
        std::fs::read_dir(path).is_ok()
    } else {
        File::open(path).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tests::{Fixture, PluginBuilder};

    fn state(fixture: &Fixture) -> ConditionState {
        ConditionState::new(fixture.game_id, fixture.data_path())
    }

    mod file {
        use super::*;

        #[test]
        fn should_be_true_for_an_existing_file() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

            let state = state(&fixture);

            assert!(state.evaluate("file(\"Blank.esp\")").unwrap());
        }

        #[test]
        fn should_be_false_for_a_missing_file() {
            let fixture = Fixture::new(GameId::SkyrimSE);

            let state = state(&fixture);

            assert!(!state.evaluate("file(\"Missing.esp\")").unwrap());
        }

        #[test]
        fn should_match_a_ghosted_plugin() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin("Blank.esp.ghost", PluginBuilder::new(GameId::SkyrimSE));

            let state = state(&fixture);

            assert!(state.evaluate("file(\"Blank.esp\")").unwrap());
        }
    }

    mod regex {
        use super::*;

        #[test]
        fn should_be_true_if_any_file_matches() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin("Blank - Other.esp", PluginBuilder::new(GameId::SkyrimSE));

            let state = state(&fixture);

            assert!(state.evaluate("regex(\"Blank.*\\.esp\")").unwrap());
        }

        #[test]
        fn many_should_require_more_than_one_match() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

            let state = state(&fixture);

            assert!(!state.evaluate("many(\"Blank.*\\.esp\")").unwrap());

            fixture.write_plugin("Blank - Other.esp", PluginBuilder::new(GameId::SkyrimSE));
            state.clear_condition_cache();

            assert!(state.evaluate("many(\"Blank.*\\.esp\")").unwrap());
        }
    }

    mod active {
        use super::*;

        #[test]
        fn should_reflect_the_active_plugin_set_case_insensitively() {
            let fixture = Fixture::new(GameId::SkyrimSE);

            let mut state = state(&fixture);
            state.set_active_plugins(&["Blank.esp"]);

            assert!(state.evaluate("active(\"BLANK.esp\")").unwrap());
            assert!(!state.evaluate("active(\"Other.esp\")").unwrap());
        }

        #[test]
        fn many_active_should_require_more_than_one_active_match() {
            let fixture = Fixture::new(GameId::SkyrimSE);

            let mut state = state(&fixture);
            state.set_active_plugins(&["Blank.esp", "Blank - Other.esp"]);

            assert!(state.evaluate("many_active(\"blank.*\\.esp\")").unwrap());
            assert!(!state.evaluate("many_active(\"other.*\\.esp\")").unwrap());
        }
    }

    mod checksum {
        use super::*;

        #[test]
        fn should_compare_the_crc_of_the_file() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            let path = fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

            let crc = calculate_crc(&path).unwrap();

            let state = state(&fixture);

            assert!(state
                .evaluate(&format!("checksum(\"Blank.esp\", {crc:08X})"))
                .unwrap());
            assert!(!state
                .evaluate("checksum(\"Blank.esp\", DEADBEEF)")
                .unwrap());
        }

        #[test]
        fn should_be_false_for_a_missing_file() {
            let fixture = Fixture::new(GameId::SkyrimSE);

            let state = state(&fixture);

            assert!(!state.evaluate("checksum(\"Missing.esp\", DEADBEEF)").unwrap());
        }
    }

    mod version {
        use super::*;

        #[test]
        fn should_compare_against_a_loaded_plugin_version() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            let path = fixture.write_plugin(
                "Blank.esp",
                PluginBuilder::new(GameId::SkyrimSE).with_description("version: 2.5"),
            );

            let plugin = plugin::Plugin::load(
                GameId::SkyrimSE,
                &[],
                &path,
                plugin::LoadScope::HeaderOnly,
            )
            .unwrap();

            let mut state = state(&fixture);
            state.set_loaded_plugins(&[&plugin]);

            assert!(state.evaluate("version(\"Blank.esp\", \"2.0\", >)").unwrap());
            assert!(!state.evaluate("version(\"Blank.esp\", \"3.0\", >=)").unwrap());
        }

        #[test]
        fn should_compare_a_missing_file_as_the_empty_version() {
            let fixture = Fixture::new(GameId::SkyrimSE);

            let state = state(&fixture);

            assert!(state.evaluate("version(\"Missing.esp\", \"1.0\", <)").unwrap());
            assert!(state.evaluate("version(\"Missing.esp\", \"0\", ==)").unwrap());
        }

        #[test]
        fn should_read_an_unloaded_plugins_header() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin(
                "Blank.esp",
                PluginBuilder::new(GameId::SkyrimSE).with_description("v4.1"),
            );

            let state = state(&fixture);

            assert!(state.evaluate("version(\"Blank.esp\", \"4.1\", ==)").unwrap());
        }
    }

    mod caching {
        use super::*;

        #[test]
        fn should_return_the_cached_result_until_the_cache_is_cleared() {
            let fixture = Fixture::new(GameId::SkyrimSE);

            let state = state(&fixture);

            assert!(!state.evaluate("file(\"X.esp\")").unwrap());

            fixture.write_plugin("X.esp", PluginBuilder::new(GameId::SkyrimSE));

            // Cached result is returned even though the file now exists.
            assert!(!state.evaluate("file(\"X.esp\")").unwrap());

            state.clear_condition_cache();

            assert!(state.evaluate("file(\"X.esp\")").unwrap());
        }

        #[test]
        fn consecutive_evaluations_should_be_stable() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

            let state = state(&fixture);

            let first = state.evaluate("file(\"Blank.esp\") and not file(\"Missing.esp\")");
            let second = state.evaluate("file(\"Blank.esp\") and not file(\"Missing.esp\")");

            assert_eq!(first.unwrap(), second.unwrap());
        }
    }

    mod is_master {
        use super::*;

        #[test]
        fn should_be_true_only_for_loaded_master_plugins() {
            let fixture = Fixture::new(GameId::SkyrimSE);
            let esm = fixture.write_plugin(
                "Blank.esm",
                PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
            );
            let esp = fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

            let esm = plugin::Plugin::load(
                GameId::SkyrimSE,
                &[],
                &esm,
                plugin::LoadScope::HeaderOnly,
            )
            .unwrap();
            let esp = plugin::Plugin::load(
                GameId::SkyrimSE,
                &[],
                &esp,
                plugin::LoadScope::HeaderOnly,
            )
            .unwrap();

            let mut state = state(&fixture);
            state.set_loaded_plugins(&[&esm, &esp]);

            assert!(state.evaluate("is_master(\"Blank.esm\")").unwrap());
            assert!(!state.evaluate("is_master(\"Blank.esp\")").unwrap());
        }
    }
}
