use std::path::Path;

use crate::{
    conditions::{ConditionState, error::ConditionError},
    logging,
    metadata::{
        CleaningData, File, Group, Message, PluginMetadata, Tag,
        document::MetadataDocument,
        error::{LoadMetadataError, WriteMetadataError, WriteMetadataErrorReason},
    },
    sorting::{
        error::GroupsPathError,
        groups::{build_groups_graph, find_path},
        vertex::Vertex,
    },
};

use crate::error::MetadataRetrievalError;

/// Control behaviour when writing to files.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum WriteMode {
    /// Create the file if it does not exist, otherwise error.
    Create,
    /// Create the file if it does not exist, otherwise replace its contents.
    CreateOrTruncate,
}

/// The interface through which metadata can be accessed.
#[derive(Debug)]
pub struct Database {
    masterlist: MetadataDocument,
    userlist: MetadataDocument,
    condition_state: ConditionState,
}

impl Database {
    #[must_use]
    pub(crate) fn new(condition_state: ConditionState) -> Self {
        Self {
            masterlist: MetadataDocument::default(),
            userlist: MetadataDocument::default(),
            condition_state,
        }
    }

    pub(crate) fn condition_state(&self) -> &ConditionState {
        &self.condition_state
    }

    pub(crate) fn condition_state_mut(&mut self) -> &mut ConditionState {
        &mut self.condition_state
    }

    pub(crate) fn clear_condition_cache(&self) {
        self.condition_state.clear_condition_cache();
    }

    /// Loads the masterlist from the given path.
    ///
    /// Replaces any existing data that was previously loaded from a
    /// masterlist.
    pub fn load_masterlist(&mut self, path: &Path) -> Result<(), LoadMetadataError> {
        self.masterlist.load(path)
    }

    /// Loads the masterlist from the given path, substituting in the prelude
    /// at the given path.
    ///
    /// Replaces any existing data that was previously loaded from a
    /// masterlist.
    pub fn load_masterlist_with_prelude(
        &mut self,
        masterlist_path: &Path,
        prelude_path: &Path,
    ) -> Result<(), LoadMetadataError> {
        self.masterlist
            .load_with_prelude(masterlist_path, prelude_path)
    }

    /// Loads the userlist from the given path.
    ///
    /// Replaces any existing data that was previously loaded from a userlist.
    pub fn load_userlist(&mut self, path: &Path) -> Result<(), LoadMetadataError> {
        self.userlist.load(path)
    }

    /// Writes a metadata file containing all loaded user-added metadata.
    pub fn write_user_metadata(
        &self,
        output_path: &Path,
        mode: WriteMode,
    ) -> Result<(), WriteMetadataError> {
        validate_write_path(output_path, mode)?;

        self.userlist.save(output_path)
    }

    /// Writes a metadata file that only contains plugin Bash Tag suggestions
    /// and dirty info from the loaded masterlist.
    pub fn write_minimal_list(
        &self,
        output_path: &Path,
        mode: WriteMode,
    ) -> Result<(), WriteMetadataError> {
        validate_write_path(output_path, mode)?;

        let mut doc = MetadataDocument::default();

        for plugin in self.masterlist.ordered_plugins_iter() {
            let Ok(mut minimal_plugin) = PluginMetadata::new(plugin.name()) else {
                // The name came from an existing PluginMetadata object, so it
                // should always be a valid regex.
                logging::error!(
                    "Unexpectedly encountered a regex error trying to create a PluginMetadata object with the name {}",
                    plugin.name()
                );
                continue;
            };
            minimal_plugin.set_tags(plugin.tags().to_vec());
            minimal_plugin.set_dirty_info(plugin.dirty_info().to_vec());

            if !minimal_plugin.has_name_only() {
                doc.set_plugin_metadata(minimal_plugin);
            }
        }

        doc.save(output_path)
    }

    /// Evaluate the given condition string.
    pub fn evaluate(&self, condition: &str) -> Result<bool, ConditionError> {
        self.condition_state.evaluate(condition)
    }

    /// Gets the Bash Tags that are listed in the loaded metadata lists.
    ///
    /// Bash Tag suggestions can include Bash Tags not in this list.
    pub fn known_bash_tags(&self) -> Vec<String> {
        let mut tags = self.masterlist.bash_tags().to_vec();
        tags.extend_from_slice(self.userlist.bash_tags());

        tags
    }

    /// Get all general messages listed in the loaded metadata lists.
    ///
    /// If `evaluate_conditions` is `true`, any metadata conditions are
    /// evaluated before the metadata is returned, otherwise unevaluated
    /// metadata is returned. Evaluating general message conditions also
    /// clears the condition cache first.
    pub fn general_messages(
        &self,
        evaluate_conditions: bool,
    ) -> Result<Vec<Message>, ConditionError> {
        if evaluate_conditions {
            self.clear_condition_cache();
        }

        let messages_iter = self
            .masterlist
            .messages()
            .iter()
            .chain(self.userlist.messages());

        if evaluate_conditions {
            messages_iter
                .filter_map(|m| {
                    filter_map_on_condition(m, m.condition(), &self.condition_state)
                })
                .collect()
        } else {
            Ok(messages_iter.cloned().collect())
        }
    }

    /// Gets the groups that are defined in the loaded metadata lists.
    ///
    /// If `include_user_metadata` is `true`, any group metadata present in
    /// the userlist is included in the returned metadata, otherwise the
    /// metadata returned only includes metadata from the masterlist.
    pub fn groups(&self, include_user_metadata: bool) -> Vec<Group> {
        if include_user_metadata {
            merge_groups(self.masterlist.groups(), self.userlist.groups())
        } else {
            self.masterlist.groups().to_vec()
        }
    }

    /// Gets the groups that are defined or extended in the loaded userlist.
    pub fn user_groups(&self) -> &[Group] {
        self.userlist.groups()
    }

    /// Sets the group definitions to store in the userlist, replacing any
    /// definitions already loaded from the userlist.
    pub fn set_user_groups(&mut self, groups: Vec<Group>) {
        self.userlist.set_groups(groups);
    }

    /// Get the "shortest" path between the two given groups according to
    /// their "load after" metadata.
    ///
    /// The "shortest" path is defined as the path that maximises the amount
    /// of user metadata involved while minimising the amount of masterlist
    /// metadata involved. It's not the path involving the fewest groups.
    ///
    /// If there is no path between the two groups, the returned [Vec] will
    /// be empty.
    pub fn groups_path(
        &self,
        from_group_name: &str,
        to_group_name: &str,
    ) -> Result<Vec<Vertex>, GroupsPathError> {
        let graph = build_groups_graph(self.masterlist.groups(), self.userlist.groups())?;

        let path = find_path(&graph, from_group_name, to_group_name)?;

        Ok(path)
    }

    /// Get all of a plugin's loaded metadata.
    ///
    /// If `include_user_metadata` is `true`, any user metadata the plugin
    /// has is included in the returned metadata, otherwise the metadata
    /// returned only includes metadata from the masterlist.
    ///
    /// If `evaluate_conditions` is `true`, any metadata conditions are
    /// evaluated before the metadata is returned, and entries whose
    /// conditions are false are removed. Evaluating plugin metadata
    /// conditions does **not** clear the condition cache.
    pub fn plugin_metadata(
        &self,
        plugin_name: &str,
        include_user_metadata: bool,
        evaluate_conditions: bool,
    ) -> Result<Option<PluginMetadata>, MetadataRetrievalError> {
        let mut metadata = self.masterlist.find_plugin(plugin_name)?;

        if include_user_metadata {
            if let Some(mut user_metadata) = self.userlist.find_plugin(plugin_name)? {
                if let Some(metadata) = &metadata {
                    user_metadata.merge_metadata(metadata);
                }
                metadata = Some(user_metadata);
            }
        }

        if evaluate_conditions {
            if let Some(metadata) = metadata {
                return evaluate_all_conditions(metadata, &self.condition_state)
                    .map_err(Into::into);
            }
        }

        Ok(metadata)
    }

    /// Get a plugin's metadata loaded from the userlist.
    ///
    /// If `evaluate_conditions` is `true`, any metadata conditions are
    /// evaluated before the metadata is returned. Evaluating plugin metadata
    /// conditions does **not** clear the condition cache.
    pub fn plugin_user_metadata(
        &self,
        plugin_name: &str,
        evaluate_conditions: bool,
    ) -> Result<Option<PluginMetadata>, MetadataRetrievalError> {
        let metadata = self.userlist.find_plugin(plugin_name)?;

        if evaluate_conditions {
            if let Some(metadata) = metadata {
                return evaluate_all_conditions(metadata, &self.condition_state)
                    .map_err(Into::into);
            }
        }

        Ok(metadata)
    }

    /// Sets a plugin's user metadata, replacing any loaded user metadata for
    /// that plugin.
    pub fn set_plugin_user_metadata(&mut self, plugin_metadata: PluginMetadata) {
        self.userlist.set_plugin_metadata(plugin_metadata);
    }

    /// Discards all loaded user metadata for the plugin with the given
    /// filename.
    pub fn discard_plugin_user_metadata(&mut self, plugin: &str) {
        self.userlist.remove_plugin_metadata(plugin);
    }

    /// Discards all loaded user metadata for all groups, plugins, and any
    /// user-added general messages and known bash tags.
    pub fn discard_all_user_metadata(&mut self) {
        self.userlist.clear();
    }
}

fn validate_write_path(output_path: &Path, mode: WriteMode) -> Result<(), WriteMetadataError> {
    if !output_path.parent().is_some_and(Path::exists) {
        Err(WriteMetadataError::new(
            output_path.into(),
            WriteMetadataErrorReason::ParentDirectoryNotFound,
        ))
    } else if mode == WriteMode::Create && output_path.exists() {
        Err(WriteMetadataError::new(
            output_path.into(),
            WriteMetadataErrorReason::PathAlreadyExists,
        ))
    } else {
        Ok(())
    }
}

fn merge_groups(lhs: &[Group], rhs: &[Group]) -> Vec<Group> {
    let mut groups = lhs.to_vec();

    let mut new_groups = Vec::new();

    for rhs_group in rhs {
        if let Some(group) = groups.iter_mut().find(|g| g.name() == rhs_group.name()) {
            if rhs_group.description().is_some() || !rhs_group.after_groups().is_empty() {
                let mut new_group = group.clone();

                if let Some(description) = rhs_group.description() {
                    new_group = new_group.with_description(description.to_owned());
                }

                if !rhs_group.after_groups().is_empty() {
                    let mut after_groups = new_group.after_groups().to_vec();
                    after_groups.extend_from_slice(rhs_group.after_groups());

                    new_group = new_group.with_after_groups(after_groups);
                }

                *group = new_group;
            }
        } else {
            new_groups.push(rhs_group.clone());
        }
    }

    groups.extend(new_groups);

    groups
}

/// Evaluate every condition in the given metadata object, dropping entries
/// whose conditions are false.
pub(crate) fn evaluate_all_conditions(
    mut metadata: PluginMetadata,
    state: &ConditionState,
) -> Result<Option<PluginMetadata>, ConditionError> {
    metadata.set_load_after_files(filter_files_on_conditions(
        metadata.load_after_files(),
        state,
    )?);

    metadata.set_requirements(filter_files_on_conditions(metadata.requirements(), state)?);

    metadata.set_incompatibilities(filter_files_on_conditions(
        metadata.incompatibilities(),
        state,
    )?);

    metadata.set_messages(
        metadata
            .messages()
            .iter()
            .filter_map(|m| filter_map_on_condition(m, m.condition(), state))
            .collect::<Result<Vec<_>, _>>()?,
    );

    metadata.set_tags(
        metadata
            .tags()
            .iter()
            .filter_map(|t| filter_map_on_condition(t, t.condition(), state))
            .collect::<Result<Vec<Tag>, _>>()?,
    );

    if !metadata.is_regex_plugin() {
        metadata.set_dirty_info(filter_cleaning_data_on_conditions(
            metadata.name(),
            metadata.dirty_info(),
            state,
        )?);

        metadata.set_clean_info(filter_cleaning_data_on_conditions(
            metadata.name(),
            metadata.clean_info(),
            state,
        )?);
    }

    if metadata.has_name_only() {
        Ok(None)
    } else {
        Ok(Some(metadata))
    }
}

fn evaluate_condition(
    condition: Option<&str>,
    state: &ConditionState,
) -> Result<bool, ConditionError> {
    if let Some(condition) = condition {
        state.evaluate(condition)
    } else {
        Ok(true)
    }
}

pub(crate) fn filter_map_on_condition<T: Clone>(
    item: &T,
    condition: Option<&str>,
    state: &ConditionState,
) -> Option<Result<T, ConditionError>> {
    evaluate_condition(condition, state)
        .map(|r| r.then(|| item.clone()))
        .transpose()
}

fn filter_files_on_conditions(
    files: &[File],
    state: &ConditionState,
) -> Result<Vec<File>, ConditionError> {
    files
        .iter()
        .filter_map(|file| filter_map_on_condition(file, file.condition(), state))
        .collect()
}

/// Dirty and clean info applies to one plugin version, so it is filtered by
/// synthesising a checksum condition against the plugin. This means the
/// results share the condition cache.
fn filter_cleaning_data_on_conditions(
    plugin_name: &str,
    cleaning_info: &[CleaningData],
    state: &ConditionState,
) -> Result<Vec<CleaningData>, ConditionError> {
    if plugin_name.is_empty() {
        return Ok(Vec::new());
    }

    cleaning_info
        .iter()
        .filter_map(|i| {
            let condition = format!("checksum(\"{}\", {:08X})", plugin_name, i.crc());

            filter_map_on_condition(i, Some(condition.as_str()), state)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        GameId,
        metadata::MessageType,
        tests::{Fixture, PluginBuilder},
    };

    const METADATA: &str = "
bash_tags:
  - C.Climate
globals:
  - type: say
    content: 'A general message'
    condition: 'file(\"missing.esp\")'
groups:
  - name: group1
  - name: group2
    after:
      - group1
plugins:
  - name: Blank.esm
    after:
      - Missing.esm
    tag:
      - Relev
  - name: Blank.esp
    group: group1
    msg:
      - type: warn
        content: 'A warning message'
        condition: 'file(\"Blank.esm\")'
";

    fn fixture_with_metadata() -> (Fixture, std::path::PathBuf) {
        let fixture = Fixture::new(GameId::Oblivion);
        fixture.write_plugin("Blank.esm", PluginBuilder::new(GameId::Oblivion).master_flagged());
        fixture.write_plugin("Blank.esp", PluginBuilder::new(GameId::Oblivion));

        let metadata_path = fixture.local_path().join("masterlist.yaml");
        std::fs::write(&metadata_path, METADATA).unwrap();

        (fixture, metadata_path)
    }

    fn database(fixture: &Fixture) -> Database {
        Database::new(ConditionState::new(fixture.game_id, fixture.data_path()))
    }

    #[test]
    fn load_masterlist_should_succeed_if_given_a_valid_path() {
        let (fixture, metadata_path) = fixture_with_metadata();
        let mut database = database(&fixture);

        database.load_masterlist(&metadata_path).unwrap();

        assert_eq!(&["C.Climate"], database.known_bash_tags().as_slice());
    }

    #[test]
    fn load_masterlist_with_prelude_should_substitute_the_prelude() {
        let (fixture, metadata_path) = fixture_with_metadata();

        let masterlist = format!("prelude:\n  - &tag C.Water\n{METADATA}");
        std::fs::write(&metadata_path, masterlist).unwrap();

        let prelude_path = fixture.local_path().join("prelude.yaml");
        std::fs::write(&prelude_path, "- &tag Actors.ACBS").unwrap();

        let mut database = database(&fixture);
        database
            .load_masterlist_with_prelude(&metadata_path, &prelude_path)
            .unwrap();

        assert_eq!(&["C.Climate"], database.known_bash_tags().as_slice());
    }

    #[test]
    fn known_bash_tags_should_append_userlist_tags_to_masterlist_tags() {
        let (fixture, metadata_path) = fixture_with_metadata();
        let mut database = database(&fixture);

        database.load_masterlist(&metadata_path).unwrap();

        let userlist_path = fixture.local_path().join("userlist.yaml");
        std::fs::write(&userlist_path, "bash_tags: [Relev, Delev]").unwrap();

        database.load_userlist(&userlist_path).unwrap();

        assert_eq!(
            vec!["C.Climate", "Relev", "Delev"],
            database.known_bash_tags()
        );
    }

    mod general_messages {
        use super::*;

        #[test]
        fn should_append_userlist_messages_to_masterlist_messages() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            let userlist_path = fixture.local_path().join("userlist.yaml");
            std::fs::write(
                &userlist_path,
                "globals: [{type: say, content: 'A user message'}]",
            )
            .unwrap();

            database.load_userlist(&userlist_path).unwrap();

            assert_eq!(
                &[
                    Message::new(MessageType::Say, "A general message".into())
                        .with_condition("file(\"missing.esp\")".into()),
                    Message::new(MessageType::Say, "A user message".into())
                ],
                database.general_messages(false).unwrap().as_slice()
            );
        }

        #[test]
        fn should_filter_out_messages_with_false_conditions_when_evaluating() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            assert!(database.general_messages(true).unwrap().is_empty());
        }
    }

    mod plugin_metadata {
        use super::*;

        #[test]
        fn should_merge_userlist_metadata_over_masterlist_metadata() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            let userlist_path = fixture.local_path().join("userlist.yaml");
            std::fs::write(
                &userlist_path,
                "plugins: [{name: Blank.esp, group: group2, tag: [Delev]}]",
            )
            .unwrap();
            database.load_userlist(&userlist_path).unwrap();

            let metadata = database
                .plugin_metadata("Blank.esp", true, false)
                .unwrap()
                .unwrap();

            // The userlist's explicit group wins.
            assert_eq!(Some("group2"), metadata.group());
            assert_eq!(1, metadata.tags().len());
            assert_eq!(1, metadata.messages().len());
        }

        #[test]
        fn should_not_include_user_metadata_if_not_requested() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            let userlist_path = fixture.local_path().join("userlist.yaml");
            std::fs::write(
                &userlist_path,
                "plugins: [{name: Blank.esp, group: group2}]",
            )
            .unwrap();
            database.load_userlist(&userlist_path).unwrap();

            let metadata = database
                .plugin_metadata("Blank.esp", false, false)
                .unwrap()
                .unwrap();

            assert_eq!(Some("group1"), metadata.group());
        }

        #[test]
        fn should_drop_entries_whose_conditions_are_false_when_evaluating() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            // Blank.esm is installed, so the warning message's condition
            // holds, while Blank.esm's own "after: Missing.esm" entry has no
            // condition and survives evaluation.
            let metadata = database
                .plugin_metadata("Blank.esp", true, true)
                .unwrap()
                .unwrap();

            assert_eq!(1, metadata.messages().len());
        }

        #[test]
        fn should_return_none_for_a_plugin_with_no_metadata() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            assert!(
                database
                    .plugin_metadata("Unknown.esp", true, false)
                    .unwrap()
                    .is_none()
            );
        }
    }

    mod groups {
        use super::*;

        #[test]
        fn should_include_the_default_group() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            let groups = database.groups(false);

            assert!(groups.iter().any(|g| g.name() == Group::DEFAULT_NAME));
            assert_eq!(3, groups.len());
        }

        #[test]
        fn should_merge_userlist_group_extensions() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();
            database.set_user_groups(vec![
                Group::new("group1".into()).with_after_groups(vec!["group3".into()]),
                Group::new("group3".into()),
            ]);

            let groups = database.groups(true);

            let group1 = groups.iter().find(|g| g.name() == "group1").unwrap();
            assert_eq!(&["group3".to_owned()], group1.after_groups());
            assert!(groups.iter().any(|g| g.name() == "group3"));
        }
    }

    mod groups_path {
        use super::*;

        #[test]
        fn should_return_the_path_between_two_groups() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            let path = database.groups_path("group1", "group2").unwrap();

            assert_eq!(2, path.len());
            assert_eq!("group1", path[0].name());
            assert_eq!("group2", path[1].name());
        }

        #[test]
        fn should_return_an_empty_path_if_the_groups_are_unlinked() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            assert!(database.groups_path("group2", "group1").unwrap().is_empty());
        }
    }

    mod write_user_metadata {
        use super::*;

        #[test]
        fn should_write_only_user_metadata() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();
            database.set_user_groups(vec![Group::new("group3".into())]);

            let output_path = fixture.local_path().join("userlist.yaml");
            database
                .write_user_metadata(&output_path, WriteMode::Create)
                .unwrap();

            let content = std::fs::read_to_string(output_path).unwrap();

            assert_eq!("groups:\n  - name: 'default'\n  - name: 'group3'", content);
        }

        #[test]
        fn should_error_if_the_path_exists_and_truncation_is_not_allowed() {
            let (fixture, _) = fixture_with_metadata();
            let database = database(&fixture);

            let output_path = fixture.local_path().join("userlist.yaml");
            std::fs::File::create(&output_path).unwrap();

            assert!(
                database
                    .write_user_metadata(&output_path, WriteMode::Create)
                    .is_err()
            );
        }

        #[test]
        fn should_error_if_the_parent_path_does_not_exist() {
            let (fixture, _) = fixture_with_metadata();
            let database = database(&fixture);

            let output_path = fixture.local_path().join("missing/userlist.yaml");

            assert!(
                database
                    .write_user_metadata(&output_path, WriteMode::Create)
                    .is_err()
            );
        }
    }

    mod write_minimal_list {
        use super::*;

        #[test]
        fn should_only_write_plugin_bash_tags_and_dirty_info() {
            let (fixture, metadata_path) = fixture_with_metadata();
            let mut database = database(&fixture);

            database.load_masterlist(&metadata_path).unwrap();

            let output_path = fixture.local_path().join("minimal.yaml");
            database
                .write_minimal_list(&output_path, WriteMode::Create)
                .unwrap();

            let content = std::fs::read_to_string(output_path).unwrap();

            assert_eq!("plugins:\n  - name: 'Blank.esm'\n    tag: [Relev]", content);
        }
    }

    mod discard_user_metadata {
        use super::*;

        #[test]
        fn discard_plugin_user_metadata_should_only_affect_the_named_plugin() {
            let (fixture, _) = fixture_with_metadata();
            let mut database = database(&fixture);

            let mut a = PluginMetadata::new("A.esp").unwrap();
            a.set_group("group1".into());
            let mut b = PluginMetadata::new("B.esp").unwrap();
            b.set_group("group1".into());

            database.set_plugin_user_metadata(a);
            database.set_plugin_user_metadata(b);

            database.discard_plugin_user_metadata("A.esp");

            assert!(
                database
                    .plugin_user_metadata("A.esp", false)
                    .unwrap()
                    .is_none()
            );
            assert!(
                database
                    .plugin_user_metadata("B.esp", false)
                    .unwrap()
                    .is_some()
            );
        }

        #[test]
        fn discard_all_user_metadata_should_clear_the_userlist() {
            let (fixture, _) = fixture_with_metadata();
            let mut database = database(&fixture);

            let mut a = PluginMetadata::new("A.esp").unwrap();
            a.set_group("group1".into());
            database.set_plugin_user_metadata(a);

            database.discard_all_user_metadata();

            assert!(
                database
                    .plugin_user_metadata("A.esp", false)
                    .unwrap()
                    .is_none()
            );
        }
    }
}
