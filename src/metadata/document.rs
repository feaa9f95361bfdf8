use std::{collections::HashMap, path::Path, sync::Arc};

use saphyr::{LoadableYamlNode, MarkedYaml};

use crate::{escape_ascii, logging};

use super::{
    emit::YamlEmitter,
    error::{
        ExpectedType, LoadMetadataError, MetadataDocumentParsingError, ParseMetadataError,
        RegexError, WriteMetadataError,
    },
    file::Filename,
    group::Group,
    message::Message,
    plugin_metadata::PluginMetadata,
    yaml::{
        TryFromYaml, YamlObjectType, get_as_slice, is_mapping, node_as_str, process_merge_keys,
    },
};

/// A parsed masterlist or userlist document.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct MetadataDocument {
    bash_tags: Vec<String>,
    groups: Vec<Group>,
    messages: Vec<Message>,
    plugins: HashMap<Arc<Filename>, PluginMetadata>,
    regex_plugins: Vec<PluginMetadata>,
    ordered_plugin_names: Vec<Arc<Filename>>,
}

impl MetadataDocument {
    pub(crate) fn load(&mut self, file_path: &Path) -> Result<(), LoadMetadataError> {
        if !file_path.exists() {
            return Err(LoadMetadataError::new(
                file_path.into(),
                MetadataDocumentParsingError::PathNotFound,
            ));
        }

        logging::trace!("Loading file at \"{}\"", escape_ascii(file_path));

        let content = std::fs::read_to_string(file_path)
            .map_err(|e| LoadMetadataError::from_io_error(file_path.into(), e))?;

        self.load_from_str(&content)
            .map_err(|e| LoadMetadataError::new(file_path.into(), e))?;

        logging::trace!(
            "Successfully loaded metadata from file at \"{}\".",
            escape_ascii(file_path)
        );

        Ok(())
    }

    pub(crate) fn load_with_prelude(
        &mut self,
        masterlist_path: &Path,
        prelude_path: &Path,
    ) -> Result<(), LoadMetadataError> {
        if !masterlist_path.exists() {
            return Err(LoadMetadataError::new(
                masterlist_path.into(),
                MetadataDocumentParsingError::PathNotFound,
            ));
        }

        if !prelude_path.exists() {
            return Err(LoadMetadataError::new(
                prelude_path.into(),
                MetadataDocumentParsingError::PathNotFound,
            ));
        }

        let masterlist = std::fs::read_to_string(masterlist_path)
            .map_err(|e| LoadMetadataError::from_io_error(masterlist_path.into(), e))?;

        let prelude = std::fs::read_to_string(prelude_path)
            .map_err(|e| LoadMetadataError::from_io_error(prelude_path.into(), e))?;

        let masterlist = replace_prelude(&masterlist, &prelude);

        self.load_from_str(&masterlist)
            .map_err(|e| LoadMetadataError::new(masterlist_path.into(), e))?;

        logging::trace!(
            "Successfully loaded metadata from file at \"{}\".",
            escape_ascii(masterlist_path)
        );

        Ok(())
    }

    pub(crate) fn load_from_str(
        &mut self,
        string: &str,
    ) -> Result<(), MetadataDocumentParsingError> {
        let mut docs = MarkedYaml::load_from_str(string)?;

        let doc = docs.pop().ok_or(MetadataDocumentParsingError::NoDocuments)?;

        if !docs.is_empty() {
            return Err(MetadataDocumentParsingError::MoreThanOneDocument(
                docs.len() + 1,
            ));
        }

        let doc = process_merge_keys(doc)?;

        if !is_mapping(&doc) {
            return Err(ParseMetadataError::unexpected_type(
                doc.span.start,
                YamlObjectType::MetadataDocument,
                ExpectedType::Map,
            )
            .into());
        }

        let mut plugins = HashMap::new();
        let mut regex_plugins = Vec::new();
        let mut ordered_plugin_names = Vec::new();
        for plugin_yaml in get_as_slice(&doc, "plugins", YamlObjectType::MetadataDocument)? {
            let plugin = PluginMetadata::try_from_yaml(plugin_yaml)?;
            let filename = Arc::new(Filename::new(plugin.name().to_owned()));

            if plugin.is_regex_plugin() {
                regex_plugins.push(plugin);
            } else if let Some(old) = plugins.insert(Arc::clone(&filename), plugin) {
                return Err(ParseMetadataError::duplicate_entry(
                    plugin_yaml.span.start,
                    old.name().to_owned(),
                    YamlObjectType::PluginMetadata,
                )
                .into());
            }

            ordered_plugin_names.push(filename);
        }

        let messages = get_as_slice(&doc, "globals", YamlObjectType::MetadataDocument)?
            .iter()
            .map(Message::try_from_yaml)
            .collect::<Result<Vec<_>, _>>()?;

        let mut bash_tags = Vec::new();
        for bash_tag_yaml in get_as_slice(&doc, "bash_tags", YamlObjectType::MetadataDocument)? {
            match node_as_str(bash_tag_yaml) {
                Some(b) => bash_tags.push(b.to_owned()),
                None => {
                    return Err(ParseMetadataError::unexpected_type(
                        bash_tag_yaml.span.start,
                        YamlObjectType::BashTagsElement,
                        ExpectedType::String,
                    )
                    .into());
                }
            }
        }

        let mut groups = Vec::new();
        for group_yaml in get_as_slice(&doc, "groups", YamlObjectType::MetadataDocument)? {
            let group = Group::try_from_yaml(group_yaml)?;

            if groups.iter().any(|g: &Group| g.name() == group.name()) {
                return Err(ParseMetadataError::duplicate_entry(
                    group_yaml.span.start,
                    group.name().to_owned(),
                    YamlObjectType::Group,
                )
                .into());
            }

            groups.push(group);
        }

        if !groups.iter().any(|g| g.name() == Group::DEFAULT_NAME) {
            groups.insert(0, Group::default());
        }

        self.plugins = plugins;
        self.regex_plugins = regex_plugins;
        self.ordered_plugin_names = ordered_plugin_names;
        self.messages = messages;
        self.bash_tags = bash_tags;
        self.groups = groups;

        Ok(())
    }

    pub(crate) fn save(&self, file_path: &Path) -> Result<(), WriteMetadataError> {
        logging::trace!("Saving metadata list to: \"{}\"", escape_ascii(file_path));

        let mut emitter = YamlEmitter::new();

        if !self.bash_tags.is_empty() {
            emitter.map_key("bash_tags");
            emitter.unquoted_str_sequence(&self.bash_tags);
        }

        if self.groups.len() > 1 {
            emitter.map_key("groups");
            emitter.sequence(&self.groups);
        }

        if !self.messages.is_empty() {
            emitter.map_key("globals");
            emitter.sequence(&self.messages);
        }

        let plugins: Vec<_> = self
            .ordered_plugins_iter()
            .filter(|p| !p.has_name_only())
            .cloned()
            .collect();
        if !plugins.is_empty() {
            emitter.map_key("plugins");
            emitter.sequence(&plugins);
        }

        let mut contents = emitter.into_string();
        if contents.is_empty() {
            contents = "{}".into();
        }

        std::fs::write(file_path, contents)
            .map_err(|e| WriteMetadataError::new(file_path.into(), e.into()))?;

        Ok(())
    }

    pub(crate) fn bash_tags(&self) -> &[String] {
        &self.bash_tags
    }

    pub(crate) fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub(crate) fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn ordered_plugins_iter(&self) -> impl Iterator<Item = &PluginMetadata> {
        self.ordered_plugin_names.iter().filter_map(|f| {
            self.plugins.get(f).or_else(|| {
                self.regex_plugins
                    .iter()
                    .find(|r| r.name() == f.as_ref().as_str())
            })
        })
    }

    /// Get the merged metadata for the given plugin name.
    ///
    /// A literal entry for the name is the merge base; every matching regex
    /// entry is then merged in, in definition order.
    pub(crate) fn find_plugin(
        &self,
        plugin_name: &str,
    ) -> Result<Option<PluginMetadata>, RegexError> {
        let mut metadata = match self.plugins.get(&Filename::new(plugin_name.to_owned())) {
            Some(m) => m.clone(),
            None => PluginMetadata::new(plugin_name)?,
        };

        for regex_plugin in &self.regex_plugins {
            if regex_plugin.name_matches(plugin_name) {
                metadata.merge_metadata(regex_plugin);
            }
        }

        if metadata.has_name_only() {
            Ok(None)
        } else {
            Ok(Some(metadata))
        }
    }

    pub(crate) fn set_groups(&mut self, groups: Vec<Group>) {
        // Ensure that the default group is present.
        let default_group_exists = groups.iter().any(|g| g.name() == Group::DEFAULT_NAME);

        if default_group_exists {
            self.groups = groups;
        } else {
            self.groups.clear();
            self.groups.push(Group::default());
            self.groups.extend(groups);
        }
    }

    pub(crate) fn set_plugin_metadata(&mut self, plugin_metadata: PluginMetadata) {
        let filename = Arc::new(Filename::new(plugin_metadata.name().to_owned()));

        if plugin_metadata.is_regex_plugin() {
            self.regex_plugins.push(plugin_metadata);
            self.ordered_plugin_names.push(filename);
        } else {
            let old_value = self.plugins.insert(Arc::clone(&filename), plugin_metadata);
            if old_value.is_none() {
                self.ordered_plugin_names.push(filename);
            }
        }
    }

    pub(crate) fn remove_plugin_metadata(&mut self, plugin_name: &str) {
        let filename = Filename::new(plugin_name.to_owned());
        let mut was_removed = self.plugins.remove(&filename).is_some();

        // Only remove regex plugins if no specific plugin was removed,
        // because they're mutually exclusive.
        if !was_removed {
            self.regex_plugins.retain(|p| {
                let equal = unicase::eq(p.name(), plugin_name);
                if equal {
                    was_removed = true;
                }
                !equal
            });
        }

        if was_removed {
            self.ordered_plugin_names.retain(|f| f.as_ref() != &filename);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.bash_tags.clear();
        self.groups.clear();
        self.groups.push(Group::default());
        self.messages.clear();
        self.plugins.clear();
        self.regex_plugins.clear();
        self.ordered_plugin_names.clear();
    }
}

/// Replace the masterlist's top-level `prelude:` block with the given
/// prelude document's content.
///
/// Line numbers in errors reported after substitution refer to the
/// substituted text, which may not match the masterlist file on disk.
fn replace_prelude(masterlist: &str, prelude: &str) -> String {
    let Some(block) = find_prelude_block(masterlist) else {
        return masterlist.to_owned();
    };

    let mut replaced = String::with_capacity(masterlist.len() + prelude.len());
    replaced.push_str(masterlist.get(..block.start).unwrap_or_default());
    replaced.push_str("prelude:\n");
    for line in prelude.lines() {
        if line.is_empty() {
            replaced.push('\n');
        } else {
            replaced.push_str("  ");
            replaced.push_str(line);
            replaced.push('\n');
        }
    }
    replaced.push_str(masterlist.get(block.end..).unwrap_or_default());

    replaced
}

/// Find the byte range of the top-level `prelude:` key and its block.
fn find_prelude_block(masterlist: &str) -> Option<std::ops::Range<usize>> {
    let mut start = None;
    let mut end = masterlist.len();

    let mut offset = 0;
    for line in masterlist.split_inclusive('\n') {
        let is_top_level_key = line
            .chars()
            .next()
            .is_some_and(|c| !c.is_whitespace() && c != '#');

        if start.is_none() {
            if is_top_level_key && (line.starts_with("prelude:")) {
                start = Some(offset);
            }
        } else if is_top_level_key {
            end = offset;
            break;
        }

        offset += line.len();
    }

    start.map(|start| start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod load_from_str {
        use super::*;

        const METADATA: &str = "
bash_tags:
  - Relev
groups:
  - name: group1
  - name: group2
    after:
      - group1
globals:
  - type: say
    content: 'A general message'
plugins:
  - name: Blank.esm
    after:
      - Other.esm
  - name: 'Blank.+\\.esp'
    tag:
      - Delev
";

        #[test]
        fn should_read_all_sections() {
            let mut document = MetadataDocument::default();
            document.load_from_str(METADATA).unwrap();

            assert_eq!(&["Relev".to_owned()], document.bash_tags());
            assert_eq!(1, document.messages().len());
            // The default group is added implicitly.
            assert_eq!(3, document.groups().len());
            assert_eq!(Group::DEFAULT_NAME, document.groups()[0].name());
        }

        #[test]
        fn should_store_literal_and_regex_plugin_entries_separately() {
            let mut document = MetadataDocument::default();
            document.load_from_str(METADATA).unwrap();

            let literal = document.find_plugin("Blank.esm").unwrap().unwrap();
            assert_eq!(1, literal.load_after_files().len());

            let matched = document.find_plugin("Blank - Different.esp").unwrap().unwrap();
            assert_eq!(1, matched.tags().len());

            assert!(document.find_plugin("Unrelated.esp").unwrap().is_none());
        }

        #[test]
        fn should_merge_regex_metadata_into_a_literal_match() {
            let metadata = "
plugins:
  - name: Blank.esp
    group: group1
  - name: 'Blank.*'
    tag:
      - Delev
";
            let mut document = MetadataDocument::default();
            document.load_from_str(metadata).unwrap();

            let plugin = document.find_plugin("Blank.esp").unwrap().unwrap();

            assert_eq!(Some("group1"), plugin.group());
            assert_eq!(1, plugin.tags().len());
        }

        #[test]
        fn should_error_on_a_duplicate_literal_plugin_entry() {
            let metadata = "
plugins:
  - name: Blank.esp
    group: group1
  - name: blank.esp
    group: group2
";
            let mut document = MetadataDocument::default();

            assert!(document.load_from_str(metadata).is_err());
        }

        #[test]
        fn should_error_on_a_duplicate_group_definition() {
            let metadata = "
groups:
  - name: group1
  - name: group1
";
            let mut document = MetadataDocument::default();

            assert!(document.load_from_str(metadata).is_err());
        }

        #[test]
        fn should_error_on_a_non_map_document() {
            let mut document = MetadataDocument::default();

            assert!(document.load_from_str("- a\n- b").is_err());
        }

        #[test]
        fn should_expand_merge_keys() {
            let metadata = "
prelude:
  - &ref
    type: say
    content: 'A shared message'
globals:
  - <<: *ref
";
            let mut document = MetadataDocument::default();
            document.load_from_str(metadata).unwrap();

            assert_eq!(1, document.messages().len());
            assert_eq!(
                "A shared message",
                document.messages()[0].content()[0].text()
            );
        }
    }

    mod replace_prelude {
        use super::*;

        #[test]
        fn should_replace_the_prelude_block_with_the_prelude_content() {
            let masterlist = "prelude:\n  - &tag Relev\nbash_tags:\n  - *tag\n";
            let prelude = "- &tag Delev";

            let replaced = replace_prelude(masterlist, prelude);

            assert_eq!("prelude:\n  - &tag Delev\nbash_tags:\n  - *tag\n", replaced);
        }

        #[test]
        fn should_replace_a_prelude_block_in_the_middle_of_the_document() {
            let masterlist = "groups:\n  - name: g\nprelude:\n  - &tag Relev\nbash_tags:\n  - *tag\n";
            let prelude = "- &tag Delev";

            let replaced = replace_prelude(masterlist, prelude);

            assert_eq!(
                "groups:\n  - name: g\nprelude:\n  - &tag Delev\nbash_tags:\n  - *tag\n",
                replaced
            );
        }

        #[test]
        fn should_leave_a_masterlist_without_a_prelude_unchanged() {
            let masterlist = "bash_tags:\n  - Relev\n";

            assert_eq!(masterlist, replace_prelude(masterlist, "- x"));
        }
    }

    mod save {
        use super::*;

        #[test]
        fn should_round_trip_through_load() {
            let metadata = "
bash_tags:
  - Relev
groups:
  - name: group1
plugins:
  - name: Blank.esm
    after:
      - Other.esm
";
            let mut document = MetadataDocument::default();
            document.load_from_str(metadata).unwrap();

            let tempdir = tempfile::tempdir().unwrap();
            let path = tempdir.path().join("saved.yaml");
            document.save(&path).unwrap();

            let mut reloaded = MetadataDocument::default();
            reloaded.load(&path).unwrap();

            assert_eq!(document, reloaded);
        }

        #[test]
        fn should_write_an_empty_map_for_an_empty_document() {
            let document = MetadataDocument::default();

            let tempdir = tempfile::tempdir().unwrap();
            let path = tempdir.path().join("saved.yaml");
            document.save(&path).unwrap();

            assert_eq!("{}", std::fs::read_to_string(&path).unwrap());
        }
    }
}
