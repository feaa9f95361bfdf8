use regress::Regex;
use saphyr::MarkedYaml;

use crate::{case_insensitive_regex, logging};

use super::{
    cleaning_data::CleaningData,
    emit::{EmitYaml, YamlEmitter},
    error::{MetadataParsingErrorReason, ParseMetadataError, RegexError},
    file::File,
    location::Location,
    message::Message,
    tag::Tag,
    yaml::{
        TryFromYaml, YamlObjectType, expect_mapping, get_as_slice, get_required_string_value,
        get_string_value,
    },
};

/// Represents a plugin's metadata.
#[derive(Clone, Debug, Default)]
pub struct PluginMetadata {
    name: PluginName,
    group: Option<String>,
    load_after: Vec<File>,
    requirements: Vec<File>,
    incompatibilities: Vec<File>,
    messages: Vec<Message>,
    tags: Vec<Tag>,
    dirty_info: Vec<CleaningData>,
    clean_info: Vec<CleaningData>,
    locations: Vec<Location>,
}

impl PluginMetadata {
    /// Construct a [PluginMetadata] object with no metadata for a plugin
    /// with the given filename, which may also be a regular expression.
    pub fn new(name: &str) -> Result<Self, RegexError> {
        Ok(Self {
            name: PluginName::new(name).map_err(RegexError::from)?,
            ..Default::default()
        })
    }

    /// Get the plugin name.
    pub fn name(&self) -> &str {
        &self.name.string
    }

    /// Get the plugin's group.
    ///
    /// The [Option] is `None` if no group is explicitly set.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Get the plugins that the plugin must load after.
    pub fn load_after_files(&self) -> &[File] {
        &self.load_after
    }

    /// Get the files that the plugin requires to be installed.
    pub fn requirements(&self) -> &[File] {
        &self.requirements
    }

    /// Get the files that the plugin is incompatible with.
    pub fn incompatibilities(&self) -> &[File] {
        &self.incompatibilities
    }

    /// Get the plugin's messages.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the plugin's Bash Tag suggestions.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Get the plugin's dirty plugin information.
    pub fn dirty_info(&self) -> &[CleaningData] {
        &self.dirty_info
    }

    /// Get the plugin's clean plugin information.
    pub fn clean_info(&self) -> &[CleaningData] {
        &self.clean_info
    }

    /// Get the locations at which this plugin can be found.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Set the plugin's group.
    pub fn set_group(&mut self, group: String) {
        self.group = Some(group);
    }

    /// Unsets the plugin's group, so that it is implicitly a member of the
    /// default group.
    pub fn unset_group(&mut self) {
        self.group = None;
    }

    /// Set the plugins that the plugin must load after.
    pub fn set_load_after_files(&mut self, files: Vec<File>) {
        self.load_after = files;
    }

    /// Set the files that the plugin requires to be installed.
    pub fn set_requirements(&mut self, files: Vec<File>) {
        self.requirements = files;
    }

    /// Set the files that the plugin is incompatible with.
    pub fn set_incompatibilities(&mut self, files: Vec<File>) {
        self.incompatibilities = files;
    }

    /// Set the plugin's messages.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Set the plugin's Bash Tag suggestions.
    pub fn set_tags(&mut self, tags: Vec<Tag>) {
        self.tags = tags;
    }

    /// Set the plugin's dirty plugin information.
    pub fn set_dirty_info(&mut self, dirty_info: Vec<CleaningData>) {
        self.dirty_info = dirty_info;
    }

    /// Set the plugin's clean plugin information.
    pub fn set_clean_info(&mut self, clean_info: Vec<CleaningData>) {
        self.clean_info = clean_info;
    }

    /// Set the locations at which this plugin can be found.
    pub fn set_locations(&mut self, locations: Vec<Location>) {
        self.locations = locations;
    }

    /// Merge metadata from the given [PluginMetadata] object into this
    /// object.
    ///
    /// List-valued fields are merged by set union, keyed on each value's
    /// identity, except messages, which are concatenated in order. This
    /// object's group is only replaced if it is not already explicit.
    pub fn merge_metadata(&mut self, plugin: &PluginMetadata) {
        if plugin.has_name_only() {
            return;
        }

        if self.group.is_none() && plugin.group.is_some() {
            self.group.clone_from(&plugin.group);
        }

        merge_vecs(&mut self.load_after, &plugin.load_after, |a, b| {
            a.name() == b.name()
        });
        merge_vecs(&mut self.requirements, &plugin.requirements, |a, b| {
            a.name() == b.name()
        });
        merge_vecs(
            &mut self.incompatibilities,
            &plugin.incompatibilities,
            |a, b| a.name() == b.name(),
        );
        merge_vecs(&mut self.tags, &plugin.tags, |a, b| {
            a.name() == b.name() && a.is_addition() == b.is_addition()
        });
        self.messages.extend(plugin.messages.iter().cloned());
        merge_vecs(&mut self.dirty_info, &plugin.dirty_info, |a, b| {
            a.crc() == b.crc()
        });
        merge_vecs(&mut self.clean_info, &plugin.clean_info, |a, b| {
            a.crc() == b.crc()
        });
        merge_vecs(&mut self.locations, &plugin.locations, |a, b| {
            a.url() == b.url()
        });
    }

    /// Check if no plugin metadata is set.
    pub fn has_name_only(&self) -> bool {
        self.group.is_none()
            && self.load_after.is_empty()
            && self.requirements.is_empty()
            && self.incompatibilities.is_empty()
            && self.messages.is_empty()
            && self.tags.is_empty()
            && self.dirty_info.is_empty()
            && self.clean_info.is_empty()
            && self.locations.is_empty()
    }

    /// Check if the plugin name is a regular expression.
    ///
    /// Returns `true` if the plugin name contains any of the characters
    /// `:\*?|` and `false` otherwise.
    pub fn is_regex_plugin(&self) -> bool {
        self.name.regex.is_some()
    }

    /// Check if the given plugin name matches this plugin metadata object's
    /// name field.
    ///
    /// If the name field is a regular expression, the given plugin name will
    /// be matched against it, otherwise the strings will be compared
    /// case-insensitively. The given plugin name must be literal, i.e. not a
    /// regular expression.
    pub fn name_matches(&self, other_name: &str) -> bool {
        if let Some(regex) = &self.name.regex {
            regex.find(other_name).is_some()
        } else {
            unicase::eq(self.name.string.as_str(), other_name)
        }
    }

    /// Serialises the plugin metadata as YAML.
    pub fn as_yaml(&self) -> String {
        let mut emitter = YamlEmitter::new();
        self.emit_yaml(&mut emitter);
        emitter.into_string()
    }
}

impl PartialEq for PluginMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.group == other.group
            && self.load_after == other.load_after
            && self.requirements == other.requirements
            && self.incompatibilities == other.incompatibilities
            && self.messages == other.messages
            && self.tags == other.tags
            && self.dirty_info == other.dirty_info
            && self.clean_info == other.clean_info
            && self.locations == other.locations
    }
}

#[derive(Clone, Default)]
struct PluginName {
    string: String,
    regex: Option<Regex>,
}

impl std::fmt::Debug for PluginName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginName")
            .field("string", &self.string)
            .field("is_regex", &self.regex.is_some())
            .finish()
    }
}

impl PluginName {
    fn new(name: &str) -> Result<Self, Box<regress::Error>> {
        let name = crate::plugin::trim_dot_ghost(name).to_owned();

        if is_regex_name(&name) {
            let regex = case_insensitive_regex(&format!("^(?:{name})$"))?;
            Ok(Self {
                string: name,
                regex: Some(regex),
            })
        } else {
            Ok(Self {
                string: name,
                regex: None,
            })
        }
    }
}

impl std::cmp::PartialEq for PluginName {
    fn eq(&self, other: &Self) -> bool {
        self.string == other.string
    }
}

fn is_regex_name(name: &str) -> bool {
    name.contains([':', '\\', '*', '?', '|'])
}

/// Append the source elements whose identity no target element shares,
/// preserving order. The whole target is searched on every append, so
/// duplicates within the source also collapse to one appended element and
/// the merge is a true set union keyed on `is_same`.
fn merge_vecs<T: Clone>(target: &mut Vec<T>, source: &[T], mut is_same: impl FnMut(&T, &T) -> bool) {
    for element in source {
        if !target.iter().any(|existing| is_same(existing, element)) {
            target.push(element.clone());
        }
    }
}

impl TryFromYaml for PluginMetadata {
    fn try_from_yaml(value: &MarkedYaml) -> Result<Self, ParseMetadataError> {
        expect_mapping(value, YamlObjectType::PluginMetadata)?;

        let name = get_required_string_value(
            value.span.start,
            value,
            "name",
            YamlObjectType::PluginMetadata,
        )?;
        let name = match PluginName::new(name) {
            Ok(n) => n,
            Err(e) => {
                logging::debug!("The plugin name \"{name}\" is not a valid regex");
                return Err(ParseMetadataError::new(
                    value.span.start,
                    MetadataParsingErrorReason::InvalidRegex(e),
                ));
            }
        };

        let group = get_string_value(value, "group", YamlObjectType::PluginMetadata)?;

        let load_after = get_vec::<File>(value, "after")?;
        let requirements = get_vec::<File>(value, "req")?;
        let incompatibilities = get_vec::<File>(value, "inc")?;
        let messages = get_vec::<Message>(value, "msg")?;
        let tags = get_vec::<Tag>(value, "tag")?;
        let dirty_info = get_vec::<CleaningData>(value, "dirty")?;
        let clean_info = get_vec::<CleaningData>(value, "clean")?;
        let locations = get_vec::<Location>(value, "url")?;

        Ok(PluginMetadata {
            name,
            group: group.map(|(_, g)| g.to_owned()),
            load_after,
            requirements,
            incompatibilities,
            messages,
            tags,
            dirty_info,
            clean_info,
            locations,
        })
    }
}

fn get_vec<T: TryFromYaml>(
    node: &MarkedYaml,
    key: &'static str,
) -> Result<Vec<T>, ParseMetadataError> {
    get_as_slice(node, key, YamlObjectType::PluginMetadata)?
        .iter()
        .map(T::try_from_yaml)
        .collect()
}

impl EmitYaml for PluginMetadata {
    fn emit_yaml(&self, emitter: &mut YamlEmitter) {
        emitter.map_key("name");
        emitter.single_quoted_str(self.name());

        if !self.locations.is_empty() {
            emitter.map_key("url");
            emitter.sequence(&self.locations);
        }

        if let Some(group) = &self.group {
            emitter.map_key("group");
            emitter.single_quoted_str(group);
        }

        if !self.load_after.is_empty() {
            emitter.map_key("after");
            emitter.sequence(&self.load_after);
        }

        if !self.requirements.is_empty() {
            emitter.map_key("req");
            emitter.sequence(&self.requirements);
        }

        if !self.incompatibilities.is_empty() {
            emitter.map_key("inc");
            emitter.sequence(&self.incompatibilities);
        }

        if !self.messages.is_empty() {
            emitter.map_key("msg");
            emitter.sequence(&self.messages);
        }

        if !self.tags.is_empty() {
            emitter.map_key("tag");
            emitter.sequence(&self.tags);
        }

        if !self.dirty_info.is_empty() {
            emitter.map_key("dirty");
            emitter.sequence(&self.dirty_info);
        }

        if !self.clean_info.is_empty() {
            emitter.map_key("clean");
            emitter.sequence(&self.clean_info);
        }
    }
}
