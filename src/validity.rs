//! The per-plugin diagnostic pass that runs after metadata evaluation.
use std::path::{Path, PathBuf};

use unicase::UniCase;

use crate::{
    GameId,
    conditions::ConditionState,
    metadata::{
        CleaningData, Message, MessageContent, MessageType, PluginMetadata,
        select_message_content,
    },
    plugin::{Plugin, has_plugin_file_extension},
};

/// Identifies the check or data source that produced a [SourcedMessage].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[non_exhaustive]
pub enum MessageSource {
    MissingRequirement,
    IncompatibilityPresent,
    MissingMaster,
    InactiveMaster,
    SelfMaster,
    InvalidLightPlugin,
    InvalidMediumPlugin,
    InvalidUpdatePlugin,
    UnsupportedLightPlugin,
    BlueprintMasterDependency,
    LightMasterRequiresNonMaster,
    HeaderVersionTooLow,
    UndefinedGroup,
    BashTagsOverride,
    DirtyPlugin,
    ActivePluginLimitExceeded,
    MetadataMessage,
    TruncatedPlugin,
}

/// A diagnostic message, tagged with the check that produced it.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SourcedMessage {
    source: MessageSource,
    message_type: MessageType,
    text: String,
}

impl SourcedMessage {
    pub(crate) fn new(source: MessageSource, message_type: MessageType, text: String) -> Self {
        Self {
            source,
            message_type,
            text,
        }
    }

    /// Get the check or data source that produced this message.
    pub fn source(&self) -> MessageSource {
        self.source
    }

    /// Get the message's severity.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Get the message text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The game state that validity checks run against.
#[derive(Debug)]
pub(crate) struct ValidityContext<'a> {
    pub(crate) game_id: GameId,
    pub(crate) data_path: &'a Path,
    pub(crate) condition_state: &'a ConditionState,
    pub(crate) loaded_plugins: &'a [&'a Plugin],
    pub(crate) active_plugin_names: &'a [&'a str],
    pub(crate) known_group_names: &'a [String],
    pub(crate) language: &'a str,
}

impl ValidityContext<'_> {
    fn is_active(&self, plugin_name: &str) -> bool {
        self.active_plugin_names
            .iter()
            .any(|n| unicase::eq(*n, plugin_name))
    }

    fn loaded_plugin(&self, plugin_name: &str) -> Option<&Plugin> {
        self.loaded_plugins
            .iter()
            .find(|p| unicase::eq(p.name(), plugin_name))
            .copied()
    }

    fn file_exists(&self, name: &str) -> bool {
        let path = self.data_path.join(name);
        if path.exists() {
            return true;
        }

        if has_plugin_file_extension(self.game_id, Path::new(name)) {
            return ghosted(&path).exists();
        }

        false
    }
}

fn ghosted(path: &Path) -> PathBuf {
    let mut filename = path.file_name().unwrap_or_default().to_os_string();
    filename.push(crate::plugin::GHOST_FILE_EXTENSION);
    path.with_file_name(filename)
}

/// Run every per-plugin diagnostic for the given plugin, with `metadata`
/// being its already-evaluated merged metadata.
pub(crate) fn check_install_validity(
    plugin: &Plugin,
    metadata: Option<&PluginMetadata>,
    context: &ValidityContext<'_>,
) -> Vec<SourcedMessage> {
    let mut messages = Vec::new();

    let is_active = context.is_active(plugin.name());

    if let Some(metadata) = metadata {
        if is_active {
            check_requirements(plugin, metadata, context, &mut messages);
            check_incompatibilities(plugin, metadata, context, &mut messages);
        }

        check_group(metadata, context, &mut messages);
        check_dirty_info(metadata, &mut messages, context.language);

        for message in metadata.messages() {
            push_metadata_message(message, context.language, &mut messages);
        }
    }

    check_masters(plugin, metadata, context, is_active, &mut messages);
    check_plugin_type_validity(plugin, context, &mut messages);
    check_header_version(plugin, context, &mut messages);
    check_bash_tags_override(plugin, context, &mut messages);

    if plugin.is_partially_loaded() {
        messages.push(SourcedMessage::new(
            MessageSource::TruncatedPlugin,
            MessageType::Error,
            format!(
                "\"{}\" is truncated: some of its data could not be read.",
                plugin.name()
            ),
        ));
    }

    messages
}

fn check_requirements(
    plugin: &Plugin,
    metadata: &PluginMetadata,
    context: &ValidityContext<'_>,
    messages: &mut Vec<SourcedMessage>,
) {
    for requirement in metadata.requirements() {
        let name = requirement.name().as_str();

        let mut is_satisfied = context.file_exists(name);

        if is_satisfied && let Some(constraint) = requirement.constraint() {
            is_satisfied = context.condition_state.evaluate(constraint).unwrap_or(false);
        }

        if !is_satisfied {
            let display = requirement.display_name().unwrap_or(name);
            let mut text = format!(
                "\"{}\" requires \"{}\", but it is missing.",
                plugin.name(),
                display
            );
            append_detail(&mut text, requirement.detail(), context.language);

            messages.push(SourcedMessage::new(
                MessageSource::MissingRequirement,
                MessageType::Error,
                text,
            ));
        }
    }
}

fn check_incompatibilities(
    plugin: &Plugin,
    metadata: &PluginMetadata,
    context: &ValidityContext<'_>,
    messages: &mut Vec<SourcedMessage>,
) {
    for incompatibility in metadata.incompatibilities() {
        let name = incompatibility.name().as_str();

        if !context.file_exists(name) {
            continue;
        }

        // A present file is only a conflict if it isn't an inactive plugin.
        let is_conflicting = match context.loaded_plugin(name) {
            Some(_) => context.is_active(name),
            None => true,
        };

        if is_conflicting {
            let display = incompatibility.display_name().unwrap_or(name);
            let mut text = format!(
                "\"{}\" is incompatible with \"{}\", but both are present.",
                plugin.name(),
                display
            );
            append_detail(&mut text, incompatibility.detail(), context.language);

            messages.push(SourcedMessage::new(
                MessageSource::IncompatibilityPresent,
                MessageType::Error,
                text,
            ));
        }
    }
}

fn check_masters(
    plugin: &Plugin,
    metadata: Option<&PluginMetadata>,
    context: &ValidityContext<'_>,
    is_active: bool,
    messages: &mut Vec<SourcedMessage>,
) {
    let has_filter_tag = has_filter_tag(plugin, metadata);

    for master in plugin.masters() {
        if unicase::eq(master.as_str(), plugin.name()) {
            messages.push(SourcedMessage::new(
                MessageSource::SelfMaster,
                MessageType::Error,
                format!("\"{}\" has itself as a master.", plugin.name()),
            ));
            continue;
        }

        let loaded_master = context.loaded_plugin(master);

        if loaded_master.is_none() && !context.file_exists(master) {
            // A missing master is fatal when the plugin would be loaded, and
            // some games try to load all installed plugins.
            let message_type =
                if is_active || context.game_id.requires_all_masters_present() {
                    MessageType::Error
                } else {
                    MessageType::Warn
                };

            messages.push(SourcedMessage::new(
                MessageSource::MissingMaster,
                message_type,
                format!(
                    "\"{}\" requires \"{}\", but it is missing.",
                    plugin.name(),
                    master
                ),
            ));
            continue;
        }

        if is_active && !context.is_active(master) && !has_filter_tag {
            messages.push(SourcedMessage::new(
                MessageSource::InactiveMaster,
                MessageType::Error,
                format!(
                    "\"{}\" requires \"{}\", but it is inactive.",
                    plugin.name(),
                    master
                ),
            ));
        }

        if let Some(loaded_master) = loaded_master {
            if plugin.is_light_plugin() && !loaded_master.is_master() {
                messages.push(SourcedMessage::new(
                    MessageSource::LightMasterRequiresNonMaster,
                    MessageType::Error,
                    format!(
                        "\"{}\" is a light plugin but has the non-master plugin \"{}\" as one of its masters.",
                        plugin.name(),
                        master
                    ),
                ));
            }

            if context.game_id.supports_blueprint_plugins()
                && plugin.is_master()
                && !plugin.is_blueprint_plugin()
                && loaded_master.is_master()
                && loaded_master.is_blueprint_plugin()
            {
                messages.push(SourcedMessage::new(
                    MessageSource::BlueprintMasterDependency,
                    MessageType::Warn,
                    format!(
                        "\"{}\" is not a blueprint master but depends on the blueprint master \"{}\", which will load after it.",
                        plugin.name(),
                        master
                    ),
                ));
            }
        }
    }
}

fn has_filter_tag(plugin: &Plugin, metadata: Option<&PluginMetadata>) -> bool {
    let filter = UniCase::new("Filter");

    plugin
        .bash_tags()
        .iter()
        .any(|t| UniCase::new(t.as_str()) == filter)
        || metadata.is_some_and(|m| {
            m.tags()
                .iter()
                .any(|t| t.is_addition() && UniCase::new(t.name()) == filter)
        })
}

fn check_plugin_type_validity(
    plugin: &Plugin,
    context: &ValidityContext<'_>,
    messages: &mut Vec<SourcedMessage>,
) {
    if plugin.is_light_plugin() && !plugin.is_valid_as_light_plugin() {
        messages.push(SourcedMessage::new(
            MessageSource::InvalidLightPlugin,
            MessageType::Error,
            format!(
                "\"{}\" contains records with FormIDs outside the valid range for a light plugin. Using this plugin will cause irreversible damage to your game saves.",
                plugin.name()
            ),
        ));
    }

    if plugin.is_medium_plugin() && !plugin.is_valid_as_medium_plugin() {
        messages.push(SourcedMessage::new(
            MessageSource::InvalidMediumPlugin,
            MessageType::Error,
            format!(
                "\"{}\" contains records with FormIDs outside the valid range for a medium plugin. Using this plugin will cause irreversible damage to your game saves.",
                plugin.name()
            ),
        ));
    }

    if plugin.is_update_plugin() && !plugin.is_valid_as_update_plugin() {
        messages.push(SourcedMessage::new(
            MessageSource::InvalidUpdatePlugin,
            MessageType::Error,
            format!(
                "\"{}\" is an update plugin but adds new records. Using this plugin will cause irreversible damage to your game saves.",
                plugin.name()
            ),
        ));
    }

    if plugin.has_light_flag() && !context.game_id.supports_light_plugins() {
        messages.push(SourcedMessage::new(
            MessageSource::UnsupportedLightPlugin,
            MessageType::Warn,
            format!(
                "\"{}\" is a light plugin but {} does not support light plugins, so it will be loaded as a full plugin.",
                plugin.name(),
                context.game_id
            ),
        ));
    }
}

fn check_header_version(
    plugin: &Plugin,
    context: &ValidityContext<'_>,
    messages: &mut Vec<SourcedMessage>,
) {
    let minimum = context.game_id.minimum_header_version();

    if let Some(version) = plugin.header_version()
        && version < minimum
    {
        messages.push(SourcedMessage::new(
            MessageSource::HeaderVersionTooLow,
            MessageType::Warn,
            format!(
                "\"{}\" has a header version of {version}, which is less than {minimum}. It may not work correctly with the current version of the game.",
                plugin.name()
            ),
        ));
    }
}

fn check_group(
    metadata: &PluginMetadata,
    context: &ValidityContext<'_>,
    messages: &mut Vec<SourcedMessage>,
) {
    if let Some(group) = metadata.group()
        && !context.known_group_names.iter().any(|g| g == group)
    {
        messages.push(SourcedMessage::new(
            MessageSource::UndefinedGroup,
            MessageType::Error,
            format!(
                "\"{}\" belongs to the group \"{group}\", which does not exist.",
                metadata.name()
            ),
        ));
    }
}

fn check_bash_tags_override(
    plugin: &Plugin,
    context: &ValidityContext<'_>,
    messages: &mut Vec<SourcedMessage>,
) {
    let Some(stem) = Path::new(plugin.name()).file_stem() else {
        return;
    };

    let sidecar_path = context
        .data_path
        .join("BashTags")
        .join(stem)
        .with_extension("txt");

    if sidecar_path.exists() {
        messages.push(SourcedMessage::new(
            MessageSource::BashTagsOverride,
            MessageType::Say,
            format!(
                "\"{}\" has a BashTags file that will override the suggestions made by loadsmith.",
                plugin.name()
            ),
        ));
    }
}

fn check_dirty_info(
    metadata: &PluginMetadata,
    messages: &mut Vec<SourcedMessage>,
    language: &str,
) {
    // Dirty entries that reach this point already passed their CRC check
    // during metadata evaluation.
    for info in metadata.dirty_info() {
        messages.push(to_dirty_message(metadata.name(), info, language));
    }
}

fn to_dirty_message(plugin_name: &str, info: &CleaningData, language: &str) -> SourcedMessage {
    let mut text = format!(
        "\"{plugin_name}\" is dirty: clean it with {}. It has {} ITM record(s), {} deleted reference(s) and {} deleted navmesh(es).",
        info.cleaning_utility(),
        info.itm_count(),
        info.deleted_reference_count(),
        info.deleted_navmesh_count()
    );
    append_detail(&mut text, info.detail(), language);

    SourcedMessage::new(MessageSource::DirtyPlugin, MessageType::Warn, text)
}

fn append_detail(text: &mut String, detail: &[MessageContent], language: &str) {
    if let Some(content) = select_message_content(detail, language) {
        text.push(' ');
        text.push_str(content.text());
    }
}

fn push_metadata_message(
    message: &Message,
    language: &str,
    messages: &mut Vec<SourcedMessage>,
) {
    if let Some(content) = select_message_content(message.content(), language) {
        messages.push(SourcedMessage::new(
            MessageSource::MetadataMessage,
            message.message_type(),
            content.text().to_owned(),
        ));
    }
}

/// Produce global messages for active plugin counts that exceed what the
/// game can load.
pub(crate) fn check_active_plugin_counts(
    game_id: GameId,
    loaded_plugins: &[&Plugin],
    active_plugin_names: &[&str],
) -> Vec<SourcedMessage> {
    let mut full = 0_usize;
    let mut light = 0_usize;
    let mut medium = 0_usize;

    for name in active_plugin_names {
        match loaded_plugins.iter().find(|p| unicase::eq(p.name(), *name)) {
            Some(p) if p.is_light_plugin() => light += 1,
            Some(p) if p.is_medium_plugin() => medium += 1,
            _ => full += 1,
        }
    }

    let mut messages = Vec::new();

    let max_full = game_id.max_active_full_plugins();
    if full > max_full {
        messages.push(SourcedMessage::new(
            MessageSource::ActivePluginLimitExceeded,
            MessageType::Error,
            format!(
                "You have {full} active full plugins but the game only supports up to {max_full}.",
            ),
        ));
    }

    let max_light = game_id.max_active_light_plugins();
    if light > max_light && game_id.supports_light_plugins() {
        messages.push(SourcedMessage::new(
            MessageSource::ActivePluginLimitExceeded,
            MessageType::Error,
            format!(
                "You have {light} active light plugins but the game only supports up to {max_light}.",
            ),
        ));
    }

    let max_medium = game_id.max_active_medium_plugins();
    if medium > max_medium && game_id.supports_medium_plugins() {
        messages.push(SourcedMessage::new(
            MessageSource::ActivePluginLimitExceeded,
            MessageType::Error,
            format!(
                "You have {medium} active medium plugins but the game only supports up to {max_medium}.",
            ),
        ));
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        metadata::{File, Tag, TagSuggestion},
        plugin::LoadScope,
        tests::{Fixture, PluginBuilder, raw_form_id},
    };

    struct TestContext {
        fixture: Fixture,
        condition_state: ConditionState,
        plugins: Vec<Plugin>,
        active: Vec<String>,
        groups: Vec<String>,
    }

    impl TestContext {
        fn new(game_id: GameId) -> Self {
            let fixture = Fixture::new(game_id);
            let condition_state = ConditionState::new(game_id, fixture.data_path());

            Self {
                fixture,
                condition_state,
                plugins: Vec::new(),
                active: Vec::new(),
                groups: vec!["default".to_owned()],
            }
        }

        fn add_plugin(&mut self, name: &str, builder: PluginBuilder) -> &Plugin {
            let path = self.fixture.write_plugin(name, builder);
            let plugin = Plugin::load(
                self.fixture.game_id,
                &[],
                &path,
                LoadScope::WholePlugin,
            )
            .unwrap();
            self.plugins.push(plugin);
            self.plugins.last().unwrap()
        }

        fn activate(&mut self, name: &str) {
            self.active.push(name.to_owned());
        }

        fn check(&self, plugin_name: &str, metadata: Option<&PluginMetadata>) -> Vec<SourcedMessage> {
            let loaded: Vec<&Plugin> = self.plugins.iter().collect();
            let active: Vec<&str> = self.active.iter().map(String::as_str).collect();
            let data_path = self.fixture.data_path();

            let context = ValidityContext {
                game_id: self.fixture.game_id,
                data_path: &data_path,
                condition_state: &self.condition_state,
                loaded_plugins: &loaded,
                active_plugin_names: &active,
                known_group_names: &self.groups,
                language: "en",
            };

            let plugin = loaded
                .iter()
                .find(|p| p.name() == plugin_name)
                .copied()
                .unwrap();

            check_install_validity(plugin, metadata, &context)
        }
    }

    fn sources(messages: &[SourcedMessage]) -> Vec<MessageSource> {
        messages.iter().map(SourcedMessage::source).collect()
    }

    #[test]
    fn should_report_a_missing_master_of_an_active_plugin_as_an_error() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin(
            "Blank.esp",
            PluginBuilder::new(GameId::SkyrimSE).with_master("Missing.esm"),
        );
        context.activate("Blank.esp");

        let messages = context.check("Blank.esp", None);

        assert_eq!(vec![MessageSource::MissingMaster], sources(&messages));
        assert_eq!(MessageType::Error, messages[0].message_type());
    }

    #[test]
    fn should_report_a_missing_master_of_an_inactive_plugin_as_a_warning() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin(
            "Blank.esp",
            PluginBuilder::new(GameId::SkyrimSE).with_master("Missing.esm"),
        );

        let messages = context.check("Blank.esp", None);

        assert_eq!(MessageType::Warn, messages[0].message_type());
    }

    #[test]
    fn should_report_a_missing_master_as_an_error_for_games_that_load_all_plugins() {
        let mut context = TestContext::new(GameId::Morrowind);
        context.add_plugin(
            "Blank.esp",
            PluginBuilder::new(GameId::Morrowind).with_master("Missing.esm"),
        );

        let messages = context.check("Blank.esp", None);

        assert_eq!(MessageType::Error, messages[0].message_type());
    }

    #[test]
    fn should_report_an_inactive_master_of_an_active_plugin() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin(
            "Blank.esm",
            PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
        );
        context.add_plugin(
            "Blank.esp",
            PluginBuilder::new(GameId::SkyrimSE).with_master("Blank.esm"),
        );
        context.activate("Blank.esp");

        let messages = context.check("Blank.esp", None);

        assert_eq!(vec![MessageSource::InactiveMaster], sources(&messages));
    }

    #[test]
    fn should_not_report_an_inactive_master_if_the_plugin_has_the_filter_tag() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin(
            "Blank.esm",
            PluginBuilder::new(GameId::SkyrimSE).master_flagged(),
        );
        context.add_plugin(
            "Blank.esp",
            PluginBuilder::new(GameId::SkyrimSE).with_master("Blank.esm"),
        );
        context.activate("Blank.esp");

        let mut metadata = PluginMetadata::new("Blank.esp").unwrap();
        metadata.set_tags(vec![Tag::new("Filter".into(), TagSuggestion::Addition)]);

        let messages = context.check("Blank.esp", Some(&metadata));

        assert!(messages.is_empty());
    }

    #[test]
    fn should_report_a_plugin_that_is_its_own_master() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin(
            "Blank.esp",
            PluginBuilder::new(GameId::SkyrimSE).with_master("Blank.esp"),
        );

        let messages = context.check("Blank.esp", None);

        assert_eq!(vec![MessageSource::SelfMaster], sources(&messages));
    }

    #[test]
    fn should_report_a_missing_requirement_for_an_active_plugin() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));
        context.activate("Blank.esp");

        let mut metadata = PluginMetadata::new("Blank.esp").unwrap();
        metadata.set_requirements(vec![File::new("Missing.esp".into())]);

        let messages = context.check("Blank.esp", Some(&metadata));

        assert_eq!(vec![MessageSource::MissingRequirement], sources(&messages));
    }

    #[test]
    fn should_not_report_requirements_of_inactive_plugins() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

        let mut metadata = PluginMetadata::new("Blank.esp").unwrap();
        metadata.set_requirements(vec![File::new("Missing.esp".into())]);

        let messages = context.check("Blank.esp", Some(&metadata));

        assert!(messages.is_empty());
    }

    #[test]
    fn should_report_an_unsatisfied_requirement_constraint() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));
        context.add_plugin("Required.esp", PluginBuilder::new(GameId::SkyrimSE));
        context.activate("Blank.esp");

        let mut metadata = PluginMetadata::new("Blank.esp").unwrap();
        metadata.set_requirements(vec![
            File::new("Required.esp".into())
                .with_constraint("file(\"AlsoMissing.esp\")".into()),
        ]);

        let messages = context.check("Blank.esp", Some(&metadata));

        assert_eq!(vec![MessageSource::MissingRequirement], sources(&messages));
    }

    #[test]
    fn should_report_an_active_incompatibility() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));
        context.add_plugin("Conflict.esp", PluginBuilder::new(GameId::SkyrimSE));
        context.activate("Blank.esp");
        context.activate("Conflict.esp");

        let mut metadata = PluginMetadata::new("Blank.esp").unwrap();
        metadata.set_incompatibilities(vec![File::new("Conflict.esp".into())]);

        let messages = context.check("Blank.esp", Some(&metadata));

        assert_eq!(
            vec![MessageSource::IncompatibilityPresent],
            sources(&messages)
        );
    }

    #[test]
    fn should_not_report_an_inactive_plugin_incompatibility() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));
        context.add_plugin("Conflict.esp", PluginBuilder::new(GameId::SkyrimSE));
        context.activate("Blank.esp");

        let mut metadata = PluginMetadata::new("Blank.esp").unwrap();
        metadata.set_incompatibilities(vec![File::new("Conflict.esp".into())]);

        let messages = context.check("Blank.esp", Some(&metadata));

        assert!(messages.is_empty());
    }

    #[test]
    fn should_report_a_light_plugin_with_out_of_range_form_ids() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin(
            "Blank.esl",
            PluginBuilder::new(GameId::SkyrimSE)
                .light_flagged()
                .with_record(raw_form_id(0, 0x700)),
        );

        let messages = context.check("Blank.esl", None);

        assert_eq!(vec![MessageSource::InvalidLightPlugin], sources(&messages));
    }

    #[test]
    fn should_not_report_a_light_plugin_with_in_range_form_ids() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin(
            "Blank.esl",
            PluginBuilder::new(GameId::SkyrimSE)
                .light_flagged()
                .with_record(raw_form_id(0, 0x801))
                .with_record(raw_form_id(0, 0xFFF)),
        );

        let messages = context.check("Blank.esl", None);

        assert!(messages.is_empty());
    }

    #[test]
    fn should_report_an_update_plugin_that_adds_records() {
        let mut context = TestContext::new(GameId::Starfield);
        context.add_plugin(
            "Blank.esm",
            PluginBuilder::new(GameId::Starfield)
                .update_flagged()
                .with_record(raw_form_id(0, 0x800)),
        );

        let messages = context.check("Blank.esm", None);

        assert_eq!(vec![MessageSource::InvalidUpdatePlugin], sources(&messages));
    }

    #[test]
    fn should_report_a_header_version_below_the_game_minimum() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin(
            "Blank.esp",
            PluginBuilder::new(GameId::SkyrimSE).with_header_version(0.94),
        );

        let messages = context.check("Blank.esp", None);

        assert_eq!(vec![MessageSource::HeaderVersionTooLow], sources(&messages));
    }

    #[test]
    fn should_report_an_undefined_group() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

        let mut metadata = PluginMetadata::new("Blank.esp").unwrap();
        metadata.set_group("missing group".into());

        let messages = context.check("Blank.esp", Some(&metadata));

        assert_eq!(vec![MessageSource::UndefinedGroup], sources(&messages));
    }

    #[test]
    fn should_report_a_bash_tags_sidecar_file() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

        let bash_tags_dir = context.fixture.data_path().join("BashTags");
        std::fs::create_dir_all(&bash_tags_dir).unwrap();
        std::fs::write(bash_tags_dir.join("Blank.txt"), "Relev").unwrap();

        let messages = context.check("Blank.esp", None);

        assert_eq!(vec![MessageSource::BashTagsOverride], sources(&messages));
        assert_eq!(MessageType::Say, messages[0].message_type());
    }

    #[test]
    fn should_pass_through_evaluated_metadata_messages() {
        let mut context = TestContext::new(GameId::SkyrimSE);
        context.add_plugin("Blank.esp", PluginBuilder::new(GameId::SkyrimSE));

        let mut metadata = PluginMetadata::new("Blank.esp").unwrap();
        metadata.set_messages(vec![Message::new(
            MessageType::Warn,
            "a warning".into(),
        )]);

        let messages = context.check("Blank.esp", Some(&metadata));

        assert_eq!(vec![MessageSource::MetadataMessage], sources(&messages));
        assert_eq!("a warning", messages[0].text());
    }

    mod check_active_plugin_counts {
        use super::*;

        #[test]
        fn should_report_nothing_when_counts_are_within_limits() {
            let messages = check_active_plugin_counts(GameId::SkyrimSE, &[], &["A.esp"]);

            assert!(messages.is_empty());
        }

        #[test]
        fn should_report_exceeding_the_full_plugin_limit() {
            let names: Vec<String> = (0..=255).map(|i| format!("{i}.esp")).collect();
            let names: Vec<&str> = names.iter().map(String::as_str).collect();

            let messages = check_active_plugin_counts(GameId::SkyrimSE, &[], &names);

            assert_eq!(
                vec![MessageSource::ActivePluginLimitExceeded],
                sources(&messages)
            );
        }
    }
}
