use saphyr::MarkedYaml;

use super::{
    emit::{EmitYaml, YamlEmitter},
    error::{MultilingualMessageContentsError, ParseMetadataError},
    message::{
        MessageContent, emit_message_contents, parse_message_contents_yaml,
        validate_message_contents,
    },
    yaml::{
        TryFromYaml, YamlObjectType, expect_mapping, get_required_string_value, get_u32_value,
        get_value,
    },
};

/// Represents the data provided by a cleaning utility for a specific plugin
/// version, identified by CRC.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CleaningData {
    crc: u32,
    utility: String,
    itm_count: u32,
    deleted_reference_count: u32,
    deleted_navmesh_count: u32,
    detail: Vec<MessageContent>,
}

impl CleaningData {
    /// Create a value for the given plugin CRC and cleaning utility name.
    #[must_use]
    pub fn new(crc: u32, utility: String) -> Self {
        Self {
            crc,
            utility,
            ..Default::default()
        }
    }

    /// Set the number of identical-to-master records found in the plugin.
    #[must_use]
    pub fn with_itm_count(mut self, itm_count: u32) -> Self {
        self.itm_count = itm_count;
        self
    }

    /// Set the number of deleted references found in the plugin.
    #[must_use]
    pub fn with_deleted_reference_count(mut self, deleted_reference_count: u32) -> Self {
        self.deleted_reference_count = deleted_reference_count;
        self
    }

    /// Set the number of deleted navmeshes found in the plugin.
    #[must_use]
    pub fn with_deleted_navmesh_count(mut self, deleted_navmesh_count: u32) -> Self {
        self.deleted_navmesh_count = deleted_navmesh_count;
        self
    }

    /// Set the detail message content. If multilingual, one language must be
    /// [`MessageContent::DEFAULT_LANGUAGE`].
    pub fn with_detail(
        mut self,
        detail: Vec<MessageContent>,
    ) -> Result<Self, MultilingualMessageContentsError> {
        validate_message_contents(&detail)?;
        self.detail = detail;
        Ok(self)
    }

    /// Get the CRC that identifies the plugin version the data applies to.
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Get the name of the cleaning utility that the data came from.
    pub fn cleaning_utility(&self) -> &str {
        &self.utility
    }

    /// Get the number of identical-to-master records.
    pub fn itm_count(&self) -> u32 {
        self.itm_count
    }

    /// Get the number of deleted references.
    pub fn deleted_reference_count(&self) -> u32 {
        self.deleted_reference_count
    }

    /// Get the number of deleted navmeshes.
    pub fn deleted_navmesh_count(&self) -> u32 {
        self.deleted_navmesh_count
    }

    /// Get the detail message content.
    pub fn detail(&self) -> &[MessageContent] {
        &self.detail
    }
}

impl TryFromYaml for CleaningData {
    fn try_from_yaml(value: &MarkedYaml) -> Result<Self, ParseMetadataError> {
        expect_mapping(value, YamlObjectType::PluginCleaningData)?;

        let crc = match get_u32_value(value, "crc", YamlObjectType::PluginCleaningData)? {
            Some(c) => c,
            None => {
                return Err(ParseMetadataError::missing_key(
                    value.span.start,
                    "crc",
                    YamlObjectType::PluginCleaningData,
                ));
            }
        };

        let utility = get_required_string_value(
            value.span.start,
            value,
            "util",
            YamlObjectType::PluginCleaningData,
        )?;

        let itm_count =
            get_u32_value(value, "itm", YamlObjectType::PluginCleaningData)?.unwrap_or(0);
        let deleted_reference_count =
            get_u32_value(value, "udr", YamlObjectType::PluginCleaningData)?.unwrap_or(0);
        let deleted_navmesh_count =
            get_u32_value(value, "nav", YamlObjectType::PluginCleaningData)?.unwrap_or(0);

        let detail = match get_value(value, "detail") {
            Some(n) => parse_message_contents_yaml(n, "detail", YamlObjectType::PluginCleaningData)?,
            None => Vec::new(),
        };

        Ok(CleaningData {
            crc,
            utility: utility.to_owned(),
            itm_count,
            deleted_reference_count,
            deleted_navmesh_count,
            detail,
        })
    }
}

impl EmitYaml for CleaningData {
    fn emit_yaml(&self, emitter: &mut YamlEmitter) {
        emitter.map_key("crc");
        emitter.u32_hex(self.crc);

        emitter.map_key("util");
        emitter.single_quoted_str(&self.utility);

        if self.itm_count > 0 {
            emitter.map_key("itm");
            emitter.unsigned(self.itm_count);
        }

        if self.deleted_reference_count > 0 {
            emitter.map_key("udr");
            emitter.unsigned(self.deleted_reference_count);
        }

        if self.deleted_navmesh_count > 0 {
            emitter.map_key("nav");
            emitter.unsigned(self.deleted_navmesh_count);
        }

        emit_message_contents(&self.detail, emitter, "detail");
    }
}
