use saphyr::MarkedYaml;

use super::emit::{EmitYaml, YamlEmitter};
use super::error::{ExpectedType, ParseMetadataError};
use super::yaml::{
    TryFromYaml, YamlObjectType, get_required_string_value, is_mapping, node_as_str,
    parse_condition,
};

/// Represents whether a Bash Tag suggestion is for addition or removal.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TagSuggestion {
    #[default]
    Addition,
    Removal,
}

/// Represents a Bash Tag suggestion for a plugin.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Tag {
    name: String,
    suggestion: TagSuggestion,
    condition: Option<String>,
}

impl Tag {
    /// Create a [Tag] suggestion for the given tag name.
    #[must_use]
    pub fn new(name: String, suggestion: TagSuggestion) -> Self {
        Self {
            name,
            suggestion,
            condition: None,
        }
    }

    /// Set the condition string.
    #[must_use]
    pub fn with_condition(mut self, condition: String) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Get the tag's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get if the tag should be added.
    pub fn is_addition(&self) -> bool {
        self.suggestion == TagSuggestion::Addition
    }

    /// Get the condition string.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }
}

impl TryFromYaml for Tag {
    fn try_from_yaml(value: &MarkedYaml) -> Result<Self, ParseMetadataError> {
        if let Some(s) = node_as_str(value) {
            let (name, suggestion) = name_and_suggestion(s);
            return Ok(Tag {
                name,
                suggestion,
                condition: None,
            });
        }

        if !is_mapping(value) {
            return Err(ParseMetadataError::unexpected_type(
                value.span.start,
                YamlObjectType::Tag,
                ExpectedType::MapOrString,
            ));
        }

        let name = get_required_string_value(value.span.start, value, "name", YamlObjectType::Tag)?;

        let condition = parse_condition(value, "condition", YamlObjectType::Tag)?;

        let (name, suggestion) = name_and_suggestion(name);
        Ok(Tag {
            name,
            suggestion,
            condition,
        })
    }
}

fn name_and_suggestion(value: &str) -> (String, TagSuggestion) {
    if let Some(name) = value.strip_prefix('-') {
        (name.to_owned(), TagSuggestion::Removal)
    } else {
        (value.to_owned(), TagSuggestion::Addition)
    }
}

impl EmitYaml for Tag {
    fn is_scalar(&self) -> bool {
        self.condition.is_none()
    }

    fn emit_yaml(&self, emitter: &mut YamlEmitter) {
        if self.is_scalar() {
            emitter.unquoted_str(&self.prefixed_name());
            return;
        }

        emitter.map_key("name");
        emitter.single_quoted_str(&self.prefixed_name());

        if let Some(condition) = &self.condition {
            emitter.map_key("condition");
            emitter.single_quoted_str(condition);
        }
    }
}

impl Tag {
    fn prefixed_name(&self) -> String {
        if self.is_addition() {
            self.name.clone()
        } else {
            format!("-{}", self.name)
        }
    }
}
