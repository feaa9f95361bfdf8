use saphyr::MarkedYaml;

use super::emit::{EmitYaml, YamlEmitter};
use super::error::{ExpectedType, ParseMetadataError};
use super::yaml::{
    TryFromYaml, YamlObjectType, get_required_string_value, get_string_value, is_mapping,
    node_as_str,
};

/// Represents a URL at which the parent plugin can be found.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Location {
    url: String,
    name: Option<String>,
}

impl Location {
    /// Construct a [Location] with the given URL.
    #[must_use]
    pub fn new(url: String) -> Self {
        Self { url, name: None }
    }

    /// Set a name for the location, e.g. the name of the mod version it
    /// points to.
    #[must_use]
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Get the location's URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the location's name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl TryFromYaml for Location {
    fn try_from_yaml(value: &MarkedYaml) -> Result<Self, ParseMetadataError> {
        if let Some(s) = node_as_str(value) {
            return Ok(Location::new(s.to_owned()));
        }

        if !is_mapping(value) {
            return Err(ParseMetadataError::unexpected_type(
                value.span.start,
                YamlObjectType::Location,
                ExpectedType::MapOrString,
            ));
        }

        let url =
            get_required_string_value(value.span.start, value, "link", YamlObjectType::Location)?;

        let name = get_string_value(value, "name", YamlObjectType::Location)?;

        Ok(Location {
            url: url.to_owned(),
            name: name.map(|(_, n)| n.to_owned()),
        })
    }
}

impl EmitYaml for Location {
    fn is_scalar(&self) -> bool {
        self.name.is_none()
    }

    fn emit_yaml(&self, emitter: &mut YamlEmitter) {
        if self.is_scalar() {
            emitter.single_quoted_str(&self.url);
            return;
        }

        emitter.map_key("link");
        emitter.single_quoted_str(&self.url);

        if let Some(name) = &self.name {
            emitter.map_key("name");
            emitter.single_quoted_str(name);
        }
    }
}
