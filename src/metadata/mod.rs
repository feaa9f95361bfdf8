//! Holds all types related to plugin metadata.
mod cleaning_data;
pub(crate) mod document;
mod emit;
pub mod error;
mod file;
mod group;
mod location;
pub(crate) mod message;
mod plugin_metadata;
mod tag;
pub(crate) mod yaml;

pub use cleaning_data::CleaningData;
pub use file::{File, Filename};
pub use group::Group;
pub use location::Location;
pub use message::{Message, MessageContent, MessageType, select_message_content};
pub use plugin_metadata::PluginMetadata;
pub use tag::{Tag, TagSuggestion};

#[cfg(test)]
fn emit<T: emit::EmitYaml>(metadata: &T) -> String {
    let mut emitter = emit::YamlEmitter::new();
    metadata.emit_yaml(&mut emitter);

    emitter.into_string()
}

#[cfg(test)]
fn parse(yaml: &str) -> saphyr::MarkedYaml<'_> {
    use saphyr::LoadableYamlNode;

    saphyr::MarkedYaml::load_from_str(yaml)
        .unwrap()
        .pop()
        .unwrap()
}
