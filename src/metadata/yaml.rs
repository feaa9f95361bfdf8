//! The bridge between saphyr's YAML nodes and the typed metadata structs.
//! All saphyr interaction is kept here so the metadata types only see these
//! helpers.
use saphyr::{MarkedYaml, Marker, Scalar, YamlData};

use super::error::{ExpectedType, MetadataParsingErrorReason, ParseMetadataError};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum YamlObjectType {
    File,
    Group,
    Location,
    Message,
    MessageContent,
    PluginCleaningData,
    PluginMetadata,
    Tag,
    MetadataDocument,
    BashTagsElement,
}

impl std::fmt::Display for YamlObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YamlObjectType::File => write!(f, "file"),
            YamlObjectType::Group => write!(f, "group"),
            YamlObjectType::Location => write!(f, "location"),
            YamlObjectType::Message => write!(f, "message"),
            YamlObjectType::MessageContent => write!(f, "message content"),
            YamlObjectType::PluginCleaningData => write!(f, "plugin cleaning data"),
            YamlObjectType::PluginMetadata => write!(f, "plugin metadata"),
            YamlObjectType::Tag => write!(f, "tag"),
            YamlObjectType::MetadataDocument => write!(f, "metadata document"),
            YamlObjectType::BashTagsElement => write!(f, "bash tags"),
        }
    }
}

/// The conversion used to build each metadata type from a YAML node.
pub(crate) trait TryFromYaml: Sized {
    fn try_from_yaml(value: &MarkedYaml) -> Result<Self, ParseMetadataError>;
}

pub(crate) fn as_string_node(value: &str) -> MarkedYaml<'static> {
    MarkedYaml {
        span: Default::default(),
        data: YamlData::Value(Scalar::String(value.to_owned().into())),
    }
}

pub(crate) fn node_as_str<'a>(node: &'a MarkedYaml) -> Option<&'a str> {
    match &node.data {
        YamlData::Value(Scalar::String(s)) => Some(s.as_ref()),
        _ => None,
    }
}

fn node_as_i64(node: &MarkedYaml) -> Option<i64> {
    match &node.data {
        YamlData::Value(Scalar::Integer(i)) => Some(*i),
        _ => None,
    }
}

pub(crate) fn is_mapping(node: &MarkedYaml) -> bool {
    matches!(&node.data, YamlData::Mapping(_))
}

pub(crate) fn as_slice<'a>(node: &'a MarkedYaml) -> Option<&'a [MarkedYaml<'a>]> {
    match &node.data {
        YamlData::Sequence(elements) => Some(elements.as_slice()),
        _ => None,
    }
}

/// Look up a key in a mapping node. Returns `None` if the node is not a
/// mapping or the key is absent.
pub(crate) fn get_value<'a, 'input>(
    node: &'a MarkedYaml<'input>,
    key: &str,
) -> Option<&'a MarkedYaml<'input>> {
    match &node.data {
        YamlData::Mapping(mapping) => {
            let key_node: MarkedYaml<'input> = as_string_node(key);
            mapping.get(&key_node)
        }
        _ => None,
    }
}

pub(crate) fn expect_mapping(
    node: &MarkedYaml,
    yaml_type: YamlObjectType,
) -> Result<(), ParseMetadataError> {
    if is_mapping(node) {
        Ok(())
    } else {
        Err(ParseMetadataError::unexpected_type(
            node.span.start,
            yaml_type,
            ExpectedType::Map,
        ))
    }
}

pub(crate) fn get_string_value<'a>(
    node: &'a MarkedYaml,
    key: &'static str,
    yaml_type: YamlObjectType,
) -> Result<Option<(Marker, &'a str)>, ParseMetadataError> {
    match get_value(node, key) {
        Some(value) => match node_as_str(value) {
            Some(s) => Ok(Some((value.span.start, s))),
            None => Err(ParseMetadataError::unexpected_value_type(
                value.span.start,
                key,
                yaml_type,
                ExpectedType::String,
            )),
        },
        None => Ok(None),
    }
}

pub(crate) fn get_required_string_value<'a>(
    marker: Marker,
    node: &'a MarkedYaml,
    key: &'static str,
    yaml_type: YamlObjectType,
) -> Result<&'a str, ParseMetadataError> {
    match get_string_value(node, key, yaml_type)? {
        Some((_, s)) => Ok(s),
        None => Err(ParseMetadataError::missing_key(marker, key, yaml_type)),
    }
}

pub(crate) fn get_strings_vec_value<'a>(
    node: &'a MarkedYaml,
    key: &'static str,
    yaml_type: YamlObjectType,
) -> Result<Vec<&'a str>, ParseMetadataError> {
    match get_value(node, key) {
        Some(value) => match &value.data {
            YamlData::Sequence(elements) => elements
                .iter()
                .map(|e| {
                    node_as_str(e).ok_or_else(|| {
                        ParseMetadataError::unexpected_value_type(
                            e.span.start,
                            key,
                            yaml_type,
                            ExpectedType::String,
                        )
                    })
                })
                .collect(),
            _ => Err(ParseMetadataError::unexpected_value_type(
                value.span.start,
                key,
                yaml_type,
                ExpectedType::Array,
            )),
        },
        None => Ok(Vec::new()),
    }
}

pub(crate) fn get_u32_value(
    node: &MarkedYaml,
    key: &'static str,
    yaml_type: YamlObjectType,
) -> Result<Option<u32>, ParseMetadataError> {
    match get_value(node, key) {
        Some(value) => {
            if let Some(i) = node_as_i64(value) {
                return i.try_into().map(Some).map_err(|_| {
                    ParseMetadataError::new(
                        value.span.start,
                        MetadataParsingErrorReason::NonU32Number(i),
                    )
                });
            }

            // Hexadecimal CRCs may also reach us as strings.
            if let Some(s) = node_as_str(value) {
                let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
                if let Some(digits) = digits
                    && let Ok(u) = u32::from_str_radix(digits, 16)
                {
                    return Ok(Some(u));
                }
            }

            Err(ParseMetadataError::unexpected_value_type(
                value.span.start,
                key,
                yaml_type,
                ExpectedType::Number,
            ))
        }
        None => Ok(None),
    }
}

pub(crate) fn get_as_slice<'a>(
    node: &'a MarkedYaml,
    key: &'static str,
    yaml_type: YamlObjectType,
) -> Result<&'a [MarkedYaml<'a>], ParseMetadataError> {
    match get_value(node, key) {
        Some(value) => match &value.data {
            YamlData::Sequence(elements) => Ok(elements.as_slice()),
            _ => Err(ParseMetadataError::unexpected_value_type(
                value.span.start,
                key,
                yaml_type,
                ExpectedType::Array,
            )),
        },
        None => Ok(&[]),
    }
}

/// Read and syntax-check a condition string held under the given key.
///
/// The condition is checked with a throwaway evaluator state so that invalid
/// conditions are reported where they are written rather than when they are
/// first evaluated.
pub(crate) fn parse_condition(
    node: &MarkedYaml,
    key: &'static str,
    yaml_type: YamlObjectType,
) -> Result<Option<String>, ParseMetadataError> {
    match get_string_value(node, key, yaml_type)? {
        Some((marker, s)) => {
            let s = s.to_owned();
            if let Err(e) = crate::conditions::parse_only(&s) {
                return Err(ParseMetadataError::invalid_condition(marker, s, e));
            }
            Ok(Some(s))
        }
        None => Ok(None),
    }
}

/// Expand YAML merge keys (`<<`) in place, per the YAML 1.1 merge key type.
///
/// Keys already present in the containing map win over merged keys, and
/// earlier maps in a merge list win over later ones.
pub(crate) fn process_merge_keys(
    node: MarkedYaml<'_>,
) -> Result<MarkedYaml<'_>, ParseMetadataError> {
    let span = node.span;

    match node.data {
        YamlData::Mapping(mapping) => {
            let mut entries: Vec<(MarkedYaml, MarkedYaml)> = Vec::new();
            let mut merged: Vec<(MarkedYaml, MarkedYaml)> = Vec::new();

            for (key, value) in mapping {
                if node_as_str(&key) == Some("<<") {
                    merged.extend(merge_key_entries(value)?);
                } else {
                    entries.push((key, process_merge_keys(value)?));
                }
            }

            for (key, value) in merged {
                if !entries.iter().any(|(k, _)| *k == key) {
                    entries.push((key, value));
                }
            }

            Ok(MarkedYaml {
                span,
                data: YamlData::Mapping(entries.into_iter().collect()),
            })
        }
        YamlData::Sequence(elements) => {
            let elements = elements
                .into_iter()
                .map(process_merge_keys)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(MarkedYaml {
                span,
                data: YamlData::Sequence(elements),
            })
        }
        data => Ok(MarkedYaml { span, data }),
    }
}

fn merge_key_entries(
    value: MarkedYaml<'_>,
) -> Result<Vec<(MarkedYaml<'_>, MarkedYaml<'_>)>, ParseMetadataError> {
    let span = value.span;

    match value.data {
        YamlData::Mapping(mapping) => {
            let mapping = process_merge_keys(MarkedYaml {
                span,
                data: YamlData::Mapping(mapping),
            })?;

            match mapping.data {
                YamlData::Mapping(mapping) => Ok(mapping.into_iter().collect()),
                _ => Err(merge_key_error(span.start)),
            }
        }
        YamlData::Sequence(elements) => {
            let mut entries = Vec::new();
            for element in elements {
                for (key, value) in merge_key_entries(element)? {
                    if !entries.iter().any(|(k, _): &(MarkedYaml, _)| *k == key) {
                        entries.push((key, value));
                    }
                }
            }
            Ok(entries)
        }
        _ => Err(merge_key_error(span.start)),
    }
}

fn merge_key_error(marker: Marker) -> ParseMetadataError {
    ParseMetadataError::new(marker, MetadataParsingErrorReason::InvalidMergeKeyValue)
}
