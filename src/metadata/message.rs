use saphyr::MarkedYaml;

use super::{
    emit::{EmitYaml, YamlEmitter},
    error::{
        ExpectedType, MetadataParsingErrorReason, MultilingualMessageContentsError,
        ParseMetadataError,
    },
    yaml::{
        TryFromYaml, YamlObjectType, expect_mapping, get_required_string_value,
        get_strings_vec_value, get_value, node_as_str, parse_condition,
    },
};

/// The severity of a message.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum MessageType {
    /// Informational only: nothing needs doing.
    #[default]
    Say,
    /// Something may be wrong and is worth the user's attention.
    Warn,
    /// Something is wrong and needs the user to act.
    Error,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Say => write!(f, "say"),
            MessageType::Warn => write!(f, "warn"),
            MessageType::Error => write!(f, "error"),
        }
    }
}

/// One translation of a message's text.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MessageContent {
    text: String,
    language: String,
}

impl MessageContent {
    /// The language code that message content is assumed to be written in
    /// when none is given.
    pub const DEFAULT_LANGUAGE: &'static str = "en";

    /// Wrap a text string, recording it as being in the default language.
    #[must_use]
    pub fn new(text: String) -> Self {
        MessageContent {
            text,
            language: MessageContent::DEFAULT_LANGUAGE.to_owned(),
        }
    }

    /// Record the text as being in the given language instead.
    #[must_use]
    pub fn with_language(mut self, language: String) -> Self {
        self.language = language;
        self
    }

    /// The text itself.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The language code the text is written in, e.g. `en` or `pt_BR`.
    pub fn language(&self) -> &str {
        &self.language
    }
}

impl std::default::Default for MessageContent {
    /// An empty text string in the default language.
    fn default() -> Self {
        MessageContent::new(String::new())
    }
}

fn base_language_code(language: &str) -> &str {
    language.split('_').next().unwrap_or(language)
}

/// Pick the translation from `content` that best fits the given language
/// tag (`<language code>` or `<language code>_<country code>`).
///
/// A single translation is always used as-is. Otherwise the first of these
/// that applies wins: an exact tag match, a match on the language code alone
/// (so `fr_FR` falls back to `fr` and vice versa), a translation in
/// [`MessageContent::DEFAULT_LANGUAGE`], and finally the first translation
/// listed. `None` is only returned when `content` is empty.
pub fn select_message_content<'a>(
    content: &'a [MessageContent],
    language: &str,
) -> Option<&'a MessageContent> {
    if let [only] = content {
        return Some(only);
    }

    let mut base_match = None;
    let mut default_language_match = None;

    for candidate in content {
        if candidate.language == language {
            return Some(candidate);
        }

        if base_match.is_none()
            && base_language_code(&candidate.language) == base_language_code(language)
        {
            base_match = Some(candidate);
        }

        if default_language_match.is_none()
            && candidate.language == MessageContent::DEFAULT_LANGUAGE
        {
            default_language_match = Some(candidate);
        }
    }

    base_match.or(default_language_match).or_else(|| content.first())
}

/// A message attached to a plugin or to the whole load order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Message {
    message_type: MessageType,
    content: Vec<MessageContent>,
    condition: Option<String>,
}

impl Message {
    /// Build a message of the given severity from a single text string in
    /// the default language.
    #[must_use]
    pub fn new(message_type: MessageType, content: String) -> Self {
        Self {
            message_type,
            content: vec![MessageContent::new(content)],
            condition: None,
        }
    }

    /// Build a message of the given severity from a set of translations.
    ///
    /// When there is more than one translation, one of them must be in
    /// [`MessageContent::DEFAULT_LANGUAGE`], otherwise there would be no
    /// fallback for unmatched languages.
    pub fn multilingual(
        message_type: MessageType,
        content: Vec<MessageContent>,
    ) -> Result<Self, MultilingualMessageContentsError> {
        validate_message_contents(&content)?;

        Ok(Self {
            message_type,
            content,
            condition: None,
        })
    }

    /// Attach a condition string that gates the message.
    #[must_use]
    pub fn with_condition(mut self, condition: String) -> Self {
        self.condition = Some(condition);
        self
    }

    /// The message's severity.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// The message's translations.
    pub fn content(&self) -> &[MessageContent] {
        &self.content
    }

    /// The condition that gates the message, if any.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }
}

pub(crate) fn validate_message_contents(
    contents: &[MessageContent],
) -> Result<(), MultilingualMessageContentsError> {
    let has_default_language = contents
        .iter()
        .any(|c| c.language == MessageContent::DEFAULT_LANGUAGE);

    if contents.len() > 1 && !has_default_language {
        Err(MultilingualMessageContentsError {})
    } else {
        Ok(())
    }
}

impl TryFromYaml for MessageContent {
    fn try_from_yaml(value: &MarkedYaml) -> Result<Self, ParseMetadataError> {
        expect_mapping(value, YamlObjectType::MessageContent)?;

        let text =
            get_required_string_value(value.span.start, value, "text", YamlObjectType::Message)?;

        let language =
            get_required_string_value(value.span.start, value, "lang", YamlObjectType::Message)?;

        Ok(MessageContent {
            text: text.to_owned(),
            language: language.to_owned(),
        })
    }
}

pub(crate) fn parse_message_contents_yaml(
    value: &MarkedYaml,
    key: &'static str,
    parent_yaml_type: YamlObjectType,
) -> Result<Vec<MessageContent>, ParseMetadataError> {
    let contents = if let Some(s) = node_as_str(value) {
        vec![MessageContent::new(s.to_owned())]
    } else if let Some(elements) = super::yaml::as_slice(value) {
        elements
            .iter()
            .map(MessageContent::try_from_yaml)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        return Err(ParseMetadataError::unexpected_value_type(
            value.span.start,
            key,
            parent_yaml_type,
            ExpectedType::ArrayOrString,
        ));
    };

    if validate_message_contents(&contents).is_err() {
        Err(ParseMetadataError::new(
            value.span.start,
            MetadataParsingErrorReason::InvalidMultilingualMessageContents,
        ))
    } else {
        Ok(contents)
    }
}

impl TryFromYaml for Message {
    fn try_from_yaml(value: &MarkedYaml) -> Result<Self, ParseMetadataError> {
        expect_mapping(value, YamlObjectType::Message)?;

        let message_type =
            get_required_string_value(value.span.start, value, "type", YamlObjectType::Message)?;
        let message_type = match message_type {
            "warn" => MessageType::Warn,
            "error" => MessageType::Error,
            _ => MessageType::Say,
        };

        let mut content = match get_value(value, "content") {
            Some(n) => parse_message_contents_yaml(n, "content", YamlObjectType::Message)?,
            None => {
                return Err(ParseMetadataError::missing_key(
                    value.span.start,
                    "content",
                    YamlObjectType::Message,
                ));
            }
        };

        let subs = get_strings_vec_value(value, "subs", YamlObjectType::Message)?;

        if !subs.is_empty() {
            for translation in &mut content {
                translation.text = substitute(&translation.text, &subs)
                    .map_err(|e| ParseMetadataError::new(value.span.start, e))?;
            }
        }

        let condition = parse_condition(value, "condition", YamlObjectType::Message)?;

        Ok(Message {
            message_type,
            content,
            condition,
        })
    }
}

/// Replace each positional `{N}` placeholder in the text with the Nth
/// substitution string.
///
/// A brace pair that doesn't wrap a number is kept as literal text. It is an
/// error for a placeholder to have no substitution, and for a substitution
/// to go unused.
fn substitute(
    text: &str,
    substitutions: &[&str],
) -> Result<String, MetadataParsingErrorReason> {
    let mut output = String::with_capacity(text.len());
    let mut used = vec![false; substitutions.len()];

    let mut rest = text;
    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);

        let after_open = &rest[open + 1..];
        let closed_body = after_open
            .find(['{', '}'])
            .filter(|end| after_open[*end..].starts_with('}'))
            .map(|end| &after_open[..end]);

        match closed_body {
            Some(body) => {
                if let Ok(index) = body.parse::<usize>() {
                    let Some(replacement) = substitutions.get(index) else {
                        return Err(MetadataParsingErrorReason::MissingSubstitution(format!(
                            "{{{body}}}"
                        )));
                    };

                    output.push_str(replacement);
                    if let Some(flag) = used.get_mut(index) {
                        *flag = true;
                    }
                } else {
                    // Braces around something that isn't a number are just
                    // text.
                    output.push('{');
                    output.push_str(body);
                    output.push('}');
                }

                rest = &after_open[body.len() + 1..];
            }
            None => {
                // An unpaired brace is just text too.
                output.push('{');
                rest = after_open;
            }
        }
    }
    output.push_str(rest);

    if let Some(index) = used.iter().position(|was_used| !*was_used)
        && let Some(unused) = substitutions.get(index)
    {
        return Err(MetadataParsingErrorReason::MissingPlaceholder(
            (*unused).to_owned(),
            index,
        ));
    }

    Ok(output)
}

impl EmitYaml for MessageContent {
    fn emit_yaml(&self, emitter: &mut YamlEmitter) {
        emitter.map_key("lang");
        emitter.unquoted_str(&self.language);

        emitter.map_key("text");
        emitter.single_quoted_str(&self.text);
    }
}

pub(super) fn emit_message_contents(
    slice: &[MessageContent],
    emitter: &mut YamlEmitter,
    key: &'static str,
) {
    match slice {
        [] => {}
        [detail] => {
            emitter.map_key(key);
            emitter.single_quoted_str(detail.text());
        }
        details => {
            emitter.map_key(key);
            emitter.sequence(details);
        }
    }
}

impl EmitYaml for Message {
    fn emit_yaml(&self, emitter: &mut YamlEmitter) {
        emitter.map_key("type");
        emitter.unquoted_str(&self.message_type.to_string());

        emit_message_contents(&self.content, emitter, "content");

        if let Some(condition) = &self.condition {
            emitter.map_key("condition");
            emitter.single_quoted_str(condition);
        }
    }
}
