use saphyr::MarkedYaml;
use unicase::UniCase;

use super::{
    emit::{EmitYaml, YamlEmitter},
    error::{ExpectedType, MultilingualMessageContentsError, ParseMetadataError},
    message::{
        MessageContent, emit_message_contents, parse_message_contents_yaml,
        validate_message_contents,
    },
    yaml::{
        TryFromYaml, YamlObjectType, get_required_string_value, get_string_value, get_value,
        is_mapping, node_as_str, parse_condition,
    },
};

/// A filename that compares, orders and hashes without regard to case.
///
/// Plugin and file references in metadata are matched against the install
/// case-insensitively, so every name used as a lookup key goes through this
/// type.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Filename(UniCase<String>);

impl Filename {
    #[must_use]
    pub fn new(name: String) -> Self {
        Filename(UniCase::new(name))
    }

    /// View the filename with its original casing.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::default::Default for Filename {
    fn default() -> Self {
        Filename::new(String::new())
    }
}

impl AsRef<str> for Filename {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for Filename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A reference to a file under the game's data directory, as used by the
/// `after`, `req` and `inc` metadata lists.
///
/// The name may be a bare filename or a relative path. Identity is the name
/// alone: two references to the same file compare equal even if their other
/// fields differ, which is what the metadata merge relies on.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct File {
    name: Filename,
    display_name: Option<String>,
    detail: Vec<MessageContent>,
    condition: Option<String>,
    constraint: Option<String>,
}

impl File {
    /// Reference the file at the given name or relative path.
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name: Filename::new(name),
            ..Default::default()
        }
    }

    /// Give the reference a human-friendly name to show in messages in
    /// place of the filename.
    #[must_use]
    pub fn with_display_name(mut self, display_name: String) -> Self {
        self.display_name = Some(display_name);
        self
    }

    /// Attach a condition string that gates the reference.
    #[must_use]
    pub fn with_condition(mut self, condition: String) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Attach explanatory text to append to any diagnostic this reference
    /// produces. With more than one translation, one must be in
    /// [`MessageContent::DEFAULT_LANGUAGE`].
    pub fn with_detail(
        mut self,
        detail: Vec<MessageContent>,
    ) -> Result<Self, MultilingualMessageContentsError> {
        validate_message_contents(&detail)?;
        self.detail = detail;
        Ok(self)
    }

    /// Attach a constraint string: the referenced file only counts as
    /// satisfying a requirement while the constraint holds.
    #[must_use]
    pub fn with_constraint(mut self, constraint: String) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// The referenced name or relative path.
    pub fn name(&self) -> &Filename {
        &self.name
    }

    /// The name to show in messages, if one was given.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Explanatory text for diagnostics about this reference, e.g. where to
    /// get the file or how to fix the conflict.
    pub fn detail(&self) -> &[MessageContent] {
        &self.detail
    }

    /// The condition gating the reference, if any.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// The constraint the installed file must satisfy, if any.
    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }
}

impl TryFromYaml for File {
    fn try_from_yaml(value: &MarkedYaml) -> Result<Self, ParseMetadataError> {
        if let Some(s) = node_as_str(value) {
            return Ok(File::new(s.to_owned()));
        }

        if !is_mapping(value) {
            return Err(ParseMetadataError::unexpected_type(
                value.span.start,
                YamlObjectType::File,
                ExpectedType::MapOrString,
            ));
        }

        let name = get_required_string_value(value.span.start, value, "name", YamlObjectType::File)?;

        let display_name = get_string_value(value, "display", YamlObjectType::File)?;

        let detail = match get_value(value, "detail") {
            Some(n) => parse_message_contents_yaml(n, "detail", YamlObjectType::File)?,
            None => Vec::new(),
        };

        let condition = parse_condition(value, "condition", YamlObjectType::File)?;

        let constraint = parse_condition(value, "constraint", YamlObjectType::File)?;

        Ok(File {
            name: Filename::new(name.to_owned()),
            display_name: display_name.map(|(_, s)| s.to_owned()),
            detail,
            condition,
            constraint,
        })
    }
}

impl EmitYaml for File {
    fn is_scalar(&self) -> bool {
        self.condition.is_none()
            && self.constraint.is_none()
            && self.detail.is_empty()
            && self.display_name.is_none()
    }

    fn emit_yaml(&self, emitter: &mut YamlEmitter) {
        if self.is_scalar() {
            emitter.single_quoted_str(self.name.as_str());
            return;
        }

        emitter.map_key("name");
        emitter.single_quoted_str(self.name.as_str());

        if let Some(display_name) = &self.display_name {
            emitter.map_key("display");
            emitter.single_quoted_str(display_name);
        }

        emit_message_contents(&self.detail, emitter, "detail");

        if let Some(condition) = &self.condition {
            emitter.map_key("condition");
            emitter.single_quoted_str(condition);
        }

        if let Some(constraint) = &self.constraint {
            emitter.map_key("constraint");
            emitter.single_quoted_str(constraint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod filename {
        use super::*;

        #[test]
        fn should_compare_case_insensitively() {
            assert_eq!(Filename::new("name".into()), Filename::new("NAME".into()));
            assert_ne!(Filename::new("name1".into()), Filename::new("name2".into()));
        }

        #[test]
        fn should_keep_the_original_casing() {
            assert_eq!("NaMe.esp", Filename::new("NaMe.esp".into()).as_str());
        }

        #[test]
        fn should_hash_equal_names_equally() {
            use std::hash::{DefaultHasher, Hash, Hasher};

            let hash = |filename: &Filename| {
                let mut hasher = DefaultHasher::new();
                filename.hash(&mut hasher);
                hasher.finish()
            };

            assert_eq!(
                hash(&Filename::new("name".into())),
                hash(&Filename::new("NAME".into()))
            );
        }
    }

    mod file_eq {
        use super::*;

        #[test]
        fn should_be_case_insensitive_on_name() {
            assert_eq!(File::new("name".into()), File::new("name".into()));
            assert_eq!(File::new("name".into()), File::new("NAME".into()));
            assert_ne!(File::new("name1".into()), File::new("name2".into()));
        }
    }

    mod try_from_yaml {
        use crate::metadata::parse;

        use super::*;

        #[test]
        fn should_only_set_name_if_decoding_from_scalar() {
            let yaml = parse("name1");

            let file = File::try_from_yaml(&yaml).unwrap();

            assert_eq!("name1", file.name().as_str());
            assert!(file.display_name().is_none());
            assert!(file.condition().is_none());
            assert!(file.constraint().is_none());
            assert!(file.detail().is_empty());
        }

        #[test]
        fn should_error_if_given_a_list() {
            let yaml = parse("[0, 1, 2]");

            assert!(File::try_from_yaml(&yaml).is_err());
        }

        #[test]
        fn should_error_if_name_is_missing() {
            let yaml = parse("{display: display1}");

            assert!(File::try_from_yaml(&yaml).is_err());
        }

        #[test]
        fn should_error_if_given_an_invalid_condition() {
            let yaml = parse("{name: name1, condition: invalid}");

            assert!(File::try_from_yaml(&yaml).is_err());
        }

        #[test]
        fn should_set_all_given_fields() {
            let yaml = parse(
                "{name: name1, display: display1, condition: 'file(\"Foo.esp\")', constraint: 'file(\"Bar.esp\")', detail: 'details'}",
            );

            let file = File::try_from_yaml(&yaml).unwrap();

            assert_eq!("name1", file.name().as_str());
            assert_eq!("display1", file.display_name().unwrap());
            assert_eq!("file(\"Foo.esp\")", file.condition().unwrap());
            assert_eq!("file(\"Bar.esp\")", file.constraint().unwrap());
            assert_eq!(&[MessageContent::new("details".into())], file.detail());
        }

        #[test]
        fn should_read_all_listed_detail_message_contents() {
            let yaml = parse(
                "{name: name1, detail: [{text: english, lang: en}, {text: french, lang: fr}]}",
            );

            let file = File::try_from_yaml(&yaml).unwrap();

            assert_eq!(
                &[
                    MessageContent::new("english".into()),
                    MessageContent::new("french".into()).with_language("fr".into())
                ],
                file.detail()
            );
        }

        #[test]
        fn should_error_if_multiple_details_are_given_and_none_are_english() {
            let yaml = parse(
                "name: name1\ndetail:\n  - lang: de\n    text: content1\n  - lang: fr\n    text: content2",
            );

            assert!(File::try_from_yaml(&yaml).is_err());
        }
    }

    mod emit_yaml {
        use crate::metadata::emit;

        use super::*;

        #[test]
        fn should_emit_only_name_scalar_if_other_fields_are_empty() {
            let file = File::new("filename".into());

            assert_eq!("'filename'", emit(&file));
        }

        #[test]
        fn should_emit_map_with_display_if_display_name_is_not_empty() {
            let file = File::new("filename".into()).with_display_name("display1".into());

            assert_eq!("name: 'filename'\ndisplay: 'display1'", emit(&file));
        }

        #[test]
        fn should_emit_map_with_condition_if_it_is_not_empty() {
            let file = File::new("filename".into()).with_condition("condition1".into());

            assert_eq!("name: 'filename'\ncondition: 'condition1'", emit(&file));
        }

        #[test]
        fn should_emit_map_with_a_detail_string_if_detail_is_monolingual() {
            let file = File::new("filename".into())
                .with_detail(vec![MessageContent::new("message".into())])
                .unwrap();

            assert_eq!("name: 'filename'\ndetail: 'message'", emit(&file));
        }

        #[test]
        fn should_emit_map_with_a_detail_array_if_detail_is_multilingual() {
            let file = File::new("filename".into())
                .with_detail(vec![
                    MessageContent::new("english".into()).with_language("en".into()),
                    MessageContent::new("french".into()).with_language("fr".into()),
                ])
                .unwrap();

            assert_eq!(
                "name: 'filename'
detail:
  - lang: en
    text: 'english'
  - lang: fr
    text: 'french'",
                emit(&file)
            );
        }
    }
}
