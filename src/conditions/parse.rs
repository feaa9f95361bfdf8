use std::path::{Component, Path, PathBuf};

use regress::Regex;

use crate::case_insensitive_regex;

use super::error::ConditionParseError;

/// A comparison operator used by the version and checksum condition
/// functions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

impl ComparisonOperator {
    pub(crate) fn accepts(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering;

        match self {
            ComparisonOperator::Equal => ordering == Ordering::Equal,
            ComparisonOperator::NotEqual => ordering != Ordering::Equal,
            ComparisonOperator::LessThan => ordering == Ordering::Less,
            ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
            ComparisonOperator::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonOperator::GreaterThanOrEqual => ordering != Ordering::Less,
        }
    }
}

/// A path whose final component is a regular expression and whose parent is
/// a literal path inside the game's data directory.
pub(crate) struct PathRegex {
    pub(crate) parent: PathBuf,
    pub(crate) pattern: String,
    pub(crate) regex: Regex,
}

impl std::fmt::Debug for PathRegex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathRegex")
            .field("parent", &self.parent)
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl PartialEq for PathRegex {
    fn eq(&self, other: &Self) -> bool {
        self.parent == other.parent && self.pattern == other.pattern
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum Function {
    FilePath(PathBuf),
    FileRegex(PathRegex),
    Readable(PathBuf),
    Active(String),
    Many(PathRegex),
    ManyActive(PathRegex),
    IsMaster(String),
    Checksum(PathBuf, u32),
    Version(PathBuf, String, ComparisonOperator),
    ProductVersion(PathBuf, String, ComparisonOperator),
    FilenameVersion(PathRegex, String, ComparisonOperator),
}

#[derive(Debug, PartialEq)]
pub(crate) enum Expression {
    Or(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Function(Function),
}

pub(crate) fn parse_expression(input: &str) -> Result<Expression, ConditionParseError> {
    let mut parser = Parser { input, offset: 0 };

    parser.skip_whitespace();
    let expression = parser.parse_or()?;
    parser.skip_whitespace();

    if parser.offset == input.len() {
        Ok(expression)
    } else {
        Err(parser.expected("end of expression"))
    }
}

struct Parser<'a> {
    input: &'a str,
    offset: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        self.input.get(self.offset..).unwrap_or_default()
    }

    fn expected(&self, expected: &str) -> ConditionParseError {
        ConditionParseError::new(self.offset, expected)
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.offset += rest.len() - trimmed.len();
    }

    fn eat_char(&mut self, c: char) -> bool {
        if self.rest().starts_with(c) {
            self.offset += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        if let Some(tail) = rest.strip_prefix(keyword) {
            // The keyword must not just be the start of a longer word.
            if tail.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
                false
            } else {
                self.offset += keyword.len();
                true
            }
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expression, ConditionParseError> {
        let mut left = self.parse_and()?;

        loop {
            self.skip_whitespace();
            if self.eat_keyword("or") {
                self.skip_whitespace();
                let right = self.parse_and()?;
                left = Expression::Or(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expression, ConditionParseError> {
        let mut left = self.parse_unary()?;

        loop {
            self.skip_whitespace();
            if self.eat_keyword("and") {
                self.skip_whitespace();
                let right = self.parse_unary()?;
                left = Expression::And(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, ConditionParseError> {
        self.skip_whitespace();

        if self.eat_keyword("not") {
            self.skip_whitespace();
            return Ok(Expression::Not(Box::new(self.parse_unary()?)));
        }

        if self.eat_char('(') {
            let expression = self.parse_or()?;
            self.skip_whitespace();
            if !self.eat_char(')') {
                return Err(self.expected("a closing parenthesis"));
            }
            return Ok(expression);
        }

        self.parse_function().map(Expression::Function)
    }

    fn parse_function(&mut self) -> Result<Function, ConditionParseError> {
        let name_position = self.offset;

        let name_end = self
            .rest()
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(self.rest().len());
        let name = self.rest().get(..name_end).unwrap_or_default().to_owned();
        self.offset += name_end;

        self.skip_whitespace();
        if !self.eat_char('(') {
            return Err(self.expected("an opening parenthesis"));
        }
        self.skip_whitespace();

        let function = match name.as_str() {
            "file" => Function::FilePath(self.parse_path()?),
            "readable" => Function::Readable(self.parse_path()?),
            "active" => Function::Active(self.parse_path_string()?),
            "regex" => Function::FileRegex(self.parse_path_regex()?),
            "many" => Function::Many(self.parse_path_regex()?),
            "many_active" => Function::ManyActive(self.parse_path_regex()?),
            "is_master" => Function::IsMaster(self.parse_path_string()?),
            "checksum" => {
                let path = self.parse_path()?;
                self.parse_comma()?;
                let crc = self.parse_crc()?;
                Function::Checksum(path, crc)
            }
            "version" | "product_version" => {
                let path = self.parse_path()?;
                self.parse_comma()?;
                let version = self.parse_quoted()?;
                self.parse_comma()?;
                let comparator = self.parse_comparator()?;

                if name == "version" {
                    Function::Version(path, version, comparator)
                } else {
                    Function::ProductVersion(path, version, comparator)
                }
            }
            "filename_version" => {
                let path_regex = self.parse_path_regex()?;
                self.parse_comma()?;
                let version = self.parse_quoted()?;
                self.parse_comma()?;
                let comparator = self.parse_comparator()?;
                Function::FilenameVersion(path_regex, version, comparator)
            }
            _ => {
                return Err(ConditionParseError::new(
                    name_position,
                    "a condition function name",
                ));
            }
        };

        self.skip_whitespace();
        if !self.eat_char(')') {
            return Err(self.expected("a closing parenthesis"));
        }

        Ok(function)
    }

    fn parse_comma(&mut self) -> Result<(), ConditionParseError> {
        self.skip_whitespace();
        if !self.eat_char(',') {
            return Err(self.expected("a comma"));
        }
        self.skip_whitespace();
        Ok(())
    }

    fn parse_quoted(&mut self) -> Result<String, ConditionParseError> {
        if !self.eat_char('"') {
            return Err(self.expected("a double-quoted string"));
        }

        let Some(end) = self.rest().find('"') else {
            return Err(self.expected("a closing double quote"));
        };

        let string = self.rest().get(..end).unwrap_or_default().to_owned();
        self.offset += end + 1;

        Ok(string)
    }

    /// Parse a path argument, which is either a quoted string or a bare
    /// token running up to the next comma or closing parenthesis.
    fn parse_path_string(&mut self) -> Result<String, ConditionParseError> {
        if self.rest().starts_with('"') {
            return self.parse_quoted();
        }

        let end = self
            .rest()
            .find([',', ')'])
            .ok_or_else(|| self.expected("a path"))?;

        let path = self.rest().get(..end).unwrap_or_default().trim_end().to_owned();
        if path.is_empty() {
            return Err(self.expected("a path"));
        }
        self.offset += end;

        Ok(path)
    }

    fn parse_path(&mut self) -> Result<PathBuf, ConditionParseError> {
        let position = self.offset;
        let path = PathBuf::from(self.parse_path_string()?);

        if is_in_game_directory(&path) {
            Ok(path)
        } else {
            Err(ConditionParseError::new(
                position,
                "a relative path that stays within the game's data directory",
            ))
        }
    }

    fn parse_path_regex(&mut self) -> Result<PathRegex, ConditionParseError> {
        let position = self.offset;
        let string = self.parse_quoted()?;

        // Only the final path component may be a regex; the parent must be a
        // plain path so that evaluation only ever lists one directory. The
        // separator is '/' because '\' is regex escape syntax.
        let (parent, pattern) = match string.rsplit_once('/') {
            Some((parent, pattern)) => (PathBuf::from(parent), pattern.to_owned()),
            None => (PathBuf::new(), string.clone()),
        };

        if !is_in_game_directory(&parent) || parent_contains_regex_syntax(&parent) {
            return Err(ConditionParseError::new(
                position,
                "a regex whose parent path is literal and stays within the game's data directory",
            ));
        }

        let anchored = format!("^(?:{pattern})$");
        let regex = case_insensitive_regex(&anchored)
            .map_err(|_| ConditionParseError::new(position, "a valid regular expression"))?;

        Ok(PathRegex {
            parent,
            pattern,
            regex,
        })
    }

    fn parse_crc(&mut self) -> Result<u32, ConditionParseError> {
        let rest = self.rest();
        let rest = rest.strip_prefix("0x").unwrap_or(rest);
        let offset_adjustment = self.rest().len() - rest.len();

        let end = rest
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(rest.len());

        let digits = rest.get(..end).unwrap_or_default();
        match u32::from_str_radix(digits, 16) {
            Ok(crc) => {
                self.offset += offset_adjustment + end;
                Ok(crc)
            }
            Err(_) => Err(self.expected("a CRC-32 checksum in hexadecimal")),
        }
    }

    fn parse_comparator(&mut self) -> Result<ComparisonOperator, ConditionParseError> {
        const OPERATORS: [(&str, ComparisonOperator); 6] = [
            ("==", ComparisonOperator::Equal),
            ("!=", ComparisonOperator::NotEqual),
            ("<=", ComparisonOperator::LessThanOrEqual),
            (">=", ComparisonOperator::GreaterThanOrEqual),
            ("<", ComparisonOperator::LessThan),
            (">", ComparisonOperator::GreaterThan),
        ];

        for (token, operator) in OPERATORS {
            if self.rest().starts_with(token) {
                self.offset += token.len();
                return Ok(operator);
            }
        }

        Err(self.expected("a comparison operator"))
    }
}

/// Check that a lexically-normalized path cannot escape the directory it is
/// resolved against.
fn is_in_game_directory(path: &Path) -> bool {
    let mut depth = 0_i32;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return false,
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
        }
    }

    true
}

fn parent_contains_regex_syntax(parent: &Path) -> bool {
    parent
        .to_str()
        .is_none_or(|s| s.contains(['*', '?', '[', ']', '(', ')', '{', '}', '|', '^', '$', '+']))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_a_file_function_with_a_bare_path() {
        let expression = parse_expression("file(Blank.esp)").unwrap();

        assert_eq!(
            Expression::Function(Function::FilePath(PathBuf::from("Blank.esp"))),
            expression
        );
    }

    #[test]
    fn should_parse_a_file_function_with_a_quoted_path() {
        let expression = parse_expression("file(\"textures/some file.dds\")").unwrap();

        assert_eq!(
            Expression::Function(Function::FilePath(PathBuf::from("textures/some file.dds"))),
            expression
        );
    }

    #[test]
    fn should_error_if_a_path_escapes_the_data_directory() {
        assert!(parse_expression("file(\"../Morrowind.ini\")").is_err());
        assert!(parse_expression("file(\"textures/../../file.esp\")").is_err());
    }

    #[test]
    fn should_allow_parent_components_that_stay_inside_the_data_directory() {
        assert!(parse_expression("file(\"textures/../file.esp\")").is_ok());
    }

    #[test]
    fn should_error_if_a_path_is_absolute() {
        assert!(parse_expression("file(\"/etc/passwd\")").is_err());
    }

    #[test]
    fn should_parse_boolean_operators_with_conventional_precedence() {
        let expression =
            parse_expression("file(A.esp) or file(B.esp) and not file(C.esp)").unwrap();

        let a = Expression::Function(Function::FilePath(PathBuf::from("A.esp")));
        let b = Expression::Function(Function::FilePath(PathBuf::from("B.esp")));
        let c = Expression::Function(Function::FilePath(PathBuf::from("C.esp")));

        assert_eq!(
            Expression::Or(
                Box::new(a),
                Box::new(Expression::And(Box::new(b), Box::new(Expression::Not(Box::new(c)))))
            ),
            expression
        );
    }

    #[test]
    fn should_parse_parenthesised_expressions() {
        let expression = parse_expression("(file(A.esp) or file(B.esp)) and file(C.esp)").unwrap();

        match expression {
            Expression::And(_, _) => {}
            _ => panic!("Expected an and expression"),
        }
    }

    #[test]
    fn should_parse_a_checksum_function() {
        let expression = parse_expression("checksum(Blank.esp, DEADBEEF)").unwrap();

        assert_eq!(
            Expression::Function(Function::Checksum(
                PathBuf::from("Blank.esp"),
                0xDEAD_BEEF
            )),
            expression
        );
    }

    #[test]
    fn should_parse_a_checksum_function_with_a_0x_prefix() {
        let expression = parse_expression("checksum(\"Blank.esp\", 0x12345678)").unwrap();

        assert_eq!(
            Expression::Function(Function::Checksum(
                PathBuf::from("Blank.esp"),
                0x1234_5678
            )),
            expression
        );
    }

    #[test]
    fn should_parse_a_version_function() {
        let expression = parse_expression("version(\"Blank.esp\", \"1.2\", >=)").unwrap();

        assert_eq!(
            Expression::Function(Function::Version(
                PathBuf::from("Blank.esp"),
                "1.2".to_owned(),
                ComparisonOperator::GreaterThanOrEqual
            )),
            expression
        );
    }

    #[test]
    fn should_parse_a_regex_function_and_anchor_its_pattern() {
        let expression = parse_expression("regex(\"Blank.*\\.esp\")").unwrap();

        match expression {
            Expression::Function(Function::FileRegex(path_regex)) => {
                assert_eq!(PathBuf::new(), path_regex.parent);
                assert!(path_regex.regex.find("Blank - Different.esp").is_some());
                assert!(path_regex.regex.find("prefix Blank.esp").is_none());
            }
            _ => panic!("Expected a regex function"),
        }
    }

    #[test]
    fn should_split_a_regex_into_a_literal_parent_and_a_basename_pattern() {
        let expression = parse_expression("regex(\"meshes/blank/.*\\.nif\")").unwrap();

        match expression {
            Expression::Function(Function::FileRegex(path_regex)) => {
                assert_eq!(PathBuf::from("meshes/blank"), path_regex.parent);
                assert_eq!(".*\\.nif", path_regex.pattern);
            }
            _ => panic!("Expected a regex function"),
        }
    }

    #[test]
    fn should_error_if_a_regex_parent_contains_regex_syntax() {
        assert!(parse_expression("regex(\"mes.*hes/file\\.nif\")").is_err());
    }

    #[test]
    fn should_error_if_a_regex_is_invalid() {
        assert!(parse_expression("regex(\"[\")").is_err());
    }

    #[test]
    fn should_error_on_an_unknown_function_name() {
        let error = parse_expression("bogus(Blank.esp)").unwrap_err();

        assert_eq!(0, error.position());
    }

    #[test]
    fn should_error_on_trailing_input() {
        assert!(parse_expression("file(A.esp) file(B.esp)").is_err());
    }

    #[test]
    fn should_not_treat_a_word_starting_with_or_as_an_operator() {
        // "order.esp" must not lex as "or" + "der.esp".
        assert!(parse_expression("file(A.esp) order").is_err());
    }
}
