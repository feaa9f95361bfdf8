//! A small block-style YAML emitter for metadata documents.
//!
//! The emitter preserves the order in which keys and entries are written,
//! which is what the round-trip contract requires; it does not emit anchors
//! or aliases.

pub(crate) trait EmitYaml {
    /// Whether the value is written as a single scalar, which allows it to
    /// be placed in flow style.
    fn is_scalar(&self) -> bool {
        false
    }

    fn emit_yaml(&self, emitter: &mut YamlEmitter);
}

#[derive(Clone, Debug, Default)]
pub(crate) struct YamlEmitter {
    buffer: String,
    indent: usize,
    pending_value: bool,
    suppress_next_line_break: bool,
}

impl YamlEmitter {
    pub(crate) fn new() -> Self {
        YamlEmitter::default()
    }

    pub(crate) fn into_string(self) -> String {
        self.buffer
    }

    fn line_break(&mut self) {
        if self.suppress_next_line_break {
            self.suppress_next_line_break = false;
            return;
        }

        if !self.buffer.is_empty() {
            self.buffer.push('\n');
            for _ in 0..self.indent {
                self.buffer.push_str("  ");
            }
        }
        self.pending_value = false;
    }

    fn before_value(&mut self) {
        if self.pending_value {
            self.buffer.push(' ');
            self.pending_value = false;
        }
    }

    pub(crate) fn map_key(&mut self, key: &str) {
        self.line_break();
        self.buffer.push_str(key);
        self.buffer.push(':');
        self.pending_value = true;
    }

    pub(crate) fn unquoted_str(&mut self, value: &str) {
        self.before_value();
        self.buffer.push_str(value);
    }

    pub(crate) fn single_quoted_str(&mut self, value: &str) {
        self.before_value();
        self.buffer.push('\'');
        self.buffer.push_str(&value.replace('\'', "''"));
        self.buffer.push('\'');
    }

    pub(crate) fn u32_hex(&mut self, value: u32) {
        self.before_value();
        self.buffer.push_str(&format!("0x{value:08X}"));
    }

    pub(crate) fn unsigned(&mut self, value: u32) {
        self.before_value();
        self.buffer.push_str(&format!("{value}"));
    }

    /// Emit a sequence of values. A single scalar element is written in flow
    /// style on the current line, otherwise elements are written in block
    /// style, one per line.
    pub(crate) fn sequence<T: EmitYaml>(&mut self, items: &[T]) {
        if let [item] = items
            && item.is_scalar()
        {
            self.before_value();
            self.buffer.push('[');
            item.emit_yaml(self);
            self.buffer.push(']');
            return;
        }

        self.indent += 1;
        for item in items {
            self.line_break();
            self.buffer.push_str("- ");

            if item.is_scalar() {
                self.pending_value = false;
                item.emit_yaml(self);
            } else {
                self.indent += 1;
                self.suppress_next_line_break = true;
                item.emit_yaml(self);
                self.indent -= 1;
            }
        }
        self.indent -= 1;
    }

    /// Emit a block sequence of unquoted string scalars.
    pub(crate) fn unquoted_str_sequence(&mut self, items: &[String]) {
        self.indent += 1;
        for item in items {
            self.line_break();
            self.buffer.push_str("- ");
            self.buffer.push_str(item);
        }
        self.indent -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScalarValue(&'static str);

    impl EmitYaml for ScalarValue {
        fn is_scalar(&self) -> bool {
            true
        }

        fn emit_yaml(&self, emitter: &mut YamlEmitter) {
            emitter.single_quoted_str(self.0);
        }
    }

    struct MapValue(&'static str, &'static str);

    impl EmitYaml for MapValue {
        fn emit_yaml(&self, emitter: &mut YamlEmitter) {
            emitter.map_key("name");
            emitter.single_quoted_str(self.0);
            emitter.map_key("value");
            emitter.single_quoted_str(self.1);
        }
    }

    #[test]
    fn should_write_a_scalar_value_after_its_key() {
        let mut emitter = YamlEmitter::new();
        emitter.map_key("name");
        emitter.single_quoted_str("value");

        assert_eq!("name: 'value'", emitter.into_string());
    }

    #[test]
    fn should_double_single_quotes_when_quoting() {
        let mut emitter = YamlEmitter::new();
        emitter.single_quoted_str("it's");

        assert_eq!("'it''s'", emitter.into_string());
    }

    #[test]
    fn should_write_a_single_scalar_sequence_element_in_flow_style() {
        let mut emitter = YamlEmitter::new();
        emitter.map_key("after");
        emitter.sequence(&[ScalarValue("other.esp")]);

        assert_eq!("after: ['other.esp']", emitter.into_string());
    }

    #[test]
    fn should_write_multiple_scalar_sequence_elements_in_block_style() {
        let mut emitter = YamlEmitter::new();
        emitter.map_key("after");
        emitter.sequence(&[ScalarValue("a.esp"), ScalarValue("b.esp")]);

        assert_eq!("after:\n  - 'a.esp'\n  - 'b.esp'", emitter.into_string());
    }

    #[test]
    fn should_align_map_element_keys_under_the_sequence_dash() {
        let mut emitter = YamlEmitter::new();
        emitter.map_key("msg");
        emitter.sequence(&[MapValue("a", "1"), MapValue("b", "2")]);

        assert_eq!(
            "msg:\n  - name: 'a'\n    value: '1'\n  - name: 'b'\n    value: '2'",
            emitter.into_string()
        );
    }

    #[test]
    fn should_write_hex_values_with_a_0x_prefix_and_eight_digits() {
        let mut emitter = YamlEmitter::new();
        emitter.map_key("crc");
        emitter.u32_hex(0xBEEF);

        assert_eq!("crc: 0x0000BEEF", emitter.into_string());
    }

    #[test]
    fn should_write_unquoted_string_sequences_in_block_style() {
        let mut emitter = YamlEmitter::new();
        emitter.map_key("bash_tags");
        emitter.unquoted_str_sequence(&["Relev".to_owned(), "Delev".to_owned()]);

        assert_eq!("bash_tags:\n  - Relev\n  - Delev", emitter.into_string());
    }
}
