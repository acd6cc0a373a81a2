//! Versioned encoding of configuration values.
//!
//! Version 1 stores list-valued keys as JSON. Version 0 rows may hold list
//! literals quoted with single quotes (`['find X', 'report']`), which are not
//! JSON. They are upgraded by a small literal reader that accepts only quoted
//! strings and integers; nothing is ever evaluated.

use serde_json::Value;

use super::schema::ConfigKey;
use crate::error::ConfigParseError;

/// Encoding written by this version of the code.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Encoding of rows written before list values were JSON-encoded.
pub const LEGACY_SCHEMA_VERSION: u32 = 0;

/// Rewrite `raw`, stored under `from_version`, into the current encoding.
pub fn upgrade_value(
    key: ConfigKey,
    raw: &str,
    from_version: u32,
) -> Result<String, ConfigParseError> {
    if from_version == CONFIG_SCHEMA_VERSION {
        return Ok(raw.to_string());
    }
    if from_version > CONFIG_SCHEMA_VERSION {
        return Err(ConfigParseError::new(
            key.as_str(),
            raw,
            format!(
                "written by schema version {}, newer than supported version {}",
                from_version, CONFIG_SCHEMA_VERSION
            ),
        ));
    }
    if !key.kind().is_list() || raw.trim().is_empty() {
        return Ok(raw.to_string());
    }
    if let Ok(Value::Array(_)) = serde_json::from_str::<Value>(raw) {
        return Ok(raw.to_string());
    }
    let items = parse_list_literal(raw).map_err(|reason| ConfigParseError::new(key.as_str(), raw, reason))?;
    Ok(Value::Array(items).to_string())
}

/// Read a list literal of quoted strings and integers.
pub fn parse_list_literal(raw: &str) -> Result<Vec<Value>, String> {
    let mut reader = LiteralReader {
        chars: raw.chars().collect(),
        pos: 0,
    };
    reader.skip_ws();
    reader.expect('[')?;
    let mut items = Vec::new();
    loop {
        reader.skip_ws();
        match reader.peek() {
            Some(']') => {
                reader.pos += 1;
                break;
            }
            None => return Err("unterminated list".to_string()),
            _ => {}
        }
        items.push(reader.item()?);
        reader.skip_ws();
        match reader.next() {
            Some(',') => continue,
            Some(']') => break,
            Some(c) => return Err(format!("unexpected '{}' at offset {}", c, reader.pos - 1)),
            None => return Err("unterminated list".to_string()),
        }
    }
    reader.skip_ws();
    if reader.pos != reader.chars.len() {
        return Err(format!("trailing characters after offset {}", reader.pos));
    }
    Ok(items)
}

struct LiteralReader {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralReader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: char) -> Result<(), String> {
        match self.next() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(format!("expected '{}' but found '{}'", want, c)),
            None => Err(format!("expected '{}' but input ended", want)),
        }
    }

    fn item(&mut self) -> Result<Value, String> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                self.string(quote).map(Value::String)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => self.integer(),
            Some(c) => Err(format!("unsupported list element starting with '{}'", c)),
            None => Err("unterminated list".to_string()),
        }
    }

    fn string(&mut self, quote: char) -> Result<String, String> {
        let mut out = String::new();
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err("unterminated string".to_string()),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err("unterminated string".to_string()),
            }
        }
    }

    fn integer(&mut self) -> Result<Value, String> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("invalid integer '{}': {}", text, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("['find X', 'report back']", r#"["find X","report back"]"#)]
    #[case("[\"a\", 'it\\'s']", r#"["a","it's"]"#)]
    #[case("[]", "[]")]
    #[case("  [ 'trailing', ]  ", r#"["trailing"]"#)]
    fn upgrades_legacy_text_lists(#[case] raw: &str, #[case] expected: &str) {
        let upgraded = upgrade_value(ConfigKey::Goal, raw, LEGACY_SCHEMA_VERSION).unwrap();
        assert_eq!(upgraded, expected);
    }

    #[test]
    fn upgrades_legacy_id_lists() {
        let upgraded = upgrade_value(ConfigKey::Tools, "[1, 2, -3]", LEGACY_SCHEMA_VERSION).unwrap();
        assert_eq!(upgraded, "[1,2,-3]");
    }

    #[test]
    fn json_lists_pass_through_unchanged() {
        let raw = r#"["already", "json"]"#;
        assert_eq!(upgrade_value(ConfigKey::Constraints, raw, 0).unwrap(), raw);
    }

    #[test]
    fn scalar_keys_are_not_touched() {
        assert_eq!(upgrade_value(ConfigKey::Model, "gpt-4", 0).unwrap(), "gpt-4");
    }

    #[rstest]
    #[case("not-a-list")]
    #[case("['unterminated")]
    #[case("[__import__('os')]")]
    #[case("['a'] + ['b']")]
    fn rejects_anything_but_plain_literals(#[case] raw: &str) {
        let err = upgrade_value(ConfigKey::Goal, raw, LEGACY_SCHEMA_VERSION).unwrap_err();
        assert_eq!(err.key, "goal");
        assert_eq!(err.raw_value, raw);
    }

    #[test]
    fn newer_versions_are_refused() {
        let err = upgrade_value(ConfigKey::Goal, "[]", CONFIG_SCHEMA_VERSION + 1).unwrap_err();
        assert!(err.reason.contains("newer"));
    }
}
