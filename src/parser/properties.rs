use serde_json::{Map as JsonMap, Value};

use super::FormatParser;
use crate::document::ParsedConfig;
use crate::error::{ConfigError, Result};
use crate::format::FormatIdentifier;

/// Java-style `.properties` files.
///
/// Keys stay flat (`server.port` is one key) and values stay strings; the
/// document's dotted-path lookup and typed accessors cover both.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertiesParser;

impl FormatParser for PropertiesParser {
    fn format(&self) -> FormatIdentifier {
        FormatIdentifier::PROPERTIES
    }

    fn parse(&self, text: &str) -> Result<ParsedConfig> {
        let mut root = JsonMap::new();
        let mut warnings = Vec::new();

        for (line_no, logical) in logical_lines(text) {
            let (raw_key, raw_value) = split_entry(&logical);
            let key = unescape(raw_key).map_err(|reason| {
                ConfigError::malformed(self.format(), format!("line {line_no}: {reason}"))
            })?;
            let value = unescape(raw_value).map_err(|reason| {
                ConfigError::malformed(self.format(), format!("line {line_no}: {reason}"))
            })?;
            if key.is_empty() {
                warnings.push(format!("line {line_no}: entry without a key ignored"));
                continue;
            }
            if root.insert(key.clone(), Value::String(value)).is_some() {
                warnings.push(format!("line {line_no}: duplicate key `{key}` overrides earlier value"));
            }
        }

        Ok(ParsedConfig::new(self.format(), root, text).with_warnings(warnings))
    }
}

/// Joins continuation lines and drops blanks and comments. Yields the
/// 1-based number of the line each entry starts on.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        let (start, mut buf) = match current.take() {
            Some(pending) => pending,
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                (idx + 1, String::new())
            }
        };
        buf.push_str(trimmed);
        if ends_with_continuation(&buf) {
            buf.pop();
            current = Some((start, buf));
        } else {
            out.push((start, buf));
        }
    }

    if let Some(pending) = current {
        out.push(pending);
    }
    out
}

/// A line continues when it ends in an odd number of backslashes.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Splits at the first unescaped `=`, `:` or whitespace run.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..idx], line[idx + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[idx..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .map(str::trim_start)
                    .unwrap_or(rest);
                return (&line[..idx], rest);
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let unit = read_code_unit(&mut chars)?;
                // Characters outside the BMP arrive as a surrogate pair of escapes.
                let units = if (0xD800..0xDC00).contains(&unit) {
                    let low = match (chars.next(), chars.next()) {
                        (Some('\\'), Some('u')) => read_code_unit(&mut chars)?,
                        _ => return Err(format!("unpaired surrogate `\\u{unit:04X}`")),
                    };
                    vec![unit, low]
                } else {
                    vec![unit]
                };
                for decoded in char::decode_utf16(units.iter().copied()) {
                    let ch = decoded.map_err(|err| {
                        format!("unpaired surrogate `\\u{:04X}`", err.unpaired_surrogate())
                    })?;
                    out.push(ch);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn read_code_unit(chars: &mut std::str::Chars<'_>) -> Result<u16, String> {
    let hex: String = chars.by_ref().take(4).collect();
    u16::from_str_radix(&hex, 16)
        .ok()
        .filter(|_| hex.len() == 4)
        .ok_or_else(|| format!("invalid unicode escape `\\u{hex}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_separators_and_comments() {
        let text = "# comment\n! also comment\nserver.port=8080\nname : edge\npath  /srv/app\n\nflag\n";
        let config = PropertiesParser.parse(text).unwrap();
        assert_eq!(config.get_i64("server.port"), Some(8080));
        assert_eq!(config.get_str("name"), Some("edge"));
        assert_eq!(config.get_str("path"), Some("/srv/app"));
        assert_eq!(config.get_str("flag"), Some(""));
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn joins_continuation_lines() {
        let text = "fruits = apple, \\\n    banana, \\\n    cherry\nnext = 1\n";
        let config = PropertiesParser.parse(text).unwrap();
        assert_eq!(config.get_str("fruits"), Some("apple, banana, cherry"));
        assert_eq!(config.get_str("next"), Some("1"));
    }

    #[test]
    fn decodes_escapes() {
        let text = "greeting = caf\\u00e9\\tbar\nkey\\ with\\=sep = v\nliteral = c:\\\\temp\n";
        let config = PropertiesParser.parse(text).unwrap();
        assert_eq!(config.get_str("greeting"), Some("café\tbar"));
        assert_eq!(config.get_str("key with=sep"), Some("v"));
        assert_eq!(config.get_str("literal"), Some("c:\\temp"));
    }

    #[test]
    fn duplicate_keys_warn_and_keep_last() {
        let config = PropertiesParser.parse("a=1\nb=2\na=3\n").unwrap();
        assert_eq!(config.get_str("a"), Some("3"));
        assert_eq!(config.warnings().len(), 1);
        assert!(config.warnings()[0].contains("line 3"));
    }

    #[test]
    fn bad_unicode_escape_is_malformed() {
        let err = PropertiesParser.parse("ok=1\nbad=\\u12G4\n").unwrap_err();
        match err {
            ConfigError::MalformedDocument { reason, .. } => assert!(reason.starts_with("line 2")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn joins_surrogate_pairs_outside_the_bmp() {
        let config = PropertiesParser.parse("smile = \\uD83D\\uDE00!\n").unwrap();
        assert_eq!(config.get_str("smile"), Some("\u{1F600}!"));
    }

    #[test]
    fn unpaired_surrogates_are_malformed() {
        for text in ["a=\\uD83D\n", "a=\\uD83Dx\n", "a=\\uD83D\\u0041\n", "a=\\uDE00\n"] {
            match PropertiesParser.parse(text).unwrap_err() {
                ConfigError::MalformedDocument { reason, .. } => {
                    assert!(reason.contains("surrogate"), "{text:?}: {reason}")
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    fn escape_key(key: &str) -> String {
        let mut out = String::new();
        for c in key.chars() {
            if matches!(c, '\\' | '=' | ':' | ' ' | '#' | '!') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn escape_value(value: &str) -> String {
        let mut out = String::new();
        for (idx, c) in value.chars().enumerate() {
            if !c.is_ascii() {
                for unit in c.encode_utf16(&mut [0; 2]) {
                    out.push_str(&format!("\\u{unit:04X}"));
                }
                continue;
            }
            if c == '\\' || (idx == 0 && c == ' ') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    proptest! {
        #[test]
        fn serialized_entries_parse_back(
            entries in prop::collection::btree_map("[a-z][a-z0-9_.]{0,8}", "[ -~é😀]{0,12}", 0..8)
        ) {
            let text: String = entries
                .iter()
                .map(|(k, v)| format!("{}={}\n", escape_key(k), escape_value(v)))
                .collect();
            let config = PropertiesParser.parse(&text).unwrap();
            prop_assert_eq!(config.root().len(), entries.len());
            for (key, value) in &entries {
                prop_assert_eq!(config.root().get(key), Some(&Value::String(value.clone())));
            }
        }
    }
}
