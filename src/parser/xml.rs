use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use serde_json::{Map as JsonMap, Value};

use super::FormatParser;
use crate::document::ParsedConfig;
use crate::error::{ConfigError, Result};
use crate::format::FormatIdentifier;

const ATTRIBUTE_PREFIX: &str = "@";
const TEXT_KEY: &str = "#text";

/// XML documents mapped onto key paths.
///
/// The root element is the container and its children become top-level keys.
/// Attributes appear as `@name`, repeated siblings collapse into a list and
/// element text stays a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

struct Frame {
    name: String,
    entries: JsonMap<String, Value>,
    text: String,
    has_children: bool,
}

impl FormatParser for XmlParser {
    fn format(&self) -> FormatIdentifier {
        FormatIdentifier::XML
    }

    fn parse(&self, text: &str) -> Result<ParsedConfig> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Option<JsonMap<String, Value>> = None;
        let mut warnings = Vec::new();

        loop {
            let event = reader.read_event().map_err(|err| {
                self.malformed(format!("{err} at byte {}", reader.buffer_position()))
            })?;
            match event {
                Event::Start(start) => {
                    let frame = self.open(&start, &stack, root.is_some())?;
                    stack.push(frame);
                }
                Event::Empty(start) => {
                    let frame = self.open(&start, &stack, root.is_some())?;
                    self.close(frame, &mut stack, &mut root, &mut warnings);
                }
                Event::End(_) => {
                    let frame = stack
                        .pop()
                        .ok_or_else(|| self.malformed("closing tag without matching opening tag"))?;
                    self.close(frame, &mut stack, &mut root, &mut warnings);
                }
                Event::Text(content) => {
                    let content = content
                        .unescape()
                        .map_err(|err| self.malformed(err.to_string()))?;
                    self.push_text(&mut stack, &content)?;
                }
                Event::CData(content) => {
                    let raw = content.into_inner();
                    let content = std::str::from_utf8(&raw)
                        .map_err(|err| self.malformed(format!("CDATA is not UTF-8: {err}")))?;
                    self.push_text(&mut stack, content)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(self.malformed(format!("unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| self.malformed("missing root element"))?;
        Ok(ParsedConfig::new(self.format(), root, text).with_warnings(warnings))
    }
}

impl XmlParser {
    fn malformed(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::malformed(self.format(), reason)
    }

    fn open(&self, start: &BytesStart<'_>, stack: &[Frame], root_seen: bool) -> Result<Frame> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|err| self.malformed(format!("element name is not UTF-8: {err}")))?
            .to_string();
        if stack.is_empty() && root_seen {
            return Err(self.malformed(format!("second root element <{name}>")));
        }

        let mut entries = JsonMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| self.malformed(format!("<{name}>: {err}")))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|err| self.malformed(format!("attribute name is not UTF-8: {err}")))?;
            let value = attr
                .unescape_value()
                .map_err(|err| self.malformed(format!("<{name} {key}>: {err}")))?;
            entries.insert(
                format!("{ATTRIBUTE_PREFIX}{key}"),
                Value::String(value.into_owned()),
            );
        }

        Ok(Frame {
            name,
            entries,
            text: String::new(),
            has_children: false,
        })
    }

    fn push_text(&self, stack: &mut [Frame], content: &str) -> Result<()> {
        match stack.last_mut() {
            Some(frame) => {
                frame.text.push_str(content);
                Ok(())
            }
            None if content.trim().is_empty() => Ok(()),
            None => Err(self.malformed("text outside the root element")),
        }
    }

    fn close(
        &self,
        frame: Frame,
        stack: &mut [Frame],
        root: &mut Option<JsonMap<String, Value>>,
        warnings: &mut Vec<String>,
    ) {
        let Some(parent) = stack.last_mut() else {
            if !frame.text.trim().is_empty() {
                warnings.push(format!("text of root element <{}> ignored", frame.name));
            }
            *root = Some(frame.entries);
            return;
        };

        parent.has_children = true;
        let name = frame.name.clone();
        let value = finish(frame, warnings);
        match parent.entries.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                parent.entries.insert(name, value);
            }
        }
    }
}

fn finish(frame: Frame, warnings: &mut Vec<String>) -> Value {
    let Frame {
        name,
        mut entries,
        text,
        has_children,
    } = frame;

    if entries.is_empty() {
        return Value::String(text);
    }
    if !text.trim().is_empty() {
        if has_children {
            warnings.push(format!("text mixed with child elements in <{name}> ignored"));
        } else {
            entries.insert(TEXT_KEY.to_string(), Value::String(text));
        }
    }
    Value::Object(entries)
}
