//! Event-driven construction of [`YamlNode`] trees.

use crate::{Error, Result, SourceInfo, YamlEntry, YamlNode};
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};
use yaml_rust2::Yaml;

/// Parse YAML from a string.
///
/// Only the first document of a multi-document stream is read. An empty or
/// comment-only stream yields a `Yaml::Null` scalar at 1:1.
///
/// # Example
///
/// ```rust
/// use unicfg_yaml::parse;
///
/// let yaml = parse("title: My Document").unwrap();
/// assert!(yaml.entries().is_some());
/// ```
///
/// # Errors
///
/// Returns an error if the YAML is invalid or uses aliases.
pub fn parse(content: &str) -> Result<YamlNode> {
    parse_impl(content, None)
}

/// Parse YAML from a string with an associated filename.
///
/// The filename is recorded in every node's [`SourceInfo`].
///
/// # Example
///
/// ```rust
/// use unicfg_yaml::parse_file;
///
/// let yaml = parse_file("title: My Document", "config.yaml").unwrap();
/// assert_eq!(yaml.source_info.file, Some("config.yaml".into()));
/// ```
pub fn parse_file(content: &str, filename: &str) -> Result<YamlNode> {
    parse_impl(content, Some(filename))
}

fn parse_impl(content: &str, filename: Option<&str>) -> Result<YamlNode> {
    let mut parser = Parser::new_from_str(content);
    let mut builder = YamlBuilder::new(filename);

    parser
        .load(&mut builder, false) // false = single document only
        .map_err(|e| Error::from(e).with_file(filename))?;

    builder.result()
}

/// Receives parser events and assembles nodes bottom-up.
struct YamlBuilder {
    filename: Option<String>,

    /// Stack of collections being constructed
    stack: Vec<BuildNode>,

    root: Option<YamlNode>,

    /// First structural problem seen; `on_event` cannot return errors.
    error: Option<Error>,
}

enum BuildNode {
    Sequence {
        start_marker: Marker,
        tag: Option<String>,
        items: Vec<YamlNode>,
    },

    Mapping {
        start_marker: Marker,
        tag: Option<String>,
        entries: Vec<(YamlNode, Option<YamlNode>)>,
    },
}

impl YamlBuilder {
    fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(|s| s.to_string()),
            stack: Vec::new(),
            root: None,
            error: None,
        }
    }

    fn result(self) -> Result<YamlNode> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if !self.stack.is_empty() {
            return Err(self.structure_error("unterminated collection", None));
        }
        match self.root {
            Some(root) => Ok(root),
            None => Ok(YamlNode::scalar(
                Yaml::Null,
                None,
                self.with_filename(SourceInfo::default()),
            )),
        }
    }

    fn structure_error(&self, message: &str, marker: Option<&Marker>) -> Error {
        Error::InvalidStructure {
            message: message.to_string(),
            location: marker.map(|m| self.make_source_info(m, 0)),
        }
    }

    fn fail(&mut self, message: &str, marker: &Marker) {
        if self.error.is_none() {
            self.error = Some(self.structure_error(message, Some(marker)));
        }
    }

    fn push_complete(&mut self, node: YamlNode) {
        match self.stack.last_mut() {
            None => self.root = Some(node),
            Some(BuildNode::Sequence { items, .. }) => items.push(node),
            Some(BuildNode::Mapping { entries, .. }) => match entries.last_mut() {
                Some((_, value @ None)) => *value = Some(node),
                _ => entries.push((node, None)),
            },
        }
    }

    fn with_filename(&self, info: SourceInfo) -> SourceInfo {
        match &self.filename {
            Some(filename) => info.with_file(filename.clone()),
            None => info,
        }
    }

    fn make_source_info(&self, marker: &Marker, len: usize) -> SourceInfo {
        self.with_filename(SourceInfo::from_marker(marker, len))
    }

    fn finish_sequence(&mut self, marker: Marker) {
        let Some(BuildNode::Sequence {
            start_marker,
            tag,
            items,
        }) = self.stack.pop()
        else {
            self.fail("sequence end without matching start", &marker);
            return;
        };
        let len = marker.index().saturating_sub(start_marker.index());
        let source_info = self.make_source_info(&start_marker, len);
        self.push_complete(YamlNode::sequence(items, source_info).with_tag(tag));
    }

    fn finish_mapping(&mut self, marker: Marker) {
        let Some(BuildNode::Mapping {
            start_marker,
            tag,
            entries,
        }) = self.stack.pop()
        else {
            self.fail("mapping end without matching start", &marker);
            return;
        };
        let len = marker.index().saturating_sub(start_marker.index());
        let source_info = self.make_source_info(&start_marker, len);

        let mut complete = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let Some(value) = value else {
                self.fail("mapping key without value", &marker);
                return;
            };
            complete.push(YamlEntry { key, value });
        }
        self.push_complete(YamlNode::mapping(complete, source_info).with_tag(tag));
    }
}

impl MarkedEventReceiver for YamlBuilder {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        if self.error.is_some() {
            return;
        }
        match ev {
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {}

            Event::Scalar(value, style, _anchor_id, tag) => {
                let source_info = self.make_source_info(&marker, value.len());
                let tag = tag.as_ref().map(tag_name);
                let node = match (style, tag) {
                    (TScalarStyle::Plain, Some(tag)) if value.is_empty() => {
                        YamlNode::scalar(Yaml::Null, Some(tag), source_info)
                    }
                    (TScalarStyle::Plain, Some(tag)) => {
                        YamlNode::scalar(Yaml::String(value), Some(tag), source_info)
                    }
                    (TScalarStyle::Plain, None) => {
                        YamlNode::scalar(infer_scalar(&value), None, source_info)
                    }
                    (_, tag) => YamlNode::quoted_scalar(Yaml::String(value), tag, source_info),
                };
                self.push_complete(node);
            }

            Event::SequenceStart(_anchor_id, tag) => {
                self.stack.push(BuildNode::Sequence {
                    start_marker: marker,
                    tag: tag.as_ref().map(tag_name),
                    items: Vec::new(),
                });
            }

            Event::SequenceEnd => self.finish_sequence(marker),

            Event::MappingStart(_anchor_id, tag) => {
                self.stack.push(BuildNode::Mapping {
                    start_marker: marker,
                    tag: tag.as_ref().map(tag_name),
                    entries: Vec::new(),
                });
            }

            Event::MappingEnd => self.finish_mapping(marker),

            Event::Alias(_anchor_id) => self.fail("aliases are not supported", &marker),
        }
    }
}

/// Local tags (`!int`) keep only their suffix; anything else keeps the full
/// handle so the evaluator can reject it by name.
fn tag_name(tag: &Tag) -> String {
    if tag.handle == "!" {
        tag.suffix.clone()
    } else {
        format!("{}{}", tag.handle, tag.suffix)
    }
}

/// Resolve a plain scalar into the appropriate Yaml type.
///
/// Integers, floats, booleans and null are recognised; everything else is a
/// string. Floats must contain a digit, so `inf` and `nan` stay strings.
pub fn infer_scalar(value: &str) -> Yaml {
    if let Ok(i) = value.parse::<i64>() {
        return Yaml::Integer(i);
    }

    if value.contains(|c: char| c.is_ascii_digit()) && value.parse::<f64>().is_ok() {
        return Yaml::Real(value.to_string());
    }

    match value {
        "true" | "True" | "TRUE" | "yes" | "Yes" | "YES" | "on" | "On" | "ON" => {
            return Yaml::Boolean(true);
        }
        "false" | "False" | "FALSE" | "no" | "No" | "NO" | "off" | "Off" | "OFF" => {
            return Yaml::Boolean(false);
        }
        "null" | "Null" | "NULL" | "~" | "" => {
            return Yaml::Null;
        }
        _ => {}
    }

    Yaml::String(value.to_string())
}
