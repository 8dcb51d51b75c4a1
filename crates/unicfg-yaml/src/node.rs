//! Parsed YAML nodes carrying their source positions.

use crate::SourceInfo;
use yaml_rust2::Yaml;

/// One node of a parsed fragment.
///
/// Scalars hold a resolved `Yaml` leaf. Collections hold their children as
/// nodes, so every level of the tree keeps its own position.
#[derive(Debug, Clone, PartialEq)]
pub struct YamlNode {
    pub content: YamlContent,
    /// Tag written on the node, e.g. `int` for `!int`.
    pub tag: Option<String>,
    pub source_info: SourceInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum YamlContent {
    /// A leaf. Tagged scalars keep their raw text as `Yaml::String` (or
    /// `Yaml::Null` when plain and empty); the tag decides how it is read.
    /// `quoted` is set for every style except plain.
    Scalar { value: Yaml, quoted: bool },
    Sequence(Vec<YamlNode>),
    /// Entries in document order, duplicates included.
    Mapping(Vec<YamlEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct YamlEntry {
    pub key: YamlNode,
    pub value: YamlNode,
}

impl YamlNode {
    /// A plain-style scalar.
    pub fn scalar(value: Yaml, tag: Option<String>, source_info: SourceInfo) -> Self {
        Self {
            content: YamlContent::Scalar {
                value,
                quoted: false,
            },
            tag,
            source_info,
        }
    }

    pub fn quoted_scalar(value: Yaml, tag: Option<String>, source_info: SourceInfo) -> Self {
        Self {
            content: YamlContent::Scalar {
                value,
                quoted: true,
            },
            tag,
            source_info,
        }
    }

    pub fn sequence(items: Vec<YamlNode>, source_info: SourceInfo) -> Self {
        Self {
            content: YamlContent::Sequence(items),
            tag: None,
            source_info,
        }
    }

    pub fn mapping(entries: Vec<YamlEntry>, source_info: SourceInfo) -> Self {
        Self {
            content: YamlContent::Mapping(entries),
            tag: None,
            source_info,
        }
    }

    pub fn with_tag(self, tag: Option<String>) -> Self {
        Self { tag, ..self }
    }

    /// The leaf value, for scalars.
    pub fn value(&self) -> Option<&Yaml> {
        match &self.content {
            YamlContent::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Whether a scalar was written quoted or as a block.
    pub fn is_quoted(&self) -> bool {
        matches!(&self.content, YamlContent::Scalar { quoted: true, .. })
    }

    pub fn items(&self) -> Option<&[YamlNode]> {
        match &self.content {
            YamlContent::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[YamlEntry]> {
        match &self.content {
            YamlContent::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// First entry whose key is the string `key`.
    pub fn get(&self, key: &str) -> Option<&YamlNode> {
        self.entries()?
            .iter()
            .find(|entry| entry.key.value().and_then(Yaml::as_str) == Some(key))
            .map(|entry| &entry.value)
    }

    /// An untagged null scalar, which is what an empty document parses to.
    pub fn is_bare_null(&self) -> bool {
        self.tag.is_none() && matches!(self.value(), Some(Yaml::Null))
    }

    /// Short name of the node's type for messages.
    pub fn type_name(&self) -> &'static str {
        match &self.content {
            YamlContent::Sequence(_) => "list",
            YamlContent::Mapping(_) => "mapping",
            YamlContent::Scalar { value, .. } => match value {
                Yaml::Real(_) => "float",
                Yaml::Integer(_) => "int",
                Yaml::String(_) => "string",
                Yaml::Boolean(_) => "bool",
                Yaml::Null => "null",
                _ => "invalid value",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> YamlNode {
        YamlNode::scalar(Yaml::String(s.into()), None, SourceInfo::default())
    }

    #[test]
    fn test_scalar_accessors() {
        let node = YamlNode::scalar(Yaml::Null, Some("int".into()), SourceInfo::default());
        assert_eq!(node.tag(), Some("int"));
        assert_eq!(node.value(), Some(&Yaml::Null));
        assert!(!node.is_bare_null());
        assert!(node.items().is_none());
        assert_eq!(node.type_name(), "null");
        assert!(!node.is_quoted());
    }

    #[test]
    fn test_collections_carry_tags() {
        let node = YamlNode::sequence(vec![text("x")], SourceInfo::default())
            .with_tag(Some("wat".into()));
        assert_eq!(node.tag(), Some("wat"));
        assert_eq!(node.items().map(<[_]>::len), Some(1));
        assert!(!node.is_bare_null());

        let empty = Yaml::String(String::new());
        let quoted = YamlNode::quoted_scalar(empty, None, SourceInfo::default());
        assert!(quoted.is_quoted());
        assert_eq!(quoted.type_name(), "string");
    }

    #[test]
    fn test_get_first_wins() {
        let node = YamlNode::mapping(
            vec![
                YamlEntry {
                    key: text("k"),
                    value: text("first"),
                },
                YamlEntry {
                    key: text("k"),
                    value: text("second"),
                },
            ],
            SourceInfo::default(),
        );
        assert_eq!(node.entries().map(<[_]>::len), Some(2));
        assert_eq!(node.get("k").and_then(YamlNode::value), Some(&Yaml::String("first".into())));
        assert!(node.get("missing").is_none());
        assert_eq!(node.type_name(), "mapping");
    }
}
