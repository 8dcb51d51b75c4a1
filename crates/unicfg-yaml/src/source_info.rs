//! Where a node came from.

use serde::{Deserialize, Serialize};
use std::fmt;
use yaml_rust2::scanner::Marker;

/// Start of a node inside a named fragment.
///
/// Lines and columns are 1-based; columns count characters. Positions
/// outlive parsing: unified values keep the positions of every fragment that
/// contributed to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file: Option<String>,
    /// Character offset of the node's first character.
    pub offset: usize,
    pub line: usize,
    pub col: usize,
    /// Length of the node's source text; 0 when unknown.
    pub len: usize,
}

impl SourceInfo {
    pub fn new(file: Option<String>, offset: usize, line: usize, col: usize, len: usize) -> Self {
        Self {
            file,
            offset,
            line,
            col,
            len,
        }
    }

    /// Convert a scanner marker. Marker lines already start at 1; columns
    /// start at 0.
    pub fn from_marker(marker: &Marker, len: usize) -> Self {
        Self::new(None, marker.index(), marker.line(), marker.col() + 1, len)
    }

    pub fn with_file(self, file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            ..self
        }
    }
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self::new(None, 0, 1, 1, 0)
    }
}

/// `file:line:col`, or `line:col` for anonymous input.
impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file)?;
        }
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let named = SourceInfo::new(Some("base.yaml".into()), 10, 2, 5, 8);
        assert_eq!(named.to_string(), "base.yaml:2:5");
        assert_eq!(SourceInfo::new(None, 0, 3, 1, 0).to_string(), "3:1");
    }

    #[test]
    fn test_default_is_start_of_input() {
        let start = SourceInfo::default();
        assert_eq!((start.line, start.col, start.offset), (1, 1, 0));
        assert_eq!(start.file, None);
        assert_eq!(start.with_file("x.yaml").to_string(), "x.yaml:1:1");
    }
}
