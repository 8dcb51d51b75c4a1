//! # unicfg-yaml
//!
//! YAML parsing with source location tracking.
//!
//! [`parse_file`] turns a fragment into a [`YamlNode`] tree where every node
//! knows its position, and scalars keep the tag written on them (`!int`,
//! `!ref`, ...). The evaluator in `unicfg-eval` reads tags to
//! build constraints and uses the positions when it reports conflicts.
//!
//! ## Example
//!
//! ```rust
//! use unicfg_yaml::parse_file;
//!
//! let yaml = parse_file("port: 8080", "app.yaml").unwrap();
//! let port = yaml.get("port").unwrap();
//! assert_eq!(port.source_info.to_string(), "app.yaml:1:7");
//! ```

mod error;
mod node;
mod parser;
mod source_info;

pub use error::{Error, Result};
pub use node::{YamlContent, YamlEntry, YamlNode};
pub use parser::{infer_scalar, parse, parse_file};
pub use source_info::SourceInfo;
