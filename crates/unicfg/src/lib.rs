//! Polymorphic configuration values over merged YAML fragments.
//!
//! A [`Loader`] evaluates any number of YAML fragments into one document:
//! mappings merge, conflicting scalars are reported with every position that
//! contributed, and tags such as `!int` or `!ref` constrain and link values.
//! The result is a [`Value`] that can be inspected, iterated, or decoded into
//! caller types.
//!
//! ```
//! use indexmap::IndexMap;
//! use std::path::Path;
//! use unicfg::{ConfigLoader, Loader};
//!
//! let mut loader = Loader::new();
//! loader.preload("schema.yaml", b"server:\n  port: !int\n  host: !default localhost\n");
//!
//! let mut files = IndexMap::new();
//! files.insert("app.yaml".to_string(), b"server:\n  port: 8080\n".to_vec());
//!
//! let root = loader.load(Path::new("/etc/app"), &files)?;
//! let (server, found) = root.lookup(["server"]);
//! assert!(found);
//! assert_eq!(server.lookup(["port"]).0.i64()?, 8080);
//! assert_eq!(server.lookup(["host"]).0.string()?, "localhost");
//! # Ok::<(), unicfg::ConfigError>(())
//! ```

pub mod decode;
mod error;
mod iter;
mod loader;
mod marshal;
mod value;

pub use decode::{
    ConfigDecoder, ContextDecoder, DecodeContext, DecodeTarget, Decoder, ScalarTarget, Structural,
};
pub use error::{ConfigError, MultiError, aggregate};
pub use iter::Iter;
pub use loader::{ConfigLoader, LoadOptions, Loader, NAME};
pub use value::{Interface, Kind, Selector, Value};

pub use unicfg_eval::{EvalError, EvalErrorKind};
