//! Evaluation of YAML configuration fragments.
//!
//! Fragments are parsed with `unicfg-yaml`, converted into terms, unified in
//! the order they were added, and frozen into a [`Tree`]. Scalar tags turn a
//! fragment into a small constraint language:
//!
//! ```yaml
//! server:
//!   port: !int            # must become an int somewhere
//!   host: !default local  # used unless another fragment sets a string
//!   backup: !ref hosts.0  # copy of another path, resolved after merging
//! ```
//!
//! Every conflict is collected as an [`EvalError`] carrying the dotted field
//! path and the positions of all values involved; evaluation never stops at
//! the first problem.

mod convert;
mod error;
mod evaluator;
mod expr;
mod resolve;
mod tree;
mod unify;

pub use error::{EvalError, EvalErrorKind};
pub use evaluator::{EvalOptions, Evaluator};
pub use expr::BasicType;
pub use tree::{Node, NodeId, NodeValue, Tree};
pub use unicfg_yaml::SourceInfo;
