//! Fragment accumulation and evaluation.

use crate::convert::fragment_term;
use crate::error::{EvalError, EvalErrorKind};
use crate::expr::{Expr, Term};
use crate::resolve::Resolver;
use crate::tree::Tree;
use crate::unify::Unifier;
use indexmap::IndexMap;
use unicfg_yaml::SourceInfo;

/// Limits applied while building the document.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Maximum nesting depth of a fragment (default: 256).
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self { max_depth: 256 }
    }
}

/// Collects fragments and evaluates them into one [`Tree`].
///
/// ```rust
/// use unicfg_eval::Evaluator;
///
/// let mut evaluator = Evaluator::default();
/// evaluator.add_fragment("schema.yaml", b"port: !int").unwrap();
/// evaluator.add_fragment("values.yaml", b"port: 8080").unwrap();
/// let tree = evaluator.evaluate().unwrap();
/// assert!(tree.field(tree.root(), "port").is_some());
/// ```
#[derive(Debug, Default)]
pub struct Evaluator {
    options: EvalOptions,
    fragments: Vec<Term>,
}

impl Evaluator {
    pub fn new(options: EvalOptions) -> Self {
        Self {
            options,
            fragments: Vec::new(),
        }
    }

    /// Parse one fragment and queue it for evaluation.
    ///
    /// Every problem found in the fragment is returned; nothing is queued in
    /// that case.
    pub fn add_fragment(&mut self, name: &str, source: &[u8]) -> Result<(), Vec<EvalError>> {
        let text = std::str::from_utf8(source).map_err(|e| {
            vec![
                EvalError::new(EvalErrorKind::Syntax, "invalid UTF-8: {}", vec![e.to_string()])
                    .with_positions([&SourceInfo::default().with_file(name)]),
            ]
        })?;

        let yaml = unicfg_yaml::parse_file(text, name).map_err(|e| {
            vec![
                EvalError::new(EvalErrorKind::Syntax, "{}", vec![e.message().to_string()])
                    .with_positions(e.location()),
            ]
        })?;

        let mut errors = Vec::new();
        let term = fragment_term(yaml, self.options.max_depth, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        tracing::debug!(fragment = name, index = self.fragments.len(), "fragment added");
        self.fragments.push(term);
        Ok(())
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Unify all fragments, resolve references and freeze the result.
    ///
    /// Errors are returned in discovery order with duplicates removed.
    pub fn evaluate(self) -> Result<Tree, Vec<EvalError>> {
        let fragment_count = self.fragments.len();
        let mut errors = Vec::new();
        let mut path = Vec::new();

        let merged = self
            .fragments
            .into_iter()
            .reduce(|acc, next| {
                Unifier {
                    errors: &mut errors,
                }
                .unify(acc, next, &mut path)
            })
            .unwrap_or_else(|| Term {
                expr: Expr::Struct(IndexMap::new()),
                positions: Vec::new(),
            });

        let resolved = Resolver::new(&merged, &mut errors).resolve_root();

        let mut unique: Vec<EvalError> = Vec::with_capacity(errors.len());
        for error in errors {
            if !unique.contains(&error) {
                unique.push(error);
            }
        }

        if !unique.is_empty() {
            tracing::debug!(fragments = fragment_count, errors = unique.len(), "evaluation failed");
            return Err(unique);
        }

        let tree = Tree::from_term(resolved);
        tracing::debug!(fragments = fragment_count, nodes = tree.len(), "evaluation complete");
        Ok(tree)
    }
}
