//! Structured evaluation errors.

use std::fmt;
use unicfg_yaml::SourceInfo;

/// What went wrong while building or evaluating the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// The fragment is not well-formed YAML or has an unusable shape.
    Syntax,
    /// A tag is unknown or its text cannot be read as the tagged type.
    InvalidTag,
    /// Two concrete values of the same type disagree.
    Conflict,
    /// Two values (or a value and a constraint) have incompatible types.
    MismatchedTypes,
    /// Two lists of different length were unified.
    ListLength,
    /// A `!ref` points at a path that does not exist.
    UnresolvedReference,
    /// A `!ref` chain leads back to itself.
    CyclicReference,
    /// The fragment nests deeper than the configured limit.
    NestingTooDeep,
}

/// One evaluation error.
///
/// The message is kept as a template plus arguments so callers can match on
/// the template while the rendered form stays readable. Every `{}` in the
/// template is replaced, in order, by the next argument.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    kind: EvalErrorKind,
    template: &'static str,
    args: Vec<String>,
    path: Vec<String>,
    positions: Vec<SourceInfo>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, template: &'static str, args: Vec<String>) -> Self {
        Self {
            kind,
            template,
            args,
            path: Vec::new(),
            positions: Vec::new(),
        }
    }

    pub fn at_path(mut self, path: &[String]) -> Self {
        self.path = path.to_vec();
        self
    }

    pub fn with_positions<'a>(
        mut self,
        positions: impl IntoIterator<Item = &'a SourceInfo>,
    ) -> Self {
        for position in positions {
            if !self.positions.contains(position) {
                self.positions.push(position.clone());
            }
        }
        self
    }

    pub fn kind(&self) -> EvalErrorKind {
        self.kind
    }

    /// The message template and its arguments.
    pub fn msg(&self) -> (&'static str, &[String]) {
        (self.template, &self.args)
    }

    /// The message with its arguments interpolated.
    pub fn message(&self) -> String {
        interpolate(self.template, &self.args)
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Every source position that contributed to the error.
    pub fn positions(&self) -> &[SourceInfo] {
        &self.positions
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message())
        } else {
            write!(f, "{}: {}", self.path.join("."), self.message())
        }
    }
}

impl std::error::Error for EvalError {}

fn interpolate(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(at) = rest.find("{}") {
        out.push_str(&rest[..at]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("{}"),
        }
        rest = &rest[at + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate() {
        let args = vec!["1".to_string(), "2".to_string()];
        assert_eq!(
            interpolate("conflicting values {} and {}", &args),
            "conflicting values 1 and 2"
        );
        assert_eq!(interpolate("no args", &[]), "no args");
        assert_eq!(interpolate("missing {}", &[]), "missing {}");
    }

    #[test]
    fn test_display_with_path() {
        let err = EvalError::new(
            EvalErrorKind::Conflict,
            "conflicting values {} and {}",
            vec!["1".into(), "2".into()],
        )
        .at_path(&["server".into(), "port".into()]);
        assert_eq!(err.to_string(), "server.port: conflicting values 1 and 2");
        assert_eq!(err.msg().0, "conflicting values {} and {}");
    }

    #[test]
    fn test_positions_deduplicated() {
        let a = SourceInfo::new(Some("a.yaml".into()), 0, 1, 1, 0);
        let err = EvalError::new(EvalErrorKind::Conflict, "x", vec![]).with_positions([&a, &a]);
        assert_eq!(err.positions().len(), 1);
    }
}
