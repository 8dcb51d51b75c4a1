//! Conversion from source-tracked YAML to unification terms.
//!
//! Scalar tags are read here:
//!
//! - `!bool`, `!int`, `!float`, `!number`, `!string`, `!bytes`, `!any`:
//!   a bare tag is a type constraint, a tag with text is a literal of that type
//!   (`!bytes` text is base64)
//! - `!ref a.b.0`: a reference to an absolute path
//! - `!default 8080`: a weak value that a concrete value of the same type overrides

use crate::error::{EvalError, EvalErrorKind};
use crate::expr::{BasicType, Expr, Term};
use base64::Engine as _;
use indexmap::IndexMap;
use indexmap::map::Entry;
use unicfg_yaml::{SourceInfo, YamlContent, YamlNode, infer_scalar};
use yaml_rust2::Yaml;

/// Convert one parsed fragment into its root term.
///
/// The root must be a mapping; an empty fragment is an empty struct. Problems
/// are appended to `errors` and the offending node becomes bottom, so every
/// problem in the fragment is reported at once.
pub(crate) fn fragment_term(
    yaml: YamlNode,
    max_depth: usize,
    errors: &mut Vec<EvalError>,
) -> Term {
    if yaml.is_bare_null() {
        return Term::empty_struct(yaml.source_info);
    }
    if yaml.entries().is_none() {
        errors.push(
            EvalError::new(
                EvalErrorKind::Syntax,
                "fragment root must be a mapping, found {}",
                vec![yaml.type_name().to_string()],
            )
            .with_positions([&yaml.source_info]),
        );
        return Term::bottom(vec![yaml.source_info]);
    }
    let mut converter = Converter { max_depth, errors };
    converter.convert(yaml, &mut Vec::new(), 0)
}

struct Converter<'a> {
    max_depth: usize,
    errors: &'a mut Vec<EvalError>,
}

impl Converter<'_> {
    fn fail(
        &mut self,
        kind: EvalErrorKind,
        template: &'static str,
        args: Vec<String>,
        path: &[String],
        position: SourceInfo,
    ) -> Term {
        self.errors.push(
            EvalError::new(kind, template, args)
                .at_path(path)
                .with_positions([&position]),
        );
        Term::bottom(vec![position])
    }

    fn convert(&mut self, yaml: YamlNode, path: &mut Vec<String>, depth: usize) -> Term {
        let YamlNode {
            content,
            tag,
            source_info: position,
        } = yaml;

        if depth > self.max_depth {
            return self.fail(
                EvalErrorKind::NestingTooDeep,
                "nesting exceeds maximum depth of {}",
                vec![self.max_depth.to_string()],
                path,
                position,
            );
        }

        match (content, tag) {
            (YamlContent::Scalar { value, quoted }, Some(tag)) => {
                self.tagged_scalar(&tag, value, quoted, path, position)
            }
            (YamlContent::Scalar { value, .. }, None) => self.plain_scalar(value, path, position),
            (YamlContent::Sequence(_) | YamlContent::Mapping(_), Some(tag)) => self.fail(
                EvalErrorKind::InvalidTag,
                "unknown tag !{}",
                vec![tag],
                path,
                position,
            ),
            (YamlContent::Sequence(items), None) => {
                let terms = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        path.push(index.to_string());
                        let term = self.convert(item, path, depth + 1);
                        path.pop();
                        term
                    })
                    .collect();
                Term::new(Expr::List(terms), position)
            }
            (YamlContent::Mapping(entries), None) => {
                let mut fields: IndexMap<String, Term> = IndexMap::new();
                for entry in entries {
                    let Some(label) = key_label(&entry.key) else {
                        self.fail(
                            EvalErrorKind::Syntax,
                            "unsupported mapping key {}",
                            vec![entry.key.type_name().to_string()],
                            path,
                            entry.key.source_info,
                        );
                        continue;
                    };
                    path.push(label.clone());
                    let term = self.convert(entry.value, path, depth + 1);
                    path.pop();
                    match fields.entry(label) {
                        Entry::Vacant(slot) => {
                            slot.insert(term);
                        }
                        Entry::Occupied(mut slot) => {
                            // Repeated keys unify like values from separate fragments.
                            let previous = slot.get().clone();
                            let mut positions = previous.positions.clone();
                            positions.extend(term.positions.iter().cloned());
                            slot.insert(Term {
                                expr: Expr::Conj(vec![previous, term]),
                                positions,
                            });
                        }
                    }
                }
                Term::new(Expr::Struct(fields), position)
            }
        }
    }

    fn plain_scalar(&mut self, value: Yaml, path: &[String], position: SourceInfo) -> Term {
        let expr = match value {
            Yaml::Null => Expr::Null,
            Yaml::Boolean(b) => Expr::Bool(b),
            Yaml::Integer(i) => Expr::Int(i),
            Yaml::String(s) => Expr::String(s),
            Yaml::Real(text) => match text.parse::<f64>() {
                Ok(f) => Expr::Float(f),
                Err(_) => {
                    return self.fail(
                        EvalErrorKind::Syntax,
                        "invalid float literal {}",
                        vec![text],
                        path,
                        position,
                    );
                }
            },
            other => {
                return self.fail(
                    EvalErrorKind::Syntax,
                    "unsupported scalar {}",
                    vec![yaml_type_name(&other).to_string()],
                    path,
                    position,
                );
            }
        };
        Term::new(expr, position)
    }

    fn tagged_scalar(
        &mut self,
        tag: &str,
        value: Yaml,
        quoted: bool,
        path: &[String],
        position: SourceInfo,
    ) -> Term {
        let raw = value.as_str().map(str::to_string);
        match tag {
            "ref" => match raw {
                Some(text) if !text.split('.').any(str::is_empty) => Term::new(
                    Expr::Ref(text.split('.').map(str::to_string).collect()),
                    position,
                ),
                Some(text) => self.fail(
                    EvalErrorKind::InvalidTag,
                    "invalid reference {}",
                    vec![format!("{:?}", text)],
                    path,
                    position,
                ),
                None => self.fail(
                    EvalErrorKind::InvalidTag,
                    "!{} requires a value",
                    vec![tag.to_string()],
                    path,
                    position,
                ),
            },
            "default" => match raw {
                Some(text) => {
                    let value = if quoted {
                        Yaml::String(text)
                    } else {
                        infer_scalar(&text)
                    };
                    let inner = self.plain_scalar(value, path, position.clone());
                    Term::new(Expr::Default(Box::new(inner)), position)
                }
                None => self.fail(
                    EvalErrorKind::InvalidTag,
                    "!{} requires a value",
                    vec![tag.to_string()],
                    path,
                    position,
                ),
            },
            _ => match (BasicType::from_tag(tag), raw) {
                (Some(basic), None) => Term::new(Expr::Type(basic), position),
                (Some(basic), Some(text)) => match literal(basic, &text) {
                    Some(expr) => Term::new(expr, position),
                    None => self.fail(
                        EvalErrorKind::InvalidTag,
                        "invalid {} literal {}",
                        vec![basic.name().to_string(), format!("{:?}", text)],
                        path,
                        position,
                    ),
                },
                (None, _) => self.fail(
                    EvalErrorKind::InvalidTag,
                    "unknown tag !{}",
                    vec![tag.to_string()],
                    path,
                    position,
                ),
            },
        }
    }
}

fn literal(basic: BasicType, text: &str) -> Option<Expr> {
    match basic {
        BasicType::Top => None,
        BasicType::Bool => match text {
            "true" => Some(Expr::Bool(true)),
            "false" => Some(Expr::Bool(false)),
            _ => None,
        },
        BasicType::Int => text.parse().ok().map(Expr::Int),
        BasicType::Float => parse_float(text).map(Expr::Float),
        BasicType::Number => text
            .parse()
            .ok()
            .map(Expr::Int)
            .or_else(|| parse_float(text).map(Expr::Float)),
        BasicType::String => Some(Expr::String(text.to_string())),
        BasicType::Bytes => base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .ok()
            .map(Expr::Bytes),
    }
}

fn parse_float(text: &str) -> Option<f64> {
    if !text.contains(|c: char| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn key_label(key: &YamlNode) -> Option<String> {
    match key.value()? {
        Yaml::String(s) | Yaml::Real(s) => Some(s.clone()),
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

fn yaml_type_name(yaml: &Yaml) -> &'static str {
    match yaml {
        Yaml::Real(_) => "float",
        Yaml::Integer(_) => "int",
        Yaml::String(_) => "string",
        Yaml::Boolean(_) => "bool",
        Yaml::Null => "null",
        _ => "invalid value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(source: &str) -> (Term, Vec<EvalError>) {
        let yaml = unicfg_yaml::parse_file(source, "test.yaml").unwrap();
        let mut errors = Vec::new();
        let term = fragment_term(yaml, 256, &mut errors);
        (term, errors)
    }

    fn field<'a>(term: &'a Term, name: &str) -> &'a Expr {
        match &term.expr {
            Expr::Struct(fields) => &fields[name].expr,
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_scalars() {
        let (term, errors) = convert("a: 1\nb: 1.5\nc: true\nd: x\ne: ~");
        assert!(errors.is_empty());
        assert!(matches!(field(&term, "a"), Expr::Int(1)));
        assert!(matches!(field(&term, "b"), Expr::Float(f) if *f == 1.5));
        assert!(matches!(field(&term, "c"), Expr::Bool(true)));
        assert!(matches!(field(&term, "d"), Expr::String(s) if s == "x"));
        assert!(matches!(field(&term, "e"), Expr::Null));
    }

    #[test]
    fn test_type_constraints_and_literals() {
        let (term, errors) = convert("port: !int\nname: !string 42\nblob: !bytes aGVsbG8=");
        assert!(errors.is_empty());
        assert!(matches!(field(&term, "port"), Expr::Type(BasicType::Int)));
        assert!(matches!(field(&term, "name"), Expr::String(s) if s == "42"));
        assert!(matches!(field(&term, "blob"), Expr::Bytes(b) if b == b"hello"));
    }

    #[test]
    fn test_reference_and_default() {
        let (term, errors) = convert("a: !ref b.c.0\nb: !default 80");
        assert!(errors.is_empty());
        assert!(matches!(field(&term, "a"), Expr::Ref(p) if p == &["b", "c", "0"]));
        match field(&term, "b") {
            Expr::Default(inner) => assert!(matches!(inner.expr, Expr::Int(80))),
            other => panic!("expected default, got {:?}", other),
        }
    }

    #[test]
    fn test_quoted_default_stays_text() {
        let (term, errors) = convert("a: !default \"8080\"\nb: !default 8080\nc: !string \"\"");
        assert!(errors.is_empty());
        match field(&term, "a") {
            Expr::Default(inner) => assert!(matches!(&inner.expr, Expr::String(s) if s == "8080")),
            other => panic!("expected default, got {:?}", other),
        }
        match field(&term, "b") {
            Expr::Default(inner) => assert!(matches!(inner.expr, Expr::Int(8080))),
            other => panic!("expected default, got {:?}", other),
        }
        assert!(matches!(field(&term, "c"), Expr::String(s) if s.is_empty()));
    }

    #[test]
    fn test_tagged_collections_are_rejected() {
        let (term, errors) = convert("a: !wat\n  x: 1\nb: !int [1]\nc:\n  d: 2");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind(), EvalErrorKind::InvalidTag);
        assert_eq!(errors[0].message(), "unknown tag !wat");
        assert_eq!(errors[0].path(), &["a".to_string()]);
        assert_eq!(errors[1].message(), "unknown tag !int");
        assert!(matches!(field(&term, "a"), Expr::Bottom));
        assert!(matches!(field(&term, "c"), Expr::Struct(_)));
    }

    #[test]
    fn test_duplicate_keys_become_conjunction() {
        let (term, errors) = convert("a: 1\na: 1");
        assert!(errors.is_empty());
        assert!(matches!(field(&term, "a"), Expr::Conj(members) if members.len() == 2));
    }

    #[test]
    fn test_invalid_tags_are_all_reported() {
        let (_, errors) = convert("a: !wat x\nb: !int nope\nc: !ref");
        let kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EvalErrorKind::InvalidTag; 3]);
        assert_eq!(errors[0].message(), "unknown tag !wat");
        assert_eq!(errors[1].message(), "invalid int literal \"nope\"");
        assert_eq!(errors[1].path(), &["b".to_string()]);
        assert_eq!(errors[2].message(), "!ref requires a value");
    }

    #[test]
    fn test_root_must_be_mapping() {
        let (_, errors) = convert("- 1\n- 2");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "fragment root must be a mapping, found list");
    }

    #[test]
    fn test_empty_fragment_is_empty_struct() {
        let (term, errors) = convert("");
        assert!(errors.is_empty());
        assert!(matches!(&term.expr, Expr::Struct(fields) if fields.is_empty()));
    }

    #[test]
    fn test_nesting_limit() {
        let yaml = unicfg_yaml::parse("a:\n  b:\n    c: 1").unwrap();
        let mut errors = Vec::new();
        fragment_term(yaml, 1, &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), EvalErrorKind::NestingTooDeep);
        assert_eq!(errors[0].path(), &["a".to_string(), "b".to_string()]);
    }
}
