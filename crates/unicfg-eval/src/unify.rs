//! Unification of terms.
//!
//! Unification is commutative: structs merge field by field, lists element by
//! element, scalars must agree, and type constraints narrow. References cannot
//! be unified until the whole document is merged, so a term containing one is
//! parked in a conjunction for the resolver.

use crate::error::{EvalError, EvalErrorKind};
use crate::expr::{BasicType, Expr, Term};
use unicfg_yaml::SourceInfo;

pub(crate) struct Unifier<'a> {
    pub errors: &'a mut Vec<EvalError>,
}

impl Unifier<'_> {
    pub fn unify(&mut self, a: Term, b: Term, path: &mut Vec<String>) -> Term {
        let (a, b) = (a.unshare(), b.unshare());
        let mut positions = a.positions.clone();
        for position in &b.positions {
            if !positions.contains(position) {
                positions.push(position.clone());
            }
        }

        if a.has_references() || b.has_references() {
            let mut members = Vec::new();
            for term in [a, b] {
                match term.expr {
                    Expr::Conj(inner) => members.extend(inner),
                    _ => members.push(term),
                }
            }
            return Term {
                expr: Expr::Conj(members),
                positions,
            };
        }

        let expr = match (a.expr, b.expr) {
            (Expr::Bottom, _) | (_, Expr::Bottom) => Expr::Bottom,

            (Expr::Type(BasicType::Top), other) | (other, Expr::Type(BasicType::Top)) => other,

            (Expr::Struct(mut left), Expr::Struct(right)) => {
                for (label, term) in right {
                    path.push(label.clone());
                    match left.get_mut(&label) {
                        Some(existing) => {
                            let previous = std::mem::replace(existing, Term::bottom(Vec::new()));
                            *existing = self.unify(previous, term, path);
                        }
                        None => {
                            left.insert(label, term);
                        }
                    }
                    path.pop();
                }
                Expr::Struct(left)
            }

            (Expr::List(left), Expr::List(right)) => {
                if left.len() != right.len() {
                    return self.fail(
                        EvalErrorKind::ListLength,
                        "incompatible list lengths ({} and {})",
                        vec![left.len().to_string(), right.len().to_string()],
                        path,
                        positions,
                    );
                }
                let mut items = Vec::with_capacity(left.len());
                for (index, (l, r)) in left.into_iter().zip(right).enumerate() {
                    path.push(index.to_string());
                    items.push(self.unify(l, r, path));
                    path.pop();
                }
                Expr::List(items)
            }

            (Expr::Default(l), Expr::Default(r)) => {
                if !l.expr.scalar_eq(&r.expr) {
                    return self.fail(
                        EvalErrorKind::Conflict,
                        "conflicting default values {} and {}",
                        vec![l.expr.describe(), r.expr.describe()],
                        path,
                        positions,
                    );
                }
                Expr::Default(l)
            }

            (Expr::Default(default), other) | (other, Expr::Default(default)) => {
                let satisfied = match &other {
                    Expr::Type(basic) => basic.accepts(&default.expr),
                    other => {
                        other.is_concrete_scalar() && other.type_name() == default.expr.type_name()
                    }
                };
                if !satisfied {
                    return self.mismatch(&Expr::Default(default), &other, path, positions);
                }
                match other {
                    Expr::Type(_) => Expr::Default(default),
                    concrete => concrete,
                }
            }

            (Expr::Type(l), Expr::Type(r)) => match l.meet(r) {
                Some(basic) => Expr::Type(basic),
                None => return self.mismatch(&Expr::Type(l), &Expr::Type(r), path, positions),
            },

            (Expr::Type(basic), value) | (value, Expr::Type(basic)) => {
                if !basic.accepts(&value) {
                    return self.mismatch(&Expr::Type(basic), &value, path, positions);
                }
                value
            }

            (l, r) if l.is_concrete_scalar() && r.is_concrete_scalar() => {
                if l.scalar_eq(&r) {
                    l
                } else if l.type_name() == r.type_name() {
                    return self.fail(
                        EvalErrorKind::Conflict,
                        "conflicting values {} and {}",
                        vec![l.describe(), r.describe()],
                        path,
                        positions,
                    );
                } else {
                    return self.mismatch(&l, &r, path, positions);
                }
            }

            (l, r) => return self.mismatch(&l, &r, path, positions),
        };

        Term { expr, positions }
    }

    fn mismatch(
        &mut self,
        l: &Expr,
        r: &Expr,
        path: &[String],
        positions: Vec<SourceInfo>,
    ) -> Term {
        self.fail(
            EvalErrorKind::MismatchedTypes,
            "conflicting values {} and {} (mismatched types {} and {})",
            vec![
                l.describe(),
                r.describe(),
                l.type_name().to_string(),
                r.type_name().to_string(),
            ],
            path,
            positions,
        )
    }

    fn fail(
        &mut self,
        kind: EvalErrorKind,
        template: &'static str,
        args: Vec<String>,
        path: &[String],
        positions: Vec<SourceInfo>,
    ) -> Term {
        self.errors.push(
            EvalError::new(kind, template, args)
                .at_path(path)
                .with_positions(&positions),
        );
        Term::bottom(positions)
    }
}
