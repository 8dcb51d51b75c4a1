//! Reference resolution over the fully merged document.

use crate::error::{EvalError, EvalErrorKind};
use crate::expr::{Expr, Term};
use crate::unify::Unifier;
use std::collections::HashMap;
use std::sync::Arc;
use unicfg_yaml::SourceInfo;

/// Replaces every `!ref` and pending conjunction under `root` with its
/// unified value.
///
/// References are absolute. A target is located by walking the unresolved
/// document, following a reference only where the remaining selectors lead
/// through it. Each document location is resolved at most once; the result
/// is shared by every reference to it.
///
/// A cycle is a reference to a location whose value is still being built.
pub(crate) struct Resolver<'a> {
    root: &'a Term,
    errors: &'a mut Vec<EvalError>,
    /// Locations currently being resolved, outermost first.
    in_progress: Vec<Vec<String>>,
    /// References being followed while a target is located.
    redirects: Vec<Vec<String>>,
    resolved: HashMap<Vec<String>, Arc<Term>>,
}

/// A term found while locating a reference target.
struct Piece<'a> {
    term: &'a Term,
    path: Vec<String>,
    /// The term is the whole value at `path`, not one side of a conjunction.
    whole: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(root: &'a Term, errors: &'a mut Vec<EvalError>) -> Self {
        Self {
            root,
            errors,
            in_progress: Vec::new(),
            redirects: Vec::new(),
            resolved: HashMap::new(),
        }
    }

    pub fn resolve_root(&mut self) -> Term {
        let root = self.root;
        self.resolve(root, &mut Vec::new())
    }

    fn resolve(&mut self, term: &'a Term, path: &mut Vec<String>) -> Term {
        self.in_progress.push(path.clone());
        let resolved = self.resolve_expr(term, path);
        self.in_progress.pop();
        resolved
    }

    fn resolve_expr(&mut self, term: &'a Term, path: &mut Vec<String>) -> Term {
        let expr = match &term.expr {
            Expr::Struct(fields) => Expr::Struct(
                fields
                    .iter()
                    .map(|(label, field)| {
                        path.push(label.clone());
                        let resolved = self.resolve(field, path);
                        path.pop();
                        (label.clone(), resolved)
                    })
                    .collect(),
            ),
            Expr::List(items) => Expr::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        path.push(index.to_string());
                        let resolved = self.resolve(item, path);
                        path.pop();
                        resolved
                    })
                    .collect(),
            ),
            Expr::Ref(target) => return self.follow(target, &term.positions, path),
            Expr::Conj(members) => {
                let mut resolved: Option<Term> = None;
                for member in members {
                    let next = self.resolve_expr(member, path);
                    resolved = Some(match resolved {
                        None => next,
                        Some(previous) => Unifier {
                            errors: &mut *self.errors,
                        }
                        .unify(previous, next, path),
                    });
                }
                return resolved.unwrap_or_else(|| Term::bottom(term.positions.clone()));
            }
            _ => return term.clone(),
        };
        Term {
            expr,
            positions: term.positions.clone(),
        }
    }

    fn follow(&mut self, target: &[String], positions: &[SourceInfo], path: &[String]) -> Term {
        let pieces = match self.locate(target) {
            Ok(pieces) => pieces,
            Err(kind) => return self.fail(kind, target, path, positions),
        };
        if pieces.iter().any(|piece| self.in_progress.contains(&piece.path)) {
            return self.fail(EvalErrorKind::CyclicReference, target, path, positions);
        }

        let mut unified: Option<Term> = None;
        for piece in pieces {
            let next = Term {
                expr: Expr::Shared(self.resolve_piece(piece)),
                positions: positions.to_vec(),
            };
            unified = Some(match unified {
                None => next,
                Some(previous) => Unifier {
                    errors: &mut *self.errors,
                }
                .unify(previous, next, &mut target.to_vec()),
            });
        }
        unified.unwrap_or_else(|| Term::bottom(positions.to_vec()))
    }

    fn resolve_piece(&mut self, piece: Piece<'a>) -> Arc<Term> {
        if piece.whole {
            if let Some(done) = self.resolved.get(&piece.path) {
                return Arc::clone(done);
            }
        }
        let mut path = piece.path.clone();
        let resolved = Arc::new(self.resolve(piece.term, &mut path));
        if piece.whole {
            self.resolved.insert(piece.path, Arc::clone(&resolved));
        }
        resolved
    }

    /// Every term that makes up the value at `target`.
    fn locate(&mut self, target: &[String]) -> Result<Vec<Piece<'a>>, EvalErrorKind> {
        let mut pieces = vec![Piece {
            term: self.root,
            path: Vec::new(),
            whole: true,
        }];
        for segment in target {
            let mut next = Vec::new();
            for piece in pieces {
                self.step(piece, segment, &mut next)?;
            }
            if next.is_empty() {
                return Err(EvalErrorKind::UnresolvedReference);
            }
            pieces = next;
        }
        Ok(pieces)
    }

    fn step(
        &mut self,
        piece: Piece<'a>,
        segment: &str,
        out: &mut Vec<Piece<'a>>,
    ) -> Result<(), EvalErrorKind> {
        let term = piece.term;
        match &term.expr {
            Expr::Ref(target) => {
                if self.redirects.contains(target) {
                    return Err(EvalErrorKind::CyclicReference);
                }
                self.redirects.push(target.clone());
                let result = self.locate(target).and_then(|redirected| {
                    redirected
                        .into_iter()
                        .try_for_each(|found| self.step(found, segment, out))
                });
                self.redirects.pop();
                result
            }
            Expr::Conj(members) => members.iter().try_for_each(|member| {
                let side = Piece {
                    term: member,
                    path: piece.path.clone(),
                    whole: false,
                };
                self.step(side, segment, out)
            }),
            _ => {
                if let Some(found) = child(term, segment) {
                    let mut path = piece.path;
                    path.push(segment.to_string());
                    out.push(Piece {
                        term: found,
                        path,
                        whole: piece.whole,
                    });
                }
                Ok(())
            }
        }
    }

    fn fail(
        &mut self,
        kind: EvalErrorKind,
        target: &[String],
        path: &[String],
        positions: &[SourceInfo],
    ) -> Term {
        let template = match kind {
            EvalErrorKind::CyclicReference => "cyclic reference {}",
            _ => "reference {} not found",
        };
        self.errors.push(
            EvalError::new(kind, template, vec![target.join(".")])
                .at_path(path)
                .with_positions(positions),
        );
        Term::bottom(positions.to_vec())
    }
}

fn child<'t>(term: &'t Term, segment: &str) -> Option<&'t Term> {
    match &term.expr {
        Expr::Struct(fields) => fields.get(segment),
        Expr::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
