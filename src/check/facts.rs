//! The fact engine.
//!
//! A fact is a side-effect-free boolean predicate known true at the current
//! program point, held as an ordered vector of shared expression snapshots.
//! Insertion keeps the canonical form: conjunctions are split, duplicates
//! (structural equality) are dropped, and `x == c` closes over existing
//! equalities. Mutation of a variable must be followed by `update`, which
//! visits every fact exactly once and preserves the order of survivors.

use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigInt;

use crate::ast::{AssocOp, BinaryOp, Expr, ExprKind, Interval, Lit, Type};
use crate::intern::{Interner, Symbol};
use crate::render::Renderer;

pub type Fact = Rc<Expr>;

/// Outcome of the per-fact transformer passed to [`Facts::update`].
pub enum Update {
    Keep,
    Drop,
    Replace(Fact),
}

/// A constant literal node with its value slot already filled. The empty
/// spelling marks it as synthetic; renderers fall back to the value.
pub fn const_expr(v: BigInt) -> Expr {
    Expr::synthetic_const(
        ExprKind::Literal(Lit::Number(Symbol::EMPTY)),
        Type::Ideal,
        v,
    )
}

/// A synthetic comparison between two annotated expressions.
pub fn binary_fact(op: BinaryOp, lhs: Expr, rhs: Expr) -> Fact {
    Rc::new(Expr::synthetic(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        Type::Bool,
    ))
}

#[derive(Default)]
pub struct Facts {
    list: Vec<Fact>,
}

impl Facts {
    pub fn new() -> Self {
        Facts { list: Vec::new() }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn contains(&self, pred: &Expr) -> bool {
        self.list.iter().any(|f| f.eq_structural(pred))
    }

    /// Append a proven predicate. Conjunctions are flattened; an equality
    /// between a variable and a constant also rewrites the constant onto
    /// every variable already equated with it.
    pub fn append(&mut self, fact: Fact) {
        match &fact.kind {
            ExprKind::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                self.append(Rc::new((**lhs).clone()));
                self.append(Rc::new((**rhs).clone()));
                return;
            }
            ExprKind::Assoc {
                op: AssocOp::And,
                operands,
            } => {
                for op in operands {
                    self.append(Rc::new(op.clone()));
                }
                return;
            }
            _ => {}
        }

        if self.contains(&fact) {
            return;
        }

        // Close `x == c` over existing equalities before the push so the
        // scan never revisits the new fact itself.
        let mut derived: Vec<Fact> = Vec::new();
        if let ExprKind::Binary {
            op: BinaryOp::Eq,
            lhs,
            rhs,
        } = &fact.kind
        {
            if rhs.const_value().is_some() {
                for prior in &self.list {
                    if let ExprKind::Binary {
                        op: BinaryOp::Eq,
                        lhs: pl,
                        rhs: pr,
                    } = &prior.kind
                    {
                        if pr.eq_structural(lhs) {
                            derived.push(binary_fact(
                                BinaryOp::Eq,
                                (**pl).clone(),
                                (**rhs).clone(),
                            ));
                        } else if pl.eq_structural(lhs) {
                            derived.push(binary_fact(
                                BinaryOp::Eq,
                                (**pr).clone(),
                                (**rhs).clone(),
                            ));
                        }
                    }
                }
            }
        }

        self.list.push(fact);
        for d in derived {
            if !self.contains(&d) {
                self.list.push(d);
            }
        }
    }

    /// Apply a transformer to every fact, exactly once each, preserving
    /// the order of survivors.
    pub fn update(&mut self, mut f: impl FnMut(&Fact) -> Update) {
        let mut kept = Vec::with_capacity(self.list.len());
        for fact in self.list.drain(..) {
            match f(&fact) {
                Update::Keep => kept.push(fact),
                Update::Drop => {}
                Update::Replace(new) => kept.push(new),
            }
        }
        self.list = kept;
    }

    /// Discard every fact that reads the mutated variable.
    pub fn drop_mentioning(&mut self, name: Symbol) {
        self.update(|fact| {
            if fact.mentions(name) {
                Update::Drop
            } else {
                Update::Keep
            }
        });
    }

    /// `x += c` / `x -= c`: a fact `x op d` (d constant) survives as
    /// `x op (d + c)` by the assignment's algebraic inverse; anything else
    /// mentioning `x` is stale.
    pub fn shift_mentioning(&mut self, name: Symbol, delta: &BigInt, subtract: bool) {
        self.update(|fact| {
            if !fact.mentions(name) {
                return Update::Keep;
            }
            if let ExprKind::Binary { op, lhs, rhs } = &fact.kind {
                let plain_var =
                    matches!(lhs.kind, ExprKind::Ident(s) if s == name) && !rhs.mentions(name);
                if plain_var && op.is_comparison() {
                    if let Some(d) = rhs.const_value() {
                        let new_d = if subtract { d - delta } else { d + delta };
                        return Update::Replace(binary_fact(
                            *op,
                            (**lhs).clone(),
                            const_expr(new_d),
                        ));
                    }
                }
            }
            Update::Drop
        });
    }

    /// Entering a suspension point or an opaque impure call: anything the
    /// callee could reach through `this` or a pointer-typed local is no
    /// longer known.
    pub fn drop_suspension_sensitive(&mut self, locals: &HashMap<Symbol, Type>) {
        self.update(|fact| {
            if fact.mentions_this() {
                return Update::Drop;
            }
            let mut doomed = false;
            crate::ast::walk_expr(fact, &mut |e| {
                if let ExprKind::Ident(s) = e.kind {
                    if !e.flags.global_ident {
                        if let Some(t) = locals.get(&s) {
                            if t.is_pointerish() {
                                doomed = true;
                            }
                        }
                    }
                }
            });
            if doomed {
                Update::Drop
            } else {
                Update::Keep
            }
        });
    }

    /// Tighten an interval for `expr` using every fact of the shape
    /// `expr op constant`. An empty result means the facts contradict the
    /// type bounds; `Err` carries nothing, the caller names the expression.
    pub fn refine(&self, expr: &Expr, mut interval: Interval) -> Result<Interval, ()> {
        for fact in &self.list {
            let ExprKind::Binary { op, lhs, rhs } = &fact.kind else {
                continue;
            };
            let (op, c) = if lhs.eq_structural(expr) {
                match rhs.const_value() {
                    Some(c) => (*op, c.clone()),
                    None => continue,
                }
            } else if rhs.eq_structural(expr) {
                match (lhs.const_value(), op.flipped()) {
                    (Some(c), Some(flip)) => (flip, c.clone()),
                    _ => continue,
                }
            } else {
                continue;
            };

            match op {
                BinaryOp::Eq => {
                    interval.lo = interval.lo.max(c.clone());
                    interval.hi = interval.hi.min(c);
                }
                BinaryOp::Lt => interval.hi = interval.hi.min(c - 1),
                BinaryOp::LtEq => interval.hi = interval.hi.min(c),
                BinaryOp::Gt => interval.lo = interval.lo.max(c + 1),
                BinaryOp::GtEq => interval.lo = interval.lo.max(c),
                BinaryOp::NotEq => {
                    if interval.lo == c {
                        interval.lo += 1;
                    } else if interval.hi == c {
                        interval.hi -= 1;
                    }
                }
                _ => {}
            }
            if interval.is_empty() {
                return Err(());
            }
        }
        Ok(interval)
    }

    /// After an `if` chain: keep only facts present, textually, in every
    /// branch that can fall through.
    pub fn reconcile(&mut self, branches: Vec<Vec<Fact>>) {
        let mut iter = branches.into_iter();
        let Some(first) = iter.next() else {
            self.list.clear();
            return;
        };
        let rest: Vec<Vec<Fact>> = iter.collect();
        self.list = first
            .into_iter()
            .filter(|f| rest.iter().all(|b| b.iter().any(|g| g.eq_structural(f))))
            .collect();
    }

    pub fn snapshot(&self) -> Vec<Fact> {
        self.list.clone()
    }

    pub fn restore(&mut self, facts: Vec<Fact>) {
        self.list = facts;
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn render(&self, interner: &Interner) -> Vec<String> {
        let r = Renderer::new(interner);
        self.list.iter().map(|f| r.expr(f)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NumKind;
    use crate::token::Span;

    fn ident(name: Symbol) -> Expr {
        let mut e = Expr::new(ExprKind::Ident(name), Span::default());
        e.set_mtype(Type::numeric(NumKind::U32)).unwrap();
        e
    }

    #[test]
    fn conjunctions_split_and_duplicates_drop() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let y = interner.intern("y");
        let mut facts = Facts::new();

        let conj = binary_fact(
            BinaryOp::And,
            Expr::synthetic(
                ExprKind::Binary {
                    op: BinaryOp::Lt,
                    lhs: Box::new(ident(x)),
                    rhs: Box::new(const_expr(BigInt::from(4))),
                },
                Type::Bool,
            ),
            Expr::synthetic(
                ExprKind::Binary {
                    op: BinaryOp::GtEq,
                    lhs: Box::new(ident(y)),
                    rhs: Box::new(const_expr(BigInt::from(1))),
                },
                Type::Bool,
            ),
        );
        facts.append(conj.clone());
        assert_eq!(facts.len(), 2);
        facts.append(conj);
        assert_eq!(facts.len(), 2);
    }

    #[test]
    fn equality_closure_records_the_constant() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let y = interner.intern("y");
        let mut facts = Facts::new();

        // y == x, then x == 7: y == 7 must follow.
        facts.append(binary_fact(BinaryOp::Eq, ident(y), ident(x)));
        facts.append(binary_fact(
            BinaryOp::Eq,
            ident(x),
            const_expr(BigInt::from(7)),
        ));
        let derived = binary_fact(BinaryOp::Eq, ident(y), const_expr(BigInt::from(7)));
        assert!(facts.contains(&derived));
    }

    #[test]
    fn refine_tightens_and_detects_contradiction() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let mut facts = Facts::new();
        facts.append(binary_fact(
            BinaryOp::Lt,
            ident(x),
            const_expr(BigInt::from(4)),
        ));

        let full = NumKind::U32.bounds();
        let tight = facts.refine(&ident(x), full).unwrap();
        assert_eq!(tight.hi, BigInt::from(3));

        facts.append(binary_fact(
            BinaryOp::Gt,
            ident(x),
            const_expr(BigInt::from(10)),
        ));
        assert!(facts.refine(&ident(x), NumKind::U32.bounds()).is_err());
    }

    #[test]
    fn shift_mentioning_applies_the_algebraic_inverse() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let mut facts = Facts::new();
        facts.append(binary_fact(
            BinaryOp::Lt,
            ident(x),
            const_expr(BigInt::from(10)),
        ));

        // x += 3 means the old `x < 10` becomes `x < 13`.
        facts.shift_mentioning(x, &BigInt::from(3), false);
        let expected = binary_fact(BinaryOp::Lt, ident(x), const_expr(BigInt::from(13)));
        assert!(facts.contains(&expected));
    }

    #[test]
    fn reconcile_keeps_the_intersection() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let y = interner.intern("y");
        let mut facts = Facts::new();

        let shared = binary_fact(BinaryOp::GtEq, ident(x), const_expr(BigInt::from(0)));
        let only_then = binary_fact(BinaryOp::Lt, ident(y), const_expr(BigInt::from(2)));
        facts.reconcile(vec![
            vec![shared.clone(), only_then],
            vec![shared.clone()],
        ]);
        assert_eq!(facts.len(), 1);
        assert!(facts.contains(&shared));
    }

    #[test]
    fn update_preserves_survivor_order() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let mut facts = Facts::new();
        for c in [1, 2, 3] {
            facts.append(binary_fact(
                BinaryOp::NotEq,
                ident(x),
                const_expr(BigInt::from(c)),
            ));
        }
        facts.update(|f| {
            let ExprKind::Binary { rhs, .. } = &f.kind else {
                return Update::Keep;
            };
            if rhs.const_value() == Some(&BigInt::from(2)) {
                Update::Drop
            } else {
                Update::Keep
            }
        });
        let rendered = facts.render(&interner);
        assert_eq!(rendered, vec!["x != 1", "x != 3"]);
    }
}
