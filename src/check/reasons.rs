//! The reason catalogue.
//!
//! A reason is a named axiom schema: a goal pattern over metavariables plus
//! the premises that justify it. `assert <cond> via "<reason>"{..}` matches
//! the condition against the goal pattern, binds the remaining
//! metavariables from the assertion's named arguments, and discharges each
//! instantiated premise through the prover. The catalogue is data; adding
//! a reason is one more record here.

use crate::ast::{Arg, BinaryOp, Expr, ExprKind};
use crate::check::error::{CheckError, CheckErrorKind, CheckResult};
use crate::check::facts::const_expr;
use crate::intern::Interner;
use crate::render::Renderer;
use crate::token::Span;

/// A schema expression over named metavariables.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A metavariable, bound by unification or by a named argument.
    Var(&'static str),
    /// A literal constant.
    Lit(i64),
    Bin(BinaryOp, Box<Pattern>, Box<Pattern>),
}

fn var(name: &'static str) -> Box<Pattern> {
    Box::new(Pattern::Var(name))
}

fn lit(v: i64) -> Box<Pattern> {
    Box::new(Pattern::Lit(v))
}

fn bin(op: BinaryOp, l: Box<Pattern>, r: Box<Pattern>) -> Pattern {
    Pattern::Bin(op, l, r)
}

#[derive(Debug, Clone)]
pub struct ReasonSchema {
    /// The spelling written after `via`.
    pub key: &'static str,
    pub goal: Pattern,
    pub premises: Vec<Pattern>,
}

/// The built-in reasons. There is no dynamic registration.
pub fn catalogue() -> Vec<ReasonSchema> {
    use BinaryOp::{Add, Eq, Lt, LtEq};
    vec![
        ReasonSchema {
            key: "a < b: a < c; c <= b",
            goal: bin(Lt, var("a"), var("b")),
            premises: vec![
                bin(Lt, var("a"), var("c")),
                bin(LtEq, var("c"), var("b")),
            ],
        },
        ReasonSchema {
            key: "a < b: a <= c; c < b",
            goal: bin(Lt, var("a"), var("b")),
            premises: vec![
                bin(LtEq, var("a"), var("c")),
                bin(Lt, var("c"), var("b")),
            ],
        },
        ReasonSchema {
            key: "a <= b: a <= c; c <= b",
            goal: bin(LtEq, var("a"), var("b")),
            premises: vec![
                bin(LtEq, var("a"), var("c")),
                bin(LtEq, var("c"), var("b")),
            ],
        },
        ReasonSchema {
            key: "a < b: a == c; c < b",
            goal: bin(Lt, var("a"), var("b")),
            premises: vec![
                bin(Eq, var("a"), var("c")),
                bin(Lt, var("c"), var("b")),
            ],
        },
        ReasonSchema {
            key: "a < (b + c): a < c; 0 <= b",
            goal: bin(Lt, var("a"), Box::new(bin(Add, var("b"), var("c")))),
            premises: vec![
                bin(Lt, var("a"), var("c")),
                bin(LtEq, lit(0), var("b")),
            ],
        },
        ReasonSchema {
            key: "a <= (a + b): 0 <= b",
            goal: bin(LtEq, var("a"), Box::new(bin(Add, var("a"), var("b")))),
            premises: vec![bin(LtEq, lit(0), var("b"))],
        },
    ]
}

/// A metavariable environment built up during matching.
struct Bindings<'e> {
    entries: Vec<(&'static str, &'e Expr)>,
}

impl<'e> Bindings<'e> {
    fn get(&self, name: &str) -> Option<&'e Expr> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, e)| *e)
    }

    /// Bind a metavariable; a rebinding must agree structurally.
    fn bind(&mut self, name: &'static str, expr: &'e Expr) -> bool {
        match self.get(name) {
            Some(prev) => prev.eq_structural(expr),
            None => {
                self.entries.push((name, expr));
                true
            }
        }
    }
}

/// Structural unification of a pattern against a concrete condition.
fn unify<'e>(pattern: &ReasonPatternRef<'_>, expr: &'e Expr, bindings: &mut Bindings<'e>) -> bool {
    match pattern.0 {
        Pattern::Var(name) => bindings.bind(name, expr),
        Pattern::Lit(v) => expr
            .const_value()
            .map(|c| c == &num_bigint::BigInt::from(*v))
            .unwrap_or(false),
        Pattern::Bin(op, l, r) => match &expr.kind {
            ExprKind::Binary { op: eop, lhs, rhs } => {
                eop == op
                    && unify(&ReasonPatternRef(l), lhs, bindings)
                    && unify(&ReasonPatternRef(r), rhs, bindings)
            }
            _ => false,
        },
    }
}

struct ReasonPatternRef<'p>(&'p Pattern);

/// Instantiate a premise pattern under the bindings. Every metavariable
/// must be bound by now; an unbound one names a missing argument.
fn instantiate(
    pattern: &Pattern,
    bindings: &Bindings<'_>,
) -> Result<Expr, &'static str> {
    match pattern {
        Pattern::Var(name) => bindings.get(name).cloned().ok_or(*name),
        Pattern::Lit(v) => Ok(const_expr(num_bigint::BigInt::from(*v))),
        Pattern::Bin(op, l, r) => {
            let lhs = instantiate(l, bindings)?;
            let rhs = instantiate(r, bindings)?;
            Ok(Expr::synthetic(
                ExprKind::Binary {
                    op: *op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                crate::ast::Type::Bool,
            ))
        }
    }
}

/// Discharge `cond` through the named reason. `prove` is the prover's
/// binary-relation entry point.
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_reason(
    schemas: &[ReasonSchema],
    reason_text: &str,
    cond: &Expr,
    args: &[Arg],
    interner: &Interner,
    path: &str,
    span: Span,
    mut prove: impl FnMut(BinaryOp, &Expr, &Expr) -> bool,
) -> CheckResult<()> {
    let renderer = Renderer::new(interner);
    let schema = schemas
        .iter()
        .find(|s| s.key == reason_text)
        .ok_or_else(|| {
            CheckError::new(
                CheckErrorKind::NoSuchReason(reason_text.to_string()),
                path,
                span,
            )
        })?;

    let mut bindings = Bindings {
        entries: Vec::new(),
    };
    if !unify(&ReasonPatternRef(&schema.goal), cond, &mut bindings) {
        return Err(CheckError::new(
            CheckErrorKind::ReasonDoesNotMatch {
                reason: reason_text.to_string(),
                condition: renderer.expr(cond),
            },
            path,
            span,
        )
        .into());
    }

    // Named arguments bind the metavariables the goal leaves open.
    for arg in args {
        let name = interner.resolve(arg.name);
        // Leak-free: match against the schema's own static names.
        let static_name = schema_var_names(schema)
            .into_iter()
            .find(|n| *n == name)
            .ok_or_else(|| {
                CheckError::new(
                    CheckErrorKind::ReasonDoesNotMatch {
                        reason: reason_text.to_string(),
                        condition: renderer.expr(cond),
                    },
                    path,
                    arg.value.span,
                )
            })?;
        if !bindings.bind(static_name, &arg.value) {
            return Err(CheckError::new(
                CheckErrorKind::ReasonDoesNotMatch {
                    reason: reason_text.to_string(),
                    condition: renderer.expr(cond),
                },
                path,
                arg.value.span,
            )
            .into());
        }
    }

    for premise in &schema.premises {
        let concrete = instantiate(premise, &bindings).map_err(|missing| {
            CheckError::new(
                CheckErrorKind::MissingReasonArg {
                    reason: reason_text.to_string(),
                    name: missing.to_string(),
                },
                path,
                span,
            )
        })?;
        let ExprKind::Binary { op, lhs, rhs } = &concrete.kind else {
            return Err(crate::check::error::InternalError::new(
                "reason premise is not a binary relation",
            )
            .into());
        };
        if !prove(*op, lhs, rhs) {
            return Err(CheckError::new(
                CheckErrorKind::ReasonPremiseUndischarged {
                    reason: reason_text.to_string(),
                    premise: renderer.expr(&concrete),
                },
                path,
                span,
            )
            .into());
        }
    }
    Ok(())
}

/// Every metavariable name a schema mentions.
fn schema_var_names(schema: &ReasonSchema) -> Vec<&'static str> {
    fn walk(p: &Pattern, out: &mut Vec<&'static str>) {
        match p {
            Pattern::Var(n) => {
                if !out.contains(n) {
                    out.push(n);
                }
            }
            Pattern::Lit(_) => {}
            Pattern::Bin(_, l, r) => {
                walk(l, out);
                walk(r, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(&schema.goal, &mut out);
    for p in &schema.premises {
        walk(p, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Type;
    use crate::token::Span;

    fn ident(interner: &mut Interner, name: &str) -> Expr {
        let sym = interner.intern(name);
        let mut e = Expr::new(ExprKind::Ident(sym), Span::default());
        e.set_mtype(Type::numeric(crate::ast::NumKind::U32)).unwrap();
        e
    }

    fn lt(l: Expr, r: Expr) -> Expr {
        Expr::synthetic(
            ExprKind::Binary {
                op: BinaryOp::Lt,
                lhs: Box::new(l),
                rhs: Box::new(r),
            },
            Type::Bool,
        )
    }

    #[test]
    fn transitivity_binds_and_discharges() {
        let mut interner = Interner::new();
        let n = ident(&mut interner, "n");
        let m = ident(&mut interner, "m");
        let k = ident(&mut interner, "k");
        let cond = lt(n.clone(), m.clone());
        let args = vec![Arg {
            name: interner.intern("c"),
            value: k.clone(),
        }];

        // Premises n < k and k <= m hold; everything else fails.
        let schemas = catalogue();
        let result = apply_reason(
            &schemas,
            "a < b: a < c; c <= b",
            &cond,
            &args,
            &interner,
            "t.sift",
            Span::default(),
            |op, lhs, rhs| match op {
                BinaryOp::Lt => lhs.eq_structural(&n) && rhs.eq_structural(&k),
                BinaryOp::LtEq => lhs.eq_structural(&k) && rhs.eq_structural(&m),
                _ => false,
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn missing_premise_is_reported() {
        let mut interner = Interner::new();
        let n = ident(&mut interner, "n");
        let m = ident(&mut interner, "m");
        let k = ident(&mut interner, "k");
        let cond = lt(n, m);
        let args = vec![Arg {
            name: interner.intern("c"),
            value: k,
        }];

        let schemas = catalogue();
        let err = apply_reason(
            &schemas,
            "a < b: a < c; c <= b",
            &cond,
            &args,
            &interner,
            "t.sift",
            Span::default(),
            |_, _, _| false,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("premise"));
    }

    #[test]
    fn unknown_reason_is_reported() {
        let mut interner = Interner::new();
        let n = ident(&mut interner, "n");
        let m = ident(&mut interner, "m");
        let cond = lt(n, m);
        let schemas = catalogue();
        let err = apply_reason(
            &schemas,
            "a < b: because I said so",
            &cond,
            &[],
            &interner,
            "t.sift",
            Span::default(),
            |_, _, _| true,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("no such reason"));
    }

    #[test]
    fn goal_shape_must_match() {
        let mut interner = Interner::new();
        let n = ident(&mut interner, "n");
        let m = ident(&mut interner, "m");
        let cond = Expr::synthetic(
            ExprKind::Binary {
                op: BinaryOp::GtEq,
                lhs: Box::new(n),
                rhs: Box::new(m),
            },
            Type::Bool,
        );
        let schemas = catalogue();
        let err = apply_reason(
            &schemas,
            "a < b: a < c; c <= b",
            &cond,
            &[],
            &interner,
            "t.sift",
            Span::default(),
            |_, _, _| true,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("does not match"));
    }
}
