//! The type resolver.
//!
//! Turns surface type expressions into their canonical resolved form,
//! annotating in place. Refinement bounds and array lengths are full
//! expressions; they are typed in a constant context and must fold.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::Signed;

use crate::ast::{Refined, Type, TypeExpr, TypeExprKind};
use crate::check::error::{CheckErrorKind, CheckResult};
use crate::check::expr::ExprTyper;
use crate::intern::Qid;

/// Resolve `t`, setting its resolution slot and returning the type.
pub(crate) fn resolve_type(
    typer: &ExprTyper<'_>,
    t: &mut TypeExpr,
    depth: usize,
) -> CheckResult<Type> {
    if depth > typer.ctx.config.max_type_depth {
        return Err(typer
            .ctx
            .err(CheckErrorKind::TooDeep("type expression"), t.span));
    }
    let span = t.span;

    let resolved = match &mut t.kind {
        TypeExprKind::Named { qid, refinement } => {
            let base = named_type(typer, *qid, span)?;
            match refinement {
                None => base,
                Some(r) => {
                    let kind = match &base {
                        Type::Numeric { kind, .. } => *kind,
                        other => {
                            return Err(typer.ctx.err(
                                CheckErrorKind::RefinementOutsideRange {
                                    refinement: "[..]".to_string(),
                                    range: typer.ctx.type_name(other),
                                },
                                span,
                            ));
                        }
                    };
                    let lo = match &mut r.lo {
                        Some(e) => Some(const_bound(typer, e)?),
                        None => None,
                    };
                    let hi = match &mut r.hi {
                        Some(e) => Some(const_bound(typer, e)?),
                        None => None,
                    };

                    // The refinement must sit inside the canonical range.
                    let range = kind.bounds();
                    for bound in lo.iter().chain(hi.iter()) {
                        if !range.contains(bound) {
                            return Err(typer.ctx.err(
                                CheckErrorKind::RefinementOutsideRange {
                                    refinement: bound.to_string(),
                                    range: range.to_string(),
                                },
                                span,
                            ));
                        }
                    }
                    if let (Some(lo), Some(hi)) = (&lo, &hi) {
                        if lo > hi {
                            return Err(typer.ctx.err(
                                CheckErrorKind::EmptyRefinement(format!(
                                    "[{} .. {}]",
                                    lo, hi
                                )),
                                span,
                            ));
                        }
                    }
                    Type::Numeric {
                        kind,
                        refinement: Some(Rc::new(Refined { lo, hi })),
                    }
                }
            }
        }
        TypeExprKind::Array { len, elem } => {
            typer.check_expr(len, 0)?;
            let n = len
                .const_value()
                .cloned()
                .ok_or_else(|| typer.ctx.err(CheckErrorKind::NonConstant, len.span))?;
            if n.is_negative() {
                return Err(typer
                    .ctx
                    .err(CheckErrorKind::NegativeArrayLength(n.to_string()), len.span));
            }
            let elem = resolve_type(typer, elem, depth + 1)?;
            Type::Array {
                len: Rc::new(n),
                elem: Rc::new(elem),
            }
        }
        TypeExprKind::Slice(elem) => Type::Slice(Rc::new(resolve_type(typer, elem, depth + 1)?)),
        TypeExprKind::Table(elem) => Type::Table(Rc::new(resolve_type(typer, elem, depth + 1)?)),
        TypeExprKind::Nptr(inner) => Type::Nptr(Rc::new(resolve_type(typer, inner, depth + 1)?)),
        TypeExprKind::Ptr(inner) => Type::Ptr(Rc::new(resolve_type(typer, inner, depth + 1)?)),
    };

    t.set_resolved(resolved.clone())?;
    Ok(resolved)
}

fn named_type(typer: &ExprTyper<'_>, qid: Qid, span: crate::token::Span) -> CheckResult<Type> {
    let ctx = typer.ctx;
    if qid.package == ctx.builtins.names.base {
        return ctx
            .builtins
            .base_type(qid.name, ctx.interner)
            .ok_or_else(|| ctx.err(CheckErrorKind::UnknownType(qid.display(ctx.interner)), span));
    }
    if !qid.package.is_empty() && !ctx.symbols.has_package(qid.package) {
        return Err(ctx.err(
            CheckErrorKind::UnknownPackage(ctx.interner.resolve(qid.package).to_string()),
            span,
        ));
    }
    if ctx.symbols.structs.contains_key(&qid) {
        return Ok(Type::Struct(qid));
    }
    Err(ctx.err(CheckErrorKind::UnknownType(qid.display(ctx.interner)), span))
}

/// Type-check a refinement bound and demand a constant.
fn const_bound(typer: &ExprTyper<'_>, e: &mut crate::ast::Expr) -> CheckResult<BigInt> {
    typer.check_expr(e, 0)?;
    e.const_value()
        .cloned()
        .ok_or_else(|| typer.ctx.err(CheckErrorKind::NonConstantRefinement, e.span))
}
