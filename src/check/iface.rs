//! Interface implementation checking.
//!
//! A struct declaring `implements base.i` owes every method the interface
//! requires: same name, identical parameter list and return type, and the
//! same effect. The unseen-method set starts full and shrinks as matching
//! definitions are found; whatever is left names the failure.

use crate::ast::{StructDecl, Type};
use crate::builtin::IfaceMethod;
use crate::check::error::{CheckErrorKind, CheckResult};
use crate::check::expr::Ctx;
use crate::check::symbols::FuncInfo;
use crate::intern::{Qqid, Symbol};

pub(crate) fn check_struct_impl(ctx: Ctx<'_>, decl: &StructDecl) -> CheckResult<()> {
    for iface_qid in &decl.implements {
        let Some(iface) = ctx.builtins.interface(*iface_qid) else {
            return Err(ctx.err(
                CheckErrorKind::UnknownInterface(iface_qid.display(ctx.interner)),
                decl.span,
            ));
        };

        let mut unseen: Vec<&IfaceMethod> = iface.methods.iter().collect();
        unseen.retain(|required| {
            let qqid = Qqid::new(Symbol::EMPTY, decl.name, required.name);
            match ctx.symbols.funcs.get(&qqid) {
                Some(found) => !signatures_match(required, found),
                None => true,
            }
        });

        if let Some(missing) = unseen.first() {
            let qqid = Qqid::new(Symbol::EMPTY, decl.name, missing.name);
            // Distinguish a wrong signature from a plain absence.
            if let Some(found) = ctx.symbols.funcs.get(&qqid) {
                return Err(ctx.err(
                    CheckErrorKind::MethodSignatureMismatch {
                        method: ctx.interner.resolve(missing.name).to_string(),
                        want: render_iface_sig(ctx, missing),
                        got: render_func_sig(ctx, found),
                    },
                    decl.span,
                ));
            }
            return Err(ctx.err(
                CheckErrorKind::MethodMissing {
                    strukt: ctx.interner.resolve(decl.name).to_string(),
                    iface: iface_qid.display(ctx.interner),
                    method: ctx.interner.resolve(missing.name).to_string(),
                },
                decl.span,
            ));
        }
    }
    Ok(())
}

fn signatures_match(required: &IfaceMethod, found: &FuncInfo) -> bool {
    if required.effect != found.effect {
        return false;
    }
    if !required.out.eq_ignoring_refinements(&found.out) {
        return false;
    }
    if required.args.len() != found.args.len() {
        return false;
    }
    required
        .args
        .iter()
        .zip(&found.args)
        .all(|((rn, rt), (fn_, ft))| rn == fn_ && rt.eq_ignoring_refinements(ft))
}

fn render_iface_sig(ctx: Ctx<'_>, m: &IfaceMethod) -> String {
    render_sig(
        ctx,
        m.name,
        m.effect,
        m.args.iter().map(|(n, t)| (*n, t)),
        &m.out,
    )
}

fn render_func_sig(ctx: Ctx<'_>, f: &FuncInfo) -> String {
    render_sig(
        ctx,
        f.qqid.name,
        f.effect,
        f.args.iter().map(|(n, t)| (*n, t)),
        &f.out,
    )
}

fn render_sig<'t>(
    ctx: Ctx<'_>,
    name: Symbol,
    effect: crate::ast::Effect,
    args: impl Iterator<Item = (Symbol, &'t Type)>,
    out: &Type,
) -> String {
    let args = args
        .map(|(n, t)| format!("{} : {}", ctx.interner.resolve(n), t.display(ctx.interner)))
        .collect::<Vec<_>>()
        .join(", ");
    let out = match out {
        Type::Empty => String::new(),
        other => format!(" {}", other.display(ctx.interner)),
    };
    format!(
        "{}{}({}){}",
        ctx.interner.resolve(name),
        effect.marker(),
        args,
        out
    )
}
