//! The expression typer.
//!
//! Assigns `mtype` to every expression node, folds constants, and resolves
//! method and field lookup. Recursion is bounded by the configured maximum
//! expression depth. Bounds are not computed here; the prover pass runs
//! after a whole statement has been typed.

use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::ast::{
    AssocOp, BinaryOp, Effect, Expr, ExprKind, Lit, Type, UnaryOp,
};
use crate::builtin::{subst_generic, BuiltinFunc, Builtins};
use crate::check::error::{CheckError, CheckErrorKind, CheckResult, Fatal};
use crate::check::resolve::resolve_type;
use crate::check::symbols::{ConstVal, FuncInfo, SymbolTable};
use crate::check::CheckConfig;
use crate::intern::{Interner, Qid, Qqid, Symbol};
use crate::render::Renderer;
use crate::suggest::find_similar;
use crate::token::Span;

/// Shared, copyable view of the checker's read-only state.
#[derive(Clone, Copy)]
pub(crate) struct Ctx<'a> {
    pub symbols: &'a SymbolTable,
    pub builtins: &'a Builtins,
    pub interner: &'a Interner,
    pub config: &'a CheckConfig,
    pub path: &'a str,
}

impl<'a> Ctx<'a> {
    pub fn err(&self, kind: CheckErrorKind, span: Span) -> Fatal {
        CheckError::new(kind, self.path, span).into()
    }

    pub fn type_name(&self, t: &Type) -> String {
        t.display(self.interner)
    }

    pub fn render(&self, e: &Expr) -> String {
        Renderer::new(self.interner).expr(e)
    }
}

/// What a call expression resolved to.
pub(crate) enum ResolvedCallee<'a> {
    User(&'a FuncInfo),
    Builtin {
        func: &'a BuiltinFunc,
        /// The receiver's element type, substituted for the generic
        /// placeholder in slice/table signatures.
        elem: Option<Type>,
    },
}

impl<'a> ResolvedCallee<'a> {
    pub fn effect(&self) -> Effect {
        match self {
            ResolvedCallee::User(f) => f.effect,
            ResolvedCallee::Builtin { func, .. } => func.effect,
        }
    }

    pub fn arg_types(&self) -> Vec<(Symbol, Type)> {
        match self {
            ResolvedCallee::User(f) => f.args.clone(),
            ResolvedCallee::Builtin { func, elem } => func
                .args
                .iter()
                .map(|(n, t)| {
                    let t = match elem {
                        Some(e) => subst_generic(t, e),
                        None => t.clone(),
                    };
                    (*n, t)
                })
                .collect(),
        }
    }

    pub fn out_type(&self) -> Type {
        match self {
            ResolvedCallee::User(f) => f.out.clone(),
            ResolvedCallee::Builtin { func, elem } => match elem {
                Some(e) => subst_generic(&func.out, e),
                None => func.out.clone(),
            },
        }
    }
}

/// Per-function expression typing context.
#[derive(Clone, Copy)]
pub(crate) struct ExprTyper<'a> {
    pub ctx: Ctx<'a>,
    /// Local variables of the enclosing body; `None` in constant contexts.
    pub locals: Option<&'a HashMap<Symbol, Type>>,
    /// Receiver struct for `this` inside methods.
    pub receiver: Option<Qid>,
    /// The enclosing function's declared effect; callees must not exceed it.
    pub func_effect: Effect,
}

impl<'a> ExprTyper<'a> {
    /// Constant-context typer: no locals, no receiver, pure.
    pub fn const_context(ctx: Ctx<'a>) -> Self {
        ExprTyper {
            ctx,
            locals: None,
            receiver: None,
            func_effect: Effect::Pure,
        }
    }

    fn local(&self, name: Symbol) -> Option<&'a Type> {
        self.locals.and_then(|l| l.get(&name))
    }

    pub fn check_expr(&self, e: &mut Expr, depth: usize) -> CheckResult<()> {
        if depth > self.ctx.config.max_expr_depth {
            return Err(self.ctx.err(CheckErrorKind::TooDeep("expression"), e.span));
        }
        if matches!(e.kind, ExprKind::Call { .. }) {
            let out = self.check_call(e, depth)?;
            e.set_mtype(out)?;
            return Ok(());
        }
        let span = e.span;

        // Computed annotations; committed to the node at the end.
        let mut mtype: Type;
        let mut const_value: Option<BigInt> = None;
        let mut global_ident = false;

        match &mut e.kind {
            ExprKind::Literal(lit) => match *lit {
                Lit::Number(sym) => {
                    let text = self.ctx.interner.resolve(sym);
                    let v = parse_number(text).ok_or_else(|| {
                        self.ctx.err(
                            CheckErrorKind::UnknownIdentifier {
                                name: text.to_string(),
                                suggestion: None,
                            },
                            span,
                        )
                    })?;
                    mtype = Type::Ideal;
                    const_value = Some(v);
                }
                Lit::Status(sym) => {
                    if self.ctx.symbols.status_by_message(sym).is_none() {
                        return Err(self.ctx.err(
                            CheckErrorKind::UnknownStatus(
                                self.ctx.interner.resolve(sym).to_string(),
                            ),
                            span,
                        ));
                    }
                    mtype = Type::Status;
                }
                Lit::Bool(_) => mtype = Type::Bool,
                Lit::Ok_ => mtype = Type::Status,
                Lit::Nullptr => mtype = Type::Nptr(Rc::new(Type::Empty)),
            },

            ExprKind::Ident(sym) => {
                let sym = *sym;
                if let Some(t) = self.local(sym) {
                    mtype = t.clone();
                } else if let Some(info) = self.ctx.symbols.consts.get(&Qid::local(sym)) {
                    mtype = info.typ.clone();
                    global_ident = true;
                    if let ConstVal::Scalar(v) = &info.value {
                        const_value = Some(v.clone());
                    }
                } else {
                    let name = self.ctx.interner.resolve(sym).to_string();
                    let suggestion =
                        find_similar(&name, self.ctx.interner.strings(), 2).map(String::from);
                    return Err(self
                        .ctx
                        .err(CheckErrorKind::UnknownIdentifier { name, suggestion }, span));
                }
            }

            ExprKind::This => match self.receiver {
                Some(qid) => mtype = Type::Ptr(Rc::new(Type::Struct(qid))),
                None => {
                    return Err(self.ctx.err(
                        CheckErrorKind::UnknownIdentifier {
                            name: "this".to_string(),
                            suggestion: None,
                        },
                        span,
                    ));
                }
            },

            ExprKind::Selector { recv, name } => {
                let name = *name;
                // A package qualifier is a namespace, not a value.
                if let Some(pkg) = self.package_qualifier(recv) {
                    recv.set_mtype(Type::Empty)?;
                    recv.flags.global_ident = true;
                    let qid = Qid::new(pkg, name);
                    if let Some(info) = self.ctx.symbols.consts.get(&qid) {
                        mtype = info.typ.clone();
                        global_ident = true;
                        if let ConstVal::Scalar(v) = &info.value {
                            const_value = Some(v.clone());
                        }
                    } else {
                        return Err(self.ctx.err(
                            CheckErrorKind::UnknownIdentifier {
                                name: qid.display(self.ctx.interner),
                                suggestion: None,
                            },
                            span,
                        ));
                    }
                } else {
                    self.check_expr(recv, depth + 1)?;
                    let rt = self.type_of(recv)?.pierce_ptr().clone();

                    if let Some(m) = self.ctx.builtins.method(&rt, name) {
                        mtype = Type::Func {
                            receiver: Rc::new(rt),
                            name: m.name,
                        };
                    } else if let Type::Struct(qid) = &rt {
                        let info = self.struct_info(*qid, span)?;
                        if let Some((_, ft)) =
                            info.fields.iter().find(|(fname, _)| *fname == name)
                        {
                            mtype = ft.clone();
                        } else if self
                            .ctx
                            .symbols
                            .funcs
                            .contains_key(&Qqid::new(qid.package, qid.name, name))
                        {
                            mtype = Type::Func {
                                receiver: Rc::new(rt),
                                name,
                            };
                        } else {
                            return Err(self.ctx.err(
                                CheckErrorKind::UnknownField {
                                    receiver: self.ctx.type_name(&rt),
                                    name: self.ctx.interner.resolve(name).to_string(),
                                },
                                span,
                            ));
                        }
                    } else {
                        return Err(self.ctx.err(
                            CheckErrorKind::UnknownField {
                                receiver: self.ctx.type_name(&rt),
                                name: self.ctx.interner.resolve(name).to_string(),
                            },
                            span,
                        ));
                    }
                }
            }

            ExprKind::Index { recv, index } => {
                self.check_expr(recv, depth + 1)?;
                self.check_expr(index, depth + 1)?;
                let rt = self.type_of(recv)?.pierce_ptr().clone();
                let elem = match &rt {
                    Type::Array { elem, .. } => (**elem).clone(),
                    Type::Slice(elem) => (**elem).clone(),
                    other => {
                        return Err(self
                            .ctx
                            .err(CheckErrorKind::NotIndexable(self.ctx.type_name(other)), span));
                    }
                };
                let it = self.type_of(index)?;
                if !it.is_numeric() {
                    return Err(self
                        .ctx
                        .err(CheckErrorKind::NonNumericIndex(self.ctx.type_name(it)), span));
                }
                // A constant index into a constant array folds.
                if let (Some(list), Some(i)) =
                    (self.const_list_of(recv), index.const_value())
                {
                    let i = i
                        .to_usize()
                        .filter(|&i| i < list.len())
                        .ok_or_else(|| {
                            self.ctx.err(
                                CheckErrorKind::IndexOutOfRange {
                                    index: i.to_string(),
                                    length: list.len().to_string(),
                                },
                                span,
                            )
                        })?;
                    const_value = Some(list[i].clone());
                }
                mtype = elem;
            }

            ExprKind::SliceOf { recv, lo, hi } => {
                self.check_expr(recv, depth + 1)?;
                let rt = self.type_of(recv)?.pierce_ptr().clone();
                let elem = match &rt {
                    Type::Array { elem, .. } => elem.clone(),
                    Type::Slice(elem) => elem.clone(),
                    other => {
                        return Err(self
                            .ctx
                            .err(CheckErrorKind::NotIndexable(self.ctx.type_name(other)), span));
                    }
                };
                for bound in [lo.as_deref_mut(), hi.as_deref_mut()].into_iter().flatten() {
                    self.check_expr(bound, depth + 1)?;
                    let bt = self.type_of(bound)?;
                    if !bt.is_numeric() {
                        return Err(self.ctx.err(
                            CheckErrorKind::NonNumericIndex(self.ctx.type_name(bt)),
                            span,
                        ));
                    }
                }
                mtype = Type::Slice(elem);
            }

            ExprKind::Call { .. } => {
                // Dispatched above, before the kind was borrowed.
                return Err(self.internal("call expression reached the leaf matcher"));
            }

            ExprKind::Unary { op, operand } => {
                self.check_expr(operand, depth + 1)?;
                let ot = self.type_of(operand)?.clone();
                match op {
                    UnaryOp::Not => {
                        if !ot.is_bool() {
                            return Err(self.ctx.err(
                                CheckErrorKind::NotBool {
                                    what: "operand of not",
                                    found: self.ctx.type_name(&ot),
                                },
                                span,
                            ));
                        }
                        mtype = Type::Bool;
                    }
                    UnaryOp::Pos | UnaryOp::Neg => {
                        if !ot.is_numeric() {
                            return Err(self.ctx.err(
                                CheckErrorKind::WrongOperandType {
                                    op: op.spelling(),
                                    found: self.ctx.type_name(&ot),
                                },
                                span,
                            ));
                        }
                        if *op == UnaryOp::Neg && ot.is_unsigned() {
                            return Err(self.ctx.err(
                                CheckErrorKind::WrongOperandType {
                                    op: "-",
                                    found: self.ctx.type_name(&ot),
                                },
                                span,
                            ));
                        }
                        if let Some(v) = operand.const_value() {
                            const_value =
                                Some(if *op == UnaryOp::Neg { -v.clone() } else { v.clone() });
                        }
                        mtype = ot;
                    }
                }
            }

            ExprKind::Binary { op, lhs, rhs } => {
                self.check_expr(lhs, depth + 1)?;
                self.check_expr(rhs, depth + 1)?;
                let op = *op;
                let lt = self.type_of(lhs)?.clone();
                let rt = self.type_of(rhs)?.clone();

                if op.is_logical() {
                    for (t, side) in [(&lt, lhs.span), (&rt, rhs.span)] {
                        if !t.is_bool() {
                            return Err(self.ctx.err(
                                CheckErrorKind::NotBool {
                                    what: "logical operand",
                                    found: self.ctx.type_name(t),
                                },
                                side,
                            ));
                        }
                    }
                    mtype = Type::Bool;
                } else if op.is_comparison() {
                    self.require_compatible_operands(op, &lt, &rt, span)?;
                    mtype = Type::Bool;
                } else {
                    if op.is_shift() {
                        // Shift counts carry their own width; the result
                        // keeps the shifted operand's type.
                        if !lt.is_numeric() || !rt.is_numeric() {
                            return Err(self.ctx.err(
                                CheckErrorKind::WrongOperandType {
                                    op: op.spelling(),
                                    found: format!(
                                        "{} and {}",
                                        self.ctx.type_name(&lt),
                                        self.ctx.type_name(&rt)
                                    ),
                                },
                                span,
                            ));
                        }
                        if lt.is_ideal() && rhs.const_value().is_none() {
                            return Err(self.ctx.err(
                                CheckErrorKind::WrongOperandType {
                                    op: op.spelling(),
                                    found: "an untyped literal and a variable count"
                                        .to_string(),
                                },
                                span,
                            ));
                        }
                    } else {
                        self.require_compatible_operands(op, &lt, &rt, span)?;
                    }
                    if op.is_modulating() {
                        let counts = if op.is_shift() {
                            // The count's sign does not wrap anything.
                            vec![&lt]
                        } else {
                            vec![&lt, &rt]
                        };
                        for t in counts {
                            if !t.is_unsigned() && !t.is_ideal() {
                                return Err(self.ctx.err(
                                    CheckErrorKind::SignedOperand { op: op.spelling() },
                                    span,
                                ));
                            }
                        }
                    }
                    mtype = if op.is_shift() {
                        match lt.num_kind() {
                            Some(kind) => Type::numeric(kind),
                            None => Type::Ideal,
                        }
                    } else {
                        common_numeric(&lt, &rt)
                    };
                    if let (Some(a), Some(b)) = (lhs.const_value(), rhs.const_value()) {
                        const_value = self.fold_binary(op, a, b, span)?;
                    }
                }
            }

            ExprKind::Assoc { op, operands } => {
                let op = *op;
                for operand in operands.iter_mut() {
                    self.check_expr(operand, depth + 1)?;
                }
                if matches!(op, AssocOp::And | AssocOp::Or) {
                    for operand in operands.iter() {
                        let t = self.type_of(operand)?;
                        if !t.is_bool() {
                            return Err(self.ctx.err(
                                CheckErrorKind::NotBool {
                                    what: "logical operand",
                                    found: self.ctx.type_name(t),
                                },
                                operand.span,
                            ));
                        }
                    }
                    mtype = Type::Bool;
                } else {
                    // All operands share one type after widening ideals.
                    let mut common = Type::Ideal;
                    for operand in operands.iter() {
                        let t = self.type_of(operand)?;
                        self.require_compatible_operands(op.binary(), &common, t, operand.span)?;
                        common = common_numeric(&common, t);
                    }
                    mtype = common;
                    let mut acc = operands[0].const_value().cloned();
                    for operand in &operands[1..] {
                        let (Some(a), Some(b)) = (acc.take(), operand.const_value()) else {
                            acc = None;
                            break;
                        };
                        acc = self.fold_binary(op.binary(), &a, b, span)?;
                    }
                    const_value = acc;
                }
            }

            ExprKind::As { value, target } => {
                self.check_expr(value, depth + 1)?;
                let target_type = resolve_type(self, target, 0)?;
                let vt = self.type_of(value)?;
                if !vt.is_numeric() || !matches!(target_type, Type::Numeric { .. }) {
                    return Err(self.ctx.err(
                        CheckErrorKind::InvalidConversion {
                            from: self.ctx.type_name(vt),
                            to: self.ctx.type_name(&target_type),
                        },
                        span,
                    ));
                }
                if let Some(v) = value.const_value() {
                    let range = target_type
                        .value_bounds()
                        .ok_or_else(|| self.internal("numeric type without bounds"))?;
                    if !range.contains(v) {
                        return Err(self.ctx.err(
                            CheckErrorKind::IntegerOverflow {
                                value: v.to_string(),
                                range: range.to_string(),
                            },
                            span,
                        ));
                    }
                    const_value = Some(v.clone());
                }
                mtype = target_type;
            }

            ExprKind::List(items) => {
                for item in items.iter_mut() {
                    self.check_expr(item, depth + 1)?;
                }
                // Placeholder: the constant-array checker types the whole.
                mtype = Type::Empty;
            }
        }

        e.set_mtype(mtype)?;
        if let Some(v) = const_value {
            // A folded constant is its own interval; constant contexts
            // never meet the prover, so the slot is filled here.
            e.merge_mbounds(crate::ast::Interval::point(v.clone()));
            e.set_const_value(v)?;
        }
        if global_ident {
            e.flags.global_ident = true;
        }
        Ok(())
    }

    /// Resolve a call's callee without typing the whole call; shared with
    /// the bounds prover, which needs parameter summaries again.
    pub fn resolve_callee(&self, callee: &Expr, span: Span) -> CheckResult<ResolvedCallee<'a>> {
        match &callee.kind {
            ExprKind::Ident(name) => {
                let qqid = Qqid::new(Symbol::EMPTY, Symbol::EMPTY, *name);
                self.ctx
                    .symbols
                    .funcs
                    .get(&qqid)
                    .map(ResolvedCallee::User)
                    .ok_or_else(|| {
                        let name = self.ctx.interner.resolve(*name).to_string();
                        let suggestion = find_similar(&name, self.ctx.interner.strings(), 2)
                            .map(String::from);
                        self.ctx
                            .err(CheckErrorKind::UnknownIdentifier { name, suggestion }, span)
                    })
            }
            ExprKind::Selector { recv, name } => {
                if let Some(pkg) = self.package_qualifier(recv) {
                    let qqid = Qqid::new(pkg, Symbol::EMPTY, *name);
                    return self
                        .ctx
                        .symbols
                        .funcs
                        .get(&qqid)
                        .map(ResolvedCallee::User)
                        .ok_or_else(|| {
                            self.ctx.err(
                                CheckErrorKind::UnknownIdentifier {
                                    name: qqid.display(self.ctx.interner),
                                    suggestion: None,
                                },
                                span,
                            )
                        });
                }
                let rt = self.type_of(recv)?.pierce_ptr();
                if let Some(func) = self.ctx.builtins.method(rt, *name) {
                    return Ok(ResolvedCallee::Builtin {
                        func,
                        elem: rt.elem().cloned(),
                    });
                }
                if let Type::Struct(qid) = rt {
                    let qqid = Qqid::new(qid.package, qid.name, *name);
                    if let Some(info) = self.ctx.symbols.funcs.get(&qqid) {
                        return Ok(ResolvedCallee::User(info));
                    }
                }
                Err(self.ctx.err(
                    CheckErrorKind::UnknownField {
                        receiver: self.ctx.type_name(rt),
                        name: self.ctx.interner.resolve(*name).to_string(),
                    },
                    span,
                ))
            }
            _ => Err(self
                .ctx
                .err(CheckErrorKind::NotCallable(self.ctx.render(callee)), span)),
        }
    }

    fn check_call(&self, e: &mut Expr, depth: usize) -> CheckResult<Type> {
        let span = e.span;
        let ExprKind::Call {
            callee,
            args,
            effect,
        } = &mut e.kind
        else {
            return Err(self.internal("check_call on a non-call node"));
        };

        // Type the callee's receiver chain first. The callee itself is a
        // name, not a value; its slot is set below from the resolution.
        if let ExprKind::Selector { recv, .. } = &mut callee.kind {
            if self.package_qualifier(recv).is_some() {
                recv.set_mtype(Type::Empty)?;
                recv.flags.global_ident = true;
            } else {
                self.check_expr(recv, depth + 1)?;
            }
        }

        let (declared, arg_sig, out, callee_type) = {
            let resolved = self.resolve_callee(callee, span)?;
            let recv_type = match &resolved {
                ResolvedCallee::User(f) if !f.qqid.receiver.is_empty() => {
                    Type::Struct(f.qqid.receiver_qid())
                }
                ResolvedCallee::User(_) => Type::Empty,
                ResolvedCallee::Builtin { .. } => match &callee.kind {
                    ExprKind::Selector { recv, .. } => {
                        self.type_of(recv)?.pierce_ptr().clone()
                    }
                    _ => Type::Empty,
                },
            };
            let name = match &callee.kind {
                ExprKind::Selector { name, .. } => *name,
                ExprKind::Ident(name) => *name,
                _ => Symbol::EMPTY,
            };
            (
                resolved.effect(),
                resolved.arg_types(),
                resolved.out_type(),
                Type::Func {
                    receiver: Rc::new(recv_type),
                    name,
                },
            )
        };
        callee.set_mtype(callee_type)?;

        // The call-site marker must match the declared effect exactly, and
        // the callee must not exceed the enclosing function's effect.
        if *effect != declared {
            let callee_name = self.ctx.render(callee);
            return Err(self.ctx.err(
                CheckErrorKind::EffectMarkerMismatch {
                    callee: callee_name,
                    declared: effect_name(declared),
                    marked: effect_name(*effect),
                },
                span,
            ));
        }
        if declared > self.func_effect {
            let callee_name = self.ctx.render(callee);
            return Err(self
                .ctx
                .err(CheckErrorKind::EffectExceedsCaller { callee: callee_name }, span));
        }

        if args.len() != arg_sig.len() {
            let callee_name = self.ctx.render(callee);
            return Err(self.ctx.err(
                CheckErrorKind::ArityMismatch {
                    callee: callee_name,
                    want: arg_sig.len(),
                    got: args.len(),
                },
                span,
            ));
        }
        for (arg, (want_name, want_type)) in args.iter_mut().zip(&arg_sig) {
            if arg.name != *want_name {
                let callee_name = self.ctx.render(callee);
                return Err(self.ctx.err(
                    CheckErrorKind::ArgNameMismatch {
                        callee: callee_name,
                        want: self.ctx.interner.resolve(*want_name).to_string(),
                        got: self.ctx.interner.resolve(arg.name).to_string(),
                    },
                    arg.value.span,
                ));
            }
            self.check_expr(&mut arg.value, depth + 1)?;
            let found = self.type_of(&arg.value)?;
            if !assignable(want_type, found) {
                return Err(self.ctx.err(
                    CheckErrorKind::IncompatibleAssignment {
                        expected: self.ctx.type_name(want_type),
                        found: self.ctx.type_name(found),
                    },
                    arg.value.span,
                ));
            }
        }

        Ok(out)
    }

    /// An `Ident` receiver that names a package rather than a value.
    pub fn package_qualifier(&self, recv: &Expr) -> Option<Symbol> {
        if let ExprKind::Ident(sym) = recv.kind {
            if self.local(sym).is_none() && self.ctx.symbols.has_package(sym) {
                return Some(sym);
            }
        }
        None
    }

    fn struct_info(&self, qid: Qid, span: Span) -> CheckResult<&'a crate::check::symbols::StructInfo> {
        self.ctx.symbols.structs.get(&qid).ok_or_else(|| {
            self.ctx.err(
                CheckErrorKind::UnknownType(qid.display(self.ctx.interner)),
                span,
            )
        })
    }

    /// The constant element list behind a named constant array, if that is
    /// what this expression is.
    fn const_list_of(&self, e: &Expr) -> Option<&'a Vec<BigInt>> {
        let qid = match &e.kind {
            ExprKind::Ident(sym) if self.local(*sym).is_none() => Qid::local(*sym),
            ExprKind::Selector { recv, name } => {
                let pkg = self.package_qualifier(recv)?;
                Qid::new(pkg, *name)
            }
            _ => return None,
        };
        match &self.ctx.symbols.consts.get(&qid)?.value {
            ConstVal::List(items) => Some(items),
            ConstVal::Scalar(_) => None,
        }
    }

    pub fn type_of<'e>(&self, e: &'e Expr) -> CheckResult<&'e Type> {
        e.mtype()
            .ok_or_else(|| self.internal("expression read before its type was assigned"))
    }

    pub fn internal(&self, message: &str) -> Fatal {
        crate::check::error::InternalError::new(message.to_string()).into()
    }

    fn require_compatible_operands(
        &self,
        op: BinaryOp,
        lt: &Type,
        rt: &Type,
        span: Span,
    ) -> CheckResult<()> {
        let ordered = matches!(
            op,
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        );
        let ok = if ordered || !matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
            // Arithmetic and ordered comparison: numeric, compatible.
            (lt.is_numeric() && rt.is_numeric())
                && (lt.is_ideal() || rt.is_ideal() || lt.eq_ignoring_refinements(rt))
        } else {
            // Equality: any compatible pair.
            lt.is_ideal() && rt.is_numeric()
                || rt.is_ideal() && lt.is_numeric()
                || lt.eq_ignoring_refinements(rt)
        };
        if ok {
            Ok(())
        } else {
            Err(self.ctx.err(
                CheckErrorKind::WrongOperandType {
                    op: op.spelling(),
                    found: format!("{} and {}", self.ctx.type_name(lt), self.ctx.type_name(rt)),
                },
                span,
            ))
        }
    }

    /// Constant folding; results stay arbitrary-precision until they meet a
    /// concrete type. Division by zero in a constant expression fails here.
    fn fold_binary(
        &self,
        op: BinaryOp,
        a: &BigInt,
        b: &BigInt,
        span: Span,
    ) -> CheckResult<Option<BigInt>> {
        use BinaryOp::*;
        let v = match op {
            Add | ModAdd | SatAdd => a + b,
            Sub | ModSub | SatSub => a - b,
            Mul | ModMul => a * b,
            Div => {
                if b.is_zero() {
                    return Err(self.ctx.err(CheckErrorKind::DivisionByZero, span));
                }
                a / b
            }
            Mod => {
                if b.is_zero() {
                    return Err(self.ctx.err(CheckErrorKind::DivisionByZero, span));
                }
                a % b
            }
            Shl | ModShl | Shr => {
                let ceiling = self.ctx.config.shift_ceiling as u64;
                let count = b.to_u64().filter(|&c| c <= ceiling).ok_or_else(|| {
                    self.ctx.err(
                        CheckErrorKind::ShiftOutOfRange {
                            count: b.to_string(),
                            ceiling,
                        },
                        span,
                    )
                })?;
                if op == Shr {
                    a >> count
                } else {
                    a << count
                }
            }
            BitAnd | BitOr | BitXor => {
                if a.is_negative() || b.is_negative() {
                    return Err(self
                        .ctx
                        .err(CheckErrorKind::SignedOperand { op: op.spelling() }, span));
                }
                match op {
                    BitAnd => a & b,
                    BitOr => a | b,
                    _ => a ^ b,
                }
            }
            // Comparisons and logicals do not fold to integers.
            _ => return Ok(None),
        };
        Ok(Some(v))
    }
}

fn effect_name(e: Effect) -> &'static str {
    match e {
        Effect::Pure => "pure",
        Effect::Impure => "impure (!)",
        Effect::Coroutine => "coroutine (?)",
    }
}

/// Is a value of type `found` acceptable where `target` is expected?
pub(crate) fn assignable(target: &Type, found: &Type) -> bool {
    if found.is_ideal() && matches!(target, Type::Numeric { .. }) {
        return true;
    }
    // `nullptr` fits any nullable pointer.
    if let (Type::Nptr(_), Type::Nptr(inner)) = (target, found) {
        if **inner == Type::Empty {
            return true;
        }
    }
    target.eq_ignoring_refinements(found)
}

/// Widen a pair of operand types to their common concrete type, or stay
/// ideal when both sides are.
fn common_numeric(a: &Type, b: &Type) -> Type {
    match (a, b) {
        (Type::Ideal, Type::Ideal) => Type::Ideal,
        (Type::Ideal, Type::Numeric { kind, .. })
        | (Type::Numeric { kind, .. }, _) => Type::numeric(*kind),
        _ => a.clone(),
    }
}

/// Parse a number literal spelling: decimal or `0x` hex, `_` separators.
pub(crate) fn parse_number(text: &str) -> Option<BigInt> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        BigInt::parse_bytes(hex.as_bytes(), 16)
    } else {
        BigInt::parse_bytes(cleaned.as_bytes(), 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_spellings() {
        assert_eq!(parse_number("255"), Some(BigInt::from(255)));
        assert_eq!(parse_number("0xFF"), Some(BigInt::from(255)));
        assert_eq!(parse_number("1_000"), Some(BigInt::from(1000)));
        assert_eq!(parse_number("0xZZ"), None);
    }

    #[test]
    fn ideal_widens_on_assignment() {
        use crate::ast::NumKind;
        let u8_ = Type::numeric(NumKind::U8);
        assert!(assignable(&u8_, &Type::Ideal));
        assert!(!assignable(&Type::Ideal, &u8_));
        assert!(!assignable(&u8_, &Type::numeric(NumKind::U16)));
    }

    #[test]
    fn nullptr_fits_any_nullable_pointer() {
        use crate::ast::NumKind;
        let nptr_u8 = Type::Nptr(Rc::new(Type::numeric(NumKind::U8)));
        let null = Type::Nptr(Rc::new(Type::Empty));
        assert!(assignable(&nptr_u8, &null));
        let ptr_u8 = Type::Ptr(Rc::new(Type::numeric(NumKind::U8)));
        assert!(!assignable(&ptr_u8, &null));
    }
}
