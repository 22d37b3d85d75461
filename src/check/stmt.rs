//! The statement typer.
//!
//! Walks a function body once, typing every expression, resolving jump
//! targets onto their loops, and enforcing the statement-level rules:
//! local uniqueness, assignment operator constraints, boolean effect-free
//! conditions, return/yield shapes, and io_bind scoping. The prover pass
//! runs afterwards over the same, now fully typed, body.

use std::collections::HashMap;

use crate::ast::{
    AssignOp, AssignStmt, Effect, ElseArm, Expr, ExprKind, IfStmt, IterateStmt, JumpKind,
    LoopId, RetKind, Stmt, StmtKind, Type, VarStmt, WhileStmt,
};
use crate::check::error::{CheckErrorKind, CheckResult};
use crate::check::expr::{assignable, Ctx, ExprTyper};
use crate::check::resolve::resolve_type;
use crate::intern::{Qid, Symbol};
use crate::token::Span;

/// One enclosing statement able to catch jumps, or an io_bind boundary
/// jumps and returns may not cross.
struct Frame {
    id: LoopId,
    label: Option<Symbol>,
    io_boundary: bool,
}

pub(crate) struct StmtTyper<'a> {
    pub ctx: Ctx<'a>,
    pub locals: HashMap<Symbol, Type>,
    pub receiver: Option<Qid>,
    pub effect: Effect,
    pub out: Type,
    frames: Vec<Frame>,
    /// Jump summary per loop id, committed onto the loop node afterwards.
    jumps: HashMap<LoopId, (bool, bool)>,
    depth: usize,
}

impl<'a> StmtTyper<'a> {
    pub fn new(
        ctx: Ctx<'a>,
        locals: HashMap<Symbol, Type>,
        receiver: Option<Qid>,
        effect: Effect,
        out: Type,
    ) -> Self {
        StmtTyper {
            ctx,
            locals,
            receiver,
            effect,
            out,
            frames: Vec::new(),
            jumps: HashMap::new(),
            depth: 0,
        }
    }

    fn etyper(&self) -> ExprTyper<'_> {
        ExprTyper {
            ctx: self.ctx,
            locals: Some(&self.locals),
            receiver: self.receiver,
            func_effect: self.effect,
        }
    }

    pub fn check_block(&mut self, block: &mut [Stmt]) -> CheckResult<()> {
        self.depth += 1;
        if self.depth > self.ctx.config.max_body_depth {
            let span = block.first().map(|s| s.span).unwrap_or_default();
            self.depth -= 1;
            return Err(self.ctx.err(CheckErrorKind::TooDeep("statement"), span));
        }
        let result = (|| {
            for stmt in block.iter_mut() {
                self.check_stmt(stmt)?;
            }
            Ok(())
        })();
        self.depth -= 1;
        result
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> CheckResult<()> {
        let span = stmt.span;
        match &mut stmt.kind {
            StmtKind::Var(VarStmt { typ, .. }) => {
                // Registered and resolved by the pre-scan.
                if typ.resolved().is_none() {
                    return Err(self
                        .etyper()
                        .internal("var statement escaped the local pre-scan"));
                }
                Ok(())
            }

            StmtKind::Assign(assign) => self.check_assign(assign, span),

            StmtKind::Expr(e) => {
                self.etyper().check_expr(e, 0)?;
                if !matches!(e.kind, ExprKind::Call { .. }) {
                    return Err(self
                        .ctx
                        .err(CheckErrorKind::NotCallable(self.ctx.render(e)), span));
                }
                Ok(())
            }

            StmtKind::If(ifs) => self.check_if(ifs),

            StmtKind::While(w) => self.check_while(w),

            StmtKind::Iterate(it) => self.check_iterate(it, span),

            StmtKind::Jump(jump) => {
                let mut target = None;
                for frame in self.frames.iter().rev() {
                    if frame.io_boundary {
                        if target.is_none() {
                            return Err(self.ctx.err(CheckErrorKind::JumpOutOfIoBind, span));
                        }
                        break;
                    }
                    match jump.label {
                        None => {
                            target = Some(frame.id);
                            break;
                        }
                        Some(l) if frame.label == Some(l) => {
                            target = Some(frame.id);
                            break;
                        }
                        Some(_) => continue,
                    }
                }
                let Some(id) = target else {
                    return Err(self.ctx.err(CheckErrorKind::NoMatchingLoop, span));
                };
                jump.set_jump_target(id);
                let entry = self.jumps.entry(id).or_insert((false, false));
                match jump.kind {
                    JumpKind::Break => entry.0 = true,
                    JumpKind::Continue => entry.1 = true,
                }
                Ok(())
            }

            StmtKind::Ret(ret) => {
                if self.frames.iter().any(|f| f.io_boundary) {
                    return Err(self.ctx.err(CheckErrorKind::ReturnOutOfIoBind, span));
                }
                if ret.kind == RetKind::Yield && self.effect != Effect::Coroutine {
                    return Err(self.ctx.err(CheckErrorKind::YieldOutsideCoroutine, span));
                }
                match &mut ret.value {
                    Some(value) => {
                        self.etyper().check_expr(value, 0)?;
                        let vt = self.etyper().type_of(value)?.clone();
                        let ok = match ret.kind {
                            // A coroutine may return or yield a status in
                            // place of its declared output.
                            RetKind::Return => {
                                assignable(&self.out, &vt)
                                    || (self.effect == Effect::Coroutine && vt.is_status())
                            }
                            RetKind::Yield => vt.is_status(),
                        };
                        if !ok {
                            let expected = if ret.kind == RetKind::Yield {
                                Type::Status
                            } else {
                                self.out.clone()
                            };
                            return Err(self.ctx.err(
                                CheckErrorKind::ReturnTypeMismatch {
                                    expected: self.ctx.type_name(&expected),
                                    found: self.ctx.type_name(&vt),
                                },
                                span,
                            ));
                        }
                    }
                    None => {
                        if ret.kind == RetKind::Return && self.out != Type::Empty {
                            return Err(self.ctx.err(
                                CheckErrorKind::ReturnTypeMismatch {
                                    expected: self.ctx.type_name(&self.out),
                                    found: "nothing".to_string(),
                                },
                                span,
                            ));
                        }
                    }
                }
                Ok(())
            }

            StmtKind::Assert(a) => {
                self.check_condition(&mut a.cond, "assert condition")?;
                for arg in &mut a.args {
                    self.etyper().check_expr(&mut arg.value, 0)?;
                }
                Ok(())
            }

            StmtKind::IoBind(b) => {
                self.etyper().check_expr(&mut b.io, 0)?;
                let it = self.etyper().type_of(&b.io)?.clone();
                if !matches!(it, Type::IoReader | Type::IoWriter) {
                    return Err(self.ctx.err(
                        CheckErrorKind::WrongOperandType {
                            op: "io_bind",
                            found: self.ctx.type_name(&it),
                        },
                        b.io.span,
                    ));
                }
                self.etyper().check_expr(&mut b.limit, 0)?;
                let lt = self.etyper().type_of(&b.limit)?.clone();
                if !lt.is_numeric() {
                    return Err(self.ctx.err(
                        CheckErrorKind::WrongOperandType {
                            op: "io_bind limit",
                            found: self.ctx.type_name(&lt),
                        },
                        b.limit.span,
                    ));
                }
                self.frames.push(Frame {
                    id: u32::MAX,
                    label: None,
                    io_boundary: true,
                });
                let result = self.check_block(&mut b.body);
                self.frames.pop();
                result
            }
        }
    }

    fn check_assign(&mut self, assign: &mut AssignStmt, span: Span) -> CheckResult<()> {
        // RHS first, then LHS.
        self.etyper().check_expr(&mut assign.rhs, 0)?;
        self.etyper().check_expr(&mut assign.lhs, 0)?;

        if !is_assignable_place(&assign.lhs) {
            return Err(self.ctx.err(
                CheckErrorKind::NotAssignable(self.ctx.render(&assign.lhs)),
                assign.lhs.span,
            ));
        }

        let lt = self.etyper().type_of(&assign.lhs)?.clone();
        let rt = self.etyper().type_of(&assign.rhs)?.clone();
        let rhs_effect = assign.rhs.max_effect();

        match assign.op {
            AssignOp::Eq => {
                if rhs_effect == Effect::Coroutine {
                    return Err(self.ctx.err(
                        CheckErrorKind::EffectMarkerMismatch {
                            callee: self.ctx.render(&assign.rhs),
                            declared: "coroutine (?)",
                            marked: "plain assignment; use =?",
                        },
                        span,
                    ));
                }
                if !assignable(&lt, &rt) {
                    return Err(self.ctx.err(
                        CheckErrorKind::IncompatibleAssignment {
                            expected: self.ctx.type_name(&lt),
                            found: self.ctx.type_name(&rt),
                        },
                        span,
                    ));
                }
            }
            AssignOp::EqQuestion => {
                if !matches!(
                    assign.rhs.kind,
                    ExprKind::Call {
                        effect: Effect::Coroutine,
                        ..
                    }
                ) {
                    return Err(self.ctx.err(
                        CheckErrorKind::EffectMarkerMismatch {
                            callee: self.ctx.render(&assign.rhs),
                            declared: "=? needs a coroutine call",
                            marked: "non-suspending expression",
                        },
                        span,
                    ));
                }
                if !assignable(&lt, &rt) {
                    return Err(self.ctx.err(
                        CheckErrorKind::IncompatibleAssignment {
                            expected: self.ctx.type_name(&lt),
                            found: self.ctx.type_name(&rt),
                        },
                        span,
                    ));
                }
            }
            op => {
                // Compound assignment behaves like `lhs = lhs op rhs`.
                if rhs_effect == Effect::Coroutine {
                    return Err(self.ctx.err(
                        CheckErrorKind::EffectMarkerMismatch {
                            callee: self.ctx.render(&assign.rhs),
                            declared: "coroutine (?)",
                            marked: "compound assignment",
                        },
                        span,
                    ));
                }
                if !lt.is_numeric() || lt.is_ideal() {
                    return Err(self.ctx.err(
                        CheckErrorKind::WrongOperandType {
                            op: op.spelling(),
                            found: self.ctx.type_name(&lt),
                        },
                        span,
                    ));
                }
                if op.requires_unsigned() && !lt.is_unsigned() {
                    return Err(self
                        .ctx
                        .err(CheckErrorKind::SignedOperand { op: op.spelling() }, span));
                }
                let compatible = if op.is_shift() {
                    // Shift counts may have their own width.
                    rt.is_numeric()
                } else {
                    rt.is_ideal() || lt.eq_ignoring_refinements(&rt)
                };
                if !compatible {
                    return Err(self.ctx.err(
                        CheckErrorKind::IncompatibleAssignment {
                            expected: self.ctx.type_name(&lt),
                            found: self.ctx.type_name(&rt),
                        },
                        span,
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_condition(&mut self, cond: &mut Expr, what: &'static str) -> CheckResult<()> {
        self.etyper().check_expr(cond, 0)?;
        let t = self.etyper().type_of(cond)?;
        if !t.is_bool() {
            let found = self.ctx.type_name(t);
            return Err(self
                .ctx
                .err(CheckErrorKind::NotBool { what, found }, cond.span));
        }
        if cond.max_effect() != Effect::Pure {
            return Err(self.ctx.err(CheckErrorKind::ConditionHasEffect, cond.span));
        }
        Ok(())
    }

    fn check_if(&mut self, ifs: &mut IfStmt) -> CheckResult<()> {
        self.check_condition(&mut ifs.cond, "if condition")?;
        self.check_block(&mut ifs.then_block)?;
        match &mut ifs.else_arm {
            ElseArm::None => Ok(()),
            ElseArm::ElseIf(next) => self.check_if(next),
            ElseArm::Block(block) => self.check_block(block),
        }
    }

    fn check_while(&mut self, w: &mut WhileStmt) -> CheckResult<()> {
        self.check_condition(&mut w.cond, "while condition")?;
        for a in &mut w.asserts {
            self.check_condition(&mut a.cond, "loop clause")?;
            for arg in &mut a.args {
                self.etyper().check_expr(&mut arg.value, 0)?;
            }
        }
        self.frames.push(Frame {
            id: w.loop_id,
            label: w.label,
            io_boundary: false,
        });
        let result = self.check_block(&mut w.body);
        self.frames.pop();
        result?;
        let (has_break, has_continue) =
            self.jumps.get(&w.loop_id).copied().unwrap_or((false, false));
        w.has_break = has_break;
        w.has_continue = has_continue;
        Ok(())
    }

    fn check_iterate(&mut self, it: &mut IterateStmt, span: Span) -> CheckResult<()> {
        self.etyper().check_expr(&mut it.source, 0)?;
        let st = self.etyper().type_of(&it.source)?.clone();
        let Type::Slice(elem) = &st else {
            return Err(self
                .ctx
                .err(CheckErrorKind::NotIndexable(self.ctx.type_name(&st)), span));
        };
        // The iterate binding becomes visible here; the pre-scan has
        // already rejected name collisions.
        self.locals.insert(it.var, (**elem).clone());

        for a in &mut it.asserts {
            self.check_condition(&mut a.cond, "loop clause")?;
            for arg in &mut a.args {
                self.etyper().check_expr(&mut arg.value, 0)?;
            }
        }
        self.frames.push(Frame {
            id: it.loop_id,
            label: it.label,
            io_boundary: false,
        });
        let result = self.check_block(&mut it.body);
        self.frames.pop();
        result?;
        let (has_break, has_continue) =
            self.jumps.get(&it.loop_id).copied().unwrap_or((false, false));
        it.has_break = has_break;
        it.has_continue = has_continue;
        Ok(())
    }
}

/// Only variables, fields and elements can be written.
fn is_assignable_place(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Ident(_) => !e.flags.global_ident,
        ExprKind::Selector { recv, .. } => is_assignable_place_or_this(recv),
        ExprKind::Index { recv, .. } => is_assignable_place_or_this(recv),
        _ => false,
    }
}

fn is_assignable_place_or_this(e: &Expr) -> bool {
    matches!(e.kind, ExprKind::This) || is_assignable_place(e)
}

/// Collect every local declared anywhere in the body (forward references
/// are allowed), resolving `var` types and rejecting duplicates. Iterate
/// bindings claim their name here; their type is known once the source
/// expression is typed.
pub(crate) fn collect_locals(
    ctx: Ctx<'_>,
    receiver: Option<Qid>,
    args: &[(Symbol, Type)],
    body: &mut [Stmt],
) -> CheckResult<HashMap<Symbol, Type>> {
    let mut locals: HashMap<Symbol, Type> = args.iter().cloned().collect();
    let mut claimed: Vec<Symbol> = args.iter().map(|(n, _)| *n).collect();

    fn claim(
        ctx: Ctx<'_>,
        claimed: &mut Vec<Symbol>,
        name: Symbol,
        span: Span,
    ) -> CheckResult<()> {
        if claimed.contains(&name) {
            return Err(ctx.err(
                CheckErrorKind::DuplicateLocal(ctx.interner.resolve(name).to_string()),
                span,
            ));
        }
        claimed.push(name);
        Ok(())
    }

    fn walk(
        ctx: Ctx<'_>,
        receiver: Option<Qid>,
        locals: &mut HashMap<Symbol, Type>,
        claimed: &mut Vec<Symbol>,
        block: &mut [Stmt],
    ) -> CheckResult<()> {
        for stmt in block.iter_mut() {
            let span = stmt.span;
            match &mut stmt.kind {
                StmtKind::Var(VarStmt { name, typ }) => {
                    claim(ctx, claimed, *name, span)?;
                    let typer = ExprTyper {
                        ctx,
                        locals: None,
                        receiver,
                        func_effect: Effect::Pure,
                    };
                    let t = resolve_type(&typer, typ, 0)?;
                    locals.insert(*name, t);
                }
                StmtKind::If(ifs) => {
                    walk(ctx, receiver, locals, claimed, &mut ifs.then_block)?;
                    let mut arm = &mut ifs.else_arm;
                    loop {
                        match arm {
                            ElseArm::None => break,
                            ElseArm::Block(b) => {
                                walk(ctx, receiver, locals, claimed, b)?;
                                break;
                            }
                            ElseArm::ElseIf(next) => {
                                walk(ctx, receiver, locals, claimed, &mut next.then_block)?;
                                arm = &mut next.else_arm;
                            }
                        }
                    }
                }
                StmtKind::While(w) => walk(ctx, receiver, locals, claimed, &mut w.body)?,
                StmtKind::Iterate(it) => {
                    claim(ctx, claimed, it.var, span)?;
                    walk(ctx, receiver, locals, claimed, &mut it.body)?;
                }
                StmtKind::IoBind(b) => walk(ctx, receiver, locals, claimed, &mut b.body)?,
                _ => {}
            }
        }
        Ok(())
    }

    walk(ctx, receiver, &mut locals, &mut claimed, body)?;
    Ok(locals)
}
