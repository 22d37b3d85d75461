//! The bounds prover.
//!
//! Second walk over a typed function body. Computes a value interval for
//! every expression, discharges the safety obligations (indexing, overflow,
//! division, shifts, conversions, I/O availability), maintains the fact
//! set across statements and branches, and proves assertions, loop clauses
//! and contracts. Interval slots widen when a node is revisited from a
//! second program point; every visit's obligation has already been
//! discharged under that visit's facts.

use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};

use crate::ast::{
    block_terminates, Assertion, AssignOp, AssignStmt, BinaryOp, Effect, ElseArm, Expr,
    ExprKind, IfStmt, Interval, IterateStmt, JumpKind, Lit, LoopId, RetKind, Stmt, StmtKind,
    Type, UnaryOp, WhileStmt,
};
use crate::check::error::{CheckError, CheckErrorKind, CheckResult, Fatal};
use crate::check::expr::{Ctx, ExprTyper, ResolvedCallee};
use crate::check::facts::{binary_fact, const_expr, Fact, Facts};
use crate::check::reasons::{apply_reason, ReasonSchema};
use crate::check::symbols::FuncInfo;
use crate::intern::{Qid, Symbol};
use crate::token::Span;

/// Loop clauses held open while the body is walked, so jumps can prove
/// against their target loop.
struct LoopFrame {
    id: LoopId,
    pre: Vec<Assertion>,
    inv: Vec<Assertion>,
    post: Vec<Assertion>,
}

pub(crate) struct BoundsChecker<'a> {
    ctx: Ctx<'a>,
    locals: &'a HashMap<Symbol, Type>,
    receiver: Option<Qid>,
    effect: Effect,
    schemas: &'a [ReasonSchema],
    postconds: &'a [Fact],
    out_bounds: Option<Interval>,
    facts: Facts,
    frames: Vec<LoopFrame>,
}

impl<'a> BoundsChecker<'a> {
    pub fn new(
        ctx: Ctx<'a>,
        locals: &'a HashMap<Symbol, Type>,
        receiver: Option<Qid>,
        effect: Effect,
        schemas: &'a [ReasonSchema],
        info: &'a FuncInfo,
    ) -> Self {
        let mut facts = Facts::new();
        for pre in &info.preconds {
            facts.append(pre.clone());
        }
        BoundsChecker {
            ctx,
            locals,
            receiver,
            effect,
            schemas,
            postconds: &info.postconds,
            out_bounds: info.out.value_bounds(),
            facts,
            frames: Vec::new(),
        }
    }

    fn etyper(&self) -> ExprTyper<'a> {
        ExprTyper {
            ctx: self.ctx,
            locals: Some(self.locals),
            receiver: self.receiver,
            func_effect: self.effect,
        }
    }

    /// A user error carrying the current fact set.
    fn err(&self, kind: CheckErrorKind, span: Span) -> Fatal {
        CheckError::new(kind, self.ctx.path, span)
            .with_facts(self.facts.render(self.ctx.interner))
            .into()
    }

    pub fn check_func(&mut self, body: &mut [Stmt]) -> CheckResult<()> {
        self.check_block(body)?;
        if !block_terminates(body) {
            self.prove_postconds(body.last().map(|s| s.span).unwrap_or_default())?;
        }
        Ok(())
    }

    fn check_block(&mut self, block: &mut [Stmt]) -> CheckResult<()> {
        for stmt in block.iter_mut() {
            let terminates = match &stmt.kind {
                StmtKind::Jump(_) => true,
                StmtKind::Ret(r) => r.kind == RetKind::Return,
                _ => false,
            };
            self.check_stmt(stmt)?;
            if terminates {
                // Anything after an unconditional jump is unreachable.
                break;
            }
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> CheckResult<()> {
        let span = stmt.span;
        match &mut stmt.kind {
            StmtKind::Var(_) => Ok(()),

            StmtKind::Assign(assign) => self.check_assign(assign, span),

            StmtKind::Expr(e) => {
                self.bexpr(e, 0)?;
                Ok(())
            }

            StmtKind::If(ifs) => {
                let before = self.facts.snapshot();
                let mut branches = Vec::new();
                self.check_if(ifs, before, &mut branches)?;
                self.facts.reconcile(branches);
                Ok(())
            }

            StmtKind::While(w) => self.check_while(w),

            StmtKind::Iterate(it) => self.check_iterate(it),

            StmtKind::Jump(jump) => {
                let Some(id) = jump.jump_target() else {
                    return Err(self
                        .etyper()
                        .internal("jump left untargeted by the statement typer"));
                };
                let clauses: Vec<Assertion> = {
                    let Some(frame) = self.frames.iter().find(|f| f.id == id) else {
                        return Err(self.etyper().internal("jump targets a loop not on the stack"));
                    };
                    match jump.kind {
                        JumpKind::Break => frame.post.clone(),
                        JumpKind::Continue => {
                            frame.pre.iter().chain(frame.inv.iter()).cloned().collect()
                        }
                    }
                };
                for clause in &clauses {
                    self.prove_clause(clause, span)?;
                }
                Ok(())
            }

            StmtKind::Ret(ret) => {
                if let Some(value) = &mut ret.value {
                    let vi = self.bexpr(value, 0)?;
                    // A numeric output's declared range is an obligation.
                    if self.etyper().type_of(value)?.is_numeric() {
                        if let Some(out_bounds) = &self.out_bounds {
                            self.require_fits(value, &vi, &out_bounds.clone())?;
                        }
                    }
                }
                if ret.kind == RetKind::Return {
                    self.prove_postconds(span)?;
                } else {
                    // Suspension: resume invalidates anything reachable
                    // through pointers.
                    self.facts.drop_suspension_sensitive(self.locals);
                }
                Ok(())
            }

            StmtKind::Assert(a) => self.prove_assertion(a),

            StmtKind::IoBind(b) => {
                self.bexpr(&mut b.io, 0)?;
                self.bexpr(&mut b.limit, 0)?;
                // The body sees a rebound pair; old I/O facts do not carry
                // in, and none carry back out.
                self.facts.drop_suspension_sensitive(self.locals);
                self.check_block(&mut b.body)?;
                self.facts.drop_suspension_sensitive(self.locals);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn check_assign(&mut self, assign: &mut AssignStmt, span: Span) -> CheckResult<()> {
        let ri = self.bexpr(&mut assign.rhs, 0)?;
        let li = self.bexpr(&mut assign.lhs, 0)?;

        let lhs_type = self.etyper().type_of(&assign.lhs)?.clone();
        let lhs_bounds = lhs_type.value_bounds();

        match assign.op {
            AssignOp::Eq | AssignOp::EqQuestion => {
                if let Some(bounds) = &lhs_bounds {
                    self.require_fits(&assign.rhs, &ri, bounds)?;
                }
            }
            op => {
                let bop = op
                    .binary_op()
                    .ok_or_else(|| self.etyper().internal("compound assign without operator"))?;
                let result = self.op_interval(
                    bop,
                    &assign.lhs,
                    &li,
                    &assign.rhs,
                    &ri,
                    &lhs_type,
                    span,
                )?;
                if !bop.is_modulating() {
                    if let Some(bounds) = &lhs_bounds {
                        if !result.is_sub_of(bounds) {
                            return Err(self.err(
                                CheckErrorKind::IntegerOverflow {
                                    value: result.to_string(),
                                    range: bounds.to_string(),
                                },
                                span,
                            ));
                        }
                    }
                }
            }
        }

        // Facts must not survive the mutation they describe.
        match root_place(&assign.lhs) {
            Place::Local(x) => match assign.op {
                AssignOp::Eq => {
                    self.facts.drop_mentioning(x);
                    if assign.rhs.max_effect() == Effect::Pure && !assign.rhs.mentions(x) {
                        self.facts.append(binary_fact(
                            BinaryOp::Eq,
                            assign.lhs.clone(),
                            assign.rhs.clone(),
                        ));
                    }
                }
                AssignOp::Add | AssignOp::Sub => {
                    if let Some(c) = assign.rhs.const_value().cloned() {
                        self.facts
                            .shift_mentioning(x, &c, assign.op == AssignOp::Sub);
                    } else {
                        self.facts.drop_mentioning(x);
                    }
                }
                AssignOp::EqQuestion => {
                    self.facts.drop_mentioning(x);
                    self.facts.drop_suspension_sensitive(self.locals);
                }
                _ => self.facts.drop_mentioning(x),
            },
            Place::This => {
                self.facts.update(|fact| {
                    if fact.mentions_this() {
                        crate::check::facts::Update::Drop
                    } else {
                        crate::check::facts::Update::Keep
                    }
                });
            }
            Place::Opaque => self.facts.clear(),
        }
        Ok(())
    }

    fn check_if(
        &mut self,
        ifs: &mut IfStmt,
        before: Vec<Fact>,
        branches: &mut Vec<Vec<Fact>>,
    ) -> CheckResult<()> {
        self.facts.restore(before.clone());
        self.bexpr(&mut ifs.cond, 0)?;

        // Then-branch: the condition is known.
        self.facts.restore(before.clone());
        self.facts.append(Rc::new(ifs.cond.clone()));
        self.check_block(&mut ifs.then_block)?;
        if !block_terminates(&ifs.then_block) {
            branches.push(self.facts.snapshot());
        }

        // Else-path: the negation is known, when it is expressible.
        let mut else_start = before.clone();
        if let Some(neg) = negate_expr(&ifs.cond) {
            self.facts.restore(before);
            self.facts.append(Rc::new(neg));
            else_start = self.facts.snapshot();
        }

        match &mut ifs.else_arm {
            ElseArm::None => {
                branches.push(else_start);
            }
            ElseArm::Block(block) => {
                self.facts.restore(else_start);
                self.check_block(block)?;
                if !block_terminates(block) {
                    branches.push(self.facts.snapshot());
                }
            }
            ElseArm::ElseIf(next) => {
                self.check_if(next, else_start, branches)?;
            }
        }
        Ok(())
    }

    fn loop_clause_sets(asserts: &[Assertion]) -> (Vec<Assertion>, Vec<Assertion>, Vec<Assertion>) {
        let mut pre = Vec::new();
        let mut inv = Vec::new();
        let mut post = Vec::new();
        for a in asserts {
            match a.kind {
                crate::ast::AssertKind::Pre => pre.push(a.clone()),
                crate::ast::AssertKind::Inv | crate::ast::AssertKind::Assert => {
                    inv.push(a.clone())
                }
                crate::ast::AssertKind::Post => post.push(a.clone()),
            }
        }
        (pre, inv, post)
    }

    fn check_while(&mut self, w: &mut WhileStmt) -> CheckResult<()> {
        // Entry: annotate and prove the pre and invariant clauses under the
        // facts flowing in.
        for a in &mut w.asserts {
            self.bexpr(&mut a.cond, 0)?;
            for arg in &mut a.args {
                self.bexpr(&mut arg.value, 0)?;
            }
        }
        let (pre, inv, post) = Self::loop_clause_sets(&w.asserts);
        for clause in pre.iter().chain(inv.iter()) {
            self.prove_clause(clause, clause.span)?;
        }

        // The body starts from the clauses alone: facts proven before the
        // loop do not survive an arbitrary number of iterations.
        self.facts.clear();
        for clause in pre.iter().chain(inv.iter()) {
            self.facts.append(Rc::new(clause.cond.clone()));
        }
        self.bexpr(&mut w.cond, 0)?;
        let cond_const_true = matches!(w.cond.kind, ExprKind::Literal(Lit::Bool(true)));
        if !matches!(w.cond.kind, ExprKind::Literal(_)) {
            self.facts.append(Rc::new(w.cond.clone()));
        }

        self.frames.push(LoopFrame {
            id: w.loop_id,
            pre: pre.clone(),
            inv: inv.clone(),
            post: post.clone(),
        });
        let body_result = self.check_block(&mut w.body);
        self.frames.pop();
        body_result?;

        // Falling off the body's end re-enters the loop head.
        if !block_terminates(&w.body) {
            let end_span = w.body.last().map(|s| s.span).unwrap_or(w.cond.span);
            for clause in pre.iter().chain(inv.iter()) {
                self.prove_clause(clause, end_span)?;
            }
        }

        // Natural exit: the condition went false under the invariants.
        if !cond_const_true {
            self.facts.clear();
            for clause in &inv {
                self.facts.append(Rc::new(clause.cond.clone()));
            }
            if let Some(neg) = negate_expr(&w.cond) {
                self.facts.append(Rc::new(neg));
            }
            for clause in &post {
                self.prove_clause(clause, clause.span)?;
            }
        }

        // After the loop: invariants and postconditions hold; the negated
        // condition only if no break bypassed it.
        self.facts.clear();
        for clause in inv.iter().chain(post.iter()) {
            self.facts.append(Rc::new(clause.cond.clone()));
        }
        if !w.has_break && !cond_const_true {
            if let Some(neg) = negate_expr(&w.cond) {
                self.facts.append(Rc::new(neg));
            }
        }
        Ok(())
    }

    fn check_iterate(&mut self, it: &mut IterateStmt) -> CheckResult<()> {
        self.bexpr(&mut it.source, 0)?;
        for a in &mut it.asserts {
            self.bexpr(&mut a.cond, 0)?;
            for arg in &mut a.args {
                self.bexpr(&mut arg.value, 0)?;
            }
        }
        let (pre, inv, post) = Self::loop_clause_sets(&it.asserts);
        for clause in pre.iter().chain(inv.iter()) {
            self.prove_clause(clause, clause.span)?;
        }

        // The element binding changes every round; nothing from outside
        // the loop is carried in or out.
        self.facts.clear();
        for clause in pre.iter().chain(inv.iter()) {
            self.facts.append(Rc::new(clause.cond.clone()));
        }

        self.frames.push(LoopFrame {
            id: it.loop_id,
            pre: pre.clone(),
            inv: inv.clone(),
            post: post.clone(),
        });
        let body_result = self.check_block(&mut it.body);
        self.frames.pop();
        body_result?;

        if !block_terminates(&it.body) {
            let end_span = it.body.last().map(|s| s.span).unwrap_or(it.source.span);
            for clause in pre.iter().chain(inv.iter()) {
                self.prove_clause(clause, end_span)?;
            }
        }

        self.facts.clear();
        for clause in inv.iter().chain(post.iter()) {
            self.facts.append(Rc::new(clause.cond.clone()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Assertions and proving
    // ------------------------------------------------------------------

    fn prove_assertion(&mut self, a: &mut Assertion) -> CheckResult<()> {
        self.bexpr(&mut a.cond, 0)?;
        for arg in &mut a.args {
            self.bexpr(&mut arg.value, 0)?;
        }
        self.prove_clause(a, a.span)?;
        self.facts.append(Rc::new(a.cond.clone()));
        Ok(())
    }

    /// Prove one already-annotated clause, through its reason if it names
    /// one, otherwise directly against the fact set.
    fn prove_clause(&self, a: &Assertion, span: Span) -> CheckResult<()> {
        if let Some(reason) = a.reason {
            let text = self.ctx.interner.resolve(reason).to_string();
            return apply_reason(
                self.schemas,
                &text,
                &a.cond,
                &a.args,
                self.ctx.interner,
                self.ctx.path,
                span,
                |op, lhs, rhs| self.prove_binary_op(op, lhs, rhs),
            )
            .map_err(|e| self.attach_facts(e));
        }
        if self.prove_expr(&a.cond) {
            Ok(())
        } else {
            Err(self.err(
                CheckErrorKind::CannotProve(self.ctx.render(&a.cond)),
                span,
            ))
        }
    }

    fn attach_facts(&self, fatal: Fatal) -> Fatal {
        match fatal {
            Fatal::Check(mut e) => {
                e.facts = self.facts.render(self.ctx.interner);
                Fatal::Check(e)
            }
            other => other,
        }
    }

    fn prove_postconds(&self, span: Span) -> CheckResult<()> {
        for post in self.postconds {
            if !self.prove_expr(post) {
                return Err(self.err(
                    CheckErrorKind::CannotProve(self.ctx.render(post)),
                    span,
                ));
            }
        }
        Ok(())
    }

    /// Prove an arbitrary boolean predicate from the fact set.
    fn prove_expr(&self, cond: &Expr) -> bool {
        if self.facts.contains(cond) {
            return true;
        }
        match &cond.kind {
            ExprKind::Literal(Lit::Bool(true)) => true,
            ExprKind::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => self.prove_expr(lhs) && self.prove_expr(rhs),
            ExprKind::Assoc {
                op: crate::ast::AssocOp::And,
                operands,
            } => operands.iter().all(|o| self.prove_expr(o)),
            ExprKind::Binary { op, lhs, rhs } if op.is_comparison() => {
                self.prove_binary_op(*op, lhs, rhs)
            }
            _ => false,
        }
    }

    /// The interval an expression can hold right now: a constant is its
    /// point, anything else is its type range refined by the facts in
    /// scope. Node slots are not consulted; they record the interval at
    /// the annotation site, which may lie before a mutation.
    fn current_interval(&self, e: &Expr) -> Option<Interval> {
        if let Some(v) = e.const_value() {
            return Some(Interval::point(v.clone()));
        }
        let bounds = e.mtype()?.value_bounds()?;
        self.facts.refine(e, bounds).ok()
    }

    /// The prover's relation entry point: `lhs op rhs` holds if constants
    /// decide it, intervals separate the sides, a structurally equal fact
    /// with an equal-or-stronger operator exists, or an equality on `lhs`
    /// pins it to a comparable constant.
    pub(crate) fn prove_binary_op(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> bool {
        if let (Some(a), Some(b)) = (lhs.const_value(), rhs.const_value()) {
            return eval_comparison(op, a, b);
        }

        if let (Some(a), Some(b)) = (self.current_interval(lhs), self.current_interval(rhs)) {
            let separated = match op {
                BinaryOp::Lt => a.hi < b.lo,
                BinaryOp::LtEq => a.hi <= b.lo,
                BinaryOp::Gt => a.lo > b.hi,
                BinaryOp::GtEq => a.lo >= b.hi,
                BinaryOp::NotEq => a.hi < b.lo || a.lo > b.hi,
                BinaryOp::Eq => a.lo == a.hi && b.lo == b.hi && a.lo == b.lo,
                _ => false,
            };
            if separated {
                return true;
            }
        }

        for fact in self.facts.iter() {
            let ExprKind::Binary {
                op: fop,
                lhs: fl,
                rhs: fr,
            } = &fact.kind
            else {
                continue;
            };
            if fl.eq_structural(lhs) && fr.eq_structural(rhs) && implies(*fop, op) {
                return true;
            }
            if let Some(flipped) = fop.flipped() {
                if fl.eq_structural(rhs) && fr.eq_structural(lhs) && implies(flipped, op) {
                    return true;
                }
            }
            // An equality pinning lhs to a constant decides the relation
            // against a constant rhs directly.
            if *fop == BinaryOp::Eq && fl.eq_structural(lhs) {
                if let (Some(c), Some(b)) = (fr.const_value(), rhs.const_value()) {
                    if eval_comparison(op, c, b) {
                        return true;
                    }
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Compute (and record) the value interval of an expression.
    fn bexpr(&mut self, e: &mut Expr, depth: usize) -> CheckResult<Interval> {
        if depth > self.ctx.config.max_expr_depth {
            return Err(self.err(CheckErrorKind::TooDeep("expression"), e.span));
        }
        if matches!(e.kind, ExprKind::Call { .. }) {
            return self.bcall(e, depth);
        }
        let span = e.span;
        let node_type = e.mtype().cloned();

        // A folded constant is its own interval; children still get their
        // annotations.
        let interval = match &mut e.kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::This => {
                self.leaf_interval(e)?
            }

            ExprKind::Selector { recv, .. } => {
                self.bexpr(recv, depth + 1)?;
                self.typed_interval(e)?
            }

            ExprKind::Index { recv, index } => {
                self.bexpr(recv, depth + 1)?;
                let ii = self.bexpr(index, depth + 1)?;
                let length = self.length_of(recv)?;
                self.require_index(index, &ii, &length, span)?;
                // Interval proof alone means the emitted code needs no
                // runtime residue at all.
                if ii.lo >= BigInt::zero() {
                    if let Some(len) = length.const_value() {
                        if &ii.hi < len {
                            e.flags.bounds_check_optimized = true;
                        }
                    }
                }
                self.typed_interval(e)?
            }

            ExprKind::SliceOf { recv, lo, hi } => {
                self.bexpr(recv, depth + 1)?;
                let length = self.length_of(recv)?;
                let li = match lo {
                    Some(lo) => Some(self.bexpr(lo, depth + 1)?),
                    None => None,
                };
                let hi_i = match hi {
                    Some(hi) => Some(self.bexpr(hi, depth + 1)?),
                    None => None,
                };
                self.require_slice(lo.as_deref(), li, hi.as_deref(), hi_i, &length, span)?;
                Interval::new(BigInt::zero(), BigInt::zero())
            }

            ExprKind::Call { .. } => {
                // Dispatched above, before the kind was borrowed.
                return Err(self.etyper().internal("call expression reached the leaf matcher"));
            }

            ExprKind::Unary { op, operand } => {
                let oi = self.bexpr(operand, depth + 1)?;
                match op {
                    UnaryOp::Not => Interval::new(BigInt::zero(), BigInt::one()),
                    UnaryOp::Pos => oi,
                    UnaryOp::Neg => Interval::new(-oi.hi, -oi.lo),
                }
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let li = self.bexpr(lhs, depth + 1)?;
                let ri = self.bexpr(rhs, depth + 1)?;
                if op.is_comparison() || op.is_logical() {
                    Interval::new(BigInt::zero(), BigInt::one())
                } else {
                    let result_type = node_type
                        .clone()
                        .ok_or_else(|| self.etyper().internal("operator left untyped"))?;
                    self.op_interval(op, lhs, &li, rhs, &ri, &result_type, span)?
                }
            }

            ExprKind::Assoc { op, operands } => {
                let op = *op;
                let bop = op.binary();
                if bop.is_logical() {
                    for operand in operands.iter_mut() {
                        self.bexpr(operand, depth + 1)?;
                    }
                    Interval::new(BigInt::zero(), BigInt::one())
                } else {
                    let result_type = node_type
                        .clone()
                        .ok_or_else(|| self.etyper().internal("operator left untyped"))?;
                    let mut iter = operands.iter_mut();
                    let first = iter
                        .next()
                        .ok_or_else(|| self.etyper().internal("empty associative chain"))?;
                    let mut acc = self.bexpr(first, depth + 1)?;
                    let mut acc_expr = first.clone();
                    for operand in iter {
                        let oi = self.bexpr(operand, depth + 1)?;
                        acc = self.op_interval(
                            bop,
                            &acc_expr,
                            &acc,
                            operand,
                            &oi,
                            &result_type,
                            span,
                        )?;
                        acc_expr = operand.clone();
                    }
                    acc
                }
            }

            ExprKind::As { value, target } => {
                let vi = self.bexpr(value, depth + 1)?;
                let vi = self
                    .facts
                    .refine(value, vi)
                    .map_err(|_| {
                        let rendered = self.ctx.render(value);
                        self.err(CheckErrorKind::InconsistentFacts(rendered), span)
                    })?;
                let target_type = target
                    .resolved()
                    .cloned()
                    .ok_or_else(|| self.etyper().internal("conversion target unresolved"))?;
                let bounds = target_type
                    .value_bounds()
                    .ok_or_else(|| self.etyper().internal("numeric conversion to unbounded type"))?;
                self.require_fits(value, &vi, &bounds)?;
                vi.intersect(&bounds)
            }

            ExprKind::List(items) => {
                for item in items.iter_mut() {
                    self.bexpr(item, depth + 1)?;
                }
                Interval::new(BigInt::zero(), BigInt::zero())
            }
        };

        let interval = match e.const_value() {
            Some(v) => Interval::point(v.clone()),
            None => interval,
        };
        e.merge_mbounds(interval.clone());
        Ok(interval)
    }

    /// Interval for literals, identifiers and `this`: the type's bounds
    /// refined by the facts in scope.
    fn leaf_interval(&mut self, e: &Expr) -> CheckResult<Interval> {
        if let Some(v) = e.const_value() {
            return Ok(Interval::point(v.clone()));
        }
        let t = self.etyper().type_of(e)?;
        match t.value_bounds() {
            Some(bounds) => self.facts.refine(e, bounds).map_err(|_| {
                let rendered = self.ctx.render(e);
                self.err(CheckErrorKind::InconsistentFacts(rendered), e.span)
            }),
            None => Ok(if t.is_bool() {
                Interval::new(BigInt::zero(), BigInt::one())
            } else {
                Interval::new(BigInt::zero(), BigInt::zero())
            }),
        }
    }

    /// Interval for an annotated non-leaf whose value is read back out of
    /// its type (fields, elements, call results).
    fn typed_interval(&mut self, e: &Expr) -> CheckResult<Interval> {
        self.leaf_interval(e)
    }

    fn bcall(&mut self, e: &mut Expr, depth: usize) -> CheckResult<Interval> {
        let span = e.span;
        let ExprKind::Call {
            callee,
            args,
            effect,
        } = &mut e.kind
        else {
            return Err(self.etyper().internal("bcall on a non-call node"));
        };
        let call_effect = *effect;

        // Annotate the callee chain.
        if let ExprKind::Selector { recv, .. } = &mut callee.kind {
            if recv.mtype() != Some(&Type::Empty) {
                self.bexpr(recv, depth + 1)?;
            } else {
                recv.merge_mbounds(Interval::new(BigInt::zero(), BigInt::zero()));
            }
        }
        callee.merge_mbounds(Interval::new(BigInt::zero(), BigInt::zero()));

        let mut arg_intervals = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
            let ai = self.bexpr(&mut arg.value, depth + 1)?;
            arg_intervals.push(ai);
        }

        // Parameter ranges are obligations, refinements included.
        let typer = self.etyper();
        let resolved = typer.resolve_callee(callee, span)?;
        let param_bounds: Vec<Option<Interval>> = resolved
            .arg_types()
            .iter()
            .map(|(_, t)| t.value_bounds())
            .collect();
        let is_builtin_io = matches!(
            &resolved,
            ResolvedCallee::Builtin { func, .. }
                if matches!(
                    func.receiver,
                    crate::builtin::BuiltinRecv::IoReader | crate::builtin::BuiltinRecv::IoWriter
                )
        );
        drop(resolved);

        for ((arg, ai), bounds) in args.iter().zip(&arg_intervals).zip(&param_bounds) {
            if let Some(bounds) = bounds {
                self.require_fits(&arg.value, ai, bounds)?;
            }
        }

        // Built-in I/O pre- and post-conditions.
        let mut proven_not_to_suspend = false;
        if is_builtin_io {
            if let ExprKind::Selector { recv, name } = &callee.kind {
                let names = self.ctx.builtins.names;
                let available = self.avail_call(recv);
                if *name == names.peek_u8 {
                    // The non-suspending read demands proof up front.
                    if !self.prove_binary_op(
                        BinaryOp::GtEq,
                        &available,
                        &const_expr(BigInt::one()),
                    ) {
                        let rendered = self.ctx.render(&available);
                        return Err(self.err(
                            CheckErrorKind::CannotProve(format!("{} >= 1", rendered)),
                            span,
                        ));
                    }
                } else if *name == names.read_u8
                    || *name == names.write_u8
                    || *name == names.skip
                {
                    proven_not_to_suspend = self.prove_binary_op(
                        BinaryOp::GtEq,
                        &available,
                        &const_expr(BigInt::one()),
                    );
                }
            }
        }

        // Result bounds come from the annotated type, refined by facts
        // mentioning this very call, before those facts die.
        let interval = self.typed_interval(e)?;
        if call_effect >= Effect::Impure {
            self.facts.drop_suspension_sensitive(self.locals);
        }
        if proven_not_to_suspend {
            e.flags.proven_not_to_suspend = true;
        }
        e.merge_mbounds(interval.clone());
        Ok(interval)
    }

    // ------------------------------------------------------------------
    // Obligations
    // ------------------------------------------------------------------

    /// `interval ⊆ bounds`, with one retry through the fact set.
    fn require_fits(&self, e: &Expr, interval: &Interval, bounds: &Interval) -> CheckResult<()> {
        if interval.is_sub_of(bounds) {
            return Ok(());
        }
        if let Ok(refined) = self.facts.refine(e, interval.clone()) {
            if refined.is_sub_of(bounds) {
                return Ok(());
            }
        }
        Err(self.err(
            CheckErrorKind::IntegerOverflow {
                value: interval.to_string(),
                range: bounds.to_string(),
            },
            e.span,
        ))
    }

    /// `0 <= index < length`.
    fn require_index(
        &self,
        index: &Expr,
        ii: &Interval,
        length: &Expr,
        span: Span,
    ) -> CheckResult<()> {
        let nonneg = ii.lo >= BigInt::zero()
            || self.prove_binary_op(BinaryOp::LtEq, &const_expr(BigInt::zero()), index);
        let below = match length.const_value() {
            Some(len) => &ii.hi < len || self.prove_binary_op(BinaryOp::Lt, index, length),
            None => self.prove_binary_op(BinaryOp::Lt, index, length),
        };
        if nonneg && below {
            return Ok(());
        }
        Err(self.err(
            CheckErrorKind::IndexOutOfRange {
                index: self.ctx.render(index),
                length: self.ctx.render(length),
            },
            span,
        ))
    }

    /// `0 <= lo <= hi <= length`, with missing ends defaulting to 0 and
    /// the length.
    fn require_slice(
        &self,
        lo: Option<&Expr>,
        li: Option<Interval>,
        hi: Option<&Expr>,
        hi_i: Option<Interval>,
        length: &Expr,
        span: Span,
    ) -> CheckResult<()> {
        let in_order_err = || self.err(CheckErrorKind::SliceIndicesOutOfOrder, span);

        if let (Some(lo), Some(li)) = (lo, &li) {
            let nonneg = li.lo >= BigInt::zero()
                || self.prove_binary_op(BinaryOp::LtEq, &const_expr(BigInt::zero()), lo);
            if !nonneg {
                return Err(in_order_err());
            }
        }
        match (lo, hi) {
            (Some(lo), Some(hi)) => {
                let ordered = match (&li, &hi_i) {
                    (Some(a), Some(b)) if a.hi <= b.lo => true,
                    _ => self.prove_binary_op(BinaryOp::LtEq, lo, hi),
                };
                if !ordered {
                    return Err(in_order_err());
                }
            }
            _ => {}
        }
        // The upper end, explicit or implied by the low end alone, must
        // stay within the length.
        let upper = hi.or(lo);
        if let (Some(upper), Some(ui)) = (upper, hi_i.as_ref().or(li.as_ref())) {
            let fits = match length.const_value() {
                Some(len) => &ui.hi <= len || self.prove_binary_op(BinaryOp::LtEq, upper, length),
                None => self.prove_binary_op(BinaryOp::LtEq, upper, length),
            };
            if !fits {
                return Err(in_order_err());
            }
        }
        Ok(())
    }

    /// Interval arithmetic for one binary operator, with its operand-shape
    /// obligations.
    #[allow(clippy::too_many_arguments)]
    fn op_interval(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        li: &Interval,
        rhs: &Expr,
        ri: &Interval,
        result_type: &Type,
        span: Span,
    ) -> CheckResult<Interval> {
        use BinaryOp::*;
        let zero = BigInt::zero();

        let interval = match op {
            Add => Interval::new(&li.lo + &ri.lo, &li.hi + &ri.hi),
            Sub => {
                let mut iv = Interval::new(&li.lo - &ri.hi, &li.hi - &ri.lo);
                // Facts of the shape `lhs >= rhs` tighten the difference.
                if self.prove_binary_op(Gt, lhs, rhs) {
                    iv.lo = iv.lo.max(BigInt::one());
                } else if self.prove_binary_op(GtEq, lhs, rhs) {
                    iv.lo = iv.lo.max(zero.clone());
                }
                iv
            }
            Mul => {
                if li.lo < zero || ri.lo < zero {
                    return Err(self.err(CheckErrorKind::SignedOperand { op: "*" }, span));
                }
                Interval::new(&li.lo * &ri.lo, &li.hi * &ri.hi)
            }
            Div | Mod => {
                // Only the divisor carries an obligation: a strictly
                // positive lower bound. The dividend may be signed.
                let ri = self.facts.refine(rhs, ri.clone()).map_err(|_| {
                    let rendered = self.ctx.render(rhs);
                    self.err(CheckErrorKind::InconsistentFacts(rendered), span)
                })?;
                if ri.lo <= zero {
                    return Err(self.err(CheckErrorKind::DivisionByZero, span));
                }
                if op == Div {
                    // Truncating division by d >= 1: a negative dividend
                    // is most extreme at the smallest divisor.
                    let lo = if li.lo < zero {
                        &li.lo / &ri.lo
                    } else {
                        &li.lo / &ri.hi
                    };
                    let hi = if li.hi < zero {
                        &li.hi / &ri.hi
                    } else {
                        &li.hi / &ri.lo
                    };
                    Interval::new(lo, hi)
                } else {
                    // The remainder takes the dividend's sign.
                    let lo = if li.lo < zero {
                        BigInt::one() - &ri.hi
                    } else {
                        zero.clone()
                    };
                    let hi = if li.hi < zero { zero } else { &ri.hi - 1 };
                    Interval::new(lo, hi)
                }
            }
            Shl | Shr => {
                if li.lo < zero {
                    return Err(self.err(
                        CheckErrorKind::SignedOperand { op: op.spelling() },
                        span,
                    ));
                }
                let ceiling = self.ctx.config.shift_ceiling as u64;
                let (Some(rlo), Some(rhi)) = (ri.lo.to_u64(), ri.hi.to_u64()) else {
                    return Err(self.err(
                        CheckErrorKind::ShiftOutOfRange {
                            count: ri.to_string(),
                            ceiling,
                        },
                        span,
                    ));
                };
                if ri.lo < zero || rhi > ceiling {
                    return Err(self.err(
                        CheckErrorKind::ShiftOutOfRange {
                            count: ri.to_string(),
                            ceiling,
                        },
                        span,
                    ));
                }
                if op == Shl {
                    Interval::new(&li.lo << rlo as u32, &li.hi << rhi as u32)
                } else {
                    Interval::new(&li.lo >> rhi as u32, &li.hi >> rlo as u32)
                }
            }
            BitAnd | BitOr | BitXor => {
                if li.lo < zero || ri.lo < zero {
                    return Err(self.err(
                        CheckErrorKind::SignedOperand { op: op.spelling() },
                        span,
                    ));
                }
                let max = li.hi.clone().max(ri.hi.clone());
                Interval::new(zero, next_pow2_minus_1(&max))
            }
            ModAdd | ModSub | ModMul | ModShl => {
                // Wrapping arithmetic spans the whole type.
                result_type
                    .num_kind()
                    .map(|k| k.bounds())
                    .ok_or_else(|| {
                        self.etyper().internal("wrapping arithmetic on an unbounded type")
                    })?
            }
            SatAdd | SatSub => {
                let raw = if op == SatAdd {
                    Interval::new(&li.lo + &ri.lo, &li.hi + &ri.hi)
                } else {
                    Interval::new(&li.lo - &ri.hi, &li.hi - &ri.lo)
                };
                let range = result_type
                    .num_kind()
                    .map(|k| k.bounds())
                    .ok_or_else(|| {
                        self.etyper().internal("saturating arithmetic on an unbounded type")
                    })?;
                Interval::new(
                    raw.lo.max(range.lo.clone()).min(range.hi.clone()),
                    raw.hi.min(range.hi).max(range.lo),
                )
            }
            _ => Interval::new(zero.clone(), BigInt::one()),
        };

        // Plain arithmetic must stay inside the result type; wrapping and
        // saturating forms cannot leave it.
        if matches!(op, Add | Sub | Mul | Div | Mod | Shl | Shr) {
            if let Some(bounds) = result_type.value_bounds() {
                if !interval.is_sub_of(&bounds) {
                    return Err(self.err(
                        CheckErrorKind::IntegerOverflow {
                            value: interval.to_string(),
                            range: bounds.to_string(),
                        },
                        span,
                    ));
                }
            }
        }
        Ok(interval)
    }

    // ------------------------------------------------------------------
    // Synthetic expressions
    // ------------------------------------------------------------------

    /// The length of an indexable receiver: a constant for arrays, a
    /// synthetic `recv.length()` call for slices.
    fn length_of(&self, recv: &Expr) -> CheckResult<Expr> {
        let t = self.etyper().type_of(recv)?.pierce_ptr().clone();
        match t {
            Type::Array { len, .. } => Ok(const_expr((*len).clone())),
            Type::Slice(_) => Ok(self.method_call(recv, self.ctx.builtins.names.length)),
            _ => Err(self.etyper().internal("length of a non-indexable receiver")),
        }
    }

    fn avail_call(&self, recv: &Expr) -> Expr {
        self.method_call(recv, self.ctx.builtins.names.available)
    }

    /// A synthetic, fully annotated `recv.name()` for fact matching.
    fn method_call(&self, recv: &Expr, name: Symbol) -> Expr {
        let recv_type = recv.mtype().cloned().unwrap_or(Type::Empty);
        let callee = Expr::synthetic(
            ExprKind::Selector {
                recv: Box::new(recv.clone()),
                name,
            },
            Type::Func {
                receiver: Rc::new(recv_type),
                name,
            },
        );
        Expr::synthetic(
            ExprKind::Call {
                callee: Box::new(callee),
                args: Vec::new(),
                effect: Effect::Pure,
            },
            Type::numeric(crate::ast::NumKind::U64),
        )
    }
}

/// What an assignment's destination reaches through.
enum Place {
    Local(Symbol),
    This,
    Opaque,
}

fn root_place(e: &Expr) -> Place {
    match &e.kind {
        ExprKind::Ident(s) => Place::Local(*s),
        ExprKind::This => Place::This,
        ExprKind::Selector { recv, .. } | ExprKind::Index { recv, .. } => root_place(recv),
        _ => Place::Opaque,
    }
}

/// `not cond`, expressed positively when the condition is a comparison.
fn negate_expr(cond: &Expr) -> Option<Expr> {
    match &cond.kind {
        ExprKind::Binary { op, lhs, rhs } => op.negated().map(|neg| {
            Expr::synthetic(
                ExprKind::Binary {
                    op: neg,
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                },
                Type::Bool,
            )
        }),
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => Some((**operand).clone()),
        _ => None,
    }
}

/// Does holding `have` guarantee `want`?
fn implies(have: BinaryOp, want: BinaryOp) -> bool {
    use BinaryOp::*;
    if have == want {
        return true;
    }
    matches!(
        (have, want),
        (Lt, LtEq) | (Lt, NotEq) | (Gt, GtEq) | (Gt, NotEq) | (Eq, LtEq) | (Eq, GtEq)
    )
}

fn eval_comparison(op: BinaryOp, a: &BigInt, b: &BigInt) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::GtEq => a >= b,
        _ => false,
    }
}

/// The smallest `2^n - 1` at or above `v`.
fn next_pow2_minus_1(v: &BigInt) -> BigInt {
    if v <= &BigInt::zero() {
        return BigInt::zero();
    }
    (BigInt::one() << v.bits()) - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow2_ceiling() {
        assert_eq!(next_pow2_minus_1(&BigInt::from(0)), BigInt::from(0));
        assert_eq!(next_pow2_minus_1(&BigInt::from(1)), BigInt::from(1));
        assert_eq!(next_pow2_minus_1(&BigInt::from(5)), BigInt::from(7));
        assert_eq!(next_pow2_minus_1(&BigInt::from(8)), BigInt::from(15));
        assert_eq!(next_pow2_minus_1(&BigInt::from(255)), BigInt::from(255));
    }

    #[test]
    fn operator_implication() {
        use BinaryOp::*;
        assert!(implies(Lt, LtEq));
        assert!(implies(Lt, NotEq));
        assert!(implies(Eq, GtEq));
        assert!(!implies(LtEq, Lt));
        assert!(!implies(NotEq, Eq));
    }
}
