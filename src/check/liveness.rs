//! The coroutine liveness analyser.
//!
//! Decides which locals must be persisted across suspension points. Two
//! passes: the first enumerates every local (forward references within a
//! body are legal, so names must be known before analysis), the second
//! walks the body maintaining a three-state machine per variable:
//!
//! - write: `weak` falls back to `none`
//! - read: `weak` hardens to `strong`
//! - suspension point: every `none` becomes `weak`; variables referenced
//!   in the suspension's own arguments go straight to `strong`
//!
//! `strong` is sticky. Branches join by per-variable maximum; loops run to
//! a fixed point with breaks and continues as extra join points; every
//! return joins into the final summary.

use crate::ast::{
    Effect, ElseArm, Expr, ExprKind, FuncDecl, IfStmt, JumpKind, LivenessSummary, LoopId,
    RetKind, Stmt, StmtKind,
};
use crate::intern::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Live {
    None_,
    Weak,
    Strong,
}

struct LoopJoin {
    id: LoopId,
    breaks: Vec<Vec<Live>>,
}

struct Analyser {
    names: Vec<Symbol>,
    state: Vec<Live>,
    summary: Vec<Live>,
    loops: Vec<LoopJoin>,
}

/// Compute the persistence summary for a coroutine body.
pub(crate) fn analyse(func: &FuncDecl) -> LivenessSummary {
    let names = enumerate_locals(&func.body);
    let n = names.len();
    let mut a = Analyser {
        names,
        state: vec![Live::None_; n],
        summary: vec![Live::None_; n],
        loops: Vec::new(),
    };
    let terminated = a.block(&func.body);
    if !terminated {
        a.join_summary();
    }
    LivenessSummary {
        persisted: a
            .names
            .iter()
            .zip(&a.summary)
            .map(|(name, live)| (*name, *live == Live::Strong))
            .collect(),
    }
}

/// Pass 1: every local, in declaration order.
fn enumerate_locals(body: &[Stmt]) -> Vec<Symbol> {
    fn walk(block: &[Stmt], out: &mut Vec<Symbol>) {
        for stmt in block {
            match &stmt.kind {
                StmtKind::Var(v) => out.push(v.name),
                StmtKind::If(ifs) => {
                    walk(&ifs.then_block, out);
                    let mut arm = &ifs.else_arm;
                    loop {
                        match arm {
                            ElseArm::None => break,
                            ElseArm::Block(b) => {
                                walk(b, out);
                                break;
                            }
                            ElseArm::ElseIf(next) => {
                                walk(&next.then_block, out);
                                arm = &next.else_arm;
                            }
                        }
                    }
                }
                StmtKind::While(w) => walk(&w.body, out),
                StmtKind::Iterate(it) => {
                    out.push(it.var);
                    walk(&it.body, out);
                }
                StmtKind::IoBind(b) => walk(&b.body, out),
                _ => {}
            }
        }
    }
    let mut out = Vec::new();
    walk(body, &mut out);
    out
}

impl Analyser {
    fn index(&self, name: Symbol) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    fn read(&mut self, name: Symbol) {
        if let Some(i) = self.index(name) {
            if self.state[i] == Live::Weak {
                self.state[i] = Live::Strong;
            }
        }
    }

    fn write(&mut self, name: Symbol) {
        if let Some(i) = self.index(name) {
            if self.state[i] == Live::Weak {
                self.state[i] = Live::None_;
            }
        }
    }

    fn force_strong(&mut self, name: Symbol) {
        if let Some(i) = self.index(name) {
            self.state[i] = Live::Strong;
        }
    }

    fn suspend(&mut self) {
        for live in &mut self.state {
            if *live == Live::None_ {
                *live = Live::Weak;
            }
        }
    }

    fn join_summary(&mut self) {
        for (s, l) in self.summary.iter_mut().zip(&self.state) {
            *s = (*s).max(*l);
        }
    }

    /// Walk one expression in evaluation order: reads first, then the
    /// suspension effect of any coroutine call inside it.
    fn expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Literal(_) | ExprKind::This => {}
            ExprKind::Ident(s) => {
                if !e.flags.global_ident {
                    self.read(*s);
                }
            }
            ExprKind::Selector { recv, .. } => self.expr(recv),
            ExprKind::Index { recv, index } => {
                self.expr(recv);
                self.expr(index);
            }
            ExprKind::SliceOf { recv, lo, hi } => {
                self.expr(recv);
                if let Some(lo) = lo {
                    self.expr(lo);
                }
                if let Some(hi) = hi {
                    self.expr(hi);
                }
            }
            ExprKind::Call {
                callee,
                args,
                effect,
            } => {
                self.expr(callee);
                for arg in args {
                    self.expr(&arg.value);
                }
                if *effect == Effect::Coroutine {
                    self.suspend();
                    // The resume path re-reads the suspension's arguments.
                    for arg in args {
                        force_strong_reads(self, &arg.value);
                    }
                    if let ExprKind::Selector { recv, .. } = &callee.kind {
                        force_strong_reads(self, recv);
                    }
                }
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Assoc { operands, .. } | ExprKind::List(operands) => {
                for operand in operands {
                    self.expr(operand);
                }
            }
            ExprKind::As { value, .. } => self.expr(value),
        }
    }

    /// Returns true when the block cannot fall through.
    fn block(&mut self, block: &[Stmt]) -> bool {
        for stmt in block {
            match &stmt.kind {
                StmtKind::Var(_) => {}

                StmtKind::Assign(assign) => {
                    self.expr(&assign.rhs);
                    // Reads inside the destination (indices, receivers).
                    if let Some(root) = assign_root(&assign.lhs) {
                        read_subscripts(self, &assign.lhs);
                        if assign.op.binary_op().is_some() {
                            // Compound assignment reads before it writes.
                            self.read(root);
                        }
                        self.write(root);
                    } else {
                        self.expr(&assign.lhs);
                    }
                }

                StmtKind::Expr(e) => self.expr(e),

                StmtKind::If(ifs) => self.if_stmt(ifs),

                StmtKind::While(w) => {
                    self.loops.push(LoopJoin {
                        id: w.loop_id,
                        breaks: Vec::new(),
                    });
                    // Iterate to a fixed point; the loop may run zero times.
                    loop {
                        let before = self.state.clone();
                        self.expr(&w.cond);
                        self.block(&w.body);
                        join_into(&mut self.state, &before);
                        if self.state == before {
                            break;
                        }
                    }
                    let frame = self.loops.pop().unwrap_or(LoopJoin {
                        id: w.loop_id,
                        breaks: Vec::new(),
                    });
                    for b in frame.breaks {
                        join_into(&mut self.state, &b);
                    }
                }

                StmtKind::Iterate(it) => {
                    self.expr(&it.source);
                    self.loops.push(LoopJoin {
                        id: it.loop_id,
                        breaks: Vec::new(),
                    });
                    loop {
                        let before = self.state.clone();
                        self.write(it.var);
                        self.block(&it.body);
                        join_into(&mut self.state, &before);
                        if self.state == before {
                            break;
                        }
                    }
                    let frame = self.loops.pop().unwrap_or(LoopJoin {
                        id: it.loop_id,
                        breaks: Vec::new(),
                    });
                    for b in frame.breaks {
                        join_into(&mut self.state, &b);
                    }
                }

                StmtKind::Jump(jump) => {
                    if jump.kind == JumpKind::Break {
                        if let Some(id) = jump.jump_target() {
                            let snapshot = self.state.clone();
                            if let Some(frame) =
                                self.loops.iter_mut().find(|f| f.id == id)
                            {
                                frame.breaks.push(snapshot);
                            }
                        }
                    }
                    // A continue re-joins at the loop head, which the
                    // fixed-point iteration already covers.
                    return true;
                }

                StmtKind::Ret(ret) => {
                    if let Some(value) = &ret.value {
                        self.expr(value);
                    }
                    match ret.kind {
                        RetKind::Return => {
                            self.join_summary();
                            return true;
                        }
                        RetKind::Yield => {
                            // An explicit suspension point.
                            self.suspend();
                        }
                    }
                }

                StmtKind::Assert(a) => {
                    self.expr(&a.cond);
                    for arg in &a.args {
                        self.expr(&arg.value);
                    }
                }

                StmtKind::IoBind(b) => {
                    self.expr(&b.io);
                    self.expr(&b.limit);
                    self.block(&b.body);
                }
            }
        }
        false
    }

    fn if_stmt(&mut self, ifs: &IfStmt) {
        self.expr(&ifs.cond);
        let entry = self.state.clone();

        let then_terminated = self.block(&ifs.then_block);
        let then_state = self.state.clone();

        self.state = entry;
        let else_terminated = match &ifs.else_arm {
            ElseArm::None => false,
            ElseArm::Block(b) => self.block(b),
            ElseArm::ElseIf(next) => {
                self.if_stmt(next);
                false
            }
        };

        // Per-variable maximum over the branches that fall through; a
        // terminated branch contributed to the summary already.
        match (then_terminated, else_terminated) {
            (false, false) => join_into(&mut self.state, &then_state),
            (false, true) => self.state = then_state,
            (true, _) => {}
        }
    }
}

fn join_into(state: &mut [Live], other: &[Live]) {
    for (s, o) in state.iter_mut().zip(other) {
        *s = (*s).max(*o);
    }
}

/// Force-strong every local read inside a suspension argument.
fn force_strong_reads(a: &mut Analyser, e: &Expr) {
    crate::ast::walk_expr(e, &mut |sub| {
        if let ExprKind::Ident(s) = sub.kind {
            if !sub.flags.global_ident {
                a.force_strong(s);
            }
        }
    });
}

/// Reads performed while evaluating a destination, excluding the variable
/// being written.
fn read_subscripts(a: &mut Analyser, lhs: &Expr) {
    match &lhs.kind {
        ExprKind::Ident(_) | ExprKind::This => {}
        ExprKind::Index { recv, index } => {
            read_subscripts(a, recv);
            a.expr(index);
        }
        ExprKind::Selector { recv, .. } => read_subscripts(a, recv),
        _ => a.expr(lhs),
    }
}

fn assign_root(lhs: &Expr) -> Option<Symbol> {
    match &lhs.kind {
        ExprKind::Ident(s) => Some(*s),
        ExprKind::Index { recv, .. } | ExprKind::Selector { recv, .. } => assign_root(recv),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use crate::parser::parse_file;

    fn analyse_body(src: &str) -> (LivenessSummary, Interner) {
        let mut interner = Interner::new();
        let full = format!("pub func f?() {}", src);
        let file = parse_file("t.sift", &full, &mut interner).expect("parse");
        let crate::ast::Decl::Func(func) = &file.decls[0] else {
            panic!("expected func");
        };
        (analyse(func), interner)
    }

    #[test]
    fn read_after_suspension_is_strong() {
        let (summary, interner) = analyse_body(
            "{ var c : base.u8 var d : base.u8 \
             c =? src.read_u8?() \
             d =? src.read_u8?() \
             d = c }",
        );
        let c = interner.lookup("c").unwrap();
        let d = interner.lookup("d").unwrap();
        assert_eq!(summary.needs_persistence(c), Some(true));
        assert_eq!(summary.needs_persistence(d), Some(false));
    }

    #[test]
    fn write_before_read_clears_weakness() {
        let (summary, interner) = analyse_body(
            "{ var c : base.u8 \
             x =? src.read_u8?() \
             c = 0 \
             x = c }",
        );
        let c = interner.lookup("c").unwrap();
        assert_eq!(summary.needs_persistence(c), Some(false));
    }

    #[test]
    fn branch_join_takes_the_maximum() {
        let (summary, interner) = analyse_body(
            "{ var c : base.u8 \
             c =? src.read_u8?() \
             if b { x = c } else { x = 0 } }",
        );
        let c = interner.lookup("c").unwrap();
        assert_eq!(summary.needs_persistence(c), Some(true));
    }

    #[test]
    fn loop_reaches_a_fixed_point() {
        // The read of c at the loop head follows the suspension from the
        // previous iteration; only the second sweep over the body sees it.
        let (summary, interner) = analyse_body(
            "{ var c : base.u8 \
             var k : base.u32 \
             while c < 10 { c = c ~mod+ 1 \
             src.skip?(n: k) } }",
        );
        let c = interner.lookup("c").unwrap();
        assert_eq!(summary.needs_persistence(c), Some(true));
    }

    #[test]
    fn a_loop_write_before_the_read_keeps_the_variable_dead() {
        // The resumed assignment overwrites c before the loop head reads
        // it again, so nothing of c survives the suspension.
        let (summary, interner) = analyse_body(
            "{ var c : base.u8 \
             while c < 10 { c =? src.read_u8?() } }",
        );
        let c = interner.lookup("c").unwrap();
        assert_eq!(summary.needs_persistence(c), Some(false));
    }

    #[test]
    fn suspension_arguments_are_forced_strong() {
        let (summary, interner) = analyse_body(
            "{ var n : base.u32 \
             n = 4 \
             src.skip?(n: n) }",
        );
        let n = interner.lookup("n").unwrap();
        assert_eq!(summary.needs_persistence(n), Some(true));
    }
}
