//! Statement nodes.
//!
//! Loops carry an id assigned by the parser; `break`/`continue` refer to
//! their loop through that id rather than an owning edge, so structural
//! walks never cycle.

use crate::ast::expr::{Arg, BinaryOp, Expr};
use crate::ast::types::TypeExpr;
use crate::intern::Symbol;
use crate::token::Span;

/// Non-owning handle from a jump to its enclosing loop.
pub type LoopId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// Plain `=`.
    Eq,
    /// `=?`: assignment from a coroutine call's result.
    EqQuestion,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    ModAdd,
    ModSub,
    ModShl,
    SatAdd,
    SatSub,
}

impl AssignOp {
    /// The underlying binary operator of a compound assignment.
    pub fn binary_op(self) -> Option<BinaryOp> {
        use AssignOp::*;
        Some(match self {
            Eq | EqQuestion => return None,
            Add => BinaryOp::Add,
            Sub => BinaryOp::Sub,
            Mul => BinaryOp::Mul,
            Div => BinaryOp::Div,
            Mod => BinaryOp::Mod,
            BitAnd => BinaryOp::BitAnd,
            BitOr => BinaryOp::BitOr,
            BitXor => BinaryOp::BitXor,
            Shl => BinaryOp::Shl,
            Shr => BinaryOp::Shr,
            ModAdd => BinaryOp::ModAdd,
            ModSub => BinaryOp::ModSub,
            ModShl => BinaryOp::ModShl,
            SatAdd => BinaryOp::SatAdd,
            SatSub => BinaryOp::SatSub,
        })
    }

    pub fn is_shift(self) -> bool {
        matches!(self, AssignOp::Shl | AssignOp::Shr | AssignOp::ModShl)
    }

    /// The `~mod`/`~sat` compound family, restricted to unsigned LHS.
    pub fn requires_unsigned(self) -> bool {
        matches!(
            self,
            AssignOp::ModAdd
                | AssignOp::ModSub
                | AssignOp::ModShl
                | AssignOp::SatAdd
                | AssignOp::SatSub
        )
    }

    pub fn spelling(self) -> &'static str {
        use AssignOp::*;
        match self {
            Eq => "=",
            EqQuestion => "=?",
            Add => "+=",
            Sub => "-=",
            Mul => "*=",
            Div => "/=",
            Mod => "%=",
            BitAnd => "&=",
            BitOr => "|=",
            BitXor => "^=",
            Shl => "<<=",
            Shr => ">>=",
            ModAdd => "~mod+=",
            ModSub => "~mod-=",
            ModShl => "~mod<<=",
            SatAdd => "~sat+=",
            SatSub => "~sat-=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertKind {
    Assert,
    Pre,
    Inv,
    Post,
}

/// An `assert`/`pre`/`inv`/`post` clause, optionally discharged through a
/// named reason with bound arguments.
#[derive(Debug, Clone)]
pub struct Assertion {
    pub kind: AssertKind,
    pub cond: Expr,
    pub reason: Option<Symbol>,
    pub args: Vec<Arg>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarStmt {
    pub name: Symbol,
    pub typ: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct AssignStmt {
    pub op: AssignOp,
    pub lhs: Expr,
    pub rhs: Expr,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Vec<Stmt>,
    pub else_arm: ElseArm,
}

#[derive(Debug, Clone)]
pub enum ElseArm {
    None,
    ElseIf(Box<IfStmt>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub label: Option<Symbol>,
    pub cond: Expr,
    pub asserts: Vec<Assertion>,
    pub body: Vec<Stmt>,
    pub loop_id: LoopId,
    /// Pass-recorded jump summary, filled by the statement typer.
    pub has_break: bool,
    pub has_continue: bool,
}

/// `iterate (x : s) { .. }`: binds `x` to each element of the slice `s`.
#[derive(Debug, Clone)]
pub struct IterateStmt {
    pub label: Option<Symbol>,
    pub var: Symbol,
    pub source: Expr,
    pub asserts: Vec<Assertion>,
    pub body: Vec<Stmt>,
    pub loop_id: LoopId,
    pub has_break: bool,
    pub has_continue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Break,
    Continue,
}

#[derive(Debug, Clone)]
pub struct JumpStmt {
    pub kind: JumpKind,
    pub label: Option<Symbol>,
    jump_target: Option<LoopId>,
}

impl JumpStmt {
    pub fn new(kind: JumpKind, label: Option<Symbol>) -> Self {
        JumpStmt {
            kind,
            label,
            jump_target: None,
        }
    }

    pub fn jump_target(&self) -> Option<LoopId> {
        self.jump_target
    }

    pub fn set_jump_target(&mut self, id: LoopId) {
        self.jump_target = Some(id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetKind {
    Return,
    Yield,
}

#[derive(Debug, Clone)]
pub struct RetStmt {
    pub kind: RetKind,
    pub value: Option<Expr>,
}

/// `io_bind (io: x, limit: e) { .. }`: a scoped reader/writer rebinding.
/// Jumps and returns may not leave the body.
#[derive(Debug, Clone)]
pub struct IoBindStmt {
    pub io: Expr,
    pub limit: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Var(VarStmt),
    Assign(AssignStmt),
    /// A bare call in statement position.
    Expr(Expr),
    If(IfStmt),
    While(Box<WhileStmt>),
    Iterate(Box<IterateStmt>),
    Jump(JumpStmt),
    Ret(RetStmt),
    Assert(Assertion),
    IoBind(IoBindStmt),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }
}

/// Does this block end by leaving the enclosing statement? Used to skip
/// unreachable proof obligations and to drop terminated branches from fact
/// reconciliation.
pub fn block_terminates(block: &[Stmt]) -> bool {
    match block.last() {
        None => false,
        Some(stmt) => stmt_terminates(stmt),
    }
}

fn stmt_terminates(stmt: &Stmt) -> bool {
    match &stmt.kind {
        // A yield suspends and later resumes in place; only a return
        // actually leaves.
        StmtKind::Ret(r) => r.kind == RetKind::Return,
        StmtKind::Jump(_) => true,
        StmtKind::If(ifs) => if_terminates(ifs),
        _ => false,
    }
}

fn if_terminates(ifs: &IfStmt) -> bool {
    if !block_terminates(&ifs.then_block) {
        return false;
    }
    match &ifs.else_arm {
        ElseArm::None => false,
        ElseArm::ElseIf(next) => if_terminates(next),
        ElseArm::Block(block) => block_terminates(block),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::ExprKind;
    use crate::ast::expr::Lit;

    fn ret() -> Stmt {
        Stmt::new(
            StmtKind::Ret(RetStmt {
                kind: RetKind::Return,
                value: None,
            }),
            Span::default(),
        )
    }

    fn nop() -> Stmt {
        Stmt::new(
            StmtKind::Expr(Expr::new(ExprKind::Literal(Lit::Ok_), Span::default())),
            Span::default(),
        )
    }

    #[test]
    fn termination_looks_at_the_last_statement() {
        assert!(!block_terminates(&[]));
        assert!(block_terminates(&[nop(), ret()]));
        assert!(!block_terminates(&[ret(), nop()]));
    }

    #[test]
    fn if_terminates_only_when_every_arm_does() {
        let both = IfStmt {
            cond: Expr::new(ExprKind::Literal(Lit::Bool(true)), Span::default()),
            then_block: vec![ret()],
            else_arm: ElseArm::Block(vec![ret()]),
        };
        assert!(block_terminates(&[Stmt::new(
            StmtKind::If(both.clone()),
            Span::default()
        )]));

        let one_armed = IfStmt {
            else_arm: ElseArm::None,
            ..both
        };
        assert!(!block_terminates(&[Stmt::new(
            StmtKind::If(one_armed),
            Span::default()
        )]));
    }
}
