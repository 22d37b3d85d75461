pub mod decl;
pub mod expr;
pub mod stmt;
pub mod types;

pub use decl::{
    ConstDecl, Decl, Effect, Field, FuncDecl, LivenessSummary, SourceFile, StatusClass,
    StatusDecl, StructDecl, UseDecl, Visibility,
};
pub use expr::{
    walk_expr, walk_expr_mut, Arg, AssocOp, BinaryOp, Expr, ExprFlags, ExprKind, Lit, UnaryOp,
};
pub use stmt::{
    block_terminates, AssertKind, Assertion, AssignOp, AssignStmt, ElseArm, IfStmt, IoBindStmt,
    IterateStmt, JumpKind, JumpStmt, LoopId, RetKind, RetStmt, Stmt, StmtKind, VarStmt,
    WhileStmt,
};
pub use types::{
    Interval, NumKind, Refined, RefinementExpr, SlotConflict, Type, TypeExpr, TypeExprKind,
};
