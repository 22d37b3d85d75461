//! Expression nodes.
//!
//! Every expression carries mutable annotation slots filled exactly once
//! during checking: the resolved type, the proven value interval, and the
//! folded constant when there is one. Equality between expressions is
//! structural and ignores spans and annotation slots.

use num_bigint::BigInt;

use crate::ast::decl::Effect;
use crate::ast::types::{Interval, SlotConflict, Type, TypeExpr};
use crate::intern::Symbol;
use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lit {
    /// Raw spelling of a number literal; folded to a value by the checker.
    Number(Symbol),
    /// A status message string, resolved against the status maps.
    Status(Symbol),
    Bool(bool),
    Ok_,
    Nullptr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
}

impl UnaryOp {
    pub fn spelling(self) -> &'static str {
        match self {
            UnaryOp::Pos => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    ModAdd,
    ModSub,
    ModMul,
    ModShl,
    SatAdd,
    SatSub,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(self, Eq | NotEq | Lt | LtEq | Gt | GtEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// The `~mod`/`~sat` family.
    pub fn is_modulating(self) -> bool {
        use BinaryOp::*;
        matches!(self, ModAdd | ModSub | ModMul | ModShl | SatAdd | SatSub)
    }

    pub fn is_shift(self) -> bool {
        use BinaryOp::*;
        matches!(self, Shl | Shr | ModShl)
    }

    /// Mirror a comparison: `a < b` is `b > a`.
    pub fn flipped(self) -> Option<BinaryOp> {
        use BinaryOp::*;
        Some(match self {
            Eq => Eq,
            NotEq => NotEq,
            Lt => Gt,
            LtEq => GtEq,
            Gt => Lt,
            GtEq => LtEq,
            _ => return None,
        })
    }

    /// Negate a comparison: `not (a < b)` is `a >= b`.
    pub fn negated(self) -> Option<BinaryOp> {
        use BinaryOp::*;
        Some(match self {
            Eq => NotEq,
            NotEq => Eq,
            Lt => GtEq,
            LtEq => Gt,
            Gt => LtEq,
            GtEq => Lt,
            _ => return None,
        })
    }

    pub fn spelling(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Shl => "<<",
            Shr => ">>",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            ModAdd => "~mod+",
            ModSub => "~mod-",
            ModMul => "~mod*",
            ModShl => "~mod<<",
            SatAdd => "~sat+",
            SatSub => "~sat-",
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            LtEq => "<=",
            Gt => ">",
            GtEq => ">=",
            And => "and",
            Or => "or",
        }
    }
}

/// Operators whose chains fold into one n-ary node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssocOp {
    Add,
    Mul,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
}

impl AssocOp {
    pub fn from_binary(op: BinaryOp) -> Option<AssocOp> {
        Some(match op {
            BinaryOp::Add => AssocOp::Add,
            BinaryOp::Mul => AssocOp::Mul,
            BinaryOp::BitAnd => AssocOp::BitAnd,
            BinaryOp::BitOr => AssocOp::BitOr,
            BinaryOp::BitXor => AssocOp::BitXor,
            BinaryOp::And => AssocOp::And,
            BinaryOp::Or => AssocOp::Or,
            _ => return None,
        })
    }

    pub fn binary(self) -> BinaryOp {
        match self {
            AssocOp::Add => BinaryOp::Add,
            AssocOp::Mul => BinaryOp::Mul,
            AssocOp::BitAnd => BinaryOp::BitAnd,
            AssocOp::BitOr => BinaryOp::BitOr,
            AssocOp::BitXor => BinaryOp::BitXor,
            AssocOp::And => BinaryOp::And,
            AssocOp::Or => BinaryOp::Or,
        }
    }
}

/// A named call argument.
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Symbol,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Lit),
    Ident(Symbol),
    This,
    /// Field or method access `x.f`; also `pkg.name` before resolution.
    Selector {
        recv: Box<Expr>,
        name: Symbol,
    },
    Index {
        recv: Box<Expr>,
        index: Box<Expr>,
    },
    SliceOf {
        recv: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
        /// The call-site effect marker: `f()`, `f!()` or `f?()`.
        effect: Effect,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assoc {
        op: AssocOp,
        operands: Vec<Expr>,
    },
    As {
        value: Box<Expr>,
        target: TypeExpr,
    },
    /// Comma-separated tuple; the value of a constant array.
    List(Vec<Expr>),
}

/// Pass-recorded flags on an expression node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExprFlags {
    /// The identifier resolved to a top-level name, not a local.
    pub global_ident: bool,
    /// An index whose obligation was discharged by refinement alone.
    pub bounds_check_optimized: bool,
    /// A coroutine call whose I/O precondition is already proven.
    pub proven_not_to_suspend: bool,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub flags: ExprFlags,
    mtype: Option<Type>,
    mbounds: Option<Interval>,
    const_value: Option<BigInt>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr {
            kind,
            span,
            flags: ExprFlags::default(),
            mtype: None,
            mbounds: None,
            const_value: None,
        }
    }

    /// A synthetic node, already annotated. Used for fact and obligation
    /// expressions the checker manufactures.
    pub fn synthetic(kind: ExprKind, mtype: Type) -> Self {
        Expr {
            kind,
            span: Span::default(),
            flags: ExprFlags::default(),
            mtype: Some(mtype),
            mbounds: None,
            const_value: None,
        }
    }

    /// A synthetic constant, with its value slot already filled.
    pub fn synthetic_const(kind: ExprKind, mtype: Type, value: BigInt) -> Self {
        Expr {
            kind,
            span: Span::default(),
            flags: ExprFlags::default(),
            mtype: Some(mtype),
            mbounds: Some(Interval::point(value.clone())),
            const_value: Some(value),
        }
    }

    pub fn mtype(&self) -> Option<&Type> {
        self.mtype.as_ref()
    }

    pub fn mbounds(&self) -> Option<&Interval> {
        self.mbounds.as_ref()
    }

    pub fn const_value(&self) -> Option<&BigInt> {
        self.const_value.as_ref()
    }

    pub fn set_mtype(&mut self, t: Type) -> Result<(), SlotConflict> {
        match &self.mtype {
            None => {
                self.mtype = Some(t);
                Ok(())
            }
            Some(prev) if *prev == t => Ok(()),
            Some(_) => Err(SlotConflict("expression type")),
        }
    }

    /// Widen the bounds slot to cover `b`. An expression revisited at a
    /// second program point (a loop clause proven at entry and at each
    /// continue) keeps the union, which every visit's obligation has
    /// already shown to fit the type.
    pub fn merge_mbounds(&mut self, b: Interval) {
        match &mut self.mbounds {
            None => self.mbounds = Some(b),
            Some(prev) => *prev = prev.unite(&b),
        }
    }

    pub fn set_mbounds(&mut self, b: Interval) -> Result<(), SlotConflict> {
        match &self.mbounds {
            None => {
                self.mbounds = Some(b);
                Ok(())
            }
            Some(prev) if *prev == b => Ok(()),
            Some(_) => Err(SlotConflict("expression bounds")),
        }
    }

    pub fn set_const_value(&mut self, v: BigInt) -> Result<(), SlotConflict> {
        match &self.const_value {
            None => {
                self.const_value = Some(v);
                Ok(())
            }
            Some(prev) if *prev == v => Ok(()),
            Some(_) => Err(SlotConflict("constant value")),
        }
    }

    /// Structural equality, ignoring spans and annotation slots.
    pub fn eq_structural(&self, other: &Expr) -> bool {
        match (&self.kind, &other.kind) {
            (ExprKind::Literal(a), ExprKind::Literal(b)) => {
                // Two spellings of one value ("10", "0xA") are the same fact.
                match (self.const_value(), other.const_value()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a == b,
                }
            }
            (ExprKind::Ident(a), ExprKind::Ident(b)) => a == b,
            (ExprKind::This, ExprKind::This) => true,
            (
                ExprKind::Selector { recv: ra, name: na },
                ExprKind::Selector { recv: rb, name: nb },
            ) => na == nb && ra.eq_structural(rb),
            (
                ExprKind::Index { recv: ra, index: ia },
                ExprKind::Index { recv: rb, index: ib },
            ) => ra.eq_structural(rb) && ia.eq_structural(ib),
            (
                ExprKind::SliceOf { recv: ra, lo: la, hi: ha },
                ExprKind::SliceOf { recv: rb, lo: lb, hi: hb },
            ) => {
                ra.eq_structural(rb)
                    && opt_eq(la.as_deref(), lb.as_deref())
                    && opt_eq(ha.as_deref(), hb.as_deref())
            }
            (
                ExprKind::Call { callee: ca, args: aa, effect: ea },
                ExprKind::Call { callee: cb, args: ab, effect: eb },
            ) => {
                ea == eb
                    && ca.eq_structural(cb)
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(x, y)| {
                        x.name == y.name && x.value.eq_structural(&y.value)
                    })
            }
            (
                ExprKind::Unary { op: oa, operand: a },
                ExprKind::Unary { op: ob, operand: b },
            ) => oa == ob && a.eq_structural(b),
            (
                ExprKind::Binary { op: oa, lhs: la, rhs: ra },
                ExprKind::Binary { op: ob, lhs: lb, rhs: rb },
            ) => oa == ob && la.eq_structural(lb) && ra.eq_structural(rb),
            (
                ExprKind::Assoc { op: oa, operands: a },
                ExprKind::Assoc { op: ob, operands: b },
            ) => {
                oa == ob
                    && a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.eq_structural(y))
            }
            (
                ExprKind::As { value: va, target: ta },
                ExprKind::As { value: vb, target: tb },
            ) => {
                va.eq_structural(vb)
                    && match (ta.resolved(), tb.resolved()) {
                        (Some(x), Some(y)) => x == y,
                        _ => false,
                    }
            }
            (ExprKind::List(a), ExprKind::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_structural(y))
            }
            _ => false,
        }
    }

    /// Does any sub-expression read the local `name`?
    pub fn mentions(&self, name: Symbol) -> bool {
        let mut found = false;
        walk_expr(self, &mut |e| {
            if let ExprKind::Ident(s) = e.kind {
                if s == name && !e.flags.global_ident {
                    found = true;
                }
            }
        });
        found
    }

    pub fn mentions_this(&self) -> bool {
        let mut found = false;
        walk_expr(self, &mut |e| {
            if matches!(e.kind, ExprKind::This) {
                found = true;
            }
        });
        found
    }

    /// The strongest call-site effect marker appearing anywhere inside.
    pub fn max_effect(&self) -> Effect {
        let mut max = Effect::Pure;
        walk_expr(self, &mut |e| {
            if let ExprKind::Call { effect, .. } = &e.kind {
                if *effect > max {
                    max = *effect;
                }
            }
        });
        max
    }
}

fn opt_eq(a: Option<&Expr>, b: Option<&Expr>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.eq_structural(y),
        _ => false,
    }
}

/// Pre-order walk over an expression tree. Jump back-pointers and resolved
/// types are not expressions, so this never cycles.
pub fn walk_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::This => {}
        ExprKind::Selector { recv, .. } => walk_expr(recv, f),
        ExprKind::Index { recv, index } => {
            walk_expr(recv, f);
            walk_expr(index, f);
        }
        ExprKind::SliceOf { recv, lo, hi } => {
            walk_expr(recv, f);
            if let Some(lo) = lo {
                walk_expr(lo, f);
            }
            if let Some(hi) = hi {
                walk_expr(hi, f);
            }
        }
        ExprKind::Call { callee, args, .. } => {
            walk_expr(callee, f);
            for arg in args {
                walk_expr(&arg.value, f);
            }
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, f),
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, f);
            walk_expr(rhs, f);
        }
        ExprKind::Assoc { operands, .. } | ExprKind::List(operands) => {
            for op in operands {
                walk_expr(op, f);
            }
        }
        ExprKind::As { value, .. } => walk_expr(value, f),
    }
}

/// Mutable pre-order walk, for annotation passes.
pub fn walk_expr_mut(expr: &mut Expr, f: &mut impl FnMut(&mut Expr)) {
    f(expr);
    match &mut expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::This => {}
        ExprKind::Selector { recv, .. } => walk_expr_mut(recv, f),
        ExprKind::Index { recv, index } => {
            walk_expr_mut(recv, f);
            walk_expr_mut(index, f);
        }
        ExprKind::SliceOf { recv, lo, hi } => {
            walk_expr_mut(recv, f);
            if let Some(lo) = lo {
                walk_expr_mut(lo, f);
            }
            if let Some(hi) = hi {
                walk_expr_mut(hi, f);
            }
        }
        ExprKind::Call { callee, args, .. } => {
            walk_expr_mut(callee, f);
            for arg in args {
                walk_expr_mut(&mut arg.value, f);
            }
        }
        ExprKind::Unary { operand, .. } => walk_expr_mut(operand, f),
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_expr_mut(lhs, f);
            walk_expr_mut(rhs, f);
        }
        ExprKind::Assoc { operands, .. } | ExprKind::List(operands) => {
            for op in operands {
                walk_expr_mut(op, f);
            }
        }
        ExprKind::As { value, .. } => walk_expr_mut(value, f),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(sym: Symbol) -> Expr {
        Expr::new(ExprKind::Ident(sym), Span::default())
    }

    #[test]
    fn slots_are_write_once() {
        let mut e = ident(Symbol::EMPTY);
        e.set_mtype(Type::Bool).unwrap();
        assert!(e.set_mtype(Type::Bool).is_ok());
        assert!(e.set_mtype(Type::Status).is_err());
    }

    #[test]
    fn structural_equality_ignores_spans() {
        let a = Expr::new(ExprKind::Ident(Symbol::EMPTY), Span::new(0, 1));
        let b = Expr::new(ExprKind::Ident(Symbol::EMPTY), Span::new(7, 9));
        assert!(a.eq_structural(&b));
    }

    #[test]
    fn mentions_sees_through_nesting() {
        let mut interner = crate::intern::Interner::new();
        let x = interner.intern("x");
        let y = interner.intern("y");
        let e = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(ident(x)),
                rhs: Box::new(ident(y)),
            },
            Span::default(),
        );
        assert!(e.mentions(x));
        assert!(e.mentions(y));
        assert!(!e.mentions(interner.intern("z")));
    }
}
