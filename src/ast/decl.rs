//! Top-level declarations.

use crate::ast::expr::Expr;
use crate::ast::stmt::{Assertion, Stmt};
use crate::ast::types::{SlotConflict, TypeExpr};
use crate::intern::{Qid, Symbol};
use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Static classification of a function: pure, impure (`!`, may mutate) or
/// coroutine (`?`, may suspend). The derived `Ord` is the effect lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Effect {
    Pure,
    Impure,
    Coroutine,
}

impl Effect {
    pub fn marker(self) -> &'static str {
        match self {
            Effect::Pure => "",
            Effect::Impure => "!",
            Effect::Coroutine => "?",
        }
    }
}

/// The class of a status, selected by the first byte of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Warning,
    Suspension,
    Error,
}

impl StatusClass {
    pub fn from_message(message: &str) -> Option<StatusClass> {
        match message.as_bytes().first() {
            Some(b'@') => Some(StatusClass::Warning),
            Some(b'$') => Some(StatusClass::Suspension),
            Some(b'#') => Some(StatusClass::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UseDecl {
    pub path: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StatusDecl {
    pub vis: Visibility,
    pub message: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub vis: Visibility,
    pub name: Symbol,
    pub typ: TypeExpr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Symbol,
    pub typ: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub vis: Visibility,
    pub name: Symbol,
    pub implements: Vec<Qid>,
    pub fields: Vec<Field>,
    pub span: Span,
}

/// Which locals a coroutine must persist across suspension points.
/// Order follows the enumeration pass, so output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LivenessSummary {
    pub persisted: Vec<(Symbol, bool)>,
}

impl LivenessSummary {
    pub fn needs_persistence(&self, name: Symbol) -> Option<bool> {
        self.persisted
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| *p)
    }
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub vis: Visibility,
    /// Receiver struct name for methods; `None` for free functions.
    pub receiver: Option<Symbol>,
    pub name: Symbol,
    pub effect: Effect,
    pub args: Vec<Field>,
    pub out: Option<TypeExpr>,
    pub contract: Vec<Assertion>,
    pub body: Vec<Stmt>,
    pub span: Span,
    liveness: Option<LivenessSummary>,
}

impl FuncDecl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vis: Visibility,
        receiver: Option<Symbol>,
        name: Symbol,
        effect: Effect,
        args: Vec<Field>,
        out: Option<TypeExpr>,
        contract: Vec<Assertion>,
        body: Vec<Stmt>,
        span: Span,
    ) -> Self {
        FuncDecl {
            vis,
            receiver,
            name,
            effect,
            args,
            out,
            contract,
            body,
            span,
            liveness: None,
        }
    }

    pub fn liveness(&self) -> Option<&LivenessSummary> {
        self.liveness.as_ref()
    }

    pub fn set_liveness(&mut self, summary: LivenessSummary) -> Result<(), SlotConflict> {
        match &self.liveness {
            None => {
                self.liveness = Some(summary);
                Ok(())
            }
            Some(prev) if *prev == summary => Ok(()),
            Some(_) => Err(SlotConflict("liveness summary")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Use(UseDecl),
    Status(StatusDecl),
    Const(ConstDecl),
    Struct(StructDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Use(d) => d.span,
            Decl::Status(d) => d.span,
            Decl::Const(d) => d.span,
            Decl::Struct(d) => d.span,
            Decl::Func(d) => d.span,
        }
    }
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub decls: Vec<Decl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_lattice_orders_pure_below_coroutine() {
        assert!(Effect::Pure < Effect::Impure);
        assert!(Effect::Impure < Effect::Coroutine);
    }

    #[test]
    fn status_class_from_first_byte() {
        assert_eq!(
            StatusClass::from_message("#bad header"),
            Some(StatusClass::Error)
        );
        assert_eq!(
            StatusClass::from_message("$short read"),
            Some(StatusClass::Suspension)
        );
        assert_eq!(
            StatusClass::from_message("@dropped trailer"),
            Some(StatusClass::Warning)
        );
        assert_eq!(StatusClass::from_message("plain"), None);
    }
}
