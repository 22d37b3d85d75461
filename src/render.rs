//! Canonical textual form of the AST.
//!
//! Rendering is deterministic: parsing the rendered form of a checked tree
//! yields the same tree, up to node identity. Fact dumps and diagnostics
//! use the same renderer so that proved predicates read like source.

use crate::ast::{
    Arg, Assertion, AssignStmt, Decl, ElseArm, Expr, ExprKind, IfStmt, IoBindStmt, IterateStmt,
    JumpKind, Lit, RetKind, RetStmt, SourceFile, Stmt, StmtKind, TypeExpr, TypeExprKind,
    UnaryOp, VarStmt, WhileStmt,
};
use crate::intern::Interner;

pub struct Renderer<'int> {
    interner: &'int Interner,
}

impl<'int> Renderer<'int> {
    pub fn new(interner: &'int Interner) -> Self {
        Renderer { interner }
    }

    pub fn expr(&self, e: &Expr) -> String {
        match &e.kind {
            ExprKind::Literal(lit) => match lit {
                // A synthetic constant has no spelling; print its value.
                Lit::Number(s) if s.is_empty() => e
                    .const_value()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                Lit::Number(s) => self.interner.resolve(*s).to_string(),
                Lit::Status(s) => format!("\"{}\"", self.interner.resolve(*s)),
                Lit::Bool(true) => "true".to_string(),
                Lit::Bool(false) => "false".to_string(),
                Lit::Ok_ => "ok".to_string(),
                Lit::Nullptr => "nullptr".to_string(),
            },
            ExprKind::Ident(s) => self.interner.resolve(*s).to_string(),
            ExprKind::This => "this".to_string(),
            ExprKind::Selector { recv, name } => {
                format!("{}.{}", self.operand(recv), self.interner.resolve(*name))
            }
            ExprKind::Index { recv, index } => {
                format!("{}[{}]", self.operand(recv), self.expr(index))
            }
            ExprKind::SliceOf { recv, lo, hi } => format!(
                "{}[{} .. {}]",
                self.operand(recv),
                lo.as_deref().map(|e| self.expr(e)).unwrap_or_default(),
                hi.as_deref().map(|e| self.expr(e)).unwrap_or_default(),
            ),
            ExprKind::Call { callee, args, effect } => format!(
                "{}{}({})",
                self.operand(callee),
                effect.marker(),
                self.args(args),
            ),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => format!("not {}", self.operand(operand)),
                _ => format!("{}{}", op.spelling(), self.operand(operand)),
            },
            ExprKind::Binary { op, lhs, rhs } => format!(
                "{} {} {}",
                self.operand(lhs),
                op.spelling(),
                self.operand(rhs)
            ),
            ExprKind::Assoc { op, operands } => operands
                .iter()
                .map(|o| self.operand(o))
                .collect::<Vec<_>>()
                .join(&format!(" {} ", op.binary().spelling())),
            ExprKind::As { value, target } => {
                format!("{} as {}", self.operand(value), self.type_expr(target))
            }
            ExprKind::List(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(|i| self.expr(i))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// An expression in operand position: compound forms are parenthesized
    /// so that operators never mix without parentheses.
    fn operand(&self, e: &Expr) -> String {
        match &e.kind {
            ExprKind::Binary { .. } | ExprKind::Assoc { .. } | ExprKind::As { .. }
            | ExprKind::Unary { .. } => {
                format!("({})", self.expr(e))
            }
            _ => self.expr(e),
        }
    }

    fn args(&self, args: &[Arg]) -> String {
        args.iter()
            .map(|a| format!("{}: {}", self.interner.resolve(a.name), self.expr(&a.value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn type_expr(&self, t: &TypeExpr) -> String {
        match &t.kind {
            TypeExprKind::Named { qid, refinement } => {
                let mut s = qid.display(self.interner);
                if let Some(r) = refinement {
                    s.push('[');
                    if let Some(lo) = &r.lo {
                        s.push_str(&self.expr(lo));
                    }
                    s.push_str(" .. ");
                    if let Some(hi) = &r.hi {
                        s.push_str(&self.expr(hi));
                    }
                    s.push(']');
                }
                s
            }
            TypeExprKind::Array { len, elem } => {
                format!("array[{}] {}", self.expr(len), self.type_expr(elem))
            }
            TypeExprKind::Slice(elem) => format!("slice {}", self.type_expr(elem)),
            TypeExprKind::Table(elem) => format!("table {}", self.type_expr(elem)),
            TypeExprKind::Nptr(inner) => format!("nptr {}", self.type_expr(inner)),
            TypeExprKind::Ptr(inner) => format!("ptr {}", self.type_expr(inner)),
        }
    }

    pub fn stmt(&self, s: &Stmt, indent: usize) -> String {
        let pad = "    ".repeat(indent);
        match &s.kind {
            StmtKind::Var(VarStmt { name, typ }) => format!(
                "{}var {} : {}",
                pad,
                self.interner.resolve(*name),
                self.type_expr(typ)
            ),
            StmtKind::Assign(AssignStmt { op, lhs, rhs }) => format!(
                "{}{} {} {}",
                pad,
                self.expr(lhs),
                op.spelling(),
                self.expr(rhs)
            ),
            StmtKind::Expr(e) => format!("{}{}", pad, self.expr(e)),
            StmtKind::If(ifs) => format!("{}{}", pad, self.if_stmt(ifs, indent)),
            StmtKind::While(w) => self.while_stmt(w, indent),
            StmtKind::Iterate(it) => self.iterate_stmt(it, indent),
            StmtKind::Jump(j) => {
                let word = match j.kind {
                    JumpKind::Break => "break",
                    JumpKind::Continue => "continue",
                };
                match j.label {
                    Some(l) => format!("{}{}.{}", pad, word, self.interner.resolve(l)),
                    None => format!("{}{}", pad, word),
                }
            }
            StmtKind::Ret(RetStmt { kind, value }) => {
                let word = match kind {
                    RetKind::Return => "return",
                    RetKind::Yield => "yield",
                };
                match value {
                    Some(v) => format!("{}{} {}", pad, word, self.expr(v)),
                    None => format!("{}{}", pad, word),
                }
            }
            StmtKind::Assert(a) => format!("{}{}", pad, self.assertion(a)),
            StmtKind::IoBind(IoBindStmt { io, limit, body }) => format!(
                "{}io_bind (io: {}, limit: {}) {}",
                pad,
                self.expr(io),
                self.expr(limit),
                self.block(body, indent)
            ),
        }
    }

    pub fn assertion(&self, a: &Assertion) -> String {
        let word = match a.kind {
            crate::ast::AssertKind::Assert => "assert",
            crate::ast::AssertKind::Pre => "pre",
            crate::ast::AssertKind::Inv => "inv",
            crate::ast::AssertKind::Post => "post",
        };
        let mut s = format!("{} {}", word, self.expr(&a.cond));
        if let Some(reason) = a.reason {
            s.push_str(&format!(" via \"{}\"", self.interner.resolve(reason)));
            if !a.args.is_empty() {
                s.push('{');
                s.push_str(&self.args(&a.args));
                s.push('}');
            }
        }
        s
    }

    fn if_stmt(&self, ifs: &IfStmt, indent: usize) -> String {
        let mut s = format!(
            "if {} {}",
            self.expr(&ifs.cond),
            self.block(&ifs.then_block, indent)
        );
        match &ifs.else_arm {
            ElseArm::None => {}
            ElseArm::ElseIf(next) => {
                s.push_str(" else ");
                s.push_str(&self.if_stmt(next, indent));
            }
            ElseArm::Block(block) => {
                s.push_str(" else ");
                s.push_str(&self.block(block, indent));
            }
        }
        s
    }

    fn loop_clauses(&self, asserts: &[Assertion]) -> String {
        asserts
            .iter()
            .map(|a| format!(",\n    {}", self.assertion(a)))
            .collect::<String>()
    }

    fn while_stmt(&self, w: &WhileStmt, indent: usize) -> String {
        let pad = "    ".repeat(indent);
        let label = w
            .label
            .map(|l| format!(".{}", self.interner.resolve(l)))
            .unwrap_or_default();
        format!(
            "{}while{} {}{} {}",
            pad,
            label,
            self.expr(&w.cond),
            self.loop_clauses(&w.asserts),
            self.block(&w.body, indent)
        )
    }

    fn iterate_stmt(&self, it: &IterateStmt, indent: usize) -> String {
        let pad = "    ".repeat(indent);
        let label = it
            .label
            .map(|l| format!(".{}", self.interner.resolve(l)))
            .unwrap_or_default();
        format!(
            "{}iterate{} ({} : {}){} {}",
            pad,
            label,
            self.interner.resolve(it.var),
            self.expr(&it.source),
            self.loop_clauses(&it.asserts),
            self.block(&it.body, indent)
        )
    }

    pub fn block(&self, block: &[Stmt], indent: usize) -> String {
        if block.is_empty() {
            return "{\n".to_string() + &"    ".repeat(indent) + "}";
        }
        let mut s = "{\n".to_string();
        for stmt in block {
            s.push_str(&self.stmt(stmt, indent + 1));
            s.push('\n');
        }
        s.push_str(&"    ".repeat(indent));
        s.push('}');
        s
    }

    pub fn decl(&self, d: &Decl) -> String {
        match d {
            Decl::Use(u) => format!("use \"{}\"", self.interner.resolve(u.path)),
            Decl::Status(st) => format!(
                "{} status \"{}\"",
                vis(st.vis),
                self.interner.resolve(st.message)
            ),
            Decl::Const(c) => format!(
                "{} const {} : {} = {}",
                vis(c.vis),
                self.interner.resolve(c.name),
                self.type_expr(&c.typ),
                self.expr(&c.value)
            ),
            Decl::Struct(st) => {
                let mut s = format!("{} struct {}", vis(st.vis), self.interner.resolve(st.name));
                if !st.implements.is_empty() {
                    s.push_str(" implements ");
                    s.push_str(
                        &st.implements
                            .iter()
                            .map(|q| q.display(self.interner))
                            .collect::<Vec<_>>()
                            .join(", "),
                    );
                }
                s.push_str(" {\n");
                for f in &st.fields {
                    s.push_str(&format!(
                        "    {} : {},\n",
                        self.interner.resolve(f.name),
                        self.type_expr(&f.typ)
                    ));
                }
                s.push('}');
                s
            }
            Decl::Func(f) => {
                let mut s = format!("{} func ", vis(f.vis));
                if let Some(recv) = f.receiver {
                    s.push_str(self.interner.resolve(recv));
                    s.push('.');
                }
                s.push_str(self.interner.resolve(f.name));
                s.push_str(f.effect.marker());
                s.push('(');
                s.push_str(
                    &f.args
                        .iter()
                        .map(|a| {
                            format!(
                                "{} : {}",
                                self.interner.resolve(a.name),
                                self.type_expr(&a.typ)
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(", "),
                );
                s.push(')');
                if let Some(out) = &f.out {
                    s.push(' ');
                    s.push_str(&self.type_expr(out));
                }
                for a in &f.contract {
                    s.push_str(",\n");
                    s.push_str(&self.assertion(a));
                }
                s.push(' ');
                s.push_str(&self.block(&f.body, 0));
                s
            }
        }
    }

    pub fn file(&self, file: &SourceFile) -> String {
        let mut s = String::new();
        for d in &file.decls {
            s.push_str(&self.decl(d));
            s.push_str("\n\n");
        }
        s
    }
}

fn vis(v: crate::ast::Visibility) -> &'static str {
    match v {
        crate::ast::Visibility::Public => "pub",
        crate::ast::Visibility::Private => "pri",
    }
}
