//! Statement parsing.

use crate::ast::{
    AssertKind, Assertion, AssignOp, AssignStmt, ElseArm, IfStmt, IoBindStmt, IterateStmt,
    JumpKind, JumpStmt, RetKind, RetStmt, Stmt, StmtKind, VarStmt, WhileStmt,
};
use crate::intern::Symbol;
use crate::token::TokenType;

use super::{ExprParsing, ParseResult, Parser};

fn assign_op(ty: TokenType) -> Option<AssignOp> {
    use TokenType::*;
    Some(match ty {
        Assign => AssignOp::Eq,
        AssignQ => AssignOp::EqQuestion,
        PlusEq => AssignOp::Add,
        MinusEq => AssignOp::Sub,
        StarEq => AssignOp::Mul,
        SlashEq => AssignOp::Div,
        PercentEq => AssignOp::Mod,
        AmpEq => AssignOp::BitAnd,
        PipeEq => AssignOp::BitOr,
        CaretEq => AssignOp::BitXor,
        ShlEq => AssignOp::Shl,
        ShrEq => AssignOp::Shr,
        ModAddEq => AssignOp::ModAdd,
        ModSubEq => AssignOp::ModSub,
        ModShlEq => AssignOp::ModShl,
        SatAddEq => AssignOp::SatAdd,
        SatSubEq => AssignOp::SatSub,
        _ => return None,
    })
}

fn starts_stmt(ty: TokenType) -> bool {
    use TokenType::*;
    matches!(
        ty,
        Var | If | While | Iterate | Break | Continue | Return | Yield | Assert | IoBind | RBrace
    )
}

pub trait StmtParsing {
    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>>;
    fn parse_stmt(&mut self) -> ParseResult<Stmt>;
    fn parse_assert_clause(&mut self) -> ParseResult<Assertion>;
}

impl<'int> StmtParsing for Parser<'int> {
    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(TokenType::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(TokenType::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenType::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let start = self.peek().span;
        match self.peek_ty() {
            TokenType::Var => {
                self.bump();
                let (name, _) = self.expect_ident()?;
                self.eat(TokenType::Colon);
                let typ = self.parse_type()?;
                let span = start.to(typ.span);
                Ok(Stmt::new(StmtKind::Var(VarStmt { name, typ }), span))
            }
            TokenType::If => {
                let ifs = self.parse_if()?;
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                Ok(Stmt::new(StmtKind::If(ifs), start.to(end)))
            }
            TokenType::While => {
                self.bump();
                let label = self.parse_label()?;
                let cond = self.parse_expr()?;
                let asserts = self.parse_loop_clauses()?;
                let loop_id = self.next_loop_id();
                let body = self.parse_block()?;
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                Ok(Stmt::new(
                    StmtKind::While(Box::new(WhileStmt {
                        label,
                        cond,
                        asserts,
                        body,
                        loop_id,
                        has_break: false,
                        has_continue: false,
                    })),
                    start.to(end),
                ))
            }
            TokenType::Iterate => {
                self.bump();
                let label = self.parse_label()?;
                self.expect(TokenType::LParen)?;
                let (var, _) = self.expect_ident()?;
                self.expect(TokenType::Colon)?;
                let source = self.parse_expr()?;
                self.expect(TokenType::RParen)?;
                let asserts = self.parse_loop_clauses()?;
                let loop_id = self.next_loop_id();
                let body = self.parse_block()?;
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                Ok(Stmt::new(
                    StmtKind::Iterate(Box::new(IterateStmt {
                        label,
                        var,
                        source,
                        asserts,
                        body,
                        loop_id,
                        has_break: false,
                        has_continue: false,
                    })),
                    start.to(end),
                ))
            }
            TokenType::Break | TokenType::Continue => {
                let kind = if self.at(TokenType::Break) {
                    JumpKind::Break
                } else {
                    JumpKind::Continue
                };
                self.bump();
                let label = self.parse_label()?;
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                Ok(Stmt::new(
                    StmtKind::Jump(JumpStmt::new(kind, label)),
                    start.to(end),
                ))
            }
            TokenType::Return | TokenType::Yield => {
                let kind = if self.at(TokenType::Return) {
                    RetKind::Return
                } else {
                    RetKind::Yield
                };
                self.bump();
                let value = if starts_stmt(self.peek_ty()) || self.at(TokenType::Eof) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                Ok(Stmt::new(
                    StmtKind::Ret(RetStmt { kind, value }),
                    start.to(end),
                ))
            }
            TokenType::Assert => {
                let a = self.parse_assert_clause()?;
                let span = a.span;
                Ok(Stmt::new(StmtKind::Assert(a), span))
            }
            TokenType::IoBind => {
                self.bump();
                self.expect(TokenType::LParen)?;
                self.expect_named_arg("io")?;
                let io = self.parse_expr()?;
                self.expect(TokenType::Comma)?;
                self.expect_named_arg("limit")?;
                let limit = self.parse_expr()?;
                self.expect(TokenType::RParen)?;
                let body = self.parse_block()?;
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                Ok(Stmt::new(
                    StmtKind::IoBind(IoBindStmt { io, limit, body }),
                    start.to(end),
                ))
            }
            _ => {
                // Assignment or bare call.
                let lhs = self.parse_expr()?;
                if let Some(op) = assign_op(self.peek_ty()) {
                    self.bump();
                    let rhs = self.parse_expr()?;
                    let span = start.to(rhs.span);
                    Ok(Stmt::new(StmtKind::Assign(AssignStmt { op, lhs, rhs }), span))
                } else {
                    let span = lhs.span;
                    Ok(Stmt::new(StmtKind::Expr(lhs), span))
                }
            }
        }
    }

    /// `assert cond via "reason"{name: arg, ..}` or a bare `pre`/`inv`/`post`
    /// clause.
    fn parse_assert_clause(&mut self) -> ParseResult<Assertion> {
        let start = self.peek().span;
        let kind = match self.peek_ty() {
            TokenType::Assert => AssertKind::Assert,
            TokenType::Pre => AssertKind::Pre,
            TokenType::Inv => AssertKind::Inv,
            TokenType::Post => AssertKind::Post,
            _ => return Err(self.unexpected("assert, pre, inv or post")),
        };
        self.bump();
        let cond = self.parse_expr()?;

        let mut reason = None;
        let mut args = Vec::new();
        if self.eat(TokenType::Via) {
            let (r, _) = self.expect_str()?;
            reason = Some(r);
            if self.eat(TokenType::LBrace) {
                while !self.at(TokenType::RBrace) {
                    let (name, _) = self.expect_ident()?;
                    self.expect(TokenType::Colon)?;
                    let value = self.parse_expr()?;
                    args.push(crate::ast::Arg { name, value });
                    if !self.eat(TokenType::Comma) {
                        break;
                    }
                }
                self.expect(TokenType::RBrace)?;
            }
        }

        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(Assertion {
            kind,
            cond,
            reason,
            args,
            span: start.to(end),
        })
    }
}

impl<'int> Parser<'int> {
    fn parse_if(&mut self) -> ParseResult<IfStmt> {
        self.expect(TokenType::If)?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_arm = if self.eat(TokenType::Else) {
            if self.at(TokenType::If) {
                ElseArm::ElseIf(Box::new(self.parse_if()?))
            } else {
                ElseArm::Block(self.parse_block()?)
            }
        } else {
            ElseArm::None
        };
        Ok(IfStmt {
            cond,
            then_block,
            else_arm,
        })
    }

    fn parse_label(&mut self) -> ParseResult<Option<Symbol>> {
        if self.eat(TokenType::Dot) {
            let (label, _) = self.expect_ident()?;
            Ok(Some(label))
        } else {
            Ok(None)
        }
    }

    fn parse_loop_clauses(&mut self) -> ParseResult<Vec<Assertion>> {
        let mut asserts = Vec::new();
        while self.eat(TokenType::Comma) {
            asserts.push(self.parse_assert_clause()?);
        }
        Ok(asserts)
    }

    /// `name :` where the name's spelling is fixed by the statement form.
    fn expect_named_arg(&mut self, want: &str) -> ParseResult<()> {
        let (sym, _) = self.expect_ident()?;
        if self.interner.resolve(sym) != want {
            return Err(self.unexpected(want));
        }
        self.expect(TokenType::Colon)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::intern::Interner;
    use crate::lexer::Lexer;

    fn parse_block_src(src: &str) -> Result<Vec<Stmt>, ParseError> {
        let mut interner = Interner::new();
        let tokens = Lexer::new(src, &mut interner).tokenize()?;
        let mut p = Parser::new(tokens, &mut interner);
        p.parse_block()
    }

    #[test]
    fn var_accepts_optional_colon() {
        let with = parse_block_src("{ var x : base.u8[.. 10] }").unwrap();
        let without = parse_block_src("{ var x base.u8[.. 10] }").unwrap();
        assert!(matches!(with[0].kind, StmtKind::Var(_)));
        assert!(matches!(without[0].kind, StmtKind::Var(_)));
    }

    #[test]
    fn while_with_clauses_and_label() {
        let stmts =
            parse_block_src("{ while.outer i < 4, inv i <= 4, post i == 4 { break.outer } }")
                .unwrap();
        let StmtKind::While(w) = &stmts[0].kind else {
            panic!("expected while");
        };
        assert!(w.label.is_some());
        assert_eq!(w.asserts.len(), 2);
        assert_eq!(w.asserts[0].kind, AssertKind::Inv);
        let StmtKind::Jump(j) = &w.body[0].kind else {
            panic!("expected jump");
        };
        assert_eq!(j.kind, JumpKind::Break);
        assert!(j.label.is_some());
    }

    #[test]
    fn assert_via_with_bound_args() {
        let stmts =
            parse_block_src("{ assert n < m via \"a < b: a < c; c <= b\"{c: k} }").unwrap();
        let StmtKind::Assert(a) = &stmts[0].kind else {
            panic!("expected assert");
        };
        assert!(a.reason.is_some());
        assert_eq!(a.args.len(), 1);
    }

    #[test]
    fn io_bind_scoping_statement() {
        let stmts =
            parse_block_src("{ io_bind (io: src, limit: n) { x = src.read_u8?() } }").unwrap();
        let StmtKind::IoBind(b) = &stmts[0].kind else {
            panic!("expected io_bind");
        };
        assert_eq!(b.body.len(), 1);
    }

    #[test]
    fn compound_assignment_statements() {
        let stmts = parse_block_src("{ x ~sat+= 1 }").unwrap();
        let StmtKind::Assign(a) = &stmts[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(a.op, AssignOp::SatAdd);
    }

    #[test]
    fn assignment_from_coroutine_result() {
        let stmts = parse_block_src("{ c =? src.read_u8?() }").unwrap();
        let StmtKind::Assign(a) = &stmts[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(a.op, AssignOp::EqQuestion);
    }
}
