//! Expression parsing.

use crate::ast::{Arg, AssocOp, BinaryOp, Effect, Expr, ExprKind, Lit, UnaryOp};
use crate::error::{ParseError, ParseErrorKind};
use crate::token::TokenType;

use super::{ParseResult, Parser, MAX_PARSE_DEPTH};

fn binary_op(ty: TokenType) -> Option<BinaryOp> {
    use TokenType::*;
    Some(match ty {
        Plus => BinaryOp::Add,
        Minus => BinaryOp::Sub,
        Star => BinaryOp::Mul,
        Slash => BinaryOp::Div,
        Percent => BinaryOp::Mod,
        Shl => BinaryOp::Shl,
        Shr => BinaryOp::Shr,
        Amp => BinaryOp::BitAnd,
        Pipe => BinaryOp::BitOr,
        Caret => BinaryOp::BitXor,
        ModAdd => BinaryOp::ModAdd,
        ModSub => BinaryOp::ModSub,
        ModMul => BinaryOp::ModMul,
        ModShl => BinaryOp::ModShl,
        SatAdd => BinaryOp::SatAdd,
        SatSub => BinaryOp::SatSub,
        EqEq => BinaryOp::Eq,
        NotEq => BinaryOp::NotEq,
        Lt => BinaryOp::Lt,
        LtEq => BinaryOp::LtEq,
        Gt => BinaryOp::Gt,
        GtEq => BinaryOp::GtEq,
        And => BinaryOp::And,
        Or => BinaryOp::Or,
        _ => return None,
    })
}

pub trait ExprParsing {
    fn parse_expr(&mut self) -> ParseResult<Expr>;
    fn parse_unary(&mut self) -> ParseResult<Expr>;
    fn parse_postfix(&mut self) -> ParseResult<Expr>;
    fn parse_primary(&mut self) -> ParseResult<Expr>;
    fn parse_args(&mut self) -> ParseResult<Vec<Arg>>;
}

impl<'int> ExprParsing for Parser<'int> {
    /// One binary level. Chains of a single associative operator fold into
    /// an n-ary node; two different operators in a row are ambiguous.
    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            self.depth -= 1;
            return Err(ParseError::new(ParseErrorKind::TooDeep, self.peek().span));
        }
        let result = (|| {
            let first = self.parse_unary()?;
            let Some(op) = binary_op(self.peek_ty()) else {
                return Ok(first);
            };

            let mut operands = vec![first];
            let mut seen = op;
            while let Some(next) = binary_op(self.peek_ty()) {
                if next != seen {
                    return Err(ParseError::new(
                        ParseErrorKind::AmbiguousPrecedence,
                        self.peek().span,
                    ));
                }
                seen = next;
                self.bump();
                operands.push(self.parse_unary()?);
            }

            let span = operands[0].span.to(operands[operands.len() - 1].span);
            if operands.len() == 2 {
                let rhs = operands.pop();
                if let (Some(lhs), Some(rhs)) = (operands.pop(), rhs) {
                    return Ok(Expr::new(
                        ExprKind::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    ));
                }
            }
            match AssocOp::from_binary(op) {
                Some(assoc) => Ok(Expr::new(
                    ExprKind::Assoc {
                        op: assoc,
                        operands,
                    },
                    span,
                )),
                None => Err(ParseError::new(ParseErrorKind::AmbiguousPrecedence, span)),
            }
        })();
        self.depth -= 1;
        result
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let op = match self.peek_ty() {
            TokenType::Plus => Some(UnaryOp::Pos),
            TokenType::Minus => Some(UnaryOp::Neg),
            TokenType::Not => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = Box::new(self.parse_unary()?);
            let span = start.to(operand.span);
            return Ok(Expr::new(ExprKind::Unary { op, operand }, span));
        }
        self.parse_postfix()
    }

    /// Selector, index, slice, call and `as` suffixes.
    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut e = self.parse_primary()?;
        loop {
            match self.peek_ty() {
                TokenType::Dot => {
                    self.bump();
                    let (name, end) = self.expect_ident()?;
                    let span = e.span.to(end);
                    e = Expr::new(
                        ExprKind::Selector {
                            recv: Box::new(e),
                            name,
                        },
                        span,
                    );
                }
                TokenType::LBracket => {
                    self.bump();
                    let lo = if self.at(TokenType::DotDot) {
                        None
                    } else {
                        Some(Box::new(self.parse_expr()?))
                    };
                    if self.eat(TokenType::DotDot) {
                        let hi = if self.at(TokenType::RBracket) {
                            None
                        } else {
                            Some(Box::new(self.parse_expr()?))
                        };
                        let end = self.expect(TokenType::RBracket)?.span;
                        let span = e.span.to(end);
                        e = Expr::new(
                            ExprKind::SliceOf {
                                recv: Box::new(e),
                                lo,
                                hi,
                            },
                            span,
                        );
                    } else {
                        let end = self.expect(TokenType::RBracket)?.span;
                        let index = lo.ok_or_else(|| self.unexpected("index expression"))?;
                        let span = e.span.to(end);
                        e = Expr::new(
                            ExprKind::Index {
                                recv: Box::new(e),
                                index,
                            },
                            span,
                        );
                    }
                }
                TokenType::LParen => {
                    self.bump();
                    let args = self.parse_args()?;
                    let end = self.expect(TokenType::RParen)?.span;
                    let span = e.span.to(end);
                    e = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(e),
                            args,
                            effect: Effect::Pure,
                        },
                        span,
                    );
                }
                // Effect-marked call: `f!(..)` or `f?(..)`.
                TokenType::Bang | TokenType::Question => {
                    let effect = if self.at(TokenType::Bang) {
                        Effect::Impure
                    } else {
                        Effect::Coroutine
                    };
                    // Only a call marker when parentheses follow.
                    if self.tokens.get(self.pos + 1).map(|t| t.ty) != Some(TokenType::LParen) {
                        return Ok(e);
                    }
                    self.bump();
                    self.bump();
                    let args = self.parse_args()?;
                    let end = self.expect(TokenType::RParen)?.span;
                    let span = e.span.to(end);
                    e = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(e),
                            args,
                            effect,
                        },
                        span,
                    );
                }
                TokenType::As => {
                    self.bump();
                    let target = self.parse_type()?;
                    let span = e.span.to(target.span);
                    e = Expr::new(
                        ExprKind::As {
                            value: Box::new(e),
                            target,
                        },
                        span,
                    );
                }
                _ => return Ok(e),
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let t = self.peek();
        let e = match t.ty {
            TokenType::Number(s) => Expr::new(ExprKind::Literal(Lit::Number(s)), t.span),
            TokenType::Str(s) => Expr::new(ExprKind::Literal(Lit::Status(s)), t.span),
            TokenType::True => Expr::new(ExprKind::Literal(Lit::Bool(true)), t.span),
            TokenType::False => Expr::new(ExprKind::Literal(Lit::Bool(false)), t.span),
            TokenType::Ok_ => Expr::new(ExprKind::Literal(Lit::Ok_), t.span),
            TokenType::Nullptr => Expr::new(ExprKind::Literal(Lit::Nullptr), t.span),
            TokenType::This => Expr::new(ExprKind::This, t.span),
            TokenType::Ident(s) => Expr::new(ExprKind::Ident(s), t.span),
            TokenType::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(TokenType::RParen)?;
                return Ok(inner);
            }
            TokenType::LBracket => {
                self.bump();
                let mut items = Vec::new();
                while !self.at(TokenType::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.eat(TokenType::Comma) {
                        break;
                    }
                }
                let end = self.expect(TokenType::RBracket)?.span;
                return Ok(Expr::new(ExprKind::List(items), t.span.to(end)));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.bump();
        Ok(e)
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Arg>> {
        let mut args = Vec::new();
        while !self.at(TokenType::RParen) {
            let (name, _) = self.expect_ident()?;
            self.expect(TokenType::Colon)?;
            let value = self.parse_expr()?;
            args.push(Arg { name, value });
            if !self.eat(TokenType::Comma) {
                break;
            }
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use crate::lexer::Lexer;

    fn parse_one(src: &str) -> Result<Expr, ParseError> {
        let mut interner = Interner::new();
        let tokens = Lexer::new(src, &mut interner).tokenize()?;
        let mut p = Parser::new(tokens, &mut interner);
        p.parse_expr()
    }

    #[test]
    fn chains_of_one_operator_fold() {
        let e = parse_one("a + b + c").unwrap();
        let ExprKind::Assoc { op, operands } = &e.kind else {
            panic!("expected assoc node");
        };
        assert_eq!(*op, AssocOp::Add);
        assert_eq!(operands.len(), 3);
    }

    #[test]
    fn mixed_operators_are_ambiguous() {
        let err = parse_one("a + b * c").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::AmbiguousPrecedence));
    }

    #[test]
    fn nonassociative_chains_are_rejected() {
        let err = parse_one("a - b - c").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::AmbiguousPrecedence));
    }

    #[test]
    fn parenthesized_mixing_is_fine() {
        let e = parse_one("a + (b * c)").unwrap();
        assert!(matches!(e.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn effect_marked_calls() {
        let e = parse_one("src.read_u8?()").unwrap();
        let ExprKind::Call { effect, callee, .. } = &e.kind else {
            panic!("expected call");
        };
        assert_eq!(*effect, Effect::Coroutine);
        assert!(matches!(callee.kind, ExprKind::Selector { .. }));
    }

    #[test]
    fn bang_without_parens_is_not_a_call() {
        // `a != b` must lex as one token, not `a ! = b`.
        let e = parse_one("a != b").unwrap();
        assert!(matches!(
            e.kind,
            ExprKind::Binary {
                op: BinaryOp::NotEq,
                ..
            }
        ));
    }

    #[test]
    fn slice_with_open_ends() {
        let e = parse_one("a[.. n]").unwrap();
        let ExprKind::SliceOf { lo, hi, .. } = &e.kind else {
            panic!("expected slice");
        };
        assert!(lo.is_none());
        assert!(hi.is_some());
    }

    #[test]
    fn as_conversion_binds_tighter_than_binary() {
        let e = parse_one("x as base.u8").unwrap();
        assert!(matches!(e.kind, ExprKind::As { .. }));
    }
}
