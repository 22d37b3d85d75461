//! Lexer for Sift source text.
//!
//! The surface is plain ASCII; identifiers and literal spellings are
//! interned on the fly so later passes work with symbols.

use crate::error::{ParseError, ParseErrorKind};
use crate::intern::Interner;
use crate::token::{keyword, Span, Token, TokenType};

pub struct Lexer<'a, 'int> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    interner: &'int mut Interner,
}

impl<'a, 'int> Lexer<'a, 'int> {
    pub fn new(source: &'a str, interner: &'int mut Interner) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            interner,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let Some(b) = self.peek() else {
                tokens.push(Token::new(TokenType::Eof, Span::new(start, start)));
                return Ok(tokens);
            };

            let ty = match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.ident(),
                b'0'..=b'9' => self.number(),
                b'"' => self.string()?,
                b'~' => self.tilde_op()?,
                _ => self.operator()?,
            };
            tokens.push(Token::new(ty, Span::new(start, self.pos)));
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Consume `expected` if it is next; reports whether it was.
    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn ident(&mut self) -> TokenType {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        keyword(text).unwrap_or_else(|| TokenType::Ident(self.interner.intern(text)))
    }

    fn number(&mut self) -> TokenType {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.pos += 2;
            while matches!(self.peek(), Some(b) if b.is_ascii_hexdigit() || b == b'_') {
                self.pos += 1;
            }
        } else {
            while matches!(self.peek(), Some(b) if b.is_ascii_digit() || b == b'_') {
                self.pos += 1;
            }
        }
        TokenType::Number(self.interner.intern(&self.source[start..self.pos]))
    }

    fn string(&mut self) -> Result<TokenType, ParseError> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnterminatedString,
                        Span::new(start, self.pos),
                    ));
                }
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'"') => text.push('"'),
                    Some(b'\\') => text.push('\\'),
                    Some(b'n') => text.push('\n'),
                    Some(b't') => text.push('\t'),
                    other => {
                        return Err(ParseError::new(
                            ParseErrorKind::BadEscape(other.map(char::from).unwrap_or(' ')),
                            Span::new(self.pos.saturating_sub(2), self.pos),
                        ));
                    }
                },
                Some(b) => text.push(char::from(b)),
            }
        }
        Ok(TokenType::Str(self.interner.intern(&text)))
    }

    /// The `~mod`/`~sat` operator family: `~`, a word, then the operator.
    fn tilde_op(&mut self) -> Result<TokenType, ParseError> {
        let start = self.pos;
        self.pos += 1; // ~
        let word_start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_lowercase()) {
            self.pos += 1;
        }
        let word = &self.source[word_start..self.pos];
        let saturating = match word {
            "mod" => false,
            "sat" => true,
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedChar('~'),
                    Span::new(start, self.pos),
                ));
            }
        };

        use TokenType::*;
        let ty = match self.bump() {
            Some(b'+') if self.eat(b'=') => if saturating { SatAddEq } else { ModAddEq },
            Some(b'+') => if saturating { SatAdd } else { ModAdd },
            Some(b'-') if self.eat(b'=') => if saturating { SatSubEq } else { ModSubEq },
            Some(b'-') => if saturating { SatSub } else { ModSub },
            Some(b'*') if !saturating => ModMul,
            Some(b'<') if !saturating && self.eat(b'<') => {
                if self.eat(b'=') {
                    ModShlEq
                } else {
                    ModShl
                }
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedChar('~'),
                    Span::new(start, self.pos),
                ));
            }
        };
        Ok(ty)
    }

    fn operator(&mut self) -> Result<TokenType, ParseError> {
        use TokenType::*;
        let start = self.pos;
        let b = self.bump().unwrap_or(0);
        let ty = match b {
            b'(' => LParen,
            b')' => RParen,
            b'[' => LBracket,
            b']' => RBracket,
            b'{' => LBrace,
            b'}' => RBrace,
            b',' => Comma,
            b':' => Colon,
            b';' => Semicolon,
            b'.' => {
                if self.eat(b'.') {
                    DotDot
                } else {
                    Dot
                }
            }
            b'?' => Question,
            b'+' => {
                if self.eat(b'=') {
                    PlusEq
                } else {
                    Plus
                }
            }
            b'-' => {
                if self.eat(b'=') {
                    MinusEq
                } else {
                    Minus
                }
            }
            b'*' => {
                if self.eat(b'=') {
                    StarEq
                } else {
                    Star
                }
            }
            b'/' => {
                if self.eat(b'=') {
                    SlashEq
                } else {
                    Slash
                }
            }
            b'%' => {
                if self.eat(b'=') {
                    PercentEq
                } else {
                    Percent
                }
            }
            b'&' => {
                if self.eat(b'=') {
                    AmpEq
                } else {
                    Amp
                }
            }
            b'|' => {
                if self.eat(b'=') {
                    PipeEq
                } else {
                    Pipe
                }
            }
            b'^' => {
                if self.eat(b'=') {
                    CaretEq
                } else {
                    Caret
                }
            }
            b'!' => {
                if self.eat(b'=') {
                    NotEq
                } else {
                    Bang
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    EqEq
                } else if self.eat(b'?') {
                    AssignQ
                } else {
                    Assign
                }
            }
            b'<' => {
                if self.eat(b'<') {
                    if self.eat(b'=') {
                        ShlEq
                    } else {
                        Shl
                    }
                } else if self.eat(b'=') {
                    LtEq
                } else {
                    Lt
                }
            }
            b'>' => {
                if self.eat(b'>') {
                    if self.eat(b'=') {
                        ShrEq
                    } else {
                        Shr
                    }
                } else if self.eat(b'=') {
                    GtEq
                } else {
                    Gt
                }
            }
            other => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedChar(char::from(other)),
                    Span::new(start, self.pos),
                ));
            }
        };
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<TokenType> {
        let mut interner = Interner::new();
        Lexer::new(src, &mut interner)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.ty)
            .collect()
    }

    #[test]
    fn keywords_and_idents() {
        let mut interner = Interner::new();
        let tokens = Lexer::new("var xyz", &mut interner).tokenize().unwrap();
        assert_eq!(tokens[0].ty, TokenType::Var);
        assert!(matches!(tokens[1].ty, TokenType::Ident(_)));
        assert_eq!(tokens[2].ty, TokenType::Eof);
    }

    #[test]
    fn tilde_operator_family() {
        use TokenType::*;
        let types = lex("x ~mod+= 1 ~sat- y ~mod<< 2 ~mod<<=");
        let ops: Vec<_> = types
            .iter()
            .filter(|t| !matches!(t, Ident(_) | Number(_) | Eof))
            .collect();
        assert_eq!(ops, [&ModAddEq, &SatSub, &ModShl, &ModShlEq]);
    }

    #[test]
    fn compound_assignment_spellings() {
        use TokenType::*;
        assert_eq!(lex("<<=")[0], ShlEq);
        assert_eq!(lex("<<")[0], Shl);
        assert_eq!(lex("<=")[0], LtEq);
        assert_eq!(lex("=?")[0], AssignQ);
        assert_eq!(lex("==")[0], EqEq);
        assert_eq!(lex("..")[0], DotDot);
    }

    #[test]
    fn number_spellings_are_kept_raw() {
        let mut interner = Interner::new();
        let tokens = Lexer::new("0xFF 255", &mut interner).tokenize().unwrap();
        let TokenType::Number(hex) = tokens[0].ty else {
            panic!("expected number");
        };
        assert_eq!(interner.resolve(hex), "0xFF");
    }

    #[test]
    fn comments_are_trivia() {
        let types = lex("x // all of this vanishes\ny");
        assert_eq!(types.len(), 3);
    }

    #[test]
    fn status_string_literal() {
        let mut interner = Interner::new();
        let tokens = Lexer::new("\"#bad header\"", &mut interner)
            .tokenize()
            .unwrap();
        let TokenType::Str(s) = tokens[0].ty else {
            panic!("expected string");
        };
        assert_eq!(interner.resolve(s), "#bad header");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut interner = Interner::new();
        let err = Lexer::new("\"oops", &mut interner).tokenize().unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnterminatedString));
    }
}
