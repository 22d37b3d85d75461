use std::fmt;

use crate::style::Style;
use crate::token::Span;

/// An error produced while lexing or parsing a source file.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ParseErrorKind {
    UnexpectedChar(char),
    UnterminatedString,
    BadEscape(char),
    /// Something other than what the grammar called for.
    UnexpectedToken {
        expected: String,
        found: String,
    },
    /// `a + b * c` without parentheses: binary operators do not mix.
    AmbiguousPrecedence,
    DuplicateLabel(String),
    TooDeep,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        ParseError { kind, span }
    }

    /// Render the error with a source excerpt and caret underline.
    pub fn display_with_source(&self, source: &str) -> String {
        let (line_num, line_start, line_content) = line_context(source, self.span.start);
        let col = self.span.start.saturating_sub(line_start);
        let len = (self.span.end - self.span.start).max(1).min(line_content.len().saturating_sub(col).max(1));
        let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));

        format!(
            "{}: {}\n\n{} {} {}\n     {} {}",
            Style::bold_red("error"),
            self,
            Style::blue(&format!("{:4}", line_num)),
            Style::blue("|"),
            line_content,
            Style::blue("|"),
            Style::red(&underline)
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::UnexpectedChar(c) => write!(f, "unexpected character {:?}", c),
            ParseErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            ParseErrorKind::BadEscape(c) => write!(f, "unknown escape sequence \\{}", c),
            ParseErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ParseErrorKind::AmbiguousPrecedence => {
                write!(f, "binary operators do not mix; parenthesize the sub-expression")
            }
            ParseErrorKind::DuplicateLabel(l) => write!(f, "duplicate loop label {:?}", l),
            ParseErrorKind::TooDeep => write!(f, "expression nesting is too deep"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Locate the 1-based line number, the line's byte offset, and its text for
/// a byte position in `source`.
pub fn line_context(source: &str, pos: usize) -> (usize, usize, &str) {
    let mut line_num = 1;
    let mut line_start = 0;

    for (i, c) in source.char_indices() {
        if i >= pos {
            break;
        }
        if c == '\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }

    let line_end = source[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(source.len());

    (line_num, line_start, &source[line_start..line_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_context_finds_the_right_line() {
        let src = "first\nsecond\nthird";
        let (n, start, text) = line_context(src, src.find("second").unwrap() + 2);
        assert_eq!(n, 2);
        assert_eq!(start, 6);
        assert_eq!(text, "second");
    }

    #[test]
    fn line_context_at_start() {
        let (n, start, text) = line_context("only", 0);
        assert_eq!((n, start, text), (1, 0, "only"));
    }
}
