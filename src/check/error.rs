//! Checker error types.
//!
//! User errors carry a source location and, when raised inside a function
//! body, the fact set that held at the failing statement. Internal
//! invariant violations are a separate type with a stable marker string so
//! external tooling can tell the two apart.

use std::fmt;

use serde::Serialize;

use crate::ast::SlotConflict;
use crate::error::{line_context, ParseError};
use crate::style::Style;
use crate::token::Span;

/// Stable marker prefix on every internal error.
pub const INTERNAL_ERROR_MARKER: &str = "sift internal error";

#[derive(Debug, Clone)]
pub enum CheckErrorKind {
    // Symbols
    DuplicateTopLevelName(String),
    DuplicateLocal(String),
    UnknownIdentifier {
        name: String,
        suggestion: Option<String>,
    },
    UnknownType(String),
    UnknownPackage(String),
    UnknownStatus(String),
    MalformedStatus(String),
    UnknownField {
        receiver: String,
        name: String,
    },
    UnresolvedUse {
        path: String,
        detail: String,
    },
    StructCycle(String),

    // Types
    IncompatibleAssignment {
        expected: String,
        found: String,
    },
    ArityMismatch {
        callee: String,
        want: usize,
        got: usize,
    },
    ArgNameMismatch {
        callee: String,
        want: String,
        got: String,
    },
    NotCallable(String),
    NotAssignable(String),
    NonNumericIndex(String),
    NotIndexable(String),
    WrongOperandType {
        op: &'static str,
        found: String,
    },
    NotBool {
        what: &'static str,
        found: String,
    },
    InvalidConversion {
        from: String,
        to: String,
    },
    ConditionHasEffect,
    EffectMarkerMismatch {
        callee: String,
        declared: &'static str,
        marked: &'static str,
    },
    EffectExceedsCaller {
        callee: String,
    },
    ReturnTypeMismatch {
        expected: String,
        found: String,
    },
    YieldOutsideCoroutine,
    ConstArrayLengthMismatch {
        want: usize,
        got: usize,
    },
    NonConstant,

    // Refinements
    RefinementOutsideRange {
        refinement: String,
        range: String,
    },
    NonConstantRefinement,
    EmptyRefinement(String),
    NegativeArrayLength(String),

    // Bounds
    IntegerOverflow {
        value: String,
        range: String,
    },
    ShiftOutOfRange {
        count: String,
        ceiling: u64,
    },
    DivisionByZero,
    IndexOutOfRange {
        index: String,
        length: String,
    },
    SliceIndicesOutOfOrder,
    SignedOperand {
        op: &'static str,
    },
    InconsistentFacts(String),

    // Proofs
    CannotProve(String),
    NoSuchReason(String),
    ReasonDoesNotMatch {
        reason: String,
        condition: String,
    },
    ReasonPremiseUndischarged {
        reason: String,
        premise: String,
    },
    MissingReasonArg {
        reason: String,
        name: String,
    },

    // Interfaces
    MethodMissing {
        strukt: String,
        iface: String,
        method: String,
    },
    MethodSignatureMismatch {
        method: String,
        want: String,
        got: String,
    },
    UnknownInterface(String),

    // Control flow
    NoMatchingLoop,
    JumpOutOfIoBind,
    ReturnOutOfIoBind,
    TooDeep(&'static str),
}

impl fmt::Display for CheckErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CheckErrorKind::*;
        match self {
            DuplicateTopLevelName(n) => write!(f, "duplicate top-level name {:?}", n),
            DuplicateLocal(n) => write!(f, "duplicate local variable {:?}", n),
            UnknownIdentifier { name, suggestion } => {
                write!(f, "unknown identifier {:?}", name)?;
                if let Some(s) = suggestion {
                    write!(f, "; did you mean {:?}?", s)?;
                }
                Ok(())
            }
            UnknownType(n) => write!(f, "unknown type {:?}", n),
            UnknownPackage(n) => write!(f, "unknown package {:?}", n),
            UnknownStatus(n) => write!(f, "unknown status {:?}", n),
            MalformedStatus(n) => write!(
                f,
                "status {:?} must start with '@' (warning), '$' (suspension) or '#' (error)",
                n
            ),
            UnknownField { receiver, name } => {
                write!(f, "no field or method {:?} on {}", name, receiver)
            }
            UnresolvedUse { path, detail } => {
                write!(f, "cannot resolve use {:?}: {}", path, detail)
            }
            StructCycle(n) => write!(f, "cyclic by-value containment through struct {:?}", n),
            IncompatibleAssignment { expected, found } => {
                write!(f, "cannot assign {} to {}", found, expected)
            }
            ArityMismatch { callee, want, got } => {
                write!(f, "{} takes {} argument(s), got {}", callee, want, got)
            }
            ArgNameMismatch { callee, want, got } => {
                write!(f, "{} expects argument {:?}, got {:?}", callee, want, got)
            }
            NotCallable(what) => write!(f, "{} is not callable", what),
            NotAssignable(what) => write!(f, "cannot assign to {}", what),
            NonNumericIndex(t) => write!(f, "index must be numeric, got {}", t),
            NotIndexable(t) => write!(f, "{} is not an array or slice", t),
            WrongOperandType { op, found } => {
                write!(f, "operator {:?} cannot take {}", op, found)
            }
            NotBool { what, found } => write!(f, "{} must be boolean, got {}", what, found),
            InvalidConversion { from, to } => {
                write!(f, "cannot convert {} to {}; only numeric conversions", from, to)
            }
            ConditionHasEffect => write!(f, "condition must be effect-free"),
            EffectMarkerMismatch {
                callee,
                declared,
                marked,
            } => write!(
                f,
                "{} is declared {:?} but the call is marked {:?}",
                callee, declared, marked
            ),
            EffectExceedsCaller { callee } => {
                write!(f, "calling {} exceeds the enclosing function's effect", callee)
            }
            ReturnTypeMismatch { expected, found } => {
                write!(f, "return value is {}, function yields {}", found, expected)
            }
            YieldOutsideCoroutine => write!(f, "yield outside a coroutine body"),
            ConstArrayLengthMismatch { want, got } => {
                write!(f, "constant array has {} element(s), type wants {}", got, want)
            }
            NonConstant => write!(f, "expression is not a compile-time constant"),
            RefinementOutsideRange { refinement, range } => {
                write!(f, "refinement {} is outside the base range {}", refinement, range)
            }
            NonConstantRefinement => write!(f, "refinement bound is not constant"),
            EmptyRefinement(r) => write!(f, "refinement {} is empty", r),
            NegativeArrayLength(n) => write!(f, "array length {} is negative", n),
            IntegerOverflow { value, range } => {
                write!(f, "value {} can overflow {}", value, range)
            }
            ShiftOutOfRange { count, ceiling } => {
                write!(f, "shift count {} can exceed {}", count, ceiling)
            }
            DivisionByZero => write!(f, "divisor is not provably non-zero"),
            IndexOutOfRange { index, length } => {
                write!(f, "cannot prove 0 <= {} < {}", index, length)
            }
            SliceIndicesOutOfOrder => {
                write!(f, "cannot prove slice indices are in order and in range")
            }
            SignedOperand { op } => {
                write!(f, "operator {:?} requires unsigned operands", op)
            }
            InconsistentFacts(e) => write!(f, "facts leave no possible value for {}", e),
            CannotProve(c) => write!(f, "cannot prove {}", c),
            NoSuchReason(r) => write!(f, "no such reason {:?}", r),
            ReasonDoesNotMatch { reason, condition } => {
                write!(f, "reason {:?} does not match {}", reason, condition)
            }
            ReasonPremiseUndischarged { reason, premise } => {
                write!(f, "premise {} of reason {:?} is not discharged", premise, reason)
            }
            MissingReasonArg { reason, name } => {
                write!(f, "reason {:?} needs argument {:?}", reason, name)
            }
            MethodMissing {
                strukt,
                iface,
                method,
            } => write!(
                f,
                "struct {} implements {} but lacks method {:?}",
                strukt, iface, method
            ),
            MethodSignatureMismatch { method, want, got } => {
                write!(f, "method {:?} is {}, interface wants {}", method, got, want)
            }
            UnknownInterface(n) => write!(f, "unknown interface {:?}", n),
            NoMatchingLoop => write!(f, "jump with no matching loop"),
            JumpOutOfIoBind => write!(f, "jump out of an io_bind scope"),
            ReturnOutOfIoBind => write!(f, "return out of an io_bind scope"),
            TooDeep(what) => write!(f, "{} nesting is too deep", what),
        }
    }
}

impl CheckErrorKind {
    /// Short machine-readable tag for structured output.
    pub fn tag(&self) -> &'static str {
        use CheckErrorKind::*;
        match self {
            DuplicateTopLevelName(_) => "DuplicateTopLevelName",
            DuplicateLocal(_) => "DuplicateLocal",
            UnknownIdentifier { .. } => "UnknownIdentifier",
            UnknownType(_) => "UnknownType",
            UnknownPackage(_) => "UnknownPackage",
            UnknownStatus(_) => "UnknownStatus",
            MalformedStatus(_) => "MalformedStatus",
            UnknownField { .. } => "UnknownField",
            UnresolvedUse { .. } => "UnresolvedUse",
            StructCycle(_) => "StructCycle",
            IncompatibleAssignment { .. } => "IncompatibleAssignment",
            ArityMismatch { .. } => "ArityMismatch",
            ArgNameMismatch { .. } => "ArgNameMismatch",
            NotCallable(_) => "NotCallable",
            NotAssignable(_) => "NotAssignable",
            NonNumericIndex(_) => "NonNumericIndex",
            NotIndexable(_) => "NotIndexable",
            WrongOperandType { .. } => "WrongOperandType",
            NotBool { .. } => "NotBool",
            InvalidConversion { .. } => "InvalidConversion",
            ConditionHasEffect => "ConditionHasEffect",
            EffectMarkerMismatch { .. } => "EffectMarkerMismatch",
            EffectExceedsCaller { .. } => "EffectExceedsCaller",
            ReturnTypeMismatch { .. } => "ReturnTypeMismatch",
            YieldOutsideCoroutine => "YieldOutsideCoroutine",
            ConstArrayLengthMismatch { .. } => "ConstArrayLengthMismatch",
            NonConstant => "NonConstant",
            RefinementOutsideRange { .. } => "RefinementOutsideRange",
            NonConstantRefinement => "NonConstantRefinement",
            EmptyRefinement(_) => "EmptyRefinement",
            NegativeArrayLength(_) => "NegativeArrayLength",
            IntegerOverflow { .. } => "IntegerOverflow",
            ShiftOutOfRange { .. } => "ShiftOutOfRange",
            DivisionByZero => "DivisionByZero",
            IndexOutOfRange { .. } => "IndexOutOfRange",
            SliceIndicesOutOfOrder => "SliceIndicesOutOfOrder",
            SignedOperand { .. } => "SignedOperand",
            InconsistentFacts(_) => "InconsistentFacts",
            CannotProve(_) => "CannotProve",
            NoSuchReason(_) => "NoSuchReason",
            ReasonDoesNotMatch { .. } => "ReasonDoesNotMatch",
            ReasonPremiseUndischarged { .. } => "ReasonPremiseUndischarged",
            MissingReasonArg { .. } => "MissingReasonArg",
            MethodMissing { .. } => "MethodMissing",
            MethodSignatureMismatch { .. } => "MethodSignatureMismatch",
            UnknownInterface(_) => "UnknownInterface",
            NoMatchingLoop => "NoMatchingLoop",
            JumpOutOfIoBind => "JumpOutOfIoBind",
            ReturnOutOfIoBind => "ReturnOutOfIoBind",
            TooDeep(_) => "TooDeep",
        }
    }
}

/// A user-visible check failure.
#[derive(Debug, Clone)]
pub struct CheckError {
    pub kind: CheckErrorKind,
    pub path: String,
    pub span: Span,
    /// The fact set at the failing statement, rendered. Empty outside
    /// function bodies.
    pub facts: Vec<String>,
}

impl CheckError {
    pub fn new(kind: CheckErrorKind, path: &str, span: Span) -> Self {
        CheckError {
            kind,
            path: path.to_string(),
            span,
            facts: Vec::new(),
        }
    }

    pub fn with_facts(mut self, facts: Vec<String>) -> Self {
        self.facts = facts;
        self
    }

    /// Render with a source excerpt, caret underline and fact dump.
    pub fn display_with_source(&self, source: &str) -> String {
        let (line_num, line_start, line_content) = line_context(source, self.span.start);
        let col = self.span.start.saturating_sub(line_start);
        let len = (self.span.end - self.span.start)
            .max(1)
            .min(line_content.len().saturating_sub(col).max(1));
        let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));

        let mut out = format!(
            "{}: {}\n  {} {}:{}\n\n{} {} {}\n     {} {}",
            Style::bold_red("error"),
            self.kind,
            Style::cyan("-->"),
            self.path,
            line_num,
            Style::blue(&format!("{:4}", line_num)),
            Style::blue("|"),
            line_content,
            Style::blue("|"),
            Style::red(&underline)
        );

        if !self.facts.is_empty() {
            out.push_str(&format!("\n\n{}", Style::cyan("facts in scope:")));
            for fact in &self.facts {
                out.push_str(&format!("\n    {}", fact));
            }
        }
        out
    }

    pub fn line(&self, source: &str) -> usize {
        line_context(source, self.span.start).0
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

impl std::error::Error for CheckError {}

/// A broken checker invariant, distinct from any user error.
#[derive(Debug, Clone)]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        InternalError {
            message: message.into(),
        }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", INTERNAL_ERROR_MARKER, self.message)
    }
}

impl std::error::Error for InternalError {}

impl From<SlotConflict> for InternalError {
    fn from(c: SlotConflict) -> Self {
        InternalError::new(format!("{} slot written twice with different values", c.0))
    }
}

/// Any reason a check stops. The first failure aborts the compilation; no
/// partial result is produced.
#[derive(Debug)]
pub enum Fatal {
    Parse { path: String, error: ParseError },
    Check(Box<CheckError>),
    Internal(InternalError),
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fatal::Parse { path, error } => write!(f, "{}: {}", path, error),
            Fatal::Check(e) => write!(f, "{}", e),
            Fatal::Internal(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Fatal {}

impl From<CheckError> for Fatal {
    fn from(e: CheckError) -> Self {
        Fatal::Check(Box::new(e))
    }
}

impl From<InternalError> for Fatal {
    fn from(e: InternalError) -> Self {
        Fatal::Internal(e)
    }
}

impl From<SlotConflict> for Fatal {
    fn from(c: SlotConflict) -> Self {
        Fatal::Internal(c.into())
    }
}

pub type CheckResult<T> = Result<T, Fatal>;

/// The structured diagnostic record for machine consumers.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: String,
    pub filename: String,
    pub line: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<String>,
}

impl Diagnostic {
    /// Build the record, recovering the line number from `source` when the
    /// failing file's text is at hand.
    pub fn from_fatal(fatal: &Fatal, source: Option<&str>) -> Diagnostic {
        match fatal {
            Fatal::Parse { path, error } => Diagnostic {
                kind: "ParseError".to_string(),
                filename: path.clone(),
                line: source
                    .map(|s| line_context(s, error.span.start).0)
                    .unwrap_or(0),
                message: error.to_string(),
                facts: Vec::new(),
            },
            Fatal::Check(e) => Diagnostic {
                kind: e.kind.tag().to_string(),
                filename: e.path.clone(),
                line: source.map(|s| e.line(s)).unwrap_or(0),
                message: e.kind.to_string(),
                facts: e.facts.clone(),
            },
            Fatal::Internal(e) => Diagnostic {
                kind: "InternalError".to_string(),
                filename: String::new(),
                line: 0,
                message: e.to_string(),
                facts: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_carry_the_stable_marker() {
        let e = InternalError::new("expression type slot written twice");
        assert!(e.to_string().starts_with(INTERNAL_ERROR_MARKER));
    }

    #[test]
    fn diagnostic_serializes_without_empty_facts() {
        let fatal = Fatal::Check(Box::new(CheckError::new(
            CheckErrorKind::DivisionByZero,
            "t.sift",
            Span::new(0, 1),
        )));
        let d = Diagnostic::from_fatal(&fatal, Some("x / y"));
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"DivisionByZero\""));
        assert!(!json.contains("facts"));
    }
}
