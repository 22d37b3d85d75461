//! Type expressions and their canonical resolved form.
//!
//! The surface [`TypeExpr`] is what the parser produces; the resolver turns
//! it into a [`Type`], the canonical form every annotation slot carries.
//! Refinement bounds are compile-time constants once resolved, so `Type`
//! holds plain integers instead of expression trees.

use std::rc::Rc;

use num_bigint::BigInt;

use crate::ast::expr::Expr;
use crate::intern::{Interner, Qid, Symbol};
use crate::token::Span;

/// The built-in integer families of the `base` package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

impl NumKind {
    pub fn from_name(name: &str) -> Option<NumKind> {
        Some(match name {
            "u8" => NumKind::U8,
            "u16" => NumKind::U16,
            "u32" => NumKind::U32,
            "u64" => NumKind::U64,
            "i8" => NumKind::I8,
            "i16" => NumKind::I16,
            "i32" => NumKind::I32,
            "i64" => NumKind::I64,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            NumKind::U8 => "u8",
            NumKind::U16 => "u16",
            NumKind::U32 => "u32",
            NumKind::U64 => "u64",
            NumKind::I8 => "i8",
            NumKind::I16 => "i16",
            NumKind::I32 => "i32",
            NumKind::I64 => "i64",
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, NumKind::I8 | NumKind::I16 | NumKind::I32 | NumKind::I64)
    }

    pub fn bit_width(self) -> u32 {
        match self {
            NumKind::U8 | NumKind::I8 => 8,
            NumKind::U16 | NumKind::I16 => 16,
            NumKind::U32 | NumKind::I32 => 32,
            NumKind::U64 | NumKind::I64 => 64,
        }
    }

    /// The canonical (min, max) pair for this integer family.
    pub fn bounds(self) -> Interval {
        let w = self.bit_width();
        if self.is_signed() {
            let half = BigInt::from(1) << (w - 1);
            Interval::new(-half.clone(), half - 1)
        } else {
            Interval::new(BigInt::from(0), (BigInt::from(1) << w) - 1)
        }
    }
}

/// A closed interval of arbitrary-precision integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub lo: BigInt,
    pub hi: BigInt,
}

impl Interval {
    pub fn new(lo: BigInt, hi: BigInt) -> Self {
        Interval { lo, hi }
    }

    pub fn point(v: BigInt) -> Self {
        Interval {
            lo: v.clone(),
            hi: v,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    pub fn contains(&self, v: &BigInt) -> bool {
        &self.lo <= v && v <= &self.hi
    }

    pub fn is_sub_of(&self, other: &Interval) -> bool {
        self.lo >= other.lo && self.hi <= other.hi
    }

    /// Smallest interval covering both.
    pub fn unite(&self, other: &Interval) -> Interval {
        Interval {
            lo: self.lo.clone().min(other.lo.clone()),
            hi: self.hi.clone().max(other.hi.clone()),
        }
    }

    /// Largest interval covered by both; may come back empty.
    pub fn intersect(&self, other: &Interval) -> Interval {
        Interval {
            lo: self.lo.clone().max(other.lo.clone()),
            hi: self.hi.clone().min(other.hi.clone()),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.lo, self.hi)
    }
}

/// A constant subinterval narrowing a numeric type.
///
/// A missing bound falls back to the integer family's canonical bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refined {
    pub lo: Option<BigInt>,
    pub hi: Option<BigInt>,
}

/// The canonical, resolved form of a type.
///
/// Cheap to clone: recursive cases are reference-counted. Equality is
/// structural; [`Type::eq_ignoring_refinements`] is the compatibility
/// predicate used for operands and assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// The distinguished type of untyped integer literals.
    Ideal,
    Bool,
    Status,
    /// Placeholder for statement-level nodes that yield no value.
    Empty,
    Numeric {
        kind: NumKind,
        refinement: Option<Rc<Refined>>,
    },
    Struct(Qid),
    Array {
        len: Rc<BigInt>,
        elem: Rc<Type>,
    },
    Slice(Rc<Type>),
    Table(Rc<Type>),
    Nptr(Rc<Type>),
    Ptr(Rc<Type>),
    /// A bound method value: receiver type plus method name.
    Func {
        receiver: Rc<Type>,
        name: Symbol,
    },
    IoReader,
    IoWriter,
    /// The element placeholder in generic slice/table builtin signatures.
    Generic,
}

impl Type {
    pub fn numeric(kind: NumKind) -> Type {
        Type::Numeric {
            kind,
            refinement: None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Numeric { .. } | Type::Ideal)
    }

    pub fn is_ideal(&self) -> bool {
        matches!(self, Type::Ideal)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Type::Status)
    }

    /// Unsigned concrete numeric. Ideal constants pass separately, by value.
    pub fn is_unsigned(&self) -> bool {
        matches!(self, Type::Numeric { kind, .. } if !kind.is_signed())
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::Numeric { kind, .. } if kind.is_signed())
    }

    pub fn num_kind(&self) -> Option<NumKind> {
        match self {
            Type::Numeric { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Element type of an array, slice or table.
    pub fn elem(&self) -> Option<&Type> {
        match self {
            Type::Array { elem, .. } => Some(elem),
            Type::Slice(elem) | Type::Table(elem) => Some(elem),
            _ => None,
        }
    }

    /// Deref one pointer decorator, if any. Selector lookup pierces these.
    pub fn pierce_ptr(&self) -> &Type {
        match self {
            Type::Ptr(inner) | Type::Nptr(inner) => inner,
            other => other,
        }
    }

    /// True for types whose pointees an impure callee could mutate. Facts
    /// mentioning variables of these types die at suspension points.
    pub fn is_pointerish(&self) -> bool {
        matches!(
            self,
            Type::Ptr(_)
                | Type::Nptr(_)
                | Type::Slice(_)
                | Type::Table(_)
                | Type::IoReader
                | Type::IoWriter
        )
    }

    /// Value bounds: the integer family's range tightened by the refinement.
    /// `None` for ideal and non-numeric types.
    pub fn value_bounds(&self) -> Option<Interval> {
        match self {
            Type::Numeric { kind, refinement } => {
                let mut b = kind.bounds();
                if let Some(r) = refinement {
                    if let Some(lo) = &r.lo {
                        b.lo = b.lo.max(lo.clone());
                    }
                    if let Some(hi) = &r.hi {
                        b.hi = b.hi.min(hi.clone());
                    }
                }
                Some(b)
            }
            _ => None,
        }
    }

    /// The primary compatibility predicate: structural equality with every
    /// refinement erased.
    pub fn eq_ignoring_refinements(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Numeric { kind: a, .. }, Type::Numeric { kind: b, .. }) => a == b,
            (Type::Array { len: la, elem: ea }, Type::Array { len: lb, elem: eb }) => {
                la == lb && ea.eq_ignoring_refinements(eb)
            }
            (Type::Slice(a), Type::Slice(b))
            | (Type::Table(a), Type::Table(b))
            | (Type::Nptr(a), Type::Nptr(b))
            | (Type::Ptr(a), Type::Ptr(b)) => a.eq_ignoring_refinements(b),
            (Type::Func { receiver: ra, name: na }, Type::Func { receiver: rb, name: nb }) => {
                na == nb && ra.eq_ignoring_refinements(rb)
            }
            (a, b) => a == b,
        }
    }

    pub fn display(&self, interner: &Interner) -> String {
        match self {
            Type::Ideal => "ideal".to_string(),
            Type::Bool => "base.bool".to_string(),
            Type::Status => "base.status".to_string(),
            Type::Empty => "base.empty".to_string(),
            Type::Numeric { kind, refinement } => {
                let mut s = format!("base.{}", kind.name());
                if let Some(r) = refinement {
                    s.push('[');
                    if let Some(lo) = &r.lo {
                        s.push_str(&lo.to_string());
                    }
                    s.push_str(" .. ");
                    if let Some(hi) = &r.hi {
                        s.push_str(&hi.to_string());
                    }
                    s.push(']');
                }
                s
            }
            Type::Struct(qid) => qid.display(interner),
            Type::Array { len, elem } => {
                format!("array[{}] {}", len, elem.display(interner))
            }
            Type::Slice(elem) => format!("slice {}", elem.display(interner)),
            Type::Table(elem) => format!("table {}", elem.display(interner)),
            Type::Nptr(inner) => format!("nptr {}", inner.display(interner)),
            Type::Ptr(inner) => format!("ptr {}", inner.display(interner)),
            Type::Func { receiver, name } => format!(
                "func {}.{}",
                receiver.display(interner),
                interner.resolve(*name)
            ),
            Type::IoReader => "base.io_reader".to_string(),
            Type::IoWriter => "base.io_writer".to_string(),
            Type::Generic => "T".to_string(),
        }
    }
}

/// Optional refinement bounds as written in source, e.g. `[0 .. 10]`.
#[derive(Debug, Clone)]
pub struct RefinementExpr {
    pub lo: Option<Box<Expr>>,
    pub hi: Option<Box<Expr>>,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// A base or user QID, optionally refined.
    Named {
        qid: Qid,
        refinement: Option<RefinementExpr>,
    },
    Array {
        len: Box<Expr>,
        elem: Box<TypeExpr>,
    },
    Slice(Box<TypeExpr>),
    Table(Box<TypeExpr>),
    Nptr(Box<TypeExpr>),
    Ptr(Box<TypeExpr>),
}

/// A type expression as parsed, carrying its resolution slot.
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
    resolved: Option<Type>,
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, span: Span) -> Self {
        TypeExpr {
            kind,
            span,
            resolved: None,
        }
    }

    pub fn resolved(&self) -> Option<&Type> {
        self.resolved.as_ref()
    }

    /// Write the resolution slot. Slots are write-once; a second write must
    /// agree with the first (re-checking an annotated tree is a no-op).
    pub fn set_resolved(&mut self, t: Type) -> Result<(), SlotConflict> {
        match &self.resolved {
            None => {
                self.resolved = Some(t);
                Ok(())
            }
            Some(prev) if *prev == t => Ok(()),
            Some(_) => Err(SlotConflict("type expression resolution")),
        }
    }
}

/// A second, disagreeing write to a write-once annotation slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotConflict(pub &'static str);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_kind_bounds() {
        let b = NumKind::U8.bounds();
        assert_eq!(b.lo, BigInt::from(0));
        assert_eq!(b.hi, BigInt::from(255));

        let b = NumKind::I8.bounds();
        assert_eq!(b.lo, BigInt::from(-128));
        assert_eq!(b.hi, BigInt::from(127));

        let b = NumKind::U64.bounds();
        assert_eq!(b.hi, BigInt::parse_bytes(b"18446744073709551615", 10).unwrap());
    }

    #[test]
    fn refinement_tightens_value_bounds() {
        let t = Type::Numeric {
            kind: NumKind::U8,
            refinement: Some(Rc::new(Refined {
                lo: None,
                hi: Some(BigInt::from(10)),
            })),
        };
        let b = t.value_bounds().unwrap();
        assert_eq!(b.lo, BigInt::from(0));
        assert_eq!(b.hi, BigInt::from(10));
    }

    #[test]
    fn refinements_do_not_affect_compatibility() {
        let plain = Type::numeric(NumKind::U8);
        let refined = Type::Numeric {
            kind: NumKind::U8,
            refinement: Some(Rc::new(Refined {
                lo: Some(BigInt::from(1)),
                hi: Some(BigInt::from(4)),
            })),
        };
        assert!(plain.eq_ignoring_refinements(&refined));
        assert!(!plain.eq_ignoring_refinements(&Type::numeric(NumKind::U16)));
    }

    #[test]
    fn slice_compatibility_recurses() {
        let a = Type::Slice(Rc::new(Type::numeric(NumKind::U8)));
        let b = Type::Slice(Rc::new(Type::Numeric {
            kind: NumKind::U8,
            refinement: Some(Rc::new(Refined {
                lo: None,
                hi: Some(BigInt::from(1)),
            })),
        }));
        assert!(a.eq_ignoring_refinements(&b));
    }
}
