//! The built-in `base` package.
//!
//! Everything the surface language can name without a `use`: the integer
//! families, `bool`/`status`/`empty`, the I/O halves, the methods on
//! generic slices and tables, and the built-in interfaces. Signatures live
//! here as data; the expression typer and the bounds prover look them up
//! by receiver shape and name.

use std::rc::Rc;

use crate::ast::{Effect, NumKind, StatusClass, Type};
use crate::intern::{Interner, Qid, Symbol};

/// Receiver shapes that carry built-in methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinRecv {
    Slice,
    Table,
    IoReader,
    IoWriter,
}

#[derive(Debug, Clone)]
pub struct BuiltinFunc {
    pub receiver: BuiltinRecv,
    pub name: Symbol,
    pub effect: Effect,
    /// Parameter list; `Type::Generic` stands for the receiver's element
    /// type and is substituted at the call site.
    pub args: Vec<(Symbol, Type)>,
    pub out: Type,
}

#[derive(Debug, Clone)]
pub struct IfaceMethod {
    pub name: Symbol,
    pub effect: Effect,
    pub args: Vec<(Symbol, Type)>,
    pub out: Type,
}

#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub qid: Qid,
    pub methods: Vec<IfaceMethod>,
}

/// Interned spellings the checker compares against.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinNames {
    pub base: Symbol,
    pub read_u8: Symbol,
    pub peek_u8: Symbol,
    pub skip: Symbol,
    pub write_u8: Symbol,
    pub available: Symbol,
    pub length: Symbol,
    pub copy_from_slice: Symbol,
    pub width: Symbol,
    pub height: Symbol,
    pub row: Symbol,
}

pub struct Builtins {
    pub names: BuiltinNames,
    pub funcs: Vec<BuiltinFunc>,
    pub interfaces: Vec<InterfaceInfo>,
    /// Statuses every package can name, with their classes.
    pub statuses: Vec<(Symbol, StatusClass)>,
}

impl Builtins {
    pub fn new(interner: &mut Interner) -> Self {
        let names = BuiltinNames {
            base: interner.intern("base"),
            read_u8: interner.intern("read_u8"),
            peek_u8: interner.intern("peek_u8"),
            skip: interner.intern("skip"),
            write_u8: interner.intern("write_u8"),
            available: interner.intern("available"),
            length: interner.intern("length"),
            copy_from_slice: interner.intern("copy_from_slice"),
            width: interner.intern("width"),
            height: interner.intern("height"),
            row: interner.intern("row"),
        };

        let u8_ = Type::numeric(NumKind::U8);
        let u32_ = Type::numeric(NumKind::U32);
        let u64_ = Type::numeric(NumKind::U64);
        let generic_slice = Type::Slice(Rc::new(Type::Generic));

        let n = interner.intern("n");
        let a = interner.intern("a");
        let s = interner.intern("s");
        let y = interner.intern("y");
        let x = interner.intern("x");
        let dst = interner.intern("dst");
        let src = interner.intern("src");

        let funcs = vec![
            // io_reader
            BuiltinFunc {
                receiver: BuiltinRecv::IoReader,
                name: names.read_u8,
                effect: Effect::Coroutine,
                args: vec![],
                out: u8_.clone(),
            },
            BuiltinFunc {
                receiver: BuiltinRecv::IoReader,
                name: names.peek_u8,
                effect: Effect::Pure,
                args: vec![],
                out: u8_.clone(),
            },
            BuiltinFunc {
                receiver: BuiltinRecv::IoReader,
                name: names.skip,
                effect: Effect::Coroutine,
                args: vec![(n, u32_.clone())],
                out: Type::Empty,
            },
            BuiltinFunc {
                receiver: BuiltinRecv::IoReader,
                name: names.available,
                effect: Effect::Pure,
                args: vec![],
                out: u64_.clone(),
            },
            // io_writer
            BuiltinFunc {
                receiver: BuiltinRecv::IoWriter,
                name: names.write_u8,
                effect: Effect::Coroutine,
                args: vec![(a, u8_.clone())],
                out: Type::Empty,
            },
            BuiltinFunc {
                receiver: BuiltinRecv::IoWriter,
                name: names.available,
                effect: Effect::Pure,
                args: vec![],
                out: u64_.clone(),
            },
            // slice
            BuiltinFunc {
                receiver: BuiltinRecv::Slice,
                name: names.length,
                effect: Effect::Pure,
                args: vec![],
                out: u64_.clone(),
            },
            BuiltinFunc {
                receiver: BuiltinRecv::Slice,
                name: names.copy_from_slice,
                effect: Effect::Impure,
                args: vec![(s, generic_slice.clone())],
                out: u64_.clone(),
            },
            // table
            BuiltinFunc {
                receiver: BuiltinRecv::Table,
                name: names.width,
                effect: Effect::Pure,
                args: vec![],
                out: u64_.clone(),
            },
            BuiltinFunc {
                receiver: BuiltinRecv::Table,
                name: names.height,
                effect: Effect::Pure,
                args: vec![],
                out: u64_.clone(),
            },
            BuiltinFunc {
                receiver: BuiltinRecv::Table,
                name: names.row,
                effect: Effect::Pure,
                args: vec![(y, u32_.clone())],
                out: generic_slice,
            },
        ];

        let interfaces = vec![
            InterfaceInfo {
                qid: Qid::new(names.base, interner.intern("hasher_u32")),
                methods: vec![
                    IfaceMethod {
                        name: interner.intern("update_u32"),
                        effect: Effect::Impure,
                        args: vec![(x, Type::Slice(Rc::new(u8_.clone())))],
                        out: u32_,
                    },
                    IfaceMethod {
                        name: interner.intern("reset"),
                        effect: Effect::Impure,
                        args: vec![],
                        out: Type::Empty,
                    },
                ],
            },
            InterfaceInfo {
                qid: Qid::new(names.base, interner.intern("io_transformer")),
                methods: vec![IfaceMethod {
                    name: interner.intern("transform"),
                    effect: Effect::Coroutine,
                    args: vec![(dst, Type::IoWriter), (src, Type::IoReader)],
                    out: Type::Status,
                }],
            },
        ];

        let statuses = vec![
            (interner.intern("$short read"), StatusClass::Suspension),
            (interner.intern("$short write"), StatusClass::Suspension),
            (interner.intern("#bad argument"), StatusClass::Error),
        ];

        Builtins {
            names,
            funcs,
            interfaces,
            statuses,
        }
    }

    /// Resolve a `base.*` type name.
    pub fn base_type(&self, name: Symbol, interner: &Interner) -> Option<Type> {
        let text = interner.resolve(name);
        if let Some(kind) = NumKind::from_name(text) {
            return Some(Type::numeric(kind));
        }
        Some(match text {
            "bool" => Type::Bool,
            "status" => Type::Status,
            "empty" => Type::Empty,
            "io_reader" => Type::IoReader,
            "io_writer" => Type::IoWriter,
            _ => return None,
        })
    }

    /// Look up a built-in method on a receiver type, piercing one pointer.
    pub fn method(&self, recv: &Type, name: Symbol) -> Option<&BuiltinFunc> {
        let shape = match recv.pierce_ptr() {
            Type::Slice(_) => BuiltinRecv::Slice,
            Type::Table(_) => BuiltinRecv::Table,
            Type::IoReader => BuiltinRecv::IoReader,
            Type::IoWriter => BuiltinRecv::IoWriter,
            _ => return None,
        };
        self.funcs
            .iter()
            .find(|f| f.receiver == shape && f.name == name)
    }

    pub fn interface(&self, qid: Qid) -> Option<&InterfaceInfo> {
        self.interfaces.iter().find(|i| i.qid == qid)
    }
}

/// Substitute the generic element placeholder in a builtin signature type.
pub fn subst_generic(t: &Type, elem: &Type) -> Type {
    match t {
        Type::Generic => elem.clone(),
        Type::Slice(inner) => Type::Slice(Rc::new(subst_generic(inner, elem))),
        Type::Table(inner) => Type::Table(Rc::new(subst_generic(inner, elem))),
        Type::Ptr(inner) => Type::Ptr(Rc::new(subst_generic(inner, elem))),
        Type::Nptr(inner) => Type::Nptr(Rc::new(subst_generic(inner, elem))),
        Type::Array { len, elem: inner } => Type::Array {
            len: len.clone(),
            elem: Rc::new(subst_generic(inner, elem)),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_methods_resolve_for_any_element_type() {
        let mut interner = Interner::new();
        let b = Builtins::new(&mut interner);
        let slice_u32 = Type::Slice(Rc::new(Type::numeric(NumKind::U32)));
        let m = b.method(&slice_u32, b.names.length).expect("length");
        assert_eq!(m.effect, Effect::Pure);
        assert!(b.method(&Type::Bool, b.names.length).is_none());
    }

    #[test]
    fn generic_substitution_reaches_nested_slices() {
        let elem = Type::numeric(NumKind::U16);
        let sig = Type::Slice(Rc::new(Type::Generic));
        let got = subst_generic(&sig, &elem);
        assert_eq!(got, Type::Slice(Rc::new(elem)));
    }

    #[test]
    fn base_types_resolve() {
        let mut interner = Interner::new();
        let b = Builtins::new(&mut interner);
        let u8_ = interner.intern("u8");
        let bool_ = interner.intern("bool");
        assert_eq!(
            b.base_type(u8_, &interner),
            Some(Type::numeric(NumKind::U8))
        );
        assert_eq!(b.base_type(bool_, &interner), Some(Type::Bool));
        let nope = interner.intern("quux");
        assert_eq!(b.base_type(nope, &interner), None);
    }
}
