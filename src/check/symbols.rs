//! Symbol table and top-level name resolution.
//!
//! Four maps keyed by QID (constants, statuses, structs) or QQID (funcs),
//! plus a flat top-level-name set that rejects collisions across
//! namespaces within one package. Infos hold resolved summaries only, so
//! body checking never needs to reach back into another declaration's AST.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use num_bigint::BigInt;

use crate::ast::{Expr, StatusClass, StructDecl, Type, TypeExpr, TypeExprKind, Visibility};
use crate::check::error::{CheckError, CheckErrorKind, CheckResult};
use crate::intern::{Interner, Qid, Qqid, Symbol};
use crate::token::Span;

#[derive(Debug, Clone)]
pub enum ConstVal {
    Scalar(BigInt),
    List(Vec<BigInt>),
}

#[derive(Debug, Clone)]
pub struct ConstInfo {
    pub qid: Qid,
    pub vis: Visibility,
    pub typ: Type,
    pub value: ConstVal,
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    /// The name symbol is the message text itself.
    pub qid: Qid,
    pub vis: Visibility,
    pub class: StatusClass,
}

#[derive(Debug, Clone)]
pub struct StructInfo {
    pub qid: Qid,
    pub vis: Visibility,
    pub implements: Vec<Qid>,
    /// Filled by the struct-fields pass, after the cycle check.
    pub fields: Vec<(Symbol, Type)>,
}

#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub qqid: Qqid,
    pub vis: Visibility,
    pub effect: crate::ast::Effect,
    pub args: Vec<(Symbol, Type)>,
    /// `Type::Empty` when the function yields no value.
    pub out: Type,
    /// Typed contract clauses, shared as facts at call/entry boundaries.
    pub preconds: Vec<Rc<Expr>>,
    pub postconds: Vec<Rc<Expr>>,
}

#[derive(Default)]
pub struct SymbolTable {
    pub consts: HashMap<Qid, ConstInfo>,
    pub statuses: HashMap<Qid, StatusInfo>,
    pub structs: HashMap<Qid, StructInfo>,
    pub funcs: HashMap<Qqid, FuncInfo>,
    /// Namespaces reachable from this package: `base` plus every `use`.
    pub packages: Vec<Symbol>,
    top_level: HashSet<(Symbol, Symbol)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_package(&mut self, pkg: Symbol) {
        if !self.packages.contains(&pkg) {
            self.packages.push(pkg);
        }
    }

    pub fn has_package(&self, pkg: Symbol) -> bool {
        self.packages.contains(&pkg)
    }

    /// Claim a top-level name within a package namespace.
    fn claim(
        &mut self,
        package: Symbol,
        name: Symbol,
        interner: &Interner,
        path: &str,
        span: Span,
    ) -> CheckResult<()> {
        if !self.top_level.insert((package, name)) {
            return Err(CheckError::new(
                CheckErrorKind::DuplicateTopLevelName(interner.resolve(name).to_string()),
                path,
                span,
            )
            .into());
        }
        Ok(())
    }

    pub fn insert_const(
        &mut self,
        info: ConstInfo,
        interner: &Interner,
        path: &str,
        span: Span,
    ) -> CheckResult<()> {
        self.claim(info.qid.package, info.qid.name, interner, path, span)?;
        self.consts.insert(info.qid, info);
        Ok(())
    }

    pub fn insert_status(
        &mut self,
        info: StatusInfo,
        interner: &Interner,
        path: &str,
        span: Span,
    ) -> CheckResult<()> {
        self.claim(info.qid.package, info.qid.name, interner, path, span)?;
        self.statuses.insert(info.qid, info);
        Ok(())
    }

    pub fn insert_struct(
        &mut self,
        info: StructInfo,
        interner: &Interner,
        path: &str,
        span: Span,
    ) -> CheckResult<()> {
        self.claim(info.qid.package, info.qid.name, interner, path, span)?;
        self.structs.insert(info.qid, info);
        Ok(())
    }

    pub fn insert_func(
        &mut self,
        info: FuncInfo,
        interner: &Interner,
        path: &str,
        span: Span,
    ) -> CheckResult<()> {
        let qqid = info.qqid;
        if qqid.receiver.is_empty() {
            // Free functions share the flat namespace.
            self.claim(qqid.package, qqid.name, interner, path, span)?;
        } else if self.funcs.contains_key(&qqid) {
            return Err(CheckError::new(
                CheckErrorKind::DuplicateTopLevelName(qqid.display(interner)),
                path,
                span,
            )
            .into());
        }
        self.funcs.insert(qqid, info);
        Ok(())
    }

    /// Find a status by message text, searching the local package first and
    /// then every reachable namespace.
    pub fn status_by_message(&self, message: Symbol) -> Option<&StatusInfo> {
        if let Some(info) = self.statuses.get(&Qid::local(message)) {
            return Some(info);
        }
        self.packages
            .iter()
            .find_map(|&pkg| self.statuses.get(&Qid::new(pkg, message)))
    }
}

/// Topologically order the package's structs by by-value containment.
/// A cycle is fatal: such a struct could never be laid out.
pub fn check_struct_cycles(
    structs: &[(Symbol, &StructDecl)],
    interner: &Interner,
    path: &str,
) -> CheckResult<()> {
    let index: HashMap<Symbol, usize> = structs
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (*name, i))
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }
    let mut marks = vec![Mark::White; structs.len()];

    fn by_value_edges(t: &TypeExpr, index: &HashMap<Symbol, usize>, out: &mut Vec<usize>) {
        match &t.kind {
            TypeExprKind::Named { qid, .. } => {
                if qid.package.is_empty() {
                    if let Some(&i) = index.get(&qid.name) {
                        out.push(i);
                    }
                }
            }
            TypeExprKind::Array { elem, .. } => by_value_edges(elem, index, out),
            // Indirection breaks by-value containment.
            TypeExprKind::Slice(_)
            | TypeExprKind::Table(_)
            | TypeExprKind::Nptr(_)
            | TypeExprKind::Ptr(_) => {}
        }
    }

    fn visit(
        i: usize,
        structs: &[(Symbol, &StructDecl)],
        index: &HashMap<Symbol, usize>,
        marks: &mut [Mark],
        interner: &Interner,
        path: &str,
    ) -> CheckResult<()> {
        match marks[i] {
            Mark::Black => return Ok(()),
            Mark::Grey => {
                let (name, decl) = &structs[i];
                return Err(CheckError::new(
                    CheckErrorKind::StructCycle(interner.resolve(*name).to_string()),
                    path,
                    decl.span,
                )
                .into());
            }
            Mark::White => {}
        }
        marks[i] = Mark::Grey;
        let mut edges = Vec::new();
        for field in &structs[i].1.fields {
            by_value_edges(&field.typ, index, &mut edges);
        }
        for j in edges {
            visit(j, structs, index, marks, interner, path)?;
        }
        marks[i] = Mark::Black;
        Ok(())
    }

    for i in 0..structs.len() {
        visit(i, structs, &index, &mut marks, interner, path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Decl;
    use crate::parser::parse_file;

    fn structs_of(src: &str) -> (Vec<(Symbol, StructDecl)>, Interner) {
        let mut interner = Interner::new();
        let file = parse_file("t.sift", src, &mut interner).unwrap();
        let structs = file
            .decls
            .into_iter()
            .filter_map(|d| match d {
                Decl::Struct(s) => Some((s.name, s)),
                _ => None,
            })
            .collect();
        (structs, interner)
    }

    #[test]
    fn collision_across_namespaces_is_rejected() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new();
        let name = interner.intern("shared");
        table
            .insert_struct(
                StructInfo {
                    qid: Qid::local(name),
                    vis: Visibility::Public,
                    implements: vec![],
                    fields: vec![],
                },
                &interner,
                "t.sift",
                Span::default(),
            )
            .unwrap();
        let err = table
            .insert_const(
                ConstInfo {
                    qid: Qid::local(name),
                    vis: Visibility::Public,
                    typ: Type::Bool,
                    value: ConstVal::Scalar(BigInt::from(0)),
                },
                &interner,
                "t.sift",
                Span::default(),
            )
            .unwrap_err();
        assert!(format!("{}", err).contains("duplicate top-level name"));
    }

    #[test]
    fn direct_struct_cycle_is_fatal() {
        let (structs, interner) = structs_of(
            "pub struct a { f : b, }\npub struct b { g : a, }",
        );
        let refs: Vec<(Symbol, &StructDecl)> =
            structs.iter().map(|(n, s)| (*n, s)).collect();
        assert!(check_struct_cycles(&refs, &interner, "t.sift").is_err());
    }

    #[test]
    fn pointer_indirection_breaks_the_cycle() {
        let (structs, interner) = structs_of(
            "pub struct a { f : ptr b, }\npub struct b { g : a, }",
        );
        let refs: Vec<(Symbol, &StructDecl)> =
            structs.iter().map(|(n, s)| (*n, s)).collect();
        assert!(check_struct_cycles(&refs, &interner, "t.sift").is_ok());
    }

    #[test]
    fn array_containment_is_by_value() {
        let (structs, interner) = structs_of("pub struct a { f : array[2] a, }");
        let refs: Vec<(Symbol, &StructDecl)> =
            structs.iter().map(|(n, s)| (*n, s)).collect();
        assert!(check_struct_cycles(&refs, &interner, "t.sift").is_err());
    }
}
