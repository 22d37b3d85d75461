//! The semantic checker.
//!
//! A pipeline of passes over the parsed AST, leaves first: uses, statuses,
//! constants, struct declarations, the struct-cycle check, struct fields,
//! function signatures, function contracts, the interface-implementation
//! check, function bodies, and a final pass confirming that no annotation
//! slot was left unwritten. Any failure is fatal; no partial result is
//! produced.

pub mod error;
pub mod facts;
pub mod reasons;
pub mod symbols;

mod bounds;
mod expr;
mod iface;
mod liveness;
mod resolve;
mod stmt;

use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigInt;
use tracing::debug;

use crate::ast::{
    block_terminates, walk_expr_mut, AssertKind, Decl, Effect, ElseArm, Expr, ExprKind,
    Interval, SourceFile, StatusClass, Stmt, StmtKind, Type, TypeExpr, TypeExprKind,
};
use crate::builtin::Builtins;
use crate::check::error::{
    CheckError, CheckErrorKind, CheckResult, Fatal, InternalError,
};
use crate::check::expr::{Ctx, ExprTyper};
use crate::check::reasons::ReasonSchema;
use crate::check::resolve::resolve_type;
use crate::check::symbols::{
    check_struct_cycles, ConstInfo, ConstVal, FuncInfo, StatusInfo, StructInfo, SymbolTable,
};
use crate::intern::{Interner, Qid, Qqid, Symbol};
use crate::parser::parse_file;

pub use error::Diagnostic;

/// Resolves a `use` path to source bytes.
pub type ResolveUse<'r> = dyn FnMut(&str) -> Result<Vec<u8>, String> + 'r;

/// Recursion ceilings and prover knobs. Exceeding a ceiling is a reported
/// error, never a stack overflow.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub max_expr_depth: usize,
    pub max_body_depth: usize,
    pub max_type_depth: usize,
    /// Largest provable shift count; capped at 65535.
    pub shift_ceiling: u32,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            max_expr_depth: 255,
            max_body_depth: 255,
            max_type_depth: 64,
            shift_ceiling: 255,
        }
    }
}

impl CheckConfig {
    fn clamped(mut self) -> Self {
        self.shift_ceiling = self.shift_ceiling.min(65535);
        self
    }
}

/// Check one package: annotate the AST in place, or fail with the first
/// error. `resolver` is consulted once per `use` declaration.
pub fn check_package(
    files: &mut [SourceFile],
    interner: &mut Interner,
    resolver: &mut ResolveUse<'_>,
    config: &CheckConfig,
) -> Result<(), Fatal> {
    let config = config.clone().clamped();
    let mut use_stack = Vec::new();
    check_unit(files, interner, resolver, &config, &mut use_stack, false)?;
    Ok(())
}

/// Check a compilation unit, returning its symbol table so a parent
/// package can absorb the public half.
fn check_unit(
    files: &mut [SourceFile],
    interner: &mut Interner,
    resolver: &mut ResolveUse<'_>,
    config: &CheckConfig,
    use_stack: &mut Vec<String>,
    signatures_only: bool,
) -> CheckResult<SymbolTable> {
    let builtins = Builtins::new(interner);
    let schemas = reasons::catalogue();
    let mut table = SymbolTable::new();
    table.declare_package(builtins.names.base);
    for (message, class) in &builtins.statuses {
        table.statuses.insert(
            Qid::new(builtins.names.base, *message),
            StatusInfo {
                qid: Qid::new(builtins.names.base, *message),
                vis: crate::ast::Visibility::Public,
                class: *class,
            },
        );
    }

    // Pass: uses. Each referenced package is parsed and signature-checked
    // recursively; its public names land under its basename.
    debug!("pass: uses");
    for file in files.iter() {
        for decl in &file.decls {
            let Decl::Use(u) = decl else { continue };
            let path_text = interner.resolve(u.path).to_string();
            if use_stack.contains(&path_text) {
                return Err(CheckError::new(
                    CheckErrorKind::UnresolvedUse {
                        path: path_text,
                        detail: "cyclic use".to_string(),
                    },
                    &file.path,
                    u.span,
                )
                .into());
            }
            let bytes = resolver(&path_text).map_err(|detail| {
                CheckError::new(
                    CheckErrorKind::UnresolvedUse {
                        path: path_text.clone(),
                        detail,
                    },
                    &file.path,
                    u.span,
                )
            })?;
            let source = String::from_utf8(bytes).map_err(|_| {
                CheckError::new(
                    CheckErrorKind::UnresolvedUse {
                        path: path_text.clone(),
                        detail: "source is not UTF-8".to_string(),
                    },
                    &file.path,
                    u.span,
                )
            })?;
            let mut dep_file = parse_file(&path_text, &source, interner).map_err(|error| {
                Fatal::Parse {
                    path: path_text.clone(),
                    error,
                }
            })?;
            use_stack.push(path_text.clone());
            let dep_table = check_unit(
                std::slice::from_mut(&mut dep_file),
                interner,
                resolver,
                config,
                use_stack,
                true,
            )?;
            use_stack.pop();

            let pkg = interner.intern(basename(&path_text));
            table.declare_package(pkg);
            absorb(&mut table, dep_table, pkg);
        }
    }

    // Pass: statuses.
    debug!("pass: statuses");
    for file in files.iter() {
        for decl in &file.decls {
            let Decl::Status(s) = decl else { continue };
            let message = interner.resolve(s.message);
            let Some(class) = StatusClass::from_message(message) else {
                return Err(CheckError::new(
                    CheckErrorKind::MalformedStatus(message.to_string()),
                    &file.path,
                    s.span,
                )
                .into());
            };
            table.insert_status(
                StatusInfo {
                    qid: Qid::local(s.message),
                    vis: s.vis,
                    class,
                },
                interner,
                &file.path,
                s.span,
            )?;
        }
    }

    // Pass: constants.
    debug!("pass: consts");
    for file in files.iter_mut() {
        for decl in file.decls.iter_mut() {
            let Decl::Const(c) = decl else { continue };
            let info = {
                let ctx = Ctx {
                    symbols: &table,
                    builtins: &builtins,
                    interner,
                    config,
                    path: &file.path,
                };
                check_const(ctx, c)?
            };
            table.insert_const(info, interner, &file.path, c.span)?;
        }
    }

    // Pass: struct declarations, then the by-value containment check.
    debug!("pass: structs");
    for file in files.iter() {
        for decl in &file.decls {
            let Decl::Struct(s) = decl else { continue };
            table.insert_struct(
                StructInfo {
                    qid: Qid::local(s.name),
                    vis: s.vis,
                    implements: s.implements.clone(),
                    fields: Vec::new(),
                },
                interner,
                &file.path,
                s.span,
            )?;
        }
    }
    for file in files.iter() {
        let local_structs: Vec<(Symbol, &crate::ast::StructDecl)> = file
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Struct(s) => Some((s.name, s)),
                _ => None,
            })
            .collect();
        check_struct_cycles(&local_structs, interner, &file.path)?;
    }

    // Pass: struct fields.
    for file in files.iter_mut() {
        for decl in file.decls.iter_mut() {
            let Decl::Struct(s) = decl else { continue };
            let fields = {
                let ctx = Ctx {
                    symbols: &table,
                    builtins: &builtins,
                    interner,
                    config,
                    path: &file.path,
                };
                let typer = ExprTyper::const_context(ctx);
                let mut fields = Vec::new();
                for field in s.fields.iter_mut() {
                    if fields.iter().any(|(n, _)| *n == field.name) {
                        return Err(ctx.err(
                            CheckErrorKind::DuplicateLocal(
                                ctx.interner.resolve(field.name).to_string(),
                            ),
                            field.span,
                        ));
                    }
                    let t = resolve_type(&typer, &mut field.typ, 0)?;
                    fields.push((field.name, t));
                }
                fields
            };
            if let Some(info) = table.structs.get_mut(&Qid::local(s.name)) {
                info.fields = fields;
            }
        }
    }

    // Pass: function signatures.
    debug!("pass: func signatures");
    for file in files.iter_mut() {
        for decl in file.decls.iter_mut() {
            let Decl::Func(f) = decl else { continue };
            let info = {
                let ctx = Ctx {
                    symbols: &table,
                    builtins: &builtins,
                    interner,
                    config,
                    path: &file.path,
                };
                check_func_signature(ctx, f)?
            };
            table.insert_func(info, interner, &file.path, f.span)?;
        }
    }

    // Pass: function contracts.
    debug!("pass: func contracts");
    for file in files.iter_mut() {
        for decl in file.decls.iter_mut() {
            let Decl::Func(f) = decl else { continue };
            let qqid = Qqid::new(
                Symbol::EMPTY,
                f.receiver.unwrap_or(Symbol::EMPTY),
                f.name,
            );
            let (preconds, postconds) = {
                let ctx = Ctx {
                    symbols: &table,
                    builtins: &builtins,
                    interner,
                    config,
                    path: &file.path,
                };
                check_contract(ctx, &table, qqid, f)?
            };
            if let Some(info) = table.funcs.get_mut(&qqid) {
                info.preconds = preconds;
                info.postconds = postconds;
            }
        }
    }

    // Pass: interface implementations.
    debug!("pass: interfaces");
    for file in files.iter() {
        for decl in &file.decls {
            let Decl::Struct(s) = decl else { continue };
            let ctx = Ctx {
                symbols: &table,
                builtins: &builtins,
                interner,
                config,
                path: &file.path,
            };
            iface::check_struct_impl(ctx, s)?;
        }
    }

    if signatures_only {
        return Ok(table);
    }

    // Pass: function bodies.
    debug!("pass: func bodies");
    for file in files.iter_mut() {
        for decl in file.decls.iter_mut() {
            let Decl::Func(f) = decl else { continue };
            check_func_body(&table, &builtins, interner, config, &schemas, &file.path, f)?;
        }
    }

    // Final pass: no placeholder annotation survives.
    debug!("pass: annotation commit");
    for file in files.iter() {
        commit_file(&table, &builtins, interner, config, file)?;
    }

    Ok(table)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Move a dependency's public names under its package symbol.
fn absorb(table: &mut SymbolTable, dep: SymbolTable, pkg: Symbol) {
    use crate::ast::Visibility;
    for (qid, mut info) in dep.consts {
        if info.vis == Visibility::Public && qid.package.is_empty() {
            let nq = Qid::new(pkg, qid.name);
            info.qid = nq;
            info.typ = requalify_type(&info.typ, pkg);
            table.consts.insert(nq, info);
        }
    }
    for (qid, mut info) in dep.statuses {
        if info.vis == Visibility::Public && qid.package.is_empty() {
            let nq = Qid::new(pkg, qid.name);
            info.qid = nq;
            table.statuses.insert(nq, info);
        }
    }
    for (qid, mut info) in dep.structs {
        if info.vis == Visibility::Public && qid.package.is_empty() {
            let nq = Qid::new(pkg, qid.name);
            info.qid = nq;
            info.fields = info
                .fields
                .into_iter()
                .map(|(n, t)| (n, requalify_type(&t, pkg)))
                .collect();
            table.structs.insert(nq, info);
        }
    }
    for (qqid, mut info) in dep.funcs {
        if info.vis == Visibility::Public && qqid.package.is_empty() {
            let nq = Qqid::new(pkg, qqid.receiver, qqid.name);
            info.qqid = nq;
            info.args = info
                .args
                .into_iter()
                .map(|(n, t)| (n, requalify_type(&t, pkg)))
                .collect();
            info.out = requalify_type(&info.out, pkg);
            table.funcs.insert(nq, info);
        }
    }
}

/// Rewrite package-local struct references to live under `pkg`.
fn requalify_type(t: &Type, pkg: Symbol) -> Type {
    match t {
        Type::Struct(qid) if qid.package.is_empty() => Type::Struct(Qid::new(pkg, qid.name)),
        Type::Array { len, elem } => Type::Array {
            len: len.clone(),
            elem: Rc::new(requalify_type(elem, pkg)),
        },
        Type::Slice(elem) => Type::Slice(Rc::new(requalify_type(elem, pkg))),
        Type::Table(elem) => Type::Table(Rc::new(requalify_type(elem, pkg))),
        Type::Nptr(inner) => Type::Nptr(Rc::new(requalify_type(inner, pkg))),
        Type::Ptr(inner) => Type::Ptr(Rc::new(requalify_type(inner, pkg))),
        Type::Func { receiver, name } => Type::Func {
            receiver: Rc::new(requalify_type(receiver, pkg)),
            name: *name,
        },
        other => other.clone(),
    }
}

fn check_const(ctx: Ctx<'_>, c: &mut crate::ast::ConstDecl) -> CheckResult<ConstInfo> {
    let typer = ExprTyper::const_context(ctx);
    let typ = resolve_type(&typer, &mut c.typ, 0)?;
    typer.check_expr(&mut c.value, 0)?;

    let value = match &typ {
        Type::Array { len, elem } => {
            let ExprKind::List(items) = &c.value.kind else {
                return Err(ctx.err(CheckErrorKind::NonConstant, c.value.span));
            };
            let want = num_traits::ToPrimitive::to_usize(&**len).unwrap_or(usize::MAX);
            if items.len() != want {
                return Err(ctx.err(
                    CheckErrorKind::ConstArrayLengthMismatch {
                        want,
                        got: items.len(),
                    },
                    c.value.span,
                ));
            }
            let bounds = elem.value_bounds();
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                let Some(v) = item.const_value() else {
                    return Err(ctx.err(CheckErrorKind::NonConstant, item.span));
                };
                if let Some(bounds) = &bounds {
                    if !bounds.contains(v) {
                        return Err(ctx.err(
                            CheckErrorKind::IntegerOverflow {
                                value: v.to_string(),
                                range: bounds.to_string(),
                            },
                            item.span,
                        ));
                    }
                }
                values.push(v.clone());
            }
            ConstVal::List(values)
        }
        Type::Numeric { .. } => {
            let Some(v) = c.value.const_value().cloned() else {
                return Err(ctx.err(CheckErrorKind::NonConstant, c.value.span));
            };
            if let Some(bounds) = typ.value_bounds() {
                if !bounds.contains(&v) {
                    return Err(ctx.err(
                        CheckErrorKind::IntegerOverflow {
                            value: v.to_string(),
                            range: bounds.to_string(),
                        },
                        c.value.span,
                    ));
                }
            }
            ConstVal::Scalar(v)
        }
        other => {
            return Err(ctx.err(
                CheckErrorKind::WrongOperandType {
                    op: "const",
                    found: ctx.type_name(other),
                },
                c.span,
            ));
        }
    };

    // Constant declarations never meet the prover; their remaining bounds
    // slots (the list node itself) are filled from types alone.
    annotate_default_bounds(&mut c.value);

    Ok(ConstInfo {
        qid: Qid::local(c.name),
        vis: c.vis,
        typ,
        value,
    })
}

fn check_func_signature(ctx: Ctx<'_>, f: &mut crate::ast::FuncDecl) -> CheckResult<FuncInfo> {
    if let Some(recv) = f.receiver {
        if !ctx.symbols.structs.contains_key(&Qid::local(recv)) {
            return Err(ctx.err(
                CheckErrorKind::UnknownType(ctx.interner.resolve(recv).to_string()),
                f.span,
            ));
        }
    }
    let typer = ExprTyper::const_context(ctx);
    let mut args = Vec::new();
    for arg in f.args.iter_mut() {
        if args.iter().any(|(n, _)| *n == arg.name) {
            return Err(ctx.err(
                CheckErrorKind::DuplicateLocal(ctx.interner.resolve(arg.name).to_string()),
                arg.span,
            ));
        }
        let t = resolve_type(&typer, &mut arg.typ, 0)?;
        args.push((arg.name, t));
    }
    let out = match &mut f.out {
        Some(out) => resolve_type(&typer, out, 0)?,
        None => Type::Empty,
    };
    Ok(FuncInfo {
        qqid: Qqid::new(
            Symbol::EMPTY,
            f.receiver.unwrap_or(Symbol::EMPTY),
            f.name,
        ),
        vis: f.vis,
        effect: f.effect,
        args,
        out,
        preconds: Vec::new(),
        postconds: Vec::new(),
    })
}

type Contract = (Vec<Rc<Expr>>, Vec<Rc<Expr>>);

fn check_contract(
    ctx: Ctx<'_>,
    table: &SymbolTable,
    qqid: Qqid,
    f: &mut crate::ast::FuncDecl,
) -> CheckResult<Contract> {
    let Some(info) = table.funcs.get(&qqid) else {
        return Err(InternalError::new("contract pass before signature pass").into());
    };
    let locals: HashMap<Symbol, Type> = info.args.iter().cloned().collect();
    let receiver = f.receiver.map(Qid::local);
    let typer = ExprTyper {
        ctx,
        locals: Some(&locals),
        receiver,
        func_effect: Effect::Pure,
    };

    let mut preconds = Vec::new();
    let mut postconds = Vec::new();
    for a in f.contract.iter_mut() {
        typer.check_expr(&mut a.cond, 0)?;
        let t = typer.type_of(&a.cond)?;
        if !t.is_bool() {
            let found = ctx.type_name(t);
            return Err(ctx.err(
                CheckErrorKind::NotBool {
                    what: "contract clause",
                    found,
                },
                a.cond.span,
            ));
        }
        for arg in a.args.iter_mut() {
            typer.check_expr(&mut arg.value, 0)?;
            annotate_default_bounds(&mut arg.value);
        }
        annotate_default_bounds(&mut a.cond);
        match a.kind {
            AssertKind::Post => postconds.push(Rc::new(a.cond.clone())),
            _ => preconds.push(Rc::new(a.cond.clone())),
        }
    }
    Ok((preconds, postconds))
}

fn check_func_body(
    table: &SymbolTable,
    builtins: &Builtins,
    interner: &Interner,
    config: &CheckConfig,
    schemas: &[ReasonSchema],
    path: &str,
    f: &mut crate::ast::FuncDecl,
) -> CheckResult<()> {
    debug!(func = interner.resolve(f.name), "checking body");
    let ctx = Ctx {
        symbols: table,
        builtins,
        interner,
        config,
        path,
    };
    let qqid = Qqid::new(Symbol::EMPTY, f.receiver.unwrap_or(Symbol::EMPTY), f.name);
    let Some(info) = table.funcs.get(&qqid) else {
        return Err(InternalError::new("body pass before signature pass").into());
    };
    let receiver = f.receiver.map(Qid::local);

    // Type every statement and expression.
    let locals = stmt::collect_locals(ctx, receiver, &info.args, &mut f.body)?;
    let mut typer = stmt::StmtTyper::new(ctx, locals, receiver, f.effect, info.out.clone());
    typer.check_block(&mut f.body)?;
    let locals = typer.locals;

    // A function that yields a value must not fall off the end.
    if info.out != Type::Empty && !block_terminates(&f.body) {
        return Err(ctx.err(
            CheckErrorKind::ReturnTypeMismatch {
                expected: ctx.type_name(&info.out),
                found: "a body that can fall through".to_string(),
            },
            f.span,
        ));
    }

    // Prove every obligation.
    let mut prover =
        bounds::BoundsChecker::new(ctx, &locals, receiver, f.effect, schemas, info);
    prover.check_func(&mut f.body)?;

    // Coroutines get their persistence summary.
    if f.effect == Effect::Coroutine {
        let summary = liveness::analyse(f);
        f.set_liveness(summary)?;
    }
    Ok(())
}

/// Fill any still-empty bounds slot from the node's type alone. Used for
/// contract clauses, which are assumed rather than walked by the prover.
fn annotate_default_bounds(e: &mut Expr) {
    walk_expr_mut(e, &mut |node| {
        if node.mbounds().is_some() {
            return;
        }
        let interval = match node.const_value() {
            Some(v) => Interval::point(v.clone()),
            None => match node.mtype() {
                Some(t) => match t.value_bounds() {
                    Some(b) => b,
                    None if t.is_bool() => Interval::new(BigInt::from(0), BigInt::from(1)),
                    None => Interval::new(BigInt::from(0), BigInt::from(0)),
                },
                None => return,
            },
        };
        node.merge_mbounds(interval);
    });
}

// ----------------------------------------------------------------------
// Final pass: annotation commit
// ----------------------------------------------------------------------

fn commit_file(
    table: &SymbolTable,
    builtins: &Builtins,
    interner: &Interner,
    config: &CheckConfig,
    file: &SourceFile,
) -> CheckResult<()> {
    let ctx = Ctx {
        symbols: table,
        builtins,
        interner,
        config,
        path: &file.path,
    };
    for decl in &file.decls {
        match decl {
            Decl::Use(_) | Decl::Status(_) => {}
            Decl::Const(c) => {
                commit_type_expr(ctx, &c.typ)?;
                commit_expr(ctx, &c.value)?;
            }
            Decl::Struct(s) => {
                for field in &s.fields {
                    commit_type_expr(ctx, &field.typ)?;
                }
            }
            Decl::Func(f) => {
                for arg in &f.args {
                    commit_type_expr(ctx, &arg.typ)?;
                }
                if let Some(out) = &f.out {
                    commit_type_expr(ctx, out)?;
                }
                for a in &f.contract {
                    commit_expr(ctx, &a.cond)?;
                    for arg in &a.args {
                        commit_expr(ctx, &arg.value)?;
                    }
                }
                commit_block(ctx, &f.body)?;
            }
        }
    }
    Ok(())
}

fn commit_block(ctx: Ctx<'_>, block: &[Stmt]) -> CheckResult<()> {
    for stmt in block {
        // Statements past an unconditional exit were never walked by the
        // prover; they are dead and carry no annotations to confirm.
        match &stmt.kind {
            StmtKind::Var(v) => commit_type_expr(ctx, &v.typ)?,
            StmtKind::Assign(a) => {
                commit_expr(ctx, &a.lhs)?;
                commit_expr(ctx, &a.rhs)?;
            }
            StmtKind::Expr(e) => commit_expr(ctx, e)?,
            StmtKind::If(ifs) => {
                let mut current = ifs;
                loop {
                    commit_expr(ctx, &current.cond)?;
                    commit_block(ctx, &current.then_block)?;
                    match &current.else_arm {
                        ElseArm::None => break,
                        ElseArm::Block(b) => {
                            commit_block(ctx, b)?;
                            break;
                        }
                        ElseArm::ElseIf(next) => current = next,
                    }
                }
            }
            StmtKind::While(w) => {
                commit_expr(ctx, &w.cond)?;
                for a in &w.asserts {
                    commit_expr(ctx, &a.cond)?;
                }
                commit_block(ctx, &w.body)?;
            }
            StmtKind::Iterate(it) => {
                commit_expr(ctx, &it.source)?;
                for a in &it.asserts {
                    commit_expr(ctx, &a.cond)?;
                }
                commit_block(ctx, &it.body)?;
            }
            StmtKind::Jump(_) => {}
            StmtKind::Ret(r) => {
                if let Some(v) = &r.value {
                    commit_expr(ctx, v)?;
                }
            }
            StmtKind::Assert(a) => {
                commit_expr(ctx, &a.cond)?;
                for arg in &a.args {
                    commit_expr(ctx, &arg.value)?;
                }
            }
            StmtKind::IoBind(b) => {
                commit_expr(ctx, &b.io)?;
                commit_expr(ctx, &b.limit)?;
                commit_block(ctx, &b.body)?;
            }
        }
        let terminates = match &stmt.kind {
            StmtKind::Jump(_) => true,
            StmtKind::Ret(r) => r.kind == crate::ast::RetKind::Return,
            _ => false,
        };
        if terminates {
            break;
        }
    }
    Ok(())
}

fn commit_expr(ctx: Ctx<'_>, e: &Expr) -> CheckResult<()> {
    let Some(mtype) = e.mtype() else {
        return Err(InternalError::new(format!(
            "expression {:?} left without a type",
            ctx.render(e)
        ))
        .into());
    };
    let Some(mbounds) = e.mbounds() else {
        return Err(InternalError::new(format!(
            "expression {:?} left without bounds",
            ctx.render(e)
        ))
        .into());
    };
    if let Some(v) = e.const_value() {
        if !mbounds.contains(v) {
            return Err(InternalError::new(format!(
                "constant {} outside its own bounds {}",
                v, mbounds
            ))
            .into());
        }
    } else if *mtype == Type::Ideal {
        return Err(InternalError::new(format!(
            "ideal-typed expression {:?} has no constant value",
            ctx.render(e)
        ))
        .into());
    }
    if let Some(type_bounds) = mtype.value_bounds() {
        if !mbounds.is_sub_of(&type_bounds) {
            return Err(InternalError::new(format!(
                "bounds {} escape the type range {}",
                mbounds, type_bounds
            ))
            .into());
        }
    }

    match &e.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::This => Ok(()),
        ExprKind::Selector { recv, .. } => commit_expr(ctx, recv),
        ExprKind::Index { recv, index } => {
            commit_expr(ctx, recv)?;
            commit_expr(ctx, index)
        }
        ExprKind::SliceOf { recv, lo, hi } => {
            commit_expr(ctx, recv)?;
            if let Some(lo) = lo {
                commit_expr(ctx, lo)?;
            }
            if let Some(hi) = hi {
                commit_expr(ctx, hi)?;
            }
            Ok(())
        }
        ExprKind::Call { callee, args, .. } => {
            commit_expr(ctx, callee)?;
            for arg in args {
                commit_expr(ctx, &arg.value)?;
            }
            Ok(())
        }
        ExprKind::Unary { operand, .. } => commit_expr(ctx, operand),
        ExprKind::Binary { lhs, rhs, .. } => {
            commit_expr(ctx, lhs)?;
            commit_expr(ctx, rhs)
        }
        ExprKind::Assoc { operands, .. } | ExprKind::List(operands) => {
            for operand in operands {
                commit_expr(ctx, operand)?;
            }
            Ok(())
        }
        ExprKind::As { value, target } => {
            commit_expr(ctx, value)?;
            commit_type_expr(ctx, target)
        }
    }
}

fn commit_type_expr(ctx: Ctx<'_>, t: &TypeExpr) -> CheckResult<()> {
    if t.resolved().is_none() {
        return Err(InternalError::new("type expression left unresolved").into());
    }
    match &t.kind {
        TypeExprKind::Named { refinement, .. } => {
            if let Some(r) = refinement {
                if let Some(lo) = &r.lo {
                    commit_expr(ctx, lo)?;
                }
                if let Some(hi) = &r.hi {
                    commit_expr(ctx, hi)?;
                }
            }
            Ok(())
        }
        TypeExprKind::Array { len, elem } => {
            commit_expr(ctx, len)?;
            commit_type_expr(ctx, elem)
        }
        TypeExprKind::Slice(inner)
        | TypeExprKind::Table(inner)
        | TypeExprKind::Nptr(inner)
        | TypeExprKind::Ptr(inner) => commit_type_expr(ctx, inner),
    }
}
