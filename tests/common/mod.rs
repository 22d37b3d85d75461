//! Checker test harness.
//!
//! Parses a source string, runs the full check pipeline, and hands back
//! either the annotated files or the first failure, so scenario tests can
//! assert on both.
#![allow(dead_code)]

use sift::check::error::{CheckErrorKind, Fatal};
use sift::check::{check_package, CheckConfig};
use sift::intern::Interner;
use sift::parser::parse_file;
use sift::SourceFile;

pub struct Checked {
    pub files: Vec<SourceFile>,
    pub interner: Interner,
}

/// Check a single-file package with no dependencies.
pub fn check_source(src: &str) -> Result<Checked, Fatal> {
    check_with_deps(src, &[])
}

/// Check a package whose `use` paths resolve against `deps`.
pub fn check_with_deps(src: &str, deps: &[(&str, &str)]) -> Result<Checked, Fatal> {
    let mut interner = Interner::new();
    let file = parse_file("main.sift", src, &mut interner).map_err(|error| Fatal::Parse {
        path: "main.sift".to_string(),
        error,
    })?;
    let mut files = vec![file];

    let deps: Vec<(String, String)> = deps
        .iter()
        .map(|(p, s)| (p.to_string(), s.to_string()))
        .collect();
    let mut resolver = move |path: &str| -> Result<Vec<u8>, String> {
        deps.iter()
            .find(|(p, _)| p == path)
            .map(|(_, s)| s.as_bytes().to_vec())
            .ok_or_else(|| "no such package".to_string())
    };

    check_package(
        &mut files,
        &mut interner,
        &mut resolver,
        &CheckConfig::default(),
    )?;
    Ok(Checked { files, interner })
}

/// The failure's error kind, for assertions; panics on success or on a
/// non-check failure.
pub fn check_err(src: &str) -> CheckErrorKind {
    match check_source(src) {
        Ok(_) => panic!("expected the checker to reject:\n{}", src),
        Err(Fatal::Check(e)) => e.kind,
        Err(other) => panic!("expected a check error, got: {}", other),
    }
}

/// A function body wrapped in a throwaway impure function.
pub fn check_body(body: &str) -> Result<Checked, Fatal> {
    check_source(&format!("pub func f!() {{\n{}\n}}", body))
}

pub fn check_body_err(body: &str) -> CheckErrorKind {
    match check_body(body) {
        Ok(_) => panic!("expected the checker to reject body:\n{}", body),
        Err(Fatal::Check(e)) => e.kind,
        Err(other) => panic!("expected a check error, got: {}", other),
    }
}
