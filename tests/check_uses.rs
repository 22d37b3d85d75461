//! Package resolution through the injected `use` callback, including the
//! on-disk layout the CLI resolver uses.

mod common;

use common::{check_with_deps, Checked};
use sift::check::error::CheckErrorKind;
use sift::Fatal;

const CRC32: &str = "\
pub status \"#bad length\"\n\
pub const POLY : base.u32 = 0x04C11DB7\n\
pub struct hasher {\n\
    state : base.u32,\n\
}\n\
pub func hasher.feed!(x : base.u8) {\n\
    this.state = this.state ~mod+ (x as base.u32)\n\
}\n\
pri const SECRET : base.u32 = 7\n";

fn err_kind(result: Result<Checked, Fatal>) -> CheckErrorKind {
    match result {
        Ok(_) => panic!("expected a failure"),
        Err(Fatal::Check(e)) => e.kind,
        Err(other) => panic!("expected a check error, got {}", other),
    }
}

#[test]
fn used_packages_expose_consts_structs_and_methods() {
    check_with_deps(
        "use \"std/crc32\"\n\
         pub func f!() base.u32 {\n\
         var h : crc32.hasher\n\
         h.feed!(x: 1)\n\
         return crc32.POLY\n\
         }",
        &[("std/crc32", CRC32)],
    )
    .expect("the dependency's public names resolve under its basename");
}

#[test]
fn used_statuses_resolve_by_message() {
    check_with_deps(
        "use \"std/crc32\"\n\
         pub func f?(src : base.io_reader) {\n\
         return \"#bad length\"\n\
         }",
        &[("std/crc32", CRC32)],
    )
    .expect("statuses travel with the package");
}

#[test]
fn private_names_do_not_cross_packages() {
    let kind = err_kind(check_with_deps(
        "use \"std/crc32\"\n\
         pub func f!() base.u32 {\n\
         return crc32.SECRET\n\
         }",
        &[("std/crc32", CRC32)],
    ));
    assert!(matches!(kind, CheckErrorKind::UnknownIdentifier { .. }));
}

#[test]
fn missing_packages_fail_with_unresolved_use() {
    let kind = err_kind(check_with_deps("use \"std/nowhere\"", &[]));
    assert!(matches!(kind, CheckErrorKind::UnresolvedUse { .. }));
}

#[test]
fn cyclic_uses_are_reported() {
    let kind = err_kind(check_with_deps(
        "use \"std/a\"",
        &[("std/a", "use \"std/b\"\n"), ("std/b", "use \"std/a\"\n")],
    ));
    let CheckErrorKind::UnresolvedUse { detail, .. } = kind else {
        panic!("expected UnresolvedUse");
    };
    assert!(detail.contains("cyclic"));
}

#[test]
fn dependency_signature_errors_surface() {
    let kind = err_kind(check_with_deps(
        "use \"std/broken\"",
        &[("std/broken", "pub const N : base.u8 = 300\n")],
    ));
    assert!(matches!(kind, CheckErrorKind::IntegerOverflow { .. }));
}

#[test]
fn dependency_bodies_are_not_checked() {
    // Signatures only: a body that would fail the prover is ignored when
    // the package is pulled in through `use`.
    check_with_deps(
        "use \"std/lazy\"\n\
         pub func f!() base.u32 {\n\
         return lazy.N\n\
         }",
        &[(
            "std/lazy",
            "pub const N : base.u32 = 1\n\
             pub func g!() {\n\
             var a : array[2] base.u8\n\
             var i : base.u32\n\
             a[i] = 0\n\
             }\n",
        )],
    )
    .expect("only the dependency's signatures are checked");
}

#[test]
fn the_cli_resolver_reads_from_search_directories() {
    use std::io::Write;

    let dir = tempfile::tempdir().expect("tempdir");
    let std_dir = dir.path().join("std");
    std::fs::create_dir_all(&std_dir).expect("mkdir");
    let mut dep = std::fs::File::create(std_dir.join("crc32.sift")).expect("create");
    dep.write_all(CRC32.as_bytes()).expect("write");

    let main_path = dir.path().join("main.sift");
    std::fs::write(
        &main_path,
        "use \"std/crc32\"\n\
         pub func f!() base.u32 {\n\
         return crc32.POLY\n\
         }\n",
    )
    .expect("write main");

    let mut interner = sift::Interner::new();
    let source = std::fs::read_to_string(&main_path).unwrap();
    let file = sift::parse_file("main.sift", &source, &mut interner).unwrap();
    let mut files = vec![file];

    let root = dir.path().to_path_buf();
    let mut resolver = move |use_path: &str| -> Result<Vec<u8>, String> {
        let candidate = root.join(format!("{}.sift", use_path));
        std::fs::read(&candidate).map_err(|e| e.to_string())
    };

    sift::check_package(
        &mut files,
        &mut interner,
        &mut resolver,
        &sift::CheckConfig::default(),
    )
    .expect("resolution through the filesystem");
}
