//! End-to-end scenarios exercising the prover, the fact engine, the
//! liveness analyser and the interface check together.

mod common;

use common::{check_body_err, check_err, check_source};
use sift::check::error::CheckErrorKind;

#[test]
fn refinement_rejects_out_of_range_assignment() {
    // 11 fits base.u8, but not the declared refinement [.. 10].
    let kind = check_body_err(
        "var x : base.u8[.. 10]\n\
         x = 11 as base.u8",
    );
    assert!(matches!(kind, CheckErrorKind::IntegerOverflow { .. }));
}

#[test]
fn refinement_accepts_in_range_assignment() {
    check_source(
        "pub func f!() {\n\
         var x : base.u8[.. 10]\n\
         x = 10 as base.u8\n\
         }",
    )
    .expect("10 sits inside [0 .. 10]");
}

#[test]
fn branch_fact_discharges_the_index_obligation() {
    check_source(
        "pub func f!() {\n\
         var a : array[4] base.u8\n\
         var i : base.u32\n\
         if i < 4 {\n\
         a[i] = 0\n\
         }\n\
         }",
    )
    .expect("the branch fact i < 4 proves the index");
}

#[test]
fn without_the_branch_fact_the_index_is_rejected() {
    let kind = check_body_err(
        "var a : array[4] base.u8\n\
         var i : base.u32\n\
         a[i] = 0",
    );
    assert!(matches!(kind, CheckErrorKind::IndexOutOfRange { .. }));
}

#[test]
fn transitivity_reason_discharges_with_both_premises() {
    check_source(
        "pub func f!(n : base.u32, m : base.u32, k : base.u32) {\n\
         if n < k {\n\
         if k <= m {\n\
         assert n < m via \"a < b: a < c; c <= b\"{c: k}\n\
         }\n\
         }\n\
         }",
    )
    .expect("n < k and k <= m are both in scope");
}

#[test]
fn transitivity_reason_fails_without_either_premise() {
    // Missing k <= m.
    let kind = check_err(
        "pub func f!(n : base.u32, m : base.u32, k : base.u32) {\n\
         if n < k {\n\
         assert n < m via \"a < b: a < c; c <= b\"{c: k}\n\
         }\n\
         }",
    );
    assert!(matches!(
        kind,
        CheckErrorKind::ReasonPremiseUndischarged { .. }
    ));

    // Missing n < k.
    let kind = check_err(
        "pub func f!(n : base.u32, m : base.u32, k : base.u32) {\n\
         if k <= m {\n\
         assert n < m via \"a < b: a < c; c <= b\"{c: k}\n\
         }\n\
         }",
    );
    assert!(matches!(
        kind,
        CheckErrorKind::ReasonPremiseUndischarged { .. }
    ));
}

#[test]
fn liveness_marks_a_value_read_after_a_second_suspension() {
    let checked = check_source(
        "pub func f?(src : base.io_reader) {\n\
         var c : base.u8\n\
         var d : base.u8\n\
         c =? src.read_u8?()\n\
         d =? src.read_u8?()\n\
         d = c\n\
         }",
    )
    .expect("a plain coroutine body");

    let sift::ast::Decl::Func(func) = &checked.files[0].decls[0] else {
        panic!("expected a func declaration");
    };
    let summary = func.liveness().expect("coroutines carry a summary");
    let c = checked.interner.lookup("c").unwrap();
    let d = checked.interner.lookup("d").unwrap();
    assert_eq!(summary.needs_persistence(c), Some(true));
    assert_eq!(summary.needs_persistence(d), Some(false));
}

#[test]
fn implementing_struct_without_the_method_is_rejected() {
    let kind = check_err(
        "pub struct s implements base.hasher_u32 {\n\
         state : base.u32,\n\
         }",
    );
    let CheckErrorKind::MethodMissing { method, .. } = kind else {
        panic!("expected MethodMissing, got {:?}", kind);
    };
    assert_eq!(method, "update_u32");
}

#[test]
fn implementing_struct_with_all_methods_passes() {
    check_source(
        "pub struct s implements base.hasher_u32 {\n\
         state : base.u32,\n\
         }\n\
         pub func s.update_u32!(x : slice base.u8) base.u32 {\n\
         return this.state\n\
         }\n\
         pub func s.reset!() {\n\
         }",
    )
    .expect("both required methods are present");
}

#[test]
fn implementing_struct_with_wrong_signature_is_rejected() {
    // update_u32 declared pure instead of impure.
    let kind = check_err(
        "pub struct s implements base.hasher_u32 {\n\
         state : base.u32,\n\
         }\n\
         pub func s.update_u32(x : slice base.u8) base.u32 {\n\
         return this.state\n\
         }\n\
         pub func s.reset!() {\n\
         }",
    );
    assert!(matches!(
        kind,
        CheckErrorKind::MethodSignatureMismatch { .. }
    ));
}

#[test]
fn while_true_postcondition_holds_only_on_break_paths() {
    check_source(
        "pub func f!() {\n\
         var i : base.u32\n\
         while true, post i >= 1 {\n\
         i = 1\n\
         break\n\
         }\n\
         }",
    )
    .expect("the break path establishes i >= 1; the natural exit is unreachable");
}

#[test]
fn while_true_postcondition_must_hold_at_the_break() {
    let kind = check_err(
        "pub func f!() {\n\
         var i : base.u32\n\
         while true, post i >= 2 {\n\
         i = 1\n\
         break\n\
         }\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::CannotProve(_)));
}

#[test]
fn checking_twice_is_a_no_op() {
    let mut interner = sift::Interner::new();
    let src = "pub func f!() {\n\
               var x : base.u8[.. 10]\n\
               x = 10 as base.u8\n\
               }";
    let file = sift::parse_file("main.sift", src, &mut interner).unwrap();
    let mut files = vec![file];
    let mut resolver = |_: &str| -> Result<Vec<u8>, String> { Err("none".to_string()) };
    let config = sift::CheckConfig::default();

    sift::check_package(&mut files, &mut interner, &mut resolver, &config)
        .expect("first run");
    sift::check_package(&mut files, &mut interner, &mut resolver, &config)
        .expect("an already-annotated tree is accepted unchanged");
}
