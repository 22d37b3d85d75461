//! Fact propagation across branches, loops and mutation.

mod common;

use common::{check_body, check_body_err, check_source};
use sift::check::error::CheckErrorKind;

#[test]
fn facts_reconcile_to_the_branch_intersection() {
    // Both branches establish i < 8, so the index after the if passes.
    check_body(
        "var a : array[8] base.u8\n\
         var i : base.u32\n\
         var b : base.bool\n\
         if b {\n\
         i = 2\n\
         } else {\n\
         i = 5\n\
         }\n\
         if i < 8 {\n\
         a[i] = 0\n\
         }",
    )
    .expect("the guard re-establishes the bound");
}

#[test]
fn facts_from_one_branch_do_not_leak() {
    let kind = check_body_err(
        "var a : array[8] base.u8\n\
         var i : base.u32\n\
         var b : base.bool\n\
         if b {\n\
         i = 2\n\
         }\n\
         a[i] = 0",
    );
    assert!(matches!(kind, CheckErrorKind::IndexOutOfRange { .. }));
}

#[test]
fn a_terminating_branch_leaves_its_negation() {
    // The early return removes i >= 4 from every path that continues.
    check_body(
        "var a : array[4] base.u8\n\
         var i : base.u32\n\
         if i >= 4 {\n\
         return\n\
         }\n\
         a[i] = 0",
    )
    .expect("after the early return, i < 4 holds");
}

#[test]
fn mutation_invalidates_facts_about_the_variable() {
    let kind = check_body_err(
        "var a : array[4] base.u8\n\
         var i : base.u32\n\
         if i < 4 {\n\
         i = i * 2\n\
         a[i] = 0\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::IndexOutOfRange { .. }));
}

#[test]
fn loop_bodies_start_from_their_invariants() {
    // i < 4 proven outside the loop does not survive into the body; the
    // invariant i <= 3 must be stated to keep the index provable.
    check_body(
        "var a : array[4] base.u8\n\
         var i : base.u32\n\
         i = 0\n\
         while i <= 3, inv i <= 3 {\n\
         a[i] = 0\n\
         break\n\
         }",
    )
    .expect("the invariant carries the bound into the body");

    let kind = check_body_err(
        "var a : array[4] base.u8\n\
         var i : base.u32\n\
         if i < 4 {\n\
         while true {\n\
         a[i] = 0\n\
         break\n\
         }\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::IndexOutOfRange { .. }));
}

#[test]
fn loop_invariants_must_hold_at_entry() {
    let kind = check_body_err(
        "var i : base.u32\n\
         i = 9\n\
         while i <= 3, inv i <= 3 {\n\
         break\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::CannotProve(_)));
}

#[test]
fn the_negated_condition_holds_after_a_breakless_loop() {
    check_body(
        "var a : array[8] base.u8\n\
         var i : base.u32[.. 8]\n\
         while i < 8 {\n\
         i += 1\n\
         }\n\
         a[7] = i as base.u8 ~mod- 1",
    )
    .expect("after the loop, i >= 8");
}

#[test]
fn impure_calls_drop_facts_reached_through_pointers() {
    // The availability fact dies at the suspension; the second peek has
    // nothing left to prove it.
    let kind = check_source(
        "pub func f?(src : base.io_reader) {\n\
         var c : base.u8\n\
         var d : base.u8\n\
         if src.available() >= 1 {\n\
         c =? src.read_u8?()\n\
         d = src.peek_u8()\n\
         }\n\
         }",
    )
    .map(|_| ())
    .unwrap_err();
    let sift::Fatal::Check(e) = kind else {
        panic!("expected a check error");
    };
    assert!(matches!(e.kind, CheckErrorKind::CannotProve(_)));
}

#[test]
fn pure_calls_preserve_io_facts() {
    check_source(
        "pub func f!(src : base.io_reader) base.u8 {\n\
         if src.available() >= 1 {\n\
         return src.peek_u8()\n\
         }\n\
         return 0\n\
         }",
    )
    .expect("peek is pure and keeps the availability fact alive");
}

#[test]
fn iterate_clears_facts_on_entry() {
    let kind = check_source(
        "pub func f!(s : slice base.u8, a : slice base.u8) {\n\
         var x : base.u8\n\
         if a.length() > 0 {\n\
         iterate (e : s) {\n\
         x = a[0]\n\
         }\n\
         }\n\
         }",
    )
    .map(|_| ())
    .unwrap_err();
    let sift::Fatal::Check(e) = kind else {
        panic!("expected a check error");
    };
    assert!(matches!(e.kind, CheckErrorKind::IndexOutOfRange { .. }));
}

#[test]
fn iterate_binds_the_element_type() {
    check_source(
        "pub func f!(s : slice base.u8) base.u32 {\n\
         var total : base.u32\n\
         iterate (e : s) {\n\
         total ~mod+= e as base.u32\n\
         }\n\
         return total\n\
         }",
    )
    .expect("the binding is a u8 element");
}
