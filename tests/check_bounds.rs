//! Interval arithmetic and the proof obligations it discharges.

mod common;

use common::{check_body, check_body_err, check_err, check_source};
use sift::check::error::CheckErrorKind;

#[test]
fn addition_can_overflow_its_type() {
    let kind = check_body_err(
        "var x : base.u8\n\
         var y : base.u8\n\
         x = x + y",
    );
    assert!(matches!(kind, CheckErrorKind::IntegerOverflow { .. }));
}

#[test]
fn refined_operands_keep_addition_in_range() {
    check_body(
        "var x : base.u8[.. 100]\n\
         var y : base.u8[.. 100]\n\
         var z : base.u8\n\
         z = x + y",
    )
    .expect("100 + 100 = 200 fits base.u8");
}

#[test]
fn wrapping_addition_never_overflows() {
    check_body(
        "var x : base.u8\n\
         var y : base.u8\n\
         x = x ~mod+ y",
    )
    .expect("wrapping arithmetic spans the whole type");
}

#[test]
fn saturating_addition_clamps_to_the_type() {
    check_body(
        "var x : base.u8\n\
         var y : base.u8\n\
         x = x ~sat+ y",
    )
    .expect("saturating arithmetic clamps");
}

#[test]
fn division_needs_a_provably_positive_divisor() {
    let kind = check_body_err(
        "var x : base.u32\n\
         var y : base.u32\n\
         x = x / y",
    );
    assert!(matches!(kind, CheckErrorKind::DivisionByZero));
}

#[test]
fn a_signed_dividend_divides_by_a_positive_divisor() {
    // The sign obligation is the divisor's alone; the dividend may be
    // negative.
    check_body(
        "var x : base.i32\n\
         var y : base.i32[1 .. 10]\n\
         x = x / y\n\
         x = x % y",
    )
    .expect("the divisor's lower bound is strictly positive");
}

#[test]
fn a_signed_divisor_is_still_rejected() {
    let kind = check_body_err(
        "var x : base.i32\n\
         var y : base.i32\n\
         x = x / y",
    );
    assert!(matches!(kind, CheckErrorKind::DivisionByZero));
}

#[test]
fn a_branch_fact_makes_the_divisor_positive() {
    check_body(
        "var x : base.u32\n\
         var y : base.u32\n\
         if y > 0 {\n\
         x = x / y\n\
         }",
    )
    .expect("y > 0 inside the branch");
}

#[test]
fn constant_division_by_zero_fails_at_fold_time() {
    let kind = check_err("pub const N : base.u32 = 1 / 0");
    assert!(matches!(kind, CheckErrorKind::DivisionByZero));
}

#[test]
fn shift_counts_are_bounded() {
    let kind = check_body_err(
        "var x : base.u64\n\
         var n : base.u32\n\
         x = x << n",
    );
    assert!(matches!(kind, CheckErrorKind::ShiftOutOfRange { .. }));
}

#[test]
fn refined_shift_counts_pass_with_an_overflow_proof() {
    check_body(
        "var x : base.u64[.. 15]\n\
         var n : base.u32[.. 4]\n\
         var y : base.u64[.. 240]\n\
         y = x << n",
    )
    .expect("15 << 4 = 240");
}

#[test]
fn bitwise_results_round_up_to_a_power_of_two() {
    // x, y <= 5 so x | y <= 7; 6 is not a provable ceiling.
    check_body(
        "var x : base.u8[.. 5]\n\
         var y : base.u8[.. 5]\n\
         var z : base.u8[.. 7]\n\
         z = x | y",
    )
    .expect("the ceiling is next_pow2 - 1");

    let kind = check_body_err(
        "var x : base.u8[.. 5]\n\
         var y : base.u8[.. 5]\n\
         var z : base.u8[.. 6]\n\
         z = x | y",
    );
    assert!(matches!(kind, CheckErrorKind::IntegerOverflow { .. }));
}

#[test]
fn multiplication_requires_nonnegative_operands() {
    let kind = check_body_err(
        "var x : base.i32\n\
         var y : base.i32\n\
         x = x * y",
    );
    assert!(matches!(kind, CheckErrorKind::SignedOperand { .. }));
}

#[test]
fn subtraction_tightens_from_an_ordering_fact() {
    // Unsigned subtraction alone could underflow, but i <= n is known.
    check_body(
        "var n : base.u32\n\
         var i : base.u32\n\
         var d : base.u32\n\
         if i <= n {\n\
         d = n - i\n\
         }",
    )
    .expect("n - i is nonnegative under i <= n");

    let kind = check_body_err(
        "var n : base.u32\n\
         var i : base.u32\n\
         var d : base.u32\n\
         d = n - i",
    );
    assert!(matches!(kind, CheckErrorKind::IntegerOverflow { .. }));
}

#[test]
fn slice_obligations_cover_order_and_length() {
    check_body(
        "var a : array[8] base.u8\n\
         var s : slice base.u8\n\
         s = a[2 .. 6]",
    )
    .expect("2 <= 6 <= 8");

    let kind = check_body_err(
        "var a : array[8] base.u8\n\
         var s : slice base.u8\n\
         s = a[6 .. 2]",
    );
    assert!(matches!(kind, CheckErrorKind::SliceIndicesOutOfOrder));

    let kind = check_body_err(
        "var a : array[8] base.u8\n\
         var s : slice base.u8\n\
         s = a[2 .. 9]",
    );
    assert!(matches!(kind, CheckErrorKind::SliceIndicesOutOfOrder));
}

#[test]
fn slice_length_facts_discharge_element_access() {
    check_source(
        "pub func f!(s : slice base.u8) base.u8 {\n\
         if s.length() > 0 {\n\
         return s[0]\n\
         }\n\
         return 0\n\
         }",
    )
    .expect("s.length() > 0 proves 0 < s.length()");
}

#[test]
fn slice_access_without_a_length_fact_is_rejected() {
    let kind = check_err(
        "pub func f!(s : slice base.u8) base.u8 {\n\
         return s[0]\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::IndexOutOfRange { .. }));
}

#[test]
fn peek_requires_proven_availability() {
    check_source(
        "pub func f!(src : base.io_reader) base.u8 {\n\
         if src.available() >= 1 {\n\
         return src.peek_u8()\n\
         }\n\
         return 0\n\
         }",
    )
    .expect("availability is proven inside the branch");

    let kind = check_err(
        "pub func f!(src : base.io_reader) base.u8 {\n\
         return src.peek_u8()\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::CannotProve(_)));
}

#[test]
fn proven_availability_marks_reads_as_non_suspending() {
    let checked = check_source(
        "pub func f?(src : base.io_reader) {\n\
         var c : base.u8\n\
         if src.available() >= 1 {\n\
         c =? src.read_u8?()\n\
         }\n\
         }",
    )
    .expect("a guarded coroutine read");

    let sift::ast::Decl::Func(func) = &checked.files[0].decls[0] else {
        panic!("expected a func");
    };
    let sift::ast::StmtKind::If(ifs) = &func.body[1].kind else {
        panic!("expected the if");
    };
    let sift::ast::StmtKind::Assign(assign) = &ifs.then_block[0].kind else {
        panic!("expected the guarded assignment");
    };
    assert!(assign.rhs.flags.proven_not_to_suspend);
}

#[test]
fn unguarded_reads_are_not_marked() {
    let checked = check_source(
        "pub func f?(src : base.io_reader) {\n\
         var c : base.u8\n\
         c =? src.read_u8?()\n\
         }",
    )
    .expect("an unguarded coroutine read still checks");

    let sift::ast::Decl::Func(func) = &checked.files[0].decls[0] else {
        panic!("expected a func");
    };
    let sift::ast::StmtKind::Assign(assign) = &func.body[1].kind else {
        panic!("expected the assignment");
    };
    assert!(!assign.rhs.flags.proven_not_to_suspend);
}

#[test]
fn arguments_must_fit_refined_parameter_types() {
    let kind = check_err(
        "pub func g!(small : base.u32[.. 10]) {\n\
         }\n\
         pub func f!(n : base.u32) {\n\
         g!(small: n)\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::IntegerOverflow { .. }));
}

#[test]
fn refined_arguments_pass_with_a_fact() {
    check_source(
        "pub func g!(small : base.u32[.. 10]) {\n\
         }\n\
         pub func f!(n : base.u32) {\n\
         if n <= 10 {\n\
         g!(small: n)\n\
         }\n\
         }",
    )
    .expect("n <= 10 puts n inside the parameter refinement");
}

#[test]
fn compound_add_rewrites_facts_with_the_inverse() {
    // After i += 1, the old i < 4 survives as i < 5, which still proves
    // the index into an array of 8.
    check_body(
        "var a : array[8] base.u8\n\
         var i : base.u32\n\
         if i < 4 {\n\
         i += 1\n\
         a[i] = 0\n\
         }",
    )
    .expect("i < 5 after the increment");
}

#[test]
fn plain_assignment_records_an_equality_fact() {
    check_body(
        "var a : array[4] base.u8\n\
         var i : base.u32\n\
         i = 3\n\
         a[i] = 0",
    )
    .expect("i == 3 proves the index");
}
