//! Typing rules: assignability, calls, effects, statuses, refinements and
//! top-level declarations.

mod common;

use common::{check_body_err, check_err, check_source};
use sift::check::error::CheckErrorKind;

#[test]
fn incompatible_widths_do_not_assign() {
    let kind = check_body_err(
        "var x : base.u8\n\
         var y : base.u16\n\
         x = y",
    );
    assert!(matches!(kind, CheckErrorKind::IncompatibleAssignment { .. }));
}

#[test]
fn ideal_literals_widen_to_any_numeric() {
    check_source(
        "pub func f!() {\n\
         var x : base.u8\n\
         var y : base.u64\n\
         x = 7\n\
         y = 7\n\
         }",
    )
    .expect("7 fits both");
}

#[test]
fn unknown_identifier_suggests_a_near_miss() {
    let kind = check_body_err(
        "var length_limit : base.u32\n\
         length_limit = lenght_limit",
    );
    let CheckErrorKind::UnknownIdentifier { name, suggestion } = kind else {
        panic!("expected UnknownIdentifier");
    };
    assert_eq!(name, "lenght_limit");
    assert_eq!(suggestion.as_deref(), Some("length_limit"));
}

#[test]
fn duplicate_locals_are_rejected() {
    let kind = check_body_err(
        "var x : base.u8\n\
         var x : base.u16",
    );
    assert!(matches!(kind, CheckErrorKind::DuplicateLocal(_)));
}

#[test]
fn duplicate_top_level_names_are_rejected_across_kinds() {
    let kind = check_err(
        "pub struct shared {\n\
         }\n\
         pub const shared : base.u32 = 1",
    );
    assert!(matches!(kind, CheckErrorKind::DuplicateTopLevelName(_)));
}

#[test]
fn call_requires_matching_argument_names() {
    let kind = check_err(
        "pub func g!(count : base.u32) {\n\
         }\n\
         pub func f!() {\n\
         g!(n: 4)\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::ArgNameMismatch { .. }));
}

#[test]
fn call_requires_matching_arity() {
    let kind = check_err(
        "pub func g!(count : base.u32) {\n\
         }\n\
         pub func f!() {\n\
         g!()\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::ArityMismatch { .. }));
}

#[test]
fn call_site_effect_marker_must_match_exactly() {
    // g is impure; calling it without the marker is rejected.
    let kind = check_err(
        "pub func g!() {\n\
         }\n\
         pub func f!() {\n\
         g()\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::EffectMarkerMismatch { .. }));
}

#[test]
fn a_pure_function_cannot_call_an_impure_one() {
    let kind = check_err(
        "pub func g!() {\n\
         }\n\
         pub func f() base.u32 {\n\
         g!()\n\
         return 0\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::EffectExceedsCaller { .. }));
}

#[test]
fn coroutine_calls_only_inside_coroutines() {
    let kind = check_err(
        "pub func f!(src : base.io_reader) {\n\
         var c : base.u8\n\
         c =? src.read_u8?()\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::EffectExceedsCaller { .. }));
}

#[test]
fn coroutine_results_need_the_suspending_assignment() {
    let kind = check_err(
        "pub func f?(src : base.io_reader) {\n\
         var c : base.u8\n\
         c = src.read_u8?()\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::EffectMarkerMismatch { .. }));
}

#[test]
fn yield_outside_a_coroutine_is_rejected() {
    let kind = check_err(
        "pub status \"$keep going\"\n\
         pub func f!() {\n\
         yield \"$keep going\"\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::YieldOutsideCoroutine));
}

#[test]
fn statuses_resolve_by_message_text() {
    check_source(
        "pub status \"#bad header\"\n\
         pub func f?(src : base.io_reader) {\n\
         return \"#bad header\"\n\
         }",
    )
    .expect("a coroutine may return a status");

    let kind = check_err(
        "pub func f?(src : base.io_reader) {\n\
         return \"#never declared\"\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::UnknownStatus(_)));
}

#[test]
fn status_messages_declare_their_class_in_the_first_byte() {
    let kind = check_err("pub status \"missing marker\"");
    assert!(matches!(kind, CheckErrorKind::MalformedStatus(_)));
}

#[test]
fn refinements_must_sit_inside_the_base_range() {
    let kind = check_err("pub const N : base.u8[.. 300] = 5");
    assert!(matches!(kind, CheckErrorKind::RefinementOutsideRange { .. }));
}

#[test]
fn refinement_bounds_must_be_constant() {
    // A pure call types fine in a constant context but never folds.
    let kind = check_err(
        "pub func g() base.u32 {\n\
         return 1\n\
         }\n\
         pub func f!() {\n\
         var x : base.u32[.. g()]\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::NonConstantRefinement));
}

#[test]
fn refinement_bounds_may_name_constants() {
    check_source(
        "pri const LIMIT : base.u32 = 100\n\
         pub func f!() {\n\
         var x : base.u32[.. LIMIT]\n\
         x = 100\n\
         }",
    )
    .expect("a refinement bound can be a named constant");
}

#[test]
fn constant_arrays_check_length_and_element_range() {
    check_source("pri const LUT : array[4] base.u8 = [1, 2, 3, 4]").expect("well-formed");

    let kind = check_err("pri const LUT : array[4] base.u8 = [1, 2, 3]");
    assert!(matches!(
        kind,
        CheckErrorKind::ConstArrayLengthMismatch { want: 4, got: 3 }
    ));

    let kind = check_err("pri const LUT : array[2] base.u8 = [1, 300]");
    assert!(matches!(kind, CheckErrorKind::IntegerOverflow { .. }));
}

#[test]
fn constant_indexing_into_a_constant_array_folds() {
    check_source(
        "pri const LUT : array[4] base.u8[.. 9] = [1, 2, 3, 4]\n\
         pub func f!() {\n\
         var x : base.u8[.. 9]\n\
         x = LUT[2]\n\
         }",
    )
    .expect("LUT[2] folds to 3, inside [0 .. 9]");
}

#[test]
fn struct_cycles_by_value_are_fatal() {
    let kind = check_err(
        "pub struct a {\n\
         f : b,\n\
         }\n\
         pub struct b {\n\
         g : a,\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::StructCycle(_)));
}

#[test]
fn negation_needs_a_signed_or_ideal_operand() {
    let kind = check_body_err(
        "var x : base.u32\n\
         x = -x",
    );
    assert!(matches!(kind, CheckErrorKind::WrongOperandType { .. }));
}

#[test]
fn wrapping_arithmetic_requires_unsigned_operands() {
    let kind = check_body_err(
        "var x : base.i32\n\
         x ~mod+= 1",
    );
    assert!(matches!(kind, CheckErrorKind::SignedOperand { .. }));
}

#[test]
fn conversions_are_numeric_to_numeric_only() {
    let kind = check_body_err(
        "var b : base.bool\n\
         var x : base.u8\n\
         x = b as base.u8",
    );
    assert!(matches!(kind, CheckErrorKind::InvalidConversion { .. }));
}

#[test]
fn identity_conversion_is_accepted() {
    check_source(
        "pub func f!() {\n\
         var x : base.u8\n\
         x = x as base.u8\n\
         }",
    )
    .expect("x as its own type is an identity");
}

#[test]
fn conditions_must_be_boolean_and_effect_free() {
    let kind = check_body_err(
        "var x : base.u32\n\
         if x {\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::NotBool { .. }));

    let kind = check_err(
        "pub func g!() base.bool {\n\
         return true\n\
         }\n\
         pub func f!() {\n\
         if g!() {\n\
         }\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::ConditionHasEffect));
}

#[test]
fn value_returning_functions_must_not_fall_through() {
    let kind = check_err(
        "pub func f!() base.u32 {\n\
         var x : base.u32\n\
         x = 1\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::ReturnTypeMismatch { .. }));
}

#[test]
fn jumps_need_a_matching_loop() {
    let kind = check_body_err("break");
    assert!(matches!(kind, CheckErrorKind::NoMatchingLoop));

    let kind = check_body_err(
        "while true {\n\
         break.missing\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::NoMatchingLoop));
}

#[test]
fn labeled_jumps_reach_an_outer_loop() {
    check_source(
        "pub func f!() {\n\
         var i : base.u32\n\
         while.outer true {\n\
         while true {\n\
         break.outer\n\
         }\n\
         }\n\
         }",
    )
    .expect("break.outer targets the labeled loop");
}

#[test]
fn io_bind_confines_jumps_and_returns() {
    let kind = check_err(
        "pub func f?(src : base.io_reader) {\n\
         var n : base.u64\n\
         n = 8\n\
         while true {\n\
         io_bind (io: src, limit: n) {\n\
         break\n\
         }\n\
         }\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::JumpOutOfIoBind));

    let kind = check_err(
        "pub func f?(src : base.io_reader) {\n\
         var n : base.u64\n\
         n = 8\n\
         io_bind (io: src, limit: n) {\n\
         return\n\
         }\n\
         }",
    );
    assert!(matches!(kind, CheckErrorKind::ReturnOutOfIoBind));
}
