//! The canonical rendering round-trips: parsing rendered output and
//! rendering again is a fixed point.

use sift::intern::Interner;
use sift::parser::parse_file;
use sift::render::Renderer;

fn canonical(src: &str) -> String {
    let mut interner = Interner::new();
    let file = parse_file("t.sift", src, &mut interner).expect("parse");
    Renderer::new(&interner).file(&file)
}

fn assert_roundtrip(src: &str) {
    let once = canonical(src);
    let twice = canonical(&once);
    assert_eq!(once, twice, "rendering is not a fixed point for:\n{}", src);
}

#[test]
fn declarations_round_trip() {
    assert_roundtrip(
        "use \"std/crc32\"\n\
         pub status \"#bad header\"\n\
         pri const LUT : array[4] base.u8 = [1, 2, 3, 4]\n\
         pub struct decoder implements base.hasher_u32 {\n\
         state : base.u32,\n\
         buf : array[16] base.u8,\n\
         }",
    );
}

#[test]
fn statements_and_expressions_round_trip() {
    assert_roundtrip(
        "pub func decoder.run?(src : base.io_reader, n : base.u32[.. 8]), pre n >= 1 {\n\
         var i : base.u32\n\
         var c : base.u8\n\
         i = 0\n\
         while.outer i < 8, inv i <= 8, post i == 8 {\n\
         if (i & 1) == 0 {\n\
         c =? src.read_u8?()\n\
         } else {\n\
         continue.outer\n\
         }\n\
         i += 1\n\
         }\n\
         assert i <= 8 via \"a <= b: a <= c; c <= b\"{c: i}\n\
         io_bind (io: src, limit: 8) {\n\
         yield \"$short read\"\n\
         }\n\
         }",
    );
}

#[test]
fn operator_chains_round_trip() {
    assert_roundtrip(
        "pub func f!(x : base.u32, y : base.u32) base.u32 {\n\
         return (x + y + 1) ~mod* (x ~sat- y)\n\
         }",
    );
}

#[test]
fn slices_and_conversions_round_trip() {
    assert_roundtrip(
        "pub func f!(s : slice base.u8) base.u64 {\n\
         var t : slice base.u8\n\
         t = s[1 ..]\n\
         t = s[.. 4]\n\
         return (s[0] as base.u64) + t.length()\n\
         }",
    );
}
