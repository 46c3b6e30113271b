// Test serialization using json
#![cfg(feature = "serde")]

use kas_font_atlas::fonts::FamilyName;
use kas_font_atlas::{AtlasParams, GlyphPlacement, PixelFormat, UvRect, Vec2};
use serde::{de::Deserialize, ser::Serialize};
use std::cmp::PartialEq;
use std::fmt::Debug;

fn test<X: Debug + PartialEq + Serialize + for<'a> Deserialize<'a>>(x: X, t: &str) {
    match serde_json::to_string(&x) {
        Ok(text) => assert_eq!(text, t),
        Err(err) => panic!("Ser of '{x:?}' failed: {err}"),
    }

    match serde_json::from_str::<X>(t) {
        Ok(v) => assert_eq!(v, x),
        Err(err) => panic!("Deser of '{t}' failed: {err}"),
    }
}

#[test]
fn vec2() {
    test(Vec2(1.0, 2.0), "[1.0,2.0]");
}

#[test]
fn font() {
    test(FamilyName::Named("abc".to_string()), "{\"Named\":\"abc\"}");
    test(FamilyName::Monospace, "\"Monospace\"");
}

#[test]
fn atlas_types() {
    test(PixelFormat::Rgba8, "\"Rgba8\"");
    test(
        UvRect {
            x: 0.5,
            y: 0.25,
            w: 0.125,
            h: 1.0,
        },
        "{\"x\":0.5,\"y\":0.25,\"w\":0.125,\"h\":1.0}",
    );
    test(
        GlyphPlacement {
            advance_x: 6.0,
            offset_x: 1.0,
            offset_y: -7.0,
            width: 5.0,
            height: 7.0,
            uv: UvRect::default(),
        },
        "{\"advance_x\":6.0,\"offset_x\":1.0,\"offset_y\":-7.0,\"width\":5.0,\"height\":7.0,\
        \"uv\":{\"x\":0.0,\"y\":0.0,\"w\":0.0,\"h\":0.0}}",
    );
    test(
        AtlasParams::default(),
        "{\"font_size\":18.0,\"width\":512,\"height\":512,\"padding\":1,\"oversample\":2}",
    );
}
