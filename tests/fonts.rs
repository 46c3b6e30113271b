// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Font parsing against synthetic fonts

mod support;

use kas_font_atlas::fonts::{GlyphId, ParseError, ParsedFont, Tag, MAX_COMPOSITE_DEPTH};
use kas_font_atlas::Vec2;
use support::{
    ascii_font, composite, composite_of, rect, Component, FontBuilder, GlyphData, ARGS_ARE_WORDS,
    ARGS_ARE_XY_VALUES, HAVE_SCALE, HAVE_TWO_BY_TWO, HAVE_XY_SCALE, SCALED_COMPONENT_OFFSET,
};

#[test]
fn metrics_and_cmap() {
    let font = ParsedFont::parse(ascii_font().build()).unwrap();
    assert_eq!(font.units_per_em(), 1000);
    assert_eq!(font.ascender(), 800);
    assert_eq!(font.descender(), -200);
    assert_eq!(font.line_gap(), 100);
    // notdef, space and 94 visible glyphs
    assert_eq!(font.num_glyphs(), 96);

    let space = font.glyph_index(b' '.into());
    assert_eq!(space, GlyphId(1));
    assert!(font.is_empty_glyph(space));
    assert_eq!(font.advance(space), support::SPACE_ADVANCE);

    let a = font.glyph_index(b'A'.into());
    assert_ne!(a, GlyphId::NOTDEF);
    assert!(!font.is_empty_glyph(a));
    assert_eq!(font.advance(a), support::ASCII_ADVANCE);

    assert_eq!(font.glyph_index(0xE9), GlyphId::NOTDEF);
    assert_eq!(font.glyph_index(0xFFFF), GlyphId::NOTDEF);
}

#[test]
fn kerning_pairs() {
    let font = ParsedFont::parse(ascii_font().build()).unwrap();
    let a = font.glyph_index(b'A'.into());
    let v = font.glyph_index(b'V'.into());
    assert_eq!(font.kerning(a, v), support::KERN_AV);
    assert_eq!(font.kerning(v, a), 0);
    assert_eq!(font.kerning_pairs().count(), 1);
}

#[test]
fn missing_table() {
    let mut data = ascii_font().build();
    // Rename the `maxp` record's tag
    let pos = data
        .windows(4)
        .position(|w| w == b"maxp")
        .unwrap();
    data[pos..pos + 4].copy_from_slice(b"xxxx");
    match ParsedFont::parse(data) {
        Err(ParseError::MissingTable(tag)) => assert_eq!(tag, Tag::MAXP),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn bad_magic() {
    let mut data = ascii_font().build();
    data[0..4].copy_from_slice(b"OTTO");
    assert!(matches!(
        ParsedFont::parse(data),
        Err(ParseError::BadMagic(_))
    ));
}

#[test]
fn simple_outline() {
    let font = ParsedFont::parse(ascii_font().build()).unwrap();
    let outline = font.outline(font.glyph_index(b'!'.into())).unwrap();
    assert_eq!(outline.contours.len(), 1);
    let points: Vec<_> = outline.contours[0]
        .points
        .iter()
        .map(|p| (p.x, p.y, p.on_curve))
        .collect();
    assert_eq!(
        points,
        [
            (50.0, -50.0, true),
            (50.0, 300.0, true),
            (550.0, 300.0, true),
            (550.0, -50.0, true),
        ]
    );
    assert_eq!((outline.x_min, outline.y_max), (50.0, 300.0));

    let space = font.outline(font.glyph_index(b' '.into())).unwrap();
    assert!(space.is_empty());
    assert!(font.outline(GlyphId::NOTDEF).unwrap().is_empty());
}

#[test]
fn composite_offset() {
    let mut builder = FontBuilder::new();
    let triangle = builder.glyph(
        GlyphData::Simple(vec![vec![(0, 0, true), (100, 200, false), (200, 0, true)]]),
        300,
    );
    let shifted = builder.glyph(composite(triangle, 10, -5), 300);
    let font = ParsedFont::parse(builder.build()).unwrap();

    let mut expected = font.outline(GlyphId(triangle)).unwrap();
    expected.translate(Vec2(10.0, -5.0));
    let actual = font.outline(GlyphId(shifted)).unwrap();
    assert_eq!(actual.contours, expected.contours);
    assert_eq!((actual.x_min, actual.y_min), (10.0, -5.0));
    assert_eq!((actual.x_max, actual.y_max), (210.0, 195.0));
}

fn bounds(font: &ParsedFont, id: u16) -> (f32, f32, f32, f32) {
    let outline = font.outline(GlyphId(id)).unwrap();
    (outline.x_min, outline.y_min, outline.x_max, outline.y_max)
}

#[test]
fn composite_transforms() {
    let mut builder = FontBuilder::new();
    let square = builder.glyph(rect(0, 0, 100, 100), 100);
    let bar = builder.glyph(rect(0, 0, 100, 50), 100);

    let scaled = builder.glyph(
        composite_of(&[Component::offset(square, 10, 20).with_transform(HAVE_SCALE, &[0.5])]),
        100,
    );
    // byte-sized signed offsets
    let stretched = Component {
        flags: ARGS_ARE_XY_VALUES,
        glyph: square,
        args: (-5, 7),
        transform: vec![],
    }
    .with_transform(HAVE_XY_SCALE, &[0.5, 1.5]);
    let stretched = builder.glyph(composite_of(&[stretched]), 100);
    // quarter turn: (x, y) -> (-y, x)
    let rotation = [0.0, 1.0, -1.0, 0.0];
    let rotated = builder.glyph(
        composite_of(&[Component::offset(bar, 0, 0).with_transform(HAVE_TWO_BY_TWO, &rotation)]),
        100,
    );
    let rotated_offset = builder.glyph(
        composite_of(&[Component::offset(bar, 10, 0)
            .with_transform(HAVE_TWO_BY_TWO | SCALED_COMPONENT_OFFSET, &rotation)]),
        100,
    );
    let font = ParsedFont::parse(builder.build()).unwrap();

    assert_eq!(bounds(&font, scaled), (10.0, 20.0, 60.0, 70.0));
    assert_eq!(bounds(&font, stretched), (-5.0, 7.0, 45.0, 157.0));
    assert_eq!(bounds(&font, rotated), (-50.0, 0.0, 0.0, 100.0));
    // the offset is rotated too
    assert_eq!(bounds(&font, rotated_offset), (-50.0, 10.0, 0.0, 110.0));
}

#[test]
fn composite_point_anchor() {
    let mut builder = FontBuilder::new();
    let square = builder.glyph(rect(0, 0, 100, 100), 100);

    // point 0 of the second square on point 2, (100, 100), of the first
    let pair = builder.glyph(
        composite_of(&[
            Component::offset(square, 0, 0),
            Component::anchored(square, 2, 0),
        ]),
        200,
    );
    let word_args = Component {
        flags: ARGS_ARE_WORDS,
        ..Component::anchored(square, 3, 1)
    };
    // point 1, (0, 100), on point 3, (100, 0)
    let stepped = builder.glyph(
        composite_of(&[Component::offset(square, 0, 0), word_args]),
        200,
    );
    let orphan = builder.glyph(composite_of(&[Component::anchored(square, 0, 0)]), 100);
    let font = ParsedFont::parse(builder.build()).unwrap();

    let outline = font.outline(GlyphId(pair)).unwrap();
    assert_eq!(outline.contours.len(), 2);
    assert_eq!(outline.num_points(), 8);
    assert_eq!(bounds(&font, pair), (0.0, 0.0, 200.0, 200.0));
    assert_eq!(bounds(&font, stepped), (0.0, -100.0, 200.0, 100.0));

    // no parent points exist to anchor to
    match font.outline(GlyphId(orphan)) {
        Err(ParseError::CompositeAnchor { glyph, point }) => {
            assert_eq!((glyph, point), (orphan, 0));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn composite_depth_limit() {
    let mut builder = FontBuilder::new();
    let leaf = builder.glyph(rect(0, 0, 10, 10), 100);

    // A chain of composites, each referencing the next; the last references
    // the leaf glyph.
    let levels = u16::from(MAX_COMPOSITE_DEPTH) + 1;
    let first = leaf + 1;
    for i in 0..levels {
        let child = if i + 1 == levels { leaf } else { first + i + 1 };
        builder.glyph(composite(child, 1, 0), 100);
    }
    let font = ParsedFont::parse(builder.build()).unwrap();

    // MAX_COMPOSITE_DEPTH levels of composites are permitted
    let outline = font.outline(GlyphId(first + 1)).unwrap();
    assert_eq!(outline.contours.len(), 1);
    assert_eq!(outline.x_min, f32::from(levels - 1));

    // one more is not
    assert!(matches!(
        font.outline(GlyphId(first)),
        Err(ParseError::CompositeDepth { .. })
    ));

    // A composite referencing itself
    let mut looping = FontBuilder::new();
    let id = looping.glyph(composite(1, 0, 0), 100);
    assert_eq!(id, 1);
    let font = ParsedFont::parse(looping.build()).unwrap();
    assert!(matches!(
        font.outline(GlyphId(1)),
        Err(ParseError::CompositeDepth { glyph: 1 })
    ));
}
