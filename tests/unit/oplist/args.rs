use super::*;

fn parse(json: &str) -> Vec<Arg> {
    serde_json::from_str(json).unwrap()
}

#[test]
fn untagged_args_pick_the_right_variant() {
    let args = parse(
        r#"[null, true, 1.5, "g_font_1", [1, 0, 0, 1, 0, 0],
            {"group": {"bbox": [0, 0, 10, 10]}},
            {"glyphs": [{"id": 3, "width": 500}, -250]}]"#,
    );
    assert!(args[0].is_null());
    assert!(matches!(args[1], Arg::Bool(true)));
    assert_eq!(args[2].as_f64(), Some(1.5));
    assert_eq!(args[3].as_name(), Some("g_font_1"));
    assert_eq!(args[4].as_array().map(<[Arg]>::len), Some(6));
    match &args[5] {
        Arg::Group { group } => {
            assert!(group.isolated);
            assert!(group.smask.is_none());
        }
        other => panic!("unexpected {other:?}"),
    }
    match &args[6] {
        Arg::Glyphs { glyphs } => {
            assert_eq!(glyphs.len(), 2);
            assert!(matches!(glyphs[1], TextItem::Adjust(v) if v == -250.0));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn reader_reports_shape_mismatch_as_malformed() {
    let args = parse(r#"["not a number"]"#);
    let r = ArgReader::new(OpCode::SetLineWidth, &args);
    let err = r.num(0).unwrap_err();
    assert!(matches!(err, PaintError::Malformed(_)));
    assert!(err.to_string().contains("setLineWidth"));
    assert!(r.num(3).is_err());
}

#[test]
fn matrix_accepts_inline_numbers_or_array() {
    let inline = parse("[2, 0, 0, 2, 5, 6]");
    let nested = parse("[[2, 0, 0, 2, 5, 6]]");
    let a = ArgReader::new(OpCode::Transform, &inline).matrix(0).unwrap();
    let b = ArgReader::new(OpCode::Transform, &nested).matrix(0).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.as_coeffs(), [2.0, 0.0, 0.0, 2.0, 5.0, 6.0]);
}

#[test]
fn rects_are_normalized() {
    let args = parse("[[10, 10, 0, 0]]");
    let r = ArgReader::new(OpCode::PaintFormXObjectBegin, &args)
        .opt_rect(0)
        .unwrap()
        .unwrap();
    assert_eq!(r, Rect::new(0.0, 0.0, 10.0, 10.0));
}
