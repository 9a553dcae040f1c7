use super::*;

#[test]
fn hex_colors_parse_with_and_without_alpha() {
    assert_eq!(Rgba8::from_hex("#ff0000").unwrap(), Rgba8::opaque(255, 0, 0));
    assert_eq!(
        Rgba8::from_hex("00ff0080").unwrap(),
        Rgba8 {
            r: 0,
            g: 255,
            b: 0,
            a: 128
        }
    );
    assert!(Rgba8::from_hex("#12345").is_err());
    assert!(Rgba8::from_hex("#zzzzzz").is_err());
}

#[test]
fn premultiply_scales_color_channels() {
    let p = Rgba8 {
        r: 255,
        g: 128,
        b: 0,
        a: 128,
    }
    .premul();
    assert_eq!(p.to_array(), [128, 64, 0, 128]);
}

#[test]
fn canvas_rejects_oversized_dimensions() {
    assert_eq!(
        Canvas {
            width: 20,
            height: 30
        }
        .to_u16()
        .unwrap(),
        (20, 30)
    );
    assert!(
        Canvas {
            width: 70_000,
            height: 1
        }
        .to_u16()
        .is_err()
    );
}

#[test]
fn unit_rgb_is_clamped() {
    assert_eq!(Rgba8::from_unit_rgb(2.0, -1.0, 0.5), Rgba8::opaque(255, 0, 128));
}
