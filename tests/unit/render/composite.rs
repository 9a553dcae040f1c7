use super::*;

fn params(subtype: SmaskSubtype) -> SoftMaskParams<'static> {
    SoftMaskParams {
        subtype,
        backdrop: None,
        transfer: None,
        chunk_pixels: 1 << 20,
    }
}

#[test]
fn over_with_opaque_source_replaces() {
    let mut dst = vec![10, 20, 30, 255];
    premul_over_in_place(&mut dst, &[200, 0, 0, 255]).unwrap();
    assert_eq!(dst, vec![200, 0, 0, 255]);
}

#[test]
fn over_with_half_alpha_mixes() {
    let mut dst = vec![0, 0, 255, 255];
    premul_over_in_place(&mut dst, &[128, 0, 0, 128]).unwrap();
    assert_eq!(dst[3], 255);
    assert_eq!(dst[0], 128);
    assert_eq!(dst[2], 127);
}

#[test]
fn mismatched_buffers_are_backend_errors() {
    let mut dst = vec![0; 8];
    let err = premul_over_in_place(&mut dst, &[0; 4]).unwrap_err();
    assert!(matches!(err, PaintError::Backend(_)));
}

#[test]
fn multiply_darkens_and_screen_lightens() {
    let mut m = vec![128, 128, 128, 255];
    composite_over_rgba8_premul(&mut m, &[128, 128, 128, 255], 1.0, BlendMode::Multiply).unwrap();
    assert!(m[0] < 128);

    let mut s = vec![128, 128, 128, 255];
    composite_over_rgba8_premul(&mut s, &[128, 128, 128, 255], 1.0, BlendMode::Screen).unwrap();
    assert!(s[0] > 128);
}

#[test]
fn luminosity_blend_keeps_backdrop_hue() {
    // White luminosity over pure red: result stays reddish but brighter.
    let mut d = vec![255, 0, 0, 255];
    composite_over_rgba8_premul(&mut d, &[255, 255, 255, 255], 1.0, BlendMode::Luminosity)
        .unwrap();
    assert_eq!(d, vec![255, 255, 255, 255]);

    let mut d = vec![255, 0, 0, 255];
    composite_over_rgba8_premul(&mut d, &[0, 0, 0, 255], 1.0, BlendMode::Color).unwrap();
    assert_eq!(d[3], 255);
    assert_eq!(d[0], d[1]);
    assert_eq!(d[1], d[2]);
}

#[test]
fn zero_opacity_is_noop() {
    let mut d = vec![1, 2, 3, 4];
    composite_over_rgba8_premul(&mut d, &[255, 255, 255, 255], 0.0, BlendMode::Difference)
        .unwrap();
    assert_eq!(d, vec![1, 2, 3, 4]);
}

#[test]
fn blend_names_parse() {
    assert_eq!(BlendMode::from_name("Multiply"), Some(BlendMode::Multiply));
    assert_eq!(BlendMode::from_name("color-dodge"), Some(BlendMode::ColorDodge));
    assert_eq!(BlendMode::from_name("source-over"), Some(BlendMode::Normal));
    assert_eq!(BlendMode::from_name("Bogus"), None);
}

#[test]
fn alpha_soft_mask_scales_layer() {
    let mut layer = vec![200, 100, 0, 200, 200, 100, 0, 200];
    let mask = vec![0, 0, 0, 255, 0, 0, 0, 0];
    let placed = MaskPixels::aligned(&mask, 2);
    compose_soft_mask(&mut layer, 2, placed, params(SmaskSubtype::Alpha)).unwrap();
    assert_eq!(&layer[..4], &[200, 100, 0, 200]);
    assert_eq!(&layer[4..], &[0, 0, 0, 0]);
}

#[test]
fn luminosity_soft_mask_uses_mask_brightness() {
    let mut layer = vec![255, 0, 0, 255, 255, 0, 0, 255];
    let mask = vec![255, 255, 255, 255, 0, 0, 0, 255];
    let placed = MaskPixels::aligned(&mask, 2);
    compose_soft_mask(&mut layer, 2, placed, params(SmaskSubtype::Luminosity)).unwrap();
    assert!(layer[3] >= 254);
    assert_eq!(layer[7], 0);
}

#[test]
fn backdrop_fills_transparent_mask_pixels() {
    let mut layer = vec![255, 255, 255, 255];
    let p = SoftMaskParams {
        backdrop: Some([255, 255, 255]),
        ..params(SmaskSubtype::Luminosity)
    };
    compose_soft_mask(&mut layer, 1, MaskPixels::aligned(&[0, 0, 0, 0], 1), p).unwrap();
    assert!(layer[3] >= 254);
}

#[test]
fn transfer_map_remaps_coverage() {
    let invert: Vec<u8> = (0..=255u8).rev().collect();
    let mut layer = vec![255, 255, 255, 255];
    let p = SoftMaskParams {
        transfer: Some(&invert),
        ..params(SmaskSubtype::Alpha)
    };
    compose_soft_mask(&mut layer, 1, MaskPixels::aligned(&[0, 0, 0, 255], 1), p).unwrap();
    assert_eq!(layer, vec![0, 0, 0, 0]);
}

#[test]
fn chunking_covers_every_row() {
    let width = 3u32;
    let mut layer = vec![255u8; 3 * 5 * 4];
    let mask = vec![0u8; 3 * 5 * 4];
    let p = SoftMaskParams {
        chunk_pixels: 4,
        ..params(SmaskSubtype::Alpha)
    };
    compose_soft_mask(&mut layer, width, MaskPixels::aligned(&mask, width), p).unwrap();
    assert!(layer.iter().all(|&v| v == 0));
}

#[test]
fn pixels_outside_the_mask_take_the_backdrop() {
    // 4x1 layer, 2x1 mask covering the left half.
    let mut layer = vec![255u8; 4 * 4];
    let mask = [0, 0, 0, 255, 0, 0, 0, 255];
    let placed = MaskPixels {
        data: &mask,
        width: 2,
        height: 1,
        layer_to_mask: Affine::IDENTITY,
    };
    let p = SoftMaskParams {
        backdrop: Some([255, 255, 255]),
        ..params(SmaskSubtype::Luminosity)
    };
    compose_soft_mask(&mut layer, 4, placed, p).unwrap();
    assert_eq!(layer[3], 0);
    assert_eq!(layer[7], 0);
    assert!(layer[11] >= 254 && layer[15] >= 254);
}

#[test]
fn pixels_outside_the_mask_are_cleared_without_backdrop() {
    let mut layer = vec![255u8; 4 * 4];
    let mask = [255u8; 8];
    let placed = MaskPixels {
        data: &mask,
        width: 2,
        height: 1,
        layer_to_mask: Affine::translate((-2.0, 0.0)),
    };
    compose_soft_mask(&mut layer, 4, placed, params(SmaskSubtype::Alpha)).unwrap();
    assert_eq!(&layer[..8], &[0; 8]);
    assert_eq!(&layer[8..], &[255; 8]);
}
