use super::*;

fn image(kind: ImageKind, width: u32, height: u32, data: Vec<u8>) -> ImageData {
    ImageData {
        width,
        height,
        kind,
        data,
    }
}

#[test]
fn one_bit_rows_are_msb_first_and_white_on_set() {
    let img = image(ImageKind::Grayscale1Bpp, 3, 1, vec![0b1010_0000]);
    let mut out = vec![0u8; 12];
    unpack_image(&img, None, 16, &mut out).unwrap();
    assert_eq!(&out[0..4], &[255, 255, 255, 255]);
    assert_eq!(&out[4..8], &[0, 0, 0, 255]);
    assert_eq!(&out[8..12], &[255, 255, 255, 255]);
}

#[test]
fn inverting_gray_transfer_swaps_black_and_white() {
    let img = image(ImageKind::Grayscale1Bpp, 1, 1, vec![0x80]);
    let inv = TransferMaps::gray((0..=255u8).rev().collect());
    let mut out = vec![0u8; 4];
    unpack_image(&img, Some(&inv), 16, &mut out).unwrap();
    assert_eq!(out, vec![0, 0, 0, 255]);
}

#[test]
fn rgba_is_premultiplied() {
    let img = image(ImageKind::Rgba32Bpp, 1, 1, vec![255, 0, 0, 128]);
    let mut out = vec![0u8; 4];
    unpack_image(&img, None, 16, &mut out).unwrap();
    assert_eq!(out, vec![128, 0, 0, 128]);
}

#[test]
fn chunking_does_not_change_the_result() {
    let w = 3u32;
    let h = 37u32;
    let data: Vec<u8> = (0..w * h * 3).map(|i| (i % 251) as u8).collect();
    let img = image(ImageKind::Rgb24Bpp, w, h, data);
    let mut a = vec![0u8; (w * h * 4) as usize];
    let mut b = a.clone();
    unpack_image(&img, None, 16, &mut a).unwrap();
    unpack_image(&img, None, 1000, &mut b).unwrap();
    assert_eq!(a, b);
    assert_eq!(&a[4..8], &[3, 4, 5, 255]);
}

#[test]
fn short_data_is_malformed() {
    let img = image(ImageKind::Rgb24Bpp, 2, 2, vec![0; 5]);
    let mut out = vec![0u8; 16];
    let err = unpack_image(&img, None, 16, &mut out).unwrap_err();
    assert!(matches!(err, PaintError::Malformed(_)));
}

#[test]
fn mask_bits_are_transparent_unless_inverted() {
    let mut mask = MaskData {
        width: 2,
        height: 1,
        data: vec![0b1000_0000],
        transform: None,
        inverse_decode: false,
    };
    assert_eq!(unpack_mask(&mask, 16).unwrap(), vec![0, 255]);
    mask.inverse_decode = true;
    assert_eq!(unpack_mask(&mask, 16).unwrap(), vec![255, 0]);
}

#[test]
fn halving_averages_blocks_and_keeps_odd_edges() {
    assert_eq!(half_size(5, 4, true, true), (3, 2));
    assert_eq!(half_size(1, 4, false, true), (1, 2));

    let src: Vec<u8> = [0u8, 255, 0, 255].iter().flat_map(|&v| [v, v, v, 255]).collect();
    let mut dst = vec![0u8; 4];
    downscale_half(&src, 2, 2, &mut dst, 1, 1).unwrap();
    assert_eq!(dst, vec![128, 128, 128, 255]);
}
