use super::*;

#[test]
fn mul_div255_rounds_to_nearest() {
    assert_eq!(mul_div255_u8(255, 255), 255);
    assert_eq!(mul_div255_u8(128, 255), 128);
    assert_eq!(mul_div255_u8(128, 128), 64);
    assert_eq!(mul_div255_u8(0, 200), 0);
}

#[test]
fn singular_values_of_scale_and_rotation() {
    let [sx, sy] = singular_values(Affine::scale_non_uniform(3.0, 2.0));
    assert!((sx - 3.0).abs() < 1e-9);
    assert!((sy - 2.0).abs() < 1e-9);

    let [rx, ry] = singular_values(Affine::rotate(0.7) * Affine::scale(4.0));
    assert!((rx - 4.0).abs() < 1e-9);
    assert!((ry - 4.0).abs() < 1e-9);
}

#[test]
fn singular_values_fall_back_to_one_on_degenerate_axes() {
    let [sx, sy] = singular_values(Affine::new([0.0, 0.0, 0.0, 0.0, 5.0, 5.0]));
    assert_eq!(sx, 1.0);
    assert_eq!(sy, 1.0);
}

#[test]
fn disjoint_rects_do_not_intersect() {
    let a = Rect::new(0.0, 0.0, 10.0, 10.0);
    assert!(intersect(a, Rect::new(20.0, 20.0, 30.0, 30.0)).is_none());
    assert_eq!(
        intersect(a, Rect::new(5.0, -5.0, 15.0, 5.0)),
        Some(Rect::new(5.0, 0.0, 10.0, 5.0))
    );
}
