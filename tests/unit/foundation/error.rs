use super::*;

#[test]
fn error_helpers_build_expected_variants() {
    assert!(matches!(PaintError::validation("x"), PaintError::Validation(_)));
    assert!(matches!(PaintError::malformed("x"), PaintError::Malformed(_)));
    assert!(matches!(PaintError::backend("x"), PaintError::Backend(_)));
    assert!(matches!(PaintError::serde("x"), PaintError::Serde(_)));
}

#[test]
fn cancellation_is_distinguishable_from_failures() {
    let err: PaintError = RenderCancelled::new("page closed").into();
    assert!(err.is_cancelled());
    assert_eq!(err.to_string(), "rendering cancelled: page closed");
    assert!(!PaintError::backend("boom").is_cancelled());
}

#[test]
fn not_resolved_names_the_object() {
    let err: PaintError = NotResolved {
        id: "img_p0_1".to_string(),
    }
    .into();
    assert_eq!(err.to_string(), "object 'img_p0_1' is not resolved yet");
}
