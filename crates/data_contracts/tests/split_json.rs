use data_contracts::arrays::{ArraySplit, ValidationError};

#[test]
fn split_parses_from_json() {
    let raw = r#"{
        "sample_shape": [1, 1, 2],
        "num_classes": 3,
        "features": [0.5, -0.5, 1.0, 2.0],
        "labels": [2, 0]
    }"#;
    let split: ArraySplit = serde_json::from_str(raw).unwrap();
    assert!(split.validate().is_ok());
    assert_eq!(split.len(), 2);
}

#[test]
fn mismatched_json_rejected() {
    let raw = r#"{
        "sample_shape": [1, 1, 2],
        "num_classes": 3,
        "features": [0.5, -0.5, 1.0],
        "labels": [2, 0]
    }"#;
    let split: ArraySplit = serde_json::from_str(raw).unwrap();
    let err = split.validate().unwrap_err();
    assert!(matches!(err, ValidationError::LengthMismatch { .. }));
}

#[test]
fn huge_shape_in_json_rejected() {
    let raw = format!(
        r#"{{
        "sample_shape": [{big}, {big}, {big}],
        "num_classes": 2,
        "features": [0.0],
        "labels": [1]
    }}"#,
        big = usize::MAX / 2
    );
    let split: ArraySplit = serde_json::from_str(&raw).unwrap();
    let err = split.validate().unwrap_err();
    assert!(matches!(err, ValidationError::SizeOverflow { .. }));
}
