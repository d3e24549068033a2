use super::*;

#[test]
fn lerp_hits_endpoints_exactly() {
    assert_eq!(lerp(2.0, 5.0, 0.0), 2.0);
    assert_eq!(lerp(2.0, 5.0, 1.0), 5.0);
    assert_eq!(lerp(2.0, 5.0, 0.5), 3.5);
}

#[test]
fn lerp3_is_componentwise() {
    let v = lerp3([0.0, 1.0, 2.0], [1.0, 3.0, 4.0], 0.5);
    assert_eq!(v, [0.5, 2.0, 3.0]);
}

#[test]
fn dist3_matches_euclidean_length() {
    assert_eq!(dist3([1.0, 2.0, 3.0], [1.0, 2.0, 3.0]), 0.0);
    assert!((dist3([0.0, 0.0, 0.0], [3.0, 4.0, 0.0]) - 5.0).abs() < 1e-6);
}

#[test]
fn rotation_wrap_artifacts_are_ignored() {
    // 180 vs -180 is the same orientation; the 360 delta must not count.
    assert!(!rotation_axis_changed(360.0, 1e-3));
    assert!(!rotation_axis_changed(-360.0, 1e-3));
    assert!(rotation_axis_changed(5.0, 1e-3));
    assert!(rotation_axis_changed(-5.0, 1e-3));
    assert!(!rotation_axis_changed(1e-4, 1e-3));
}
