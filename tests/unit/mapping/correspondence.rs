use super::*;

/// Two-triangle unit square in UV space, positions laid out so that the 3D
/// position of any chart point equals its UV coordinates: interpolation
/// results can be checked exactly.
fn unit_square_mesh() -> MeshSnapshot {
    MeshSnapshot {
        positions: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        triangles: vec![[0, 1, 2], [0, 2, 3]],
    }
}

#[test]
fn interior_query_maps_with_zero_distance() {
    let reference = unit_square_mesh();
    let map = CorrespondenceMap::build(&reference, &[[0.5, 0.5]]).unwrap();
    let hit = map.hits()[0];
    assert_eq!(hit.uv_distance, 0.0);
    assert!(!hit.low_confidence);
    let bary_sum: f32 = hit.bary.iter().sum();
    assert!((bary_sum - 1.0).abs() < 1e-6);
}

#[test]
fn anchor_transfer_at_matching_uv_is_exact() {
    // A joint anchored at UV (0.5, 0.5) transferred onto a target mesh with
    // a chart point exactly there must land at that surface point.
    let target = unit_square_mesh();
    let map = CorrespondenceMap::build(&target, &[[0.5, 0.5]]).unwrap();
    let transferred = map.resample_vec3(&target.positions).unwrap();
    let expected = [0.5, 0.5, 0.0];
    let d = ((transferred[0][0] - expected[0]).powi(2)
        + (transferred[0][1] - expected[1]).powi(2)
        + (transferred[0][2] - expected[2]).powi(2))
    .sqrt();
    assert!(d < 1e-6, "transferred {:?}", transferred[0]);
}

#[test]
fn vertex_queries_reproduce_vertices() {
    let reference = unit_square_mesh();
    let map = CorrespondenceMap::build(&reference, &reference.uvs).unwrap();
    let resampled = map.resample_vec3(&reference.positions).unwrap();
    for (got, want) in resampled.iter().zip(&reference.positions) {
        for axis in 0..3 {
            assert!((got[axis] - want[axis]).abs() < 1e-6);
        }
    }
}

#[test]
fn off_chart_query_is_flagged_low_confidence() {
    let reference = unit_square_mesh();
    let map = CorrespondenceMap::build(&reference, &[[2.0, 2.0]]).unwrap();
    let hit = map.hits()[0];
    assert!(hit.low_confidence);
    assert!(hit.uv_distance > LOW_CONFIDENCE_UV_DISTANCE);
    // still mapped: the nearest chart point is the (1, 1) corner
    let mapped = map.resample_vec3(&reference.positions).unwrap()[0];
    assert!((mapped[0] - 1.0).abs() < 1e-6);
    assert!((mapped[1] - 1.0).abs() < 1e-6);
    assert_eq!(map.low_confidence_indices().collect::<Vec<_>>(), vec![0]);
}

#[test]
fn slightly_off_chart_query_is_projected_but_confident() {
    let reference = unit_square_mesh();
    let map = CorrespondenceMap::build(&reference, &[[0.5, -0.01]]).unwrap();
    let hit = map.hits()[0];
    assert!(!hit.low_confidence);
    assert!((hit.uv_distance - 0.01).abs() < 1e-5);
}

#[test]
fn missing_uvs_fail_with_mapping_error() {
    let mut reference = unit_square_mesh();
    reference.uvs.clear();
    let err = CorrespondenceMap::build(&reference, &[[0.5, 0.5]]).unwrap_err();
    assert!(matches!(err, RigDnaError::Mapping(_)), "{err}");
}

#[test]
fn missing_triangulation_fails_with_mapping_error() {
    let mut reference = unit_square_mesh();
    reference.triangles.clear();
    let err = CorrespondenceMap::build(&reference, &[[0.5, 0.5]]).unwrap_err();
    assert!(matches!(err, RigDnaError::Mapping(_)), "{err}");
}

#[test]
fn resampled_skin_weights_stay_normalized() {
    let reference = unit_square_mesh();
    let table: Vec<SkinInfluences> = vec![
        [(0u16, 1.0f32)].iter().map(|&(joint, weight)| JointWeight { joint, weight }).collect(),
        [(0, 0.5), (1, 0.5)].iter().map(|&(joint, weight)| JointWeight { joint, weight }).collect(),
        [(1, 1.0)].iter().map(|&(joint, weight)| JointWeight { joint, weight }).collect(),
        [(2, 1.0)].iter().map(|&(joint, weight)| JointWeight { joint, weight }).collect(),
    ];
    let map =
        CorrespondenceMap::build(&reference, &[[0.5, 0.5], [0.1, 0.9], [0.9, 0.1]]).unwrap();
    let resampled = map.resample_skin_weights(&table).unwrap();
    for influences in &resampled {
        assert!(!influences.is_empty());
        let sum: f32 = influences.iter().map(|jw| jw.weight).sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum was {sum}");
        // influence lists come back ordered by joint index
        for pair in influences.windows(2) {
            assert!(pair[0].joint < pair[1].joint);
        }
    }
}

#[test]
fn joint_anchors_are_skin_weighted_uv_means() {
    use crate::dna::model::MeshLod;
    let lod = MeshLod {
        positions: unit_square_mesh().positions,
        uvs: unit_square_mesh().uvs,
        triangles: unit_square_mesh().triangles,
        skin_weights: vec![
            [(0u16, 1.0f32)].iter().map(|&(joint, weight)| JointWeight { joint, weight }).collect(),
            [(0, 1.0)].iter().map(|&(joint, weight)| JointWeight { joint, weight }).collect(),
            [(1, 1.0)].iter().map(|&(joint, weight)| JointWeight { joint, weight }).collect(),
            [(1, 1.0)].iter().map(|&(joint, weight)| JointWeight { joint, weight }).collect(),
        ],
    };
    let anchors = joint_anchor_uvs(&lod, 3);
    // joint 0 influences UV (0,0) and (1,0) equally
    let a0 = anchors[0].unwrap();
    assert!((a0[0] - 0.5).abs() < 1e-6 && a0[1].abs() < 1e-6);
    // joint 1 influences UV (1,1) and (0,1) equally
    let a1 = anchors[1].unwrap();
    assert!((a1[0] - 0.5).abs() < 1e-6 && (a1[1] - 1.0).abs() < 1e-6);
    // joint 2 has no influence anywhere
    assert!(anchors[2].is_none());
}
