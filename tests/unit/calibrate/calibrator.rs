use super::*;
use crate::{
    dna::behavior::BehaviorGraph,
    dna::model::{
        AnimatedMap, BlendShapeChannel, BlendShapeTarget, DnaDocument, DocumentMetadata, Joint,
        JointWeight, SkinInfluences,
    },
    mapping::snapshot::JointSnapshot,
};

fn influences(entries: &[(u16, f32)]) -> SkinInfluences {
    entries
        .iter()
        .map(|&(joint, weight)| JointWeight { joint, weight })
        .collect()
}

fn source_document() -> DnaDocument {
    DnaDocument {
        name: "calibrate-fixture".to_string(),
        joints: vec![
            Joint {
                name: "root".to_string(),
                parent: -1,
                translation: [0.0; 3],
                rotation: [0.0; 3],
                scale: [1.0; 3],
            },
            Joint {
                name: "jaw".to_string(),
                parent: 0,
                translation: [0.0, 0.5, 0.0],
                rotation: [0.0, 0.0, 180.0],
                scale: [1.0; 3],
            },
        ],
        lods: vec![MeshLod {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
            skin_weights: vec![
                influences(&[(0, 1.0)]),
                influences(&[(0, 1.0)]),
                influences(&[(0, 0.5), (1, 0.5)]),
                influences(&[(1, 1.0)]),
            ],
        }],
        blend_shape_channels: vec![BlendShapeChannel {
            name: "jawOpen_shape".to_string(),
        }],
        blend_shape_targets: vec![BlendShapeTarget {
            channel: 0,
            lod: 0,
            vertices: vec![2, 3],
            deltas: vec![[0.0, 0.0, 0.1], [0.0, 0.0, 0.2]],
        }],
        animated_maps: vec![AnimatedMap {
            name: "jaw_mask".to_string(),
        }],
        behavior: BehaviorGraph::empty(),
        metadata: DocumentMetadata::default(),
    }
}

fn snapshots_of(doc: &DnaDocument) -> (Vec<MeshSnapshot>, SkeletonSnapshot) {
    let meshes = doc
        .lods
        .iter()
        .map(|lod| MeshSnapshot {
            positions: lod.positions.clone(),
            uvs: lod.uvs.clone(),
            triangles: lod.triangles.clone(),
        })
        .collect();
    let skeleton = SkeletonSnapshot {
        joints: doc
            .joints
            .iter()
            .map(|j| JointSnapshot {
                name: j.name.clone(),
                parent: j.parent,
                translation: j.translation,
                rotation: j.rotation,
                scale: j.scale,
            })
            .collect(),
    };
    (meshes, skeleton)
}

#[test]
fn calibrating_unmodified_geometry_is_identity() {
    let source = source_document();
    let (meshes, skeleton) = snapshots_of(&source);
    let outcome = Calibrator::calibrate(&source, &meshes, &skeleton).unwrap();

    assert_eq!(outcome.report.moved_vertices, 0);
    assert_eq!(outcome.report.moved_joints, 0);
    assert_eq!(outcome.document.joints, source.joints);
    assert_eq!(outcome.document.lods, source.lods);
    assert_eq!(outcome.document.blend_shape_targets, source.blend_shape_targets);
    assert_eq!(outcome.document.behavior, source.behavior);
    assert_eq!(
        outcome.document.metadata.calibrated_with,
        Some(CalibrationMode::Calibrate)
    );
}

#[test]
fn edited_vertex_is_taken_over() {
    let source = source_document();
    let (mut meshes, skeleton) = snapshots_of(&source);
    meshes[0].positions[2] = [1.0, 1.0, 0.25];
    let outcome = Calibrator::calibrate(&source, &meshes, &skeleton).unwrap();

    assert_eq!(outcome.report.moved_vertices, 1);
    assert_eq!(outcome.document.lods[0].positions[2], [1.0, 1.0, 0.25]);
    // untouched vertices keep their bit patterns
    assert_eq!(outcome.document.lods[0].positions[0], [0.0, 0.0, 0.0]);
}

#[test]
fn sub_threshold_edits_do_not_drift_stored_floats() {
    let source = source_document();
    let (mut meshes, skeleton) = snapshots_of(&source);
    meshes[0].positions[1] = [1.0 + 1e-8, 0.0, 0.0];
    let outcome = Calibrator::calibrate(&source, &meshes, &skeleton).unwrap();
    assert_eq!(outcome.report.moved_vertices, 0);
    assert_eq!(outcome.document.lods[0].positions[1], [1.0, 0.0, 0.0]);
}

#[test]
fn edited_joint_transform_is_taken_over() {
    let source = source_document();
    let (meshes, mut skeleton) = snapshots_of(&source);
    skeleton.joints[1].translation = [0.0, 0.5, 0.125];
    skeleton.joints[1].rotation = [10.0, 0.0, 180.0];
    let outcome = Calibrator::calibrate(&source, &meshes, &skeleton).unwrap();

    assert_eq!(outcome.report.moved_joints, 1);
    assert_eq!(outcome.document.joints[1].translation, [0.0, 0.5, 0.125]);
    assert_eq!(outcome.document.joints[1].rotation, [10.0, 0.0, 180.0]);
}

#[test]
fn rotation_wrap_is_not_treated_as_an_edit() {
    let source = source_document();
    let (meshes, mut skeleton) = snapshots_of(&source);
    // -180 vs the stored 180 is the same orientation
    skeleton.joints[1].rotation = [0.0, 0.0, -180.0];
    let outcome = Calibrator::calibrate(&source, &meshes, &skeleton).unwrap();
    assert_eq!(outcome.report.moved_joints, 0);
    assert_eq!(outcome.document.joints[1].rotation, [0.0, 0.0, 180.0]);
}

#[test]
fn vertex_count_mismatch_asks_for_overwrite() {
    let source = source_document();
    let (mut meshes, skeleton) = snapshots_of(&source);
    meshes[0].positions.push([2.0, 2.0, 0.0]);
    let err = Calibrator::calibrate(&source, &meshes, &skeleton).unwrap_err();
    assert!(matches!(err, RigDnaError::IndexMismatch(_)), "{err}");
}

#[test]
fn joint_rename_asks_for_overwrite() {
    let source = source_document();
    let (meshes, mut skeleton) = snapshots_of(&source);
    skeleton.joints[1].name = "chin".to_string();
    let err = Calibrator::calibrate(&source, &meshes, &skeleton).unwrap_err();
    assert!(matches!(err, RigDnaError::IndexMismatch(_)), "{err}");
}

#[test]
fn lod_count_mismatch_asks_for_overwrite() {
    let source = source_document();
    let (mut meshes, skeleton) = snapshots_of(&source);
    meshes.clear();
    let err = Calibrator::calibrate(&source, &meshes, &skeleton).unwrap_err();
    assert!(matches!(err, RigDnaError::IndexMismatch(_)), "{err}");
}

#[test]
fn weight_drift_is_renormalized_before_finalizing() {
    let mut source = source_document();
    // within load tolerance, but off from exactly 1
    source.lods[0].skin_weights[2] = influences(&[(0, 0.500002), (1, 0.500002)]);
    let (meshes, skeleton) = snapshots_of(&source);
    let outcome = Calibrator::calibrate(&source, &meshes, &skeleton).unwrap();
    for influences in &outcome.document.lods[0].skin_weights {
        let sum: f32 = influences.iter().map(|jw| jw.weight).sum();
        assert!((sum - 1.0).abs() <= 1e-6, "sum was {sum}");
    }
}
