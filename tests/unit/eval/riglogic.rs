use super::*;
use crate::{
    dna::behavior::{
        BehaviorGraph, BlendShapeBehavior, ControlDef, PoseJointDelta, PoseShapeWeight,
        PsdCombiner, RbfKernel, RbfSolver, ScalarCurve, ScalarKey, VectorCurve, VectorKey,
    },
    dna::model::{
        AnimatedMap, BlendShapeChannel, BlendShapeTarget, DocumentMetadata, Joint, JointWeight,
        MeshLod, SkinInfluences,
    },
};

fn linear_scalar(from: f32, to: f32) -> ScalarCurve {
    ScalarCurve {
        keys: vec![
            ScalarKey {
                at: 0.0,
                value: from,
            },
            ScalarKey { at: 1.0, value: to },
        ],
    }
}

/// One-joint "jaw" rig: a `jawOpen` control rotating the jaw 30 degrees at
/// full opening, one blend-shape channel, one texture mask, one corrective
/// RBF solver, and a PSD product feeding the mask.
fn jaw_document() -> crate::dna::model::DnaDocument {
    let skin: Vec<SkinInfluences> = vec![
        std::iter::once(JointWeight {
            joint: 0,
            weight: 1.0,
        })
        .collect(),
        std::iter::once(JointWeight {
            joint: 1,
            weight: 1.0,
        })
        .collect(),
        std::iter::once(JointWeight {
            joint: 1,
            weight: 1.0,
        })
        .collect(),
    ];
    crate::dna::model::DnaDocument {
        name: "jaw-rig".to_string(),
        joints: vec![
            Joint {
                name: "head".to_string(),
                parent: -1,
                translation: [0.0; 3],
                rotation: [0.0; 3],
                scale: [1.0; 3],
            },
            Joint {
                name: "jaw".to_string(),
                parent: 0,
                translation: [0.0, -0.2, 0.0],
                rotation: [0.0; 3],
                scale: [1.0; 3],
            },
        ],
        lods: vec![MeshLod {
            positions: vec![[0.0, 0.0, 0.0], [0.0, -0.4, 0.0], [0.1, -0.4, 0.0]],
            uvs: vec![[0.0, 0.0], [0.5, 0.5], [1.0, 0.0]],
            triangles: vec![[0, 1, 2]],
            skin_weights: skin,
        }],
        blend_shape_channels: vec![BlendShapeChannel {
            name: "jawOpen_shape".to_string(),
        }],
        blend_shape_targets: vec![BlendShapeTarget {
            channel: 0,
            lod: 0,
            vertices: vec![1, 2],
            deltas: vec![[0.0, -0.05, 0.0], [0.0, -0.05, 0.0]],
        }],
        animated_maps: vec![AnimatedMap {
            name: "jaw_tension_mask".to_string(),
        }],
        behavior: BehaviorGraph {
            controls: vec![
                ControlDef {
                    name: "jawOpen".to_string(),
                },
                ControlDef {
                    name: "mouthPress".to_string(),
                },
            ],
            psd_expressions: vec![PsdExpression {
                name: "jawOpen_x_mouthPress".to_string(),
                combiner: PsdCombiner::Product,
                inputs: vec![InputRef::Control(0), InputRef::Control(1)],
            }],
            rbf_solvers: vec![RbfSolver {
                name: "jaw_corrective".to_string(),
                kernel: RbfKernel::Gaussian { width: 0.7 },
                inputs: vec![InputRef::Control(0)],
                poses: vec![
                    RbfPose {
                        name: "rest".to_string(),
                        target: vec![0.0],
                        joint_deltas: vec![],
                        shape_weights: vec![],
                    },
                    RbfPose {
                        name: "open".to_string(),
                        target: vec![1.0],
                        joint_deltas: vec![PoseJointDelta {
                            joint: 1,
                            translation: [0.0, -0.02, 0.0],
                            rotation: [0.0; 3],
                            scale: [0.0; 3],
                        }],
                        shape_weights: vec![PoseShapeWeight {
                            channel: 0,
                            weight: 0.25,
                        }],
                    },
                ],
            }],
            joint_behaviors: vec![JointBehavior {
                joint: 1,
                input: InputRef::Control(0),
                translation: VectorCurve { keys: vec![] },
                rotation: VectorCurve {
                    keys: vec![
                        VectorKey {
                            at: 0.0,
                            value: [0.0; 3],
                        },
                        VectorKey {
                            at: 1.0,
                            value: [30.0, 0.0, 0.0],
                        },
                    ],
                },
                scale: VectorCurve { keys: vec![] },
            }],
            blend_shape_behaviors: vec![BlendShapeBehavior {
                channel: 0,
                input: InputRef::Control(0),
                weights: linear_scalar(0.0, 1.0),
            }],
            animated_map_behaviors: vec![AnimatedMapBehavior {
                map: 0,
                input: InputRef::Psd(0),
                weights: linear_scalar(0.0, 1.0),
            }],
        },
        metadata: DocumentMetadata::default(),
    }
}

fn rig_and_instance() -> (RigLogic, RigInstance) {
    let doc = jaw_document();
    let rig = RigLogic::new(&doc).unwrap();
    let instance = rig.instance();
    (rig, instance)
}

#[test]
fn half_open_jaw_rotates_fifteen_degrees() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (rig, mut instance) = rig_and_instance();
    instance.set_control(rig.control_index("jawOpen").unwrap(), 0.5);
    let outputs = instance.evaluate(&rig);
    // linear 0..30 degrees, exact at the midpoint
    assert_eq!(outputs.joint_deltas[1].rotation[0], 15.0);
}

#[test]
fn boundary_controls_reproduce_configured_endpoints() {
    let mut doc = jaw_document();
    // direct linear behavior with non-trivial endpoints
    doc.behavior.blend_shape_behaviors[0].weights = linear_scalar(0.25, 0.75);
    // drop the solver so the direct behavior is the only contributor
    doc.behavior.rbf_solvers.clear();
    let rig = RigLogic::new(&doc).unwrap();
    let mut instance = rig.instance();

    instance.set_control(0, 0.0);
    assert_eq!(instance.evaluate(&rig).blend_shape_weights[0], 0.25);
    instance.set_control(0, 1.0);
    assert_eq!(instance.evaluate(&rig).blend_shape_weights[0], 0.75);
}

#[test]
fn evaluation_is_bit_identical_across_instances() {
    let (rig, mut a) = rig_and_instance();
    let mut b = rig.instance();
    for instance in [&mut a, &mut b] {
        instance.set_control(0, 0.37);
        instance.set_control(1, 0.81);
    }
    let out_a = a.evaluate(&rig).clone();
    let out_b = b.evaluate(&rig).clone();

    for (x, y) in out_a.joint_deltas.iter().zip(&out_b.joint_deltas) {
        for axis in 0..3 {
            assert_eq!(x.translation[axis].to_bits(), y.translation[axis].to_bits());
            assert_eq!(x.rotation[axis].to_bits(), y.rotation[axis].to_bits());
            assert_eq!(x.scale[axis].to_bits(), y.scale[axis].to_bits());
        }
    }
    for (x, y) in out_a
        .blend_shape_weights
        .iter()
        .zip(&out_b.blend_shape_weights)
    {
        assert_eq!(x.to_bits(), y.to_bits());
    }
    for (x, y) in out_a
        .animated_map_weights
        .iter()
        .zip(&out_b.animated_map_weights)
    {
        assert_eq!(x.to_bits(), y.to_bits());
    }

    // and across repeated evaluations of the same instance
    let again = a.evaluate(&rig).clone();
    assert_eq!(again, out_a);
}

#[test]
fn controls_clamp_to_unit_range() {
    let (rig, mut instance) = rig_and_instance();
    instance.set_control(0, 7.5);
    let open = instance.evaluate(&rig).joint_deltas[1].rotation[0];
    instance.set_control(0, 1.0);
    let expected = instance.evaluate(&rig).joint_deltas[1].rotation[0];
    assert_eq!(open.to_bits(), expected.to_bits());

    instance.set_control(0, -3.0);
    assert_eq!(instance.evaluate(&rig).joint_deltas[1].rotation[0], 0.0);
}

#[test]
fn solver_reproduces_pose_outputs_at_its_targets() {
    let mut doc = jaw_document();
    // isolate the solver from the direct behaviors
    doc.behavior.joint_behaviors.clear();
    doc.behavior.blend_shape_behaviors.clear();
    let rig = RigLogic::new(&doc).unwrap();
    let mut instance = rig.instance();

    instance.set_control(0, 1.0);
    let outputs = instance.evaluate(&rig);
    assert!((outputs.joint_deltas[1].translation[1] + 0.02).abs() < 1e-6);
    assert!((outputs.blend_shape_weights[0] - 0.25).abs() < 1e-6);

    instance.set_control(0, 0.0);
    let outputs = instance.evaluate(&rig);
    assert!(outputs.joint_deltas[1].translation[1].abs() < 1e-6);
    assert!(outputs.blend_shape_weights[0].abs() < 1e-6);
}

#[test]
fn psd_product_drives_the_animated_map() {
    let (rig, mut instance) = rig_and_instance();
    instance.set_control(0, 0.5);
    instance.set_control(1, 0.5);
    let outputs = instance.evaluate(&rig);
    assert!((outputs.animated_map_weights[0] - 0.25).abs() < 1e-6);

    instance.set_control(1, 0.0);
    let outputs = instance.evaluate(&rig);
    assert_eq!(outputs.animated_map_weights[0], 0.0);
}

#[test]
fn fraction_outputs_clamp_to_unit_range() {
    let mut doc = jaw_document();
    // stack a second full-strength contributor on the same channel
    doc.behavior.blend_shape_behaviors.push(BlendShapeBehavior {
        channel: 0,
        input: InputRef::Control(0),
        weights: linear_scalar(0.0, 1.0),
    });
    let rig = RigLogic::new(&doc).unwrap();
    let mut instance = rig.instance();
    instance.set_control(0, 1.0);
    let outputs = instance.evaluate(&rig);
    assert_eq!(outputs.blend_shape_weights[0], 1.0);
    // joint deltas are transform deltas, not fractions: no clamping
    assert_eq!(outputs.joint_deltas[1].rotation[0], 30.0);
}

#[test]
fn compiling_a_dangling_graph_fails() {
    let mut doc = jaw_document();
    doc.behavior.blend_shape_behaviors[0].channel = 9;
    let err = RigLogic::new(&doc).unwrap_err();
    assert!(matches!(
        err,
        crate::foundation::error::RigDnaError::DanglingReference(_)
    ));
}

#[test]
fn out_of_range_control_writes_are_ignored() {
    let (rig, mut instance) = rig_and_instance();
    instance.set_control(99, 1.0);
    assert_eq!(instance.controls(), &[0.0, 0.0]);
    let _ = rig;
}
