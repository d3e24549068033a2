use super::*;

fn scalar(keys: &[(f32, f32)]) -> ScalarCurve {
    ScalarCurve {
        keys: keys
            .iter()
            .map(|&(at, value)| ScalarKey { at, value })
            .collect(),
    }
}

#[test]
fn scalar_curve_reproduces_endpoints_exactly() {
    let curve = scalar(&[(0.0, 0.2), (1.0, 0.9)]);
    assert_eq!(curve.sample(0.0), 0.2);
    assert_eq!(curve.sample(1.0), 0.9);
}

#[test]
fn scalar_curve_clamps_outside_keyed_range() {
    let curve = scalar(&[(0.25, 1.0), (0.75, 3.0)]);
    assert_eq!(curve.sample(-1.0), 1.0);
    assert_eq!(curve.sample(2.0), 3.0);
}

#[test]
fn scalar_curve_interpolates_between_keys() {
    let curve = scalar(&[(0.0, 0.0), (1.0, 30.0)]);
    assert!((curve.sample(0.5) - 15.0).abs() < 1e-6);
}

#[test]
fn scalar_curve_is_piecewise() {
    let curve = scalar(&[(0.0, 0.0), (0.5, 1.0), (1.0, 0.0)]);
    assert!((curve.sample(0.25) - 0.5).abs() < 1e-6);
    assert!((curve.sample(0.75) - 0.5).abs() < 1e-6);
    assert_eq!(curve.sample(0.5), 1.0);
}

#[test]
fn empty_curves_contribute_zero() {
    assert_eq!(scalar(&[]).sample(0.7), 0.0);
    assert_eq!(VectorCurve { keys: vec![] }.sample(0.7), [0.0; 3]);
}

#[test]
fn vector_curve_samples_componentwise() {
    let curve = VectorCurve {
        keys: vec![
            VectorKey {
                at: 0.0,
                value: [0.0, 0.0, 0.0],
            },
            VectorKey {
                at: 1.0,
                value: [30.0, -10.0, 2.0],
            },
        ],
    };
    let v = curve.sample(0.5);
    assert!((v[0] - 15.0).abs() < 1e-6);
    assert!((v[1] + 5.0).abs() < 1e-6);
    assert!((v[2] - 1.0).abs() < 1e-6);
}

fn graph_with_psds(exprs: Vec<PsdExpression>) -> BehaviorGraph {
    BehaviorGraph {
        controls: vec![
            ControlDef {
                name: "a".to_string(),
            },
            ControlDef {
                name: "b".to_string(),
            },
        ],
        psd_expressions: exprs,
        ..BehaviorGraph::empty()
    }
}

#[test]
fn psd_chain_orders_dependencies_first() {
    // expression 0 depends on expression 1
    let graph = graph_with_psds(vec![
        PsdExpression {
            name: "outer".to_string(),
            combiner: PsdCombiner::Product,
            inputs: vec![InputRef::Psd(1), InputRef::Control(0)],
        },
        PsdExpression {
            name: "inner".to_string(),
            combiner: PsdCombiner::Product,
            inputs: vec![InputRef::Control(0), InputRef::Control(1)],
        },
    ]);
    let order = graph.psd_evaluation_order().unwrap();
    let pos_outer = order.iter().position(|&e| e == 0).unwrap();
    let pos_inner = order.iter().position(|&e| e == 1).unwrap();
    assert!(pos_inner < pos_outer, "order was {order:?}");
}

#[test]
fn psd_cycle_is_rejected() {
    let graph = graph_with_psds(vec![
        PsdExpression {
            name: "x".to_string(),
            combiner: PsdCombiner::Product,
            inputs: vec![InputRef::Psd(1)],
        },
        PsdExpression {
            name: "y".to_string(),
            combiner: PsdCombiner::Product,
            inputs: vec![InputRef::Psd(0)],
        },
    ]);
    let err = graph.psd_evaluation_order().unwrap_err();
    assert!(matches!(err, RigDnaError::CyclicExpression(_)), "{err}");
}

#[test]
fn psd_self_reference_is_a_cycle() {
    let graph = graph_with_psds(vec![PsdExpression {
        name: "loop".to_string(),
        combiner: PsdCombiner::Max,
        inputs: vec![InputRef::Psd(0)],
    }]);
    assert!(graph.psd_evaluation_order().is_err());
}

#[test]
fn cycle_is_rejected_by_full_validation() {
    let graph = graph_with_psds(vec![PsdExpression {
        name: "loop".to_string(),
        combiner: PsdCombiner::Product,
        inputs: vec![InputRef::Psd(0)],
    }]);
    let err = graph.validate(0, 0, 0).unwrap_err();
    assert!(matches!(err, RigDnaError::CyclicExpression(_)), "{err}");
}

#[test]
fn dangling_control_reference_is_rejected() {
    let graph = graph_with_psds(vec![PsdExpression {
        name: "bad".to_string(),
        combiner: PsdCombiner::Product,
        inputs: vec![InputRef::Control(9)],
    }]);
    let err = graph.validate(0, 0, 0).unwrap_err();
    assert!(matches!(err, RigDnaError::DanglingReference(_)), "{err}");
}

#[test]
fn solver_pose_dimension_mismatch_is_rejected() {
    let mut graph = graph_with_psds(vec![]);
    graph.rbf_solvers.push(RbfSolver {
        name: "s".to_string(),
        kernel: RbfKernel::Gaussian { width: 0.5 },
        inputs: vec![InputRef::Control(0), InputRef::Control(1)],
        poses: vec![RbfPose {
            name: "p".to_string(),
            target: vec![0.0],
            joint_deltas: vec![],
            shape_weights: vec![],
        }],
    });
    let err = graph.validate(0, 0, 0).unwrap_err();
    assert!(matches!(err, RigDnaError::Validation(_)), "{err}");
}
