//! The behavior evaluator.
//!
//! [`RigLogic`] is compiled once from a document and shared read-only across
//! any number of rig instances (it is `Sync`; evaluation takes `&self`).
//! [`RigInstance`] owns the live control vector plus all output and scratch
//! buffers, so the per-tick path allocates nothing.
//!
//! The pipeline order is a contract, not an implementation detail: later
//! stages consume earlier outputs, and a fixed order is what makes
//! evaluation bit-for-bit deterministic:
//!
//! 1. clamp raw controls to `[0, 1]`
//! 2. PSD expressions, in the topological order fixed at load
//! 3. RBF solvers (weighted pose contributions; weights need not sum to 1)
//! 4. direct joint / blend-shape / animated-map behaviors
//! 5. clamp blend-shape and animated-map sums to `[0, 1]`
//!
//! Joint deltas are transform deltas, not fractions, and are never clamped.

use crate::{
    dna::behavior::{
        AnimatedMapBehavior, BlendShapeBehavior, InputRef, JointBehavior, PsdCombiner,
        PsdExpression, RbfPose,
    },
    dna::model::DnaDocument,
    eval::rbf::CompiledRbf,
    foundation::error::RigDnaResult,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// Transform delta for one joint, applied on top of its bind transform.
pub struct JointDelta {
    /// Translation delta.
    pub translation: [f32; 3],
    /// Rotation delta, Euler XYZ degrees.
    pub rotation: [f32; 3],
    /// Scale delta.
    pub scale: [f32; 3],
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// One evaluation tick's outputs.
///
/// The texture/material collaborator consumes `animated_map_weights` by
/// index each tick; explicit data passing, no shared observation.
pub struct RigOutputs {
    /// Per-joint transform deltas, dense over the document's joint table.
    pub joint_deltas: Vec<JointDelta>,
    /// Per-channel blend-shape weights in `[0, 1]`.
    pub blend_shape_weights: Vec<f32>,
    /// Per-map texture-mask weights in `[0, 1]`.
    pub animated_map_weights: Vec<f32>,
}

#[derive(Debug)]
struct CompiledSolver {
    rbf: CompiledRbf,
    inputs: Vec<InputRef>,
    poses: Vec<RbfPose>,
}

/// The compiled, shareable half of the evaluator.
///
/// Everything the per-frame path needs (PSD evaluation order, inverted RBF
/// kernel matrices, flattened behavior lists) is computed here, once, so
/// evaluation itself has no error path and no allocation.
#[derive(Debug)]
pub struct RigLogic {
    control_names: Vec<String>,
    psd: Vec<PsdExpression>,
    psd_order: Vec<u16>,
    solvers: Vec<CompiledSolver>,
    joint_behaviors: Vec<JointBehavior>,
    blend_shape_behaviors: Vec<BlendShapeBehavior>,
    animated_map_behaviors: Vec<AnimatedMapBehavior>,
    joint_count: usize,
    channel_count: usize,
    map_count: usize,
    max_poses: usize,
}

impl RigLogic {
    /// Compile a document's behavior graph for evaluation.
    ///
    /// Validates the document first, so a graph with dangling references or
    /// expression cycles is rejected here, never during a tick.
    #[tracing::instrument(skip(document), fields(rig = document.name()))]
    pub fn new(document: &DnaDocument) -> RigDnaResult<Self> {
        document.validate()?;
        let behavior = document.behavior();

        let solvers = behavior
            .rbf_solvers
            .iter()
            .map(|solver| {
                Ok(CompiledSolver {
                    rbf: CompiledRbf::compile(solver)?,
                    inputs: solver.inputs.clone(),
                    poses: solver.poses.clone(),
                })
            })
            .collect::<RigDnaResult<Vec<_>>>()?;
        let max_poses = solvers
            .iter()
            .map(|s| s.rbf.pose_count())
            .max()
            .unwrap_or(0);

        Ok(Self {
            control_names: behavior.controls.iter().map(|c| c.name.clone()).collect(),
            psd: behavior.psd_expressions.clone(),
            psd_order: behavior.psd_evaluation_order()?,
            solvers,
            joint_behaviors: behavior.joint_behaviors.clone(),
            blend_shape_behaviors: behavior.blend_shape_behaviors.clone(),
            animated_map_behaviors: behavior.animated_map_behaviors.clone(),
            joint_count: document.joints().len(),
            channel_count: document.blend_shape_channels().len(),
            map_count: document.animated_maps().len(),
            max_poses,
        })
    }

    /// Number of raw controls.
    pub fn control_count(&self) -> usize {
        self.control_names.len()
    }

    /// Control names, in control-index order.
    pub fn control_names(&self) -> impl Iterator<Item = &str> {
        self.control_names.iter().map(String::as_str)
    }

    /// Index of a control by name.
    pub fn control_index(&self, name: &str) -> Option<usize> {
        self.control_names.iter().position(|n| n == name)
    }

    /// Create an instance with zeroed controls and correctly sized buffers.
    pub fn instance(&self) -> RigInstance {
        RigInstance {
            controls: vec![0.0; self.control_names.len()],
            clamped: vec![0.0; self.control_names.len()],
            psd_values: vec![0.0; self.psd.len()],
            query: Vec::with_capacity(
                self.solvers
                    .iter()
                    .map(|s| s.inputs.len())
                    .max()
                    .unwrap_or(0),
            ),
            phi: vec![0.0; self.max_poses],
            pose_weights: vec![0.0; self.max_poses],
            outputs: RigOutputs {
                joint_deltas: vec![JointDelta::default(); self.joint_count],
                blend_shape_weights: vec![0.0; self.channel_count],
                animated_map_weights: vec![0.0; self.map_count],
            },
        }
    }

    /// Re-fit an instance's buffers to this rig. A no-op (and the per-tick
    /// path) whenever the instance came from this rig; only pairing an
    /// instance with a different rig pays for reallocation.
    fn ensure_shape(&self, instance: &mut RigInstance) {
        if instance.controls.len() != self.control_names.len() {
            instance.controls.resize(self.control_names.len(), 0.0);
            instance.clamped.resize(self.control_names.len(), 0.0);
        }
        if instance.psd_values.len() != self.psd.len() {
            instance.psd_values.resize(self.psd.len(), 0.0);
        }
        if instance.phi.len() < self.max_poses {
            instance.phi.resize(self.max_poses, 0.0);
            instance.pose_weights.resize(self.max_poses, 0.0);
        }
        if instance.outputs.joint_deltas.len() != self.joint_count {
            instance
                .outputs
                .joint_deltas
                .resize(self.joint_count, JointDelta::default());
        }
        if instance.outputs.blend_shape_weights.len() != self.channel_count {
            instance
                .outputs
                .blend_shape_weights
                .resize(self.channel_count, 0.0);
        }
        if instance.outputs.animated_map_weights.len() != self.map_count {
            instance
                .outputs
                .animated_map_weights
                .resize(self.map_count, 0.0);
        }
    }

    fn evaluate_into(&self, instance: &mut RigInstance) {
        self.ensure_shape(instance);

        // 1. clamp
        for (dst, &src) in instance.clamped.iter_mut().zip(&instance.controls) {
            *dst = src.clamp(0.0, 1.0);
        }

        // 2. PSD expressions in dependency order
        for &e in &self.psd_order {
            let expr = &self.psd[usize::from(e)];
            let mut it = expr
                .inputs
                .iter()
                .map(|&input| input_value(&instance.clamped, &instance.psd_values, input));
            let first = it.next().unwrap_or(0.0);
            let value = match expr.combiner {
                PsdCombiner::Product => it.fold(first, |acc, x| acc * x),
                PsdCombiner::Min => it.fold(first, f32::min),
                PsdCombiner::Max => it.fold(first, f32::max),
            };
            instance.psd_values[usize::from(e)] = value;
        }

        // zero the accumulators
        for delta in &mut instance.outputs.joint_deltas {
            *delta = JointDelta::default();
        }
        instance.outputs.blend_shape_weights.fill(0.0);
        instance.outputs.animated_map_weights.fill(0.0);

        // 3. RBF solvers
        for solver in &self.solvers {
            instance.query.clear();
            for &input in &solver.inputs {
                instance.query.push(f64::from(input_value(
                    &instance.clamped,
                    &instance.psd_values,
                    input,
                )));
            }
            let n = solver.rbf.pose_count();
            solver.rbf.weights_into(
                &instance.query,
                &mut instance.phi[..n],
                &mut instance.pose_weights[..n],
            );
            for (pose, &weight) in solver.poses.iter().zip(instance.pose_weights.iter()) {
                let w = weight as f32;
                for jd in &pose.joint_deltas {
                    let out = &mut instance.outputs.joint_deltas[usize::from(jd.joint)];
                    for axis in 0..3 {
                        out.translation[axis] += w * jd.translation[axis];
                        out.rotation[axis] += w * jd.rotation[axis];
                        out.scale[axis] += w * jd.scale[axis];
                    }
                }
                for sw in &pose.shape_weights {
                    instance.outputs.blend_shape_weights[usize::from(sw.channel)] +=
                        w * sw.weight;
                }
            }
        }

        // 4. direct behaviors
        for jb in &self.joint_behaviors {
            let x = input_value(&instance.clamped, &instance.psd_values, jb.input);
            let out = &mut instance.outputs.joint_deltas[usize::from(jb.joint)];
            let t = jb.translation.sample(x);
            let r = jb.rotation.sample(x);
            let s = jb.scale.sample(x);
            for axis in 0..3 {
                out.translation[axis] += t[axis];
                out.rotation[axis] += r[axis];
                out.scale[axis] += s[axis];
            }
        }
        for sb in &self.blend_shape_behaviors {
            let x = input_value(&instance.clamped, &instance.psd_values, sb.input);
            instance.outputs.blend_shape_weights[usize::from(sb.channel)] +=
                sb.weights.sample(x);
        }
        for mb in &self.animated_map_behaviors {
            let x = input_value(&instance.clamped, &instance.psd_values, mb.input);
            instance.outputs.animated_map_weights[usize::from(mb.map)] += mb.weights.sample(x);
        }

        // 5. weights are fractions; joint deltas stay unclamped
        for w in &mut instance.outputs.blend_shape_weights {
            *w = w.clamp(0.0, 1.0);
        }
        for w in &mut instance.outputs.animated_map_weights {
            *w = w.clamp(0.0, 1.0);
        }
    }
}

fn input_value(clamped: &[f32], psd_values: &[f32], input: InputRef) -> f32 {
    match input {
        InputRef::Control(i) => clamped[usize::from(i)],
        InputRef::Psd(i) => psd_values[usize::from(i)],
    }
}

/// Per-rig evaluation state: the live control vector plus output and scratch
/// buffers. Cheap to create per rig instance; reused every tick.
pub struct RigInstance {
    controls: Vec<f32>,
    clamped: Vec<f32>,
    psd_values: Vec<f32>,
    query: Vec<f64>,
    phi: Vec<f64>,
    pose_weights: Vec<f64>,
    outputs: RigOutputs,
}

impl RigInstance {
    /// Set one raw control value. Indices past the control count are ignored;
    /// values are clamped to `[0, 1]` at evaluation time, not here.
    pub fn set_control(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.controls.get_mut(index) {
            *slot = value;
        }
    }

    /// Set every raw control at once; extra values are ignored, missing ones
    /// keep their previous setting.
    pub fn set_controls(&mut self, values: &[f32]) {
        let n = self.controls.len().min(values.len());
        self.controls[..n].copy_from_slice(&values[..n]);
    }

    /// Current raw control values.
    pub fn controls(&self) -> &[f32] {
        &self.controls
    }

    /// Run one evaluation tick against the rig this instance was created
    /// from and return the outputs.
    ///
    /// Pure with respect to `(rig, controls)`: identical inputs produce
    /// bit-identical outputs. Nothing is allocated on this path.
    pub fn evaluate<'a>(&'a mut self, rig: &RigLogic) -> &'a RigOutputs {
        rig.evaluate_into(self);
        &self.outputs
    }

    /// Outputs of the most recent [`RigInstance::evaluate`] call.
    pub fn outputs(&self) -> &RigOutputs {
        &self.outputs
    }
}

#[cfg(test)]
#[path = "../../tests/unit/eval/riglogic.rs"]
mod tests;
