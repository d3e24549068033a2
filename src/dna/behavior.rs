use crate::foundation::{
    error::{RigDnaError, RigDnaResult},
    math::{lerp, lerp3},
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// The control-to-output mapping embedded in a DNA document.
///
/// The graph is a closed set of behavior kinds (raw controls, derived PSD
/// expressions, RBF solvers, and direct joint/blend-shape/animated-map
/// functions) dispatched by the evaluator in a fixed stage order. Every
/// reference in the graph is checked at document load; the evaluator never
/// sees a dangling index.
pub struct BehaviorGraph {
    /// Named scalar inputs, range-normalized to `[0, 1]`.
    pub controls: Vec<ControlDef>,
    /// Derived pose-space corrective scalars.
    pub psd_expressions: Vec<PsdExpression>,
    /// Radial-basis interpolators over discrete target poses.
    pub rbf_solvers: Vec<RbfSolver>,
    /// Direct control-driven joint transform deltas.
    pub joint_behaviors: Vec<JointBehavior>,
    /// Direct control-driven blend-shape channel weights.
    pub blend_shape_behaviors: Vec<BlendShapeBehavior>,
    /// Direct control-driven texture-mask weights.
    pub animated_map_behaviors: Vec<AnimatedMapBehavior>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A named raw control input.
pub struct ControlDef {
    /// Control name, unique within the graph.
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Reference to a scalar input of a behavior: a raw control or a PSD value.
pub enum InputRef {
    /// Index into [`BehaviorGraph::controls`].
    Control(u16),
    /// Index into [`BehaviorGraph::psd_expressions`].
    Psd(u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Combiner rule of a PSD expression.
pub enum PsdCombiner {
    /// Product of all inputs, the standard corrective firing rule.
    Product,
    /// Minimum of all inputs.
    Min,
    /// Maximum of all inputs.
    Max,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A derived scalar combining one or more inputs.
pub struct PsdExpression {
    /// Expression name, unique within the graph.
    pub name: String,
    /// Combiner applied over `inputs`.
    pub combiner: PsdCombiner,
    /// Inputs; referencing another expression is allowed as long as the
    /// dependency relation stays acyclic.
    pub inputs: Vec<InputRef>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Radial falloff kernel of an RBF solver.
pub enum RbfKernel {
    /// `exp(-(r/width)^2)`.
    Gaussian {
        /// Support width; must be finite and > 0.
        width: f32,
    },
    /// `r^2 ln(r)`, zero at `r = 0`.
    ThinPlate,
    /// `sqrt(r^2 + c^2)`.
    Multiquadric {
        /// Shape parameter; must be finite and > 0.
        c: f32,
    },
    /// `1 / sqrt(r^2 + c^2)`.
    InverseMultiquadric {
        /// Shape parameter; must be finite and > 0.
        c: f32,
    },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A pose-space interpolator: target poses in control space, blended outputs.
pub struct RbfSolver {
    /// Solver name, unique within the graph.
    pub name: String,
    /// Falloff kernel.
    pub kernel: RbfKernel,
    /// Query dimensions; the live values of these inputs form the query point.
    pub inputs: Vec<InputRef>,
    /// Target poses with their associated outputs.
    pub poses: Vec<RbfPose>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// One target pose of an RBF solver.
pub struct RbfPose {
    /// Pose name, for diagnostics.
    pub name: String,
    /// Position in the solver's input space; `len == solver.inputs.len()`.
    pub target: Vec<f32>,
    /// Joint transform deltas contributed when this pose is active.
    pub joint_deltas: Vec<PoseJointDelta>,
    /// Blend-shape channel weights contributed when this pose is active.
    pub shape_weights: Vec<PoseShapeWeight>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A sparse joint delta attached to an RBF pose.
pub struct PoseJointDelta {
    /// Index into the document's joint table.
    pub joint: u16,
    /// Translation delta.
    pub translation: [f32; 3],
    /// Rotation delta, Euler XYZ degrees.
    pub rotation: [f32; 3],
    /// Scale delta.
    pub scale: [f32; 3],
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A sparse blend-shape weight attached to an RBF pose.
pub struct PoseShapeWeight {
    /// Index into the document's blend-shape channel table.
    pub channel: u16,
    /// Contributed weight.
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Piecewise-linear scalar function of one input.
///
/// Keys are sorted by strictly increasing input value; sampling clamps to the
/// first/last key outside the keyed range, so configured endpoints are
/// reproduced exactly at the range boundaries.
pub struct ScalarCurve {
    /// Sorted keys.
    pub keys: Vec<ScalarKey>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// One key of a [`ScalarCurve`].
pub struct ScalarKey {
    /// Input value this key sits at.
    pub at: f32,
    /// Output value.
    pub value: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Piecewise-linear 3-vector function of one input.
pub struct VectorCurve {
    /// Sorted keys.
    pub keys: Vec<VectorKey>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// One key of a [`VectorCurve`].
pub struct VectorKey {
    /// Input value this key sits at.
    pub at: f32,
    /// Output vector.
    pub value: [f32; 3],
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Direct joint transform deltas as a function of one input.
///
/// An empty curve contributes nothing on that channel.
pub struct JointBehavior {
    /// Index into the document's joint table.
    pub joint: u16,
    /// Driving input.
    pub input: InputRef,
    /// Translation delta curve.
    pub translation: VectorCurve,
    /// Rotation delta curve, Euler XYZ degrees.
    pub rotation: VectorCurve,
    /// Scale delta curve.
    pub scale: VectorCurve,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Direct blend-shape channel weight as a function of one input.
pub struct BlendShapeBehavior {
    /// Index into the document's blend-shape channel table.
    pub channel: u16,
    /// Driving input.
    pub input: InputRef,
    /// Weight curve; the summed result is clamped to `[0, 1]` per tick.
    pub weights: ScalarCurve,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Direct animated-map weight as a function of one input.
pub struct AnimatedMapBehavior {
    /// Index into the document's animated-map table.
    pub map: u16,
    /// Driving input.
    pub input: InputRef,
    /// Weight curve; the summed result is clamped to `[0, 1]` per tick.
    pub weights: ScalarCurve,
}

impl ScalarCurve {
    /// Sample at `x`, clamped to the keyed range. Empty curves contribute 0.
    pub fn sample(&self, x: f32) -> f32 {
        match sample_keys(&self.keys, |k| k.at, x) {
            Sampled::Empty => 0.0,
            Sampled::At(i) => self.keys[i].value,
            Sampled::Between(i, t) => lerp(self.keys[i].value, self.keys[i + 1].value, t),
        }
    }

    fn validate(&self, what: &str) -> RigDnaResult<()> {
        validate_keys(&self.keys, |k| k.at, what)
    }
}

impl VectorCurve {
    /// Sample at `x`, clamped to the keyed range. Empty curves contribute 0.
    pub fn sample(&self, x: f32) -> [f32; 3] {
        match sample_keys(&self.keys, |k| k.at, x) {
            Sampled::Empty => [0.0; 3],
            Sampled::At(i) => self.keys[i].value,
            Sampled::Between(i, t) => lerp3(self.keys[i].value, self.keys[i + 1].value, t),
        }
    }

    fn validate(&self, what: &str) -> RigDnaResult<()> {
        validate_keys(&self.keys, |k| k.at, what)
    }
}

enum Sampled {
    Empty,
    At(usize),
    Between(usize, f32),
}

fn sample_keys<K>(keys: &[K], at: impl Fn(&K) -> f32, x: f32) -> Sampled {
    let Some(last) = keys.last() else {
        return Sampled::Empty;
    };
    if x <= at(&keys[0]) {
        return Sampled::At(0);
    }
    if x >= at(last) {
        return Sampled::At(keys.len() - 1);
    }
    // keys.len() >= 2 here since at(first) < x < at(last)
    let mut i = 0;
    while at(&keys[i + 1]) < x {
        i += 1;
    }
    let a = at(&keys[i]);
    let b = at(&keys[i + 1]);
    if x == b {
        return Sampled::At(i + 1);
    }
    Sampled::Between(i, (x - a) / (b - a))
}

fn validate_keys<K>(keys: &[K], at: impl Fn(&K) -> f32, what: &str) -> RigDnaResult<()> {
    for pair in keys.windows(2) {
        if at(&pair[0]) >= at(&pair[1]) {
            return Err(RigDnaError::validation(format!(
                "{what}: curve keys must be strictly increasing"
            )));
        }
    }
    if let Some(k) = keys.iter().find(|&k| !at(k).is_finite()) {
        return Err(RigDnaError::validation(format!(
            "{what}: curve key at {} is not finite",
            at(k)
        )));
    }
    Ok(())
}

impl BehaviorGraph {
    /// An empty graph (no controls, no behaviors).
    pub fn empty() -> Self {
        Self {
            controls: Vec::new(),
            psd_expressions: Vec::new(),
            rbf_solvers: Vec::new(),
            joint_behaviors: Vec::new(),
            blend_shape_behaviors: Vec::new(),
            animated_map_behaviors: Vec::new(),
        }
    }

    /// Index of a control by name.
    pub fn control_index(&self, name: &str) -> Option<usize> {
        self.controls.iter().position(|c| c.name == name)
    }

    /// Validate reference closure and expression acyclicity against the
    /// document tables this graph is embedded in.
    pub(crate) fn validate(
        &self,
        joint_count: usize,
        channel_count: usize,
        map_count: usize,
    ) -> RigDnaResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for control in &self.controls {
            if control.name.trim().is_empty() {
                return Err(RigDnaError::validation("control name must be non-empty"));
            }
            if !seen.insert(control.name.as_str()) {
                return Err(RigDnaError::validation(format!(
                    "duplicate control '{}'",
                    control.name
                )));
            }
        }

        for expr in &self.psd_expressions {
            if expr.inputs.is_empty() {
                return Err(RigDnaError::validation(format!(
                    "PSD expression '{}' has no inputs",
                    expr.name
                )));
            }
            for input in &expr.inputs {
                self.check_input(*input, &format!("PSD expression '{}'", expr.name))?;
            }
        }
        self.psd_evaluation_order()?;

        for solver in &self.rbf_solvers {
            self.validate_solver(solver, joint_count, channel_count)?;
        }

        for jb in &self.joint_behaviors {
            if usize::from(jb.joint) >= joint_count {
                return Err(RigDnaError::dangling(format!(
                    "joint behavior references joint {} but the document has {joint_count} joints",
                    jb.joint
                )));
            }
            self.check_input(jb.input, &format!("joint behavior on joint {}", jb.joint))?;
            let what = format!("joint behavior on joint {}", jb.joint);
            jb.translation.validate(&what)?;
            jb.rotation.validate(&what)?;
            jb.scale.validate(&what)?;
        }

        for sb in &self.blend_shape_behaviors {
            if usize::from(sb.channel) >= channel_count {
                return Err(RigDnaError::dangling(format!(
                    "blend-shape behavior references channel {} but the document has {channel_count} channels",
                    sb.channel
                )));
            }
            let what = format!("blend-shape behavior on channel {}", sb.channel);
            self.check_input(sb.input, &what)?;
            sb.weights.validate(&what)?;
        }

        for mb in &self.animated_map_behaviors {
            if usize::from(mb.map) >= map_count {
                return Err(RigDnaError::dangling(format!(
                    "animated-map behavior references map {} but the document has {map_count} maps",
                    mb.map
                )));
            }
            let what = format!("animated-map behavior on map {}", mb.map);
            self.check_input(mb.input, &what)?;
            mb.weights.validate(&what)?;
        }

        Ok(())
    }

    fn validate_solver(
        &self,
        solver: &RbfSolver,
        joint_count: usize,
        channel_count: usize,
    ) -> RigDnaResult<()> {
        let what = format!("RBF solver '{}'", solver.name);
        match solver.kernel {
            RbfKernel::Gaussian { width } => {
                if !width.is_finite() || width <= 0.0 {
                    return Err(RigDnaError::validation(format!(
                        "{what}: Gaussian width must be finite and > 0"
                    )));
                }
            }
            RbfKernel::ThinPlate => {}
            RbfKernel::Multiquadric { c } | RbfKernel::InverseMultiquadric { c } => {
                if !c.is_finite() || c <= 0.0 {
                    return Err(RigDnaError::validation(format!(
                        "{what}: kernel shape parameter must be finite and > 0"
                    )));
                }
            }
        }
        if solver.inputs.is_empty() {
            return Err(RigDnaError::validation(format!("{what}: no input dimensions")));
        }
        for input in &solver.inputs {
            self.check_input(*input, &what)?;
        }
        if solver.poses.is_empty() {
            return Err(RigDnaError::validation(format!("{what}: no target poses")));
        }
        for pose in &solver.poses {
            if pose.target.len() != solver.inputs.len() {
                return Err(RigDnaError::validation(format!(
                    "{what}: pose '{}' has {} target coordinates for {} inputs",
                    pose.name,
                    pose.target.len(),
                    solver.inputs.len()
                )));
            }
            for jd in &pose.joint_deltas {
                if usize::from(jd.joint) >= joint_count {
                    return Err(RigDnaError::dangling(format!(
                        "{what}: pose '{}' references joint {} but the document has {joint_count} joints",
                        pose.name, jd.joint
                    )));
                }
            }
            for sw in &pose.shape_weights {
                if usize::from(sw.channel) >= channel_count {
                    return Err(RigDnaError::dangling(format!(
                        "{what}: pose '{}' references channel {} but the document has {channel_count} channels",
                        pose.name, sw.channel
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_input(&self, input: InputRef, what: &str) -> RigDnaResult<()> {
        match input {
            InputRef::Control(i) if usize::from(i) >= self.controls.len() => {
                Err(RigDnaError::dangling(format!(
                    "{what} references control {i} but the graph has {} controls",
                    self.controls.len()
                )))
            }
            InputRef::Psd(i) if usize::from(i) >= self.psd_expressions.len() => {
                Err(RigDnaError::dangling(format!(
                    "{what} references PSD expression {i} but the graph has {} expressions",
                    self.psd_expressions.len()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Topological evaluation order of the PSD expressions.
    ///
    /// Fails with [`RigDnaError::CyclicExpression`] on a dependency cycle;
    /// runs at document load so evaluation never has to re-check.
    pub(crate) fn psd_evaluation_order(&self) -> RigDnaResult<Vec<u16>> {
        const UNVISITED: u8 = 0;
        const IN_PROGRESS: u8 = 1;
        const DONE: u8 = 2;

        let n = self.psd_expressions.len();
        let mut state = vec![UNVISITED; n];
        let mut order = Vec::with_capacity(n);
        // Iterative DFS; a back edge to an IN_PROGRESS node is a cycle.
        for root in 0..n {
            if state[root] != UNVISITED {
                continue;
            }
            let mut stack = vec![(root, 0usize)];
            state[root] = IN_PROGRESS;
            while let Some((node, mut next)) = stack.pop() {
                let inputs = &self.psd_expressions[node].inputs;
                let mut descended = false;
                while next < inputs.len() {
                    let input = inputs[next];
                    next += 1;
                    if let InputRef::Psd(dep) = input {
                        let dep = usize::from(dep);
                        // Out-of-range deps are reported by check_input.
                        if dep >= n {
                            continue;
                        }
                        match state[dep] {
                            IN_PROGRESS => {
                                return Err(RigDnaError::cyclic(format!(
                                    "PSD expression '{}' participates in a dependency cycle",
                                    self.psd_expressions[dep].name
                                )));
                            }
                            UNVISITED => {
                                stack.push((node, next));
                                state[dep] = IN_PROGRESS;
                                stack.push((dep, 0));
                                descended = true;
                                break;
                            }
                            _ => {}
                        }
                    }
                }
                if !descended {
                    state[node] = DONE;
                    order.push(node as u16);
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/dna/behavior.rs"]
mod tests;
