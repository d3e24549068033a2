use smallvec::SmallVec;

use crate::{
    dna::behavior::BehaviorGraph,
    foundation::error::{RigDnaError, RigDnaResult},
};

/// Maximum number of joint influences kept per vertex.
///
/// Resampling can momentarily produce more; the calibrator truncates to the
/// strongest [`MAX_SKIN_INFLUENCES`] and renormalizes before a document is
/// considered final.
pub const MAX_SKIN_INFLUENCES: usize = 8;

/// Tolerance on the per-vertex skin weight sum.
pub(crate) const WEIGHT_SUM_TOLERANCE: f32 = 1e-5;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A complete in-memory rig description.
///
/// A document is a pure data model produced by [`DnaDocument::from_bytes`] or
/// by the [`crate::Calibrator`]; it exposes read-only accessors and no
/// mutation API. Derived versions always come from a calibration pass, which
/// keeps provenance explicit and prior state available for diffing.
pub struct DnaDocument {
    /// Rig name from the descriptor section.
    pub(crate) name: String,
    /// Joint hierarchy in topological order (parents precede children).
    pub(crate) joints: Vec<Joint>,
    /// Per-LOD skinned geometry, densest first.
    pub(crate) lods: Vec<MeshLod>,
    /// Blend-shape channel table; behaviors and targets reference indices here.
    pub(crate) blend_shape_channels: Vec<BlendShapeChannel>,
    /// Sparse per-LOD blend-shape deltas.
    pub(crate) blend_shape_targets: Vec<BlendShapeTarget>,
    /// Named animated texture-mask outputs.
    pub(crate) animated_maps: Vec<AnimatedMap>,
    /// Control-to-output behavior graph.
    pub(crate) behavior: BehaviorGraph,
    /// Provenance and diagnostics carried with the document.
    pub(crate) metadata: DocumentMetadata,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// One joint of the bind-pose hierarchy.
pub struct Joint {
    /// Joint name, unique within the document.
    pub name: String,
    /// Parent joint index, `-1` for a root.
    pub parent: i32,
    /// Local bind translation.
    pub translation: [f32; 3],
    /// Local bind rotation, Euler XYZ in degrees.
    pub rotation: [f32; 3],
    /// Local bind scale.
    pub scale: [f32; 3],
}

/// Ordered joint influences for one vertex.
pub type SkinInfluences = SmallVec<[JointWeight; MAX_SKIN_INFLUENCES]>;

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A single (joint, weight) skinning influence.
pub struct JointWeight {
    /// Index into [`DnaDocument::joints`].
    pub joint: u16,
    /// Normalized weight; a vertex's weights sum to 1 within tolerance.
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Skinned geometry for one level of detail.
///
/// Vertex indices are stable across `calibrate` passes; the UV chart is the
/// reference used by the correspondence mapper during `overwrite`.
pub struct MeshLod {
    /// Bind-pose vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex UV coordinates; empty when the LOD carries no chart.
    pub uvs: Vec<[f32; 2]>,
    /// UV/position triangulation, indices into `positions`.
    pub triangles: Vec<[u32; 3]>,
    /// Per-vertex joint influences, same length as `positions`.
    pub skin_weights: Vec<SkinInfluences>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A named blend-shape channel. The evaluator produces one weight per channel.
pub struct BlendShapeChannel {
    /// Channel name, unique within the document.
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Sparse position deltas of one channel on one LOD.
pub struct BlendShapeTarget {
    /// Index into [`DnaDocument::blend_shape_channels`].
    pub channel: u16,
    /// LOD this target applies to.
    pub lod: u16,
    /// Affected vertex indices, parallel to `deltas`.
    pub vertices: Vec<u32>,
    /// Position deltas relative to the bind pose.
    pub deltas: Vec<[f32; 3]>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A named scalar texture-mask output in `[0, 1]`.
pub struct AnimatedMap {
    /// Mask name, unique within the document; consumed by the material
    /// collaborator by name each evaluation tick.
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Which calibration mode produced a document.
pub enum CalibrationMode {
    /// Index-stable reconciliation; exact.
    Calibrate,
    /// Topology-changing reconciliation through a UV correspondence map;
    /// approximate by construction.
    Overwrite,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// Provenance and diagnostics persisted with the document.
pub struct DocumentMetadata {
    /// Calibration mode that produced this version, if any.
    pub calibrated_with: Option<CalibrationMode>,
    /// Vertices whose overwrite resampling fell outside the reference chart.
    pub low_confidence: Vec<LowConfidenceVertex>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// One vertex flagged low-confidence by an overwrite pass.
pub struct LowConfidenceVertex {
    /// LOD of the flagged vertex.
    pub lod: u16,
    /// Vertex index within that LOD.
    pub vertex: u32,
}

impl DnaDocument {
    /// Rig name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Joint hierarchy in topological order.
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Per-LOD skinned geometry.
    pub fn lods(&self) -> &[MeshLod] {
        &self.lods
    }

    /// Blend-shape channel table.
    pub fn blend_shape_channels(&self) -> &[BlendShapeChannel] {
        &self.blend_shape_channels
    }

    /// Sparse per-LOD blend-shape targets.
    pub fn blend_shape_targets(&self) -> &[BlendShapeTarget] {
        &self.blend_shape_targets
    }

    /// Animated texture-mask table.
    pub fn animated_maps(&self) -> &[AnimatedMap] {
        &self.animated_maps
    }

    /// The behavior graph.
    pub fn behavior(&self) -> &BehaviorGraph {
        &self.behavior
    }

    /// Provenance and diagnostics.
    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// Validate every document invariant.
    ///
    /// Runs as the second half of [`DnaDocument::from_bytes`] and again on
    /// every document the calibrator produces, so downstream consumers (the
    /// evaluator in particular) never see a malformed document.
    pub fn validate(&self) -> RigDnaResult<()> {
        self.validate_joints()?;
        self.validate_geometry()?;
        self.validate_shape_tables()?;

        for lc in &self.metadata.low_confidence {
            let Some(lod) = self.lods.get(usize::from(lc.lod)) else {
                return Err(RigDnaError::validation(format!(
                    "low-confidence entry references LOD {} out of range",
                    lc.lod
                )));
            };
            if lc.vertex as usize >= lod.positions.len() {
                return Err(RigDnaError::validation(format!(
                    "low-confidence vertex {} out of range for LOD {}",
                    lc.vertex, lc.lod
                )));
            }
        }

        self.behavior.validate(
            self.joints.len(),
            self.blend_shape_channels.len(),
            self.animated_maps.len(),
        )
    }

    fn validate_joints(&self) -> RigDnaResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for (index, joint) in self.joints.iter().enumerate() {
            if joint.name.trim().is_empty() {
                return Err(RigDnaError::validation(format!(
                    "joint {index} has an empty name"
                )));
            }
            if !seen.insert(joint.name.as_str()) {
                return Err(RigDnaError::validation(format!(
                    "duplicate joint name '{}'",
                    joint.name
                )));
            }
            if joint.parent < -1 {
                return Err(RigDnaError::validation(format!(
                    "joint '{}' has invalid parent index {}",
                    joint.name, joint.parent
                )));
            }
            // Topological order: parents strictly precede children.
            if joint.parent >= 0 && joint.parent as usize >= index {
                return Err(RigDnaError::validation(format!(
                    "joint '{}' (index {index}) must come after its parent {}",
                    joint.name, joint.parent
                )));
            }
        }
        Ok(())
    }

    fn validate_geometry(&self) -> RigDnaResult<()> {
        for (i, lod) in self.lods.iter().enumerate() {
            let vertex_count = lod.positions.len();
            if !lod.uvs.is_empty() && lod.uvs.len() != vertex_count {
                return Err(RigDnaError::validation(format!(
                    "LOD {i}: UV table length {} does not match vertex count {vertex_count}",
                    lod.uvs.len()
                )));
            }
            if lod.skin_weights.len() != vertex_count {
                return Err(RigDnaError::validation(format!(
                    "LOD {i}: skin weight table length {} does not match vertex count {vertex_count}",
                    lod.skin_weights.len()
                )));
            }
            for tri in &lod.triangles {
                if tri.iter().any(|&v| v as usize >= vertex_count) {
                    return Err(RigDnaError::validation(format!(
                        "LOD {i}: triangle {tri:?} references a vertex out of range"
                    )));
                }
            }
            for (v, influences) in lod.skin_weights.iter().enumerate() {
                if influences.is_empty() {
                    continue; // unskinned vertex follows the root joint
                }
                if influences.len() > MAX_SKIN_INFLUENCES {
                    return Err(RigDnaError::validation(format!(
                        "LOD {i} vertex {v}: {} influences exceed the maximum of {MAX_SKIN_INFLUENCES}",
                        influences.len()
                    )));
                }
                let mut sum = 0.0f32;
                let mut joints_seen = std::collections::BTreeSet::new();
                for jw in influences {
                    if usize::from(jw.joint) >= self.joints.len() {
                        return Err(RigDnaError::validation(format!(
                            "LOD {i} vertex {v}: influence references joint {} out of range",
                            jw.joint
                        )));
                    }
                    if !joints_seen.insert(jw.joint) {
                        return Err(RigDnaError::validation(format!(
                            "LOD {i} vertex {v}: duplicate influence on joint {}",
                            jw.joint
                        )));
                    }
                    if !jw.weight.is_finite() || jw.weight < 0.0 {
                        return Err(RigDnaError::validation(format!(
                            "LOD {i} vertex {v}: weight must be finite and >= 0"
                        )));
                    }
                    sum += jw.weight;
                }
                if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                    return Err(RigDnaError::validation(format!(
                        "LOD {i} vertex {v}: skin weights sum to {sum}, expected 1"
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_shape_tables(&self) -> RigDnaResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for channel in &self.blend_shape_channels {
            if channel.name.trim().is_empty() {
                return Err(RigDnaError::validation("blend-shape channel name must be non-empty"));
            }
            if !seen.insert(channel.name.as_str()) {
                return Err(RigDnaError::validation(format!(
                    "duplicate blend-shape channel '{}'",
                    channel.name
                )));
            }
        }

        for (t, target) in self.blend_shape_targets.iter().enumerate() {
            if usize::from(target.channel) >= self.blend_shape_channels.len() {
                return Err(RigDnaError::validation(format!(
                    "blend-shape target {t} references channel {} out of range",
                    target.channel
                )));
            }
            let Some(lod) = self.lods.get(usize::from(target.lod)) else {
                return Err(RigDnaError::validation(format!(
                    "blend-shape target {t} references LOD {} out of range",
                    target.lod
                )));
            };
            if target.vertices.len() != target.deltas.len() {
                return Err(RigDnaError::validation(format!(
                    "blend-shape target {t}: vertex and delta tables differ in length"
                )));
            }
            if let Some(&v) = target
                .vertices
                .iter()
                .find(|&&v| v as usize >= lod.positions.len())
            {
                return Err(RigDnaError::validation(format!(
                    "blend-shape target {t}: vertex {v} out of range for LOD {}",
                    target.lod
                )));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for map in &self.animated_maps {
            if map.name.trim().is_empty() {
                return Err(RigDnaError::validation("animated map name must be non-empty"));
            }
            if !seen.insert(map.name.as_str()) {
                return Err(RigDnaError::validation(format!(
                    "duplicate animated map '{}'",
                    map.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/dna/model.rs"]
mod tests;
