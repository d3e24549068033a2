//! Reconciliation of edited geometry into a new DNA document version.
//!
//! Two modes, selected by the caller. `calibrate` assumes the edit kept the
//! source document's vertex indexing and joint set. It is cheap and exact, and
//! the recommended path. `overwrite` (see the sibling module) supports
//! re-topologized meshes through a UV correspondence map and is approximate
//! by construction.
//!
//! Both modes take immutable snapshots and produce a fresh document; the
//! source is never edited in place, so prior state stays available for
//! diffing and rollback. Callers serialize passes per rig; two concurrent
//! passes against the same source would silently race their snapshots.

use crate::{
    dna::model::{CalibrationMode, DnaDocument, LowConfidenceVertex, MeshLod},
    foundation::{
        error::{RigDnaError, RigDnaResult},
        math::{dist3, rotation_axis_changed},
    },
    mapping::snapshot::{MeshSnapshot, SkeletonSnapshot},
};

/// Vertex position edits below this length keep the stored value, so a
/// round-trip through the editor does not drift the float data.
pub(crate) const VERTEX_DELTA_THRESHOLD: f32 = 1e-6;

/// Blend-shape delta entries below this length are dropped when a target is
/// rebuilt from resampled data.
pub(crate) const SHAPE_DELTA_THRESHOLD: f32 = 1e-6;

/// Joint transform edits below this magnitude keep the stored value.
pub(crate) const JOINT_DELTA_THRESHOLD: f32 = 1e-3;

/// Entry point for both reconciliation modes.
pub struct Calibrator;

#[derive(Clone, Debug)]
/// A produced document plus the diagnostics that go with it.
pub struct CalibrationOutcome {
    /// The new document version.
    pub document: DnaDocument,
    /// What the pass did, for user feedback.
    pub report: CalibrationReport,
}

#[derive(Clone, Debug)]
/// Diagnostics of one calibration pass.
pub struct CalibrationReport {
    /// Which mode ran.
    pub mode: CalibrationMode,
    /// Vertices whose stored position changed.
    pub moved_vertices: usize,
    /// Joints whose stored bind transform changed.
    pub moved_joints: usize,
    /// Vertices the correspondence mapper flagged; empty for `Calibrate`.
    /// A non-empty list means the result is approximate in those regions and
    /// should be surfaced to the user.
    pub low_confidence: Vec<LowConfidenceVertex>,
}

impl Calibrator {
    /// Reconcile an index-stable edit into a new document.
    ///
    /// Preconditions (all [`RigDnaError::IndexMismatch`] on violation, in
    /// which case the caller should use [`Calibrator::overwrite`]): one mesh
    /// snapshot per LOD with the source vertex count, and a skeleton whose
    /// joint names match the source joint table in count and order.
    ///
    /// The behavior graph (controls, PSD expressions, RBF solvers, target
    /// output poses) is copied verbatim: index stability is exactly what
    /// makes the edit safe for it.
    #[tracing::instrument(skip_all, fields(rig = source.name()))]
    pub fn calibrate(
        source: &DnaDocument,
        meshes: &[MeshSnapshot],
        skeleton: &SkeletonSnapshot,
    ) -> RigDnaResult<CalibrationOutcome> {
        if meshes.len() != source.lods.len() {
            return Err(RigDnaError::index_mismatch(format!(
                "{} mesh snapshots supplied for {} LODs",
                meshes.len(),
                source.lods.len()
            )));
        }
        for (i, (mesh, lod)) in meshes.iter().zip(&source.lods).enumerate() {
            if mesh.vertex_count() != lod.positions.len() {
                return Err(RigDnaError::index_mismatch(format!(
                    "LOD {i}: snapshot has {} vertices, document has {}",
                    mesh.vertex_count(),
                    lod.positions.len()
                )));
            }
        }
        if skeleton.joints.len() != source.joints.len() {
            return Err(RigDnaError::index_mismatch(format!(
                "snapshot has {} joints, document has {}",
                skeleton.joints.len(),
                source.joints.len()
            )));
        }
        for (js, jd) in skeleton.joints.iter().zip(&source.joints) {
            if js.name != jd.name {
                return Err(RigDnaError::index_mismatch(format!(
                    "joint '{}' in snapshot does not match document joint '{}'",
                    js.name, jd.name
                )));
            }
        }

        let mut document = source.clone();
        let mut moved_vertices = 0usize;

        for (lod, mesh) in document.lods.iter_mut().zip(meshes) {
            for (stored, &edited) in lod.positions.iter_mut().zip(&mesh.positions) {
                // Ignore sub-threshold deltas to avoid float drift on
                // untouched vertices.
                if dist3(*stored, edited) > VERTEX_DELTA_THRESHOLD {
                    *stored = edited;
                    moved_vertices += 1;
                }
            }
        }
        tracing::info!(moved_vertices, "calibrated vertex positions");

        // Blend-shape deltas are stored relative to the bind pose, so holding
        // the displacement pattern constant rebases each shape onto the new
        // bind positions with no arithmetic at all.

        let mut moved_joints = 0usize;
        for (joint, edited) in document.joints.iter_mut().zip(&skeleton.joints) {
            let mut moved = false;
            if dist3(joint.translation, edited.translation) > JOINT_DELTA_THRESHOLD {
                joint.translation = edited.translation;
                moved = true;
            }
            for axis in 0..3 {
                let delta = edited.rotation[axis] - joint.rotation[axis];
                if rotation_axis_changed(delta, JOINT_DELTA_THRESHOLD) {
                    joint.rotation[axis] = edited.rotation[axis];
                    moved = true;
                }
            }
            if dist3(joint.scale, edited.scale) > JOINT_DELTA_THRESHOLD {
                joint.scale = edited.scale;
                moved = true;
            }
            if moved {
                moved_joints += 1;
            }
        }
        tracing::info!(moved_joints, "calibrated joint transforms");

        renormalize_skin_weights(&mut document.lods);
        document.metadata.calibrated_with = Some(CalibrationMode::Calibrate);
        document.metadata.low_confidence.clear();
        document.validate()?;

        Ok(CalibrationOutcome {
            document,
            report: CalibrationReport {
                mode: CalibrationMode::Calibrate,
                moved_vertices,
                moved_joints,
                low_confidence: Vec::new(),
            },
        })
    }
}

/// Repair the per-vertex weight-sum invariant in place. Any drift the pass
/// introduced (or inherited) is corrected here, before validation, so the
/// evaluator never has to discover it.
pub(crate) fn renormalize_skin_weights(lods: &mut [MeshLod]) {
    for lod in lods {
        for influences in &mut lod.skin_weights {
            let sum: f32 = influences.iter().map(|jw| jw.weight).sum();
            if sum > 0.0 && (sum - 1.0).abs() > f32::EPSILON {
                for jw in influences.iter_mut() {
                    jw.weight /= sum;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/calibrate/calibrator.rs"]
mod tests;
