//! Overwrite mode: reconciliation across a topology change.
//!
//! Every per-vertex table is rebuilt through a UV correspondence map from
//! the new mesh back to the source document's reference chart, and joints
//! are relocated by transferring their UV anchors onto the new surface.
//! Interpolation plus nearest-point lookup makes the whole mode approximate;
//! the produced report says so, and any vertex the mapper could not place
//! confidently is carried in the document metadata for the editor to
//! surface.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};

use crate::{
    calibrate::calibrator::{
        renormalize_skin_weights, CalibrationOutcome, CalibrationReport, Calibrator,
        JOINT_DELTA_THRESHOLD, SHAPE_DELTA_THRESHOLD,
    },
    dna::model::{CalibrationMode, DnaDocument, LowConfidenceVertex, MeshLod},
    foundation::{
        error::{RigDnaError, RigDnaResult},
        math::{dist3, len3},
    },
    mapping::{
        correspondence::{joint_anchor_uvs, CorrespondenceMap},
        snapshot::MeshSnapshot,
    },
};

impl Calibrator {
    /// Reconcile a re-topologized edit into a new document.
    ///
    /// One mesh snapshot per LOD, each carrying the new mesh's UV chart.
    /// Positions, UVs, and triangulation come from the snapshots; skin
    /// weights and blend-shape deltas are resampled from the source through
    /// the correspondence map; joints are relocated via their UV anchors on
    /// LOD 0. The behavior graph is copied verbatim: its joint and channel
    /// tables are unchanged, and the per-vertex data it drives has been
    /// resampled to match.
    ///
    /// Fails with [`RigDnaError::Mapping`] when no correspondence can be
    /// built at all (missing UVs on either side); individual stray vertices
    /// never abort the pass, they are flagged instead.
    #[tracing::instrument(skip_all, fields(rig = source.name()))]
    pub fn overwrite(
        source: &DnaDocument,
        meshes: &[MeshSnapshot],
    ) -> RigDnaResult<CalibrationOutcome> {
        if meshes.len() != source.lods.len() {
            return Err(RigDnaError::index_mismatch(format!(
                "{} mesh snapshots supplied for {} LODs",
                meshes.len(),
                source.lods.len()
            )));
        }
        if source.lods.is_empty() {
            return Err(RigDnaError::mapping(
                "source document has no geometry to map against",
            ));
        }

        let mut document = source.clone();
        let mut low_confidence = Vec::new();
        let mut moved_vertices = 0usize;

        for (lod_index, (lod, target)) in source.lods.iter().zip(meshes).enumerate() {
            if target.uvs.len() != target.positions.len() {
                return Err(RigDnaError::mapping(format!(
                    "LOD {lod_index}: target mesh has {} UVs for {} vertices",
                    target.uvs.len(),
                    target.positions.len()
                )));
            }
            let reference = MeshSnapshot {
                positions: lod.positions.clone(),
                uvs: lod.uvs.clone(),
                triangles: lod.triangles.clone(),
            };
            let map = CorrespondenceMap::build(&reference, &target.uvs)?;

            let skin_weights = map.resample_skin_weights(&lod.skin_weights)?;
            resample_blend_targets(&mut document, source, lod_index, lod, &map)?;

            for vertex in map.low_confidence_indices() {
                low_confidence.push(LowConfidenceVertex {
                    lod: lod_index as u16,
                    vertex,
                });
            }
            moved_vertices += target.positions.len();

            document.lods[lod_index] = MeshLod {
                positions: target.positions.clone(),
                uvs: target.uvs.clone(),
                triangles: target.triangles.clone(),
                skin_weights,
            };
        }

        let moved_joints = relocate_joints(&mut document, source, &meshes[0])?;
        tracing::info!(
            moved_joints,
            low_confidence = low_confidence.len(),
            "overwrite pass resampled document"
        );

        renormalize_skin_weights(&mut document.lods);
        document.metadata.calibrated_with = Some(CalibrationMode::Overwrite);
        document.metadata.low_confidence = low_confidence.clone();
        document.validate()?;

        Ok(CalibrationOutcome {
            document,
            report: CalibrationReport {
                mode: CalibrationMode::Overwrite,
                moved_vertices,
                moved_joints,
                low_confidence,
            },
        })
    }
}

fn resample_blend_targets(
    document: &mut DnaDocument,
    source: &DnaDocument,
    lod_index: usize,
    lod: &MeshLod,
    map: &CorrespondenceMap,
) -> RigDnaResult<()> {
    for (index, src_target) in source.blend_shape_targets.iter().enumerate() {
        if usize::from(src_target.lod) != lod_index {
            continue;
        }
        let mut dense = vec![[0.0f32; 3]; lod.positions.len()];
        for (&v, &d) in src_target.vertices.iter().zip(&src_target.deltas) {
            dense[v as usize] = d;
        }
        let resampled = map.resample_vec3(&dense)?;

        let mut vertices = Vec::new();
        let mut deltas = Vec::new();
        for (v, &d) in resampled.iter().enumerate() {
            if len3(d) > SHAPE_DELTA_THRESHOLD {
                vertices.push(v as u32);
                deltas.push(d);
            }
        }
        let out = &mut document.blend_shape_targets[index];
        out.vertices = vertices;
        out.deltas = deltas;
    }
    Ok(())
}

/// Transfer each skinned joint's UV anchor onto the new LOD-0 surface, then
/// convert the world-space result back to a parent-local translation in
/// hierarchy order (parents first, which the document's topological-order
/// invariant guarantees). Rotation and scale keep the source local values.
fn relocate_joints(
    document: &mut DnaDocument,
    source: &DnaDocument,
    target0: &MeshSnapshot,
) -> RigDnaResult<usize> {
    let joint_count = source.joints.len();
    let anchors = joint_anchor_uvs(&source.lods[0], joint_count);
    let queries: Vec<[f32; 2]> = anchors.iter().filter_map(|a| *a).collect();
    if queries.is_empty() {
        return Ok(0);
    }

    let map = CorrespondenceMap::build(target0, &queries)?;
    let transferred = map.resample_vec3(&target0.positions)?;

    let mut world_target: Vec<Option<[f32; 3]>> = vec![None; joint_count];
    let mut next = 0usize;
    for (j, anchor) in anchors.iter().enumerate() {
        if anchor.is_some() {
            world_target[j] = Some(transferred[next]);
            next += 1;
        }
    }

    let mut world: Vec<Isometry3<f64>> = Vec::with_capacity(joint_count);
    let mut moved = 0usize;
    for j in 0..joint_count {
        let src = &source.joints[j];
        let parent_iso = if src.parent >= 0 {
            world[src.parent as usize]
        } else {
            Isometry3::identity()
        };

        let new_world = match world_target[j] {
            Some(p) => Point3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2])),
            None => {
                parent_iso
                    * Point3::new(
                        f64::from(src.translation[0]),
                        f64::from(src.translation[1]),
                        f64::from(src.translation[2]),
                    )
            }
        };
        let local = parent_iso.inverse_transform_point(&new_world);
        let local_t = [local.x as f32, local.y as f32, local.z as f32];
        if dist3(local_t, src.translation) > JOINT_DELTA_THRESHOLD {
            document.joints[j].translation = local_t;
            moved += 1;
        }

        // Children compose against the stored value, so the drift guard
        // above stays consistent through the hierarchy.
        let stored = document.joints[j].translation;
        let rotation = euler_deg_to_quat(src.rotation);
        let local_iso = Isometry3::from_parts(
            Translation3::new(
                f64::from(stored[0]),
                f64::from(stored[1]),
                f64::from(stored[2]),
            ),
            rotation,
        );
        world.push(parent_iso * local_iso);
    }
    Ok(moved)
}

/// Euler XYZ degrees (X applied first) to a quaternion.
fn euler_deg_to_quat(deg: [f32; 3]) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(
        f64::from(deg[0]).to_radians(),
        f64::from(deg[1]).to_radians(),
        f64::from(deg[2]).to_radians(),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/calibrate/overwrite.rs"]
mod tests;
