//! UV-space nearest-point correspondence between two mesh topologies.
//!
//! The mapper assumes both meshes share a single, non-overlapping UV chart
//! covering the region of interest. That precondition is documented, not
//! checked: overlapping or missing islands degrade the result rather than
//! fail it. Queries that land far off the reference chart are still mapped
//! (nearest edge projection) but flagged low-confidence for downstream
//! diagnostics; the build never aborts over a minority of stray vertices.

use rayon::prelude::*;

use crate::{
    dna::model::{JointWeight, MeshLod, SkinInfluences, MAX_SKIN_INFLUENCES},
    foundation::error::{RigDnaError, RigDnaResult},
    mapping::{grid::UvGrid, snapshot::MeshSnapshot},
};

/// UV distance beyond which a mapped vertex is flagged low-confidence.
///
/// Charts in this pipeline live in the unit square; 0.05 UV units is well
/// past any seam gap while still catching geometry that has no reference
/// coverage at all.
pub const LOW_CONFIDENCE_UV_DISTANCE: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
/// Where one query UV landed on the reference chart.
pub struct SurfaceHit {
    /// Reference triangle index.
    pub face: u32,
    /// Barycentric coordinates on that triangle, clamped to its interior.
    pub bary: [f32; 3],
    /// UV distance from the query point to the mapped point.
    pub uv_distance: f32,
    /// Whether `uv_distance` exceeded [`LOW_CONFIDENCE_UV_DISTANCE`].
    pub low_confidence: bool,
}

/// A per-query mapping onto a reference mesh, built once per overwrite or
/// auto-fit operation and discarded afterwards (it is not part of the DNA
/// document).
#[derive(Debug)]
pub struct CorrespondenceMap {
    triangles: Vec<[u32; 3]>,
    vertex_count: usize,
    hits: Vec<SurfaceHit>,
}

impl CorrespondenceMap {
    /// Map every query UV to its nearest point on the reference chart.
    ///
    /// Fails with [`RigDnaError::Mapping`] only when the reference cannot be
    /// searched at all: no UVs, no triangulation, or a UV table that does not
    /// match the reference vertex count.
    #[tracing::instrument(skip_all, fields(queries = query_uvs.len(), triangles = reference.triangles.len()))]
    pub fn build(reference: &MeshSnapshot, query_uvs: &[[f32; 2]]) -> RigDnaResult<Self> {
        if reference.uvs.is_empty() {
            return Err(RigDnaError::mapping("reference mesh carries no UV data"));
        }
        if reference.uvs.len() != reference.positions.len() {
            return Err(RigDnaError::mapping(format!(
                "reference UV table length {} does not match vertex count {}",
                reference.uvs.len(),
                reference.positions.len()
            )));
        }
        if reference.triangles.is_empty() {
            return Err(RigDnaError::mapping("reference mesh has no triangulation"));
        }
        if let Some(tri) = reference
            .triangles
            .iter()
            .find(|tri| tri.iter().any(|&v| v as usize >= reference.positions.len()))
        {
            return Err(RigDnaError::mapping(format!(
                "reference triangle {tri:?} references a vertex out of range"
            )));
        }

        let grid = UvGrid::build(&reference.uvs, &reference.triangles);
        // Each query is independent; rayon's indexed collect keeps result
        // order identical to input order, so the parallel build stays
        // deterministic.
        let hits: Vec<SurfaceHit> = query_uvs
            .par_iter()
            .map(|&uv| nearest_on_chart(&grid, &reference.uvs, &reference.triangles, uv))
            .collect();

        let low = hits.iter().filter(|h| h.low_confidence).count();
        if low > 0 {
            tracing::warn!(
                low_confidence = low,
                total = hits.len(),
                "some queries fell outside the reference chart"
            );
        }

        Ok(Self {
            triangles: reference.triangles.clone(),
            vertex_count: reference.positions.len(),
            hits,
        })
    }

    /// Per-query hits, in query order.
    pub fn hits(&self) -> &[SurfaceHit] {
        &self.hits
    }

    /// Indices of queries flagged low-confidence.
    pub fn low_confidence_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.hits
            .iter()
            .enumerate()
            .filter(|(_, h)| h.low_confidence)
            .map(|(i, _)| i as u32)
    }

    /// Resample a per-reference-vertex vector table onto the query ordering
    /// by barycentric interpolation.
    pub fn resample_vec3(&self, table: &[[f32; 3]]) -> RigDnaResult<Vec<[f32; 3]>> {
        self.check_table_len(table.len())?;
        Ok(self
            .hits
            .iter()
            .map(|hit| {
                let [a, b, c] = self.corners(hit);
                let mut out = [0.0f32; 3];
                for axis in 0..3 {
                    out[axis] = hit.bary[0] * table[a][axis]
                        + hit.bary[1] * table[b][axis]
                        + hit.bary[2] * table[c][axis];
                }
                out
            })
            .collect())
    }

    /// Resample per-reference-vertex skin influences onto the query ordering.
    ///
    /// Corner influences are blended by barycentric weight, truncated to the
    /// [`MAX_SKIN_INFLUENCES`] strongest (ties broken toward the lower joint
    /// index), and renormalized to sum to 1.
    pub fn resample_skin_weights(
        &self,
        table: &[SkinInfluences],
    ) -> RigDnaResult<Vec<SkinInfluences>> {
        self.check_table_len(table.len())?;
        Ok(self
            .hits
            .iter()
            .map(|hit| {
                let [a, b, c] = self.corners(hit);
                let mut accumulated = std::collections::BTreeMap::<u16, f32>::new();
                for (corner, weight) in [(a, hit.bary[0]), (b, hit.bary[1]), (c, hit.bary[2])] {
                    if weight <= 0.0 {
                        continue;
                    }
                    for jw in &table[corner] {
                        *accumulated.entry(jw.joint).or_insert(0.0) += jw.weight * weight;
                    }
                }
                let mut influences: Vec<JointWeight> = accumulated
                    .into_iter()
                    .map(|(joint, weight)| JointWeight { joint, weight })
                    .collect();
                influences.sort_by(|x, y| {
                    y.weight
                        .total_cmp(&x.weight)
                        .then_with(|| x.joint.cmp(&y.joint))
                });
                influences.truncate(MAX_SKIN_INFLUENCES);
                influences.sort_by_key(|jw| jw.joint);
                let sum: f32 = influences.iter().map(|jw| jw.weight).sum();
                let mut out = SkinInfluences::new();
                if sum > 0.0 {
                    for jw in influences {
                        out.push(JointWeight {
                            joint: jw.joint,
                            weight: jw.weight / sum,
                        });
                    }
                }
                out
            })
            .collect())
    }

    fn corners(&self, hit: &SurfaceHit) -> [usize; 3] {
        let tri = self.triangles[hit.face as usize];
        [tri[0] as usize, tri[1] as usize, tri[2] as usize]
    }

    fn check_table_len(&self, len: usize) -> RigDnaResult<()> {
        if len != self.vertex_count {
            return Err(RigDnaError::mapping(format!(
                "table length {len} does not match reference vertex count {}",
                self.vertex_count
            )));
        }
        Ok(())
    }
}

/// UV-space anchor per joint: the skin-weight-weighted mean UV of the
/// vertices the joint influences. Joints with no skin influence on this LOD
/// get `None` and keep their reference-relative placement during overwrite.
pub fn joint_anchor_uvs(lod: &MeshLod, joint_count: usize) -> Vec<Option<[f32; 2]>> {
    let mut sums = vec![[0.0f64; 2]; joint_count];
    let mut totals = vec![0.0f64; joint_count];
    if lod.uvs.len() == lod.positions.len() {
        for (vertex, influences) in lod.skin_weights.iter().enumerate() {
            let uv = lod.uvs[vertex];
            for jw in influences {
                let j = usize::from(jw.joint);
                if j >= joint_count {
                    continue;
                }
                let w = f64::from(jw.weight);
                sums[j][0] += f64::from(uv[0]) * w;
                sums[j][1] += f64::from(uv[1]) * w;
                totals[j] += w;
            }
        }
    }
    sums.iter()
        .zip(&totals)
        .map(|(sum, &total)| {
            if total > 1e-9 {
                Some([(sum[0] / total) as f32, (sum[1] / total) as f32])
            } else {
                None
            }
        })
        .collect()
}

fn nearest_on_chart(
    grid: &UvGrid,
    uvs: &[[f32; 2]],
    triangles: &[[u32; 3]],
    query: [f32; 2],
) -> SurfaceHit {
    let center = grid.cell_of(query);
    let mut best: Option<(u32, [f32; 3], f32)> = None;

    let mut ring = 0usize;
    loop {
        let visited = grid.for_ring(center, ring, |candidates| {
            for &t in candidates {
                let tri = triangles[t as usize];
                let (bary, dist) = closest_point_on_triangle(
                    query,
                    uvs[tri[0] as usize],
                    uvs[tri[1] as usize],
                    uvs[tri[2] as usize],
                );
                let better = match best {
                    Some((bt, _, bd)) => dist < bd || (dist == bd && t < bt),
                    None => true,
                };
                if better {
                    best = Some((t, bary, dist));
                }
            }
        });
        if !visited && ring > 0 {
            break; // ring is entirely off-grid: every cell has been seen
        }
        if let Some((_, _, dist)) = best {
            if dist <= grid.ring_min_distance(ring + 1) {
                break; // no farther ring can beat the current best
            }
        }
        ring += 1;
    }

    // triangles is non-empty (checked at build), so best is always set once
    // the loop has visited every cell.
    let (face, bary, uv_distance) = best.unwrap_or((0, [1.0, 0.0, 0.0], f32::INFINITY));
    SurfaceHit {
        face,
        bary,
        uv_distance,
        low_confidence: uv_distance > LOW_CONFIDENCE_UV_DISTANCE,
    }
}

/// Closest point on a UV triangle, returned as clamped barycentric
/// coordinates plus the distance from the query to that point.
fn closest_point_on_triangle(
    p: [f32; 2],
    a: [f32; 2],
    b: [f32; 2],
    c: [f32; 2],
) -> ([f32; 3], f32) {
    // Twice the signed area; near-zero means a degenerate (sliver) triangle
    // and we fall back to edge projections directly.
    let area2 = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
    if area2.abs() > f32::EPSILON {
        let inv = 1.0 / area2;
        let w0 = ((b[0] - p[0]) * (c[1] - p[1]) - (b[1] - p[1]) * (c[0] - p[0])) * inv;
        let w1 = ((c[0] - p[0]) * (a[1] - p[1]) - (c[1] - p[1]) * (a[0] - p[0])) * inv;
        let w2 = 1.0 - w0 - w1;
        if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
            return ([w0, w1, w2], 0.0);
        }
    }

    // Outside (or degenerate): closest point lies on one of the edges.
    let mut best = ([1.0f32, 0.0, 0.0], f32::INFINITY);
    for (i, j, va, vb) in [(0usize, 1usize, a, b), (1, 2, b, c), (2, 0, c, a)] {
        let (t, dist) = project_on_segment(p, va, vb);
        if dist < best.1 {
            let mut bary = [0.0f32; 3];
            bary[i] = 1.0 - t;
            bary[j] = t;
            best = (bary, dist);
        }
    }
    best
}

fn project_on_segment(p: [f32; 2], a: [f32; 2], b: [f32; 2]) -> (f32, f32) {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let len2 = ab[0] * ab[0] + ab[1] * ab[1];
    let t = if len2 > 0.0 {
        ((ap[0] * ab[0] + ap[1] * ab[1]) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = [a[0] + ab[0] * t, a[1] + ab[1] * t];
    let d = [p[0] - closest[0], p[1] - closest[1]];
    (t, (d[0] * d[0] + d[1] * d[1]).sqrt())
}

#[cfg(test)]
#[path = "../../tests/unit/mapping/correspondence.rs"]
mod tests;
