//! Immutable snapshots of editor-side geometry.
//!
//! The calibrator never talks to a live scene graph; the editor collaborator
//! extracts positions, UVs, and joint transforms into these plain values and
//! passes them in. That keeps the core decoupled from any particular editor's
//! object model and makes calibration inputs trivially snapshottable.

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// One mesh as extracted from the editor: positions, an optional UV chart,
/// and the triangulation that goes with it.
pub struct MeshSnapshot {
    /// World/component-space vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex UV coordinates; may be empty when no chart exists (only
    /// the Overwrite path needs UVs).
    pub uvs: Vec<[f32; 2]>,
    /// Triangulation, indices into `positions`.
    pub triangles: Vec<[u32; 3]>,
}

impl MeshSnapshot {
    /// Number of vertices in the snapshot.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// One joint's edited local bind transform.
pub struct JointSnapshot {
    /// Joint name; matched against the document by name in Calibrate mode.
    pub name: String,
    /// Parent index within the snapshot, `-1` for a root.
    pub parent: i32,
    /// Local bind translation.
    pub translation: [f32; 3],
    /// Local bind rotation, Euler XYZ degrees.
    pub rotation: [f32; 3],
    /// Local bind scale.
    pub scale: [f32; 3],
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// The edited skeleton, joints in the same topological order convention as
/// the document (parents precede children).
pub struct SkeletonSnapshot {
    /// Edited joints.
    pub joints: Vec<JointSnapshot>,
}
