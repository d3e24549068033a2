//! Binary DNA container.
//!
//! Layout: 4-byte magic, `u16` version, then eight sections in fixed order:
//! descriptor, joints, geometry, blend-shape channels, blend-shape targets,
//! animated maps, behavior graph, metadata. Every section is length-prefixed
//! (`u32`) so a reader can locate any section without decoding the ones
//! before it. All scalars are little-endian; strings are `u16` length + UTF-8.

use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;

use crate::{
    dna::behavior::{
        AnimatedMapBehavior, BehaviorGraph, BlendShapeBehavior, ControlDef, InputRef,
        JointBehavior, PoseJointDelta, PoseShapeWeight, PsdCombiner, PsdExpression, RbfKernel,
        RbfPose, RbfSolver, ScalarCurve, ScalarKey, VectorCurve, VectorKey,
    },
    dna::model::{
        AnimatedMap, BlendShapeChannel, BlendShapeTarget, CalibrationMode, DnaDocument,
        DocumentMetadata, Joint, JointWeight, LowConfidenceVertex, MeshLod,
    },
    foundation::error::{RigDnaError, RigDnaResult},
};

/// Magic bytes at offset zero of every DNA file.
pub const DNA_MAGIC: [u8; 4] = *b"RDNA";

/// Container version this build reads and writes.
pub const DNA_VERSION: u16 = 1;

const SECTION_COUNT: usize = 8;

impl DnaDocument {
    /// Parse a binary DNA container and validate the resulting document.
    ///
    /// Structural failures (bad magic, truncation, record overrun, invalid
    /// UTF-8) surface as [`RigDnaError::Format`]; an unknown container
    /// version as [`RigDnaError::UnsupportedVersion`]; graph problems as
    /// [`RigDnaError::DanglingReference`] / [`RigDnaError::CyclicExpression`].
    #[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
    pub fn from_bytes(bytes: &[u8]) -> RigDnaResult<Self> {
        let mut rd = bytes;
        let mut magic = [0u8; 4];
        read_exact(&mut rd, &mut magic)?;
        if magic != DNA_MAGIC {
            return Err(RigDnaError::format("not a DNA file (bad magic)"));
        }
        let version = read_u16(&mut rd)?;
        if version != DNA_VERSION {
            return Err(RigDnaError::UnsupportedVersion {
                found: version,
                supported: DNA_VERSION,
            });
        }

        let mut sections: Vec<&[u8]> = Vec::with_capacity(SECTION_COUNT);
        for index in 0..SECTION_COUNT {
            let len = read_u32(&mut rd)? as usize;
            if rd.len() < len {
                return Err(RigDnaError::format(format!(
                    "section {index} claims {len} bytes but only {} remain",
                    rd.len()
                )));
            }
            let (payload, rest) = rd.split_at(len);
            sections.push(payload);
            rd = rest;
        }
        if !rd.is_empty() {
            return Err(RigDnaError::format(format!(
                "{} trailing bytes after the last section",
                rd.len()
            )));
        }

        let doc = Self {
            name: in_section(sections[0], 0, read_string)?,
            joints: in_section(sections[1], 1, read_joints)?,
            lods: in_section(sections[2], 2, read_geometry)?,
            blend_shape_channels: in_section(sections[3], 3, read_channels)?,
            blend_shape_targets: in_section(sections[4], 4, read_targets)?,
            animated_maps: in_section(sections[5], 5, read_maps)?,
            behavior: in_section(sections[6], 6, read_behavior)?,
            metadata: in_section(sections[7], 7, read_metadata)?,
        };
        doc.validate()?;
        tracing::debug!(
            joints = doc.joints.len(),
            lods = doc.lods.len(),
            controls = doc.behavior.controls.len(),
            "loaded DNA document"
        );
        Ok(doc)
    }

    /// Serialize into the binary container. Exact inverse of
    /// [`DnaDocument::from_bytes`] for any valid document.
    pub fn to_bytes(&self) -> RigDnaResult<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&DNA_MAGIC);
        out.write_u16::<LittleEndian>(DNA_VERSION)?;

        let sections: [Vec<u8>; SECTION_COUNT] = [
            {
                let mut s = Vec::new();
                write_string(&mut s, &self.name)?;
                s
            },
            write_joints(&self.joints)?,
            write_geometry(&self.lods)?,
            write_channels(&self.blend_shape_channels)?,
            write_targets(&self.blend_shape_targets)?,
            write_maps(&self.animated_maps)?,
            write_behavior(&self.behavior)?,
            write_metadata(&self.metadata)?,
        ];
        for section in sections {
            out.write_u32::<LittleEndian>(section.len() as u32)?;
            out.extend_from_slice(&section);
        }
        Ok(out)
    }

    /// Read and parse a DNA file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> RigDnaResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Serialize and write a DNA file to disk.
    pub fn to_file(&self, path: impl AsRef<Path>) -> RigDnaResult<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

fn in_section<T>(
    payload: &[u8],
    index: usize,
    parse: impl FnOnce(&mut &[u8]) -> RigDnaResult<T>,
) -> RigDnaResult<T> {
    let mut rd = payload;
    let value = parse(&mut rd)?;
    if !rd.is_empty() {
        return Err(RigDnaError::format(format!(
            "section {index}: {} unread bytes at end of section",
            rd.len()
        )));
    }
    Ok(value)
}

// ---- primitive readers -----------------------------------------------------

fn truncated() -> RigDnaError {
    RigDnaError::format("unexpected end of data")
}

fn read_exact(rd: &mut &[u8], buf: &mut [u8]) -> RigDnaResult<()> {
    if rd.len() < buf.len() {
        return Err(truncated());
    }
    let (head, rest) = rd.split_at(buf.len());
    buf.copy_from_slice(head);
    *rd = rest;
    Ok(())
}

fn read_u8(rd: &mut &[u8]) -> RigDnaResult<u8> {
    ReadBytesExt::read_u8(rd).map_err(|_| truncated())
}

fn read_u16(rd: &mut &[u8]) -> RigDnaResult<u16> {
    rd.read_u16::<LittleEndian>().map_err(|_| truncated())
}

fn read_u32(rd: &mut &[u8]) -> RigDnaResult<u32> {
    rd.read_u32::<LittleEndian>().map_err(|_| truncated())
}

fn read_i32(rd: &mut &[u8]) -> RigDnaResult<i32> {
    rd.read_i32::<LittleEndian>().map_err(|_| truncated())
}

fn read_f32(rd: &mut &[u8]) -> RigDnaResult<f32> {
    rd.read_f32::<LittleEndian>().map_err(|_| truncated())
}

fn read_vec2(rd: &mut &[u8]) -> RigDnaResult<[f32; 2]> {
    Ok([read_f32(rd)?, read_f32(rd)?])
}

fn read_vec3(rd: &mut &[u8]) -> RigDnaResult<[f32; 3]> {
    Ok([read_f32(rd)?, read_f32(rd)?, read_f32(rd)?])
}

fn read_string(rd: &mut &[u8]) -> RigDnaResult<String> {
    let len = usize::from(read_u16(rd)?);
    let mut buf = vec![0u8; len];
    read_exact(rd, &mut buf)?;
    String::from_utf8(buf).map_err(|_| RigDnaError::format("string is not valid UTF-8"))
}

/// Guard against a corrupt count making us pre-allocate gigabytes: the count
/// must be representable in the bytes that remain.
fn read_count(rd: &mut &[u8], min_record_bytes: usize) -> RigDnaResult<usize> {
    let count = read_u32(rd)? as usize;
    if min_record_bytes > 0 && count > rd.len() / min_record_bytes {
        return Err(RigDnaError::format(format!(
            "count {count} exceeds remaining section bytes"
        )));
    }
    Ok(count)
}

// ---- primitive writers -----------------------------------------------------

fn write_string(wr: &mut Vec<u8>, s: &str) -> RigDnaResult<()> {
    if s.len() > usize::from(u16::MAX) {
        return Err(RigDnaError::format(format!(
            "string of {} bytes exceeds the u16 length prefix",
            s.len()
        )));
    }
    wr.write_u16::<LittleEndian>(s.len() as u16)?;
    wr.extend_from_slice(s.as_bytes());
    Ok(())
}

fn write_vec2(wr: &mut Vec<u8>, v: [f32; 2]) -> RigDnaResult<()> {
    for c in v {
        wr.write_f32::<LittleEndian>(c)?;
    }
    Ok(())
}

fn write_vec3(wr: &mut Vec<u8>, v: [f32; 3]) -> RigDnaResult<()> {
    for c in v {
        wr.write_f32::<LittleEndian>(c)?;
    }
    Ok(())
}

// ---- joints ----------------------------------------------------------------

fn read_joints(rd: &mut &[u8]) -> RigDnaResult<Vec<Joint>> {
    let count = read_count(rd, 2 + 4 + 36)?;
    let mut joints = Vec::with_capacity(count);
    for _ in 0..count {
        joints.push(Joint {
            name: read_string(rd)?,
            parent: read_i32(rd)?,
            translation: read_vec3(rd)?,
            rotation: read_vec3(rd)?,
            scale: read_vec3(rd)?,
        });
    }
    Ok(joints)
}

fn write_joints(joints: &[Joint]) -> RigDnaResult<Vec<u8>> {
    let mut wr = Vec::new();
    wr.write_u32::<LittleEndian>(joints.len() as u32)?;
    for joint in joints {
        write_string(&mut wr, &joint.name)?;
        wr.write_i32::<LittleEndian>(joint.parent)?;
        write_vec3(&mut wr, joint.translation)?;
        write_vec3(&mut wr, joint.rotation)?;
        write_vec3(&mut wr, joint.scale)?;
    }
    Ok(wr)
}

// ---- geometry ----------------------------------------------------------------

fn read_geometry(rd: &mut &[u8]) -> RigDnaResult<Vec<MeshLod>> {
    let lod_count = read_count(rd, 12)?;
    let mut lods = Vec::with_capacity(lod_count);
    for _ in 0..lod_count {
        let vertex_count = read_count(rd, 12)?;
        let mut positions = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            positions.push(read_vec3(rd)?);
        }
        let uv_count = read_count(rd, 8)?;
        let mut uvs = Vec::with_capacity(uv_count);
        for _ in 0..uv_count {
            uvs.push(read_vec2(rd)?);
        }
        let tri_count = read_count(rd, 12)?;
        let mut triangles = Vec::with_capacity(tri_count);
        for _ in 0..tri_count {
            triangles.push([read_u32(rd)?, read_u32(rd)?, read_u32(rd)?]);
        }
        let mut skin_weights = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            let influence_count = usize::from(read_u8(rd)?);
            let mut influences = SmallVec::with_capacity(influence_count);
            for _ in 0..influence_count {
                influences.push(JointWeight {
                    joint: read_u16(rd)?,
                    weight: read_f32(rd)?,
                });
            }
            skin_weights.push(influences);
        }
        lods.push(MeshLod {
            positions,
            uvs,
            triangles,
            skin_weights,
        });
    }
    Ok(lods)
}

fn write_geometry(lods: &[MeshLod]) -> RigDnaResult<Vec<u8>> {
    let mut wr = Vec::new();
    wr.write_u32::<LittleEndian>(lods.len() as u32)?;
    for lod in lods {
        wr.write_u32::<LittleEndian>(lod.positions.len() as u32)?;
        for &p in &lod.positions {
            write_vec3(&mut wr, p)?;
        }
        wr.write_u32::<LittleEndian>(lod.uvs.len() as u32)?;
        for &uv in &lod.uvs {
            write_vec2(&mut wr, uv)?;
        }
        wr.write_u32::<LittleEndian>(lod.triangles.len() as u32)?;
        for tri in &lod.triangles {
            for &v in tri {
                wr.write_u32::<LittleEndian>(v)?;
            }
        }
        for influences in &lod.skin_weights {
            wr.write_u8(influences.len() as u8)?;
            for jw in influences {
                wr.write_u16::<LittleEndian>(jw.joint)?;
                wr.write_f32::<LittleEndian>(jw.weight)?;
            }
        }
    }
    Ok(wr)
}

// ---- blend shapes and maps ---------------------------------------------------

fn read_channels(rd: &mut &[u8]) -> RigDnaResult<Vec<BlendShapeChannel>> {
    let count = read_count(rd, 2)?;
    let mut channels = Vec::with_capacity(count);
    for _ in 0..count {
        channels.push(BlendShapeChannel {
            name: read_string(rd)?,
        });
    }
    Ok(channels)
}

fn write_channels(channels: &[BlendShapeChannel]) -> RigDnaResult<Vec<u8>> {
    let mut wr = Vec::new();
    wr.write_u32::<LittleEndian>(channels.len() as u32)?;
    for channel in channels {
        write_string(&mut wr, &channel.name)?;
    }
    Ok(wr)
}

fn read_targets(rd: &mut &[u8]) -> RigDnaResult<Vec<BlendShapeTarget>> {
    let count = read_count(rd, 8)?;
    let mut targets = Vec::with_capacity(count);
    for _ in 0..count {
        let channel = read_u16(rd)?;
        let lod = read_u16(rd)?;
        let entries = read_count(rd, 16)?;
        let mut vertices = Vec::with_capacity(entries);
        for _ in 0..entries {
            vertices.push(read_u32(rd)?);
        }
        let mut deltas = Vec::with_capacity(entries);
        for _ in 0..entries {
            deltas.push(read_vec3(rd)?);
        }
        targets.push(BlendShapeTarget {
            channel,
            lod,
            vertices,
            deltas,
        });
    }
    Ok(targets)
}

fn write_targets(targets: &[BlendShapeTarget]) -> RigDnaResult<Vec<u8>> {
    let mut wr = Vec::new();
    wr.write_u32::<LittleEndian>(targets.len() as u32)?;
    for target in targets {
        wr.write_u16::<LittleEndian>(target.channel)?;
        wr.write_u16::<LittleEndian>(target.lod)?;
        wr.write_u32::<LittleEndian>(target.vertices.len() as u32)?;
        for &v in &target.vertices {
            wr.write_u32::<LittleEndian>(v)?;
        }
        for &d in &target.deltas {
            write_vec3(&mut wr, d)?;
        }
    }
    Ok(wr)
}

fn read_maps(rd: &mut &[u8]) -> RigDnaResult<Vec<AnimatedMap>> {
    let count = read_count(rd, 2)?;
    let mut maps = Vec::with_capacity(count);
    for _ in 0..count {
        maps.push(AnimatedMap {
            name: read_string(rd)?,
        });
    }
    Ok(maps)
}

fn write_maps(maps: &[AnimatedMap]) -> RigDnaResult<Vec<u8>> {
    let mut wr = Vec::new();
    wr.write_u32::<LittleEndian>(maps.len() as u32)?;
    for map in maps {
        write_string(&mut wr, &map.name)?;
    }
    Ok(wr)
}

// ---- behavior graph ----------------------------------------------------------

fn read_input(rd: &mut &[u8]) -> RigDnaResult<InputRef> {
    let tag = read_u8(rd)?;
    let index = read_u16(rd)?;
    match tag {
        0 => Ok(InputRef::Control(index)),
        1 => Ok(InputRef::Psd(index)),
        other => Err(RigDnaError::format(format!("unknown input tag {other}"))),
    }
}

fn write_input(wr: &mut Vec<u8>, input: InputRef) -> RigDnaResult<()> {
    let (tag, index) = match input {
        InputRef::Control(i) => (0u8, i),
        InputRef::Psd(i) => (1u8, i),
    };
    wr.write_u8(tag)?;
    wr.write_u16::<LittleEndian>(index)?;
    Ok(())
}

fn read_scalar_curve(rd: &mut &[u8]) -> RigDnaResult<ScalarCurve> {
    let count = read_count(rd, 8)?;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(ScalarKey {
            at: read_f32(rd)?,
            value: read_f32(rd)?,
        });
    }
    Ok(ScalarCurve { keys })
}

fn write_scalar_curve(wr: &mut Vec<u8>, curve: &ScalarCurve) -> RigDnaResult<()> {
    wr.write_u32::<LittleEndian>(curve.keys.len() as u32)?;
    for key in &curve.keys {
        wr.write_f32::<LittleEndian>(key.at)?;
        wr.write_f32::<LittleEndian>(key.value)?;
    }
    Ok(())
}

fn read_vector_curve(rd: &mut &[u8]) -> RigDnaResult<VectorCurve> {
    let count = read_count(rd, 16)?;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(VectorKey {
            at: read_f32(rd)?,
            value: read_vec3(rd)?,
        });
    }
    Ok(VectorCurve { keys })
}

fn write_vector_curve(wr: &mut Vec<u8>, curve: &VectorCurve) -> RigDnaResult<()> {
    wr.write_u32::<LittleEndian>(curve.keys.len() as u32)?;
    for key in &curve.keys {
        wr.write_f32::<LittleEndian>(key.at)?;
        write_vec3(wr, key.value)?;
    }
    Ok(())
}

fn read_kernel(rd: &mut &[u8]) -> RigDnaResult<RbfKernel> {
    match read_u8(rd)? {
        0 => Ok(RbfKernel::Gaussian {
            width: read_f32(rd)?,
        }),
        1 => Ok(RbfKernel::ThinPlate),
        2 => Ok(RbfKernel::Multiquadric { c: read_f32(rd)? }),
        3 => Ok(RbfKernel::InverseMultiquadric { c: read_f32(rd)? }),
        other => Err(RigDnaError::format(format!("unknown kernel tag {other}"))),
    }
}

fn write_kernel(wr: &mut Vec<u8>, kernel: RbfKernel) -> RigDnaResult<()> {
    match kernel {
        RbfKernel::Gaussian { width } => {
            wr.write_u8(0)?;
            wr.write_f32::<LittleEndian>(width)?;
        }
        RbfKernel::ThinPlate => wr.write_u8(1)?,
        RbfKernel::Multiquadric { c } => {
            wr.write_u8(2)?;
            wr.write_f32::<LittleEndian>(c)?;
        }
        RbfKernel::InverseMultiquadric { c } => {
            wr.write_u8(3)?;
            wr.write_f32::<LittleEndian>(c)?;
        }
    }
    Ok(())
}

fn read_behavior(rd: &mut &[u8]) -> RigDnaResult<BehaviorGraph> {
    let control_count = read_count(rd, 2)?;
    let mut controls = Vec::with_capacity(control_count);
    for _ in 0..control_count {
        controls.push(ControlDef {
            name: read_string(rd)?,
        });
    }

    let psd_count = read_count(rd, 7)?;
    let mut psd_expressions = Vec::with_capacity(psd_count);
    for _ in 0..psd_count {
        let name = read_string(rd)?;
        let combiner = match read_u8(rd)? {
            0 => PsdCombiner::Product,
            1 => PsdCombiner::Min,
            2 => PsdCombiner::Max,
            other => {
                return Err(RigDnaError::format(format!(
                    "unknown PSD combiner tag {other}"
                )));
            }
        };
        let input_count = read_count(rd, 3)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(read_input(rd)?);
        }
        psd_expressions.push(PsdExpression {
            name,
            combiner,
            inputs,
        });
    }

    let solver_count = read_count(rd, 11)?;
    let mut rbf_solvers = Vec::with_capacity(solver_count);
    for _ in 0..solver_count {
        let name = read_string(rd)?;
        let kernel = read_kernel(rd)?;
        let input_count = read_count(rd, 3)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(read_input(rd)?);
        }
        let pose_count = read_count(rd, 10)?;
        let mut poses = Vec::with_capacity(pose_count);
        for _ in 0..pose_count {
            let pose_name = read_string(rd)?;
            let mut target = Vec::with_capacity(input_count);
            for _ in 0..input_count {
                target.push(read_f32(rd)?);
            }
            let jd_count = read_count(rd, 38)?;
            let mut joint_deltas = Vec::with_capacity(jd_count);
            for _ in 0..jd_count {
                joint_deltas.push(PoseJointDelta {
                    joint: read_u16(rd)?,
                    translation: read_vec3(rd)?,
                    rotation: read_vec3(rd)?,
                    scale: read_vec3(rd)?,
                });
            }
            let sw_count = read_count(rd, 6)?;
            let mut shape_weights = Vec::with_capacity(sw_count);
            for _ in 0..sw_count {
                shape_weights.push(PoseShapeWeight {
                    channel: read_u16(rd)?,
                    weight: read_f32(rd)?,
                });
            }
            poses.push(RbfPose {
                name: pose_name,
                target,
                joint_deltas,
                shape_weights,
            });
        }
        rbf_solvers.push(RbfSolver {
            name,
            kernel,
            inputs,
            poses,
        });
    }

    let jb_count = read_count(rd, 17)?;
    let mut joint_behaviors = Vec::with_capacity(jb_count);
    for _ in 0..jb_count {
        joint_behaviors.push(JointBehavior {
            joint: read_u16(rd)?,
            input: read_input(rd)?,
            translation: read_vector_curve(rd)?,
            rotation: read_vector_curve(rd)?,
            scale: read_vector_curve(rd)?,
        });
    }

    let sb_count = read_count(rd, 9)?;
    let mut blend_shape_behaviors = Vec::with_capacity(sb_count);
    for _ in 0..sb_count {
        blend_shape_behaviors.push(BlendShapeBehavior {
            channel: read_u16(rd)?,
            input: read_input(rd)?,
            weights: read_scalar_curve(rd)?,
        });
    }

    let mb_count = read_count(rd, 9)?;
    let mut animated_map_behaviors = Vec::with_capacity(mb_count);
    for _ in 0..mb_count {
        animated_map_behaviors.push(AnimatedMapBehavior {
            map: read_u16(rd)?,
            input: read_input(rd)?,
            weights: read_scalar_curve(rd)?,
        });
    }

    Ok(BehaviorGraph {
        controls,
        psd_expressions,
        rbf_solvers,
        joint_behaviors,
        blend_shape_behaviors,
        animated_map_behaviors,
    })
}

fn write_behavior(graph: &BehaviorGraph) -> RigDnaResult<Vec<u8>> {
    let mut wr = Vec::new();
    wr.write_u32::<LittleEndian>(graph.controls.len() as u32)?;
    for control in &graph.controls {
        write_string(&mut wr, &control.name)?;
    }

    wr.write_u32::<LittleEndian>(graph.psd_expressions.len() as u32)?;
    for expr in &graph.psd_expressions {
        write_string(&mut wr, &expr.name)?;
        wr.write_u8(match expr.combiner {
            PsdCombiner::Product => 0,
            PsdCombiner::Min => 1,
            PsdCombiner::Max => 2,
        })?;
        wr.write_u32::<LittleEndian>(expr.inputs.len() as u32)?;
        for &input in &expr.inputs {
            write_input(&mut wr, input)?;
        }
    }

    wr.write_u32::<LittleEndian>(graph.rbf_solvers.len() as u32)?;
    for solver in &graph.rbf_solvers {
        write_string(&mut wr, &solver.name)?;
        write_kernel(&mut wr, solver.kernel)?;
        wr.write_u32::<LittleEndian>(solver.inputs.len() as u32)?;
        for &input in &solver.inputs {
            write_input(&mut wr, input)?;
        }
        wr.write_u32::<LittleEndian>(solver.poses.len() as u32)?;
        for pose in &solver.poses {
            write_string(&mut wr, &pose.name)?;
            for &coord in &pose.target {
                wr.write_f32::<LittleEndian>(coord)?;
            }
            wr.write_u32::<LittleEndian>(pose.joint_deltas.len() as u32)?;
            for jd in &pose.joint_deltas {
                wr.write_u16::<LittleEndian>(jd.joint)?;
                write_vec3(&mut wr, jd.translation)?;
                write_vec3(&mut wr, jd.rotation)?;
                write_vec3(&mut wr, jd.scale)?;
            }
            wr.write_u32::<LittleEndian>(pose.shape_weights.len() as u32)?;
            for sw in &pose.shape_weights {
                wr.write_u16::<LittleEndian>(sw.channel)?;
                wr.write_f32::<LittleEndian>(sw.weight)?;
            }
        }
    }

    wr.write_u32::<LittleEndian>(graph.joint_behaviors.len() as u32)?;
    for jb in &graph.joint_behaviors {
        wr.write_u16::<LittleEndian>(jb.joint)?;
        write_input(&mut wr, jb.input)?;
        write_vector_curve(&mut wr, &jb.translation)?;
        write_vector_curve(&mut wr, &jb.rotation)?;
        write_vector_curve(&mut wr, &jb.scale)?;
    }

    wr.write_u32::<LittleEndian>(graph.blend_shape_behaviors.len() as u32)?;
    for sb in &graph.blend_shape_behaviors {
        wr.write_u16::<LittleEndian>(sb.channel)?;
        write_input(&mut wr, sb.input)?;
        write_scalar_curve(&mut wr, &sb.weights)?;
    }

    wr.write_u32::<LittleEndian>(graph.animated_map_behaviors.len() as u32)?;
    for mb in &graph.animated_map_behaviors {
        wr.write_u16::<LittleEndian>(mb.map)?;
        write_input(&mut wr, mb.input)?;
        write_scalar_curve(&mut wr, &mb.weights)?;
    }

    Ok(wr)
}

// ---- metadata ------------------------------------------------------------------

fn read_metadata(rd: &mut &[u8]) -> RigDnaResult<DocumentMetadata> {
    let calibrated_with = match read_u8(rd)? {
        0 => None,
        1 => Some(CalibrationMode::Calibrate),
        2 => Some(CalibrationMode::Overwrite),
        other => {
            return Err(RigDnaError::format(format!(
                "unknown calibration mode tag {other}"
            )));
        }
    };
    let count = read_count(rd, 6)?;
    let mut low_confidence = Vec::with_capacity(count);
    for _ in 0..count {
        low_confidence.push(LowConfidenceVertex {
            lod: read_u16(rd)?,
            vertex: read_u32(rd)?,
        });
    }
    Ok(DocumentMetadata {
        calibrated_with,
        low_confidence,
    })
}

fn write_metadata(metadata: &DocumentMetadata) -> RigDnaResult<Vec<u8>> {
    let mut wr = Vec::new();
    wr.write_u8(match metadata.calibrated_with {
        None => 0,
        Some(CalibrationMode::Calibrate) => 1,
        Some(CalibrationMode::Overwrite) => 2,
    })?;
    wr.write_u32::<LittleEndian>(metadata.low_confidence.len() as u32)?;
    for lc in &metadata.low_confidence {
        wr.write_u16::<LittleEndian>(lc.lod)?;
        wr.write_u32::<LittleEndian>(lc.vertex)?;
    }
    Ok(wr)
}

#[cfg(test)]
#[path = "../../tests/unit/dna/codec.rs"]
mod tests;
