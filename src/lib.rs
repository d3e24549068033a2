//! Rigdna is a character-rig DNA toolkit.
//!
//! A DNA document is the complete description of one character rig: a skinned
//! mesh per level of detail, a joint hierarchy, sparse blend-shape deltas,
//! animated texture-mask outputs, and the behavior graph that maps high-level
//! control values onto all of them. Rigdna covers the whole lifecycle of that
//! document:
//!
//! 1. **Load/save**: [`DnaDocument::from_bytes`] / [`DnaDocument::to_bytes`],
//!    a length-prefixed little-endian section container that round-trips
//!    exactly and rejects malformed graphs at load time.
//! 2. **Calibrate**: [`Calibrator`] reconciles edited geometry back into a
//!    document: index-stable edits via `calibrate`, re-topologized meshes via
//!    `overwrite` plus a UV-space [`CorrespondenceMap`].
//! 3. **Evaluate**: [`RigLogic`] precomputes the behavior graph once, then
//!    [`RigInstance::evaluate`] turns a control vector into joint deltas and
//!    blend-shape/animated-map weights every tick, allocation-free.
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: evaluation is a pure function of
//!   (document, control vector) with a fixed stage order.
//! - **No error path per tick**: dangling references and expression cycles
//!   are rejected when the document is loaded, never during evaluation.
//! - **Documents are immutable**: the calibrator always produces a new
//!   document version, keeping the prior state available for diff/rollback.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod calibrate;
mod dna;
mod eval;
mod foundation;
mod mapping;

pub use calibrate::calibrator::{CalibrationOutcome, CalibrationReport, Calibrator};
pub use dna::behavior::{
    AnimatedMapBehavior, BehaviorGraph, BlendShapeBehavior, ControlDef, InputRef, JointBehavior,
    PoseJointDelta, PoseShapeWeight, PsdCombiner, PsdExpression, RbfKernel, RbfPose, RbfSolver,
    ScalarCurve, ScalarKey, VectorCurve, VectorKey,
};
pub use dna::codec::{DNA_MAGIC, DNA_VERSION};
pub use dna::model::{
    AnimatedMap, BlendShapeChannel, BlendShapeTarget, CalibrationMode, DnaDocument,
    DocumentMetadata, Joint, JointWeight, LowConfidenceVertex, MAX_SKIN_INFLUENCES, MeshLod,
    SkinInfluences,
};
pub use eval::riglogic::{JointDelta, RigInstance, RigLogic, RigOutputs};
pub use foundation::error::{RigDnaError, RigDnaResult};
pub use mapping::correspondence::{
    CorrespondenceMap, LOW_CONFIDENCE_UV_DISTANCE, SurfaceHit, joint_anchor_uvs,
};
pub use mapping::snapshot::{JointSnapshot, MeshSnapshot, SkeletonSnapshot};
