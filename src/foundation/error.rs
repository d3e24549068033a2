/// Convenience result type used across rigdna.
pub type RigDnaResult<T> = Result<T, RigDnaError>;

/// Top-level error taxonomy used by the document, calibration, and mapping APIs.
///
/// Evaluation has no error variant on purpose: graphs that could fail per tick
/// (dangling references, expression cycles) are rejected when the document is
/// loaded, so the per-frame path is pure numeric computation.
#[derive(thiserror::Error, Debug)]
pub enum RigDnaError {
    /// Malformed or truncated binary DNA input. Fatal, aborts the load.
    #[error("format error: {0}")]
    Format(String),

    /// The DNA file declares a container version this build does not read.
    #[error("unsupported DNA version {found} (this build reads up to {supported})")]
    UnsupportedVersion {
        /// Version found in the file header.
        found: u16,
        /// Highest version this build understands.
        supported: u16,
    },

    /// A behavior references a joint, channel, map, or control that does not
    /// exist in the corresponding table. Rejected at load, never at evaluation.
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// PSD expressions form a dependency cycle. Rejected at load.
    #[error("cyclic expression: {0}")]
    CyclicExpression(String),

    /// Calibrate-mode precondition violated: the edited geometry does not
    /// match the source document's vertex/joint indexing. The caller should
    /// switch to the Overwrite mode.
    #[error("index mismatch: {0}")]
    IndexMismatch(String),

    /// A correspondence mapping could not be built at all (e.g. the reference
    /// carries no UV chart). Fatal to the requested Overwrite, not the process.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Invalid document data outside the more specific variants above.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped filesystem error from the load/save entry points.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RigDnaError {
    /// Build a [`RigDnaError::Format`] value.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Build a [`RigDnaError::DanglingReference`] value.
    pub fn dangling(msg: impl Into<String>) -> Self {
        Self::DanglingReference(msg.into())
    }

    /// Build a [`RigDnaError::CyclicExpression`] value.
    pub fn cyclic(msg: impl Into<String>) -> Self {
        Self::CyclicExpression(msg.into())
    }

    /// Build a [`RigDnaError::IndexMismatch`] value.
    pub fn index_mismatch(msg: impl Into<String>) -> Self {
        Self::IndexMismatch(msg.into())
    }

    /// Build a [`RigDnaError::Mapping`] value.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    /// Build a [`RigDnaError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
