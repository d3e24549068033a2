pub(crate) mod calibrator;
pub(crate) mod overwrite;
