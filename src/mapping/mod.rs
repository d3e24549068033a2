pub(crate) mod correspondence;
pub(crate) mod grid;
pub(crate) mod snapshot;
