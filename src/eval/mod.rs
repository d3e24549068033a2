pub(crate) mod rbf;
pub(crate) mod riglogic;
