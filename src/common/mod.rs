mod frame;
mod fs;

pub(crate) use frame::*;
pub(crate) use fs::*;
