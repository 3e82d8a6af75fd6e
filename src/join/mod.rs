mod attribute;
mod spatial;

pub use attribute::{join_on, JoinKind};
pub use spatial::attach_covering;
