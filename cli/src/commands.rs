pub mod community;
pub mod fuse;
