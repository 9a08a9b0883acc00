pub mod common;
pub mod digest;
pub mod identifier;
pub mod status;
