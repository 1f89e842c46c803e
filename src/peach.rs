pub mod common;
pub mod interpreted;
