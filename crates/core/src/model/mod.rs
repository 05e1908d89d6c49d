pub mod log;
pub mod span;
pub mod trace;
