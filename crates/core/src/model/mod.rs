pub mod flame;
pub mod span;
pub mod trace;
