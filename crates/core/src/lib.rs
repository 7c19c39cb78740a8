pub mod config;
pub mod error;
pub mod filter;
pub mod flame;
pub mod ids;
pub mod model;
pub mod query;
pub mod time;
pub mod tree;

pub use error::{Result, TracelensError};
