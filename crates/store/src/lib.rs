pub mod client;
pub mod query;
pub mod rows;
pub mod schema;
pub mod sql;

pub use client::Store;
