//! Repositories over the key-value table

pub mod kv;
pub mod project;
