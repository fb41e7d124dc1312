//! Data models for the staged table engine
//!
//! This module provides the dynamic record representation the engine works
//! with: a variant scalar value and an ordered column-to-value container
//! that is validated against the table schema at every mutation boundary.

mod record;
mod value;

pub use record::Record;
pub use value::Value;
