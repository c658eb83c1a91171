//! Data models for the workstreams
//!
//! Each sub-module represents one feature area; everything is re-exported here.

mod asset;
mod object;
mod reconstruction;
mod scan;

pub use asset::*;
pub use object::*;
pub use reconstruction::*;
pub use scan::*;
