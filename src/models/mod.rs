// Re-export all model types for ease of use across the crate

pub mod document;
pub mod job;
pub mod responses;

pub use document::*;
pub use job::*;
pub use responses::*;
