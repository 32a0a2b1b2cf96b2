pub mod queue;
pub mod vault;
