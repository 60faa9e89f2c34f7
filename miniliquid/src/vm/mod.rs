//! The render time machinery: the render [`Context`] and resource limits.
pub use crate::vm::context::{Context, Interrupt};
pub use crate::vm::limits::{assign_score_of, Limits, ResourceLimits};

mod context;
mod limits;
