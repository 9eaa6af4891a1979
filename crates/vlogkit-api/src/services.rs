//! Business services behind the HTTP handlers.

pub mod access;
pub mod batch;
pub mod transform;

pub use access::{require_project_owner, require_self};
pub use batch::{run_batch, BatchOperationRequest, BatchReport};
pub use transform::{SourceFile, TransformEngine, TransformInvoker, TransformOutcome};
