//! Child builds of the federated container.

pub mod orchestrator;
pub mod registry;
pub mod spec;

pub use orchestrator::{ChildBuildOutput, ChildCompiler, Orchestrator, DEFAULT_CHILD_TIMEOUT};
pub use registry::{
    CancelToken, ChildBuildContext, ChildBuildError, ChildBuildRegistry, ChildBuildReport,
    ChildState,
};
pub use spec::{BuildTarget, ChildBuildSpec, ChildOutput, ChildPlugin};
