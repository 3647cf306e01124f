//! Shared module units, their build graph, and child builds.
//!
//! This module implements the consume/provide units, code generation for
//! them, and the orchestration of the federated child builds.

pub mod child;
pub mod consume;
pub mod context;
pub mod events;
pub mod fingerprint;
pub mod graph;
pub mod module;
pub mod provide;
pub mod template;

pub use consume::ConsumeSharedModule;
pub use context::{BuildContext, BuildMode, OutputOptions};
pub use events::BuildEvent;
pub use fingerprint::{FingerprintCache, UnitCache};
pub use graph::{ChunkGraph, ModuleGraph};
pub use module::{BuildError, BuildUnit, CodeGenContext, CodeGenerationResult, SharedModule};
pub use provide::ProvideSharedModule;
