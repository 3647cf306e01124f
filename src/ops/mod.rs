//! High-level operations.
//!
//! This module contains the implementation of fedshare commands.

pub mod inspect;
pub mod runtime_sim;
pub mod share_build;

pub use inspect::{descriptors_json, format_build_result, normalize};
pub use runtime_sim::{simulate, RegistrySnapshot, ResolveOptions, ResolveOutcome};
pub use share_build::{build, build_with_compiler, BuildOptions, BuildResult, BuiltUnit};
