//! fedshare - shared-module federation for JavaScript bundles
//!
//! This crate normalizes share declarations, builds the consume and provide
//! units a bundler emits for them, coordinates client/server child builds,
//! and models the runtime share scope those units resolve against.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test utilities and mocks for fedshare unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides on-disk project fixtures, a scripted child
/// compiler and a recording module factory.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{FederationConfig, ShareDescriptor, ShareKind};
pub use resolver::{LoaderFunction, ShareScopeRuntime, VersionRange};
pub use util::context::GlobalContext;
