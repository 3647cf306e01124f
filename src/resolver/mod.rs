//! Version matching and runtime resolution of shared modules.
//!
//! `version` parses versions and ranges, `loader` maps consume options to
//! runtime loader functions, and `share_scope` is the runtime registry
//! those functions resolve against.

pub mod errors;
pub mod loader;
pub mod share_scope;
pub mod version;

pub use errors::ShareError;
pub use loader::LoaderFunction;
pub use share_scope::{factory, Factory, LoadRequest, Resolved, ResolvedFrom, ShareScopeRuntime};
pub use version::{parse_range, parse_version, satisfies, ParseError, VersionRange};
