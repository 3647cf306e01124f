//! Share declarations and their normalization.

pub mod descriptor;
pub mod federation;
pub mod filter;
pub mod manifest;
pub mod share_config;

pub use descriptor::{
    ProvidedVersion, RequiredVersion, Setting, ShareDescriptor, ShareFilter, ShareKind,
    ShareScope, DEFAULT_SHARE_SCOPE,
};
pub use federation::FederationConfig;
pub use filter::{FilterMode, FilterOutcome};
pub use manifest::PackageJson;
pub use share_config::{ConfigError, ShareConfigNormalizer};
