//! Runtime resolution error types and diagnostics.

use thiserror::Error;

use crate::resolver::version::ParseError;
use crate::util::diagnostic::Diagnostic;

/// Error raised while resolving a shared module at runtime.
#[derive(Debug, Clone, Error)]
pub enum ShareError {
    #[error(
        "no version of `{key}` in share scope `{scope}` satisfies `{required}`{}",
        fmt_available(.available)
    )]
    NoSatisfyingVersion {
        scope: String,
        key: String,
        required: String,
        available: Vec<String>,
    },

    #[error(
        "singleton `{key}` in share scope `{scope}` is already active at {active}, but `{required}` is required"
    )]
    VersionConflict {
        scope: String,
        key: String,
        required: String,
        active: String,
    },

    #[error("factory for `{key}` in share scope `{scope}` failed: {message}")]
    FactoryFailed {
        scope: String,
        key: String,
        message: String,
    },

    #[error("unknown loader function `{0}`")]
    UnknownLoader(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

fn fmt_available(available: &[String]) -> String {
    if available.is_empty() {
        " (nothing is registered)".to_string()
    } else {
        format!(" (available: {})", available.join(", "))
    }
}

impl ShareError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ShareError::NoSatisfyingVersion {
                scope,
                key,
                required,
                available,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "no shared version of `{}` satisfies `{}`",
                    key, required
                ))
                .with_context(format!("share scope: {}", scope));

                if available.is_empty() {
                    diag = diag.with_context(format!("no bundle registered `{}`", key));
                } else {
                    diag = diag.with_context(format!(
                        "registered versions: {}",
                        available.join(", ")
                    ));
                }

                diag.with_suggestion(format!(
                    "Provide a compatible version of `{}` from one of the bundles",
                    key
                ))
                .with_suggestion(format!(
                    "Declare a local fallback (`import`) for `{}` in the consuming bundle",
                    key
                ))
            }

            ShareError::VersionConflict {
                scope,
                key,
                required,
                active,
            } => Diagnostic::error(format!("singleton version conflict for `{}`", key))
                .with_context(format!("share scope: {}", scope))
                .with_context(format!("active version: {}", active))
                .with_context(format!("required: {}", required))
                .with_suggestion(format!(
                    "Align every bundle on a version of `{}` matching `{}`",
                    key, required
                ))
                .with_suggestion("Disable `strictVersion` to accept the active singleton"),

            ShareError::FactoryFailed {
                scope,
                key,
                message,
            } => Diagnostic::error(format!("could not instantiate shared module `{}`", key))
                .with_context(format!("share scope: {}", scope))
                .with_context(message.clone()),

            ShareError::UnknownLoader(name) => {
                Diagnostic::error(format!("unknown loader function `{}`", name))
                    .with_suggestion("Regenerate the consuming bundle")
            }

            ShareError::Parse(err) => Diagnostic::error(err.to_string()),
        }
    }

    /// Share key the error refers to, if any.
    pub fn share_key(&self) -> Option<&str> {
        match self {
            ShareError::NoSatisfyingVersion { key, .. }
            | ShareError::VersionConflict { key, .. }
            | ShareError::FactoryFailed { key, .. } => Some(key),
            _ => None,
        }
    }
}
