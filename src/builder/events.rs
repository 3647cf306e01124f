//! Build event types for JSON output.
//!
//! These events are emitted when using `--message-format=json`, one JSON
//! object per line.
//!
//! # Event Types
//!
//! - `build-started`: the share pipeline started
//! - `unit-built`: a shared unit was built (or reused)
//! - `unit-skipped`: a declaration was filtered out
//! - `code-generated`: generated code for a unit
//! - `child-build-finished`: a child build completed
//! - `diagnostic`: a warning or error
//! - `build-finished`: the pipeline completed

use serde::Serialize;

/// A build event emitted during the build process.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    #[serde(rename = "build-started")]
    BuildStarted {
        /// Build mode ("development" or "production")
        mode: String,
        /// Number of share declarations
        declarations: u64,
    },

    #[serde(rename = "unit-built")]
    UnitBuilt {
        identifier: String,
        readable: String,
        /// Whether the unit's hash matched the previous build
        fresh: bool,
    },

    #[serde(rename = "unit-skipped")]
    UnitSkipped { share_key: String, detail: String },

    #[serde(rename = "code-generated")]
    CodeGenerated {
        identifier: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        loader_call: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        init: Option<String>,
        runtime_requirements: Vec<String>,
    },

    #[serde(rename = "child-build-finished")]
    ChildBuildFinished {
        target: String,
        success: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },

    /// A generic diagnostic message.
    #[serde(rename = "diagnostic")]
    Diagnostic {
        /// Severity level ("error", "warning", "note")
        level: String,
        message: String,
    },

    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        /// Total build duration in milliseconds
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        units_built: Option<u64>,
    },
}

impl BuildEvent {
    pub fn started(mode: impl Into<String>, declarations: usize) -> Self {
        BuildEvent::BuildStarted {
            mode: mode.into(),
            declarations: declarations as u64,
        }
    }

    pub fn unit_built(identifier: impl Into<String>, readable: impl Into<String>, fresh: bool) -> Self {
        BuildEvent::UnitBuilt {
            identifier: identifier.into(),
            readable: readable.into(),
            fresh,
        }
    }

    pub fn skipped(share_key: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildEvent::UnitSkipped {
            share_key: share_key.into(),
            detail: reason.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        BuildEvent::Diagnostic {
            level: "warning".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        BuildEvent::Diagnostic {
            level: "error".to_string(),
            message: message.into(),
        }
    }

    /// Create a build finished event.
    pub fn finished(success: bool, duration_ms: u64) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            units_built: None,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Serialize this event to a pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
