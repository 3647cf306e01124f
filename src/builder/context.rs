//! Build context - mode, output options, and the build's error list.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Whether the build is interactive or a one-shot production build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(format!(
                "unknown build mode `{}` (expected development or production)",
                other
            )),
        }
    }
}

/// Output settings of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    pub path: PathBuf,
    pub filename: String,
    pub chunk_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_type: Option<String>,
}

impl OutputOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        OutputOptions {
            path: path.into(),
            filename: "[name].js".to_string(),
            chunk_filename: "[name].js".to_string(),
            library_type: None,
        }
    }
}

#[derive(Debug, Default)]
struct Messages {
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Context of one build.
///
/// Clones share the same error and warning lists, so work running on other
/// threads can report failures against the build that started it.
#[derive(Clone)]
pub struct BuildContext {
    /// Build name ("client", "server", ...)
    pub name: String,

    pub mode: BuildMode,

    /// Project root; requests are resolved and shortened against it
    pub context_dir: PathBuf,

    pub output: OutputOptions,

    messages: Arc<Mutex<Messages>>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = self.messages.lock();
        f.debug_struct("BuildContext")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("context_dir", &self.context_dir)
            .field("output", &self.output)
            .field("errors", &messages.errors.len())
            .field("warnings", &messages.warnings.len())
            .finish()
    }
}

impl BuildContext {
    pub fn new(name: impl Into<String>, mode: BuildMode, context_dir: impl Into<PathBuf>) -> Self {
        let context_dir = context_dir.into();
        let output = OutputOptions::new(context_dir.join("dist"));
        BuildContext {
            name: name.into(),
            mode,
            context_dir,
            output,
            messages: Arc::new(Mutex::new(Messages::default())),
        }
    }

    pub fn with_output(mut self, output: OutputOptions) -> Self {
        self.output = output;
        self
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    pub fn is_dev(&self) -> bool {
        self.mode == BuildMode::Development
    }

    pub fn is_server(&self) -> bool {
        self.name == "server"
    }

    /// Record an error against this build.
    pub fn record_error(&self, error: impl fmt::Display) {
        self.messages.lock().errors.push(error.to_string());
    }

    pub fn record_warning(&self, warning: impl fmt::Display) {
        self.messages.lock().warnings.push(warning.to_string());
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages.lock().errors.clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages.lock().warnings.clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.messages.lock().errors.is_empty()
    }
}
