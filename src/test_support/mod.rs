//! Test utilities and mocks for fedshare unit tests.
//!
//! This module provides scripted implementations of the interfaces that
//! are awkward to exercise for real, such as child compilers and runtime
//! module factories.
//!
//! # Example
//!
//! ```rust,ignore
//! use fedshare::test_support::{ScriptedCompiler, ProjectFixture};
//!
//! #[test]
//! fn test_example() {
//!     let compiler = ScriptedCompiler::new()
//!         .with_delay(BuildTarget::Server, Duration::from_millis(50));
//!     let project = ProjectFixture::new("app").with_package("react", "18.2.0");
//!     // Use mocks in tests...
//! }
//! ```

pub mod fixtures;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use parking_lot::Mutex;
use serde_json::Value;

use crate::builder::child::{
    BuildTarget, CancelToken, ChildBuildOutput, ChildBuildSpec, ChildCompiler,
};
use crate::resolver::share_scope::{factory, Factory};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Scripted behavior for one target.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// How long the build takes.
    pub delay: Duration,
    /// Compilation errors the build reports.
    pub errors: Vec<String>,
    /// Fail to run at all.
    pub crash: bool,
    /// Panic inside the compiler.
    pub panic: bool,
}

/// Child compiler that follows per-target scripts and records its runs.
#[derive(Debug, Default)]
pub struct ScriptedCompiler {
    scripts: HashMap<BuildTarget, Script>,
    calls: Mutex<Vec<BuildTarget>>,
}

impl ScriptedCompiler {
    /// Create a compiler whose builds succeed immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make builds of `target` take `delay`.
    pub fn with_delay(mut self, target: BuildTarget, delay: Duration) -> Self {
        self.scripts.entry(target).or_default().delay = delay;
        self
    }

    /// Make builds of `target` report compilation errors.
    pub fn with_errors(mut self, target: BuildTarget, errors: Vec<String>) -> Self {
        self.scripts.entry(target).or_default().errors = errors;
        self
    }

    /// Make builds of `target` fail to run.
    pub fn with_crash(mut self, target: BuildTarget) -> Self {
        self.scripts.entry(target).or_default().crash = true;
        self
    }

    /// Make builds of `target` panic.
    pub fn with_panic(mut self, target: BuildTarget) -> Self {
        self.scripts.entry(target).or_default().panic = true;
        self
    }

    /// Targets built so far, in start order.
    pub fn calls(&self) -> Vec<BuildTarget> {
        self.calls.lock().clone()
    }

    pub fn runs(&self) -> usize {
        self.calls().len()
    }
}

impl ChildCompiler for ScriptedCompiler {
    fn run(&self, spec: &ChildBuildSpec, cancel: &CancelToken) -> Result<ChildBuildOutput> {
        self.calls.lock().push(spec.target.clone());
        let script = self.scripts.get(&spec.target).cloned().unwrap_or_default();

        let deadline = Instant::now() + script.delay;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                bail!("{} build interrupted", spec.target);
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        if script.panic {
            panic!("{} compiler blew up", spec.target);
        }
        if script.crash {
            bail!("{} compiler crashed", spec.target);
        }

        Ok(ChildBuildOutput {
            assets: vec![spec.federation.filename().to_string()],
            errors: script.errors,
        })
    }
}

/// Records which module factories the runtime invoked.
#[derive(Debug, Clone, Default)]
pub struct FactoryLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl FactoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory returning `name` as the module and logging the call.
    pub fn factory(&self, name: &str) -> Factory {
        let calls = Arc::clone(&self.calls);
        let name = name.to_string();
        factory(move || {
            calls.lock().push(name.clone());
            Ok(Value::String(name.clone()))
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::context::{BuildContext, BuildMode};
    use crate::core::federation::FederationConfig;

    #[test]
    fn test_scripted_compiler() {
        let compiler = ScriptedCompiler::new()
            .with_errors(BuildTarget::Server, vec!["boom".into()])
            .with_crash(BuildTarget::Client);

        let server = BuildContext::new("server", BuildMode::Production, "/app");
        let spec = ChildBuildSpec::derive(&server, &FederationConfig::default(), 0);
        let output = compiler.run(&spec, &CancelToken::new()).unwrap();
        assert_eq!(output.errors, ["boom"]);
        assert_eq!(output.assets, ["remoteEntry.js"]);

        let client = BuildContext::new("client", BuildMode::Production, "/app");
        let spec = ChildBuildSpec::derive(&client, &FederationConfig::default(), 0);
        assert!(compiler.run(&spec, &CancelToken::new()).is_err());
        assert_eq!(compiler.calls(), [BuildTarget::Server, BuildTarget::Client]);
    }

    #[test]
    fn test_factory_log() {
        let log = FactoryLog::new();
        let f = log.factory("react@18");
        assert_eq!(f().unwrap(), Value::String("react@18".into()));
        assert_eq!(log.calls(), ["react@18"]);
    }
}
