//! Registry of child build contexts for one parent build.
//!
//! Contexts are keyed by target. Each moves `Created -> Running ->
//! Completed`; waiters block on a condition variable until completion, a
//! timeout, or cancellation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::builder::child::spec::{BuildTarget, ChildBuildSpec};

/// Upper bound on a single condition-variable wait, so cancellation is
/// noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum ChildBuildError {
    #[error("{target} child build failed: {}", .errors.join("; "))]
    Failed { target: BuildTarget, errors: Vec<String> },

    #[error("{target} child build did not finish within {}s", .timeout.as_secs())]
    TimedOut { target: BuildTarget, timeout: Duration },

    #[error("{target} child build was cancelled")]
    Cancelled { target: BuildTarget },
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a finished child build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildBuildReport {
    pub target: BuildTarget,
    pub success: bool,
    pub assets: Vec<String>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildState {
    Created,
    Running,
    Completed(ChildBuildReport),
}

impl ChildState {
    pub fn is_completed(&self) -> bool {
        matches!(self, ChildState::Completed(_))
    }
}

/// One child build and its lifecycle state.
pub struct ChildBuildContext {
    spec: ChildBuildSpec,
    /// Targets that must complete before this one may finalize.
    awaits: Vec<BuildTarget>,
    state: Mutex<ChildState>,
    completed: Condvar,
}

impl fmt::Debug for ChildBuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildBuildContext")
            .field("target", &self.spec.target)
            .field("awaits", &self.awaits)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl ChildBuildContext {
    pub fn new(spec: ChildBuildSpec, awaits: Vec<BuildTarget>) -> Self {
        ChildBuildContext {
            spec,
            awaits,
            state: Mutex::new(ChildState::Created),
            completed: Condvar::new(),
        }
    }

    pub fn target(&self) -> &BuildTarget {
        &self.spec.target
    }

    pub fn spec(&self) -> &ChildBuildSpec {
        &self.spec
    }

    pub fn awaits(&self) -> &[BuildTarget] {
        &self.awaits
    }

    pub fn state(&self) -> ChildState {
        self.state.lock().clone()
    }

    /// Claim the context for running. Only the first caller succeeds.
    pub fn try_start(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ChildState::Created {
            *state = ChildState::Running;
            debug!("{} child build running", self.spec.target);
            true
        } else {
            false
        }
    }

    pub fn complete(&self, report: ChildBuildReport) {
        let mut state = self.state.lock();
        debug!(
            "{} child build completed (success: {})",
            self.spec.target, report.success
        );
        *state = ChildState::Completed(report);
        self.completed.notify_all();
    }

    /// Block until the context completes.
    pub fn wait(&self, timeout: Duration, cancel: &CancelToken) -> Result<ChildBuildReport, ChildBuildError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let ChildState::Completed(report) = &*state {
                return Ok(report.clone());
            }
            if cancel.is_cancelled() {
                return Err(ChildBuildError::Cancelled {
                    target: self.spec.target.clone(),
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ChildBuildError::TimedOut {
                    target: self.spec.target.clone(),
                    timeout,
                });
            }
            let slice = (deadline - now).min(WAIT_SLICE);
            self.completed.wait_for(&mut state, slice);
        }
    }
}

/// Child contexts of one parent build, keyed by target.
#[derive(Debug, Default)]
pub struct ChildBuildRegistry {
    contexts: Mutex<BTreeMap<BuildTarget, Arc<ChildBuildContext>>>,
    cancel: CancelToken,
}

impl ChildBuildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a context, replacing any previous one for the same target.
    pub fn insert(&self, context: ChildBuildContext) -> Arc<ChildBuildContext> {
        let context = Arc::new(context);
        self.contexts
            .lock()
            .insert(context.target().clone(), Arc::clone(&context));
        context
    }

    pub fn get(&self, target: &BuildTarget) -> Option<Arc<ChildBuildContext>> {
        self.contexts.lock().get(target).cloned()
    }

    pub fn contains(&self, target: &BuildTarget) -> bool {
        self.contexts.lock().contains_key(target)
    }

    pub fn is_completed(&self, target: &BuildTarget) -> bool {
        self.get(target).is_some_and(|ctx| ctx.state().is_completed())
    }

    pub fn contexts(&self) -> Vec<Arc<ChildBuildContext>> {
        self.contexts.lock().values().cloned().collect()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::context::{BuildContext, BuildMode};
    use crate::core::federation::FederationConfig;

    fn context(target: &str) -> ChildBuildContext {
        let parent = BuildContext::new(target, BuildMode::Production, "/app");
        let spec = ChildBuildSpec::derive(&parent, &FederationConfig::default(), 0);
        ChildBuildContext::new(spec, Vec::new())
    }

    fn report(target: BuildTarget) -> ChildBuildReport {
        ChildBuildReport {
            target,
            success: true,
            assets: vec!["remoteEntry.js".into()],
            errors: Vec::new(),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_state_transitions() {
        let ctx = context("server");
        assert_eq!(ctx.state(), ChildState::Created);
        assert!(ctx.try_start());
        assert!(!ctx.try_start());
        assert_eq!(ctx.state(), ChildState::Running);

        ctx.complete(report(BuildTarget::Server));
        assert!(ctx.state().is_completed());
        assert!(!ctx.try_start());
    }

    #[test]
    fn test_wait_sees_completion_from_other_thread() {
        let registry = ChildBuildRegistry::new();
        let ctx = registry.insert(context("server"));
        ctx.try_start();

        let worker = Arc::clone(&ctx);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            worker.complete(report(BuildTarget::Server));
        });

        let result = ctx.wait(Duration::from_secs(5), registry.cancel_token()).unwrap();
        assert!(result.success);
        assert!(registry.is_completed(&BuildTarget::Server));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_times_out_and_cancels() {
        let registry = ChildBuildRegistry::new();
        let ctx = registry.insert(context("server"));

        let err = ctx
            .wait(Duration::from_millis(30), registry.cancel_token())
            .unwrap_err();
        assert!(matches!(err, ChildBuildError::TimedOut { .. }));

        registry.cancel();
        let err = ctx
            .wait(Duration::from_secs(5), registry.cancel_token())
            .unwrap_err();
        assert!(matches!(err, ChildBuildError::Cancelled { .. }));
        assert_eq!(err.to_string(), "server child build was cancelled");
    }

    #[test]
    fn test_insert_replaces_target() {
        let registry = ChildBuildRegistry::new();
        let first = registry.insert(context("client"));
        first.try_start();
        registry.insert(context("client"));

        assert_eq!(registry.contexts().len(), 1);
        let current = registry.get(&BuildTarget::Client).unwrap();
        assert_eq!(current.state(), ChildState::Created);
        assert!(!registry.contains(&BuildTarget::Server));
    }
}
