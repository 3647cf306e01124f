//! Scheduling of child builds across parent build targets.
//!
//! In development every child starts as soon as it is registered. In
//! production a server child is only registered; the client child starts
//! right away but its finalize step waits for the server child to complete,
//! starting it first if nobody has. Child failures are recorded on the
//! parent build's error list and never returned to the caller.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::builder::child::registry::{
    CancelToken, ChildBuildContext, ChildBuildError, ChildBuildRegistry, ChildBuildReport,
    ChildState,
};
use crate::builder::child::spec::{BuildTarget, ChildBuildSpec};
use crate::builder::context::{BuildContext, BuildMode};

/// Default bound on how long a parent waits for a child.
pub const DEFAULT_CHILD_TIMEOUT: Duration = Duration::from_secs(300);

/// Artifacts and errors of a child build that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildBuildOutput {
    pub assets: Vec<String>,
    pub errors: Vec<String>,
}

/// Runs a child build.
///
/// An `Err` means the build could not run at all; compilation errors of a
/// build that ran belong in [`ChildBuildOutput::errors`].
pub trait ChildCompiler: Send + Sync {
    fn run(&self, spec: &ChildBuildSpec, cancel: &CancelToken) -> anyhow::Result<ChildBuildOutput>;
}

pub struct Orchestrator {
    registry: Arc<ChildBuildRegistry>,
    compiler: Arc<dyn ChildCompiler>,
    timeout: Duration,
    handles: Mutex<BTreeMap<BuildTarget, JoinHandle<()>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(registry: Arc<ChildBuildRegistry>, compiler: Arc<dyn ChildCompiler>) -> Self {
        Orchestrator {
            registry,
            compiler,
            timeout: DEFAULT_CHILD_TIMEOUT,
            handles: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ChildBuildRegistry {
        &self.registry
    }

    /// Register the child of a parent build that is starting.
    pub fn register(&self, parent: &BuildContext, spec: ChildBuildSpec) -> Arc<ChildBuildContext> {
        let target = spec.target.clone();
        let awaits = match parent.mode {
            BuildMode::Production
                if !target.is_server() && self.registry.contains(&BuildTarget::Server) =>
            {
                vec![BuildTarget::Server]
            }
            _ => Vec::new(),
        };

        let context = self.registry.insert(ChildBuildContext::new(spec, awaits));
        debug!("registered {} child build ({})", target, parent.mode);

        let start_now = parent.mode == BuildMode::Development || !target.is_server();
        if start_now {
            self.start(&context, parent);
        }
        context
    }

    /// The parent's finalize point: wait for every child the target's child
    /// must not finalize before.
    ///
    /// In production a non-server target also waits for a server child
    /// registered after it, as long as that happened before this call.
    pub fn finalize_assets(&self, parent: &BuildContext, target: &BuildTarget) {
        let Some(context) = self.registry.get(target) else {
            return;
        };

        let mut upstreams = context.awaits().to_vec();
        if parent.mode == BuildMode::Production
            && !target.is_server()
            && !upstreams.contains(&BuildTarget::Server)
            && self.registry.contains(&BuildTarget::Server)
        {
            upstreams.push(BuildTarget::Server);
        }

        for dependency in &upstreams {
            let Some(upstream) = self.registry.get(dependency) else {
                continue;
            };
            info!("{} finalize waiting for {} child build", target, dependency);
            self.start(&upstream, parent);
            if let Err(e) = upstream.wait(self.timeout, self.registry.cancel_token()) {
                self.record_wait_error(parent, e);
            }
        }
    }

    /// Start contexts nobody claimed, wait for all of them, and return their
    /// reports in target order.
    pub fn finish(&self, parent: &BuildContext) -> Vec<ChildBuildReport> {
        let contexts = self.registry.contexts();
        for context in &contexts {
            if context.state() == ChildState::Created {
                self.start(context, parent);
            }
        }

        let mut reports = Vec::new();
        for context in &contexts {
            match context.wait(self.timeout, self.registry.cancel_token()) {
                Ok(report) => {
                    let handle = self.handles.lock().remove(context.target());
                    if let Some(handle) = handle {
                        if handle.join().is_err() {
                            warn!("{} child build thread panicked", context.target());
                        }
                    }
                    reports.push(report);
                }
                Err(e) => self.record_wait_error(parent, e),
            }
        }
        reports
    }

    /// Abort waiting on children; running builds are detached.
    pub fn cancel(&self) {
        self.registry.cancel();
    }

    fn record_wait_error(&self, parent: &BuildContext, error: ChildBuildError) {
        warn!("{}", error);
        parent.record_error(error);
    }

    fn start(&self, context: &Arc<ChildBuildContext>, parent: &BuildContext) {
        if self.registry.cancel_token().is_cancelled() {
            debug!("not starting {} child build: cancelled", context.target());
            return;
        }
        if !context.try_start() {
            return;
        }

        let context = Arc::clone(context);
        let compiler = Arc::clone(&self.compiler);
        let cancel = self.registry.cancel_token().clone();
        let parent = parent.clone();
        let target = context.target().clone();

        let handle = std::thread::spawn(move || {
            let started = Instant::now();
            let run =
                panic::catch_unwind(AssertUnwindSafe(|| compiler.run(context.spec(), &cancel)));
            let (assets, errors) = match run {
                Ok(Ok(output)) => (output.assets, output.errors),
                Ok(Err(e)) => (Vec::new(), vec![format!("{:#}", e)]),
                Err(payload) => (Vec::new(), vec![panic_message(payload.as_ref())]),
            };

            let success = errors.is_empty();
            if !success {
                parent.record_error(ChildBuildError::Failed {
                    target: context.target().clone(),
                    errors: errors.clone(),
                });
            }

            context.complete(ChildBuildReport {
                target: context.target().clone(),
                success,
                assets,
                errors,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        });

        self.handles.lock().insert(target, handle);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("child compiler panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::federation::FederationConfig;
    use crate::test_support::ScriptedCompiler;

    fn parent(name: &str, mode: BuildMode) -> BuildContext {
        BuildContext::new(name, mode, "/app")
    }

    fn spec(parent: &BuildContext) -> ChildBuildSpec {
        ChildBuildSpec::derive(parent, &FederationConfig::default(), 0)
    }

    #[test]
    fn test_production_client_finalize_waits_for_server() {
        let compiler = Arc::new(ScriptedCompiler::new().with_delay(
            BuildTarget::Server,
            Duration::from_millis(80),
        ));
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler.clone());

        let server = parent("server", BuildMode::Production);
        let server_ctx = orchestrator.register(&server, spec(&server));
        assert_eq!(server_ctx.state(), ChildState::Created);

        let client = parent("client", BuildMode::Production);
        let client_ctx = orchestrator.register(&client, spec(&client));
        assert_eq!(client_ctx.awaits(), [BuildTarget::Server]);
        assert_eq!(server_ctx.state(), ChildState::Created);

        orchestrator.finalize_assets(&client, &BuildTarget::Client);
        assert!(server_ctx.state().is_completed());

        let reports = orchestrator.finish(&client);
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.success));
        assert!(!client.has_errors());
        assert_eq!(compiler.runs(), 2);
    }

    #[test]
    fn test_development_children_start_immediately() {
        let compiler = Arc::new(ScriptedCompiler::new());
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler);

        let server = parent("server", BuildMode::Development);
        let server_ctx = orchestrator.register(&server, spec(&server));
        assert_ne!(server_ctx.state(), ChildState::Created);

        let client = parent("client", BuildMode::Development);
        let client_ctx = orchestrator.register(&client, spec(&client));
        assert!(client_ctx.awaits().is_empty());

        let reports = orchestrator.finish(&client);
        assert_eq!(reports.len(), 2);
    }

    #[test]
    fn test_failure_is_recorded_on_parent() {
        let compiler = Arc::new(
            ScriptedCompiler::new().with_errors(BuildTarget::Server, vec!["Module not found: ./x".into()]),
        );
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler);

        let server = parent("server", BuildMode::Production);
        orchestrator.register(&server, spec(&server));
        let client = parent("client", BuildMode::Production);
        orchestrator.register(&client, spec(&client));

        orchestrator.finalize_assets(&client, &BuildTarget::Client);
        let errors = client.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("server child build failed"));
        assert!(errors[0].contains("Module not found: ./x"));

        let reports = orchestrator.finish(&client);
        let server_report = reports
            .iter()
            .find(|r| r.target == BuildTarget::Server)
            .unwrap();
        assert!(!server_report.success);
    }

    #[test]
    fn test_compiler_error_is_recorded_not_propagated() {
        let compiler = Arc::new(ScriptedCompiler::new().with_crash(BuildTarget::Client));
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler);

        let client = parent("client", BuildMode::Development);
        orchestrator.register(&client, spec(&client));
        let reports = orchestrator.finish(&client);

        assert_eq!(reports.len(), 1);
        assert!(!reports[0].success);
        assert!(client.errors()[0].contains("client child build failed"));
    }

    #[test]
    fn test_wait_is_bounded_by_timeout() {
        let compiler = Arc::new(ScriptedCompiler::new().with_delay(
            BuildTarget::Server,
            Duration::from_millis(500),
        ));
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler)
            .with_timeout(Duration::from_millis(40));

        let server = parent("server", BuildMode::Production);
        orchestrator.register(&server, spec(&server));
        let client = parent("client", BuildMode::Production);
        orchestrator.register(&client, spec(&client));

        orchestrator.finalize_assets(&client, &BuildTarget::Client);
        assert!(client.errors().iter().any(|e| e.contains("did not finish")));
    }

    #[test]
    fn test_production_client_waits_for_server_registered_later() {
        let compiler = Arc::new(ScriptedCompiler::new().with_delay(
            BuildTarget::Server,
            Duration::from_millis(50),
        ));
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler.clone());

        let client = parent("client", BuildMode::Production);
        let client_ctx = orchestrator.register(&client, spec(&client));
        assert!(client_ctx.awaits().is_empty());

        let server = parent("server", BuildMode::Production);
        let server_ctx = orchestrator.register(&server, spec(&server));
        assert_eq!(server_ctx.state(), ChildState::Created);

        orchestrator.finalize_assets(&client, &BuildTarget::Client);
        assert!(server_ctx.state().is_completed());
        assert!(!client.has_errors());

        let reports = orchestrator.finish(&client);
        assert_eq!(reports.len(), 2);
        assert_eq!(compiler.runs(), 2);
    }

    #[test]
    fn test_development_client_does_not_wait() {
        let compiler = Arc::new(ScriptedCompiler::new().with_delay(
            BuildTarget::Server,
            Duration::from_millis(200),
        ));
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler);

        let client = parent("client", BuildMode::Development);
        orchestrator.register(&client, spec(&client));
        let server = parent("server", BuildMode::Development);
        let server_ctx = orchestrator.register(&server, spec(&server));

        orchestrator.finalize_assets(&client, &BuildTarget::Client);
        assert!(!server_ctx.state().is_completed());
        orchestrator.finish(&client);
    }

    #[test]
    fn test_panicking_compiler_completes_with_failure() {
        let compiler = Arc::new(ScriptedCompiler::new().with_panic(BuildTarget::Server));
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler)
            .with_timeout(Duration::from_secs(5));

        let server = parent("server", BuildMode::Development);
        let server_ctx = orchestrator.register(&server, spec(&server));

        let reports = orchestrator.finish(&server);
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].success);
        assert!(reports[0].errors[0].contains("panicked"));
        assert!(server_ctx.state().is_completed());
        assert!(server.errors()[0].contains("server child build failed"));
    }

    #[test]
    fn test_cancel_stops_waiting() {
        let compiler = Arc::new(ScriptedCompiler::new().with_delay(
            BuildTarget::Server,
            Duration::from_millis(500),
        ));
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler);

        let server = parent("server", BuildMode::Production);
        orchestrator.register(&server, spec(&server));
        orchestrator.cancel();

        let reports = orchestrator.finish(&server);
        assert!(reports.is_empty());
        assert!(server.errors()[0].contains("cancelled"));
    }

    #[test]
    fn test_cancelled_orchestrator_starts_nothing() {
        let compiler = Arc::new(ScriptedCompiler::new());
        let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler.clone());

        let server = parent("server", BuildMode::Production);
        let server_ctx = orchestrator.register(&server, spec(&server));
        orchestrator.cancel();

        let client = parent("client", BuildMode::Production);
        orchestrator.register(&client, spec(&client));
        orchestrator.finalize_assets(&client, &BuildTarget::Client);
        let reports = orchestrator.finish(&client);

        assert_eq!(compiler.runs(), 0);
        assert!(reports.is_empty());
        assert_eq!(server_ctx.state(), ChildState::Created);
        assert!(client.errors().iter().all(|e| e.contains("cancelled")));
        assert!(client.has_errors());
    }
}
