//! Implementation of `fedshare build`.
//!
//! Normalizes the federation config, resolves every declaration against the
//! project's `node_modules`, builds the shared units and generates their
//! code. Optional child builds run through the orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::builder::child::spec::build_stamp;
use crate::builder::child::{
    BuildTarget, CancelToken, ChildBuildOutput, ChildBuildRegistry, ChildBuildReport,
    ChildBuildSpec, ChildCompiler, Orchestrator, DEFAULT_CHILD_TIMEOUT,
};
use crate::builder::module::RequestShortener;
use crate::builder::{
    BuildContext, BuildError, BuildEvent, BuildMode, BuildUnit, CodeGenContext,
    CodeGenerationResult, FingerprintCache, ModuleGraph, SharedModule, UnitCache,
};
use crate::core::descriptor::{ShareDescriptor, ShareKind};
use crate::core::federation::FederationConfig;
use crate::core::filter::{evaluate, FilterMode, FilterOutcome, RequestPaths};
use crate::core::manifest::{resolve_module, version_of_module};
use crate::core::share_config::effective_provided_version;
use crate::util::fs::ensure_dir;

/// Project-local state directory.
pub const STATE_DIR: &str = ".fedshare";

const UNIT_CACHE_FILE: &str = "units.json";
const FINGERPRINT_FILE: &str = "fingerprints.json";

/// Options for the build command.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: BuildMode,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Reuse units built by a previous run
    pub use_cache: bool,

    /// Child builds to run alongside the share pipeline
    pub children: Vec<BuildTarget>,

    /// Bound on waiting for a child build
    pub child_timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            mode: BuildMode::Development,
            jobs: None,
            use_cache: false,
            children: Vec::new(),
            child_timeout: DEFAULT_CHILD_TIMEOUT,
        }
    }
}

/// A unit after code generation.
#[derive(Debug, Clone)]
pub struct BuiltUnit {
    pub identifier: String,
    pub readable: String,
    pub lib_ident: String,
    pub kind: ShareKind,
    /// Whether the unit's hash matched the previous build
    pub fresh: bool,
    pub code: CodeGenerationResult,
}

/// Build result.
#[derive(Debug, Default)]
pub struct BuildResult {
    pub units: Vec<BuiltUnit>,

    /// Declarations left out by their filters (share key, reason)
    pub skipped: Vec<(String, String)>,

    pub errors: Vec<String>,

    pub warnings: Vec<String>,

    pub children: Vec<ChildBuildReport>,

    /// Events in emission order, for `--message-format=json`
    pub events: Vec<BuildEvent>,
}

impl BuildResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, error: impl std::fmt::Display) {
        let message = error.to_string();
        self.events.push(BuildEvent::error(&message));
        self.errors.push(message);
    }

    fn warning(&mut self, warning: impl std::fmt::Display) {
        let message = warning.to_string();
        warn!("{}", message);
        self.events.push(BuildEvent::warning(&message));
        self.warnings.push(message);
    }
}

/// Units persisted between runs.
struct Caches {
    dir: PathBuf,
    units: UnitCache,
    fingerprints: FingerprintCache,
}

impl Caches {
    fn load(context: &Path) -> Result<Self> {
        let dir = context.join(STATE_DIR);
        Ok(Caches {
            units: UnitCache::load(&dir.join(UNIT_CACHE_FILE))?,
            fingerprints: FingerprintCache::load(&dir.join(FINGERPRINT_FILE))?,
            dir,
        })
    }

    fn save(&self) -> Result<()> {
        ensure_dir(&self.dir)?;
        self.units.save(&self.dir.join(UNIT_CACHE_FILE))?;
        self.fingerprints.save(&self.dir.join(FINGERPRINT_FILE))
    }
}

enum Prepared {
    Unit(SharedModule),
    Skipped(String),
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn prepare_consume(
    context: &Path,
    mut d: ShareDescriptor,
    result: &mut BuildResult,
) -> Result<Prepared, BuildError> {
    let resolved = match (&d.fallback_resolved, &d.fallback_request) {
        (Some(resolved), _) => Some(PathBuf::from(resolved)),
        (None, Some(request)) => resolve_module(context, request),
        (None, None) => None,
    };

    match (&resolved, &d.fallback_request) {
        (Some(path), _) => d.fallback_resolved = Some(path_string(path)),
        (None, Some(request)) => result.warning(BuildError::Unresolved {
            key: d.share_key.clone(),
            request: request.clone(),
        }),
        (None, None) => {}
    }

    let version = resolved.as_deref().and_then(version_of_module);
    let paths = RequestPaths::new(&d.request, d.fallback_resolved.as_deref());
    match evaluate(&d, paths, version.as_ref(), FilterMode::Consume)? {
        FilterOutcome::Accept => Ok(Prepared::Unit(SharedModule::from_descriptor(d))),
        FilterOutcome::Skip(reason) => Ok(Prepared::Skipped(reason)),
    }
}

fn prepare_provide(
    context: &Path,
    mut d: ShareDescriptor,
    result: &mut BuildResult,
) -> Result<Prepared, BuildError> {
    let path = resolve_module(context, &d.request).ok_or_else(|| BuildError::Unresolved {
        key: d.share_key.clone(),
        request: d.request.clone(),
    })?;
    d.fallback_resolved = Some(path_string(&path));

    let inferred = version_of_module(&path);
    if d.version.is_unset() && inferred.is_none() {
        result.warning(format!(
            "no version specified and unable to determine one for shared module `{}` ({}); providing it as version 0",
            d.share_key, d.request
        ));
    }
    d.version = effective_provided_version(&d, inferred);

    let paths = RequestPaths::new(&d.request, d.fallback_resolved.as_deref());
    match evaluate(&d, paths, d.version.value(), FilterMode::Provide)? {
        FilterOutcome::Accept => Ok(Prepared::Unit(SharedModule::from_descriptor(d))),
        FilterOutcome::Skip(reason) => Ok(Prepared::Skipped(reason)),
    }
}

/// Resolve, filter, build and generate code for `descriptors`.
fn run_pipeline(
    context: &Path,
    descriptors: Vec<ShareDescriptor>,
    mut caches: Option<&mut Caches>,
    result: &mut BuildResult,
) {
    let mut graph = ModuleGraph::new();

    for d in descriptors {
        let key = d.share_key.clone();
        let prepared = if d.is_consume() {
            prepare_consume(context, d, result)
        } else {
            prepare_provide(context, d, result)
        };

        let unit = match prepared {
            Ok(Prepared::Unit(unit)) => unit,
            Ok(Prepared::Skipped(reason)) => {
                debug!("skipping `{}`: {}", key, reason);
                result.events.push(BuildEvent::skipped(&key, &reason));
                result.skipped.push((key, reason));
                continue;
            }
            Err(e) => {
                result.error(e);
                continue;
            }
        };

        let cached = caches
            .as_deref()
            .and_then(|c| c.units.get(&unit.identifier()))
            .cloned();
        graph.add_unit(cached.unwrap_or(unit));
    }

    let resolver = |request: &str| resolve_module(context, request);
    let (built, errors) = graph.build_all(&resolver);
    debug!("built {} of {} units", built.len(), graph.unit_count());
    for e in errors {
        result.error(e);
    }

    let shortener = RequestShortener::new(context);
    let chunk_graph = graph.chunk_graph(&shortener);
    let ctx = CodeGenContext {
        chunk_graph: &chunk_graph,
    };

    for unit in graph.units() {
        let fresh = caches
            .as_deref()
            .is_some_and(|c| c.fingerprints.is_fresh(unit));
        if let Some(c) = caches.as_deref_mut() {
            c.fingerprints.update(unit);
        }

        let code = unit.code_generation(&ctx);
        let identifier = unit.identifier();
        let readable = unit.readable_identifier(&shortener);

        result
            .events
            .push(BuildEvent::unit_built(&identifier, &readable, fresh));
        result.events.push(BuildEvent::CodeGenerated {
            identifier: identifier.clone(),
            loader_call: code.loader_call.as_ref().map(|call| call.render()),
            source: code.sources.values().next().cloned(),
            init: code
                .data
                .get("share-init")
                .and_then(|init| init[0]["init"].as_str())
                .map(str::to_string),
            runtime_requirements: code
                .runtime_requirements
                .iter()
                .map(|r| r.as_str().to_string())
                .collect(),
        });

        result.units.push(BuiltUnit {
            identifier,
            readable,
            lib_ident: unit.lib_ident(),
            kind: unit.descriptor().kind,
            fresh,
            code,
        });
    }

    if let Some(c) = caches {
        c.units.units = graph.units().cloned().collect();
    }
}

/// Child compiler running the share pipeline over a child spec.
#[derive(Debug, Default)]
pub struct SharePipelineCompiler;

impl ChildCompiler for SharePipelineCompiler {
    fn run(&self, spec: &ChildBuildSpec, cancel: &CancelToken) -> Result<ChildBuildOutput> {
        if cancel.is_cancelled() {
            bail!("{} child build cancelled before it started", spec.target);
        }

        let normalizer = spec.federation.normalizer(&spec.context_dir);
        let descriptors = spec.normalize(&normalizer)?;

        let mut result = BuildResult::default();
        run_pipeline(&spec.context_dir, descriptors, None, &mut result);

        let remote_entry = spec.output.path.join(spec.federation.filename());
        Ok(ChildBuildOutput {
            assets: vec![path_string(&remote_entry)],
            errors: result.errors,
        })
    }
}

fn run_children(
    context: &Path,
    config: &FederationConfig,
    opts: &BuildOptions,
    compiler: Arc<dyn ChildCompiler>,
    result: &mut BuildResult,
) {
    let orchestrator = Orchestrator::new(Arc::new(ChildBuildRegistry::new()), compiler)
        .with_timeout(opts.child_timeout);

    // Servers register first so a production client finalize waits on them.
    let mut targets = opts.children.clone();
    targets.sort_by_key(|t| !t.is_server());
    targets.dedup();

    let stamp = build_stamp();
    let parents: Vec<BuildContext> = targets
        .iter()
        .map(|target| {
            let parent = BuildContext::new(target.as_str(), opts.mode, context);
            let spec = ChildBuildSpec::derive(&parent, config, stamp);
            orchestrator.register(&parent, spec);
            parent
        })
        .collect();

    for (parent, target) in parents.iter().zip(&targets) {
        orchestrator.finalize_assets(parent, target);
    }

    let coordinator = BuildContext::new("coordinator", opts.mode, context);
    let reports = orchestrator.finish(&coordinator);

    for parent in parents.iter().chain(std::iter::once(&coordinator)) {
        for error in parent.errors() {
            result.error(error);
        }
    }
    for report in reports {
        info!(
            "{} child build finished in {}ms (success: {})",
            report.target, report.duration_ms, report.success
        );
        result.events.push(BuildEvent::ChildBuildFinished {
            target: report.target.to_string(),
            success: report.success,
            errors: report.errors.clone(),
        });
        result.children.push(report);
    }
}

/// Run the share pipeline for the project at `context`.
pub fn build(context: &Path, config: &FederationConfig, opts: &BuildOptions) -> Result<BuildResult> {
    build_with_compiler(context, config, opts, Arc::new(SharePipelineCompiler))
}

/// Like [`build`], with a custom compiler for child builds.
pub fn build_with_compiler(
    context: &Path,
    config: &FederationConfig,
    opts: &BuildOptions,
    compiler: Arc<dyn ChildCompiler>,
) -> Result<BuildResult> {
    let started = Instant::now();

    if let Some(j) = opts.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(j)
            .build_global()
            .ok(); // Ignore if already set
    }

    let descriptors = config.normalize(context)?;
    info!(
        "building {} shared modules for `{}` ({})",
        descriptors.len(),
        config.name(),
        opts.mode
    );

    let mut result = BuildResult::default();
    result
        .events
        .push(BuildEvent::started(opts.mode.as_str(), config.declaration_count()));

    let mut caches = if opts.use_cache {
        Some(Caches::load(context)?)
    } else {
        None
    };

    run_pipeline(context, descriptors, caches.as_mut(), &mut result);

    if let Some(caches) = &caches {
        caches.save()?;
    }

    if !opts.children.is_empty() {
        run_children(context, config, opts, compiler, &mut result);
    }

    result.events.push(BuildEvent::BuildFinished {
        success: result.success(),
        duration_ms: started.elapsed().as_millis() as u64,
        units_built: Some(result.units.len() as u64),
    });

    Ok(result)
}
