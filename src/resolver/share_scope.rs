//! Runtime share scope registry.
//!
//! Each scope maps a share key to the versions bundles have registered for
//! it. Loading picks the highest registered version that satisfies the
//! request and falls back to the consumer's local copy when nothing fits.
//!
//! ```text
//! Unregistered --register--> Registered --load--> Activated
//! ```
//!
//! Resolution is a pure function of the registry state and the request,
//! apart from the activation it records.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use semver::Version;
use serde_json::Value;
use tracing::{debug, warn};

use crate::resolver::errors::ShareError;
use crate::resolver::loader::LoaderFunction;
use crate::resolver::version::{precedence, VersionRange};

/// Produces the module a registry entry or fallback stands for.
pub type Factory = Arc<dyn Fn() -> Result<Value, ShareError> + Send + Sync>;

/// Wrap a closure as a `Factory`.
pub fn factory<F>(f: F) -> Factory
where
    F: Fn() -> Result<Value, ShareError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One registered version of a shared module.
#[derive(Clone)]
pub struct SharedEntry {
    pub version: Version,
    /// Name of the bundle that registered the entry.
    pub from: String,
    pub eager: bool,
    /// Set once the entry's factory has been invoked.
    pub loaded: bool,
    factory: Factory,
}

impl fmt::Debug for SharedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEntry")
            .field("version", &self.version)
            .field("from", &self.from)
            .field("eager", &self.eager)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
struct SharedKey {
    /// Sorted by ascending precedence, one entry per version.
    entries: Vec<SharedEntry>,
    activated: Option<Version>,
}

impl SharedKey {
    fn position(&self, version: &Version) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| precedence(&e.version, version))
    }

    fn get(&self, version: &Version) -> Option<&SharedEntry> {
        self.position(version).ok().map(|i| &self.entries[i])
    }

    fn highest_matching(&self, range: Option<&VersionRange>) -> Option<&SharedEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| range.map_or(true, |r| r.matches(&e.version)))
    }

    fn versions(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.version.to_string()).collect()
    }
}

/// A load request against the registry.
#[derive(Clone)]
pub struct LoadRequest<'a> {
    pub scope: &'a str,
    pub key: &'a str,
    pub range: Option<&'a VersionRange>,
    pub singleton: bool,
    pub strict: bool,
    pub fallback: Option<Factory>,
}

impl<'a> LoadRequest<'a> {
    pub fn new(scope: &'a str, key: &'a str) -> Self {
        LoadRequest {
            scope,
            key,
            range: None,
            singleton: false,
            strict: false,
            fallback: None,
        }
    }

    pub fn range(mut self, range: &'a VersionRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn fallback(mut self, fallback: Option<Factory>) -> Self {
        self.fallback = fallback;
        self
    }

    fn required(&self) -> String {
        self.range
            .map(ToString::to_string)
            .unwrap_or_else(|| "*".to_string())
    }
}

/// Where a resolved module came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// A registered entry, with the bundle that registered it.
    Shared { version: Version, from: String },
    /// The consumer's own fallback.
    Fallback,
}

/// A successfully loaded module.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub source: ResolvedFrom,
    pub module: Value,
}

impl Resolved {
    pub fn version(&self) -> Option<&Version> {
        match &self.source {
            ResolvedFrom::Shared { version, .. } => Some(version),
            ResolvedFrom::Fallback => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ResolvedFrom::Fallback
    }
}

/// The runtime registry of all share scopes.
#[derive(Debug, Default)]
pub struct ShareScopeRuntime {
    scopes: BTreeMap<String, BTreeMap<String, SharedKey>>,
    warnings: Vec<String>,
}

impl ShareScopeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a version under `scope`/`key` for an anonymous bundle.
    pub fn provide(
        &mut self,
        scope: &str,
        key: &str,
        version: Version,
        factory: Factory,
        eager: bool,
    ) {
        self.register(scope, key, version, "", factory, eager);
    }

    /// Register a version under `scope`/`key`.
    ///
    /// Re-registering a version replaces the existing entry, unless that
    /// entry has already been loaded.
    pub fn register(
        &mut self,
        scope: &str,
        key: &str,
        version: Version,
        from: &str,
        factory: Factory,
        eager: bool,
    ) {
        let shared = self
            .scopes
            .entry(scope.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default();

        let entry = SharedEntry {
            version,
            from: from.to_string(),
            eager,
            loaded: false,
            factory,
        };

        match shared.position(&entry.version) {
            Ok(i) if shared.entries[i].loaded => {
                debug!(
                    "keeping loaded {}@{} in scope `{}`",
                    key, entry.version, scope
                );
            }
            Ok(i) => {
                debug!("replacing {}@{} in scope `{}`", key, entry.version, scope);
                shared.entries[i] = entry;
            }
            Err(i) => {
                debug!("registered {}@{} in scope `{}`", key, entry.version, scope);
                shared.entries.insert(i, entry);
            }
        }
    }

    /// Mark a registered version as the active one for singleton checks.
    pub fn activate(&mut self, scope: &str, key: &str, version: &Version) -> Result<(), ShareError> {
        let shared = self.key_mut(scope, key);
        match shared {
            Some(shared) if shared.get(version).is_some() => {
                shared.activated = Some(version.clone());
                Ok(())
            }
            Some(shared) => Err(ShareError::NoSatisfyingVersion {
                scope: scope.to_string(),
                key: key.to_string(),
                required: version.to_string(),
                available: shared.versions(),
            }),
            None => Err(ShareError::NoSatisfyingVersion {
                scope: scope.to_string(),
                key: key.to_string(),
                required: version.to_string(),
                available: Vec::new(),
            }),
        }
    }

    /// Registered versions for `scope`/`key`, ascending.
    pub fn versions(&self, scope: &str, key: &str) -> Vec<Version> {
        self.key(scope, key)
            .map(|shared| shared.entries.iter().map(|e| e.version.clone()).collect())
            .unwrap_or_default()
    }

    /// The registered entry for an exact version.
    pub fn entry(&self, scope: &str, key: &str, version: &Version) -> Option<&SharedEntry> {
        self.key(scope, key).and_then(|shared| shared.get(version))
    }

    /// The activated version for `scope`/`key`.
    pub fn activated(&self, scope: &str, key: &str) -> Option<&Version> {
        self.key(scope, key).and_then(|shared| shared.activated.as_ref())
    }

    /// Scope names with at least one registration.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    /// Warnings emitted by non-strict singleton conflicts.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn key(&self, scope: &str, key: &str) -> Option<&SharedKey> {
        self.scopes.get(scope).and_then(|keys| keys.get(key))
    }

    fn key_mut(&mut self, scope: &str, key: &str) -> Option<&mut SharedKey> {
        self.scopes.get_mut(scope).and_then(|keys| keys.get_mut(key))
    }

    /// Call a named loader function the way a generated stub does.
    pub fn invoke(
        &mut self,
        function: LoaderFunction,
        scope: &str,
        key: &str,
        range: Option<&VersionRange>,
        fallback: Option<Factory>,
    ) -> Result<Resolved, ShareError> {
        let range = if function.is_versioned() { range } else { None };
        let fallback = if function.has_fallback() { fallback } else { None };

        let request = LoadRequest {
            scope,
            key,
            range,
            singleton: function.is_singleton(),
            strict: function.is_strict(),
            fallback,
        };
        self.resolve(request)
    }

    pub fn load(&mut self, scope: &str, key: &str, fallback: Option<Factory>) -> Result<Resolved, ShareError> {
        self.resolve(LoadRequest::new(scope, key).fallback(fallback))
    }

    pub fn load_singleton(
        &mut self,
        scope: &str,
        key: &str,
        fallback: Option<Factory>,
    ) -> Result<Resolved, ShareError> {
        self.resolve(LoadRequest::new(scope, key).singleton(true).fallback(fallback))
    }

    pub fn load_version_check(
        &mut self,
        scope: &str,
        key: &str,
        range: &VersionRange,
        fallback: Option<Factory>,
    ) -> Result<Resolved, ShareError> {
        self.resolve(LoadRequest::new(scope, key).range(range).fallback(fallback))
    }

    pub fn load_strict_version_check(
        &mut self,
        scope: &str,
        key: &str,
        range: &VersionRange,
        fallback: Option<Factory>,
    ) -> Result<Resolved, ShareError> {
        self.resolve(
            LoadRequest::new(scope, key)
                .range(range)
                .strict(true)
                .fallback(fallback),
        )
    }

    pub fn load_singleton_version_check(
        &mut self,
        scope: &str,
        key: &str,
        range: &VersionRange,
        fallback: Option<Factory>,
    ) -> Result<Resolved, ShareError> {
        self.resolve(
            LoadRequest::new(scope, key)
                .range(range)
                .singleton(true)
                .fallback(fallback),
        )
    }

    pub fn load_strict_singleton_version_check(
        &mut self,
        scope: &str,
        key: &str,
        range: &VersionRange,
        fallback: Option<Factory>,
    ) -> Result<Resolved, ShareError> {
        self.resolve(
            LoadRequest::new(scope, key)
                .range(range)
                .singleton(true)
                .strict(true)
                .fallback(fallback),
        )
    }

    /// Resolve a load request.
    pub fn resolve(&mut self, request: LoadRequest<'_>) -> Result<Resolved, ShareError> {
        let LoadRequest {
            scope,
            key,
            range,
            singleton,
            strict,
            ..
        } = request;

        let Some(shared) = self.key(scope, key) else {
            return Self::use_fallback(&request, Vec::new());
        };

        if singleton {
            if let Some(active) = shared.activated.clone() {
                if range.map_or(true, |r| r.matches(&active)) {
                    return self.load_entry(scope, key, &active);
                }

                let conflict = ShareError::VersionConflict {
                    scope: scope.to_string(),
                    key: key.to_string(),
                    required: request.required(),
                    active: active.to_string(),
                };

                if strict {
                    if request.fallback.is_some() {
                        debug!("{}, using fallback", conflict);
                        return Self::use_fallback(&request, shared.versions());
                    }
                    return Err(conflict);
                }

                let message = conflict.to_string();
                warn!("{}", message);
                self.warnings.push(message);
                return self.load_entry(scope, key, &active);
            }
        }

        let Some(chosen) = shared.highest_matching(range).map(|e| e.version.clone()) else {
            return Self::use_fallback(&request, shared.versions());
        };

        if singleton {
            if let Some(shared) = self.key_mut(scope, key) {
                shared.activated = Some(chosen.clone());
            }
        }
        self.load_entry(scope, key, &chosen)
    }

    fn load_entry(&mut self, scope: &str, key: &str, version: &Version) -> Result<Resolved, ShareError> {
        let shared = self
            .key_mut(scope, key)
            .ok_or_else(|| ShareError::NoSatisfyingVersion {
                scope: scope.to_string(),
                key: key.to_string(),
                required: version.to_string(),
                available: Vec::new(),
            })?;
        let index = shared
            .position(version)
            .map_err(|_| ShareError::NoSatisfyingVersion {
                scope: scope.to_string(),
                key: key.to_string(),
                required: version.to_string(),
                available: shared.versions(),
            })?;

        let entry = &mut shared.entries[index];
        let module = (entry.factory)()?;
        entry.loaded = true;

        Ok(Resolved {
            source: ResolvedFrom::Shared {
                version: entry.version.clone(),
                from: entry.from.clone(),
            },
            module,
        })
    }

    fn use_fallback(request: &LoadRequest<'_>, available: Vec<String>) -> Result<Resolved, ShareError> {
        match &request.fallback {
            Some(fallback) => {
                debug!(
                    "no shared `{}` in scope `{}` fits `{}`, using fallback",
                    request.key,
                    request.scope,
                    request.required()
                );
                Ok(Resolved {
                    source: ResolvedFrom::Fallback,
                    module: fallback()?,
                })
            }
            None => Err(ShareError::NoSatisfyingVersion {
                scope: request.scope.to_string(),
                key: request.key.to_string(),
                required: request.required(),
                available,
            }),
        }
    }
}
