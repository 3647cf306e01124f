//! Consume shared module.
//!
//! One unit per consumed share key. Code generation yields the fallback
//! factory (or a throwing stub) plus the runtime loader call that resolves
//! the key from the share scope at startup.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::builder::module::{
    attach_dependency, AsyncBlock, BuildError, BuildInfo, BuildUnit, CodeGenContext,
    CodeGenerationResult, DependencyKind, ModuleDependency, RequestShortener, SourceType,
};
use crate::builder::template::{
    async_module_factory, missing_fallback_stub, sync_module_factory, LoaderCall, RuntimeGlobal,
};
use crate::core::descriptor::{Setting, ShareDescriptor};
use crate::resolver::loader::LoaderFunction;
use crate::util::hash::Fingerprint;

const SOURCE_TYPES: &[SourceType] = &[SourceType::ConsumeShared];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumeSharedModule {
    options: ShareDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build_info: Option<BuildInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<ModuleDependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<AsyncBlock>,
}

impl ConsumeSharedModule {
    pub fn new(options: ShareDescriptor) -> Self {
        let layer = options.layer.clone();
        ConsumeSharedModule {
            options,
            layer,
            build_info: None,
            dependencies: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    /// The runtime function this unit calls.
    pub fn loader_function(&self) -> LoaderFunction {
        LoaderFunction::select(
            self.options.required_range().is_some(),
            self.options.strict_version,
            self.options.singleton,
            self.options.fallback().is_some(),
        )
    }

    fn required_version_label(&self) -> String {
        match &self.options.required_version {
            Setting::Value(range) => range.to_string(),
            Setting::Disabled => "false".to_string(),
            Setting::Unset => String::new(),
        }
    }
}

impl BuildUnit for ConsumeSharedModule {
    fn identifier(&self) -> String {
        let o = &self.options;
        format!(
            "consume-shared-module|{}|{}|{}|{}|{}|{}|{}|{}",
            o.share_scope.joined(),
            o.share_key,
            self.required_version_label(),
            o.strict_version,
            o.fallback().unwrap_or_default(),
            o.singleton,
            o.eager,
            self.layer.as_deref().unwrap_or_default()
        )
    }

    fn readable_identifier(&self, shortener: &RequestShortener) -> String {
        let o = &self.options;
        let range = o
            .required_range()
            .map(ToString::to_string)
            .unwrap_or_else(|| "*".to_string());

        let mut out = format!(
            "consume shared module ({}) {}@{}",
            o.share_scope.joined(),
            o.share_key,
            range
        );
        if o.strict_version {
            out.push_str(" (strict)");
        }
        if o.singleton {
            out.push_str(" (singleton)");
        }
        if let Some(fallback) = o.fallback() {
            out.push_str(&format!(" (fallback: {})", shortener.shorten(fallback)));
        }
        if o.eager {
            out.push_str(" (eager)");
        }
        if let Some(layer) = &self.layer {
            out.push_str(&format!(" ({})", layer));
        }
        out
    }

    fn lib_ident(&self) -> String {
        let o = &self.options;
        let layer = self
            .layer
            .as_deref()
            .map(|l| format!("({})/", l))
            .unwrap_or_default();
        let fallback = o
            .fallback_request
            .as_deref()
            .map(|r| format!("/{}", r))
            .unwrap_or_default();
        format!(
            "{}webpack/sharing/consume/{}/{}{}",
            layer,
            o.share_scope.joined(),
            o.share_key,
            fallback
        )
    }

    fn descriptor(&self) -> &ShareDescriptor {
        &self.options
    }

    fn build_info(&self) -> Option<&BuildInfo> {
        self.build_info.as_ref()
    }

    fn build(&mut self) -> Result<(), BuildError> {
        self.dependencies.clear();
        self.blocks.clear();

        if let Some(fallback) = self.options.fallback() {
            let dependency = ModuleDependency::new(DependencyKind::ConsumeFallback, fallback);
            attach_dependency(
                &mut self.dependencies,
                &mut self.blocks,
                dependency,
                self.options.eager,
            );
        }

        self.build_info = Some(BuildInfo { hash: self.hash() });
        Ok(())
    }

    fn dependencies(&self) -> &[ModuleDependency] {
        &self.dependencies
    }

    fn blocks(&self) -> &[AsyncBlock] {
        &self.blocks
    }

    fn source_types(&self) -> &'static [SourceType] {
        SOURCE_TYPES
    }

    fn update_hash(&self, fp: &mut Fingerprint) {
        fp.update_str(&self.identifier());
        fp.update_json(&self.options);
    }

    fn code_generation(&self, ctx: &CodeGenContext<'_>) -> CodeGenerationResult {
        let o = &self.options;
        let mut requirements = BTreeSet::from([RuntimeGlobal::ShareScopeMap]);

        let fallback_code = o.fallback().map(|request| {
            if o.eager {
                sync_module_factory(ctx.chunk_graph, request, &mut requirements)
            } else {
                async_module_factory(ctx.chunk_graph, request, &mut requirements)
            }
        });

        let source = fallback_code
            .clone()
            .unwrap_or_else(|| missing_fallback_stub(&o.share_key));

        let loader_call = LoaderCall {
            function: self.loader_function(),
            share_scope: o.share_scope.primary().to_string(),
            share_key: o.share_key.clone(),
            required_version: o.required_range().map(ToString::to_string),
            fallback: fallback_code,
        };

        let mut result = CodeGenerationResult {
            runtime_requirements: requirements,
            ..Default::default()
        };
        result.sources.insert(SourceType::ConsumeShared, source);
        result.data.insert(
            SourceType::ConsumeShared.to_string(),
            serde_json::to_value(o).unwrap_or_default(),
        );
        result.data.insert(
            "loader-call".to_string(),
            serde_json::Value::from(loader_call.render()),
        );
        result.loader_call = Some(loader_call);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::graph::ChunkGraph;
    use crate::core::descriptor::{RequiredVersion, ShareScope};

    fn react(eager: bool) -> ShareDescriptor {
        let mut d = ShareDescriptor::consume("react");
        d.required_version = RequiredVersion::parse("^18.0.0").unwrap();
        d.strict_version = true;
        d.singleton = true;
        d.eager = eager;
        d.fallback_request = Some("react".into());
        d.fallback_resolved = Some("/app/node_modules/react/index.js".into());
        d
    }

    fn chunk_graph() -> ChunkGraph {
        let mut graph = ChunkGraph::default();
        graph.insert_module("/app/node_modules/react/index.js", "./node_modules/react/index.js");
        graph.add_chunk("/app/node_modules/react/index.js", "node_modules_react_index_js");
        graph
    }

    #[test]
    fn test_identifier_is_deterministic() {
        let a = ConsumeSharedModule::new(react(false));
        let b = ConsumeSharedModule::new(react(false));
        assert_eq!(a.identifier(), b.identifier());
        assert_eq!(a.lib_ident(), b.lib_ident());
        assert_eq!(
            a.identifier(),
            "consume-shared-module|default|react|^18.0.0|true|/app/node_modules/react/index.js|true|false|"
        );

        let eager = ConsumeSharedModule::new(react(true));
        assert_ne!(a.identifier(), eager.identifier());
    }

    #[test]
    fn test_lib_ident_with_layer() {
        let mut d = react(false);
        d.layer = Some("ssr".into());
        d.share_scope = ShareScope::Multiple(vec!["default".into(), "legacy".into()]);
        let unit = ConsumeSharedModule::new(d);
        assert_eq!(
            unit.lib_ident(),
            "(ssr)/webpack/sharing/consume/default|legacy/react/react"
        );
    }

    #[test]
    fn test_readable_identifier() {
        let unit = ConsumeSharedModule::new(react(true));
        let shortener = RequestShortener::new("/app");
        assert_eq!(
            unit.readable_identifier(&shortener),
            "consume shared module (default) react@^18.0.0 (strict) (singleton) (fallback: ./node_modules/react/index.js) (eager)"
        );
    }

    #[test]
    fn test_build_is_idempotent_and_splits_eager() {
        let mut lazy = ConsumeSharedModule::new(react(false));
        assert!(lazy.need_build());
        lazy.build().unwrap();
        assert!(!lazy.need_build());
        assert!(lazy.dependencies().is_empty());
        assert_eq!(lazy.blocks().len(), 1);

        lazy.build().unwrap();
        assert_eq!(lazy.blocks().len(), 1);

        let mut eager = ConsumeSharedModule::new(react(true));
        eager.build().unwrap();
        assert_eq!(eager.dependencies().len(), 1);
        assert!(eager.blocks().is_empty());
    }

    #[test]
    fn test_code_generation_lazy() {
        let unit = ConsumeSharedModule::new(react(false));
        let graph = chunk_graph();
        let result = unit.code_generation(&CodeGenContext {
            chunk_graph: &graph,
        });

        let call = result.loader_call.as_ref().unwrap();
        assert_eq!(call.function.as_str(), "loadStrictSingletonVersionCheckFallback");
        let rendered = call.render();
        assert!(rendered.starts_with(
            r#"loadStrictSingletonVersionCheckFallback("default", "react", "^18.0.0", () => (__webpack_require__.e("node_modules_react_index_js")"#
        ));
        assert!(result.runtime_requirements.contains(&RuntimeGlobal::ShareScopeMap));
        assert!(result.runtime_requirements.contains(&RuntimeGlobal::EnsureChunk));
        assert_eq!(result.data["consume-shared"]["shareKey"], "react");
    }

    #[test]
    fn test_missing_fallback_generates_throwing_stub() {
        let mut d = ShareDescriptor::consume("react");
        d.fallback_request = None;
        let unit = ConsumeSharedModule::new(d);
        let graph = ChunkGraph::default();
        let result = unit.code_generation(&CodeGenContext {
            chunk_graph: &graph,
        });

        let source = &result.sources[&SourceType::ConsumeShared];
        assert!(source.contains("throw new Error(\"Can not get 'react'\")"));
        assert_eq!(result.loader_call.unwrap().render(), r#"load("default", "react")"#);
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut unit = ConsumeSharedModule::new(react(false));
        unit.build().unwrap();
        let graph = chunk_graph();
        let ctx = CodeGenContext {
            chunk_graph: &graph,
        };

        let json = serde_json::to_string(&unit).unwrap();
        let back: ConsumeSharedModule = serde_json::from_str(&json).unwrap();

        assert_eq!(back, unit);
        assert_eq!(back.identifier(), unit.identifier());
        assert_eq!(back.code_generation(&ctx), unit.code_generation(&ctx));
        assert!(!back.need_build());
    }
}
