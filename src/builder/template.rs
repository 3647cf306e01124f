//! Runtime code templates emitted by shared units.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::builder::graph::ChunkGraph;
use crate::resolver::loader::LoaderFunction;

/// Runtime globals a generated snippet depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeGlobal {
    /// `__webpack_require__`
    Require,
    /// `__webpack_require__.e`
    EnsureChunk,
    /// `__webpack_require__.S`
    ShareScopeMap,
    /// `__webpack_require__.I`
    InitializeSharing,
}

impl RuntimeGlobal {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeGlobal::Require => "__webpack_require__",
            RuntimeGlobal::EnsureChunk => "__webpack_require__.e",
            RuntimeGlobal::ShareScopeMap => "__webpack_require__.S",
            RuntimeGlobal::InitializeSharing => "__webpack_require__.I",
        }
    }
}

impl fmt::Display for RuntimeGlobal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A JavaScript string literal.
pub fn string_literal(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Strip comment terminators from text embedded in a block comment.
fn comment(s: &str) -> String {
    format!("/*! {} */", s.replace("*/", "*_/"))
}

fn returning_function(body: &str) -> String {
    format!("() => ({})", body)
}

/// Expression that throws `MODULE_NOT_FOUND` for an unresolved request.
pub fn missing_module(request: &str) -> String {
    let message = string_literal(&format!("Cannot find module '{}'", request));
    format!(
        "Object(function webpackMissingModule() {{ var e = new Error({}); e.code = 'MODULE_NOT_FOUND'; throw e; }}())",
        message
    )
}

/// `__webpack_require__(id)` for a request, or a missing-module expression.
pub fn module_raw(
    chunk_graph: &ChunkGraph,
    request: &str,
    requirements: &mut BTreeSet<RuntimeGlobal>,
) -> String {
    match chunk_graph.module_id(request) {
        Some(id) => {
            requirements.insert(RuntimeGlobal::Require);
            format!(
                "{}({} {})",
                RuntimeGlobal::Require,
                comment(request),
                string_literal(id)
            )
        }
        None => missing_module(request),
    }
}

/// Promise that resolves once every chunk in `chunk_ids` is loaded.
pub fn block_promise(chunk_ids: &[String], requirements: &mut BTreeSet<RuntimeGlobal>) -> String {
    match chunk_ids {
        [] => "Promise.resolve()".to_string(),
        [id] => {
            requirements.insert(RuntimeGlobal::EnsureChunk);
            format!("{}({})", RuntimeGlobal::EnsureChunk, string_literal(id))
        }
        ids => {
            requirements.insert(RuntimeGlobal::EnsureChunk);
            let loads: Vec<String> = ids
                .iter()
                .map(|id| format!("{}({})", RuntimeGlobal::EnsureChunk, string_literal(id)))
                .collect();
            format!("Promise.all([{}])", loads.join(", "))
        }
    }
}

/// Factory returning the module synchronously.
pub fn sync_module_factory(
    chunk_graph: &ChunkGraph,
    request: &str,
    requirements: &mut BTreeSet<RuntimeGlobal>,
) -> String {
    returning_function(&module_raw(chunk_graph, request, requirements))
}

/// Factory returning a promise of a module factory, after the chunks
/// carrying `request` are loaded.
pub fn async_module_factory(
    chunk_graph: &ChunkGraph,
    request: &str,
    requirements: &mut BTreeSet<RuntimeGlobal>,
) -> String {
    let ensure = block_promise(&chunk_graph.chunks_of(request), requirements);
    let factory = returning_function(&module_raw(chunk_graph, request, requirements));

    if ensure.starts_with("Promise.resolve(") {
        returning_function(&factory)
    } else {
        returning_function(&format!("{}.then({})", ensure, returning_function(&factory)))
    }
}

/// Stub used in place of a fallback when a consume unit has none.
pub fn missing_fallback_stub(share_key: &str) -> String {
    let message = string_literal(&format!("Can not get '{}'", share_key));
    format!("() => () => {{ throw new Error({}); }}", message)
}

/// Invocation of a runtime loader function, as emitted for a consume unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderCall {
    pub function: LoaderFunction,
    pub share_scope: String,
    pub share_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_version: Option<String>,
    /// Fallback factory code, when a fallback is bundled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl LoaderCall {
    /// Render `fn("scope", "key"[, "range"][, fallback])`.
    pub fn render(&self) -> String {
        let mut args = vec![
            string_literal(&self.share_scope),
            string_literal(&self.share_key),
        ];
        if let Some(range) = &self.required_version {
            args.push(string_literal(range));
        }
        if let Some(fallback) = &self.fallback {
            args.push(fallback.clone());
        }
        format!("{}({})", self.function, args.join(", "))
    }
}

impl fmt::Display for LoaderCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
