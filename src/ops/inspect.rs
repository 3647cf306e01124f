//! Implementation of `fedshare normalize` and human build output.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use serde_json::{json, Value};

use crate::builder::module::SourceType;
use crate::core::descriptor::ShareDescriptor;
use crate::core::federation::FederationConfig;
use crate::ops::share_build::BuildResult;

/// Normalized descriptors of a config, split by kind.
pub fn normalize(context: &Path, config: &FederationConfig) -> Result<Vec<ShareDescriptor>> {
    Ok(config.normalize(context)?)
}

/// JSON document printed by `fedshare normalize`.
pub fn descriptors_json(config: &FederationConfig, descriptors: &[ShareDescriptor]) -> Value {
    let (consumes, provides): (Vec<_>, Vec<_>) =
        descriptors.iter().partition(|d| d.is_consume());
    json!({
        "name": config.name(),
        "consumes": consumes,
        "provides": provides,
    })
}

/// Human-readable build report.
pub fn format_build_result(result: &BuildResult, show_sources: bool) -> String {
    let mut out = String::new();

    for unit in &result.units {
        let _ = writeln!(out, "{}{}", unit.readable, if unit.fresh { " (fresh)" } else { "" });
        if let Some(call) = &unit.code.loader_call {
            let _ = writeln!(out, "  loader: {}", call.render());
        }
        if let Some(init) = unit
            .code
            .data
            .get(SourceType::ShareInit.as_str())
            .and_then(|data| data[0]["init"].as_str())
        {
            let _ = writeln!(out, "  init: {}", init);
        }
        if show_sources {
            for (source_type, source) in &unit.code.sources {
                let _ = writeln!(out, "  {}: {}", source_type, source);
            }
        }
    }

    for (key, reason) in &result.skipped {
        let _ = writeln!(out, "skipped {}: {}", key, reason);
    }

    for report in &result.children {
        let status = if report.success { "ok" } else { "FAILED" };
        let _ = writeln!(
            out,
            "child build {}: {} ({}ms)",
            report.target, status, report.duration_ms
        );
        for asset in &report.assets {
            let _ = writeln!(out, "  asset: {}", asset);
        }
    }

    let _ = write!(
        out,
        "{} units, {} skipped, {} warnings, {} errors",
        result.units.len(),
        result.skipped.len(),
        result.warnings.len(),
        result.errors.len()
    );
    out
}
