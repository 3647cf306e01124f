//! `fedshare build` command

use anyhow::{bail, Result};

use crate::cli::{BuildArgs, GlobalArgs};
use crate::commands::load_federation;
use fedshare::builder::child::{BuildTarget, DEFAULT_CHILD_TIMEOUT};
use fedshare::builder::BuildMode;
use fedshare::ops::{build, format_build_result, BuildOptions};
use fedshare::util::GlobalContext;

pub fn execute(args: BuildArgs, global: GlobalArgs) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(global.verbose);
    ctx.set_color(global.color);

    let (root, federation) = load_federation(&ctx, args.config.as_deref())?;

    // Load configuration (global + project)
    let config = ctx.load_config(&root);

    // Mode: CLI > config > development
    let mode = match &args.mode {
        Some(m) => m.parse::<BuildMode>().map_err(|e| anyhow::anyhow!(e))?,
        None => config.mode().unwrap_or_default(),
    };

    let format = args
        .message_format
        .or_else(|| config.build.message_format.clone())
        .unwrap_or_else(|| "human".to_string());
    if format != "human" && format != "json" {
        bail!("invalid message format `{}` (expected human or json)", format);
    }

    let children = args
        .children
        .iter()
        .map(|name| match name.as_str() {
            "client" => Ok(BuildTarget::Client),
            "server" => Ok(BuildTarget::Server),
            other => Err(anyhow::anyhow!(
                "unknown child target `{}` (expected client or server)",
                other
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    let opts = BuildOptions {
        mode,
        // Jobs: CLI > config > None (auto-detect)
        jobs: args.jobs.or(config.build.jobs),
        use_cache: args.cache,
        children,
        child_timeout: config.child_timeout().unwrap_or(DEFAULT_CHILD_TIMEOUT),
    };

    let result = build(&root, &federation, &opts)?;

    if format == "json" {
        for event in &result.events {
            println!("{}", event.to_json());
        }
    } else {
        println!("{}", format_build_result(&result, args.sources));
        for warning in &result.warnings {
            eprintln!("warning: {}", warning);
        }
        for error in &result.errors {
            eprintln!("error: {}", error);
        }
    }

    if !result.success() {
        bail!(
            "build of `{}` failed with {} error(s)",
            federation.name(),
            result.errors.len()
        );
    }
    Ok(())
}
