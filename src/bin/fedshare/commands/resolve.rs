//! `fedshare resolve` command

use anyhow::{bail, Result};

use crate::cli::{GlobalArgs, ResolveArgs};
use fedshare::ops::{simulate, RegistrySnapshot, ResolveOptions};
use fedshare::util::diagnostic::{emit, Diagnostic};
use fedshare::util::GlobalContext;

pub fn execute(args: ResolveArgs, global: GlobalArgs) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(global.verbose);
    ctx.set_color(global.color);

    let state = ctx.resolve_path(&args.state);
    let snapshot = RegistrySnapshot::load(&state)?;
    let mut runtime = snapshot.into_runtime()?;

    let opts = ResolveOptions {
        scope: args.scope,
        key: args.key,
        range: args.range,
        singleton: args.singleton,
        strict: args.strict,
        fallback: args.fallback,
    };

    let outcome = match simulate(&mut runtime, &opts) {
        Ok(outcome) => outcome,
        Err(e) => {
            emit(&e.to_diagnostic().with_location(&state), ctx.color());
            bail!("could not resolve `{}` in share scope `{}`", opts.key, opts.scope);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    for warning in &outcome.warnings {
        emit(&Diagnostic::warning(warning), ctx.color());
    }
    match (&outcome.version, &outcome.from) {
        (Some(version), Some(from)) if !from.is_empty() => {
            println!("{} {}@{} from {}", outcome.function, opts.key, version, from)
        }
        (Some(version), _) => println!("{} {}@{}", outcome.function, opts.key, version),
        _ => println!("{} {} -> fallback", outcome.function, opts.key),
    }
    Ok(())
}
