//! `fedshare normalize` command

use anyhow::Result;

use crate::cli::{GlobalArgs, NormalizeArgs};
use crate::commands::load_federation;
use fedshare::ops::{descriptors_json, normalize};
use fedshare::util::GlobalContext;

pub fn execute(args: NormalizeArgs, global: GlobalArgs) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(global.verbose);
    ctx.set_color(global.color);

    let (root, config) = load_federation(&ctx, args.config.as_deref())?;
    let descriptors = normalize(&root, &config)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&descriptors_json(&config, &descriptors))?
    );
    Ok(())
}
