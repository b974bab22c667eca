use std::fs;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde_json::Value;
use soil_rules::{PermissionTree, RulesCompiler};
use tracing::info;

use crate::cli::*;
use crate::config::SoilConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = SoilConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Rules { action } => match action {
            RulesAction::Compile(args) => cmd_compile(&config, args),
            RulesAction::Digest => cmd_digest(&config),
            RulesAction::Check(args) => cmd_check(&config, args),
        },
        Command::Config { action: ConfigAction::Show } => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn compile(config: &SoilConfig) -> anyhow::Result<PermissionTree> {
    RulesCompiler::new(config.rules.clone())
        .compile()
        .context("compiling permission rules")
}

/// The rendered artifact and its digest.
pub fn render_artifact(config: &SoilConfig, pretty: bool) -> anyhow::Result<(String, String)> {
    let tree = compile(config)?;
    let mut artifact = tree.to_json_string(pretty)?;
    artifact.push('\n');
    Ok((artifact, tree.digest()?))
}

fn cmd_compile(config: &SoilConfig, args: CompileArgs) -> anyhow::Result<()> {
    let (artifact, digest) = render_artifact(config, args.pretty)?;
    match &args.out {
        Some(out) => {
            fs::write(out, &artifact).with_context(|| format!("writing {}", out.display()))?;
            info!(out = %out.display(), digest = %digest, "wrote rules artifact");
            println!("{} Wrote {}", "✓".green().bold(), out.display().to_string().bold());
            println!("  Digest: {}", digest.cyan());
        }
        None => print!("{artifact}"),
    }
    Ok(())
}

fn cmd_digest(config: &SoilConfig) -> anyhow::Result<()> {
    println!("{}", compile(config)?.digest()?);
    Ok(())
}

fn read_snapshot(path: &Path) -> anyhow::Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing snapshot {}", path.display()))
}

/// Evaluate one operation against snapshot files.
pub fn check(config: &SoilConfig, args: &CheckArgs) -> anyhow::Result<bool> {
    let tree = compile(config)?;
    let before = read_snapshot(&args.before)?;
    let auth = args.auth.as_deref();
    let allowed = match args.op {
        Operation::Read => tree.can_read(&args.path, &before, auth)?,
        Operation::Write => {
            let after = match &args.after {
                Some(path) => read_snapshot(path)?,
                None => before.clone(),
            };
            tree.can_write(&args.path, &before, &after, auth)?
        }
    };
    Ok(allowed)
}

fn cmd_check(config: &SoilConfig, args: CheckArgs) -> anyhow::Result<()> {
    let allowed = check(config, &args)?;
    let who = args.auth.as_deref().unwrap_or("anonymous");
    let op = match args.op {
        Operation::Read => "read",
        Operation::Write => "write",
    };
    if allowed {
        println!("{} {} {} as {}", "allowed".green().bold(), op, args.path.bold(), who.yellow());
    } else {
        println!("{} {} {} as {}", "denied".red().bold(), op, args.path.bold(), who.yellow());
    }
    Ok(())
}
