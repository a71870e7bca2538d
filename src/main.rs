//! `tplgen`: render `{{ name }}` templates and scaffold source trees.
use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{debug, info};
use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};
use tplgen::{TemplateCache, Vars, ctx::Ctx, expand, render, vars};

#[derive(Parser)]
#[command(name = "tplgen", about = "Placeholder template expander and scaffolder")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct VarArgs {
    /// Bind a variable; may be repeated
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = vars::parse_pair)]
    vars: Vec<(String, String)>,

    /// TOML file of variables (default: <config>/vars.toml when present)
    #[arg(long)]
    vars_file: Option<PathBuf>,

    /// Also bind <name>CamelCase and <name>PascalCase for every variable
    #[arg(long)]
    derive: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Render a single template to stdout or a file
    Render {
        template: PathBuf,
        #[command(flatten)]
        vars: VarArgs,
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the variables a template references
    Vars { template: PathBuf },

    /// Render every *.tpl under the templates directory into OUT_DIR
    Scaffold {
        out_dir: PathBuf,
        /// Templates directory (default: <config>/templates)
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Overlay directory whose templates replace same-named ones
        /// (default: <config>/user-templates)
        #[arg(long)]
        overlay: Option<PathBuf>,
        #[command(flatten)]
        vars: VarArgs,
        /// Print the files that would be written and stop
        #[arg(long)]
        dry_run: bool,
        /// Write without asking for confirmation
        #[arg(short, long)]
        yes: bool,
        /// Replace files that already exist in OUT_DIR
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.cmd {
        Cmd::Render {
            template,
            vars: var_args,
            output,
        } => {
            // Config paths only supply the default vars file here.
            let ctx = Ctx::new()
                .inspect_err(|e| debug!("no config context: {e:#}"))
                .ok();
            cmd_render(ctx.as_ref(), &template, &var_args, output.as_deref())
        }

        Cmd::Vars { template } => cmd_vars(&template),

        Cmd::Scaffold {
            out_dir,
            templates,
            overlay,
            vars: var_args,
            dry_run,
            yes,
            force,
        } => {
            let ctx = Ctx::new().context("initialise context")?;
            let templates = templates.unwrap_or_else(|| ctx.templates_dir.clone());
            let overlay = overlay.unwrap_or_else(|| ctx.user_templates_dir.clone());
            let bound = collect_vars(Some(&ctx), &var_args)?;

            let planned = render::plan(&templates, Some(&overlay), &bound)?;
            println!("Files to be created:");
            for p in &planned {
                println!("  {}", out_dir.join(&p.output).display());
            }
            if dry_run {
                return Ok(());
            }

            if !yes {
                let stdin = std::io::stdin();
                let proceed = confirm(
                    "Do you want to create these files?",
                    stdin.lock(),
                    std::io::stderr(),
                )?;
                if !proceed {
                    eprintln!("File creation canceled.");
                    return Ok(());
                }
            }

            let written = render::render_all(&templates, Some(&overlay), &out_dir, &bound, force)
                .context("render templates")?;
            for path in written {
                println!("created {}", path.display());
            }
            Ok(())
        }
    }
}

/// Ask a yes/no question. Anything other than `y`/`yes`, including EOF, is no.
fn confirm(question: &str, mut input: impl BufRead, mut output: impl Write) -> Result<bool> {
    write!(output, "{question} [y/N] ").context("write prompt")?;
    output.flush().context("flush prompt")?;

    let mut answer = String::new();
    input.read_line(&mut answer).context("read confirmation")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn cmd_render(
    ctx: Option<&Ctx>,
    template: &Path,
    args: &VarArgs,
    output: Option<&Path>,
) -> Result<()> {
    let tpl = TemplateCache::global()
        .load(template)
        .with_context(|| format!("load template {}", template.display()))?;
    let bound = collect_vars(ctx, args)?;
    let rendered =
        expand(&tpl, &bound).with_context(|| format!("render {}", template.display()))?;

    match output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("write {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => std::io::stdout()
            .lock()
            .write_all(rendered.as_bytes())
            .context("write stdout")?,
    }
    Ok(())
}

fn cmd_vars(template: &Path) -> Result<()> {
    let tpl = TemplateCache::global()
        .load(template)
        .with_context(|| format!("load template {}", template.display()))?;
    for name in tpl.variables() {
        println!("{name}");
    }
    Ok(())
}

/// Merge variables: vars file first, then `--var` pairs, then derived cases.
fn collect_vars(ctx: Option<&Ctx>, args: &VarArgs) -> Result<Vars> {
    let default_file = ctx.map(|c| &c.vars_file).filter(|f| f.is_file());
    let mut bound = match (&args.vars_file, default_file) {
        (Some(path), _) => vars::from_toml(path)?,
        (None, Some(path)) => {
            debug!("using default vars file {}", path.display());
            vars::from_toml(path)?
        }
        (None, None) => Vars::new(),
    };

    bound.extend(args.vars.iter().cloned());

    if args.derive {
        vars::derive_cases(&mut bound);
    }
    Ok(bound)
}
