use anyhow::{Context, Result};
use std::path::PathBuf;

/// Immutable bag of default paths used by the CLI.
/// Constructed once at startup; never mutated after that.
#[derive(Clone, Debug)]
pub struct Ctx {
    pub config_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub user_templates_dir: PathBuf,
    pub vars_file: PathBuf,
}

impl Ctx {
    /// Construct paths from environment variables.
    pub fn new() -> Result<Self> {
        let xdg = std::env::var("XDG_CONFIG_HOME").ok();
        let home = std::env::var("HOME").ok();
        Self::resolve(xdg.as_deref(), home.as_deref())
    }

    fn resolve(xdg: Option<&str>, home: Option<&str>) -> Result<Self> {
        let base = match xdg.filter(|s| !s.is_empty()) {
            Some(x) => PathBuf::from(x),
            None => PathBuf::from(home.context("$HOME is not set")?).join(".config"),
        };
        Ok(Self::rooted(base.join("tplgen")))
    }

    /// Lay out the default paths under `config_dir`.
    fn rooted(config_dir: PathBuf) -> Self {
        Self {
            templates_dir: config_dir.join("templates"),
            user_templates_dir: config_dir.join("user-templates"),
            vars_file: config_dir.join("vars.toml"),
            config_dir,
        }
    }
}
