//! Staged output: render into a temp dir, then move files into place.
use anyhow::{Context, Result, bail};
use log::debug;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::{Builder, TempDir};
use walkdir::WalkDir;

pub struct Transaction {
    stage: TempDir,
    out_dir: PathBuf,
}

impl Transaction {
    /// Create a fresh staging directory inside `out_dir`.
    ///
    /// Staging on the same filesystem as the destination keeps every
    /// commit step a plain rename.
    pub fn begin(out_dir: &Path) -> Result<Self> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("create output dir {}", out_dir.display()))?;

        let stage = Builder::new()
            .prefix(".tplgen-stage.")
            .tempdir_in(out_dir)
            .context("create staging dir")?;

        Ok(Self {
            stage,
            out_dir: out_dir.to_path_buf(),
        })
    }

    /// Path callers write rendered files into.
    #[inline]
    pub fn stage(&self) -> &Path {
        self.stage.path()
    }

    /// Move every staged file to the same relative path under `out_dir`.
    ///
    /// Returns the destination paths. The staging dir is removed on drop,
    /// whether or not the commit succeeds.
    pub fn commit(self, force: bool) -> Result<Vec<PathBuf>> {
        let stage = self.stage.path();

        let staged: Vec<PathBuf> = WalkDir::new(stage)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();

        let mut written = Vec::with_capacity(staged.len());
        for src in staged {
            let rel = src.strip_prefix(stage)?;
            let dest = self.out_dir.join(rel);

            if fs::symlink_metadata(&dest).is_ok() {
                if !force {
                    bail!("output appeared during render: {}", dest.display());
                }
                remove_any(&dest)
                    .with_context(|| format!("replace existing {}", dest.display()))?;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create parent dir {}", parent.display()))?;
            }

            fs::rename(&src, &dest)
                .with_context(|| format!("rename {} -> {}", src.display(), dest.display()))?;
            debug!("wrote {}", dest.display());
            written.push(dest);
        }

        Ok(written)
    }
}

/// Remove a path regardless of whether it is a file, symlink, or directory.
fn remove_any(p: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(p).with_context(|| format!("stat {}", p.display()))?;

    if meta.is_dir() {
        fs::remove_dir_all(p)
    } else {
        fs::remove_file(p)
    }
    .with_context(|| format!("remove {}", p.display()))
}
