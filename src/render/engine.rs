//! Template expansion and directory rendering.

use super::{
    Vars,
    error::{Error, Result},
    parser::{ParseOptions, Segment, Template, parse, parse_with},
};
use crate::transaction::Transaction;
use anyhow::{Context, bail};
use log::{debug, info};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

/// Expand every placeholder in `template` using `vars`.
///
/// Substitution is single pass: bound values are emitted verbatim and never
/// re-scanned. If any name is unbound, all unbound names are reported together
/// and no output is produced.
pub fn expand(template: &Template, vars: &Vars) -> Result<String> {
    let mut missing: Vec<String> = Vec::new();

    let capacity: usize = template
        .segments()
        .map(|s| match s {
            Segment::Lit(t) => t.len(),
            Segment::Esc(_) => 2,
            Segment::Var { name, .. } => vars.get(name).map_or(0, String::len),
        })
        .sum();

    let mut out = String::with_capacity(capacity);

    for seg in template.segments() {
        match seg {
            Segment::Lit(t) => out.push_str(t),
            Segment::Esc(_) => out.push_str("{{"),
            Segment::Var { name, .. } => match vars.get(name) {
                Some(v) => out.push_str(v),
                None => {
                    if !missing.iter().any(|m| m == name) {
                        missing.push(name.to_owned());
                    }
                }
            },
        }
    }

    if !missing.is_empty() {
        debug!("expansion failed, unbound: {}", missing.join(", "));
        return Err(Error::UnresolvedVariable { names: missing });
    }
    Ok(out)
}

/// Parse and expand `src` in one step.
pub fn render_str(src: &str, vars: &Vars) -> Result<String> {
    expand(&parse(src)?, vars)
}

/// One template file and where its output goes, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub template: PathBuf,
    pub output: PathBuf,
}

/// Resolve which templates render to which output paths.
///
/// Templates under `overlay_dir` replace base templates at the same relative
/// path. Output paths are expanded with `vars` and lose the `.tpl` extension.
pub fn plan(
    templates_dir: &Path,
    overlay_dir: Option<&Path>,
    vars: &Vars,
) -> anyhow::Result<Vec<PlannedFile>> {
    if !templates_dir.is_dir() {
        bail!("templates directory not found: {}", templates_dir.display());
    }

    // Keyed by relative template path so overlays win and order is stable.
    let mut chosen: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
    for tpl in templates_in(templates_dir) {
        let rel = tpl.strip_prefix(templates_dir)?.to_path_buf();
        chosen.insert(rel, tpl);
    }
    if let Some(overlay) = overlay_dir.filter(|d| d.is_dir()) {
        for tpl in templates_in(overlay) {
            let rel = tpl.strip_prefix(overlay)?.to_path_buf();
            debug!("overlay template {}", rel.display());
            chosen.insert(rel, tpl);
        }
    }

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut planned = Vec::with_capacity(chosen.len());
    for (rel, template) in chosen {
        let output = output_path(&rel, vars)
            .with_context(|| format!("expand output path for {}", rel.display()))?;
        if !seen.insert(output.clone()) {
            bail!(
                "two templates render to the same output path: {}",
                output.display()
            );
        }
        planned.push(PlannedFile { template, output });
    }
    Ok(planned)
}

/// Render every planned template into `out_dir`, atomically.
///
/// All templates are expanded into a staging directory first; nothing under
/// `out_dir` changes unless every template renders. Existing files are only
/// replaced when `force` is set.
pub fn render_all(
    templates_dir: &Path,
    overlay_dir: Option<&Path>,
    out_dir: &Path,
    vars: &Vars,
    force: bool,
) -> anyhow::Result<Vec<PathBuf>> {
    let planned = plan(templates_dir, overlay_dir, vars)?;

    if !force {
        let clashes: Vec<String> = planned
            .iter()
            .map(|p| out_dir.join(&p.output))
            .filter(|p| fs::symlink_metadata(p).is_ok())
            .map(|p| p.display().to_string())
            .collect();
        if !clashes.is_empty() {
            bail!(
                "refusing to overwrite existing files (use --force): {}",
                clashes.join(", ")
            );
        }
    }

    let txn = Transaction::begin(out_dir).context("begin transaction")?;
    for file in &planned {
        render_one(&file.template, &file.output, vars, txn.stage())?;
    }
    let written = txn.commit(force).context("commit transaction")?;

    info!("rendered {} file(s) into {}", written.len(), out_dir.display());
    Ok(written)
}

/// Render a single template file to `stage / rel`.
fn render_one(tpl_path: &Path, rel: &Path, vars: &Vars, stage: &Path) -> anyhow::Result<()> {
    let src = fs::read_to_string(tpl_path)
        .with_context(|| format!("read template {}", tpl_path.display()))?;

    let rendered =
        render_str(&src, vars).with_context(|| format!("render {}", tpl_path.display()))?;

    let out_path = stage.join(rel);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output subdir {}", parent.display()))?;
    }
    fs::write(&out_path, rendered).with_context(|| format!("write {}", out_path.display()))
}

/// Strip `.tpl` from a relative template path, then expand each component.
///
/// Components are expanded one at a time with escapes off, so a `\` in a
/// file name (or a Windows separator) never turns into a `\{{` escape.
fn output_path(rel: &Path, vars: &Vars) -> anyhow::Result<PathBuf> {
    let parts: Vec<&str> = rel
        .components()
        .map(|c| match c {
            Component::Normal(part) => part
                .to_str()
                .with_context(|| format!("non UTF-8 template path {}", rel.display())),
            other => bail!("unexpected component {other:?} in {}", rel.display()),
        })
        .collect::<anyhow::Result<_>>()?;

    let Some((&file, dirs)) = parts.split_last() else {
        bail!("empty template path");
    };
    let file = file.strip_suffix(".tpl").unwrap_or(file);

    let mut out = PathBuf::new();
    for part in dirs.iter().copied().chain(std::iter::once(file)) {
        let expanded = expand_component(part, vars)?;
        if expanded.is_empty() {
            bail!("path component '{part}' expands to nothing");
        }
        out.push(expanded);
    }

    // Values may still carry separators; keep the result under the output root.
    if out.is_absolute()
        || out
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        bail!("output path escapes the output directory: {}", out.display());
    }
    Ok(out)
}

fn expand_component(part: &str, vars: &Vars) -> Result<String> {
    expand(&parse_with(part, ParseOptions { escapes: false })?, vars)
}

/// Walk `dir` and yield paths of all `*.tpl` files.
fn templates_in(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file() && e.path().extension().and_then(|x| x.to_str()) == Some("tpl")
        })
        .map(|e| e.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    #[test]
    fn substitutes_a_single_name() {
        let out = render_str("Hello, {{name}}!", &vars(&[("name", "World")])).unwrap();
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn adjacent_placeholders() {
        let out = render_str("{{a}}{{b}}", &vars(&[("a", "x"), ("b", "y")])).unwrap();
        assert_eq!(out, "xy");
    }

    #[test]
    fn repeated_placeholder_uses_same_value() {
        let out = render_str(
            "class {{name}}ServiceImpl implements {{ name }}Service",
            &vars(&[("name", "Order")]),
        )
        .unwrap();
        assert_eq!(out, "class OrderServiceImpl implements OrderService");
    }

    #[test]
    fn missing_variable_fails() {
        let err = render_str("{{missing}}", &Vars::new()).unwrap_err();
        match err {
            Error::UnresolvedVariable { names } => assert_eq!(names, vec!["missing"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_variables_are_aggregated_once_each() {
        let err = render_str("{{b}} {{a}} {{b}} {{ok}}", &vars(&[("ok", "1")])).unwrap_err();
        match err {
            Error::UnresolvedVariable { names } => assert_eq!(names, vec!["b", "a"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn plain_text_is_unchanged() {
        let src = "plain text, no placeholders";
        assert_eq!(render_str(src, &Vars::new()).unwrap(), src);
    }

    #[test]
    fn values_are_not_reexpanded() {
        let out = render_str("{{a}}", &vars(&[("a", "{{a}}")])).unwrap();
        assert_eq!(out, "{{a}}");
    }

    #[test]
    fn escape_emits_open_marker() {
        let out = render_str(r"\{{name}} = {{name}}", &vars(&[("name", "v")])).unwrap();
        assert_eq!(out, "{{name}} = v");
    }

    #[test]
    fn template_is_reusable_across_threads() {
        let t = parse("{{who}} says hi").unwrap();
        std::thread::scope(|s| {
            let handles: Vec<_> = ["a", "b", "c", "d"]
                .into_iter()
                .map(|who| {
                    let t = &t;
                    s.spawn(move || expand(t, &vars(&[("who", who)])).unwrap())
                })
                .collect();
            let outs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(outs, vec!["a says hi", "b says hi", "c says hi", "d says hi"]);
        });
    }

    #[test]
    fn render_all_writes_expanded_tree() {
        let tpl = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(
            tpl.path(),
            "service/impl/{{name}}ServiceImpl.java.tpl",
            "package {{appName}}.service.impl;\npublic class {{name}}ServiceImpl {}\n",
        );
        write(tpl.path(), "README.md.tpl", "# {{name}}\n");
        write(tpl.path(), "ignored.txt", "{{not rendered}}");

        let v = vars(&[("name", "Order"), ("appName", "com.acme.shop")]);
        let written = render_all(tpl.path(), None, out.path(), &v, false).unwrap();
        assert_eq!(written.len(), 2);

        let java =
            fs::read_to_string(out.path().join("service/impl/OrderServiceImpl.java")).unwrap();
        assert_eq!(
            java,
            "package com.acme.shop.service.impl;\npublic class OrderServiceImpl {}\n"
        );
        assert_eq!(
            fs::read_to_string(out.path().join("README.md")).unwrap(),
            "# Order\n"
        );
        assert!(!out.path().join("ignored.txt").exists());
    }

    #[test]
    fn overlay_replaces_base_template() {
        let base = TempDir::new().unwrap();
        let overlay = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(base.path(), "a.txt.tpl", "base {{x}}");
        write(base.path(), "b.txt.tpl", "only base");
        write(overlay.path(), "a.txt.tpl", "mine {{x}}");

        let v = vars(&[("x", "1")]);
        render_all(base.path(), Some(overlay.path()), out.path(), &v, false).unwrap();
        assert_eq!(fs::read_to_string(out.path().join("a.txt")).unwrap(), "mine 1");
        assert_eq!(fs::read_to_string(out.path().join("b.txt")).unwrap(), "only base");
    }

    #[test]
    fn failure_leaves_output_untouched() {
        let tpl = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(tpl.path(), "good.txt.tpl", "{{x}}");
        write(tpl.path(), "bad.txt.tpl", "{{y}}");

        let err = render_all(tpl.path(), None, out.path(), &vars(&[("x", "1")]), false)
            .unwrap_err();
        assert!(format!("{err:#}").contains("unresolved variable(s): y"));
        let left: Vec<_> = fs::read_dir(out.path()).unwrap().collect();
        assert!(left.is_empty());
    }

    #[test]
    fn existing_files_need_force() {
        let tpl = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(tpl.path(), "a.txt.tpl", "new");
        fs::write(out.path().join("a.txt"), "old").unwrap();

        assert!(render_all(tpl.path(), None, out.path(), &Vars::new(), false).is_err());
        assert_eq!(fs::read_to_string(out.path().join("a.txt")).unwrap(), "old");

        render_all(tpl.path(), None, out.path(), &Vars::new(), true).unwrap();
        assert_eq!(fs::read_to_string(out.path().join("a.txt")).unwrap(), "new");
    }

    #[test]
    fn plan_rejects_escaping_paths() {
        let tpl = TempDir::new().unwrap();
        write(tpl.path(), "{{dir}}/x.tpl", "");
        let err = plan(tpl.path(), None, &vars(&[("dir", "..")])).unwrap_err();
        assert!(format!("{err:#}").contains("escapes"));
    }

    #[test]
    fn plan_reports_outputs_without_writing() {
        let tpl = TempDir::new().unwrap();
        write(tpl.path(), "{{name}}DTO.java.tpl", "");
        let planned = plan(tpl.path(), None, &vars(&[("name", "User")])).unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].output, PathBuf::from("UserDTO.java"));
    }

    #[test]
    fn backslash_before_placeholder_in_file_name_still_expands() {
        assert_eq!(
            expand_component(r"pkg\{{name}}Impl.java", &vars(&[("name", "Order")])).unwrap(),
            r"pkg\OrderImpl.java"
        );
    }

    #[cfg(unix)]
    #[test]
    fn plan_expands_names_containing_backslashes() {
        let tpl = TempDir::new().unwrap();
        write(tpl.path(), r"pkg\{{name}}.java.tpl", "");
        let planned = plan(tpl.path(), None, &vars(&[("name", "Order")])).unwrap();
        assert_eq!(planned[0].output, PathBuf::from(r"pkg\Order.java"));
    }

    #[test]
    fn tpl_suffix_is_stripped_before_expansion() {
        let tpl = TempDir::new().unwrap();
        write(tpl.path(), "{{name}}.tpl", "");
        let planned = plan(tpl.path(), None, &vars(&[("name", "Main.java")])).unwrap();
        assert_eq!(planned[0].output, PathBuf::from("Main.java"));

        let err = plan(tpl.path(), None, &vars(&[("name", "")])).unwrap_err();
        assert!(format!("{err:#}").contains("expands to nothing"));
    }

    #[test]
    fn empty_directory_component_is_rejected() {
        let tpl = TempDir::new().unwrap();
        write(tpl.path(), "{{dir}}/A.java.tpl", "");
        let err = plan(tpl.path(), None, &vars(&[("dir", "")])).unwrap_err();
        assert!(format!("{err:#}").contains("expands to nothing"));
    }

    #[test]
    fn missing_templates_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(plan(&dir.path().join("nope"), None, &Vars::new()).is_err());
    }
}
