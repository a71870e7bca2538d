//! Building variable mappings from TOML files and `NAME=VALUE` pairs.

use crate::render::{Error, Vars, parser::is_valid_name};
use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Load variables from a TOML file, flattening nested tables into dotted names.
pub fn from_toml(path: &Path) -> Result<Vars> {
    let src = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    from_toml_str(&src).with_context(|| format!("parse {}", path.display()))
}

pub fn from_toml_str(src: &str) -> Result<Vars> {
    let table: toml::Value = toml::from_str(src)?;
    let mut vars = Vars::new();
    flatten("", &table, &mut vars);
    Ok(vars)
}

/// Flatten a TOML value into `prefix.key = string` pairs.
fn flatten(prefix: &str, value: &toml::Value, out: &mut Vars) {
    match value {
        toml::Value::Table(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(&key, v, out);
            }
        }
        toml::Value::String(s) => {
            out.insert(prefix.to_owned(), s.clone());
        }
        toml::Value::Integer(i) => {
            out.insert(prefix.to_owned(), i.to_string());
        }
        toml::Value::Float(f) => {
            out.insert(prefix.to_owned(), f.to_string());
        }
        toml::Value::Boolean(b) => {
            out.insert(prefix.to_owned(), b.to_string());
        }
        // Arrays and datetimes have no single-string form.
        _ => log::debug!("skipping non-scalar variable '{prefix}'"),
    }
}

/// Split a `NAME=VALUE` argument. The value may contain further `=`.
pub fn parse_pair(arg: &str) -> std::result::Result<(String, String), Error> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| Error::InvalidBinding(arg.to_owned()))?;
    let name = name.trim();
    if !is_valid_name(name) {
        return Err(Error::InvalidBinding(arg.to_owned()));
    }
    Ok((name.to_owned(), value.to_owned()))
}

/// Add `<key>CamelCase` and `<key>PascalCase` variants for every non-empty
/// value. Explicit bindings always win over derived ones.
pub fn derive_cases(vars: &mut Vars) {
    let derived: Vec<(String, String)> = vars
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .flat_map(|(k, v)| {
            [
                (format!("{k}CamelCase"), lower_first(v)),
                (format!("{k}PascalCase"), upper_first(v)),
            ]
        })
        .collect();

    for (k, v) in derived {
        vars.entry(k).or_insert(v);
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
