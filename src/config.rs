//! A minimal section-based configuration reader.
//!
//! Named out of scope as an external collaborator (§1/§2 of SPEC_FULL), but
//! an engine still has to be built from *something* — this is kept
//! deliberately small: one flat level of `[section]` blocks, `key = value`
//! lines, no nesting, no environment interpolation, no schema beyond what
//! `Schema::new` itself validates. Grounded on
//! `original_source/gendas/engine.py:Gendas.__init__`'s use of `ConfigObj`
//! for the shape of the keys it reads (`type`, `file`, `header`, `ctypes`,
//! `sequence`, `begin`, `end`, `indices`).
use crate::error::{EngineError, Result};
use crate::value::ColumnType;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct SourceConfig {
    pub label: String,
    pub kind: String,
    pub file: PathBuf,
    pub header: Vec<String>,
    pub ctypes: Vec<ColumnType>,
    pub sequence: String,
    pub begin: String,
    pub end: String,
    pub indices: Vec<String>,
}

/// Parse every `[label]` section of a config file into a `SourceConfig`.
/// `file` paths are resolved relative to the config file's own directory.
pub fn load(path: &Path) -> Result<Vec<SourceConfig>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            sections.push((name.trim().to_string(), Vec::new()));
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(EngineError::Config(format!("malformed line in {}: '{raw_line}'", path.display())));
        };
        let section = sections.last_mut().ok_or_else(|| {
            EngineError::Config(format!("key before any [section] in {}: '{raw_line}'", path.display()))
        })?;
        section.1.push((key.trim().to_string(), unquote(value.trim())));
    }

    sections
        .into_iter()
        .map(|(label, keys)| build_source_config(path, base, label, keys))
        .collect()
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\''))) {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

fn build_source_config(
    config_path: &Path,
    base: &Path,
    label: String,
    keys: Vec<(String, String)>,
) -> Result<SourceConfig> {
    let get = |name: &str| -> Result<String> {
        keys.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "section [{label}] in {} is missing required key '{name}'",
                    config_path.display()
                ))
            })
    };
    let kind = get("type")?;
    let file = base.join(get("file")?);
    let header = split_list(&get("header")?);
    let ctypes = split_list(&get("ctypes")?)
        .iter()
        .map(|s| ColumnType::parse_name(s))
        .collect::<Result<Vec<_>>>()?;
    let sequence = get("sequence")?;
    let begin = get("begin")?;
    let end = get("end")?;
    let indices = keys
        .iter()
        .find(|(k, _)| k == "indices")
        .map(|(_, v)| split_list(v))
        .unwrap_or_default();
    Ok(SourceConfig {
        label,
        kind,
        file,
        header,
        ctypes,
        sequence,
        begin,
        end,
        indices,
    })
}
