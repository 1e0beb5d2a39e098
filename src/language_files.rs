//! YAML translation files: flattening on read, nesting and emitting on
//! write.
//!
//! Message ids are dot-delimited paths into the nested YAML mapping. A file
//! in a sub-directory of the translations directory contributes the
//! directory path as an id prefix, so `feat/home/sv.yml` containing
//! `title: 'Hem'` holds message `feat.home.title`.

use crate::error::{LyraError, WriteLanguageFileError};
use crate::store::{StoreData, TextMap};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Flatten a nested YAML document into `dotted.key -> text`.
///
/// Numbers and booleans are stringified, `null` becomes an empty
/// (untranslated) string, and sequences are skipped.
pub fn flatten_yaml(value: &Value, prefix: Option<&str>) -> TextMap {
    let mut result = TextMap::new();
    flatten_yaml_value(value, prefix, &mut result);
    result
}

fn flatten_yaml_value(value: &Value, prefix: Option<&str>, result: &mut TextMap) {
    match value {
        Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key) = scalar_to_string(key) else {
                    warn!("Skipping non-scalar YAML key under {:?}", prefix);
                    continue;
                };
                let full_key = prefix.map_or_else(|| key.clone(), |p| format!("{}.{}", p, key));
                flatten_yaml_value(value, Some(&full_key), result);
            }
        }
        Value::Sequence(_) => {
            warn!("Skipping YAML sequence at {:?}", prefix);
        }
        Value::Tagged(tagged) => flatten_yaml_value(&tagged.value, prefix, result),
        Value::Null => {
            if let Some(key) = prefix {
                result.insert(key.to_string(), String::new());
            }
        }
        scalar => {
            if let (Some(key), Some(text)) = (prefix, scalar_to_string(scalar)) {
                result.insert(key.to_string(), text);
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Id prefix contributed by a source file path relative to its root.
pub fn prefix_for_source_file(relative: &Path) -> Option<String> {
    let parent = relative.parent()?;
    let parts: Vec<String> = parent
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

/// Nested form of a flat `TextMap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YamlNode {
    Text(String),
    Map(BTreeMap<String, YamlNode>),
}

/// Expand `a.b -> text` into `{a: {b: text}}`.
///
/// When one id is a prefix of another (`a` and `a.b`) the nested mapping
/// wins and the shorter id is dropped with a warning.
pub fn unflatten(texts: &TextMap) -> BTreeMap<String, YamlNode> {
    let mut root = BTreeMap::new();

    'ids: for (id, text) in texts {
        let segments: Vec<&str> = id.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut current = &mut root;
        for segment in parents {
            let node = current
                .entry(segment.to_string())
                .or_insert_with(|| YamlNode::Map(BTreeMap::new()));
            if let YamlNode::Text(_) = node {
                warn!("Message id {} shadows a shorter id, dropping the shorter one", id);
                *node = YamlNode::Map(BTreeMap::new());
            }
            let YamlNode::Map(map) = node else {
                continue 'ids;
            };
            current = map;
        }

        match current.get(*last) {
            Some(YamlNode::Map(_)) => {
                warn!("Message id {} collides with nested ids, dropping it", id);
            }
            _ => {
                current.insert(last.to_string(), YamlNode::Text(text.clone()));
            }
        }
    }

    root
}

/// Serialize a flat `TextMap` as a nested YAML document.
pub fn to_yaml_string(texts: &TextMap) -> String {
    let tree = unflatten(texts);
    if tree.is_empty() {
        return "{}\n".to_string();
    }
    let mut out = String::new();
    emit_map(&tree, 0, &mut out);
    out
}

fn emit_map(map: &BTreeMap<String, YamlNode>, indent: usize, out: &mut String) {
    for (key, node) in map {
        out.push_str(&" ".repeat(indent));
        out.push_str(&format_key(key));
        match node {
            YamlNode::Text(text) => {
                out.push_str(": ");
                out.push_str(&quote_text(text));
                out.push('\n');
            }
            YamlNode::Map(children) if children.is_empty() => out.push_str(": {}\n"),
            YamlNode::Map(children) => {
                out.push_str(":\n");
                emit_map(children, indent + 2, out);
            }
        }
    }
}

/// Words a YAML reader would not load back as plain strings.
const RESERVED_KEYS: &[&str] = &[
    "null", "Null", "NULL", "true", "True", "TRUE", "false", "False", "FALSE", "yes", "Yes",
    "YES", "no", "No", "NO", "on", "On", "ON", "off", "Off", "OFF", "y", "Y", "n", "N",
];

fn format_key(key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !key.starts_with('-')
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && !RESERVED_KEYS.contains(&key);
    if plain {
        key.to_string()
    } else {
        quote_text(key)
    }
}

/// Single-quoted YAML scalar, or a JSON-style double-quoted one when the
/// text contains characters single quotes cannot carry.
fn quote_text(text: &str) -> String {
    if text.chars().any(char::is_control) {
        serde_json::Value::String(text.to_string()).to_string()
    } else {
        format!("'{}'", text.replace('\'', "''"))
    }
}

/// Group every translation by the file it belongs to, with ids made
/// relative to that file's prefix.
pub fn group_by_source_file(data: &StoreData) -> BTreeMap<PathBuf, TextMap> {
    let mut files: BTreeMap<PathBuf, TextMap> = BTreeMap::new();

    for translations in data.languages.values() {
        for (id, translation) in translations {
            let key = match prefix_for_source_file(&translation.source_file) {
                Some(prefix) => match id.strip_prefix(&format!("{}.", prefix)) {
                    Some(rest) => rest.to_string(),
                    None => {
                        warn!(
                            "Message {} does not belong under {}, writing full id",
                            id,
                            translation.source_file.display()
                        );
                        id.clone()
                    }
                },
                None => id.clone(),
            };
            files
                .entry(translation.source_file.clone())
                .or_default()
                .insert(key, translation.text.clone());
        }
    }

    files
}

/// Write every file below `dir`, all in parallel.
///
/// Files that were written stay written even when others fail; the error
/// lists only the failures.
pub async fn write_language_files(
    dir: &Path,
    files: &BTreeMap<PathBuf, TextMap>,
) -> Result<Vec<PathBuf>, LyraError> {
    let writes = files.iter().map(|(relative, texts)| {
        let path = dir.join(relative);
        let yaml = to_yaml_string(texts);
        async move {
            if let Some(parent) = path.parent() {
                if let Err(source) = tokio::fs::create_dir_all(parent).await {
                    return Err(WriteLanguageFileError { path, source });
                }
            }
            match tokio::fs::write(&path, yaml).await {
                Ok(()) => {
                    debug!("Wrote {}", path.display());
                    Ok(path)
                }
                Err(source) => Err(WriteLanguageFileError { path, source }),
            }
        }
    });

    let (written, failed): (Vec<_>, Vec<_>) = futures::future::join_all(writes)
        .await
        .into_iter()
        .partition(Result::is_ok);

    let failed: Vec<WriteLanguageFileError> = failed.into_iter().filter_map(Result::err).collect();
    if !failed.is_empty() {
        return Err(LyraError::WriteLanguageFiles(failed));
    }

    Ok(written.into_iter().filter_map(Result::ok).collect())
}
