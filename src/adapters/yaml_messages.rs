use super::walk::{find_files, id_prefix};
use super::MessageAdapter;
use crate::error::LyraError;
use crate::language_files::flatten_yaml;
use crate::store::{Message, MessageParam};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Files holding the default (source language) messages.
pub(super) const MESSAGE_FILE_PATTERNS: &[&str] = &["**/en.yml"];

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

/// Parameters declared by `{name}` / `{name, type, ...}` placeholders.
pub fn extract_params(text: &str) -> Vec<MessageParam> {
    let placeholder = PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*(?:,\s*([A-Za-z]+))?")
            .expect("placeholder pattern is valid")
    });

    let mut params: Vec<MessageParam> = Vec::new();
    for cap in placeholder.captures_iter(text) {
        let name = &cap[1];
        let param_type = match cap.get(2).map(|m| m.as_str()) {
            Some("number" | "plural" | "selectordinal") => "number",
            Some("date" | "time") => "date",
            _ => "string",
        };

        match params.iter_mut().find(|p| p.name == name) {
            Some(existing) => {
                if !existing.types.iter().any(|t| t == param_type) {
                    existing.types.push(param_type.to_string());
                }
            }
            None => params.push(MessageParam {
                name: name.to_string(),
                types: vec![param_type.to_string()],
            }),
        }
    }
    params
}

/// Reads messages from `en.yml` files below the messages directory.
pub struct YamlMessageAdapter {
    dir: PathBuf,
}

impl YamlMessageAdapter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl MessageAdapter for YamlMessageAdapter {
    async fn get_messages(&self) -> Result<Vec<Message>, LyraError> {
        let files = find_files(&self.dir, MESSAGE_FILE_PATTERNS).await?;

        let mut messages = Vec::new();
        for file in files {
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| LyraError::adapter_read(&file, e))?;
            if content.trim().is_empty() {
                continue;
            }
            let value: serde_yaml::Value =
                serde_yaml::from_str(&content).map_err(|e| LyraError::adapter_read(&file, e))?;

            let prefix = id_prefix(&self.dir, &file);
            for (id, default_message) in flatten_yaml(&value, prefix.as_deref()) {
                messages.push(Message {
                    params: extract_params(&default_message),
                    id,
                    default_message,
                });
            }
        }

        messages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(messages)
    }
}
