use super::walk::{find_files, id_prefix};
use super::yaml_messages::MESSAGE_FILE_PATTERNS;
use super::TranslationAdapter;
use crate::error::LyraError;
use crate::language_files::flatten_yaml;
use crate::store::{LanguageMap, Translation};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

static LANGUAGE_CODE: OnceLock<Regex> = OnceLock::new();

/// Whether a file stem looks like a language code (`sv`, `de`, `pt-BR`).
pub fn is_language_code(stem: &str) -> bool {
    LANGUAGE_CODE
        .get_or_init(|| {
            Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]+)*$").expect("language code pattern is valid")
        })
        .is_match(stem)
}

fn language_of(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?;
    if extension != "yml" && extension != "yaml" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    is_language_code(stem).then(|| stem.to_string())
}

const TRANSLATION_FILE_PATTERNS: &[&str] = &["**/*.yml", "**/*.yaml"];

/// Reads `<lang>.yml` files below a project's translations directory.
pub struct YamlTranslationAdapter {
    dir: PathBuf,
    /// Languages that exist even without any file yet.
    languages: Vec<String>,
    /// Directory whose `en.yml` files are the message catalog, not
    /// translations.
    messages_dir: Option<PathBuf>,
}

impl YamlTranslationAdapter {
    pub fn new(dir: PathBuf, languages: Vec<String>) -> Self {
        Self {
            dir,
            languages,
            messages_dir: None,
        }
    }

    /// Skip the YAML message catalog below `messages_dir` when it shares
    /// files with the translations directory.
    pub fn excluding_messages(mut self, messages_dir: PathBuf) -> Self {
        self.messages_dir = Some(messages_dir);
        self
    }

    async fn message_files(&self) -> Result<HashSet<PathBuf>, LyraError> {
        let Some(messages_dir) = &self.messages_dir else {
            return Ok(HashSet::new());
        };
        Ok(find_files(messages_dir, MESSAGE_FILE_PATTERNS)
            .await?
            .into_iter()
            .collect())
    }
}

#[async_trait]
impl TranslationAdapter for YamlTranslationAdapter {
    async fn get_translations(&self) -> Result<LanguageMap, LyraError> {
        let mut languages = LanguageMap::new();
        for lang in &self.languages {
            languages.entry(lang.clone()).or_default();
        }

        let message_files = self.message_files().await?;
        let files = find_files(&self.dir, TRANSLATION_FILE_PATTERNS).await?;
        for file in files {
            if message_files.contains(&file) {
                continue;
            }
            let Some(lang) = language_of(&file) else {
                continue;
            };
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| LyraError::adapter_read(&file, e))?;
            let value: serde_yaml::Value = if content.trim().is_empty() {
                serde_yaml::Value::Null
            } else {
                serde_yaml::from_str(&content).map_err(|e| LyraError::adapter_read(&file, e))?
            };

            let source_file = file.strip_prefix(&self.dir).unwrap_or(&file).to_path_buf();
            let prefix = id_prefix(&self.dir, &file);
            let texts = flatten_yaml(&value, prefix.as_deref());
            debug!("Read {} translations from {}", texts.len(), file.display());

            let translations = languages.entry(lang).or_default();
            for (id, text) in texts {
                translations.insert(id, Translation::new(text, source_file.clone()));
            }
        }

        Ok(languages)
    }
}
