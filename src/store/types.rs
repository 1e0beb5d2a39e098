use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A declared interpolation parameter of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageParam {
    pub name: String,
    pub types: Vec<String>,
}

/// A translatable string defined in a project's source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Dot-delimited hierarchical id, unique within the project.
    pub id: String,
    pub default_message: String,
    pub params: Vec<MessageParam>,
}

impl Message {
    pub fn new(id: impl Into<String>, default_message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_message: default_message.into(),
            params: Vec::new(),
        }
    }
}

/// One language's rendering of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub text: String,
    /// YAML file the value came from or goes to, relative to the
    /// project's translations directory.
    pub source_file: PathBuf,
}

impl Translation {
    pub fn new(text: impl Into<String>, source_file: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            source_file: source_file.into(),
        }
    }
}

/// message id -> translation, for one language.
pub type TranslationMap = BTreeMap<String, Translation>;

/// language code -> translations.
pub type LanguageMap = BTreeMap<String, TranslationMap>;

/// message id -> text, the flattened view handed to callers.
pub type TextMap = BTreeMap<String, String>;

/// A project's complete in-memory state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreData {
    pub messages: Vec<Message>,
    pub languages: LanguageMap,
}

impl StoreData {
    pub fn has_message(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }
}

/// File a new translation for `lang` is written to when no existing
/// entry says otherwise.
pub fn default_source_file(lang: &str) -> PathBuf {
    PathBuf::from(format!("{}.yml", lang))
}

/// Strip `source_file` from every translation.
pub fn flatten_texts(translations: &TranslationMap) -> TextMap {
    translations
        .iter()
        .map(|(id, t)| (id.clone(), t.text.clone()))
        .collect()
}
