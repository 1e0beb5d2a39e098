//! Readers for a project's message catalog and existing translations.
//!
//! - `yaml_messages`: messages from `en.yml` files
//! - `ts_messages`: messages from `messageIds.ts` files
//! - `yaml_translations`: translations from `<lang>.yml` files
//!
//! Which message reader a project uses is decided once, from its
//! `lyra.yml` entry, by [`message_adapter_for`].

mod ts_messages;
mod walk;
mod yaml_messages;
mod yaml_translations;

use crate::error::LyraError;
use crate::lyra_config::{MessageFormat, ProjectConfig};
use crate::store::{LanguageMap, Message};
use async_trait::async_trait;
use std::sync::Arc;

pub use ts_messages::{parse_message_ids, TsMessageAdapter};
pub use yaml_messages::{extract_params, YamlMessageAdapter};
pub use yaml_translations::{is_language_code, YamlTranslationAdapter};

/// Source of truth for which messages a project has.
#[async_trait]
pub trait MessageAdapter: Send + Sync {
    async fn get_messages(&self) -> Result<Vec<Message>, LyraError>;
}

/// Existing translations of a project, per language.
#[async_trait]
pub trait TranslationAdapter: Send + Sync {
    async fn get_translations(&self) -> Result<LanguageMap, LyraError>;
}

/// Build the message reader matching the project's configured format.
pub fn message_adapter_for(config: &ProjectConfig) -> Arc<dyn MessageAdapter> {
    match config.messages.format {
        MessageFormat::Yaml => Arc::new(YamlMessageAdapter::new(config.messages_dir())),
        MessageFormat::Ts => Arc::new(TsMessageAdapter::new(config.messages_dir())),
    }
}

pub fn translation_adapter_for(config: &ProjectConfig) -> Arc<dyn TranslationAdapter> {
    let adapter = YamlTranslationAdapter::new(config.translations_dir(), config.languages.clone());
    match config.messages.format {
        MessageFormat::Yaml => Arc::new(adapter.excluding_messages(config.messages_dir())),
        MessageFormat::Ts => Arc::new(adapter),
    }
}
