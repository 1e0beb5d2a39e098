use super::merge::merge_store_data;
use super::types::{default_source_file, flatten_texts, Message, StoreData, TextMap, Translation};
use crate::adapters::{MessageAdapter, TranslationAdapter};
use crate::error::LyraError;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One project's in-memory messages and translations.
///
/// State is loaded from the adapters on first access. The mutex is held
/// across that load, so concurrent first readers wait for a single
/// in-flight initialization instead of each reading the repository.
pub struct ProjectStore {
    message_adapter: Arc<dyn MessageAdapter>,
    translation_adapter: Arc<dyn TranslationAdapter>,
    state: Mutex<Option<StoreData>>,
    /// Store this one replaced. Its in-memory state seeds the first load.
    predecessor: StdMutex<Option<Arc<ProjectStore>>>,
}

impl ProjectStore {
    pub fn new(
        message_adapter: Arc<dyn MessageAdapter>,
        translation_adapter: Arc<dyn TranslationAdapter>,
    ) -> Self {
        Self {
            message_adapter,
            translation_adapter,
            state: Mutex::new(None),
            predecessor: StdMutex::new(None),
        }
    }

    /// A store with new adapters that keeps the unsent edits of `previous`
    /// for messages that still exist.
    pub fn replacing(
        message_adapter: Arc<dyn MessageAdapter>,
        translation_adapter: Arc<dyn TranslationAdapter>,
        previous: Arc<ProjectStore>,
    ) -> Self {
        let store = Self::new(message_adapter, translation_adapter);
        *store.predecessor.lock().unwrap_or_else(|e| e.into_inner()) = Some(previous);
        store
    }

    /// State left behind by the replaced store, if it was ever loaded.
    async fn inherited_state(&self) -> StoreData {
        let previous = self
            .predecessor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match previous {
            Some(previous) => previous.state.lock().await.clone().unwrap_or_default(),
            None => StoreData::default(),
        }
    }

    async fn read_from_adapters(&self) -> Result<StoreData, LyraError> {
        let (messages, languages) = tokio::try_join!(
            self.message_adapter.get_messages(),
            self.translation_adapter.get_translations()
        )?;
        debug!(
            "Read {} messages and {} languages from project files",
            messages.len(),
            languages.len()
        );
        Ok(StoreData {
            messages,
            languages,
        })
    }

    /// Run `f` against the loaded state, loading it first if needed.
    async fn with_state<R>(
        &self,
        f: impl FnOnce(&mut StoreData) -> Result<R, LyraError>,
    ) -> Result<R, LyraError> {
        let mut guard = self.state.lock().await;
        let data = match guard.take() {
            Some(data) => data,
            None => {
                let fresh = self.read_from_adapters().await?;
                // Initial load is a reconciliation against nothing (or the
                // replaced store), which also drops translations of
                // messages that do not exist.
                merge_store_data(&self.inherited_state().await, &fresh)
            }
        };
        f(guard.insert(data))
    }

    pub async fn get_messages(&self) -> Result<Vec<Message>, LyraError> {
        self.with_state(|data| Ok(data.messages.clone())).await
    }

    pub async fn get_translations(&self, lang: &str) -> Result<TextMap, LyraError> {
        self.with_state(|data| {
            data.languages
                .get(lang)
                .map(flatten_texts)
                .ok_or_else(|| LyraError::LanguageNotFound(lang.to_string()))
        })
        .await
    }

    pub async fn get_language_data(&self) -> Result<BTreeMap<String, TextMap>, LyraError> {
        self.with_state(|data| {
            Ok(data
                .languages
                .iter()
                .map(|(lang, translations)| (lang.clone(), flatten_texts(translations)))
                .collect())
        })
        .await
    }

    /// Replace the text of one translation in memory.
    ///
    /// A live message without a translation in `lang` gets a new entry in
    /// the language's default file. Ids that are neither translated nor
    /// live messages are rejected.
    pub async fn update_translation(
        &self,
        lang: &str,
        id: &str,
        text: &str,
    ) -> Result<(), LyraError> {
        self.with_state(|data| {
            let is_message = data.has_message(id);
            let translations = data
                .languages
                .get_mut(lang)
                .ok_or_else(|| LyraError::LanguageNotFound(lang.to_string()))?;

            match translations.get_mut(id) {
                Some(existing) => existing.text = text.to_string(),
                None if is_message => {
                    translations.insert(
                        id.to_string(),
                        Translation::new(text, default_source_file(lang)),
                    );
                }
                None => return Err(LyraError::MessageNotFound(id.to_string())),
            }
            Ok(())
        })
        .await
    }

    /// Re-read the project files and merge them into the current state.
    pub async fn refresh(&self) -> Result<(), LyraError> {
        let fresh = self.read_from_adapters().await?;
        let mut guard = self.state.lock().await;
        let current = match guard.take() {
            Some(current) => current,
            None => self.inherited_state().await,
        };
        let merged = merge_store_data(&current, &fresh);
        info!(
            "Refreshed project store: {} messages, {} languages",
            merged.messages.len(),
            merged.languages.len()
        );
        *guard = Some(merged);
        Ok(())
    }

    /// Copy of the full state, including source files.
    pub async fn snapshot(&self) -> Result<StoreData, LyraError> {
        self.with_state(|data| Ok(data.clone())).await
    }

    /// Languages currently loaded.
    pub async fn languages(&self) -> Result<Vec<String>, LyraError> {
        self.with_state(|data| Ok(data.languages.keys().cloned().collect()))
            .await
    }
}

impl std::fmt::Debug for ProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{LanguageMap, TranslationMap};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeMessages {
        messages: StdMutex<Vec<Message>>,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl MessageAdapter for FakeMessages {
        async fn get_messages(&self) -> Result<Vec<Message>, LyraError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(self.messages.lock().unwrap().clone())
        }
    }

    struct FakeTranslations {
        languages: StdMutex<LanguageMap>,
    }

    #[async_trait]
    impl TranslationAdapter for FakeTranslations {
        async fn get_translations(&self) -> Result<LanguageMap, LyraError> {
            Ok(self.languages.lock().unwrap().clone())
        }
    }

    struct Fixture {
        messages: Arc<FakeMessages>,
        translations: Arc<FakeTranslations>,
        store: ProjectStore,
    }

    fn fixture(ids: &[&str], sv: &[(&str, &str)]) -> Fixture {
        let messages = Arc::new(FakeMessages {
            messages: StdMutex::new(
                ids.iter()
                    .map(|id| Message::new(*id, "default"))
                    .collect(),
            ),
            reads: AtomicUsize::new(0),
        });
        let sv: TranslationMap = sv
            .iter()
            .map(|(id, text)| (id.to_string(), Translation::new(*text, "sv.yml")))
            .collect();
        let translations = Arc::new(FakeTranslations {
            languages: StdMutex::new([("sv".to_string(), sv)].into_iter().collect()),
        });
        let store = ProjectStore::new(messages.clone(), translations.clone());
        Fixture {
            messages,
            translations,
            store,
        }
    }

    #[tokio::test]
    async fn test_get_messages_loads_lazily() {
        let f = fixture(&["a.b", "a.c"], &[]);
        assert_eq!(f.messages.reads.load(Ordering::SeqCst), 0);

        let messages = f.store.get_messages().await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(f.messages.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reads_are_idempotent() {
        let f = fixture(&["a.b"], &[("a.b", "hej")]);

        let first = f.store.get_translations("sv").await.unwrap();
        let second = f.store.get_translations("sv").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.messages.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_reads_initialize_once() {
        let f = fixture(&["a.b"], &[("a.b", "hej")]);

        let (a, b, c) = tokio::join!(
            f.store.get_messages(),
            f.store.get_translations("sv"),
            f.store.get_language_data()
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(f.messages.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_is_visible_to_next_read() {
        let f = fixture(&["a.b"], &[("a.b", "hej")]);

        f.store.update_translation("sv", "a.b", "hallå").await.unwrap();

        let sv = f.store.get_translations("sv").await.unwrap();
        assert_eq!(sv.get("a.b").map(String::as_str), Some("hallå"));
    }

    #[tokio::test]
    async fn test_update_before_any_read_survives_init() {
        let f = fixture(&["a.b", "a.c"], &[("a.b", "hej"), ("a.c", "då")]);

        f.store.update_translation("sv", "a.c", "hejdå").await.unwrap();

        let messages = f.store.get_messages().await.unwrap();
        let sv = f.store.get_translations("sv").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(sv["a.c"], "hejdå");
        assert_eq!(sv["a.b"], "hej");
    }

    #[tokio::test]
    async fn test_unknown_language_is_rejected() {
        let f = fixture(&["a.b"], &[("a.b", "hej")]);

        let read = f.store.get_translations("xx").await;
        let update = f.store.update_translation("xx", "a.b", "x").await;

        assert!(matches!(read, Err(LyraError::LanguageNotFound(lang)) if lang == "xx"));
        assert!(matches!(update, Err(LyraError::LanguageNotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_message_is_rejected() {
        let f = fixture(&["a.b"], &[("a.b", "hej")]);

        let result = f.store.update_translation("sv", "no.such.id", "x").await;

        assert!(matches!(result, Err(LyraError::MessageNotFound(id)) if id == "no.such.id"));
    }

    #[tokio::test]
    async fn test_update_of_untranslated_message_uses_default_file() {
        let f = fixture(&["a.b", "a.c"], &[("a.b", "hej")]);

        f.store.update_translation("sv", "a.c", "då").await.unwrap();

        let snapshot = f.store.snapshot().await.unwrap();
        let entry = &snapshot.languages["sv"]["a.c"];
        assert_eq!(entry.text, "då");
        assert_eq!(entry.source_file, std::path::PathBuf::from("sv.yml"));
    }

    #[tokio::test]
    async fn test_update_keeps_source_file() {
        let f = fixture(&["a.b"], &[]);
        f.translations.languages.lock().unwrap().insert(
            "sv".into(),
            [("a.b".to_string(), Translation::new("hej", "feature/sv.yml"))]
                .into_iter()
                .collect(),
        );

        f.store.update_translation("sv", "a.b", "tjena").await.unwrap();

        let snapshot = f.store.snapshot().await.unwrap();
        assert_eq!(
            snapshot.languages["sv"]["a.b"],
            Translation::new("tjena", "feature/sv.yml")
        );
    }

    #[tokio::test]
    async fn test_initial_load_drops_orphaned_translations() {
        let f = fixture(&["a.b"], &[("a.b", "hej"), ("old.key", "gammal")]);

        let sv = f.store.get_translations("sv").await.unwrap();

        assert!(!sv.contains_key("old.key"));
    }

    #[tokio::test]
    async fn test_refresh_merges_repo_changes_with_edits() {
        let f = fixture(&["a.b", "a.c"], &[("a.b", "hej"), ("a.c", "då")]);
        f.store.update_translation("sv", "a.b", "edited").await.unwrap();

        // Upstream removes a.c, adds a.d and changes a.b on disk
        *f.messages.messages.lock().unwrap() =
            vec![Message::new("a.b", "default"), Message::new("a.d", "default")];
        f.translations.languages.lock().unwrap().insert(
            "sv".into(),
            [
                ("a.b".to_string(), Translation::new("from disk", "sv.yml")),
                ("a.d".to_string(), Translation::new("ny", "sv.yml")),
            ]
            .into_iter()
            .collect(),
        );

        f.store.refresh().await.unwrap();

        let sv = f.store.get_translations("sv").await.unwrap();
        assert_eq!(sv.get("a.b").map(String::as_str), Some("edited"));
        assert_eq!(sv.get("a.d").map(String::as_str), Some("ny"));
        assert!(!sv.contains_key("a.c"));
        assert_eq!(f.messages.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replacing_store_keeps_edits_of_loaded_predecessor() {
        let old = fixture(&["a.b", "a.c"], &[("a.b", "hej")]);
        old.store.update_translation("sv", "a.b", "edited").await.unwrap();
        let previous = Arc::new(old.store);
        let new = fixture(&["a.b"], &[("a.b", "from new files")]);

        let store =
            ProjectStore::replacing(new.messages.clone(), new.translations.clone(), previous);

        let sv = store.get_translations("sv").await.unwrap();
        assert_eq!(sv.get("a.b").map(String::as_str), Some("edited"));
        assert_eq!(store.get_messages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replacing_unloaded_store_reads_only_new_files() {
        let old = fixture(&["a.b"], &[("a.b", "hej")]);
        let new = fixture(&["a.b"], &[("a.b", "from new files")]);

        let previous = Arc::new(old.store);
        let store =
            ProjectStore::replacing(new.messages.clone(), new.translations.clone(), previous);
        store.refresh().await.unwrap();

        let sv = store.get_translations("sv").await.unwrap();
        assert_eq!(sv.get("a.b").map(String::as_str), Some("from new files"));
        assert_eq!(old.messages.reads.load(Ordering::SeqCst), 0);
    }
}
