//! Reconciliation of in-memory state with state freshly read from the
//! repository.

use super::types::{LanguageMap, StoreData};

/// Merge unsaved in-memory state with repository state.
///
/// The repository decides which messages exist. For every surviving
/// message, the in-memory translation wins over the repository one, so
/// edits that have not been written to disk yet are kept. Translations of
/// messages that no longer exist are dropped, and no empty translations are
/// synthesized.
///
/// Every language seen on either side is kept, even with zero
/// translations. That includes languages only known in memory.
pub fn merge_store_data(in_memory: &StoreData, from_repo: &StoreData) -> StoreData {
    let mut languages = LanguageMap::new();

    for lang in in_memory.languages.keys().chain(from_repo.languages.keys()) {
        languages.entry(lang.clone()).or_default();
    }

    for (lang, merged) in languages.iter_mut() {
        let memory = in_memory.languages.get(lang);
        let repo = from_repo.languages.get(lang);

        for message in &from_repo.messages {
            let translation = memory
                .and_then(|m| m.get(&message.id))
                .or_else(|| repo.and_then(|r| r.get(&message.id)));

            if let Some(translation) = translation {
                merged.insert(message.id.clone(), translation.clone());
            }
        }
    }

    StoreData {
        messages: from_repo.messages.clone(),
        languages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{Message, Translation, TranslationMap};

    fn data(messages: &[&str], languages: &[(&str, &[(&str, &str)])]) -> StoreData {
        StoreData {
            messages: messages.iter().map(|id| Message::new(*id, "")).collect(),
            languages: languages
                .iter()
                .map(|(lang, entries)| {
                    let map: TranslationMap = entries
                        .iter()
                        .map(|(id, text)| {
                            (id.to_string(), Translation::new(*text, format!("{}.yml", lang)))
                        })
                        .collect();
                    (lang.to_string(), map)
                })
                .collect(),
        }
    }

    fn text<'a>(data: &'a StoreData, lang: &str, id: &str) -> Option<&'a str> {
        data.languages
            .get(lang)
            .and_then(|m| m.get(id))
            .map(|t| t.text.as_str())
    }

    #[test]
    fn test_merge_preserves_in_memory_edits() {
        let in_memory = data(&["m"], &[("sv", &[("m", "old")])]);
        let from_repo = data(&["m"], &[("sv", &[("m", "new-from-disk")])]);

        let merged = merge_store_data(&in_memory, &from_repo);

        assert_eq!(text(&merged, "sv", "m"), Some("old"));
    }

    #[test]
    fn test_merge_adopts_new_repo_messages() {
        let in_memory = data(&["m1"], &[("sv", &[("m1", "ett")])]);
        let from_repo = data(&["m1", "m2"], &[("sv", &[("m1", "ett"), ("m2", "två")])]);

        let merged = merge_store_data(&in_memory, &from_repo);

        assert_eq!(merged.messages.len(), 2);
        assert_eq!(text(&merged, "sv", "m2"), Some("två"));
    }

    #[test]
    fn test_merge_prunes_removed_messages() {
        let in_memory = data(
            &["m", "gone"],
            &[("sv", &[("m", "a"), ("gone", "b")]), ("de", &[("gone", "c")])],
        );
        let from_repo = data(&["m"], &[("sv", &[("m", "a")]), ("de", &[])]);

        let merged = merge_store_data(&in_memory, &from_repo);

        assert!(merged.languages.values().all(|m| !m.contains_key("gone")));
        assert_eq!(merged.messages, vec![Message::new("m", "")]);
    }

    #[test]
    fn test_merge_keeps_empty_repo_languages() {
        let in_memory = StoreData::default();
        let from_repo = data(&[], &[("sv", &[])]);

        let merged = merge_store_data(&in_memory, &from_repo);

        assert_eq!(merged.languages.get("sv"), Some(&TranslationMap::new()));
    }

    #[test]
    fn test_merge_keeps_in_memory_only_language() {
        let in_memory = data(&["m"], &[("fi", &[("m", "hei")])]);
        let from_repo = data(&["m", "n"], &[("sv", &[("m", "hej")])]);

        let merged = merge_store_data(&in_memory, &from_repo);

        assert_eq!(text(&merged, "fi", "m"), Some("hei"));
        assert_eq!(text(&merged, "sv", "m"), Some("hej"));
        assert_eq!(text(&merged, "fi", "n"), None);
    }

    #[test]
    fn test_merge_does_not_synthesize_translations() {
        let in_memory = StoreData::default();
        let from_repo = data(&["a", "b"], &[("sv", &[("a", "A")])]);

        let merged = merge_store_data(&in_memory, &from_repo);

        let sv = &merged.languages["sv"];
        assert_eq!(sv.len(), 1);
        assert!(!sv.contains_key("b"));
    }

    #[test]
    fn test_merge_keeps_source_file_of_winning_entry() {
        let mut in_memory = data(&["m"], &[]);
        in_memory.languages.insert(
            "sv".into(),
            [("m".to_string(), Translation::new("edited", "features/sv.yml"))]
                .into_iter()
                .collect(),
        );
        let from_repo = data(&["m"], &[("sv", &[("m", "disk")])]);

        let merged = merge_store_data(&in_memory, &from_repo);

        assert_eq!(
            merged.languages["sv"]["m"].source_file,
            std::path::PathBuf::from("features/sv.yml")
        );
    }
}
