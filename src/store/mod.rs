//! In-memory project state.
//!
//! - `types`: messages, translations and the per-project `StoreData`
//! - `merge`: reconciliation of in-memory edits with repository state
//! - `project_store`: lazily loaded state for one project
//! - `registry`: one `ProjectStore` per project path for the process

mod merge;
mod project_store;
mod registry;
mod types;

pub use merge::merge_store_data;
pub use project_store::ProjectStore;
pub use registry::StoreRegistry;
pub use types::{
    default_source_file, flatten_texts, LanguageMap, Message, MessageParam, StoreData, TextMap,
    Translation, TranslationMap,
};
